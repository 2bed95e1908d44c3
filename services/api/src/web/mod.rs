pub mod appointments;
pub mod auth;
pub mod middleware;
pub mod patients;
pub mod portal;
pub mod prescriptions;
pub mod protocol;
pub mod rest;
pub mod router;
pub mod state;

// Re-exported for the binaries that build and document the server.
pub use rest::ApiDoc;
pub use router::build_router;
