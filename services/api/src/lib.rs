//! services/api/src/lib.rs
//!
//! The HTTP service for the EMR admin console and patient portal. The binaries
//! in `src/bin` share everything through this library.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
