pub mod db;
#[cfg(test)]
pub mod memory;

pub use db::DbAdapter;
