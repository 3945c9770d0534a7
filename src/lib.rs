/// crud-demo library
///
/// A small typed mapping layer over SQLite plus the demo scenarios that
/// exercise it.

pub mod config;
pub mod db;
pub mod demo;
pub mod error;
pub mod logging;

// Re-exports for convenience
pub use db::Database;
pub use error::{CrudError, Result};
