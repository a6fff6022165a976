//! Persistence: balance ledger, file registry, download logs

pub mod db;
pub mod download_log;
pub mod files;
pub mod migrations;

// Re-exports for convenience
pub use db::{create_log_pool, create_pool, get_connection, DbConnection, DbPool};
