//! filedrop - Telegram bot for paid file hosting
//!
//! Users top up a balance through CryptoBot or xRocket, upload documents for
//! a fee and receive a public link served by the built-in HTTP endpoint.
//! Every download can be logged and reported to the file owner.
//!
//! # Module Structure
//!
//! - `core`: configuration, errors, logging, pricing
//! - `storage`: balance ledger, file registry, download logs
//! - `payments`: payment provider adapters
//! - `conversation`: transport-neutral conversation engine
//! - `telegram`: teloxide transport
//! - `server`: delivery endpoint

pub mod cli;
pub mod conversation;
pub mod core;
pub mod i18n;
pub mod payments;
pub mod server;
pub mod storage;
pub mod telegram;

// Re-export commonly used types for convenience
pub use crate::core::{config, AppError, AppResult, Config};
pub use crate::storage::{create_pool, get_connection, DbConnection, DbPool};
