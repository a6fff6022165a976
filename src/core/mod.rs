//! Core utilities: configuration, errors, logging, pricing

pub mod config;
pub mod error;
pub mod logging;
pub mod pricing;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
