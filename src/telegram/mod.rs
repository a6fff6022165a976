//! Telegram transport: bot setup, dispatcher schema, rendering and notifications

pub mod bot;
pub mod handlers;
pub mod notifications;
pub mod render;
pub mod source;

// Re-exports for convenience
pub use bot::{create_bot, setup_bot_commands};
pub use handlers::{schema, HandlerDeps, HandlerError};
pub use notifications::run_download_notifications;
pub use source::TelegramDocumentSource;
