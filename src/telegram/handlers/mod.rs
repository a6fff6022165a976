//! Telegram bot handler tree configuration
//!
//! Updates become transport-neutral [`Inbound`](crate::conversation::Inbound)
//! units; the engine's replies are rendered back through the Bot API.

mod schema;
mod types;

pub use schema::schema;
pub use types::{inbound_from_callback, inbound_from_message, HandlerDeps, HandlerError};
