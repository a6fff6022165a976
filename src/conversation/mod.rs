//! Transport-neutral conversation engine.
//!
//! The Telegram layer turns updates into [`Inbound`] units, feeds them to
//! [`Engine::handle`] and renders the returned [`Reply`] values. Nothing in
//! here talks to Telegram directly, except through a [`DocumentSource`].

mod admin;
pub mod engine;
mod files;
pub mod invoices;
mod menu;
pub mod session;
mod topup;
pub mod types;
pub mod upload;

pub use engine::{Command, Engine};
pub use files::format_size;
pub use invoices::{InvoiceBook, PendingInvoice};
pub use menu::render_menu_text;
pub use session::{AdminAction, Flow, PendingUpload, SessionStore, TopupStep, UploadStep};
pub use topup::{parse_amount, AmountError};
pub use types::{Button, DocumentRef, DocumentSource, Inbound, InboundKind, Keyboard, Reply};
pub use upload::{is_valid_slug, new_storage_name};
