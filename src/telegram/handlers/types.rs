//! Handler types, dependencies and update conversion

use std::sync::Arc;

use teloxide::prelude::*;
use teloxide::types::Message;

use crate::conversation::{DocumentRef, Engine, Inbound, InboundKind};

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub engine: Arc<Engine>,
}

impl HandlerDeps {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self { engine }
    }
}

fn telegram_id(user: &teloxide::types::User) -> Option<i64> {
    i64::try_from(user.id.0).ok()
}

/// Converts a private message into an inbound unit. Messages without a
/// sender are dropped.
pub fn inbound_from_message(msg: &Message) -> Option<Inbound> {
    let from = msg.from.as_ref()?;
    let kind = match msg.document() {
        Some(doc) => InboundKind::Document(DocumentRef {
            file_ref: doc.file.id.0.clone(),
            file_name: doc.file_name.clone(),
            size: u64::from(doc.file.size),
        }),
        None => InboundKind::Text(msg.text().or(msg.caption()).unwrap_or_default().to_string()),
    };
    Some(Inbound {
        telegram_id: telegram_id(from)?,
        language_code: from.language_code.clone(),
        kind,
    })
}

pub fn inbound_from_callback(q: &CallbackQuery) -> Option<Inbound> {
    Some(Inbound {
        telegram_id: telegram_id(&q.from)?,
        language_code: q.from.language_code.clone(),
        kind: InboundKind::Callback(q.data.clone().unwrap_or_default()),
    })
}
