//! Transport-neutral inbound units and outbound replies.

use std::path::Path;

use async_trait::async_trait;

use crate::core::error::AppResult;

/// A document attached to a message.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRef {
    /// Opaque reference understood by the [`DocumentSource`]
    pub file_ref: String,
    pub file_name: Option<String>,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundKind {
    /// Plain message text, commands included
    Text(String),
    /// Button press: `action` or `action:argument`
    Callback(String),
    Document(DocumentRef),
}

/// One inbound unit from a user.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub telegram_id: i64,
    pub language_code: Option<String>,
    pub kind: InboundKind,
}

impl Inbound {
    pub fn text(telegram_id: i64, text: impl Into<String>) -> Self {
        Self {
            telegram_id,
            language_code: None,
            kind: InboundKind::Text(text.into()),
        }
    }

    pub fn callback(telegram_id: i64, data: impl Into<String>) -> Self {
        Self {
            telegram_id,
            language_code: None,
            kind: InboundKind::Callback(data.into()),
        }
    }

    pub fn document(telegram_id: i64, document: DocumentRef) -> Self {
        Self {
            telegram_id,
            language_code: None,
            kind: InboundKind::Document(document),
        }
    }

    pub fn with_language(mut self, code: impl Into<String>) -> Self {
        self.language_code = Some(code.into());
        self
    }

    /// Message text, empty for documents and callbacks.
    pub fn message_text(&self) -> &str {
        match &self.kind {
            InboundKind::Text(text) => text,
            _ => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Button {
    Callback { label: String, data: String },
    Url { label: String, url: String },
}

impl Button {
    pub fn callback(label: impl Into<String>, data: impl Into<String>) -> Self {
        Button::Callback {
            label: label.into(),
            data: data.into(),
        }
    }

    pub fn url(label: impl Into<String>, url: impl Into<String>) -> Self {
        Button::Url {
            label: label.into(),
            url: url.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Keyboard {
    /// Buttons attached to the message
    Inline(Vec<Vec<Button>>),
    /// Custom reply keyboard with text buttons
    Reply(Vec<Vec<String>>),
    /// Hide a previously shown reply keyboard
    Remove,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text {
        text: String,
        keyboard: Option<Keyboard>,
    },
    /// Edit the message whose button was pressed; sent as new text otherwise
    Edit {
        text: String,
        keyboard: Option<Keyboard>,
    },
    /// Short notice shown on a button press
    Toast(String),
    Document {
        file_name: String,
        content: Vec<u8>,
        caption: Option<String>,
    },
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Reply::Text {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Reply::Text {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    pub fn edit(text: impl Into<String>, keyboard: Keyboard) -> Self {
        Reply::Edit {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }

    /// Text of a text, edit or toast reply.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Reply::Text { text, .. } | Reply::Edit { text, .. } | Reply::Toast(text) => Some(text),
            Reply::Document { .. } => None,
        }
    }

    pub fn keyboard(&self) -> Option<&Keyboard> {
        match self {
            Reply::Text { keyboard, .. } | Reply::Edit { keyboard, .. } => keyboard.as_ref(),
            _ => None,
        }
    }
}

/// Where uploaded bytes come from.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Copies the referenced document into `dest` and returns the bytes written.
    async fn fetch(&self, file_ref: &str, dest: &Path) -> AppResult<u64>;
}
