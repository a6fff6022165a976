//! Per-user conversational state.
//!
//! A user has at most one active [`Flow`]; the variant itself is the record of
//! which flow is running and at which step. Nothing here expires: an abandoned
//! flow stays until it is replaced or the process restarts.

use dashmap::DashMap;

use super::types::DocumentRef;

#[derive(Debug, Clone, PartialEq)]
pub enum UploadStep {
    AwaitingName,
    AwaitingSlug { name: String },
    AwaitingNotify { name: String, slug: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpload {
    pub document: DocumentRef,
    /// Fixed when the document arrives
    pub cost: f64,
    pub step: UploadStep,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TopupStep {
    AwaitingAmount,
    /// Only reachable with both providers configured
    AwaitingProvider { amount: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    UserInfo,
    AddBalance,
    SetBalance,
}

impl AdminAction {
    /// Number of whitespace-separated fields the input must carry.
    pub fn arity(&self) -> usize {
        match self {
            AdminAction::UserInfo => 1,
            AdminAction::AddBalance | AdminAction::SetBalance => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Upload(PendingUpload),
    Topup(TopupStep),
    AdminInput(AdminAction),
    RenameLink { storage_name: String },
}

impl Flow {
    pub fn name(&self) -> &'static str {
        match self {
            Flow::Upload(_) => "upload",
            Flow::Topup(_) => "topup",
            Flow::AdminInput(_) => "admin-input",
            Flow::RenameLink { .. } => "rename-link",
        }
    }
}

/// Flows keyed by Telegram user id.
#[derive(Debug, Default)]
pub struct SessionStore {
    flows: DashMap<i64, Flow>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a flow, replacing whatever was active.
    pub fn start(&self, user: i64, flow: Flow) {
        if let Some(previous) = self.flows.insert(user, flow) {
            log::debug!("User {} abandoned {} flow", user, previous.name());
        }
    }

    /// Removes and returns the active flow. Callers put it back to continue.
    pub fn take(&self, user: i64) -> Option<Flow> {
        self.flows.remove(&user).map(|(_, flow)| flow)
    }

    /// Removes the active flow only if it matches `predicate`.
    pub fn take_if(&self, user: i64, predicate: impl FnOnce(&Flow) -> bool) -> Option<Flow> {
        self.flows
            .remove_if(&user, |_, flow| predicate(flow))
            .map(|(_, flow)| flow)
    }

    pub fn put(&self, user: i64, flow: Flow) {
        self.flows.insert(user, flow);
    }

    /// Snapshot of the active flow.
    pub fn peek(&self, user: i64) -> Option<Flow> {
        self.flows.get(&user).map(|entry| entry.value().clone())
    }

    pub fn clear(&self, user: i64) {
        self.flows.remove(&user);
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
