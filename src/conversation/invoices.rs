//! Invoices issued but not yet confirmed, keyed by the provider's invoice id.
//!
//! In memory only, with no expiry: an unpaid invoice lives until it is
//! confirmed or the process restarts.

use dashmap::DashMap;

use crate::payments::ProviderTag;

#[derive(Debug, Clone, PartialEq)]
pub struct PendingInvoice {
    /// Internal id of the user who requested the top-up
    pub user_id: i64,
    pub amount: f64,
    pub provider: ProviderTag,
}

#[derive(Debug, Default)]
pub struct InvoiceBook {
    pending: DashMap<String, PendingInvoice>,
}

impl InvoiceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, invoice_id: &str, invoice: PendingInvoice) {
        self.pending.insert(invoice_id.to_string(), invoice);
    }

    pub fn get(&self, invoice_id: &str) -> Option<PendingInvoice> {
        self.pending.get(invoice_id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, invoice_id: &str) -> Option<PendingInvoice> {
        self.pending.remove(invoice_id).map(|(_, invoice)| invoice)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
