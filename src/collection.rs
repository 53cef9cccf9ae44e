//! Shared local invoice collection.
//!
//! One ordered list per signed-in owner, mutated by exactly two producers:
//! the orchestrator (optimistic writes and rollbacks) and the subscription
//! feed (event application). The lock is never held across an await.

use std::sync::{Arc, RwLock};

use crate::invoice::Invoice;

/// Cheap-clone handle to the live collection.
#[derive(Clone, Default)]
pub struct InvoiceCollection {
    inner: Arc<RwLock<Vec<Invoice>>>,
}

impl InvoiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full copy of the current contents, in order.
    pub fn snapshot(&self) -> Vec<Invoice> {
        self.inner.read().expect("collection lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("collection lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exact-id lookup.
    pub fn get(&self, id: &str) -> Option<Invoice> {
        self.inner
            .read()
            .expect("collection lock poisoned")
            .iter()
            .find(|inv| inv.id == id)
            .cloned()
    }

    /// Case-insensitive lookup, for ids relayed through conversation.
    pub fn find_by_id_ci(&self, id: &str) -> Option<Invoice> {
        self.inner
            .read()
            .expect("collection lock poisoned")
            .iter()
            .find(|inv| inv.id.eq_ignore_ascii_case(id))
            .cloned()
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.inner
            .read()
            .expect("collection lock poisoned")
            .iter()
            .position(|inv| inv.id == id)
    }

    /// New entries go to the front, matching bulk-load order (newest first).
    pub fn prepend(&self, invoice: Invoice) {
        self.inner
            .write()
            .expect("collection lock poisoned")
            .insert(0, invoice);
    }

    /// Replace the entry with the same id in place, preserving its slot.
    /// Returns the prior value, `None` if the id is absent.
    pub fn replace(&self, invoice: Invoice) -> Option<Invoice> {
        let mut entries = self.inner.write().expect("collection lock poisoned");
        let slot = entries.iter_mut().find(|inv| inv.id == invoice.id)?;
        Some(std::mem::replace(slot, invoice))
    }

    /// Reinsert at a given index, clamped to the current length.
    pub fn insert_at(&self, index: usize, invoice: Invoice) {
        let mut entries = self.inner.write().expect("collection lock poisoned");
        let index = index.min(entries.len());
        entries.insert(index, invoice);
    }

    /// Remove by id, returning the entry and the index it occupied.
    pub fn remove(&self, id: &str) -> Option<(usize, Invoice)> {
        let mut entries = self.inner.write().expect("collection lock poisoned");
        let index = entries.iter().position(|inv| inv.id == id)?;
        Some((index, entries.remove(index)))
    }

    /// Drop everything, as on sign-out.
    pub fn clear(&self) {
        self.inner.write().expect("collection lock poisoned").clear();
    }

    /// Replace the whole contents, as after a bulk load.
    pub fn reset(&self, invoices: Vec<Invoice>) {
        *self.inner.write().expect("collection lock poisoned") = invoices;
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use crate::invoice::{Invoice, InvoiceStatus};

    use super::InvoiceCollection;

    fn invoice(id: &str) -> Invoice {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).expect("valid date");
        Invoice {
            id: id.to_string(),
            client_name: "Acme".to_string(),
            amount: dec!(10),
            issue_date: date,
            due_date: date,
            status: InvoiceStatus::Pending,
            observations: String::new(),
        }
    }

    #[test]
    fn prepend_and_remove_keep_order() {
        let collection = InvoiceCollection::new();
        collection.prepend(invoice("a"));
        collection.prepend(invoice("b"));
        collection.prepend(invoice("c"));

        let (index, removed) = collection.remove("b").expect("present");
        assert_eq!(index, 1);
        assert_eq!(removed.id, "b");

        collection.insert_at(1, removed);
        let ids: Vec<String> = collection.snapshot().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn replace_preserves_slot_and_returns_prior() {
        let collection = InvoiceCollection::new();
        collection.prepend(invoice("a"));
        collection.prepend(invoice("b"));

        let mut updated = invoice("a");
        updated.client_name = "Globex".to_string();
        let prior = collection.replace(updated).expect("present");
        assert_eq!(prior.client_name, "Acme");

        let snapshot = collection.snapshot();
        assert_eq!(snapshot[1].client_name, "Globex");
        assert!(collection.replace(invoice("zzz")).is_none());
    }

    #[test]
    fn lookup_is_case_insensitive_only_where_asked() {
        let collection = InvoiceCollection::new();
        collection.prepend(invoice("ABC-123"));
        assert!(collection.find_by_id_ci("abc-123").is_some());
        assert!(collection.get("abc-123").is_none());
    }
}
