//! Realtime subscription feed.
//!
//! Maintains the live local collection for the current owner: one bulk load,
//! then an unbounded stream of change events applied in arrival order by a
//! single consumer task. Tearing the feed down releases the subscription on
//! every exit path, setup errors included.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::task::JoinHandle;

use crate::auth::AuthProvider;
use crate::clock::Clock;
use crate::collection::InvoiceCollection;
use crate::error::InvoiceError;
use crate::mapper::map_record_to_invoice;
use crate::store::{ChangeEvent, ChangeKind, InvoiceStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Unsubscribed,
    Loading,
    Live,
}

/// Handle to a running subscription. Dropping it (or calling [`shutdown`])
/// stops event delivery; no event reaches the collection afterwards.
///
/// [`shutdown`]: InvoiceFeed::shutdown
pub struct InvoiceFeed {
    invoices: InvoiceCollection,
    state: Arc<RwLock<FeedState>>,
    task: Option<JoinHandle<()>>,
}

impl InvoiceFeed {
    /// Bulk-load the current owner's invoices and go live on the change
    /// stream.
    ///
    /// With no signed-in user the collection settles empty and no
    /// subscription is opened. Bulk-load or channel-open failure leaves the
    /// collection empty and surfaces as `SubscriptionSetup`.
    pub async fn start(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn InvoiceStore>,
        clock: Arc<dyn Clock>,
        invoices: InvoiceCollection,
    ) -> Result<Self, InvoiceError> {
        let state = Arc::new(RwLock::new(FeedState::Loading));

        let Some(user) = auth.current_user().await? else {
            invoices.clear();
            *state.write().expect("feed lock poisoned") = FeedState::Unsubscribed;
            return Ok(Self {
                invoices,
                state,
                task: None,
            });
        };

        let rows = store.list_for_owner(&user.id).await.map_err(|e| {
            invoices.clear();
            InvoiceError::SubscriptionSetup(e.to_string())
        })?;

        let mut loaded = Vec::with_capacity(rows.len());
        for row in &rows {
            match map_record_to_invoice(row, clock.as_ref()) {
                Ok(invoice) => loaded.push(invoice),
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unmappable invoice row in bulk load");
                }
            }
        }

        // Open the channel before going live; if this fails nothing is held.
        let mut feed = store.subscribe().await.map_err(|e| {
            invoices.clear();
            InvoiceError::SubscriptionSetup(e.to_string())
        })?;

        invoices.reset(loaded);
        tracing::debug!(owner = %user.id, count = invoices.len(), "invoice feed live");

        let task = tokio::spawn({
            let invoices = invoices.clone();
            let owner = user.id;
            async move {
                while let Some(event) = feed.next_event().await {
                    if !event_is_for_owner(&event, &owner) {
                        continue;
                    }
                    apply_change_event(&invoices, &event, clock.as_ref());
                }
                tracing::debug!(owner = %owner, "change feed closed");
            }
        });

        *state.write().expect("feed lock poisoned") = FeedState::Live;
        Ok(Self {
            invoices,
            state,
            task: Some(task),
        })
    }

    pub fn state(&self) -> FeedState {
        *self.state.read().expect("feed lock poisoned")
    }

    pub fn invoices(&self) -> &InvoiceCollection {
        &self.invoices
    }

    /// Release the subscription. Idempotent.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        *self.state.write().expect("feed lock poisoned") = FeedState::Unsubscribed;
    }
}

impl Drop for InvoiceFeed {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Row-level security scopes deliveries in the hosted store; re-check here
/// so an unscoped backend can never leak another owner's rows.
fn event_is_for_owner(event: &ChangeEvent, owner: &str) -> bool {
    match event.record().and_then(|r| r.get("user_id")) {
        Some(Value::String(user_id)) => user_id == owner,
        _ => true,
    }
}

/// Apply one change event to the local collection, keyed by invoice id.
pub fn apply_change_event(invoices: &InvoiceCollection, event: &ChangeEvent, clock: &dyn Clock) {
    // Deletes carry the prior row on the old side and an empty new payload;
    // `record()` picks the populated side for every kind.
    let Some(record) = event.record() else {
        tracing::warn!(kind = ?event.kind, "change event with no populated payload");
        return;
    };
    let invoice = match map_record_to_invoice(record, clock) {
        Ok(invoice) => invoice,
        Err(e) => {
            tracing::warn!(kind = ?event.kind, error = %e, "unmappable change event dropped");
            return;
        }
    };

    match event.kind {
        ChangeKind::Insert => {
            // An optimistic create may already hold this id; replace in
            // place instead of duplicating.
            if invoices.replace(invoice.clone()).is_none() {
                invoices.prepend(invoice);
            }
        }
        ChangeKind::Update => {
            if invoices.replace(invoice.clone()).is_none() {
                // Missed the insert for this row; apply as one.
                tracing::debug!(invoice_id = %invoice.id, "update for unknown id treated as insert");
                invoices.prepend(invoice);
            }
        }
        ChangeKind::Delete => {
            invoices.remove(&invoice.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use crate::clock::FixedClock;
    use crate::collection::InvoiceCollection;
    use crate::store::{ChangeEvent, ChangeKind};

    use super::apply_change_event;

    fn clock() -> FixedClock {
        FixedClock(NaiveDate::from_ymd_opt(2024, 6, 15).expect("valid date"))
    }

    fn row(id: &str, client: &str) -> Value {
        json!({
            "id": id, "user_id": "u-1", "client_name": client, "amount": "10",
            "issue_date": "2024-06-01", "due_date": "2024-07-01",
            "status": "Pending", "observations": "",
        })
    }

    fn insert_event(id: &str, client: &str) -> ChangeEvent {
        ChangeEvent {
            kind: ChangeKind::Insert,
            old: json!({}),
            new: row(id, client),
        }
    }

    #[test]
    fn duplicate_inserts_replace_instead_of_duplicating() {
        let invoices = InvoiceCollection::new();
        apply_change_event(&invoices, &insert_event("a", "Acme"), &clock());
        apply_change_event(&invoices, &insert_event("a", "Acme Corp"), &clock());

        let snapshot = invoices.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].client_name, "Acme Corp");
    }

    #[test]
    fn inserts_prepend_new_ids() {
        let invoices = InvoiceCollection::new();
        apply_change_event(&invoices, &insert_event("a", "Acme"), &clock());
        apply_change_event(&invoices, &insert_event("b", "Globex"), &clock());

        let ids: Vec<String> = invoices.snapshot().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn update_for_unknown_id_is_applied_as_insert() {
        let invoices = InvoiceCollection::new();
        let event = ChangeEvent {
            kind: ChangeKind::Update,
            old: json!({}),
            new: row("a", "Acme"),
        };
        apply_change_event(&invoices, &event, &clock());
        assert_eq!(invoices.len(), 1);
    }

    #[test]
    fn delete_keys_off_the_old_payload() {
        let invoices = InvoiceCollection::new();
        apply_change_event(&invoices, &insert_event("a", "Acme"), &clock());

        let event = ChangeEvent {
            kind: ChangeKind::Delete,
            old: row("a", "Acme"),
            new: json!({}),
        };
        apply_change_event(&invoices, &event, &clock());
        assert!(invoices.is_empty());

        // Deleting an absent id is a no-op.
        apply_change_event(&invoices, &event, &clock());
        assert!(invoices.is_empty());
    }
}
