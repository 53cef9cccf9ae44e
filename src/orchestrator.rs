//! Optimistic mutation orchestrator.
//!
//! The surface the UI and the chatbot bridge call. Every operation applies
//! its change to the local collection first, then confirms it remotely, and
//! on failure undoes exactly the entry it touched. The undo is structural
//! (reinsert/restore/remove of the single affected entry), never a blind
//! restore of a whole pre-mutation snapshot, so a late failure of one
//! mutation cannot clobber another in-flight mutation's optimistic state.

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::clock::Clock;
use crate::collection::InvoiceCollection;
use crate::error::InvoiceError;
use crate::gateway::MutationGateway;
use crate::invoice::{Invoice, NewInvoice, derive_status};

#[derive(Clone)]
pub struct InvoiceService {
    invoices: InvoiceCollection,
    gateway: MutationGateway,
    clock: Arc<dyn Clock>,
}

impl InvoiceService {
    pub fn new(invoices: InvoiceCollection, gateway: MutationGateway, clock: Arc<dyn Clock>) -> Self {
        Self {
            invoices,
            gateway,
            clock,
        }
    }

    pub fn invoices(&self) -> &InvoiceCollection {
        &self.invoices
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn validate(client_name: &str, amount: Decimal) -> Result<(), InvoiceError> {
        if client_name.trim().is_empty() {
            return Err(InvoiceError::InvalidField {
                field: "client_name",
                message: "client name must not be empty".to_string(),
            });
        }
        if amount < Decimal::ZERO {
            return Err(InvoiceError::InvalidField {
                field: "amount",
                message: "amount must not be negative".to_string(),
            });
        }
        Ok(())
    }

    /// Create an invoice: synthesize the id, derive the status when none is
    /// given, prepend locally, then confirm remotely. On remote failure the
    /// optimistic entry is removed and the error surfaces.
    ///
    /// A redundant insert event for the same id may follow a successful
    /// create; the feed's dedupe rule absorbs it.
    pub async fn create_invoice(&self, input: NewInvoice) -> Result<Invoice, InvoiceError> {
        Self::validate(&input.client_name, input.amount)?;

        let status = input
            .status
            .unwrap_or_else(|| derive_status(input.due_date, self.clock.today()));
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            client_name: input.client_name,
            amount: input.amount,
            issue_date: input.issue_date,
            due_date: input.due_date,
            status,
            observations: input.observations,
        };

        self.invoices.prepend(invoice.clone());
        if let Err(e) = self.gateway.create(&invoice).await {
            self.invoices.remove(&invoice.id);
            tracing::warn!(invoice_id = %invoice.id, error = %e, "optimistic create rolled back");
            return Err(e);
        }
        Ok(invoice)
    }

    /// Apply the given invoice over the entry with the matching id, then
    /// confirm remotely. On failure the prior value is restored in place.
    pub async fn update_invoice(&self, invoice: Invoice) -> Result<(), InvoiceError> {
        Self::validate(&invoice.client_name, invoice.amount)?;

        let prior = self.invoices.replace(invoice.clone());
        if let Err(e) = self.gateway.update(&invoice).await {
            // With no prior value the optimistic step touched nothing, so
            // there is nothing to put back.
            if let Some(prior) = prior {
                self.invoices.replace(prior);
            }
            tracing::warn!(invoice_id = %invoice.id, error = %e, "optimistic update rolled back");
            return Err(e);
        }
        Ok(())
    }

    /// Remove the entry immediately, then confirm remotely. On failure the
    /// entry is reinserted at the slot it occupied.
    pub async fn delete_invoice(&self, id: &str) -> Result<(), InvoiceError> {
        let removed = self.invoices.remove(id);
        if let Err(e) = self.gateway.delete(id).await {
            if let Some((index, invoice)) = removed {
                self.invoices.insert_at(index, invoice);
            }
            tracing::warn!(invoice_id = %id, error = %e, "optimistic delete rolled back");
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use crate::auth::StaticAuth;
    use crate::clock::FixedClock;
    use crate::collection::InvoiceCollection;
    use crate::error::InvoiceError;
    use crate::gateway::MutationGateway;
    use crate::invoice::{Invoice, InvoiceStatus, NewInvoice};
    use crate::store::{InvoiceStore, MemoryStore};

    use super::InvoiceService;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn service() -> (InvoiceService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let gateway = MutationGateway::new(store.clone(), Arc::new(StaticAuth::signed_in("u-1")));
        let service = InvoiceService::new(
            InvoiceCollection::new(),
            gateway,
            Arc::new(FixedClock(date(2024, 1, 2))),
        );
        (service, store)
    }

    fn new_invoice(client: &str, due: NaiveDate) -> NewInvoice {
        NewInvoice {
            client_name: client.to_string(),
            amount: dec!(150.00),
            issue_date: date(2024, 1, 1),
            due_date: due,
            status: None,
            observations: String::new(),
        }
    }

    #[tokio::test]
    async fn create_derives_pending_for_future_due_date() {
        let (service, store) = service();
        let invoice = service
            .create_invoice(new_invoice("Acme", date(2099, 1, 1)))
            .await
            .expect("creates");

        assert_eq!(invoice.status, InvoiceStatus::Pending);
        assert_eq!(invoice.amount, dec!(150.00));
        assert_eq!(service.invoices().len(), 1);
        assert_eq!(store.write_calls(), 1);

        let rows = store.list_for_owner("u-1").await.expect("list");
        assert_eq!(rows[0]["id"], invoice.id.as_str());
        assert_eq!(rows[0]["client_name"], "Acme");
    }

    #[tokio::test]
    async fn create_derives_overdue_for_past_due_date() {
        let (service, _) = service();
        let invoice = service
            .create_invoice(new_invoice("Acme", date(2023, 12, 31)))
            .await
            .expect("creates");
        assert_eq!(invoice.status, InvoiceStatus::Overdue);
    }

    #[tokio::test]
    async fn failed_create_restores_the_collection_exactly() {
        let (service, store) = service();
        let existing = service
            .create_invoice(new_invoice("Acme", date(2099, 1, 1)))
            .await
            .expect("creates");
        let before = service.invoices().snapshot();

        store.fail_next_write("constraint violation");
        let err = service
            .create_invoice(new_invoice("Globex", date(2099, 1, 1)))
            .await
            .expect_err("must fail");
        assert!(matches!(err, InvoiceError::RemoteWrite(_)));
        assert_eq!(service.invoices().snapshot(), before);
        assert_eq!(before[0].id, existing.id);
    }

    #[tokio::test]
    async fn failed_update_restores_the_prior_value_in_place() {
        let (service, store) = service();
        service
            .create_invoice(new_invoice("Zeta", date(2099, 1, 1)))
            .await
            .expect("creates");
        let target = service
            .create_invoice(new_invoice("Acme", date(2099, 1, 1)))
            .await
            .expect("creates");
        let before = service.invoices().snapshot();

        let mut edited = target.clone();
        edited.client_name = "Acme Corp".to_string();
        edited.amount = dec!(999);
        store.fail_next_write("rejected");
        service
            .update_invoice(edited)
            .await
            .expect_err("must fail");
        assert_eq!(service.invoices().snapshot(), before);
    }

    #[tokio::test]
    async fn failed_delete_reinserts_at_the_original_slot() {
        let (service, store) = service();
        for client in ["A", "B", "C"] {
            service
                .create_invoice(new_invoice(client, date(2099, 1, 1)))
                .await
                .expect("creates");
        }
        let before = service.invoices().snapshot();
        let middle = before[1].id.clone();

        store.fail_next_write("rejected");
        service
            .delete_invoice(&middle)
            .await
            .expect_err("must fail");
        assert_eq!(service.invoices().snapshot(), before);
    }

    #[tokio::test]
    async fn late_rollback_does_not_clobber_a_newer_mutation() {
        // Two back-to-back mutations on different entries: the first one's
        // failure must undo only its own entry.
        let (service, store) = service();
        let a = service
            .create_invoice(new_invoice("A", date(2099, 1, 1)))
            .await
            .expect("creates");
        let b = service
            .create_invoice(new_invoice("B", date(2099, 1, 1)))
            .await
            .expect("creates");

        let mut b_edit = b.clone();
        b_edit.client_name = "B prime".to_string();
        service.update_invoice(b_edit).await.expect("updates");

        store.fail_next_write("rejected");
        service.delete_invoice(&a.id).await.expect_err("must fail");

        let snapshot = service.invoices().snapshot();
        assert!(snapshot.iter().any(|i| i.id == a.id));
        assert_eq!(
            snapshot
                .iter()
                .find(|i| i.id == b.id)
                .expect("b present")
                .client_name,
            "B prime"
        );
    }

    #[tokio::test]
    async fn empty_client_name_is_rejected_before_any_effect() {
        let (service, store) = service();
        let err = service
            .create_invoice(new_invoice("  ", date(2099, 1, 1)))
            .await
            .expect_err("must fail");
        assert!(matches!(err, InvoiceError::InvalidField { .. }));
        assert!(service.invoices().is_empty());
        assert_eq!(store.write_calls(), 0);
    }
}
