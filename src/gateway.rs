//! Remote mutation gateway.
//!
//! Issues create/update/delete against the backing store, scoped to the
//! authenticated user. Single-shot, no retry; failures surface to callers,
//! which own the rollback of any optimistic local change.

use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::error::InvoiceError;
use crate::invoice::Invoice;
use crate::mapper::{invoice_to_record, invoice_update_fields};
use crate::store::InvoiceStore;

#[derive(Clone)]
pub struct MutationGateway {
    store: Arc<dyn InvoiceStore>,
    auth: Arc<dyn AuthProvider>,
}

impl MutationGateway {
    pub fn new(store: Arc<dyn InvoiceStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self { store, auth }
    }

    /// Send the full invoice record tagged with the owner's identity.
    pub async fn create(&self, invoice: &Invoice) -> Result<(), InvoiceError> {
        let Some(user) = self.auth.current_user().await? else {
            tracing::warn!(invoice_id = %invoice.id, "create rejected: no user session");
            return Err(InvoiceError::NotAuthenticated);
        };
        self.store
            .insert(invoice_to_record(invoice, &user.id))
            .await
            .map_err(|e| {
                tracing::error!(invoice_id = %invoice.id, error = %e, "remote create failed");
                InvoiceError::RemoteWrite(e)
            })
    }

    /// Send all mutable fields keyed by id. A nonexistent id yields no error
    /// signal at this layer; callers must not rely on one for "not found".
    pub async fn update(&self, invoice: &Invoice) -> Result<(), InvoiceError> {
        if self.auth.current_user().await?.is_none() {
            tracing::warn!(invoice_id = %invoice.id, "update rejected: no user session");
            return Err(InvoiceError::NotAuthenticated);
        }
        self.store
            .update(&invoice.id, invoice_update_fields(invoice))
            .await
            .map_err(|e| {
                tracing::error!(invoice_id = %invoice.id, error = %e, "remote update failed");
                InvoiceError::RemoteWrite(e)
            })
    }

    /// Remove the record keyed by id. Same nonexistence caveat as `update`.
    pub async fn delete(&self, id: &str) -> Result<(), InvoiceError> {
        if self.auth.current_user().await?.is_none() {
            tracing::warn!(invoice_id = %id, "delete rejected: no user session");
            return Err(InvoiceError::NotAuthenticated);
        }
        self.store.delete(id).await.map_err(|e| {
            tracing::error!(invoice_id = %id, error = %e, "remote delete failed");
            InvoiceError::RemoteWrite(e)
        })
    }
}
