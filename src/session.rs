//! Application session: explicit lifecycle around the feed and the
//! orchestrator instead of ambient global state.
//!
//! Sign-in performs a fresh bulk load and goes live; sign-out tears the
//! subscription down and empties the collection. Re-authentication rebuilds
//! the collection from scratch.

use std::sync::Arc;

use crate::auth::AuthProvider;
use crate::clock::Clock;
use crate::collection::InvoiceCollection;
use crate::error::InvoiceError;
use crate::feed::{FeedState, InvoiceFeed};
use crate::gateway::MutationGateway;
use crate::orchestrator::InvoiceService;
use crate::store::InvoiceStore;

pub struct Session {
    auth: Arc<dyn AuthProvider>,
    store: Arc<dyn InvoiceStore>,
    clock: Arc<dyn Clock>,
    invoices: InvoiceCollection,
    service: InvoiceService,
    feed: Option<InvoiceFeed>,
}

impl Session {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        store: Arc<dyn InvoiceStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let invoices = InvoiceCollection::new();
        let gateway = MutationGateway::new(store.clone(), auth.clone());
        let service = InvoiceService::new(invoices.clone(), gateway, clock.clone());
        Self {
            auth,
            store,
            clock,
            invoices,
            service,
            feed: None,
        }
    }

    /// (Re)build the local collection for the current user and subscribe.
    /// Any previous subscription is released first.
    pub async fn sign_in(&mut self) -> Result<(), InvoiceError> {
        self.teardown_feed();
        let feed = InvoiceFeed::start(
            self.auth.clone(),
            self.store.clone(),
            self.clock.clone(),
            self.invoices.clone(),
        )
        .await?;
        self.feed = Some(feed);
        Ok(())
    }

    /// Release the subscription and empty the collection.
    pub fn sign_out(&mut self) {
        self.teardown_feed();
        self.invoices.clear();
        tracing::debug!("session signed out, local invoices cleared");
    }

    fn teardown_feed(&mut self) {
        if let Some(mut feed) = self.feed.take() {
            feed.shutdown();
        }
    }

    pub fn feed_state(&self) -> FeedState {
        self.feed
            .as_ref()
            .map_or(FeedState::Unsubscribed, InvoiceFeed::state)
    }

    pub fn invoices(&self) -> &InvoiceCollection {
        &self.invoices
    }

    pub fn service(&self) -> &InvoiceService {
        &self.service
    }
}
