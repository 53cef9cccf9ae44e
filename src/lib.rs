//! Realtime invoice synchronization core.
//!
//! Keeps a local, ordered view of one owner's invoices consistent with a
//! remote relational store under concurrent local edits and server-pushed
//! change events:
//!
//! - [`mapper`]: wire-record <-> invoice translation with defaulting rules
//! - [`gateway`]: owner-scoped create/update/delete against the store
//! - [`feed`]: bulk load plus live change-event application
//! - [`orchestrator`]: optimistic mutations with rollback on remote failure
//! - [`agent`]: the AI tool-call bridge exposing the same operations
//!
//! The backing store, auth service, and conversational agent are consumed
//! through traits; [`store::MemoryStore`] and [`auth::StaticAuth`] serve
//! embedding and tests.

pub mod agent;
pub mod auth;
pub mod clock;
pub mod collection;
pub mod config;
pub mod error;
pub mod feed;
pub mod gateway;
pub mod invoice;
pub mod mapper;
pub mod orchestrator;
pub mod session;
pub mod stats;
pub mod store;
pub mod telemetry;

pub use auth::{AuthProvider, AuthUser};
pub use clock::{Clock, FixedClock, SystemClock};
pub use collection::InvoiceCollection;
pub use error::{AgentError, InvoiceError, MapError, StoreError};
pub use feed::{FeedState, InvoiceFeed};
pub use gateway::MutationGateway;
pub use invoice::{Invoice, InvoiceStatus, NewInvoice};
pub use orchestrator::InvoiceService;
pub use session::Session;
pub use store::{ChangeEvent, ChangeKind, InvoiceStore, MemoryStore};
