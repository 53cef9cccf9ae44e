//! Error taxonomy for the invoice sync core.
//!
//! Each layer gets its own `thiserror` enum; remote failures are caught at
//! the gateway call sites and never leave local state half-applied.

use thiserror::Error;

/// Backing-store rejection of a read or write.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store rejected write: {0}")]
    Rejected(String),
    #[error("store query failed: {0}")]
    Query(String),
    #[error("change subscription failed: {0}")]
    Subscription(String),
}

/// Auth-service failure while resolving the current session.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("auth service unreachable: {0}")]
    Unavailable(String),
}

/// Record-to-invoice mapping failure. Caller errors, never defaulted over.
#[derive(Debug, Clone, Error)]
pub enum MapError {
    #[error("record is missing required field '{0}'")]
    MissingField(&'static str),
    #[error("field '{field}' is not a valid calendar date: {value}")]
    BadDate { field: &'static str, value: String },
    #[error("amount is not numeric: {0}")]
    BadAmount(String),
    #[error("unknown invoice status '{0}'")]
    BadStatus(String),
}

/// Failure of an invoice operation exposed by the orchestrator or gateway.
#[derive(Debug, Error)]
pub enum InvoiceError {
    /// No resolvable user session; the operation was never committed locally.
    #[error("user is not authenticated")]
    NotAuthenticated,

    /// The backing store rejected the write. The optimistic local change has
    /// already been rolled back when this surfaces.
    #[error("remote write failed: {0}")]
    RemoteWrite(#[source] StoreError),

    /// Initial bulk load or channel open failed; the local collection is
    /// left empty and no subscription is held.
    #[error("subscription setup failed: {0}")]
    SubscriptionSetup(String),

    /// Input rejected before any local or remote effect.
    #[error("invalid field '{field}': {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },

    #[error(transparent)]
    Auth(#[from] AuthError),
}

/// Failure on the conversational-agent path.
#[derive(Debug, Error)]
pub enum AgentError {
    /// No credential configured; the chatbot surface disables itself.
    #[error("AI service unavailable: no API key configured")]
    Unavailable,

    #[error("agent request failed: {0}")]
    Http(String),

    #[error("unexpected agent response: {0}")]
    Protocol(String),

    /// The agent kept emitting function calls past the per-message bound.
    #[error("tool-call loop exceeded {0} rounds without a text reply")]
    ToolLoopExceeded(usize),
}

/// Environment/configuration parse failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}
