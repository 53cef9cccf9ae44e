//! Backing-store abstraction: owner-scoped invoice rows plus a change-event
//! stream.
//!
//! The real deployment sits on a hosted relational store with row-level
//! security; this crate only depends on the [`InvoiceStore`] trait.
//! [`MemoryStore`] is the in-process implementation used for embedding and
//! tests, including scripted write failures.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::broadcast;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use crate::error::StoreError;

/// Kind of a server-pushed row change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Server-pushed notification of a row change.
///
/// Mirrors the wire shape of postgres change feeds: both payload sides are
/// always present as objects, and for deletes the `new` side is the *empty*
/// object while `old` carries the prior row.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub kind: ChangeKind,
    pub old: Value,
    pub new: Value,
}

impl ChangeEvent {
    /// The populated payload side.
    ///
    /// `new` is only trusted when it is a non-empty object; a delete's `new`
    /// is `{}`, which is still an object, so presence alone must never be
    /// used to pick the side.
    pub fn record(&self) -> Option<&Value> {
        match self.new.as_object() {
            Some(obj) if !obj.is_empty() => Some(&self.new),
            _ => match self.old.as_object() {
                Some(obj) if !obj.is_empty() => Some(&self.old),
                _ => None,
            },
        }
    }
}

/// Receiving end of the change subscription.
///
/// An infinite, non-restartable sequence consumed by exactly one handler;
/// dropping it releases the subscription and stops delivery.
pub struct ChangeFeed {
    rx: BroadcastStream<ChangeEvent>,
}

impl ChangeFeed {
    /// Next event, in arrival order. `None` once the store side is gone.
    pub async fn next_event(&mut self) -> Option<ChangeEvent> {
        loop {
            match self.rx.next().await {
                Some(Ok(event)) => return Some(event),
                Some(Err(BroadcastStreamRecvError::Lagged(missed))) => {
                    tracing::warn!(missed, "change feed lagged, events dropped");
                }
                None => return None,
            }
        }
    }
}

#[async_trait]
pub trait InvoiceStore: Send + Sync {
    /// Insert a full owner-tagged record.
    async fn insert(&self, record: Value) -> Result<(), StoreError>;

    /// Overwrite the mutable columns of the row keyed by `id`. A nonexistent
    /// id is not an error at this layer.
    async fn update(&self, id: &str, fields: Value) -> Result<(), StoreError>;

    /// Remove the row keyed by `id`. Same nonexistence caveat as `update`.
    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// All rows owned by `owner`, creation time descending.
    async fn list_for_owner(&self, owner: &str) -> Result<Vec<Value>, StoreError>;

    /// Open the change subscription for the invoices table.
    async fn subscribe(&self) -> Result<ChangeFeed, StoreError>;
}

/// In-memory store: rows plus a broadcast change channel.
pub struct MemoryStore {
    rows: Mutex<Vec<Value>>,
    events: broadcast::Sender<ChangeEvent>,
    seq: AtomicU64,
    write_calls: AtomicUsize,
    fail_next_write: Mutex<Option<String>>,
    fail_next_query: Mutex<Option<String>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            rows: Mutex::new(Vec::new()),
            events,
            seq: AtomicU64::new(0),
            write_calls: AtomicUsize::new(0),
            fail_next_write: Mutex::new(None),
            fail_next_query: Mutex::new(None),
        }
    }

    /// Make the next insert/update/delete fail with the given message.
    pub fn fail_next_write(&self, message: impl Into<String>) {
        *self.fail_next_write.lock().expect("store lock poisoned") = Some(message.into());
    }

    /// Make the next bulk query fail, for subscription-setup error paths.
    pub fn fail_next_query(&self, message: impl Into<String>) {
        *self.fail_next_query.lock().expect("store lock poisoned") = Some(message.into());
    }

    /// Number of write operations attempted, failed ones included.
    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    /// Push an externally originated change event, as another session's
    /// write would.
    pub fn emit(&self, event: ChangeEvent) {
        let _ = self.events.send(event);
    }

    fn take_write_failure(&self) -> Result<(), StoreError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        match self
            .fail_next_write
            .lock()
            .expect("store lock poisoned")
            .take()
        {
            Some(message) => Err(StoreError::Rejected(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl InvoiceStore for MemoryStore {
    async fn insert(&self, mut record: Value) -> Result<(), StoreError> {
        self.take_write_failure()?;
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        if let Some(obj) = record.as_object_mut() {
            obj.insert("created_at".to_string(), json!(seq));
        }
        self.rows
            .lock()
            .expect("store lock poisoned")
            .push(record.clone());
        let _ = self.events.send(ChangeEvent {
            kind: ChangeKind::Insert,
            old: json!({}),
            new: record,
        });
        Ok(())
    }

    async fn update(&self, id: &str, fields: Value) -> Result<(), StoreError> {
        self.take_write_failure()?;
        let mut rows = self.rows.lock().expect("store lock poisoned");
        let Some(row) = rows
            .iter_mut()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
        else {
            // Matching the backing store: updating a missing row is a no-op,
            // not an error callers can rely on.
            return Ok(());
        };
        let old = row.clone();
        if let (Some(target), Some(patch)) = (row.as_object_mut(), fields.as_object()) {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        let new = row.clone();
        drop(rows);
        let _ = self.events.send(ChangeEvent {
            kind: ChangeKind::Update,
            old,
            new,
        });
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.take_write_failure()?;
        let mut rows = self.rows.lock().expect("store lock poisoned");
        let Some(pos) = rows
            .iter()
            .position(|row| row.get("id").and_then(Value::as_str) == Some(id))
        else {
            return Ok(());
        };
        let old = rows.remove(pos);
        drop(rows);
        let _ = self.events.send(ChangeEvent {
            kind: ChangeKind::Delete,
            old,
            // The deleted row's replacement payload is empty on the wire.
            new: Value::Object(Map::new()),
        });
        Ok(())
    }

    async fn list_for_owner(&self, owner: &str) -> Result<Vec<Value>, StoreError> {
        if let Some(message) = self
            .fail_next_query
            .lock()
            .expect("store lock poisoned")
            .take()
        {
            return Err(StoreError::Query(message));
        }
        let rows = self.rows.lock().expect("store lock poisoned");
        let mut owned: Vec<Value> = rows
            .iter()
            .filter(|row| row.get("user_id").and_then(Value::as_str) == Some(owner))
            .cloned()
            .collect();
        owned.sort_by_key(|row| {
            std::cmp::Reverse(row.get("created_at").and_then(Value::as_u64).unwrap_or(0))
        });
        Ok(owned)
    }

    async fn subscribe(&self) -> Result<ChangeFeed, StoreError> {
        Ok(ChangeFeed {
            rx: BroadcastStream::new(self.events.subscribe()),
        })
    }
}
