//! Table-scoped change feeds.
//!
//! Every successful repository write publishes a row change to the hub;
//! subscribers receive insert/update/delete notifications for a table or
//! a single row. Each subscription is an independent feed: subscribing
//! twice to the same record opens two feeds, and cleanup is the caller's
//! responsibility via [`Subscription::unsubscribe`].

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::entities::Id;

const CHANNEL_CAPACITY: usize = 256;

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Raw change notification carried on a table channel
#[derive(Debug, Clone)]
pub struct RowChange {
    pub kind: ChangeKind,
    pub row_id: Id,
    pub new: Option<Value>,
    pub old: Option<Value>,
}

/// Typed change notification delivered to subscribers.
///
/// `new` carries the row after an insert or update; `old` carries the row
/// removed by a delete. Updates do not include the previous row.
#[derive(Debug, Clone)]
pub struct ChangeEvent<T> {
    pub kind: ChangeKind,
    pub new: Option<T>,
    pub old: Option<T>,
}

impl<T: DeserializeOwned> ChangeEvent<T> {
    pub(crate) fn decode(change: &RowChange) -> Self {
        let decode = |value: &Option<Value>| {
            value
                .as_ref()
                .and_then(|value| serde_json::from_value(value.clone()).ok())
        };
        Self {
            kind: change.kind,
            new: decode(&change.new),
            old: decode(&change.old),
        }
    }
}

/// Hub of per-table broadcast channels
pub struct ChangeFeedHub {
    channels: Mutex<HashMap<String, broadcast::Sender<RowChange>>>,
}

impl ChangeFeedHub {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn sender(&self, table: &str) -> broadcast::Sender<RowChange> {
        let mut channels = self
            .channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        channels
            .entry(table.to_owned())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Publish a row change on the table's channel. Dropped when nobody
    /// is listening.
    pub fn publish(&self, table: &str, change: RowChange) {
        let _ = self.sender(table).send(change);
    }

    /// Open a new receiver on the table's channel
    pub fn subscribe(&self, table: &str) -> broadcast::Receiver<RowChange> {
        self.sender(table).subscribe()
    }
}

impl Default for ChangeFeedHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle to one open change feed. Dropping the handle leaves the feed
/// running; call [`Subscription::unsubscribe`] to tear it down.
#[derive(Debug)]
pub struct Subscription {
    handle: Option<JoinHandle<()>>,
}

impl Subscription {
    pub(crate) fn active(handle: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
        }
    }

    /// Inert subscription returned when realtime is disabled
    pub(crate) fn disabled() -> Self {
        Self { handle: None }
    }

    /// Whether this subscription is backed by a running feed
    pub fn is_active(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Stop the feed
    pub fn unsubscribe(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
