//! The keyed value stores and the types held in them.
//!
//! A node carries two independent [`Store`]s: one over [`Item`] for plain
//! string values and one over [`Stream`]. The key namespaces are not
//! shared; TYPE is the only command that inspects both.

use std::collections::HashMap;
use std::fmt;

use jiff::Timestamp;
use tokio::sync::{Mutex, MutexGuard};

/// Sentinel expiry for items that never expire.
pub const NO_EXPIRY: i64 = -1;

/// Current wall clock in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    Timestamp::now().as_millisecond()
}

/// A string value with its type tag and absolute expiry.
///
/// `expiry` is milliseconds since the epoch, or [`NO_EXPIRY`]. The
/// `generation` tags the write so a deletion timer armed for this value
/// can tell whether the key has been overwritten since.
#[derive(Debug, Clone, PartialEq)]
pub struct Item {
    pub value: String,
    pub kind: String,
    pub expiry: i64,
    pub generation: u64,
}

impl Item {
    /// Builds an item from a relative TTL, converting it to an absolute
    /// timestamp against the current wall clock.
    pub fn with_ttl(value: String, ttl_ms: i64, generation: u64) -> Self {
        let expiry = if ttl_ms == NO_EXPIRY {
            NO_EXPIRY
        } else {
            now_millis() + ttl_ms
        };

        Item {
            value,
            kind: "string".to_string(),
            expiry,
            generation,
        }
    }

    /// Builds an item whose expiry is already absolute (RDB restore).
    pub fn expiring_at(value: String, expiry: i64, generation: u64) -> Self {
        Item {
            value,
            kind: "string".to_string(),
            expiry,
            generation,
        }
    }

    /// An item past its expiry must never be observable to readers, even
    /// when its deletion timer has not fired yet.
    pub fn is_expired(&self) -> bool {
        self.expiry != NO_EXPIRY && self.expiry < now_millis()
    }
}

/// A stream entry id, ordered as the `(ms, seq)` pair and rendered
/// `"<ms>-<seq>"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct StreamId {
    pub ms: u128,
    pub seq: u128,
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// One XADD-ed entry: its id plus the field-value pairs in the order the
/// client supplied them.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(String, String)>,
}

/// An append-ordered sequence of entries with strictly increasing ids.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stream {
    pub entries: Vec<StreamEntry>,
}

impl Stream {
    pub fn last_id(&self) -> Option<StreamId> {
        self.entries.last().map(|entry| entry.id)
    }
}

/// An unordered mapping from string keys to values of type `T` with
/// atomic load, store and delete. Every access takes the internal mutex.
#[derive(Debug)]
pub struct Store<T> {
    entries: Mutex<HashMap<String, T>>,
}

impl<T> Store<T> {
    pub fn new() -> Self {
        Store {
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn store(&self, key: String, value: T) {
        self.entries.lock().await.insert(key, value);
    }

    pub async fn load(&self, key: &str) -> Option<T>
    where
        T: Clone,
    {
        self.entries.lock().await.get(key).cloned()
    }

    pub async fn delete(&self, key: &str) {
        self.entries.lock().await.remove(key);
    }

    /// Removes the entry only while the stored value still satisfies the
    /// predicate, so a stale deletion timer cannot tear down a newer
    /// write under the same key.
    pub async fn delete_if<F>(&self, key: &str, predicate: F)
    where
        F: FnOnce(&T) -> bool,
    {
        let mut entries = self.entries.lock().await;

        if entries.get(key).is_some_and(predicate) {
            entries.remove(key);
        }
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.entries.lock().await.contains_key(key)
    }

    /// Direct access to the underlying map for compound operations that
    /// must read and mutate under one critical section (XADD, KEYS).
    pub async fn guard(&self) -> MutexGuard<'_, HashMap<String, T>> {
        self.entries.lock().await
    }
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}
