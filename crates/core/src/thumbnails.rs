//! In-memory thumbnail cache keyed by media identity.
//!
//! Entries are inserted only once their bytes are complete, so a reader sees
//! either nothing or a whole image. The cache is bounded: when full, the entry
//! that was least recently listed (put or refreshed) is evicted.

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

#[derive(Debug)]
struct Slot {
    bytes: Bytes,
    stamp: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, Slot>,
    /// stamp -> identity, oldest first.
    order: BTreeMap<u64, String>,
    next_stamp: u64,
}

impl Inner {
    fn bump(&mut self, identity: &str) -> bool {
        let stamp = self.next_stamp;
        let Some(slot) = self.entries.get_mut(identity) else {
            return false;
        };
        self.next_stamp += 1;
        self.order.remove(&slot.stamp);
        slot.stamp = stamp;
        self.order.insert(stamp, identity.to_string());
        true
    }
}

#[derive(Debug)]
pub struct ThumbnailCache {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl ThumbnailCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Replaces any existing entry and marks it most recently listed.
    pub fn put(&self, identity: impl Into<String>, bytes: impl Into<Bytes>) {
        let identity = identity.into();
        let bytes = bytes.into();
        let mut inner = self.inner.write();

        let stamp = inner.next_stamp;
        inner.next_stamp += 1;
        if let Some(old) = inner.entries.insert(identity.clone(), Slot { bytes, stamp }) {
            inner.order.remove(&old.stamp);
        }
        inner.order.insert(stamp, identity);

        while inner.entries.len() > self.capacity {
            let Some((_, evicted)) = inner.order.pop_first() else {
                break;
            };
            inner.entries.remove(&evicted);
            debug!(identity = %evicted, "evicted thumbnail");
        }
    }

    pub fn get(&self, identity: &str) -> Option<Bytes> {
        self.inner.read().entries.get(identity).map(|s| s.bytes.clone())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.inner.read().entries.contains_key(identity)
    }

    /// Marks a cached entry as most recently listed. Returns false on a miss.
    pub fn refresh(&self, identity: &str) -> bool {
        self.inner.write().bump(identity)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ThumbnailCache {
    fn default() -> Self {
        Self::new(64)
    }
}
