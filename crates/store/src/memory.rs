//! In-process segment store backed by DashMap. Case-preserving; values are
//! returned exactly as written.

use std::sync::Arc;

use dashmap::DashMap;
use segmab_core::{Clock, StoredAssignment};
use tracing::debug;

use crate::SegmentStore;

pub struct MemoryStore {
    entries: DashMap<String, StoredAssignment>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Raw entry including its expiry, expired or not.
    pub fn entry(&self, key: &str) -> Option<StoredAssignment> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Seed an entry with an explicit expiry.
    pub fn insert(&self, key: impl Into<String>, assignment: StoredAssignment) {
        self.entries.insert(key.into(), assignment);
    }

    /// Remove every expired entry. Reads already evict lazily; this is for
    /// hosts that want to bound memory.
    pub fn evict_expired(&self) -> usize {
        let now = self.clock.now_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl SegmentStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        let entry = self.entries.get(key)?;
        if entry.is_expired(self.clock.now_ms()) {
            drop(entry);
            self.entries.remove(key);
            debug!(key, "evicted expired segment");
            return None;
        }
        Some(entry.value.clone())
    }

    fn set(&self, key: &str, value: &str, retention_days: u32) {
        let assignment = StoredAssignment::new(value, self.clock.now_ms(), retention_days);
        self.entries.insert(key.to_string(), assignment);
    }

    fn remove(&self, key: &str) {
        self.entries.remove(key);
    }
}
