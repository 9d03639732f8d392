//! Store wrapper that counts operations, both locally (for assertions) and
//! through the `metrics` facade.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::SegmentStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreCounters {
    pub reads: u64,
    pub hits: u64,
    pub writes: u64,
    pub removes: u64,
}

pub struct InstrumentedStore<S> {
    inner: S,
    reads: AtomicU64,
    hits: AtomicU64,
    writes: AtomicU64,
    removes: AtomicU64,
}

impl<S: SegmentStore> InstrumentedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            removes: AtomicU64::new(0),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn counters(&self) -> StoreCounters {
        StoreCounters {
            reads: self.reads.load(Ordering::Relaxed),
            hits: self.hits.load(Ordering::Relaxed),
            writes: self.writes.load(Ordering::Relaxed),
            removes: self.removes.load(Ordering::Relaxed),
        }
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

impl<S: SegmentStore> SegmentStore for InstrumentedStore<S> {
    fn get(&self, key: &str) -> Option<String> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("segment_store.read").increment(1);
        let value = self.inner.get(key);
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("segment_store.hit").increment(1);
        }
        value
    }

    fn set(&self, key: &str, value: &str, retention_days: u32) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("segment_store.write").increment(1);
        self.inner.set(key, value, retention_days);
    }

    fn remove(&self, key: &str) {
        self.removes.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("segment_store.remove").increment(1);
        self.inner.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use segmab_core::clock::manual_clock;

    #[test]
    fn test_counts_operations() {
        let store = InstrumentedStore::new(MemoryStore::new(manual_clock(0)));

        assert_eq!(store.get("k"), None);
        store.set("k", "A", 1);
        assert_eq!(store.get("k").as_deref(), Some("A"));
        store.remove("k");

        assert_eq!(
            store.counters(),
            StoreCounters {
                reads: 2,
                hits: 1,
                writes: 1,
                removes: 1,
            }
        );
        assert_eq!(store.inner().len(), 0);
    }
}
