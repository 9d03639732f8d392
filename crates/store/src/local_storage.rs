//! Segment store over browser local storage.
//!
//! Local storage has no native expiry, so each value is paired with a
//! `<key>_expiration` entry holding the epoch-millisecond expiry as a decimal
//! string. A value whose sentinel is missing or unreadable is treated as
//! expired.

use std::sync::Arc;

use dashmap::DashMap;
use segmab_core::types::MS_PER_DAY;
use segmab_core::Clock;
use tracing::{debug, warn};

use crate::SegmentStore;

const EXPIRATION_SUFFIX: &str = "_expiration";

/// Key/value storage shaped like `window.localStorage`.
pub trait WebStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

#[derive(Default)]
pub struct InMemoryWebStorage {
    items: DashMap<String, String>,
}

impl InMemoryWebStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl WebStorage for InMemoryWebStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.get(key).map(|v| v.value().clone())
    }

    fn set_item(&self, key: &str, value: &str) {
        self.items.insert(key.to_string(), value.to_string());
    }

    fn remove_item(&self, key: &str) {
        self.items.remove(key);
    }
}

impl<W: WebStorage + ?Sized> WebStorage for Arc<W> {
    fn get_item(&self, key: &str) -> Option<String> {
        (**self).get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) {
        (**self).set_item(key, value)
    }

    fn remove_item(&self, key: &str) {
        (**self).remove_item(key)
    }
}

pub struct LocalStorageStore<W> {
    storage: W,
    clock: Arc<dyn Clock>,
}

impl<W: WebStorage> LocalStorageStore<W> {
    pub fn new(storage: W, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub fn storage(&self) -> &W {
        &self.storage
    }

    fn expiration_key(key: &str) -> String {
        format!("{key}{EXPIRATION_SUFFIX}")
    }

    fn clear(&self, key: &str) {
        self.storage.remove_item(key);
        self.storage.remove_item(&Self::expiration_key(key));
    }
}

impl<W: WebStorage> SegmentStore for LocalStorageStore<W> {
    fn get(&self, key: &str) -> Option<String> {
        let expiration_key = Self::expiration_key(key);
        let Some(value) = self.storage.get_item(key) else {
            self.storage.remove_item(&expiration_key);
            return None;
        };

        let expires_at_ms = match self.storage.get_item(&expiration_key) {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(ms) => ms,
                Err(_) => {
                    warn!(key, sentinel = %raw, "unparsable expiration, discarding segment");
                    self.clear(key);
                    return None;
                }
            },
            None => {
                warn!(key, "segment stored without expiration, discarding");
                self.clear(key);
                return None;
            }
        };

        if self.clock.now_ms() >= expires_at_ms {
            debug!(key, expires_at_ms, "evicted expired segment");
            self.clear(key);
            return None;
        }
        Some(value)
    }

    fn set(&self, key: &str, value: &str, retention_days: u32) {
        let expires_at_ms = self.clock.now_ms() + i64::from(retention_days) * MS_PER_DAY;
        self.storage.set_item(key, value);
        self.storage
            .set_item(&Self::expiration_key(key), &expires_at_ms.to_string());
    }

    fn remove(&self, key: &str) {
        self.clear(key);
    }
}
