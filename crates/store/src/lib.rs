#![warn(clippy::unwrap_used)]

//! Segment persistence: a single named value with an explicit expiry,
//! scoped to the visitor's browser.
//!
//! # Modules
//!
//! - [`memory`] — in-process map, case-preserving
//! - [`cookie`] — `document.cookie`-style jar, upper-cases values on read
//! - [`local_storage`] — key/value storage with a `<key>_expiration` sentinel
//! - [`instrumented`] — wrapper counting reads and writes

pub mod cookie;
pub mod instrumented;
pub mod local_storage;
pub mod memory;

use std::sync::Arc;

use segmab_core::config::{StoreBackend, StoreSettings};
use segmab_core::Clock;

pub use cookie::{CookieJar, CookieStore, InMemoryCookieJar};
pub use instrumented::InstrumentedStore;
pub use local_storage::{InMemoryWebStorage, LocalStorageStore, WebStorage};
pub use memory::MemoryStore;

/// Durable key/value storage with explicit expiry.
///
/// Implementations must give read-after-write consistency within a call
/// stack and must never expose a value without its expiry (or the reverse).
pub trait SegmentStore: Send + Sync {
    /// Current value for `key`. Returns `None` when nothing was stored or the
    /// entry expired at or before now; expired entries are removed as a side
    /// effect.
    fn get(&self, key: &str) -> Option<String>;

    /// Store `value` under `key`, expiring `retention_days` days from now.
    fn set(&self, key: &str, value: &str, retention_days: u32);

    fn remove(&self, key: &str);
}

impl<S: SegmentStore + ?Sized> SegmentStore for Arc<S> {
    fn get(&self, key: &str) -> Option<String> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, retention_days: u32) {
        (**self).set(key, value, retention_days)
    }

    fn remove(&self, key: &str) {
        (**self).remove(key)
    }
}

/// Build the backend named by `settings`, backed by in-process storage.
///
/// `page_url` is only consulted by the cookie backend, to scope cookies to
/// the page's main domain when no explicit domain is configured.
pub fn open_store(
    settings: &StoreSettings,
    page_url: &str,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<Arc<dyn SegmentStore>> {
    let store: Arc<dyn SegmentStore> = match settings.backend {
        StoreBackend::Memory => Arc::new(MemoryStore::new(clock)),
        StoreBackend::LocalStorage => Arc::new(LocalStorageStore::new(
            InMemoryWebStorage::new(),
            clock,
        )),
        StoreBackend::Cookie => {
            let jar = InMemoryCookieJar::new(clock.clone());
            let store = match &settings.cookie_domain {
                Some(domain) => CookieStore::with_domain(jar, domain.clone(), clock),
                None => CookieStore::for_page_url(jar, page_url, clock)?,
            };
            Arc::new(store.with_path(settings.cookie_path.clone()))
        }
    };
    Ok(store)
}
