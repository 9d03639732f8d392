//! Analytics callouts — report `(dimension, segment)` to a tag manager or
//! analytics library after each resolution.

use parking_lot::Mutex;
use segmab_core::SegmentId;
use serde_json::{json, Value};
use tracing::debug;

/// Receives every resolved segment. Purely a side effect.
pub trait AnalyticsHook: Send + Sync {
    fn notify(&self, dimension: &str, segment: &SegmentId);
}

impl<F> AnalyticsHook for F
where
    F: Fn(&str, &SegmentId) + Send + Sync,
{
    fn notify(&self, dimension: &str, segment: &SegmentId) {
        self(dimension, segment)
    }
}

/// Records Google Tag Manager `dataLayer` pushes of the form
/// `{"event": <event_name>, <dimension>: <segment>}`.
pub struct DataLayerHook {
    event_name: String,
    pushes: Mutex<Vec<Value>>,
}

impl DataLayerHook {
    pub fn new(event_name: impl Into<String>) -> Self {
        Self {
            event_name: event_name.into(),
            pushes: Mutex::new(Vec::new()),
        }
    }

    pub fn pushes(&self) -> Vec<Value> {
        self.pushes.lock().clone()
    }

    /// Drain recorded pushes, e.g. to forward them to a page.
    pub fn take(&self) -> Vec<Value> {
        std::mem::take(&mut *self.pushes.lock())
    }
}

impl Default for DataLayerHook {
    fn default() -> Self {
        Self::new("segmab_segment")
    }
}

impl AnalyticsHook for DataLayerHook {
    fn notify(&self, dimension: &str, segment: &SegmentId) {
        let mut push = json!({ "event": self.event_name });
        push[dimension] = json!(segment.as_str());
        debug!(dimension, segment = %segment, "dataLayer push recorded");
        self.pushes.lock().push(push);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use segmab_core::Alphabet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_data_layer_push_shape() {
        let hook = DataLayerHook::default();
        let segment = Alphabet::new(3).get(1).cloned().unwrap();
        hook.notify("dimension4", &segment);

        let pushes = hook.take();
        assert_eq!(pushes.len(), 1);
        assert_eq!(pushes[0]["event"], "segmab_segment");
        assert_eq!(pushes[0]["dimension4"], "B");
        assert!(hook.pushes().is_empty());
    }

    #[test]
    fn test_closure_hook() {
        let calls = AtomicUsize::new(0);
        let hook = |dimension: &str, segment: &SegmentId| {
            assert_eq!(dimension, "d");
            assert_eq!(segment, &"A");
            calls.fetch_add(1, Ordering::SeqCst);
        };
        hook.notify("d", &Alphabet::new(2).get(0).cloned().unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
