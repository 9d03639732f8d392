//! Segmentation engine: validates a per-call configuration, returns the
//! visitor's persisted segment or derives and persists a fresh one.

use std::sync::Arc;

use segmab_core::event_bus::{make_event, noop_sink, EventSink, SegmentEventType};
use segmab_core::types::{MAX_SEGMENTS, MIN_SEGMENTS};
use segmab_core::{Alphabet, Clock, ConfigError, SegmentConfig, SegmentId, SegmentResult};
use segmab_store::SegmentStore;
use tracing::{debug, info};

use crate::analytics::AnalyticsHook;

pub struct SegmentationEngine {
    store: Arc<dyn SegmentStore>,
    clock: Arc<dyn Clock>,
    event_sink: Arc<dyn EventSink>,
    analytics: Option<Arc<dyn AnalyticsHook>>,
}

impl SegmentationEngine {
    pub fn new(store: Arc<dyn SegmentStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            event_sink: noop_sink(),
            analytics: None,
        }
    }

    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Report every resolved segment to an analytics hook. The hook never
    /// influences which segment is returned.
    pub fn with_analytics(mut self, hook: Arc<dyn AnalyticsHook>) -> Self {
        self.analytics = Some(hook);
        self
    }

    /// Resolve the visitor's segment for `config`.
    ///
    /// A stored, unexpired segment that belongs to the current alphabet is
    /// returned as is, without a write. Anything else gets a freshly derived
    /// segment persisted for `config.days` days. Invalid configurations fail
    /// before the store is touched.
    pub fn get_segment(&self, config: &SegmentConfig) -> SegmentResult<SegmentId> {
        self.resolve(config, None::<fn(&SegmentId)>)
    }

    /// As [`get_segment`](Self::get_segment), additionally invoking
    /// `on_resolved` once with the resolved segment before returning.
    pub fn get_segment_with<F>(
        &self,
        config: &SegmentConfig,
        on_resolved: F,
    ) -> SegmentResult<SegmentId>
    where
        F: FnOnce(&SegmentId),
    {
        self.resolve(config, Some(on_resolved))
    }

    fn resolve<F>(
        &self,
        config: &SegmentConfig,
        on_resolved: Option<F>,
    ) -> SegmentResult<SegmentId>
    where
        F: FnOnce(&SegmentId),
    {
        config.validate()?;

        let storage_key = config.storage_key();
        let alphabet = config.alphabet();

        let existing = self.store.get(&storage_key);
        let reused = existing.as_deref().and_then(|raw| alphabet.find(raw)).cloned();

        let (segment, event_type) = match reused {
            Some(segment) => {
                debug!(key = %storage_key, segment = %segment, "reusing stored segment");
                (segment, SegmentEventType::Reused)
            }
            None => {
                if let Some(stale) = existing {
                    debug!(
                        key = %storage_key,
                        stored = %stale,
                        segments = config.segments_number,
                        "stored segment outside current alphabet"
                    );
                }
                let millis = self.clock.now().timestamp_subsec_millis();
                let segment = derive_segment(&alphabet, millis).ok_or_else(|| {
                    ConfigError::SegmentCountOutOfRange {
                        got: config.segments_number.to_string(),
                        min: MIN_SEGMENTS,
                        max: MAX_SEGMENTS,
                    }
                })?;
                self.store.set(&storage_key, segment.as_str(), config.days);
                info!(
                    key = %storage_key,
                    segment = %segment,
                    days = config.days,
                    "assigned visitor segment"
                );
                (segment, SegmentEventType::Assigned)
            }
        };

        self.event_sink.emit(make_event(
            event_type,
            storage_key,
            segment.clone(),
            config.days,
            self.clock.now(),
        ));
        if let Some(callback) = on_resolved {
            callback(&segment);
        }
        if let Some(hook) = &self.analytics {
            hook.notify(&config.dimension_name(), &segment);
        }

        Ok(segment)
    }
}

/// Pick a segment from the sub-second millisecond field of the clock.
///
/// The millisecond value is written in base `alphabet.len()` and its final
/// digit, read back in that base, indexes the alphabet. This spreads
/// visitors roughly evenly over the buckets; it is load balancing, not a
/// random number generator, and makes no unpredictability claims.
pub fn derive_segment(alphabet: &Alphabet, subsec_millis: u32) -> Option<SegmentId> {
    let radix = u32::try_from(alphabet.len()).ok().filter(|r| *r >= 2)?;
    let digit = last_digit_in_radix(subsec_millis, radix);
    alphabet.get(digit as usize).cloned()
}

/// Final digit of `value` written in base `radix`, as a number.
fn last_digit_in_radix(value: u32, radix: u32) -> u32 {
    value % radix
}
