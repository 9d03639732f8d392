#![warn(clippy::unwrap_used)]

//! Visitor segmentation for A/B/n tests — assigns each visitor one of N
//! segments, keeps it for the retention window, and hands it back on every
//! page load.
//!
//! # Modules
//!
//! - [`engine`] — validation, lookup, derivation and persistence
//! - [`queue`] — commands issued before the engine is ready, replayed on attach
//! - [`analytics`] — `(dimension, segment)` callouts to tag managers

pub mod analytics;
pub mod engine;
pub mod queue;

pub use analytics::{AnalyticsHook, DataLayerHook};
pub use engine::{derive_segment, SegmentationEngine};
pub use queue::{CommandQueue, QueueOutcome, SegmentCommand};

pub use segmab_core::{ConfigError, SegmentConfig, SegmentId, SegmentResult};
