#![warn(clippy::unwrap_used)]

//! Shared types for visitor segmentation: per-call experiment configuration,
//! the segment alphabet, the error taxonomy, the clock abstraction and the
//! assignment event bus.

pub mod clock;
pub mod config;
pub mod error;
pub mod event_bus;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use crate::config::SegmabSettings;
pub use error::{ConfigError, SegmentResult};
pub use types::{Alphabet, SegmentConfig, SegmentId, StoredAssignment};
