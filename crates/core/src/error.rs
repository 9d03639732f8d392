use thiserror::Error;

pub type SegmentResult<T> = Result<T, ConfigError>;

/// Rejected experiment configuration. Raised before any storage access so
/// a failed call never leaves a partial write behind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("empty prefix: the `prefix` parameter must be a non-empty string")]
    EmptyPrefix,

    #[error(
        "segment count out of range: the `segments_number` parameter must be an integer between {min} and {max}, got {got}"
    )]
    SegmentCountOutOfRange { got: String, min: u32, max: u32 },

    #[error("invalid retention: the `days` parameter must be an integer greater than zero, got {got}")]
    InvalidRetention { got: String },

    #[error("malformed command: {0}")]
    MalformedCommand(String),
}

impl ConfigError {
    /// Name of the configuration parameter the error refers to.
    pub fn parameter(&self) -> &'static str {
        match self {
            ConfigError::EmptyPrefix => "prefix",
            ConfigError::SegmentCountOutOfRange { .. } => "segments_number",
            ConfigError::InvalidRetention { .. } => "days",
            ConfigError::MalformedCommand(_) => "command",
        }
    }
}
