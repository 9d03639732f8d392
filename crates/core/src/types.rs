//! Experiment configuration, segment ids and the alphabet they are drawn from.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, SegmentResult};

/// Smallest number of segments an experiment may split visitors into.
pub const MIN_SEGMENTS: u32 = 2;
/// Largest number of segments; one per base-36 letter.
pub const MAX_SEGMENTS: u32 = 26;
/// Milliseconds in one retention day.
pub const MS_PER_DAY: i64 = 86_400_000;
/// Appended to the experiment prefix to form the storage key.
pub const STORAGE_KEY_SUFFIX: &str = "VisitorSegment";

/// Single-character bucket identifier, e.g. `"A"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SegmentId(String);

impl SegmentId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for SegmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SegmentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for SegmentId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Ordered set of valid segment ids for a segment count.
///
/// Ids are the base-36 digits that follow the decimal digits, upper-cased:
/// a count of 3 yields `A, B, C`; a count of 26 yields `A..=Z`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    ids: Vec<SegmentId>,
}

impl Alphabet {
    /// Build the alphabet for `count` segments. Counts above
    /// [`MAX_SEGMENTS`] are truncated to the 26 available letters; callers
    /// validate the count first.
    pub fn new(count: u32) -> Self {
        let ids = (10..10 + count.min(MAX_SEGMENTS))
            .filter_map(|digit| char::from_digit(digit, 36))
            .map(|c| SegmentId(c.to_ascii_uppercase().to_string()))
            .collect();
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&SegmentId> {
        self.ids.get(index)
    }

    /// Look up a raw stored value. Comparison is exact.
    pub fn find(&self, raw: &str) -> Option<&SegmentId> {
        self.ids.iter().find(|id| id.as_str() == raw)
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.find(raw).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SegmentId> {
        self.ids.iter()
    }
}

/// Per-call experiment configuration.
///
/// Every call carries its own complete configuration; nothing is merged
/// across calls. Construct freely, then [`validate`](Self::validate) (the
/// engine always does before touching storage).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    #[serde(alias = "namePrefix")]
    pub prefix: String,
    #[serde(alias = "segmentCount")]
    pub segments_number: u32,
    #[serde(alias = "retentionDays")]
    pub days: u32,
    /// Analytics dimension the assignment is reported under. Defaults to the
    /// storage key when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimension: Option<String>,
}

impl SegmentConfig {
    pub fn new(prefix: impl Into<String>, segments_number: u32, days: u32) -> Self {
        Self {
            prefix: prefix.into(),
            segments_number,
            days,
            dimension: None,
        }
    }

    pub fn with_dimension(mut self, dimension: impl Into<String>) -> Self {
        self.dimension = Some(dimension.into());
        self
    }

    pub fn validate(&self) -> SegmentResult<()> {
        if self.prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if !(MIN_SEGMENTS..=MAX_SEGMENTS).contains(&self.segments_number) {
            return Err(count_out_of_range(self.segments_number.to_string()));
        }
        if self.days == 0 {
            return Err(ConfigError::InvalidRetention {
                got: self.days.to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate an untyped configuration object, as queued by a
    /// page before the engine attached. Wrong JSON types and fractional
    /// numbers are rejected with the same error as out-of-range values.
    pub fn from_value(value: &Value) -> SegmentResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            ConfigError::MalformedCommand(format!("expected a configuration object, got {value}"))
        })?;
        let field = |name: &str, alias: &str| obj.get(name).or_else(|| obj.get(alias));

        let prefix = match field("prefix", "namePrefix") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            _ => return Err(ConfigError::EmptyPrefix),
        };

        let segments_number = match field("segments_number", "segmentCount") {
            Some(v) => match as_whole_number(v) {
                Some(n) if (i64::from(MIN_SEGMENTS)..=i64::from(MAX_SEGMENTS)).contains(&n) => {
                    n as u32
                }
                _ => return Err(count_out_of_range(v.to_string())),
            },
            None => return Err(count_out_of_range("nothing".into())),
        };

        let days = match field("days", "retentionDays") {
            Some(v) => match as_whole_number(v) {
                Some(n) if n > 0 && n <= i64::from(u32::MAX) => n as u32,
                _ => return Err(ConfigError::InvalidRetention { got: v.to_string() }),
            },
            None => {
                return Err(ConfigError::InvalidRetention {
                    got: "nothing".into(),
                })
            }
        };

        let dimension = match field("dimension", "dimensionName") {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };

        Ok(Self {
            prefix,
            segments_number,
            days,
            dimension,
        })
    }

    /// Key the assignment is persisted under: `<prefix>VisitorSegment`.
    pub fn storage_key(&self) -> String {
        format!("{}{}", self.prefix, STORAGE_KEY_SUFFIX)
    }

    pub fn dimension_name(&self) -> String {
        self.dimension.clone().unwrap_or_else(|| self.storage_key())
    }

    pub fn alphabet(&self) -> Alphabet {
        Alphabet::new(self.segments_number)
    }

    /// Retention window in milliseconds.
    pub fn retention_ms(&self) -> i64 {
        i64::from(self.days) * MS_PER_DAY
    }
}

/// A persisted assignment and the instant it stops being valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredAssignment {
    pub value: String,
    pub expires_at_ms: i64,
}

impl StoredAssignment {
    pub fn new(value: impl Into<String>, now_ms: i64, retention_days: u32) -> Self {
        Self {
            value: value.into(),
            expires_at_ms: now_ms + i64::from(retention_days) * MS_PER_DAY,
        }
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        now_ms >= self.expires_at_ms
    }
}

fn count_out_of_range(got: String) -> ConfigError {
    ConfigError::SegmentCountOutOfRange {
        got,
        min: MIN_SEGMENTS,
        max: MAX_SEGMENTS,
    }
}

fn as_whole_number(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(i) = n.as_i64() {
        return Some(i);
    }
    let f = n.as_f64()?;
    (f.fract() == 0.0 && f.abs() < i64::MAX as f64).then_some(f as i64)
}
