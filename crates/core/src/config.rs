use serde::Deserialize;

use crate::types::SegmentConfig;

/// Host-level settings. Loaded from environment variables with the prefix
/// `SEGMAB__` (e.g. `SEGMAB__EXPERIMENT__DAYS=14`) or an embedded TOML
/// document.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SegmabSettings {
    #[serde(default)]
    pub experiment: ExperimentSettings,
    #[serde(default)]
    pub store: StoreSettings,
}

/// Default experiment used when a page does not supply its own configuration.
/// Still validated on every call.
#[derive(Debug, Clone, Deserialize)]
pub struct ExperimentSettings {
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_segments_number")]
    pub segments_number: u32,
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default)]
    pub dimension: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Cookie,
    LocalStorage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    /// Cookie domain override. When unset the cookie store scopes cookies to
    /// the last two labels of the page host.
    #[serde(default)]
    pub cookie_domain: Option<String>,
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,
}

fn default_prefix() -> String {
    "segmab".to_string()
}
fn default_segments_number() -> u32 {
    2
}
fn default_days() -> u32 {
    30
}
fn default_backend() -> StoreBackend {
    StoreBackend::Cookie
}
fn default_cookie_path() -> String {
    "/".to_string()
}

impl Default for ExperimentSettings {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            segments_number: default_segments_number(),
            days: default_days(),
            dimension: None,
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            cookie_domain: None,
            cookie_path: default_cookie_path(),
        }
    }
}

impl SegmabSettings {
    /// Load settings from `SEGMAB__`-prefixed environment variables.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("SEGMAB")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Load settings from a TOML document, with environment variables
    /// layered on top.
    pub fn from_toml_str(toml: &str) -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix("SEGMAB")
                    .separator("__")
                    .try_parsing(true),
            );

        builder.build()?.try_deserialize()
    }

    pub fn default_segment_config(&self) -> SegmentConfig {
        SegmentConfig {
            prefix: self.experiment.prefix.clone(),
            segments_number: self.experiment.segments_number,
            days: self.experiment.days,
            dimension: self.experiment.dimension.clone(),
        }
    }
}
