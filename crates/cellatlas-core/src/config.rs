//! Configuration
//!
//! One struct shared by the resolver, the HTTP client and the CLI. Loadable
//! from TOML; every field has a default so partial files work.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default measurement service endpoint
pub const DEFAULT_API_BASE_URL: &str = "https://api.atlasapprox.org/v1";

/// Cell atlas configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    /// Measurement service base URL
    pub api_base_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Pairs fetched for highest-measurement bar charts
    pub top_n: usize,
    /// Markers fetched per cell type
    pub marker_count: usize,
    /// Similar features fetched when the classifier did not attach them
    pub similar_count: usize,
    /// Cached cell-type lists
    pub cache_capacity: u64,
    /// Cell-type cache time to live in seconds
    pub cache_ttl_secs: u64,
    /// Unit label of average heatmaps and bar charts
    pub average_unit: String,
    /// Unit label of fraction-detected bubble heatmaps
    pub fraction_unit: String,
    /// Link returned for `link` intents
    pub reference_link: String,
}

impl AtlasConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document
    ///
    /// # Errors
    /// `ConfigError::Parse` on malformed TOML, `ConfigError::Invalid` on bad values
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file
    ///
    /// # Errors
    /// `ConfigError::Io` if the file cannot be read, otherwise as [`Self::from_toml_str`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Reject values the resolver cannot work with
    ///
    /// # Errors
    /// `ConfigError::Invalid` naming the first bad field
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_base_url.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        for (field, value) in [
            ("top_n", self.top_n),
            ("marker_count", self.marker_count),
            ("similar_count", self.similar_count),
        ] {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        Ok(())
    }

    /// With API base URL
    #[inline]
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// With highest-measurement depth
    #[inline]
    #[must_use]
    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    /// With marker count
    #[inline]
    #[must_use]
    pub fn with_marker_count(mut self, count: usize) -> Self {
        self.marker_count = count;
        self
    }

    /// With request timeout
    #[inline]
    #[must_use]
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout_secs: 30,
            top_n: 10,
            marker_count: 10,
            similar_count: 10,
            cache_capacity: 256,
            cache_ttl_secs: 600,
            average_unit: "counts per ten thousand".to_string(),
            fraction_unit: "counts per million".to_string(),
            reference_link: "https://atlasapprox.org".to_string(),
        }
    }
}
