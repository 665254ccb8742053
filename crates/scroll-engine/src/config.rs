//! Scroller Configuration
//!
//! Options are merged shallowly over the defaults: keys the caller provides
//! replace the default value outright and unknown keys are ignored.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ScrollError;

/// Scroller configuration options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollerConfig {
    /// CSS class applied to the transient placeholder node
    #[serde(alias = "placeholderClass")]
    pub placeholder_class: String,

    /// Quiet period that must follow a burst of scroll events before a check
    #[serde(rename = "debounce_ms", alias = "debounceMs", with = "millis")]
    pub debounce: Duration,

    /// Distance (px) from the viewport's bottom edge that counts as "near"
    pub threshold: f64,

    /// Fetch the page after each appended page ahead of time
    pub prefetch: bool,

    /// Share one in-flight request between concurrent callers for a page
    #[serde(alias = "coalesceRequests")]
    pub coalesce_requests: bool,
}

impl Default for ScrollerConfig {
    fn default() -> Self {
        Self {
            placeholder_class: "placeholder".to_string(),
            debounce: Duration::from_millis(100),
            threshold: 50.0,
            prefetch: true,
            coalesce_requests: false,
        }
    }
}

impl ScrollerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON options object over the defaults
    pub fn from_json(json: &str) -> Result<Self, ScrollError> {
        serde_json::from_str(json).map_err(|e| ScrollError::Config(e.to_string()))
    }

    pub fn placeholder_class(mut self, class: &str) -> Self {
        self.placeholder_class = class.to_string();
        self
    }

    pub fn debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn prefetch(mut self, prefetch: bool) -> Self {
        self.prefetch = prefetch;
        self
    }

    pub fn coalesce_requests(mut self, coalesce: bool) -> Self {
        self.coalesce_requests = coalesce;
        self
    }
}

/// Durations as integer milliseconds
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
