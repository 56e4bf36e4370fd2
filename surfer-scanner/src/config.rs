use crate::error::{Result, SurfError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_MAX_DEPTH: usize = 3;
pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
pub const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_RESULT_BUFFER: usize = 64;

/// Upper bound on workers; the relay inlet is sized from this too.
pub const MAX_CONCURRENCY: usize = 4096;
pub const MAX_RESULT_BUFFER: usize = 1 << 20;

/// Settings for a single traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurferConfig {
    pub start_url: String,
    pub max_depth: usize,
    pub max_concurrency: usize,
    /// How often the quiescence detector samples the pending-work counter.
    #[serde(rename = "sample_interval_ms", with = "millis")]
    pub sample_interval: Duration,
    /// Edges buffered between the workers and the consumer before workers block.
    pub result_buffer: usize,
}

impl Default for SurferConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            max_depth: DEFAULT_MAX_DEPTH,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
            result_buffer: DEFAULT_RESULT_BUFFER,
        }
    }
}

impl SurferConfig {
    pub fn new(start_url: impl Into<String>) -> Self {
        Self {
            start_url: start_url.into(),
            ..Self::default()
        }
    }

    pub fn with_start_url(mut self, start_url: impl Into<String>) -> Self {
        self.start_url = start_url.into();
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_concurrency(mut self, workers: usize) -> Self {
        self.max_concurrency = workers;
        self
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval;
        self
    }

    pub fn with_result_buffer(mut self, capacity: usize) -> Self {
        self.result_buffer = capacity;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.start_url.trim().is_empty() {
            return Err(SurfError::InvalidConfig("start URL is empty".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(SurfError::InvalidConfig(
                "max concurrency must be at least 1".to_string(),
            ));
        }
        if self.max_concurrency > MAX_CONCURRENCY {
            return Err(SurfError::InvalidConfig(format!(
                "max concurrency {} exceeds the limit of {}",
                self.max_concurrency, MAX_CONCURRENCY
            )));
        }
        if self.result_buffer == 0 {
            return Err(SurfError::InvalidConfig(
                "result buffer must hold at least one edge".to_string(),
            ));
        }
        if self.result_buffer > MAX_RESULT_BUFFER {
            return Err(SurfError::InvalidConfig(format!(
                "result buffer {} exceeds the limit of {}",
                self.result_buffer, MAX_RESULT_BUFFER
            )));
        }
        if self.sample_interval.is_zero() {
            return Err(SurfError::InvalidConfig(
                "sample interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
