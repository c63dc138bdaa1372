//! Configuration for the floe change-stream watcher.

mod stream_key;

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use floe_core::config::{
    ConfigPath, GlobalConfig, InterpolationResult, Mergeable, MetricsConfig, Resource,
    interpolate, load_from_paths,
};
pub use floe_core::RetryConfig;
pub use stream_key::StreamKey;

use crate::error::ConfigError;
use crate::pipeline::StreamPipeline;
use floe_core::{AppConfig, PipelineContext};

fn default_duration_secs() -> u64 {
    600
}

fn default_heartbeat_interval_ms() -> u64 {
    300_000
}

/// Where a stream's rows come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Replay rows recorded in an NDJSON capture file.
    Captured { path: String },
}

/// Where a stream's records go.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SinkConfig {
    /// One JSON line per record on standard output.
    #[default]
    Stdout,
    /// One JSON line per record in a file, created or truncated on start.
    File { path: String },
}

impl SinkConfig {
    /// Exclusive resources claimed by this sink.
    pub fn resources(&self) -> Vec<Resource> {
        match self {
            SinkConfig::Stdout => vec![],
            SinkConfig::File { path } => vec![Resource::file(path)],
        }
    }
}

/// Resolved time range of a watch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// Configuration for one watched change stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StreamConfig {
    pub source: SourceConfig,
    /// First commit time to read. Defaults to the moment the run starts.
    #[serde(default)]
    pub start_timestamp: Option<DateTime<Utc>>,
    /// Exclusive end of the window. Defaults to start plus `duration_secs`.
    #[serde(default)]
    pub end_timestamp: Option<DateTime<Utc>>,
    #[serde(default = "default_duration_secs")]
    pub duration_secs: u64,
    /// Heartbeat interval requested from the database.
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Retry policy for opening partition queries.
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub sink: SinkConfig,
}

impl StreamConfig {
    pub fn new(source: SourceConfig) -> Self {
        Self {
            source,
            start_timestamp: None,
            end_timestamp: None,
            duration_secs: default_duration_secs(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            retry: RetryConfig::default(),
            sink: SinkConfig::default(),
        }
    }

    /// Resolve the watch window, using `now` for a missing start.
    pub fn window(&self, now: DateTime<Utc>) -> WatchWindow {
        let start = self.start_timestamp.unwrap_or(now);
        let end = self.end_timestamp.unwrap_or_else(|| {
            i64::try_from(self.duration_secs)
                .ok()
                .and_then(TimeDelta::try_seconds)
                .and_then(|duration| start.checked_add_signed(duration))
                .unwrap_or(DateTime::<Utc>::MAX_UTC)
        });
        WatchWindow { start, end }
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }

    /// Exclusive resources used by this stream.
    pub fn resources(&self) -> Vec<Resource> {
        self.sink.resources()
    }

    fn validate(&self, key: &StreamKey) -> Result<(), ConfigError> {
        let stream = key.id().to_string();

        match &self.source {
            SourceConfig::Captured { path } if path.trim().is_empty() => {
                return Err(ConfigError::InvalidSource {
                    stream,
                    message: "captured source needs a non-empty path".to_string(),
                });
            }
            SourceConfig::Captured { .. } => {}
        }

        if let SinkConfig::File { path } = &self.sink {
            if path.trim().is_empty() {
                return Err(ConfigError::InvalidSink {
                    stream,
                    message: "file sink needs a non-empty path".to_string(),
                });
            }
        }

        if let (Some(start), Some(end)) = (self.start_timestamp, self.end_timestamp) {
            if start > end {
                return Err(ConfigError::InvalidWindow {
                    stream,
                    message: format!("start_timestamp {start} is after end_timestamp {end}"),
                });
            }
        }

        if self.end_timestamp.is_none() && self.duration_secs == 0 {
            return Err(ConfigError::InvalidWindow {
                stream,
                message: "duration_secs must be positive when end_timestamp is not set".to_string(),
            });
        }

        if self.heartbeat_interval_ms == 0 {
            return Err(ConfigError::InvalidHeartbeat {
                stream,
                message: "heartbeat_interval_ms must be positive".to_string(),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidRetry {
                stream,
                message: "max_attempts must be at least 1".to_string(),
            });
        }

        if self.retry.initial_backoff_ms > self.retry.max_backoff_ms {
            return Err(ConfigError::InvalidRetry {
                stream,
                message: "initial_backoff_ms exceeds max_backoff_ms".to_string(),
            });
        }

        Ok(())
    }
}

/// Main configuration for floe.
///
/// # Example
///
/// ```yaml
/// streams:
///   orders:
///     source:
///       type: captured
///       path: ./orders.ndjson
///     start_timestamp: "2024-05-01T00:00:00Z"
///     duration_secs: 600
///     sink:
///       type: file
///       path: ./orders.out.ndjson
///   payments:
///     source:
///       type: captured
///       path: ./payments.ndjson
///
/// global:
///   max_concurrent_partitions: 64
///
/// metrics:
///   address: 0.0.0.0:9090
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Named stream configurations.
    #[serde(default)]
    pub streams: IndexMap<StreamKey, StreamConfig>,
    /// Global configuration options.
    #[serde(default)]
    pub global: GlobalConfig,
    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl Mergeable for Config {
    type Key = StreamKey;
    type Component = StreamConfig;

    fn components(&self) -> &IndexMap<Self::Key, Self::Component> {
        &self.streams
    }

    fn components_mut(&mut self) -> &mut IndexMap<Self::Key, Self::Component> {
        &mut self.streams
    }

    fn global(&self) -> &GlobalConfig {
        &self.global
    }

    fn global_mut(&mut self) -> &mut GlobalConfig {
        &mut self.global
    }

    fn metrics(&self) -> &MetricsConfig {
        &self.metrics
    }

    fn metrics_mut(&mut self) -> &mut MetricsConfig {
        &mut self.metrics
    }

    fn parse_yaml(contents: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(contents).map_err(|source| ConfigError::YamlParse { source })
    }
}

impl Config {
    /// Load configuration from multiple paths (files or directories).
    pub fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        let config: Self = load_from_paths(paths)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let result = interpolate(contents);
        if !result.is_ok() {
            return Err(ConfigError::EnvInterpolation {
                message: result.errors.join("\n"),
            });
        }

        let config = Self::parse_yaml(&result.text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// Checks:
    /// - At least one stream is configured and each one is usable
    /// - The global partition limit, when set, is positive
    /// - No two streams write the same file
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.streams.is_empty() {
            return Err(ConfigError::NoStreams);
        }

        for (key, stream) in &self.streams {
            stream.validate(key)?;
        }

        if self.global.max_concurrent_partitions == Some(0) {
            return Err(ConfigError::ZeroPartitionLimit);
        }

        let conflicts = Resource::conflicts(
            self.streams
                .iter()
                .map(|(key, config)| (key.id().to_string(), config.resources())),
        );

        if !conflicts.is_empty() {
            let message = conflicts
                .iter()
                .map(|(resource, keys)| {
                    let mut keys_list: Vec<_> = keys.iter().collect();
                    keys_list.sort();
                    format!("{} claimed by: {:?}", resource, keys_list)
                })
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ConfigError::ResourceConflict { message });
        }

        Ok(())
    }

    /// Iterate over all streams with their keys.
    pub fn streams(&self) -> impl Iterator<Item = (&StreamKey, &StreamConfig)> {
        self.streams.iter()
    }

    pub fn stream_count(&self) -> usize {
        self.streams.len()
    }
}

impl AppConfig for Config {
    type Pipeline = StreamPipeline;

    const COMPONENT_NAME: &'static str = "stream";

    fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        Config::from_paths(paths)
    }

    fn create_pipelines(&self, context: PipelineContext) -> Vec<StreamPipeline> {
        let now = Utc::now();
        self.streams
            .iter()
            .map(|(key, config)| StreamPipeline::new(key.clone(), config.clone(), now, context.clone()))
            .collect()
    }

    fn log_startup_info(&self) {
        info!(
            "Starting floe change-stream watcher with {} stream(s)",
            self.stream_count()
        );
        for (key, stream) in self.streams() {
            let SourceConfig::Captured { path } = &stream.source;
            let sink = match &stream.sink {
                SinkConfig::Stdout => "stdout".to_string(),
                SinkConfig::File { path } => path.clone(),
            };
            info!("  Stream: {} ({} -> {})", key, path, sink);
        }
    }
}
