//! Error types shared by floe binaries.
//!
//! Configuration, metrics and setup failures live here; change-stream errors
//! are defined next to the watcher.

use snafu::prelude::*;

// ============ Config Errors ============

/// Errors that can occur during configuration parsing and validation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// No streams were configured.
    #[snafu(display("No streams configured"))]
    NoStreams,

    /// A stream's time window cannot be resolved.
    #[snafu(display("Stream '{stream}' has an invalid time window: {message}"))]
    InvalidWindow { stream: String, message: String },

    /// A stream's requested heartbeat interval is unusable.
    #[snafu(display("Stream '{stream}' has an invalid heartbeat interval: {message}"))]
    InvalidHeartbeat { stream: String, message: String },

    /// A stream's source is incomplete.
    #[snafu(display("Stream '{stream}' has an invalid source: {message}"))]
    InvalidSource { stream: String, message: String },

    /// A stream's sink is incomplete.
    #[snafu(display("Stream '{stream}' has an invalid sink: {message}"))]
    InvalidSink { stream: String, message: String },

    /// Retry policy is unusable.
    #[snafu(display("Stream '{stream}' has an invalid retry policy: {message}"))]
    InvalidRetry { stream: String, message: String },

    /// The global partition limit must allow at least one partition.
    #[snafu(display("global.max_concurrent_partitions must be at least 1"))]
    ZeroPartitionLimit,

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// Failed to read configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },

    /// Two components claim the same exclusive resource.
    #[snafu(display("Resource conflict: {message}"))]
    ResourceConflict { message: String },

    /// Duplicate component keys found across config files.
    #[snafu(display("Duplicate component keys: {}", keys.join(", ")))]
    DuplicateComponents { keys: Vec<String> },

    /// Unsupported config file format.
    #[snafu(display("Unsupported config format for {}: only .yaml/.yml supported", path.display()))]
    UnsupportedFormat { path: std::path::PathBuf },

    /// Failed to read configuration directory.
    #[snafu(display("Failed to read directory {}", path.display()))]
    ReadDir {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    /// Multiple configuration errors occurred.
    #[snafu(display("Multiple config errors:\n{}", errors.join("\n")))]
    MultipleErrors { errors: Vec<String> },
}

// ============ Metrics Errors ============

/// Errors that can occur during metrics initialization.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum MetricsError {
    /// Failed to initialize Prometheus recorder.
    #[snafu(display("Failed to initialize Prometheus recorder"))]
    PrometheusInit {
        source: metrics_exporter_prometheus::BuildError,
    },

    /// Metrics server already initialized (double-init attempted).
    #[snafu(display("Metrics server already initialized"))]
    AlreadyInitialized,

    /// Metrics server not initialized (controller accessed before init).
    #[snafu(display("Metrics server not initialized"))]
    NotInitialized,
}

// ============ Pipeline Setup Errors ============

/// Errors that can occur before any pipeline starts running.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineSetupError {
    /// Failed to parse metrics address.
    #[snafu(display("Failed to parse metrics address: {source}"))]
    AddressParse { source: std::net::AddrParseError },

    /// Failed to initialize metrics.
    #[snafu(display("Failed to initialize metrics: {source}"))]
    Metrics { source: MetricsError },
}
