//! Configuration building blocks shared by every floe binary.

mod component_key;
mod global;
mod loader;
mod path;
mod resource;
mod vars;

pub use component_key::ComponentKey;
pub use global::GlobalConfig;
pub use loader::{Mergeable, load_from_paths};
pub use path::{CliArgs, ConfigPath, is_yaml_file};
pub use resource::Resource;
pub use vars::{InterpolationResult, interpolate};

use serde::{Deserialize, Serialize};

use crate::metrics::DEFAULT_METRICS_ADDR;

/// Metrics configuration for the Prometheus endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Address to bind the metrics HTTP server.
    #[serde(default = "default_metrics_address")]
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            address: default_metrics_address(),
        }
    }
}

impl MetricsConfig {
    /// Take `other`'s address unless it is the default (last non-default wins).
    pub fn merge_from(&mut self, other: Self) {
        if other.address != DEFAULT_METRICS_ADDR {
            self.address = other.address;
        }
    }
}

fn default_metrics_address() -> String {
    DEFAULT_METRICS_ADDR.to_string()
}
