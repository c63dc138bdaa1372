//! Command-line arguments and configuration path types.

use std::path::{Path, PathBuf};

use clap::Parser;

/// Where configuration comes from: one file, or every YAML file in a directory.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigPath {
    File(PathBuf),
    Dir(PathBuf),
}

impl ConfigPath {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::File(path.into())
    }

    pub fn dir(path: impl Into<PathBuf>) -> Self {
        Self::Dir(path.into())
    }
}

/// Check if a path has a YAML extension.
pub fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}

#[derive(Parser, Debug)]
#[command(version, about = "Watch a partitioned change stream and emit every record")]
pub struct CliArgs {
    /// Path to a configuration file (repeatable)
    #[arg(short, long)]
    pub config: Vec<PathBuf>,

    /// Path to a directory of configuration files (repeatable)
    #[arg(short = 'C', long = "config-dir")]
    pub config_dirs: Vec<PathBuf>,
}

impl CliArgs {
    /// Files first, then directories, each group in command-line order.
    pub fn config_paths(&self) -> Vec<ConfigPath> {
        self.config
            .iter()
            .map(ConfigPath::file)
            .chain(self.config_dirs.iter().map(ConfigPath::dir))
            .collect()
    }
}
