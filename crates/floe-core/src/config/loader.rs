//! Loading and merging configuration from several files and directories.

use std::fmt::Display;
use std::hash::Hash;
use std::path::Path;

use indexmap::IndexMap;

use crate::config::{ConfigPath, GlobalConfig, MetricsConfig, interpolate, is_yaml_file};
use crate::error::ConfigError;

/// A configuration made of keyed components plus shared sections, which can
/// be assembled from several YAML documents.
pub trait Mergeable: Sized + Default {
    type Key: Eq + Hash + Clone + Display;
    type Component;

    fn components(&self) -> &IndexMap<Self::Key, Self::Component>;
    fn components_mut(&mut self) -> &mut IndexMap<Self::Key, Self::Component>;
    fn global(&self) -> &GlobalConfig;
    fn global_mut(&mut self) -> &mut GlobalConfig;
    fn metrics(&self) -> &MetricsConfig;
    fn metrics_mut(&mut self) -> &mut MetricsConfig;
    fn parse_yaml(contents: &str) -> Result<Self, ConfigError>;

    /// Fold `other` into `self`. The same component key may not appear twice.
    fn merge(&mut self, mut other: Self) -> Result<(), ConfigError> {
        let duplicates: Vec<String> = other
            .components()
            .keys()
            .filter(|key| self.components().contains_key(*key))
            .map(ToString::to_string)
            .collect();
        if !duplicates.is_empty() {
            return Err(ConfigError::DuplicateComponents { keys: duplicates });
        }

        let incoming = std::mem::take(other.components_mut());
        self.components_mut().extend(incoming);
        self.global_mut()
            .merge_from(std::mem::take(other.global_mut()));
        self.metrics_mut()
            .merge_from(std::mem::take(other.metrics_mut()));
        Ok(())
    }
}

/// Load and merge every path in order. Errors from all paths are collected.
pub fn load_from_paths<C: Mergeable>(paths: &[ConfigPath]) -> Result<C, ConfigError> {
    let mut config = C::default();
    let mut errors = Vec::new();

    for path in paths {
        let (location, loaded) = match path {
            ConfigPath::File(file) => (file, load_file::<C>(file)),
            ConfigPath::Dir(dir) => (dir, load_dir::<C>(dir)),
        };
        if let Err(e) = loaded.and_then(|partial| config.merge(partial)) {
            errors.push(format!("{}: {e}", location.display()));
        }
    }

    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::MultipleErrors { errors })
    }
}

fn load_file<C: Mergeable>(path: &Path) -> Result<C, ConfigError> {
    if !is_yaml_file(path) {
        return Err(ConfigError::UnsupportedFormat {
            path: path.to_path_buf(),
        });
    }

    let contents =
        std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile { source })?;

    let result = interpolate(&contents);
    if !result.is_ok() {
        return Err(ConfigError::EnvInterpolation {
            message: result.errors.join("\n"),
        });
    }

    C::parse_yaml(&result.text)
}

/// Load every YAML file directly inside `dir`, in file name order.
fn load_dir<C: Mergeable>(dir: &Path) -> Result<C, ConfigError> {
    let entries = std::fs::read_dir(dir).map_err(|source| ConfigError::ReadDir {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<_> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && is_yaml_file(path))
        .collect();
    files.sort();

    let mut config = C::default();
    let mut errors = Vec::new();
    for file in files {
        if let Err(e) = load_file::<C>(&file).and_then(|partial| config.merge(partial)) {
            errors.push(format!("{}: {e}", file.display()));
        }
    }

    if errors.is_empty() {
        Ok(config)
    } else {
        Err(ConfigError::MultipleErrors { errors })
    }
}
