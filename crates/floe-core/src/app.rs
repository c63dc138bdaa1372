//! Application abstraction for reducing main.rs boilerplate.
//!
//! This module provides the `AppConfig` trait and `Application` struct so a
//! binary's `main` is a single `Application::<Config>::run()` call.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use crate::config::{CliArgs, ConfigPath, Mergeable};
use crate::error::ConfigError;
use crate::topology::{Pipeline, PipelineContext, RunReport, run_pipelines};
use crate::tracing::init_tracing;

/// Trait for application configurations that can be loaded and run.
///
/// `Mergeable` already provides `metrics()` and `global()`, which the
/// `Application` runner uses.
pub trait AppConfig: Mergeable + Sized {
    /// The pipeline type this config produces.
    type Pipeline: Pipeline;

    /// Human-readable name for components (e.g., "stream").
    const COMPONENT_NAME: &'static str;

    /// Load config from paths with validation.
    fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError>;

    /// Create pipelines from this config.
    fn create_pipelines(&self, context: PipelineContext) -> Vec<Self::Pipeline>;

    /// Log startup info (component count and details).
    fn log_startup_info(&self);
}

/// Application runner that handles the full startup lifecycle.
pub struct Application<C: AppConfig> {
    config: C,
}

impl<C: AppConfig> Application<C> {
    /// Full application lifecycle: parse args, load config, run pipelines.
    ///
    /// Exits with failure if the config cannot be loaded or any pipeline
    /// fails.
    pub fn run() -> ExitCode {
        init_tracing();

        let args = CliArgs::parse();
        let paths = args.config_paths();

        if paths.is_empty() {
            eprintln!("Error: no config files or directories specified");
            return ExitCode::FAILURE;
        }

        let source_count = paths.len();
        info!("Loading config from {source_count} source(s)");

        match Self::from_paths(&paths) {
            Ok(app) => app.execute(),
            Err(e) => {
                eprintln!("Failed to load config: {e}");
                ExitCode::FAILURE
            }
        }
    }

    /// Load config from paths (useful for testing).
    pub fn from_paths(paths: &[ConfigPath]) -> Result<Self, ConfigError> {
        let config = C::from_paths(paths)?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// Execute the application (after config is loaded).
    fn execute(self) -> ExitCode {
        self.config.log_startup_info();

        let runtime = match tokio::runtime::Runtime::new() {
            Ok(runtime) => runtime,
            Err(e) => {
                eprintln!("Failed to start async runtime: {e}");
                return ExitCode::FAILURE;
            }
        };
        let result = runtime.block_on(run_pipelines(
            &Mergeable::metrics(&self.config).address,
            Mergeable::global(&self.config),
            C::COMPONENT_NAME,
            |context| self.config.create_pipelines(context),
        ));

        exit_code(C::COMPONENT_NAME, result)
    }
}

fn exit_code<E: std::fmt::Display>(
    component: &str,
    result: Result<RunReport, E>,
) -> ExitCode {
    match result {
        Ok(report) if report.is_success() => ExitCode::SUCCESS,
        Ok(report) => {
            error!(
                failed = ?report.failed,
                "{} {}(s) failed", report.failed.len(), component
            );
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("{component} setup failed: {e}");
            ExitCode::FAILURE
        }
    }
}
