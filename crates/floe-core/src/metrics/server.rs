//! Prometheus recorder and HTTP endpoint.
//!
//! The recorder is installed once per process. `init_global` also serves
//! `/metrics` and `/health`; `init_test` installs the recorder only and
//! tolerates concurrent callers.

use axum::{Extension, Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use snafu::prelude::*;
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::error::{AlreadyInitializedSnafu, MetricsError, NotInitializedSnafu, PrometheusInitSnafu};

/// Default metrics address.
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:9090";

/// Histogram buckets (seconds) for partition query durations. Partitions live
/// from milliseconds (empty windows) up to the whole watch window.
const DURATION_BUCKETS: &[f64] = &[
    0.01, 0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 3600.0,
];

static CONTROLLER: OnceLock<MetricsController> = OnceLock::new();

/// Access to the installed Prometheus recorder.
pub struct MetricsController {
    handle: PrometheusHandle,
}

/// Install the recorder and serve it on `addr`.
///
/// # Errors
///
/// Fails if the recorder was already installed or cannot be built.
pub fn init_global(addr: SocketAddr) -> Result<(), MetricsError> {
    install()?;
    tokio::spawn(run_server(addr));
    info!(%addr, "Metrics server started");
    Ok(())
}

/// Install the recorder without an HTTP endpoint. Safe to call repeatedly
/// and from several test threads.
pub fn init_test() {
    if install().is_err() {
        while CONTROLLER.get().is_none() {
            std::hint::spin_loop();
        }
    }
}

fn install() -> Result<(), MetricsError> {
    let builder = PrometheusBuilder::new()
        .set_buckets(DURATION_BUCKETS)
        .context(PrometheusInitSnafu)?;
    let handle = builder.install_recorder().context(PrometheusInitSnafu)?;

    CONTROLLER
        .set(MetricsController { handle })
        .map_err(|_| AlreadyInitializedSnafu.build())
}

impl MetricsController {
    /// # Errors
    ///
    /// Returns an error if metrics have not been initialized.
    pub fn get() -> Result<&'static Self, MetricsError> {
        CONTROLLER.get().context(NotInitializedSnafu)
    }

    /// Render metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

async fn run_server(addr: SocketAddr) {
    let Ok(controller) = MetricsController::get() else {
        error!("Metrics server started before the recorder was installed");
        return;
    };

    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(Extension(controller.handle.clone()));

    let listener = match TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server to {}: {}", addr, e);
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app).await {
        error!("Metrics server error: {}", e);
    }
}

async fn metrics_handler(Extension(handle): Extension<PrometheusHandle>) -> String {
    handle.render()
}

async fn health_handler() -> &'static str {
    "ok\n"
}
