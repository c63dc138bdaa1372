//! Signal handling for graceful shutdown.

use tracing::{info, warn};

/// Wait for SIGINT, SIGTERM or SIGQUIT.
///
/// If a handler cannot be installed the function logs and waits on the
/// remaining signals instead of failing the run.
#[cfg(unix)]
pub async fn shutdown_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let install = |kind: SignalKind, name: &'static str| match signal(kind) {
        Ok(stream) => Some(stream),
        Err(e) => {
            warn!(signal = name, error = %e, "Failed to install signal handler");
            None
        }
    };

    let mut sigint = install(SignalKind::interrupt(), "SIGINT");
    let mut sigterm = install(SignalKind::terminate(), "SIGTERM");
    let mut sigquit = install(SignalKind::quit(), "SIGQUIT");

    async fn recv(stream: &mut Option<tokio::signal::unix::Signal>) {
        match stream {
            Some(s) => {
                s.recv().await;
            }
            None => std::future::pending::<()>().await,
        }
    }

    tokio::select! {
        _ = recv(&mut sigint) => info!(message = "Signal received.", signal = "SIGINT"),
        _ = recv(&mut sigterm) => info!(message = "Signal received.", signal = "SIGTERM"),
        _ = recv(&mut sigquit) => info!(message = "Signal received.", signal = "SIGQUIT"),
    }
}

/// Wait for Ctrl-C.
#[cfg(not(unix))]
pub async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    info!(message = "Signal received.", signal = "Ctrl-C");
}
