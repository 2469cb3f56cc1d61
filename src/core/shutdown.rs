//! Termination-signal wait used by [`Runtime::run_until_signal`](crate::Runtime::run_until_signal).
//!
//! On unix the watchdog stops its components on any of `SIGINT`, `SIGTERM`
//! (what systemd and container runtimes send) or `SIGQUIT`. Other platforms
//! only get Ctrl-C.

/// Resolves on the first `SIGINT`, `SIGTERM` or `SIGQUIT`.
///
/// # Errors
/// Fails if a signal handler cannot be installed.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut int = signal(SignalKind::interrupt())?;
    let mut term = signal(SignalKind::terminate())?;
    let mut quit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = int.recv() => tracing::info!(signal = "SIGINT", "shutdown signal received"),
        _ = term.recv() => tracing::info!(signal = "SIGTERM", "shutdown signal received"),
        _ = quit.recv() => tracing::info!(signal = "SIGQUIT", "shutdown signal received"),
    }
    Ok(())
}

/// Resolves on Ctrl-C.
///
/// # Errors
/// Fails if the Ctrl-C handler cannot be installed.
#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await?;
    tracing::info!(signal = "ctrl-c", "shutdown signal received");
    Ok(())
}
