/// Process shutdown: wait for Ctrl-C (or SIGTERM on unix), then stop the
/// listener so keep-awake and the status display are released before exit.

use crate::agent::{Agent, AgentError};
use std::future::Future;
use std::sync::Arc;

/// Resolves on the first Ctrl-C or, on unix, SIGTERM.
pub async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    res = tokio::signal::ctrl_c() => log_ctrl_c(res),
                    _ = term.recv() => log::info!("SIGTERM received, shutting down"),
                }
                return;
            }
            Err(e) => log::warn!("Failed to listen for SIGTERM: {e}"),
        }
    }
    log_ctrl_c(tokio::signal::ctrl_c().await);
}

fn log_ctrl_c(res: std::io::Result<()>) {
    match res {
        Ok(()) => log::info!("Ctrl-C received, shutting down"),
        Err(e) => log::error!("Failed to listen for Ctrl-C: {e}"),
    }
}

/// Run the listener until `shutdown` resolves, then stop it.
pub async fn listen(agent: Arc<Agent>, shutdown: impl Future<Output = ()>) -> Result<(), AgentError> {
    let starter = Arc::clone(&agent);
    tokio::task::spawn_blocking(move || starter.start()).await??;

    shutdown.await;

    let stopper = Arc::clone(&agent);
    tokio::task::spawn_blocking(move || stopper.stop()).await?;
    Ok(())
}
