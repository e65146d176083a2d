//! Process termination signals (Ctrl-C and SIGTERM).
use anyhow::Result;
use tokio::signal;
use tracing::{error, info};

/// Signal listeners registered up front, so a SIGTERM that arrives before
/// anyone awaits it is queued instead of killing the process.
pub struct ShutdownSignals {
    #[cfg(unix)]
    sigterm: signal::unix::Signal,
}

impl ShutdownSignals {
    pub fn install() -> Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            sigterm: signal::unix::signal(signal::unix::SignalKind::terminate())?,
        })
    }

    /// Resolves on the first Ctrl-C or SIGTERM.
    pub async fn recv(mut self) {
        tokio::select! {
            _ = wait_ctrl_c() => info!("received Ctrl-C"),
            _ = self.wait_sigterm() => info!("received SIGTERM"),
        }
    }

    #[cfg(unix)]
    async fn wait_sigterm(&mut self) {
        self.sigterm.recv().await;
    }

    #[cfg(not(unix))]
    async fn wait_sigterm(&mut self) {
        std::future::pending::<()>().await
    }
}

async fn wait_ctrl_c() {
    if let Err(err) = signal::ctrl_c().await {
        error!(?err, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await
    }
}
