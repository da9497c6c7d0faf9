use tokio_util::sync::CancellationToken;
use tracing::info;

/// Process-wide shutdown handle. Cloned into every loop; the signal listener
/// cancels it on SIGINT/SIGTERM and the current unit of work runs to its next
/// cancellation check.
#[derive(Clone, Default)]
pub struct Shutdown {
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Spawn the signal listener. Safe to call once per process.
    pub fn listen(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            let ctrl_c = tokio::signal::ctrl_c();
            #[cfg(unix)]
            {
                let mut sigterm = match tokio::signal::unix::signal(
                    tokio::signal::unix::SignalKind::terminate(),
                ) {
                    Ok(s) => s,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to install SIGTERM handler");
                        let _ = ctrl_c.await;
                        token.cancel();
                        return;
                    }
                };
                tokio::select! {
                    _ = ctrl_c => info!("SIGINT received, shutting down"),
                    _ = sigterm.recv() => info!("SIGTERM received, shutting down"),
                }
            }
            #[cfg(not(unix))]
            {
                let _ = ctrl_c.await;
                info!("Ctrl-C received, shutting down");
            }
            token.cancel();
        });
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves when shutdown is requested.
    pub async fn requested(&self) {
        self.token.cancelled().await;
    }

    /// Request shutdown programmatically (used by tests and `--once` runs).
    pub fn request(&self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_flips_flag() {
        let shutdown = Shutdown::new();
        assert!(!shutdown.is_requested());
        shutdown.request();
        assert!(shutdown.is_requested());
        shutdown.requested().await; // resolves immediately
    }
}
