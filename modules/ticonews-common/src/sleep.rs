use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::shutdown::Shutdown;

/// Default quantum for the synchronizer and downloader loops.
pub const DEFAULT_QUANTUM: Duration = Duration::from_secs(1);

/// Sleep until `deadline` (wall clock), waking every `quantum` to re-check
/// the clock and the shutdown flag.
///
/// Wall time is re-read each quantum: a long host suspension shortens the
/// remaining wait instead of extending it, and shutdown latency is bounded by
/// one quantum. Returns `false` if shutdown was requested before the
/// deadline.
pub async fn sleep_until(deadline: DateTime<Utc>, quantum: Duration, shutdown: &Shutdown) -> bool {
    loop {
        if shutdown.is_requested() {
            return false;
        }
        let now = Utc::now();
        if now >= deadline {
            return true;
        }
        let remaining = (deadline - now)
            .to_std()
            .unwrap_or(Duration::ZERO)
            .min(quantum);
        tokio::select! {
            _ = tokio::time::sleep(remaining) => {}
            _ = shutdown.requested() => return false,
        }
    }
}

/// Sleep for a fixed interval in refined quanta. Returns `false` on shutdown.
pub async fn sleep_for(interval: Duration, quantum: Duration, shutdown: &Shutdown) -> bool {
    let deadline = Utc::now()
        + chrono::Duration::from_std(interval).unwrap_or_else(|_| chrono::Duration::seconds(0));
    sleep_until(deadline, quantum, shutdown).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn past_deadline_returns_immediately() {
        let shutdown = Shutdown::new();
        let deadline = Utc::now() - chrono::Duration::seconds(5);
        assert!(sleep_until(deadline, DEFAULT_QUANTUM, &shutdown).await);
    }

    #[tokio::test]
    async fn shutdown_aborts_sleep() {
        let shutdown = Shutdown::new();
        shutdown.request();
        let deadline = Utc::now() + chrono::Duration::seconds(3600);
        assert!(!sleep_until(deadline, DEFAULT_QUANTUM, &shutdown).await);
    }

    #[tokio::test]
    async fn shutdown_mid_sleep_wakes_within_quantum() {
        let shutdown = Shutdown::new();
        let deadline = Utc::now() + chrono::Duration::seconds(30);
        let handle = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                sleep_until(deadline, Duration::from_millis(10), &shutdown).await
            })
        };
        tokio::time::sleep(Duration::from_millis(30)).await;
        shutdown.request();
        let completed = handle.await.unwrap();
        assert!(!completed, "sleep should report interruption");
    }

    #[tokio::test]
    async fn short_sleep_completes() {
        let shutdown = Shutdown::new();
        assert!(sleep_for(Duration::from_millis(20), Duration::from_millis(5), &shutdown).await);
    }
}
