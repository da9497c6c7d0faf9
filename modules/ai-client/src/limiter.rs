use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

struct WindowConfig {
    max_requests: u32,
    period: Duration,
}

struct Window {
    requests: u32,
    window_start: Instant,
}

/// Per-model sliding-window rate limiter.
///
/// Each unique model name owns one `(requests, window_start)` counter, shared
/// across every agent that references the model. `acquire` never fails; when
/// the current window is full it waits until the window resets. Over any
/// configured period the number of issued requests per model stays at or
/// below `max_requests`.
#[derive(Default)]
pub struct RateLimiter {
    configs: HashMap<String, WindowConfig>,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model's request window. Models never registered are
    /// unlimited.
    pub fn register(mut self, model: impl Into<String>, max_requests: u32, period: Duration) -> Self {
        self.configs.insert(
            model.into(),
            WindowConfig {
                max_requests: max_requests.max(1),
                period,
            },
        );
        self
    }

    /// Acquire one request slot for `model`, waiting cooperatively if the
    /// current window is exhausted.
    pub async fn acquire(&self, model: &str) {
        loop {
            let wait = self.try_acquire(model);
            match wait {
                None => return,
                Some(delay) => {
                    debug!(model, wait_ms = delay.as_millis() as u64, "Rate limit window full, waiting");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Returns `None` when a slot was taken, or the time until the current
    /// window resets.
    fn try_acquire(&self, model: &str) -> Option<Duration> {
        let config = self.configs.get(model)?;
        let now = Instant::now();

        let mut windows = self.windows.lock().unwrap_or_else(|e| e.into_inner());
        let window = windows.entry(model.to_string()).or_insert(Window {
            requests: 0,
            window_start: now,
        });

        if now.duration_since(window.window_start) >= config.period {
            window.requests = 0;
            window.window_start = now;
        }

        if window.requests < config.max_requests {
            window.requests += 1;
            None
        } else {
            Some(
                config
                    .period
                    .saturating_sub(now.duration_since(window.window_start)),
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn under_limit_never_waits() {
        let limiter = RateLimiter::new().register("basic", 3, Duration::from_secs(60));
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire("basic").await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn excess_requests_wait_for_window_reset() {
        let limiter = RateLimiter::new().register("basic", 2, Duration::from_secs(10));
        let start = Instant::now();
        for _ in 0..5 {
            limiter.acquire("basic").await;
        }
        // Slots: 2 at t=0, 2 at t=10, 1 at t=20.
        assert!(start.elapsed() >= Duration::from_secs(20));
        assert!(start.elapsed() < Duration::from_secs(31));
    }

    #[tokio::test(start_paused = true)]
    async fn models_are_limited_independently() {
        let limiter = RateLimiter::new()
            .register("basic", 1, Duration::from_secs(60))
            .register("light", 1, Duration::from_secs(60));
        let start = Instant::now();
        limiter.acquire("basic").await;
        limiter.acquire("light").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn unregistered_model_is_unlimited() {
        let limiter = RateLimiter::new();
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire("anything").await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn window_resets_after_idle_period() {
        let limiter = RateLimiter::new().register("basic", 2, Duration::from_secs(10));
        limiter.acquire("basic").await;
        limiter.acquire("basic").await;
        tokio::time::sleep(Duration::from_secs(11)).await;
        let start = Instant::now();
        limiter.acquire("basic").await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
