pub(crate) mod client;
pub(crate) mod types;

use std::sync::Arc;

use crate::limiter::RateLimiter;
use crate::session::{ChatSession, SessionParams};

use client::ClaudeClient;

/// Anthropic engine handle. Cheap to clone; every agent session created from
/// it shares the same HTTP client and rate-limiter registry.
#[derive(Clone)]
pub struct Claude {
    pub(crate) client: ClaudeClient,
    limiter: Arc<RateLimiter>,
}

impl Claude {
    pub fn new(api_key: impl AsRef<str>, limiter: Arc<RateLimiter>) -> Self {
        Self {
            client: ClaudeClient::new(api_key.as_ref()),
            limiter,
        }
    }

    /// Point the engine at a compatible proxy (also used by tests).
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.client = self.client.with_base_url(url);
        self
    }

    /// Open a fresh chat session for one agent. History is owned by the
    /// session and linear; the rate limiter is shared across sessions.
    pub fn start_session(&self, params: SessionParams) -> ChatSession {
        ChatSession::new(self.client.clone(), self.limiter.clone(), params)
    }
}
