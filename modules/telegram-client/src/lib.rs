use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::warn;

const API_URL: &str = "https://api.telegram.org";

pub type Result<T> = std::result::Result<T, TelegramError>;

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Telegram API error (status {status}): {description}")]
    Api { status: u16, description: String },
}

impl From<reqwest::Error> for TelegramError {
    fn from(err: reqwest::Error) -> Self {
        TelegramError::Network(err.to_string())
    }
}

#[derive(Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

/// Bot API client for posting channel messages. Sends retry on transient
/// failure up to `max_retries` with linear backoff.
pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
    channel_id: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl TelegramClient {
    pub fn new(bot_token: impl Into<String>, channel_id: impl Into<String>, max_retries: u32) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: API_URL.to_string(),
            bot_token: bot_token.into(),
            channel_id: channel_id.into(),
            max_retries,
            retry_delay: Duration::from_secs(2),
        }
    }

    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Post one MarkdownV2 message to the configured channel.
    pub async fn send_message(&self, text: &str) -> Result<()> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.send_once(text).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt <= self.max_retries && is_transient(&e) => {
                    warn!(attempt, error = %e, "Message send failed, retrying");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn send_once(&self, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.base_url, self.bot_token);
        let payload = json!({
            "chat_id": self.channel_id,
            "text": text,
            "parse_mode": "MarkdownV2",
            "disable_web_page_preview": true,
        });

        let response = self.http.post(&url).json(&payload).send().await?;
        let status = response.status().as_u16();
        let body: ApiResponse = response.json().await?;

        if !body.ok {
            return Err(TelegramError::Api {
                status,
                description: body.description.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

fn is_transient(err: &TelegramError) -> bool {
    match err {
        TelegramError::Network(_) => true,
        TelegramError::Api { status, .. } => *status == 429 || *status >= 500,
    }
}

/// Escape text for the MarkdownV2 dialect. Every reserved character must be
/// escaped outside of intentional formatting entities.
pub fn escape(text: &str) -> String {
    const RESERVED: &[char] = &[
        '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!',
    ];
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if RESERVED.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_covers_reserved_set() {
        assert_eq!(escape("a.b!c"), "a\\.b\\!c");
        assert_eq!(escape("x_y*z"), "x\\_y\\*z");
        assert_eq!(escape("(1+2)=3"), "\\(1\\+2\\)\\=3");
        assert_eq!(escape("plain text"), "plain text");
    }

    #[test]
    fn transient_classification() {
        assert!(is_transient(&TelegramError::Network("reset".into())));
        assert!(is_transient(&TelegramError::Api {
            status: 502,
            description: String::new()
        }));
        assert!(!is_transient(&TelegramError::Api {
            status: 400,
            description: String::new()
        }));
    }
}
