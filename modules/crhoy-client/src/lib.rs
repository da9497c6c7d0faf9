pub mod error;
pub mod types;

pub use error::{CrhoyError, Result};
pub use types::{parse_index, IndexEntry};

use std::time::Duration;

use chrono::NaiveDate;
use tracing::{debug, warn};

/// Probe target that answers 204 to any GET when the network is up.
const CONNECTIVITY_URL: &str = "http://connectivitycheck.gstatic.com/generate_204";

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Read-only client for the source API: daily index JSON and per-article
/// HTML pages. Transient failures are retried with linear backoff up to
/// `max_retries` before surfacing.
pub struct CrhoyClient {
    http: reqwest::Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl CrhoyClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration, max_retries: u32) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CrhoyError::Network(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            max_retries,
            retry_delay: Duration::from_secs(2),
        })
    }

    /// Fetch one day's index. Returns the raw document (persisted verbatim
    /// by the caller) alongside the parsed entries.
    pub async fn daily_index(&self, day: NaiveDate) -> Result<(String, Vec<IndexEntry>)> {
        let url = format!("{}/daily/{}.json", self.base_url, day.format("%Y-%m-%d"));
        let raw = self.get_with_retries(&url).await?;
        let entries = parse_index(&raw)?;
        debug!(day = %day, articles = entries.len(), "Fetched daily index");
        Ok((raw, entries))
    }

    /// Fetch one article's HTML page by its canonical URL.
    pub async fn article_html(&self, url: &str) -> Result<String> {
        self.get_with_retries(url).await
    }

    /// Cheap internet reachability check.
    pub async fn internet_available(&self) -> bool {
        let request = self
            .http
            .get(CONNECTIVITY_URL)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        matches!(request, Ok(r) if r.status().is_success() || r.status().as_u16() == 204)
    }

    /// Source API reachability check: any HTTP answer below 500 counts.
    pub async fn api_available(&self) -> bool {
        let request = self
            .http
            .head(&self.base_url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await;
        matches!(request, Ok(r) if r.status().as_u16() < 500)
    }

    async fn get_with_retries(&self, url: &str) -> Result<String> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.get_once(url).await {
                Ok(body) => return Ok(body),
                Err(e) if attempt <= self.max_retries && is_transient(&e) => {
                    warn!(url, attempt, error = %e, "Request failed, retrying");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &str) -> Result<String> {
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(CrhoyError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response.text().await?)
    }
}

fn is_transient(err: &CrhoyError) -> bool {
    match err {
        CrhoyError::Network(_) => true,
        CrhoyError::Api { status, .. } => *status == 429 || *status >= 500,
        CrhoyError::Parse(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_stripped() {
        let client =
            CrhoyClient::new("https://api.example.net/", Duration::from_secs(5), 2).unwrap();
        assert_eq!(client.base_url, "https://api.example.net");
    }

    #[test]
    fn transient_classification() {
        assert!(is_transient(&CrhoyError::Network("timeout".into())));
        assert!(is_transient(&CrhoyError::Api {
            status: 503,
            message: String::new()
        }));
        assert!(!is_transient(&CrhoyError::Api {
            status: 404,
            message: String::new()
        }));
        assert!(!is_transient(&CrhoyError::Parse("bad json".into())));
    }
}
