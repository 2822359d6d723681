use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::{header, Client, StatusCode};
use tracing::{debug, warn};

use crate::config::CollectionConfig;
use crate::retry::{fetch_retry, RetryDecision};
use crate::types::Result;

/// Browser user-agent strings rotated across requests to avoid feed hosts
/// that block obvious bots.
pub const USER_AGENTS: [&str; 5] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.0 Safari/605.1.15",
];

/// Why one source could not be fetched. Resolved inside the Collector;
/// never escalates past it.
#[derive(Debug, thiserror::Error)]
pub enum FetchFailure {
    #[error("blocked by the server (HTTP 403)")]
    Blocked,

    #[error("rate limited (HTTP 429)")]
    RateLimited,

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),
}

/// HTTP side of the Feed Collector: one GET per attempt, user-agent
/// rotation, bounded timeout, and the per-status retry policy.
pub struct FeedFetcher {
    client: Client,
    max_retries: u32,
    rotate_user_agent: bool,
    fixed_user_agent: String,
    ua_cursor: AtomicUsize,
}

impl FeedFetcher {
    pub fn new(config: &CollectionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .gzip(true)
            .deflate(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            max_retries: config.max_retries.max(1),
            rotate_user_agent: config.rotate_user_agent,
            fixed_user_agent: config.user_agent.clone(),
            ua_cursor: AtomicUsize::new(0),
        })
    }

    fn next_user_agent(&self) -> String {
        if self.rotate_user_agent {
            let index = self.ua_cursor.fetch_add(1, Ordering::Relaxed);
            USER_AGENTS[index % USER_AGENTS.len()].to_string()
        } else {
            self.fixed_user_agent.clone()
        }
    }

    /// Fetches one feed body, retrying per the policy in `retry::fetch_retry`.
    /// A 403 abandons the source immediately; 429 waits out a fixed cooldown;
    /// timeouts and other transport errors back off exponentially.
    pub async fn fetch(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        let mut attempt = 0u32;
        loop {
            debug!(
                "fetching {} (attempt {}/{})",
                url,
                attempt + 1,
                self.max_retries
            );
            let failure = match self.try_fetch(url).await {
                Ok(body) => {
                    debug!("fetched {} ({} bytes)", url, body.len());
                    return Ok(body);
                }
                Err(failure) => failure,
            };
            match fetch_retry(&failure, attempt, self.max_retries) {
                RetryDecision::RetryAfter(delay) => {
                    warn!(
                        "attempt {}/{} failed for {}: {}, retrying in {:?}",
                        attempt + 1,
                        self.max_retries,
                        url,
                        failure,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                RetryDecision::Abort => return Err(failure),
            }
        }
    }

    async fn try_fetch(&self, url: &str) -> std::result::Result<String, FetchFailure> {
        let response = self
            .client
            .get(url)
            .header(header::USER_AGENT, self.next_user_agent())
            .send()
            .await
            .map_err(classify_transport)?;

        match response.status() {
            StatusCode::FORBIDDEN => Err(FetchFailure::Blocked),
            StatusCode::TOO_MANY_REQUESTS => Err(FetchFailure::RateLimited),
            status if !status.is_success() => Err(FetchFailure::Status(status.as_u16())),
            _ => response.text().await.map_err(classify_transport),
        }
    }
}

fn classify_transport(error: reqwest::Error) -> FetchFailure {
    if error.is_timeout() {
        FetchFailure::Timeout
    } else {
        FetchFailure::Transport(error.to_string())
    }
}
