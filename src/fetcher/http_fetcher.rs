use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH};
use reqwest::{Client, StatusCode};
use tracing::{error, warn};

use crate::app::{FreebieError, Result};
use crate::fetcher::{FetchResult, Fetcher};

/// Bounded exponential backoff for feed requests.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// `base * 2^attempt + jitter`, with `jitter` in seconds (expected in `[0, 1)`).
    pub fn delay(&self, attempt: u32, jitter: f64) -> Duration {
        let backoff = self.base_delay.saturating_mul(2u32.saturating_pow(attempt));
        backoff + Duration::from_secs_f64(jitter.clamp(0.0, 1.0))
    }

    fn next_delay(&self, attempt: u32) -> Duration {
        self.delay(attempt, rand::random::<f64>())
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Conditional GET with retries on 429, 5xx and transport failures.
pub struct HttpFetcher {
    client: Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn conditional_headers(etag: Option<&str>, last_modified: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        if let Some(etag) = etag {
            if let Ok(value) = HeaderValue::from_str(etag) {
                headers.insert(IF_NONE_MATCH, value);
            }
        }

        if let Some(last_modified) = last_modified {
            if let Ok(value) = HeaderValue::from_str(last_modified) {
                headers.insert(IF_MODIFIED_SINCE, value);
            }
        }

        headers
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchResult> {
        let attempts = self.retry.max_attempts.max(1);

        for attempt in 0..attempts {
            let last_attempt = attempt + 1 == attempts;
            let headers = Self::conditional_headers(etag, last_modified);

            let response = match self.client.get(url).headers(headers).send().await {
                Ok(response) => response,
                Err(e) if !last_attempt => {
                    let delay = self.retry.next_delay(attempt);
                    error!("Feed fetch error: {}. Retrying in {:.2?}", e, delay);
                    tokio::time::sleep(delay).await;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let status = response.status();
            if status == StatusCode::NOT_MODIFIED {
                return Ok(FetchResult::NotModified);
            }

            if is_retryable(status) && !last_attempt {
                let delay = self.retry.next_delay(attempt);
                warn!("Feed fetch failed ({}). Retrying in {:.2?}", status, delay);
                tokio::time::sleep(delay).await;
                continue;
            }

            response.error_for_status_ref()?;

            let etag = response
                .headers()
                .get("etag")
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            let last_modified = response
                .headers()
                .get("last-modified")
                .and_then(|v| v.to_str().ok())
                .map(String::from);

            let body = response.bytes().await?.to_vec();

            return Ok(FetchResult::Content {
                body,
                etag,
                last_modified,
            });
        }

        Err(FreebieError::Other(format!(
            "max retries exceeded fetching {}",
            url
        )))
    }
}
