use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::app::Result;
use crate::provider::{ProviderError, ProviderResult};

pub const DEFAULT_USER_AGENT: &str =
    concat!("freebie/", env!("CARGO_PKG_VERSION"), " (free game announcement resolver)");

/// Shared reqwest client for every provider.
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .brotli(true)
            .user_agent(user_agent)
            .build()?;

        Ok(Self { client })
    }

    /// Client that ignores proxy settings, for loopback test servers.
    #[cfg(test)]
    pub(crate) fn local() -> Self {
        let client = Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        Self { client }
    }

    pub fn inner(&self) -> &Client {
        &self.client
    }

    pub async fn get_text(&self, url: &str) -> ProviderResult<String> {
        let response = self.client.get(url).send().await?;
        let response = check_status(response)?;
        Ok(response.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> ProviderResult<T> {
        let body = self.get_text(url).await?;
        Ok(serde_json::from_str(&body)?)
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> ProviderResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body)?;
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;
        let response = check_status(response)?;
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }
}

fn check_status(response: Response) -> ProviderResult<Response> {
    let retry_after = retry_after(response.headers());
    match ProviderError::from_status(response.status(), retry_after) {
        Some(err) => Err(err),
        None => Ok(response),
    }
}

/// Only the delta-seconds form of `Retry-After` is understood.
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
