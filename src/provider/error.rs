use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Failure of a single store lookup.
///
/// These never escape the resolver; they decide whether the cascade moves on.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("game not found")]
    NotFound,

    #[error("rate limited{}", retry_suffix(.retry_after))]
    RateLimited { retry_after: Option<Duration> },

    #[error("access denied (status {0}), check credentials or WAF")]
    AccessDenied(u16),

    #[error("unexpected response (status {0})")]
    Provider(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse response: {0}")]
    Scraping(String),
}

fn retry_suffix(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(", retry after {}s", d.as_secs()),
        None => String::new(),
    }
}

impl ProviderError {
    /// Maps a non-success status onto the taxonomy; `None` for 2xx.
    pub fn from_status(status: StatusCode, retry_after: Option<Duration>) -> Option<Self> {
        if status.is_success() {
            return None;
        }

        Some(match status.as_u16() {
            404 => ProviderError::NotFound,
            429 => ProviderError::RateLimited { retry_after },
            code @ (401 | 403) => ProviderError::AccessDenied(code),
            code => ProviderError::Provider(code),
        })
    }

    pub fn scraping(detail: impl Into<String>) -> Self {
        ProviderError::Scraping(detail.into())
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Scraping(e.to_string())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(e: serde_json::Error) -> Self {
        ProviderError::Scraping(e.to_string())
    }
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;
