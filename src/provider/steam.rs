use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use url::Url;

use crate::domain::{GameDetails, PriceInfo, StoreKind};
use crate::provider::{HttpClient, Provider, ProviderError, ProviderResult};
use crate::rate_limiter::RateLimiter;

const APP_DETAILS_URL: &str = "https://store.steampowered.com/api/appdetails";

/// Steam has a public JSON API, so there is no scraping tier.
pub struct SteamProvider {
    http: HttpClient,
    limiter: RateLimiter,
}

impl SteamProvider {
    pub fn new(http: HttpClient, calls_per_second: f64) -> Self {
        Self {
            http,
            limiter: RateLimiter::new(calls_per_second),
        }
    }
}

#[async_trait]
impl Provider for SteamProvider {
    fn store(&self) -> StoreKind {
        StoreKind::Steam
    }

    async fn fetch_details(&self, appid: &str) -> ProviderResult<GameDetails> {
        if appid.is_empty() || !appid.chars().all(|c| c.is_ascii_digit()) {
            return Err(ProviderError::NotFound);
        }

        let url = Url::parse_with_params(
            APP_DETAILS_URL,
            &[("appids", appid), ("cc", "us"), ("l", "en")],
        )
        .map_err(|e| ProviderError::scraping(e.to_string()))?;

        self.limiter.acquire().await;
        let body = self.http.get_text(url.as_str()).await?;
        parse_app_details(&body, appid)
    }
}

#[derive(Debug, Deserialize)]
struct AppDetailsEnvelope {
    success: bool,
    data: Option<AppData>,
}

#[derive(Debug, Deserialize)]
struct AppData {
    name: Option<String>,
    #[serde(default)]
    is_free: bool,
    #[serde(default)]
    developers: Vec<String>,
    #[serde(default)]
    publishers: Vec<String>,
    release_date: Option<ReleaseDate>,
    header_image: Option<String>,
    price_overview: Option<PriceOverview>,
}

#[derive(Debug, Deserialize)]
struct ReleaseDate {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PriceOverview {
    currency: Option<String>,
    initial_formatted: Option<String>,
    final_formatted: Option<String>,
    discount_percent: Option<u32>,
}

/// Parses an `appdetails` response body for `appid`.
pub fn parse_app_details(body: &str, appid: &str) -> ProviderResult<GameDetails> {
    let mut envelopes: HashMap<String, AppDetailsEnvelope> = serde_json::from_str(body)?;
    let envelope = envelopes.remove(appid).ok_or(ProviderError::NotFound)?;

    if !envelope.success {
        return Err(ProviderError::NotFound);
    }

    let data = envelope
        .data
        .ok_or_else(|| ProviderError::scraping("appdetails success without data"))?;

    let mut details = data
        .name
        .as_deref()
        .and_then(GameDetails::new)
        .ok_or_else(|| ProviderError::scraping(format!("no name for app {}", appid)))?;

    details.developers = data.developers;
    details.publishers = data.publishers;
    details.release_date = data
        .release_date
        .and_then(|r| r.date)
        .filter(|d| !d.is_empty());
    details.image = data.header_image;

    let price = if data.is_free {
        PriceInfo::FreeToPlay
    } else if let Some(overview) = data.price_overview {
        let non_empty = |s: Option<String>| s.filter(|v| !v.is_empty());
        let current = non_empty(overview.final_formatted);
        PriceInfo::Structured {
            original: non_empty(overview.initial_formatted).or_else(|| current.clone()),
            current,
            discount_percent: overview.discount_percent,
            currency: overview.currency,
        }
    } else {
        PriceInfo::Unpriced
    };
    details.set_price(price, data.is_free);

    Ok(details.with_store_url(StoreKind::Steam.store_url(appid)))
}
