use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{GameDetails, PriceInfo, StoreKind};
use crate::provider::html::{find_typed, first_offer, has_text_node, json_ld, ld_image, open_graph};
use crate::provider::{HttpClient, Provider, ProviderError, ProviderResult};
use crate::rate_limiter::RateLimiter;

const TITLE_SUFFIX: &str = " | PlayStation Store";

pub struct PlayStationProvider {
    http: HttpClient,
    limiter: RateLimiter,
}

impl PlayStationProvider {
    pub fn new(http: HttpClient, calls_per_second: f64) -> Self {
        Self {
            http,
            limiter: RateLimiter::new(calls_per_second),
        }
    }
}

#[async_trait]
impl Provider for PlayStationProvider {
    fn store(&self) -> StoreKind {
        StoreKind::PlayStation
    }

    async fn fetch_details(&self, url: &str) -> ProviderResult<GameDetails> {
        if !url.contains("store.playstation.com/") {
            return Err(ProviderError::NotFound);
        }

        self.limiter.acquire().await;
        let html = self.http.get_text(url).await?;
        parse_product_page(&html, url)
    }
}

/// Parses a PlayStation Store product page fetched from `url`.
pub fn parse_product_page(html: &str, url: &str) -> ProviderResult<GameDetails> {
    let objects = json_ld(html);
    let product = find_typed(&objects, &["Product", "VideoGame"]);
    let og = open_graph(html);

    let name = product
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| og.title.map(|t| t.replace(TITLE_SUFFIX, "")))
        .unwrap_or_default();

    let mut details = GameDetails::new(&name)
        .ok_or_else(|| ProviderError::scraping(format!("no title on {}", url)))?;

    details.image = og.image.or_else(|| product.and_then(ld_image));
    details
        .publishers
        .push("Sony Interactive Entertainment".to_string());

    let (price, is_free) = match product.and_then(first_offer) {
        Some(offer) if offer.is_zero() => (PriceInfo::FreeToPlay, true),
        Some(offer) => (PriceInfo::formatted(offer.display()), false),
        None if has_text_node(html, &["Free", "Free to Play"]) => (PriceInfo::FreeToPlay, true),
        None => (PriceInfo::Unpriced, false),
    };
    details.set_price(price, is_free);

    Ok(details.with_store_url(StoreKind::PlayStation.store_url(url)))
}
