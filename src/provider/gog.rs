use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{GameDetails, PriceInfo, StoreKind};
use crate::provider::html::{find_typed, first_offer, json_ld, ld_image, open_graph, text_by_class};
use crate::provider::{HttpClient, Provider, ProviderError, ProviderResult};
use crate::rate_limiter::RateLimiter;

const PRICE_CLASS: &str = "product-actions-price__final-amount";
const TITLE_SUFFIX: &str = " on GOG.com";

/// GOG.com product pages. GOG sits behind Cloudflare, hence the low default rate.
pub struct GogProvider {
    http: HttpClient,
    limiter: RateLimiter,
}

impl GogProvider {
    pub fn new(http: HttpClient, calls_per_second: f64) -> Self {
        Self {
            http,
            limiter: RateLimiter::new(calls_per_second),
        }
    }
}

#[async_trait]
impl Provider for GogProvider {
    fn store(&self) -> StoreKind {
        StoreKind::Gog
    }

    async fn fetch_details(&self, url: &str) -> ProviderResult<GameDetails> {
        if !url.contains("gog.com/") {
            return Err(ProviderError::NotFound);
        }

        self.limiter.acquire().await;
        let html = self.http.get_text(url).await?;
        parse_product_page(&html, url)
    }
}

/// Parses a GOG product page fetched from `url`.
pub fn parse_product_page(html: &str, url: &str) -> ProviderResult<GameDetails> {
    let objects = json_ld(html);
    let product = find_typed(&objects, &["Product", "VideoGame"]);
    let og = open_graph(html);

    let name = product
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or(og.title)
        .map(|n| n.replace(TITLE_SUFFIX, ""))
        .unwrap_or_default();

    let mut details = GameDetails::new(&name)
        .ok_or_else(|| ProviderError::scraping(format!("no title on {}", url)))?;

    details.image = og.image.or_else(|| product.and_then(ld_image));
    details.publishers.push("GOG".to_string());

    let (price, is_free) = match product.and_then(first_offer) {
        Some(offer) if offer.is_zero() => (PriceInfo::FreeToPlay, true),
        Some(offer) => (PriceInfo::formatted(offer.display()), false),
        None => match text_by_class(html, PRICE_CLASS) {
            Some(text) if text == "0.00" || text.to_lowercase().contains("free") => {
                (PriceInfo::FreeToPlay, true)
            }
            Some(text) => (PriceInfo::formatted(text), false),
            None => (PriceInfo::Unpriced, false),
        },
    };
    details.set_price(price, is_free);

    Ok(details.with_store_url(StoreKind::Gog.store_url(url)))
}
