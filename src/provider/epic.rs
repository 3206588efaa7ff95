use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::{GameDetails, PriceInfo, StoreKind};
use crate::provider::html::{has_text_node, open_graph};
use crate::provider::{HttpClient, Provider, ProviderError, ProviderResult};
use crate::rate_limiter::RateLimiter;

const TITLE_SUFFIX: &str = " | Download and Buy Today - Epic Games Store";

pub const PROMOTIONS_TTL: Duration = Duration::from_secs(300);

/// Base URLs the provider talks to.
#[derive(Debug, Clone)]
pub struct EpicEndpoints {
    pub cms: String,
    pub store_page: String,
    pub promotions: String,
}

impl Default for EpicEndpoints {
    fn default() -> Self {
        Self {
            cms: "https://store-content.ak.epicgames.com/api/en-US/content/products".into(),
            store_page: "https://store.epicgames.com/en-US/p".into(),
            promotions: "https://store-site-backend-static-ipv4.ak.epicgames.com/freeGamesPromotions"
                .into(),
        }
    }
}

struct Promotions {
    fetched_at: Instant,
    free_slugs: HashSet<String>,
}

/// Epic Games Store: CMS API first, store page scraping second.
///
/// The CMS carries no price, so free status comes from the promotions
/// endpoint, kept in memory for [`PROMOTIONS_TTL`].
pub struct EpicProvider {
    http: HttpClient,
    limiter: RateLimiter,
    endpoints: EpicEndpoints,
    promotions: Mutex<Option<Promotions>>,
}

impl EpicProvider {
    pub fn new(http: HttpClient, calls_per_second: f64) -> Self {
        Self {
            http,
            limiter: RateLimiter::new(calls_per_second),
            endpoints: EpicEndpoints::default(),
            promotions: Mutex::new(None),
        }
    }

    pub fn with_endpoints(mut self, endpoints: EpicEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    async fn is_promoted(&self, slug: &str) -> bool {
        let mut promotions = self.promotions.lock().await;

        let stale = promotions
            .as_ref()
            .is_none_or(|p| p.fetched_at.elapsed() >= PROMOTIONS_TTL);

        if stale {
            self.limiter.acquire().await;
            match self.http.get_text(&self.endpoints.promotions).await {
                Ok(body) => match parse_promotions(&body) {
                    Ok(free_slugs) => {
                        debug!("Epic promotions refreshed: {} free titles", free_slugs.len());
                        *promotions = Some(Promotions {
                            fetched_at: Instant::now(),
                            free_slugs,
                        });
                    }
                    Err(e) => warn!("Failed to parse Epic promotions: {}", e),
                },
                // Keep serving the previous snapshot rather than blocking lookups
                Err(e) => warn!("Failed to update Epic free games list: {}", e),
            }
        }

        promotions
            .as_ref()
            .is_some_and(|p| p.free_slugs.contains(slug))
    }

    async fn scrape_store_page(&self, slug: &str) -> ProviderResult<GameDetails> {
        self.limiter.acquire().await;

        let html = self
            .http
            .get_text(&format!("{}/{}", self.endpoints.store_page, slug))
            .await?;
        let mut details = parse_store_page(&html)?;

        // "Free"/"Get" also shows for owned or always-free titles, so only
        // trust it when the promotions list agrees.
        let is_free = has_text_node(&html, &["Free", "Get"]) && self.is_promoted(slug).await;
        if is_free {
            details.set_price(PriceInfo::FreeToPlay, true);
        }

        Ok(details.with_store_url(StoreKind::Epic.store_url(slug)))
    }
}

#[async_trait]
impl Provider for EpicProvider {
    fn store(&self) -> StoreKind {
        StoreKind::Epic
    }

    async fn fetch_details(&self, slug: &str) -> ProviderResult<GameDetails> {
        if slug.is_empty() {
            return Err(ProviderError::NotFound);
        }

        self.limiter.acquire().await;

        match self.http.get_text(&format!("{}/{}", self.endpoints.cms, slug)).await {
            Ok(body) => match parse_cms_product(&body) {
                Ok(mut details) => {
                    if self.is_promoted(slug).await {
                        details.set_price(PriceInfo::FreeToPlay, true);
                    }
                    return Ok(details.with_store_url(StoreKind::Epic.store_url(slug)));
                }
                Err(e) => warn!("Epic CMS response for {} unusable: {}", slug, e),
            },
            // Not in the CMS; the store page may still exist
            Err(ProviderError::NotFound) => debug!("Epic CMS has no entry for {}", slug),
            Err(e @ ProviderError::RateLimited { .. }) => return Err(e),
            Err(e) => warn!("Epic CMS API failed for {}: {}", slug, e),
        }

        self.scrape_store_page(slug).await
    }
}

/// Parses a CMS product document.
pub fn parse_cms_product(body: &str) -> ProviderResult<GameDetails> {
    let data: Value = serde_json::from_str(body)?;

    let name = data
        .get("productName")
        .or_else(|| data.get("_title"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    let mut details = GameDetails::new(name)
        .ok_or_else(|| ProviderError::scraping("CMS product without a name"))?;

    if let Some(attrs) = data.get("customAttributes").and_then(Value::as_array) {
        for attr in attrs {
            let value = attr.get("value").and_then(Value::as_str).map(str::to_string);
            match (attr.get("key").and_then(Value::as_str), value) {
                (Some("developerName"), Some(v)) => details.developers.push(v),
                (Some("publisherName"), Some(v)) => details.publishers.push(v),
                _ => {}
            }
        }
    }

    if let Some(images) = data.get("keyImages").and_then(Value::as_array) {
        for image in images {
            let kind = image.get("type").and_then(Value::as_str).unwrap_or_default();
            let url = image.get("url").and_then(Value::as_str);
            match kind {
                "OfferImageWide" | "DieselStoreFrontWide" if url.is_some() => {
                    details.image = url.map(str::to_string);
                    break;
                }
                "Thumbnail" if url.is_some() => details.image = url.map(str::to_string),
                _ => {}
            }
        }
    }

    Ok(details)
}

/// Parses the public store page when the CMS has nothing.
pub fn parse_store_page(html: &str) -> ProviderResult<GameDetails> {
    let og = open_graph(html);
    let title = og
        .title
        .map(|t| t.replace(TITLE_SUFFIX, "").trim().to_string())
        .unwrap_or_default();

    let mut details = GameDetails::new(&title)
        .ok_or_else(|| ProviderError::scraping("Epic store page without og:title"))?;
    details.image = og.image;
    Ok(details)
}

/// Slugs with an active promotional offer in a `freeGamesPromotions` body.
pub fn parse_promotions(body: &str) -> ProviderResult<HashSet<String>> {
    let data: Value = serde_json::from_str(body)?;
    let elements = data
        .pointer("/data/Catalog/searchStore/elements")
        .and_then(Value::as_array)
        .ok_or_else(|| ProviderError::scraping("promotions without elements"))?;

    let mut slugs = HashSet::new();
    for game in elements {
        let active = game
            .pointer("/promotions/promotionalOffers")
            .and_then(Value::as_array)
            .is_some_and(|offers| !offers.is_empty());
        if !active {
            continue;
        }

        let direct = ["productSlug", "urlSlug"]
            .iter()
            .filter_map(|key| game.get(*key).and_then(Value::as_str));
        let mapped = ["/catalogNs/mappings", "/offerMappings"]
            .iter()
            .filter_map(|path| game.pointer(path).and_then(Value::as_array))
            .flatten()
            .filter_map(|m| m.get("pageSlug").and_then(Value::as_str));

        for slug in direct.chain(mapped) {
            // productSlug sometimes carries a "/home" suffix
            let slug = slug.split('/').next().unwrap_or_default();
            if !slug.is_empty() {
                slugs.insert(slug.to_string());
            }
        }
    }

    Ok(slugs)
}
