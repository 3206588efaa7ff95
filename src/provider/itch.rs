use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::domain::{GameDetails, PriceInfo, StoreKind};
use crate::provider::html::{find_typed, first_offer, json_ld, ld_image, open_graph, strip_tags};
use crate::provider::{HttpClient, Provider, ProviderError, ProviderResult};
use crate::rate_limiter::RateLimiter;

static BUY_BUTTON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)class\s*=\s*["'][^"']*\bbuy_btn\b[^"']*["'][^>]*>(.*?)</"#)
        .expect("valid regex")
});

static ITCH_SUBDOMAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^https?://([^./]+)\.itch\.io").expect("valid regex"));

const LD_TYPES: [&str; 3] = ["SoftwareApplication", "VideoGame", "Product"];

/// itch.io pages, keyed by full game URL.
pub struct ItchProvider {
    http: HttpClient,
    limiter: RateLimiter,
}

impl ItchProvider {
    pub fn new(http: HttpClient, calls_per_second: f64) -> Self {
        Self {
            http,
            limiter: RateLimiter::new(calls_per_second),
        }
    }
}

#[async_trait]
impl Provider for ItchProvider {
    fn store(&self) -> StoreKind {
        StoreKind::Itch
    }

    async fn fetch_details(&self, url: &str) -> ProviderResult<GameDetails> {
        if !ITCH_SUBDOMAIN.is_match(url) {
            return Err(ProviderError::NotFound);
        }

        self.limiter.acquire().await;
        let html = self.http.get_text(url).await?;
        parse_game_page(&html, url)
    }
}

/// Parses an itch.io game page fetched from `url`.
pub fn parse_game_page(html: &str, url: &str) -> ProviderResult<GameDetails> {
    let details = match parse_json_ld(html) {
        Some(details) => details,
        None => parse_heuristics(html, url)?,
    };

    Ok(details.with_store_url(StoreKind::Itch.store_url(url)))
}

fn parse_json_ld(html: &str) -> Option<GameDetails> {
    let objects = json_ld(html);
    let game = find_typed(&objects, &LD_TYPES)?;

    let mut details = game
        .get("name")
        .and_then(Value::as_str)
        .and_then(GameDetails::new)?;

    // itch omits offers entirely for free downloads
    let offer = first_offer(game);
    let is_free = offer.as_ref().is_none_or(|o| o.is_zero());
    let price = match offer {
        Some(offer) if !is_free => PriceInfo::formatted(offer.display()),
        _ => PriceInfo::FreeToPlay,
    };
    details.set_price(price, is_free);

    if let Some(author) = game.pointer("/author/name").and_then(Value::as_str) {
        details.developers.push(author.to_string());
    }
    details.publishers.push("itch.io".to_string());
    details.release_date = game
        .get("datePublished")
        .and_then(Value::as_str)
        .map(str::to_string);
    details.image = ld_image(game);

    Some(details)
}

fn parse_heuristics(html: &str, url: &str) -> ProviderResult<GameDetails> {
    debug!("No usable JSON-LD on {}, using page heuristics", url);

    let og = open_graph(html);
    let mut details = og
        .title
        .as_deref()
        .and_then(GameDetails::new)
        .ok_or_else(|| ProviderError::scraping(format!("no title on {}", url)))?;
    details.image = og.image;

    if let Some(developer) = ITCH_SUBDOMAIN.captures(url).map(|c| c[1].to_string()) {
        details.developers.push(developer);
    }
    details.publishers.push("itch.io".to_string());

    // "Download Now" and "Name your own price" mean no payment is required
    let button = BUY_BUTTON
        .captures(html)
        .map(|c| strip_tags(&c[1]).to_lowercase());
    if let Some(text) = button {
        if text.contains("download") || text.contains("name your own price") {
            details.set_price(PriceInfo::FreeToPlay, true);
        }
    }

    Ok(details)
}
