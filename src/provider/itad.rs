use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::domain::{GameDetails, PriceInfo};
use crate::provider::{HttpClient, LookupQuery, PriceLookup, ProviderError, ProviderResult};
use crate::rate_limiter::RateLimiter;

const BASE_URL: &str = "https://api.isthereanydeal.com";
const SEARCH_CANDIDATES: usize = 5;

/// IsThereAnyDeal API client, used as the store-agnostic fallback and for
/// ad hoc price checks.
pub struct ItadLookup {
    http: HttpClient,
    limiter: RateLimiter,
    api_key: String,
    base_url: String,
    country: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItadGame {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub assets: Assets,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Assets {
    #[serde(rename = "banner600")]
    pub banner600: Option<String>,
    #[serde(rename = "banner400")]
    pub banner400: Option<String>,
    #[serde(rename = "banner300")]
    pub banner300: Option<String>,
    #[serde(rename = "boxart", alias = "boxArt")]
    pub boxart: Option<String>,
}

impl Assets {
    pub fn best_banner(&self) -> Option<String> {
        self.banner600
            .as_ref()
            .or(self.banner400.as_ref())
            .or(self.banner300.as_ref())
            .or(self.boxart.as_ref())
            .cloned()
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    found: bool,
    game: Option<ItadGame>,
}

#[derive(Debug, Deserialize)]
struct OverviewResponse {
    #[serde(default)]
    prices: Vec<Overview>,
}

/// Price overview of one game across every tracked shop.
#[derive(Debug, Clone, Deserialize)]
pub struct Overview {
    pub id: String,
    pub current: Option<Deal>,
    pub lowest: Option<Deal>,
    #[serde(default)]
    pub urls: GameUrls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Deal {
    pub shop: Option<Shop>,
    pub price: Option<Amount>,
    pub url: Option<String>,
    pub timestamp: Option<String>,
}

impl Deal {
    fn describe(&self) -> String {
        let price = self
            .price
            .as_ref()
            .map(|p| format!("{} {}", p.amount, p.currency))
            .unwrap_or_else(|| "N/A".to_string());
        let shop = self
            .shop
            .as_ref()
            .map(|s| s.name.as_str())
            .unwrap_or("Unknown");
        format!("{} at {}", price, shop)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Shop {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Amount {
    pub amount: f64,
    pub currency: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GameUrls {
    pub game: Option<String>,
}

/// Result of a title price check.
#[derive(Debug, Clone)]
pub struct PriceCheck {
    pub game: ItadGame,
    /// Whether `game` matched the requested title exactly.
    pub exact: bool,
    pub overview: Overview,
}

impl PriceCheck {
    pub fn summary(&self) -> String {
        let mut lines = vec![self.game.title.clone()];
        if let Some(url) = &self.overview.urls.game {
            lines.push(url.clone());
        }
        match &self.overview.current {
            Some(deal) => {
                let mut line = format!("Current best: {}", deal.describe());
                if let Some(url) = &deal.url {
                    line.push_str(&format!(" ({})", url));
                }
                lines.push(line);
            }
            None => lines.push("Current best: no active deals".to_string()),
        }
        if let Some(deal) = &self.overview.lowest {
            let mut line = format!("Historical low: {}", deal.describe());
            if let Some(timestamp) = &deal.timestamp {
                line.push_str(&format!(" ({})", timestamp));
            }
            lines.push(line);
        }
        if let Some(image) = &self.game.assets.banner400 {
            lines.push(format!("Image: {}", image));
        }
        lines.join("\n")
    }
}

/// Case-insensitive exact title match, else the first candidate.
pub fn pick_match(games: Vec<ItadGame>, title: &str) -> Option<(ItadGame, bool)> {
    let wanted = title.trim().to_lowercase();
    let exact = games.iter().position(|g| g.title.to_lowercase() == wanted);
    match exact {
        Some(i) => games.into_iter().nth(i).map(|g| (g, true)),
        None => games.into_iter().next().map(|g| (g, false)),
    }
}

impl ItadLookup {
    pub fn new(http: HttpClient, api_key: impl Into<String>, calls_per_second: f64) -> Self {
        Self {
            http,
            limiter: RateLimiter::new(calls_per_second),
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            country: "US".to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Two-letter country code prices are quoted for.
    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> ProviderResult<Url> {
        let mut all = vec![("key", self.api_key.as_str())];
        all.extend_from_slice(params);
        Url::parse_with_params(&format!("{}{}", self.base_url, path), &all)
            .map_err(|e| ProviderError::scraping(e.to_string()))
    }

    pub async fn search(&self, title: &str, limit: usize) -> ProviderResult<Vec<ItadGame>> {
        let limit = limit.to_string();
        let url = self.endpoint("/games/search/v1", &[("title", title), ("results", &limit)])?;

        self.limiter.acquire().await;
        self.http.get_json(url.as_str()).await
    }

    pub async fn lookup_steam(&self, appid: &str) -> ProviderResult<Option<ItadGame>> {
        let url = self.endpoint("/games/lookup/v1", &[("appid", appid)])?;

        self.limiter.acquire().await;
        let response: LookupResponse = self.http.get_json(url.as_str()).await?;
        Ok(response.game.filter(|_| response.found))
    }

    async fn search_first(&self, title: &str) -> ProviderResult<Option<ItadGame>> {
        Ok(self.search(title, 1).await?.into_iter().next())
    }

    /// Current and historical-low prices for one game ID.
    pub async fn overview(&self, game_id: &str) -> ProviderResult<Option<Overview>> {
        let url = self.endpoint("/games/overview/v2", &[("country", self.country.as_str())])?;

        self.limiter.acquire().await;
        let response: OverviewResponse = self.http.post_json(url.as_str(), &[game_id]).await?;
        Ok(response.prices.into_iter().find(|p| p.id == game_id))
    }

    /// Searches a title and returns the price overview of the best match.
    pub async fn price_check(&self, title: &str) -> ProviderResult<Option<PriceCheck>> {
        let candidates = self.search(title, SEARCH_CANDIDATES).await?;
        let Some((game, exact)) = pick_match(candidates, title) else {
            return Ok(None);
        };
        debug!("ITAD price check '{}' -> {} (exact: {})", title, game.id, exact);

        Ok(self
            .overview(&game.id)
            .await?
            .map(|overview| PriceCheck {
                game,
                exact,
                overview,
            }))
    }
}

/// ITAD only knows that a game exists, not that it is free right now; the
/// post it came from is the evidence for that.
pub fn game_to_details(game: &ItadGame) -> Option<GameDetails> {
    let mut details = GameDetails::new(&game.title)?;
    details.image = game.assets.best_banner();
    details.set_price(PriceInfo::FreeToPlay, true);
    Some(details)
}

#[async_trait]
impl PriceLookup for ItadLookup {
    async fn lookup(&self, query: &LookupQuery) -> ProviderResult<Option<GameDetails>> {
        let game = match query {
            LookupQuery::SteamId(appid) => self.lookup_steam(appid).await?,
            LookupQuery::EpicSlug(slug) => self.search_first(&slug.replace('-', " ")).await?,
            LookupQuery::Title(title) => self.search_first(title).await?,
        };

        debug!("ITAD {:?} -> {:?}", query, game.as_ref().map(|g| &g.id));
        Ok(game.as_ref().and_then(game_to_details))
    }

    async fn find_image(&self, title: &str) -> ProviderResult<Option<String>> {
        let image = self
            .search_first(title)
            .await?
            .and_then(|g| g.assets.best_banner());
        if image.is_some() {
            info!("Fetched image for '{}' from ITAD", title);
        }
        Ok(image)
    }
}
