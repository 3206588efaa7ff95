//! Store-specific metadata lookups behind one capability.
//!
//! Every provider owns its own [`RateLimiter`](crate::rate_limiter::RateLimiter)
//! and tries structured data (JSON API or JSON-LD) before falling back to
//! Open Graph tags and page-text heuristics.

pub mod epic;
pub mod error;
pub mod gog;
pub mod html;
pub mod http;
pub mod itad;
pub mod itch;
#[cfg(test)]
pub(crate) mod local_server;
pub mod playstation;
pub mod steam;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{GameDetails, StoreKind};

pub use epic::{EpicEndpoints, EpicProvider};
pub use error::{ProviderError, ProviderResult};
pub use gog::GogProvider;
pub use http::HttpClient;
pub use itad::ItadLookup;
pub use itch::ItchProvider;
pub use playstation::PlayStationProvider;
pub use steam::SteamProvider;

#[async_trait]
pub trait Provider: Send + Sync {
    fn store(&self) -> StoreKind;

    /// Fetch and normalize one game. `store_url` is always derived from
    /// `identifier`, never from scraped content.
    async fn fetch_details(&self, identifier: &str) -> ProviderResult<GameDetails>;
}

/// One step of the generic lookup, in the order the resolver tries them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupQuery {
    SteamId(String),
    EpicSlug(String),
    Title(String),
}

impl LookupQuery {
    /// Identifier under which a result is cached for the `itad` store.
    pub fn cache_key(&self) -> String {
        match self {
            LookupQuery::SteamId(id) => format!("steam:{}", id),
            LookupQuery::EpicSlug(slug) => format!("epic:{}", slug),
            LookupQuery::Title(title) => format!("title:{}", title.trim().to_lowercase()),
        }
    }
}

/// Store-agnostic price/metadata service used when a store lookup fails.
#[async_trait]
pub trait PriceLookup: Send + Sync {
    async fn lookup(&self, query: &LookupQuery) -> ProviderResult<Option<GameDetails>>;

    /// Banner image for a title, used only to fill a missing image.
    async fn find_image(&self, title: &str) -> ProviderResult<Option<String>>;
}

/// The per-store provider registry the resolver dispatches through.
#[derive(Clone, Default)]
pub struct ProviderSet {
    providers: HashMap<StoreKind, Arc<dyn Provider>>,
}

impl ProviderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn Provider>) -> Self {
        self.register(provider);
        self
    }

    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.store(), provider);
    }

    pub fn get(&self, store: StoreKind) -> Option<&Arc<dyn Provider>> {
        self.providers.get(&store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_cache_keys() {
        assert_eq!(LookupQuery::SteamId("400".into()).cache_key(), "steam:400");
        assert_eq!(LookupQuery::EpicSlug("fortnite".into()).cache_key(), "epic:fortnite");
        assert_eq!(LookupQuery::Title(" Portal 2 ".into()).cache_key(), "title:portal 2");
    }
}
