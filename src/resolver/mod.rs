//! Metadata resolution cascade.
//!
//! For one post the resolver tries, in order: the durable cache, the
//! provider of the highest-priority store with an identifier, the generic
//! price lookup, and finally a record synthesized from the post itself.
//! Provider and cache failures are logged and never escape.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::{Candidates, GameDetails, StoreKind};
use crate::extract::{extract_game_title, fallback_title, preferred_fallback_link};
use crate::provider::{LookupQuery, PriceLookup, ProviderSet};
use crate::store::GameCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionSource {
    Cache,
    Provider(StoreKind),
    PriceLookup,
    Fallback,
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSource::Cache => write!(f, "cache"),
            ResolutionSource::Provider(store) => write!(f, "{}", store),
            ResolutionSource::PriceLookup => write!(f, "price lookup"),
            ResolutionSource::Fallback => write!(f, "fallback"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub details: GameDetails,
    pub source: ResolutionSource,
}

impl Resolution {
    fn new(details: GameDetails, source: ResolutionSource) -> Self {
        Self { details, source }
    }
}

/// Everything the resolver may use from a post.
#[derive(Debug, Clone, Copy)]
pub struct ResolveRequest<'a> {
    pub candidates: &'a Candidates,
    /// Safe (non deny-listed) links on the post.
    pub links: &'a [String],
    pub text: &'a str,
    pub thumbnail: Option<&'a str>,
}

pub struct Resolver {
    cache: Arc<dyn GameCache>,
    providers: ProviderSet,
    price_lookup: Option<Arc<dyn PriceLookup>>,
}

impl Resolver {
    pub fn new(cache: Arc<dyn GameCache>, providers: ProviderSet) -> Self {
        Self {
            cache,
            providers,
            price_lookup: None,
        }
    }

    pub fn with_price_lookup(mut self, lookup: Arc<dyn PriceLookup>) -> Self {
        self.price_lookup = Some(lookup);
        self
    }

    pub fn has_provider(&self, store: StoreKind) -> bool {
        self.providers.get(store).is_some()
    }

    pub fn has_price_lookup(&self) -> bool {
        self.price_lookup.is_some()
    }

    /// Returns `None` only when the post has nothing to build a record from.
    pub async fn resolve(&self, request: ResolveRequest<'_>) -> Option<Resolution> {
        if let Some((store, identifier)) = request.candidates.primary() {
            if let Some(resolution) = self.resolve_store(store, identifier).await {
                return Some(resolution);
            }
        }

        if let Some(resolution) = self.resolve_generic(&request).await {
            return Some(resolution);
        }

        self.synthesize(&request).await
    }

    /// Cache, then the store's own provider. The result is cached permanently.
    pub async fn resolve_store(&self, store: StoreKind, identifier: &str) -> Option<Resolution> {
        if let Some(details) = self.cache_get(store, identifier) {
            debug!("Cache hit for {}:{}", store, identifier);
            return Some(Resolution::new(details, ResolutionSource::Cache));
        }

        let Some(provider) = self.providers.get(store) else {
            debug!("No provider registered for {}", store);
            return None;
        };

        match provider.fetch_details(identifier).await {
            Ok(mut details) => {
                if details.image.is_none() {
                    self.enrich_image(&mut details).await;
                }
                self.cache_put(store, identifier, &details);
                info!("Resolved {}:{} as '{}'", store, identifier, details.name);
                Some(Resolution::new(details, ResolutionSource::Provider(store)))
            }
            Err(e) => {
                warn!("{} lookup for {} failed: {}", store, identifier, e);
                None
            }
        }
    }

    async fn resolve_generic(&self, request: &ResolveRequest<'_>) -> Option<Resolution> {
        let lookup = self.price_lookup.as_ref()?;

        let title = request
            .candidates
            .title
            .clone()
            .or_else(|| extract_game_title(request.text));

        let queries = request
            .candidates
            .steam_ids
            .first()
            .map(|id| LookupQuery::SteamId(id.clone()))
            .into_iter()
            .chain(
                request
                    .candidates
                    .epic_slugs
                    .first()
                    .map(|slug| LookupQuery::EpicSlug(slug.clone())),
            )
            .chain(title.map(LookupQuery::Title));

        for query in queries {
            let key = query.cache_key();
            if let Some(details) = self.cache_get(StoreKind::Itad, &key) {
                debug!("Cache hit for itad:{}", key);
                return Some(Resolution::new(details, ResolutionSource::Cache));
            }

            match lookup.lookup(&query).await {
                Ok(Some(details)) => {
                    self.cache_put(StoreKind::Itad, &key, &details);
                    info!("Price lookup resolved {} as '{}'", key, details.name);
                    return Some(Resolution::new(details, ResolutionSource::PriceLookup));
                }
                Ok(None) => debug!("Price lookup has no match for {}", key),
                Err(e) => warn!("Price lookup for {} failed: {}", key, e),
            }
        }

        None
    }

    async fn synthesize(&self, request: &ResolveRequest<'_>) -> Option<Resolution> {
        let link = preferred_fallback_link(request.links)?;

        let mut details = GameDetails::new(fallback_title(request.text))?
            .with_store_url(Some(link.to_string()));
        details.image = request.thumbnail.map(str::to_string);

        if details.image.is_none() {
            self.enrich_image(&mut details).await;
        }

        debug!("Synthesized '{}' from {}", details.name, link);
        Some(Resolution::new(details, ResolutionSource::Fallback))
    }

    /// Image-only enrichment; never touches name or price.
    async fn enrich_image(&self, details: &mut GameDetails) {
        let Some(lookup) = &self.price_lookup else {
            return;
        };
        if details.is_placeholder() {
            return;
        }

        match lookup.find_image(&details.name).await {
            Ok(image) => {
                details.fill_image(image);
            }
            Err(e) => warn!("Failed to fetch image for '{}': {}", details.name, e),
        }
    }

    fn cache_get(&self, store: StoreKind, identifier: &str) -> Option<GameDetails> {
        self.cache.get(store, identifier).unwrap_or_else(|e| {
            warn!("Cache read for {}:{} failed: {}", store, identifier, e);
            None
        })
    }

    fn cache_put(&self, store: StoreKind, identifier: &str, details: &GameDetails) {
        if let Err(e) = self.cache.put(store, identifier, details, true) {
            warn!("Cache write for {}:{} failed: {}", store, identifier, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::{PriceInfo, PLACEHOLDER_TITLE};
    use crate::provider::{Provider, ProviderError, ProviderResult};
    use crate::store::SqliteStore;

    struct StubProvider {
        store: StoreKind,
        result: ProviderResult<GameDetails>,
        calls: AtomicUsize,
    }

    impl StubProvider {
        fn ok(store: StoreKind, name: &str) -> Arc<Self> {
            let details = GameDetails::new(name)
                .unwrap()
                .with_store_url(Some(format!("https://store/{}", name)));
            Self::with(store, Ok(details))
        }

        fn failing(store: StoreKind, error: ProviderError) -> Arc<Self> {
            Self::with(store, Err(error))
        }

        fn with(store: StoreKind, result: ProviderResult<GameDetails>) -> Arc<Self> {
            Arc::new(Self {
                store,
                result,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn store(&self) -> StoreKind {
            self.store
        }

        async fn fetch_details(&self, _identifier: &str) -> ProviderResult<GameDetails> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    #[derive(Default)]
    struct StubLookup {
        answer: Option<GameDetails>,
        image: Option<String>,
        queries: Mutex<Vec<LookupQuery>>,
        image_requests: AtomicUsize,
    }

    #[async_trait]
    impl PriceLookup for StubLookup {
        async fn lookup(&self, query: &LookupQuery) -> ProviderResult<Option<GameDetails>> {
            self.queries.lock().unwrap().push(query.clone());
            Ok(self.answer.clone())
        }

        async fn find_image(&self, _title: &str) -> ProviderResult<Option<String>> {
            self.image_requests.fetch_add(1, Ordering::SeqCst);
            Ok(self.image.clone())
        }
    }

    fn request<'a>(
        candidates: &'a Candidates,
        links: &'a [String],
        text: &'a str,
    ) -> ResolveRequest<'a> {
        ResolveRequest {
            candidates,
            links,
            text,
            thumbnail: None,
        }
    }

    fn steam_candidates() -> Candidates {
        Candidates {
            steam_ids: vec!["400".into()],
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_provider_result_is_cached_permanently() {
        let cache = Arc::new(SqliteStore::in_memory().unwrap());
        let steam = StubProvider::ok(StoreKind::Steam, "Portal");
        let resolver = Resolver::new(cache.clone(), ProviderSet::new().with(steam.clone()));

        let candidates = steam_candidates();
        let resolution = resolver
            .resolve(request(&candidates, &[], "[Steam] (Game) Portal is free"))
            .await
            .unwrap();

        assert_eq!(resolution.details.name, "Portal");
        assert_eq!(resolution.source, ResolutionSource::Provider(StoreKind::Steam));
        assert_eq!(cache.entry_count().unwrap(), 1);
        let entry = cache.get_entry(StoreKind::Steam, "400").unwrap().unwrap();
        assert!(entry.permanent);
        assert_eq!(steam.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_hit_skips_provider() {
        let cache = Arc::new(SqliteStore::in_memory().unwrap());
        let cached = GameDetails::new("Portal (cached)").unwrap();
        cache.put(StoreKind::Steam, "400", &cached, true).unwrap();

        let steam = StubProvider::ok(StoreKind::Steam, "Portal");
        let resolver = Resolver::new(cache, ProviderSet::new().with(steam.clone()));

        let candidates = steam_candidates();
        let resolution = resolver
            .resolve(request(&candidates, &[], ""))
            .await
            .unwrap();

        assert_eq!(resolution.details, cached);
        assert_eq!(resolution.source, ResolutionSource::Cache);
        assert_eq!(steam.calls(), 0);
    }

    #[tokio::test]
    async fn test_only_first_group_is_attempted() {
        let cache = Arc::new(SqliteStore::in_memory().unwrap());
        let steam = StubProvider::failing(StoreKind::Steam, ProviderError::NotFound);
        let epic = StubProvider::ok(StoreKind::Epic, "Control");
        let resolver = Resolver::new(
            cache,
            ProviderSet::new().with(steam.clone()).with(epic.clone()),
        );

        let candidates = Candidates {
            steam_ids: vec!["400".into()],
            epic_slugs: vec!["control".into()],
            ..Default::default()
        };
        let links = vec!["https://store.epicgames.com/p/control".to_string()];
        let resolution = resolver
            .resolve(request(&candidates, &links, "whatever"))
            .await
            .unwrap();

        assert_eq!(steam.calls(), 1);
        assert_eq!(epic.calls(), 0);
        assert_eq!(resolution.source, ResolutionSource::Fallback);
    }

    #[tokio::test]
    async fn test_price_lookup_runs_before_fallback() {
        let cache = Arc::new(SqliteStore::in_memory().unwrap());
        let steam = StubProvider::failing(StoreKind::Steam, ProviderError::Provider(503));
        let lookup = Arc::new(StubLookup {
            answer: Some(GameDetails::new("Portal").unwrap()),
            ..Default::default()
        });
        let resolver = Resolver::new(cache.clone(), ProviderSet::new().with(steam))
            .with_price_lookup(lookup.clone());

        let candidates = steam_candidates();
        let links = vec!["https://store.steampowered.com/app/400/".to_string()];
        let resolution = resolver
            .resolve(request(&candidates, &links, "[Steam] (Game) Portal is free"))
            .await
            .unwrap();

        assert_eq!(resolution.source, ResolutionSource::PriceLookup);
        assert_eq!(
            lookup.queries.lock().unwrap().first(),
            Some(&LookupQuery::SteamId("400".into()))
        );
        assert!(cache.get(StoreKind::Itad, "steam:400").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_price_lookup_walks_steam_epic_title() {
        let cache = Arc::new(SqliteStore::in_memory().unwrap());
        let lookup = Arc::new(StubLookup::default());
        let resolver =
            Resolver::new(cache, ProviderSet::new()).with_price_lookup(lookup.clone());

        let candidates = Candidates {
            steam_ids: vec!["400".into()],
            epic_slugs: vec!["portal-2".into()],
            ..Default::default()
        };
        let links = vec!["https://example.com/deal".to_string()];
        let resolution = resolver
            .resolve(request(&candidates, &links, "[Steam] (Game) Portal is free"))
            .await
            .unwrap();

        assert_eq!(
            *lookup.queries.lock().unwrap(),
            vec![
                LookupQuery::SteamId("400".into()),
                LookupQuery::EpicSlug("portal-2".into()),
                LookupQuery::Title("Portal".into()),
            ]
        );
        assert_eq!(resolution.source, ResolutionSource::Fallback);
        assert_eq!(resolution.details.name, "Portal");
    }

    #[tokio::test]
    async fn test_fallback_prefers_storefront_link_and_thumbnail() {
        let cache = Arc::new(SqliteStore::in_memory().unwrap());
        let resolver = Resolver::new(cache.clone(), ProviderSet::new());

        let candidates = Candidates::default();
        let links = vec![
            "https://example.com/post".to_string(),
            "https://gaming.amazon.com/loot/foo".to_string(),
        ];
        let resolution = resolver
            .resolve(ResolveRequest {
                candidates: &candidates,
                links: &links,
                text: "[Prime Gaming] (Game) Foo is free",
                thumbnail: Some("https://thumbs/foo.jpg"),
            })
            .await
            .unwrap();

        assert_eq!(resolution.source, ResolutionSource::Fallback);
        assert_eq!(resolution.details.name, "Foo");
        assert_eq!(
            resolution.details.store_url.as_deref(),
            Some("https://gaming.amazon.com/loot/foo")
        );
        assert_eq!(resolution.details.image.as_deref(), Some("https://thumbs/foo.jpg"));
        assert_eq!(cache.entry_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fallback_image_enrichment_skips_placeholder() {
        let cache = Arc::new(SqliteStore::in_memory().unwrap());
        let lookup = Arc::new(StubLookup {
            image: Some("https://itad/banner.jpg".into()),
            ..Default::default()
        });
        let resolver =
            Resolver::new(cache, ProviderSet::new()).with_price_lookup(lookup.clone());

        let candidates = Candidates::default();
        let links = vec!["https://example.com/x".to_string()];

        let placeholder = resolver
            .resolve(request(&candidates, &links, "see https://example.com/x for details"))
            .await
            .unwrap();
        assert_eq!(placeholder.details.name, PLACEHOLDER_TITLE);
        assert_eq!(placeholder.details.image, None);
        assert_eq!(lookup.image_requests.load(Ordering::SeqCst), 0);

        let named = resolver
            .resolve(request(&candidates, &links, "Some Short Title"))
            .await
            .unwrap();
        assert_eq!(named.details.image.as_deref(), Some("https://itad/banner.jpg"));
        assert_eq!(named.details.price, PriceInfo::Unpriced);
    }

    #[tokio::test]
    async fn test_fresh_result_without_image_is_enriched_before_caching() {
        let cache = Arc::new(SqliteStore::in_memory().unwrap());
        let lookup = Arc::new(StubLookup {
            image: Some("https://itad/portal.jpg".into()),
            ..Default::default()
        });
        let resolver = Resolver::new(
            cache.clone(),
            ProviderSet::new().with(StubProvider::ok(StoreKind::Steam, "Portal")),
        )
        .with_price_lookup(lookup);

        let candidates = steam_candidates();
        resolver.resolve(request(&candidates, &[], "")).await.unwrap();

        let cached = cache.get(StoreKind::Steam, "400").unwrap().unwrap();
        assert_eq!(cached.image.as_deref(), Some("https://itad/portal.jpg"));
    }

    #[tokio::test]
    async fn test_nothing_to_resolve() {
        let cache = Arc::new(SqliteStore::in_memory().unwrap());
        let resolver = Resolver::new(cache, ProviderSet::new());

        let candidates = Candidates::default();
        assert!(resolver
            .resolve(request(&candidates, &[], "[Steam] (Game) Portal is free"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_concurrent_resolutions_leave_one_row() {
        let cache = Arc::new(SqliteStore::in_memory().unwrap());
        let resolver = Arc::new(Resolver::new(
            cache.clone(),
            ProviderSet::new().with(StubProvider::ok(StoreKind::Steam, "Portal")),
        ));

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                tokio::spawn(async move {
                    resolver
                        .resolve_store(StoreKind::Steam, "400")
                        .await
                        .map(|r| r.details.name)
                })
            })
            .collect();

        for result in futures::future::join_all(tasks).await {
            assert_eq!(result.unwrap().as_deref(), Some("Portal"));
        }
        assert_eq!(cache.entry_count().unwrap(), 1);
    }
}
