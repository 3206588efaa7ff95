use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::app::error::{FreebieError, Result};
use crate::config::Config;
use crate::delivery::Delivery;
use crate::domain::StoreKind;
use crate::fetcher::{FeedSource, Fetcher, HttpFetcher, RedditFeed, RetryPolicy};
use crate::pipeline::{CycleReport, Pipeline, ScanOptions};
use crate::provider::{
    EpicProvider, GogProvider, HttpClient, ItadLookup, ItchProvider, PlayStationProvider,
    ProviderSet, SteamProvider,
};
use crate::resolver::Resolver;
use crate::store::sqlite::SqliteStore;

pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    /// Present only when an API key is configured.
    pub itad: Option<Arc<ItadLookup>>,
    pub resolver: Arc<Resolver>,
    pub pipeline: Pipeline,
    pub feed: Arc<dyn FeedSource>,
}

impl AppContext {
    /// `db_path` wins over the configured database path.
    pub fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path.or_else(|| config.storage.database_path.clone()) {
            Some(p) => p,
            None => Self::default_db_path()?,
        };
        debug!("Opening database at {}", db_path.display());

        let store = SqliteStore::new(&db_path)?.with_transient_ttl(config.storage.transient_ttl());
        Self::with_store(config, Arc::new(store))
    }

    pub fn in_memory() -> Result<Self> {
        let config = Config::default();
        let store = SqliteStore::in_memory()?.with_transient_ttl(config.storage.transient_ttl());
        Self::with_store(config, Arc::new(store))
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Result<Self> {
        let http = HttpClient::new(&config.providers.user_agent, config.providers.timeout())?;

        let itad = config.providers.itad_key().map(|key| {
            let rate = config.providers.rate(StoreKind::Itad);
            Arc::new(
                ItadLookup::new(http.clone(), key, rate)
                    .with_country(config.providers.itad_country.clone()),
            )
        });

        let mut resolver = Resolver::new(store.clone(), Self::build_providers(&http, &config));
        match &itad {
            Some(itad) => resolver = resolver.with_price_lookup(itad.clone()),
            None => info!("No IsThereAnyDeal API key configured; generic lookup disabled"),
        }
        let resolver = Arc::new(resolver);

        let retry = RetryPolicy {
            max_attempts: config.feed.max_retries,
            base_delay: Duration::from_millis(config.feed.base_delay_ms),
        };
        let fetcher: Arc<dyn Fetcher + Send + Sync> =
            Arc::new(HttpFetcher::new(http.inner().clone()).with_retry(retry));
        let feed: Arc<dyn FeedSource> =
            Arc::new(RedditFeed::new(fetcher, config.feed.subreddit.clone()));

        let pipeline = Pipeline::new(store.clone(), resolver.clone());

        Ok(Self {
            config,
            store,
            itad,
            resolver,
            pipeline,
            feed,
        })
    }

    /// Replace the upstream feed, e.g. with a fixed set of posts.
    pub fn with_feed(mut self, feed: Arc<dyn FeedSource>) -> Self {
        self.feed = feed;
        self
    }

    /// One provider per store, each with its own rate limiter.
    pub fn build_providers(http: &HttpClient, config: &Config) -> ProviderSet {
        let rates = &config.providers;
        ProviderSet::new()
            .with(Arc::new(SteamProvider::new(
                http.clone(),
                rates.rate(StoreKind::Steam),
            )))
            .with(Arc::new(EpicProvider::new(
                http.clone(),
                rates.rate(StoreKind::Epic),
            )))
            .with(Arc::new(ItchProvider::new(
                http.clone(),
                rates.rate(StoreKind::Itch),
            )))
            .with(Arc::new(PlayStationProvider::new(
                http.clone(),
                rates.rate(StoreKind::PlayStation),
            )))
            .with(Arc::new(GogProvider::new(
                http.clone(),
                rates.rate(StoreKind::Gog),
            )))
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            limit: self.config.feed.limit,
            ignore_seen: false,
        }
    }

    pub async fn run_cycle(
        &self,
        delivery: &dyn Delivery,
        options: ScanOptions,
    ) -> Result<CycleReport> {
        self.pipeline
            .run_cycle(self.feed.as_ref(), delivery, options)
            .await
    }

    pub fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| FreebieError::Config("Could not find data directory".into()))?;
        let freebie_dir = data_dir.join("freebie");
        std::fs::create_dir_all(&freebie_dir)?;
        Ok(freebie_dir.join("freebie.db"))
    }
}
