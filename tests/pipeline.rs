use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_test::assert_ok;

use freebie::app::{FreebieError, Result};
use freebie::delivery::{render_announcement, Delivery};
use freebie::domain::{Announcement, GameDetails, PriceInfo, RawPost, StoreKind};
use freebie::fetcher::FeedSource;
use freebie::pipeline::{Pipeline, ScanOptions};
use freebie::provider::{Provider, ProviderResult, ProviderSet};
use freebie::resolver::Resolver;
use freebie::store::{GameCache, SeenLedger, SqliteStore};

struct FakeSteam {
    calls: AtomicUsize,
}

#[async_trait]
impl Provider for FakeSteam {
    fn store(&self) -> StoreKind {
        StoreKind::Steam
    }

    async fn fetch_details(&self, identifier: &str) -> ProviderResult<GameDetails> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut details = GameDetails::new("Portal")
            .unwrap()
            .with_store_url(StoreKind::Steam.store_url(identifier));
        details.developers = vec!["Valve".into()];
        details.image = Some("https://cdn.example.com/portal.jpg".into());
        details.set_price(
            PriceInfo::Structured {
                original: Some("$9.99".into()),
                current: Some("$0.00".into()),
                discount_percent: Some(100),
                currency: Some("USD".into()),
            },
            true,
        );
        Ok(details)
    }
}

struct FixedFeed(Vec<RawPost>);

#[async_trait]
impl FeedSource for FixedFeed {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<RawPost>> {
        Ok(self.0.iter().take(limit).cloned().collect())
    }
}

#[derive(Default)]
struct Recorder {
    delivered: Mutex<Vec<Announcement>>,
    fail: bool,
}

#[async_trait]
impl Delivery for Recorder {
    async fn deliver(&self, announcement: &Announcement) -> Result<()> {
        if self.fail {
            return Err(FreebieError::Other("webhook down".into()));
        }
        self.delivered.lock().unwrap().push(announcement.clone());
        Ok(())
    }
}

fn setup() -> (Arc<SqliteStore>, Arc<FakeSteam>, Pipeline) {
    let store = Arc::new(SqliteStore::in_memory().unwrap());
    let steam = Arc::new(FakeSteam {
        calls: AtomicUsize::new(0),
    });
    let resolver = Resolver::new(store.clone(), ProviderSet::new().with(steam.clone()));
    let pipeline = Pipeline::new(store.clone(), Arc::new(resolver));
    (store, steam, pipeline)
}

fn reddit_post(id: &str, title: &str, external: &str) -> RawPost {
    let mut post = RawPost::new(id, title);
    post.url = Some(format!(
        "https://www.reddit.com/r/FreeGameFindings/comments/{}/",
        id
    ));
    post.external_url = Some(external.to_string());
    post
}

fn portal_post() -> RawPost {
    reddit_post(
        "t3_portal",
        "[Steam] (Game) Portal",
        "https://store.steampowered.com/app/400/",
    )
}

#[tokio::test]
async fn steam_post_resolves_and_caches_permanently() {
    let (store, steam, pipeline) = setup();

    let announcements = pipeline.scan(&[portal_post()], false).await.unwrap();
    assert_eq!(announcements.len(), 1);

    let details = announcements[0].details.as_ref().unwrap();
    assert_eq!(details.name, "Portal");
    assert!(details.is_free);
    assert_eq!(
        details.store_url.as_deref(),
        Some("https://store.steampowered.com/app/400/")
    );
    assert_eq!(steam.calls.load(Ordering::SeqCst), 1);

    let entry = store.get_entry(StoreKind::Steam, "400").unwrap().unwrap();
    assert!(entry.permanent);
    assert_eq!(entry.data.name, "Portal");
    assert_eq!(store.entry_count().unwrap(), 1);
    assert!(store.is_seen("t3_portal").unwrap());

    let rendered = render_announcement(&announcements[0]);
    assert!(rendered.contains("Portal"));
    assert!(rendered.contains("$9.99"));
}

#[tokio::test]
async fn repeated_post_is_skipped_without_provider_calls() {
    let (_store, steam, pipeline) = setup();

    assert_eq!(pipeline.scan(&[portal_post()], false).await.unwrap().len(), 1);
    assert!(pipeline.scan(&[portal_post()], false).await.unwrap().is_empty());
    assert_eq!(steam.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cached_game_serves_other_posts_without_provider_calls() {
    let (_store, steam, pipeline) = setup();
    let repost = reddit_post(
        "t3_repost",
        "[Steam] (Game) Portal again",
        "https://store.steampowered.com/app/400/Portal/",
    );

    pipeline.scan(&[portal_post()], false).await.unwrap();
    let announcements = pipeline.scan(&[repost], false).await.unwrap();

    assert_eq!(announcements[0].details.as_ref().unwrap().name, "Portal");
    assert_eq!(steam.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn giveaway_only_post_delivers_raw_text() {
    let (store, steam, pipeline) = setup();
    let giveaway = reddit_post(
        "t3_gleam",
        "[Gleam] (Game) Some Giveaway",
        "https://gleam.io/abc/some-giveaway",
    );

    let announcements = pipeline.scan(&[giveaway], false).await.unwrap();
    assert_eq!(announcements.len(), 1);
    assert!(announcements[0].details.is_none());

    let rendered = render_announcement(&announcements[0]);
    assert!(rendered.contains("Some Giveaway"));
    assert!(!rendered.contains("gleam.io"));

    assert_eq!(steam.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.entry_count().unwrap(), 0);
}

#[tokio::test]
async fn run_cycle_reports_counts() {
    let (store, _steam, pipeline) = setup();
    let feed = FixedFeed(vec![
        portal_post(),
        reddit_post(
            "t3_gleam",
            "[Gleam] (Game) Some Giveaway",
            "https://gleam.io/abc",
        ),
        reddit_post("t3_psa", "[PSA] Read the rules", "https://example.com/rules"),
        RawPost::new("", "entry without an id"),
    ]);
    let delivery = Recorder::default();

    let report = pipeline
        .run_cycle(&feed, &delivery, ScanOptions::default())
        .await
        .unwrap();

    assert_eq!(report.fetched, 4);
    assert_eq!(report.announced, 2);
    assert_eq!(report.resolved, 1);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.failed, 0);
    assert!(store.is_seen("t3_psa").unwrap());

    let stats = store.stats().unwrap();
    assert_eq!(stats.seen_posts, 3);
    assert!(stats.last_check_at.is_some());

    let ids: Vec<String> = delivery
        .delivered
        .lock()
        .unwrap()
        .iter()
        .map(|a| a.post_id.clone())
        .collect();
    assert_eq!(ids, vec!["t3_portal", "t3_gleam"]);
}

#[tokio::test]
async fn failed_delivery_is_counted_and_not_retried() {
    let (store, _steam, pipeline) = setup();
    let feed = FixedFeed(vec![portal_post()]);
    let delivery = Recorder {
        fail: true,
        ..Default::default()
    };

    let report = assert_ok!(
        pipeline
            .run_cycle(&feed, &delivery, ScanOptions::default())
            .await
    );
    assert_eq!(report.failed, 1);
    assert_eq!(report.delivered, 0);
    assert!(store.is_seen("t3_portal").unwrap());

    let again = pipeline
        .run_cycle(&feed, &delivery, ScanOptions::default())
        .await
        .unwrap();
    assert_eq!(again.announced, 0);
}

#[tokio::test]
async fn feed_limit_is_honored() {
    let (_store, _steam, pipeline) = setup();
    let feed = FixedFeed(
        (0..5)
            .map(|i| reddit_post(&format!("t3_{}", i), "[PSA] note", "https://example.com"))
            .collect(),
    );

    let report = pipeline
        .run_cycle(
            &feed,
            &Recorder::default(),
            ScanOptions {
                limit: 2,
                ignore_seen: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(report.fetched, 2);
}
