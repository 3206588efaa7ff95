use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use feed_rs::model::Entry;
use feed_rs::parser;
use html_escape::decode_html_entities;
use regex::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::app::{FreebieError, Result};
use crate::domain::RawPost;
use crate::extract::is_reddit_link;
use crate::fetcher::{FeedSource, FetchResult, Fetcher};

pub const DEFAULT_SUBREDDIT: &str = "FreeGameFindings";

static LINK_ANCHOR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a\s+href\s*=\s*"([^"]+)"\s*>\s*\[link\]\s*</a>"#).expect("valid regex")
});

static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href\s*=\s*"([^"]+)""#).expect("valid regex"));

static IMG_SRC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<img\s+src\s*=\s*"([^"]+)""#).expect("valid regex"));

#[derive(Default)]
struct Validators {
    etag: Option<String>,
    last_modified: Option<String>,
}

/// The `/new` listing of one subreddit, read through its Atom feed.
pub struct RedditFeed {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    subreddit: String,
    validators: Mutex<Validators>,
}

impl RedditFeed {
    pub fn new(fetcher: Arc<dyn Fetcher + Send + Sync>, subreddit: impl Into<String>) -> Self {
        Self {
            fetcher,
            subreddit: subreddit.into(),
            validators: Mutex::new(Validators::default()),
        }
    }

    pub fn feed_url(&self, limit: usize) -> String {
        format!(
            "https://www.reddit.com/r/{}/new/.rss?limit={}",
            self.subreddit, limit
        )
    }
}

#[async_trait]
impl FeedSource for RedditFeed {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<RawPost>> {
        let url = self.feed_url(limit);
        let mut validators = self.validators.lock().await;

        let result = self
            .fetcher
            .fetch(
                &url,
                validators.etag.as_deref(),
                validators.last_modified.as_deref(),
            )
            .await?;

        match result {
            FetchResult::NotModified => {
                debug!("r/{} not modified since last fetch", self.subreddit);
                Ok(Vec::new())
            }
            FetchResult::Content {
                body,
                etag,
                last_modified,
            } => {
                // Validators only advance once the body is usable, otherwise
                // the next 304 would hide every post in this version.
                let mut posts = parse_feed(&url, &body)?;
                validators.etag = etag;
                validators.last_modified = last_modified;

                posts.truncate(limit);
                info!("Fetched {} posts from r/{}", posts.len(), self.subreddit);
                Ok(posts)
            }
        }
    }
}

/// Parses a reddit listing feed into posts, in feed order.
pub fn parse_feed(feed_url: &str, body: &[u8]) -> Result<Vec<RawPost>> {
    let feed = parser::parse(body).map_err(|e| FreebieError::FeedParse(e.to_string()))?;

    Ok(feed
        .entries
        .into_iter()
        .map(|entry| entry_to_post(feed_url, entry))
        .collect())
}

fn entry_to_post(feed_url: &str, entry: Entry) -> RawPost {
    let permalink = entry.links.first().map(|l| l.href.clone());
    let title = entry
        .title
        .as_ref()
        .map(|t| decode_html_entities(&t.content).trim().to_string())
        .unwrap_or_default();

    let id = if entry.id.is_empty() {
        let key = permalink.clone().unwrap_or_else(|| title.clone());
        RawPost::generate_id(feed_url, &key)
    } else {
        entry.id.clone()
    };

    let body = entry
        .content
        .as_ref()
        .and_then(|c| c.body.clone())
        .or_else(|| entry.summary.as_ref().map(|s| s.content.clone()))
        .unwrap_or_default();

    // Self posts point [link] back at their own permalink
    let external_url = LINK_ANCHOR
        .captures(&body)
        .map(|c| decode_html_entities(&c[1]).to_string())
        .filter(|link| Some(link) != permalink.as_ref());

    let links = HREF
        .captures_iter(&body)
        .map(|c| decode_html_entities(&c[1]).to_string())
        .filter(|link| !link.contains("/user/") && Some(link) != permalink.as_ref())
        .filter(|link| Some(link) != external_url.as_ref() && !is_reddit_link(link))
        .collect();

    let thumbnail = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .next()
        .or_else(|| {
            IMG_SRC
                .captures(&body)
                .map(|c| decode_html_entities(&c[1]).to_string())
        });

    RawPost {
        id,
        title,
        url: permalink,
        external_url,
        links,
        thumbnail,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    const FEED_URL: &str = "https://www.reddit.com/r/FreeGameFindings/new/.rss?limit=25";

    const REDDIT_SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom" xmlns:media="http://search.yahoo.com/mrss/">
  <id>/r/FreeGameFindings/new/.rss</id>
  <title>newest submissions : FreeGameFindings</title>
  <updated>2024-05-01T12:00:00+00:00</updated>
  <entry>
    <author><name>/u/someone</name></author>
    <content type="html">&lt;table&gt; &lt;tr&gt;&lt;td&gt; &lt;a href=&quot;https://www.reddit.com/r/FreeGameFindings/comments/1abc/portal/&quot;&gt; &lt;img src=&quot;https://b.thumbs.redditmedia.com/portal.jpg&quot; alt=&quot;[Steam] (Game) Portal is free&quot; /&gt; &lt;/a&gt; &lt;/td&gt;&lt;td&gt; submitted by &lt;a href=&quot;https://www.reddit.com/user/someone&quot;&gt; /u/someone &lt;/a&gt; &lt;br/&gt; &lt;span&gt;&lt;a href=&quot;https://store.steampowered.com/app/400/Portal/?utm_source=fgf&amp;amp;snr=1&quot;&gt;[link]&lt;/a&gt;&lt;/span&gt; &lt;span&gt;&lt;a href=&quot;https://www.reddit.com/r/FreeGameFindings/comments/1abc/portal/&quot;&gt;[comments]&lt;/a&gt;&lt;/span&gt; &lt;/td&gt;&lt;/tr&gt;&lt;/table&gt;</content>
    <id>t3_1abc</id>
    <link href="https://www.reddit.com/r/FreeGameFindings/comments/1abc/portal/" />
    <updated>2024-05-01T11:00:00+00:00</updated>
    <title>[Steam] (Game) Portal is free &amp; great</title>
  </entry>
  <entry>
    <author><name>/u/mod</name></author>
    <content type="html">&lt;div class=&quot;md&quot;&gt;&lt;p&gt;Grab it at &lt;a href=&quot;https://gaming.amazon.com/loot/foo&quot;&gt;Prime&lt;/a&gt;&lt;/p&gt;&lt;/div&gt; &lt;span&gt;&lt;a href=&quot;https://www.reddit.com/r/FreeGameFindings/comments/2def/psa/&quot;&gt;[link]&lt;/a&gt;&lt;/span&gt;</content>
    <id>t3_2def</id>
    <link href="https://www.reddit.com/r/FreeGameFindings/comments/2def/psa/" />
    <updated>2024-05-01T10:00:00+00:00</updated>
    <title>[Prime Gaming] (Game) Foo is free</title>
  </entry>
</feed>"#;

    #[test]
    fn test_parse_link_post() {
        let posts = parse_feed(FEED_URL, REDDIT_SAMPLE.as_bytes()).unwrap();
        assert_eq!(posts.len(), 2);

        let post = &posts[0];
        assert_eq!(post.id, "t3_1abc");
        assert_eq!(post.title, "[Steam] (Game) Portal is free & great");
        assert_eq!(
            post.url.as_deref(),
            Some("https://www.reddit.com/r/FreeGameFindings/comments/1abc/portal/")
        );
        assert_eq!(
            post.external_url.as_deref(),
            Some("https://store.steampowered.com/app/400/Portal/?utm_source=fgf&snr=1")
        );
        assert!(post.links.is_empty());
        assert_eq!(
            post.thumbnail.as_deref(),
            Some("https://b.thumbs.redditmedia.com/portal.jpg")
        );
    }

    #[test]
    fn test_parse_self_post_collects_body_links() {
        let posts = parse_feed(FEED_URL, REDDIT_SAMPLE.as_bytes()).unwrap();
        let post = &posts[1];
        assert_eq!(post.external_url, None);
        assert_eq!(post.links, vec!["https://gaming.amazon.com/loot/foo"]);
        assert_eq!(post.thumbnail, None);
    }

    #[test]
    fn test_parse_garbage_is_feed_error() {
        assert!(matches!(
            parse_feed(FEED_URL, b"not a feed"),
            Err(FreebieError::FeedParse(_))
        ));
    }

    struct StubFetcher {
        calls: AtomicUsize,
        truncate_first: bool,
    }

    impl StubFetcher {
        fn new(truncate_first: bool) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                truncate_first,
            }
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn fetch(
            &self,
            _url: &str,
            etag: Option<&str>,
            _last_modified: Option<&str>,
        ) -> Result<FetchResult> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if etag == Some("\"v1\"") {
                return Ok(FetchResult::NotModified);
            }
            let body = if self.truncate_first && call == 0 {
                &REDDIT_SAMPLE[..REDDIT_SAMPLE.len() / 2]
            } else {
                REDDIT_SAMPLE
            };
            Ok(FetchResult::Content {
                body: body.as_bytes().to_vec(),
                etag: Some("\"v1\"".into()),
                last_modified: None,
            })
        }
    }

    #[tokio::test]
    async fn test_fetch_latest_honors_limit_and_etag() {
        let fetcher = Arc::new(StubFetcher::new(false));
        let feed = RedditFeed::new(fetcher.clone(), DEFAULT_SUBREDDIT);

        let posts = feed.fetch_latest(1).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].id, "t3_1abc");

        let again = feed.fetch_latest(1).await.unwrap();
        assert!(again.is_empty());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unparseable_body_does_not_advance_validators() {
        let fetcher = Arc::new(StubFetcher::new(true));
        let feed = RedditFeed::new(fetcher.clone(), DEFAULT_SUBREDDIT);

        assert!(matches!(
            feed.fetch_latest(25).await,
            Err(FreebieError::FeedParse(_))
        ));

        let posts = feed.fetch_latest(25).await.unwrap();
        assert!(!posts.is_empty());
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_feed_url() {
        let feed = RedditFeed::new(
            Arc::new(StubFetcher::new(false)),
            "FreeGameFindings",
        );
        assert_eq!(feed.feed_url(25), FEED_URL);
    }
}
