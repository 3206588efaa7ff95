pub mod http_fetcher;
pub mod reddit;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::RawPost;

pub use http_fetcher::{HttpFetcher, RetryPolicy};
pub use reddit::RedditFeed;

#[derive(Debug)]
pub enum FetchResult {
    /// New content fetched successfully
    Content {
        body: Vec<u8>,
        etag: Option<String>,
        last_modified: Option<String>,
    },
    /// Content not modified (HTTP 304)
    NotModified,
}

#[async_trait]
pub trait Fetcher {
    async fn fetch(
        &self,
        url: &str,
        etag: Option<&str>,
        last_modified: Option<&str>,
    ) -> Result<FetchResult>;
}

/// An upstream source of announcement posts.
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Newest posts first, at most `limit` of them.
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<RawPost>>;
}
