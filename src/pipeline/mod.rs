//! Turns raw feed posts into announcements.
//!
//! Every post is claimed in the seen ledger before any extraction or
//! resolution happens. The claim is a single insert, so concurrent cycles
//! never both announce one post, and a crash mid-announcement loses the post
//! rather than repeating it.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::app::Result;
use crate::delivery::Delivery;
use crate::domain::{Announcement, Candidates, ContentType, PostContext, RawPost};
use crate::extract::{determine_content_type, is_reddit_link, is_safe_link};
use crate::fetcher::FeedSource;
use crate::resolver::{ResolveRequest, Resolver};
use crate::store::SeenLedger;

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    pub limit: usize,
    /// Reprocess seen posts and leave the ledger untouched.
    pub ignore_seen: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            limit: 25,
            ignore_seen: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub announced: usize,
    pub resolved: usize,
    pub delivered: usize,
    pub failed: usize,
}

pub struct Pipeline {
    ledger: Arc<dyn SeenLedger>,
    resolver: Arc<Resolver>,
}

/// Store links and reddit source links of one post.
fn split_links(post: &RawPost) -> (Vec<String>, Vec<String>) {
    post.all_links()
        .into_iter()
        .filter(|link| is_safe_link(link))
        .partition(|link| !is_reddit_link(link))
}

impl Pipeline {
    pub fn new(ledger: Arc<dyn SeenLedger>, resolver: Arc<Resolver>) -> Self {
        Self { ledger, resolver }
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Posts in feed order. A post whose ledger write fails is skipped so
    /// the posts already claimed are still returned; the error surfaces only
    /// when nothing could be announced.
    pub async fn scan(&self, posts: &[RawPost], ignore_seen: bool) -> Result<Vec<Announcement>> {
        let mut announcements = Vec::new();
        let mut last_error = None;

        for post in posts {
            match self.process_post(post, ignore_seen).await {
                Ok(Some(announcement)) => announcements.push(announcement),
                Ok(None) => {}
                Err(e) => {
                    error!("Failed to process {}: {}", post.id, e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if announcements.is_empty() => Err(e),
            _ => Ok(announcements),
        }
    }

    pub async fn process_post(
        &self,
        post: &RawPost,
        ignore_seen: bool,
    ) -> Result<Option<Announcement>> {
        if post.id.is_empty() {
            return Ok(None);
        }

        // Claiming is the seen check; only the caller that inserts the row
        // goes on to announce.
        if !ignore_seen && !self.ledger.mark_seen(&post.id)? {
            return Ok(None);
        }

        let content_type = determine_content_type(&post.title);
        if content_type == ContentType::Info {
            debug!("Skipping INFO post: {}", post.title);
            return Ok(None);
        }

        let (links, source_links) = split_links(post);

        let details = if links.is_empty() {
            debug!("No store links on {}, delivering raw text", post.id);
            None
        } else {
            let blob = format!("{} {}", post.title, links.join(" "));
            let candidates = Candidates::from_text(&blob);
            self.resolver
                .resolve(ResolveRequest {
                    candidates: &candidates,
                    links: &links,
                    text: &post.title,
                    thumbnail: post.thumbnail.as_deref(),
                })
                .await
                .map(|resolution| {
                    debug!("{} resolved via {}", post.id, resolution.source);
                    resolution.details
                })
        };

        Ok(Some(Announcement {
            post_id: post.id.clone(),
            details,
            context: PostContext {
                text: post.title.clone(),
                content_type,
                links,
                source_links,
                image: post.thumbnail.clone(),
            },
        }))
    }

    /// One fetch, scan and delivery pass.
    pub async fn run_cycle(
        &self,
        feed: &dyn FeedSource,
        delivery: &dyn Delivery,
        options: ScanOptions,
    ) -> Result<CycleReport> {
        let posts = feed.fetch_latest(options.limit).await?;
        if let Err(e) = self.ledger.record_check(Utc::now()) {
            warn!("Failed to record check time: {}", e);
        }
        let announcements = self.scan(&posts, options.ignore_seen).await?;

        let mut report = CycleReport {
            fetched: posts.len(),
            announced: announcements.len(),
            ..Default::default()
        };

        for announcement in &announcements {
            if announcement.details.is_some() {
                report.resolved += 1;
            }
            match delivery.deliver(announcement).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    // Already marked seen; this post will not be retried
                    error!("Failed to deliver {}: {}", announcement.post_id, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Cycle finished: {} fetched, {} new, {} resolved, {} delivered, {} failed",
            report.fetched, report.announced, report.resolved, report.delivered, report.failed
        );
        Ok(report)
    }
}
