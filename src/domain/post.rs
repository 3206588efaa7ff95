use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::{GameDetails, StoreKind};

/// A post as produced by a feed source, before any extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawPost {
    pub id: String,
    pub title: String,
    /// Permalink of the post on the feed site.
    pub url: Option<String>,
    /// Link the post points at, when it is not a self post.
    pub external_url: Option<String>,
    /// Any further links found in the post body.
    pub links: Vec<String>,
    pub thumbnail: Option<String>,
}

impl RawPost {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            ..Default::default()
        }
    }

    /// Stable ID for feed entries that carry none of their own.
    pub fn generate_id(feed_url: &str, entry_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(feed_url.as_bytes());
        hasher.update(entry_key.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Every link on the post in first-seen order, without duplicates.
    pub fn all_links(&self) -> Vec<String> {
        let mut links: Vec<String> = Vec::new();
        let candidates = self
            .external_url
            .iter()
            .chain(self.url.iter())
            .chain(self.links.iter());

        for link in candidates {
            let link = link.trim();
            if !link.is_empty() && !links.iter().any(|l| l == link) {
                links.push(link.to_string());
            }
        }
        links
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    Game,
    Item,
    Info,
    Unknown,
}

/// Identifiers extracted from one post, grouped by store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidates {
    pub steam_ids: Vec<String>,
    pub epic_slugs: Vec<String>,
    pub itch_urls: Vec<String>,
    pub ps_urls: Vec<String>,
    pub gog_urls: Vec<String>,
    /// Best-effort title from the post text, used by the generic lookup.
    pub title: Option<String>,
}

impl Candidates {
    pub fn group(&self, store: StoreKind) -> &[String] {
        match store {
            StoreKind::Steam => &self.steam_ids,
            StoreKind::Epic => &self.epic_slugs,
            StoreKind::Itch => &self.itch_urls,
            StoreKind::PlayStation => &self.ps_urls,
            StoreKind::Gog => &self.gog_urls,
            StoreKind::Itad => &[],
        }
    }

    /// The single identifier a post resolves through: the first entry of the
    /// first non-empty group in store priority order.
    pub fn primary(&self) -> Option<(StoreKind, &str)> {
        StoreKind::PRIORITY.iter().find_map(|store| {
            self.group(*store)
                .first()
                .map(|id| (*store, id.as_str()))
        })
    }

    pub fn is_empty(&self) -> bool {
        self.primary().is_none()
    }
}

/// What the delivery side needs to know about the original post.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostContext {
    pub text: String,
    pub content_type: ContentType,
    pub links: Vec<String>,
    pub source_links: Vec<String>,
    pub image: Option<String>,
}

/// A processed post, ready to hand to a delivery collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Announcement {
    pub post_id: String,
    pub details: Option<GameDetails>,
    pub context: PostContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeenEntry {
    pub post_id: String,
    pub inserted_at: DateTime<Utc>,
}

/// Ledger totals shown by the `status` command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerStats {
    pub seen_posts: usize,
    pub last_seen_at: Option<DateTime<Utc>>,
    /// When a feed fetch last succeeded.
    pub last_check_at: Option<DateTime<Utc>>,
}
