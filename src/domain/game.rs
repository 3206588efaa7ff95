use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::StoreKind;

/// Placeholder title used when nothing better could be extracted from a post.
pub const PLACEHOLDER_TITLE: &str = "Free Game";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceInfo {
    FreeToPlay,
    Formatted {
        text: String,
    },
    Structured {
        original: Option<String>,
        current: Option<String>,
        discount_percent: Option<u32>,
        currency: Option<String>,
    },
    Unpriced,
}

impl PriceInfo {
    pub fn formatted(text: impl Into<String>) -> Self {
        PriceInfo::Formatted { text: text.into() }
    }
}

/// Normalized metadata for one game, independent of the store it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredDetails")]
pub struct GameDetails {
    pub name: String,
    pub is_free: bool,
    pub developers: Vec<String>,
    pub publishers: Vec<String>,
    pub release_date: Option<String>,
    pub image: Option<String>,
    pub price: PriceInfo,
    pub store_url: Option<String>,
}

/// Wire form of [`GameDetails`], checked before it becomes one.
#[derive(Deserialize)]
struct StoredDetails {
    name: String,
    is_free: bool,
    developers: Vec<String>,
    publishers: Vec<String>,
    release_date: Option<String>,
    image: Option<String>,
    price: PriceInfo,
    store_url: Option<String>,
}

impl TryFrom<StoredDetails> for GameDetails {
    type Error = String;

    fn try_from(stored: StoredDetails) -> Result<Self, Self::Error> {
        let mut details =
            GameDetails::new(&stored.name).ok_or_else(|| "game details without a name".to_string())?;
        details.is_free = stored.is_free;
        details.developers = stored.developers;
        details.publishers = stored.publishers;
        details.release_date = stored.release_date;
        details.image = stored.image;
        details.price = stored.price;
        details.store_url = stored.store_url;
        Ok(details)
    }
}

impl GameDetails {
    /// Returns `None` for blank names; a nameless record is never valid.
    pub fn new(name: impl AsRef<str>) -> Option<Self> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            is_free: false,
            developers: Vec::new(),
            publishers: Vec::new(),
            release_date: None,
            image: None,
            price: PriceInfo::Unpriced,
            store_url: None,
        })
    }

    /// Sets the price, keeping `is_free` consistent with `FreeToPlay`.
    pub fn set_price(&mut self, price: PriceInfo, is_free: bool) {
        self.is_free = is_free || price == PriceInfo::FreeToPlay;
        self.price = price;
    }

    pub fn with_store_url(mut self, url: Option<String>) -> Self {
        self.store_url = url;
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.name == PLACEHOLDER_TITLE
    }

    /// Fills in a missing image; an existing one is never replaced.
    pub fn fill_image(&mut self, image: Option<String>) -> bool {
        if self.image.is_some() {
            return false;
        }
        match image.filter(|i| !i.trim().is_empty()) {
            Some(image) => {
                self.image = Some(image);
                true
            }
            None => false,
        }
    }
}

/// One row of the metadata cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub store: StoreKind,
    pub identifier: String,
    pub fetched_at: DateTime<Utc>,
    pub data: GameDetails,
    pub permanent: bool,
}
