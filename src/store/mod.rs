pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{CacheEntry, GameDetails, LedgerStats, SeenEntry, StoreKind};

pub use sqlite::SqliteStore;

/// Durable `(store, identifier) -> GameDetails` cache.
pub trait GameCache: Send + Sync {
    /// Live entry only; expired transient rows read as absent.
    fn get(&self, store: StoreKind, identifier: &str) -> Result<Option<GameDetails>>;
    /// Raw row, including expired ones.
    fn get_entry(&self, store: StoreKind, identifier: &str) -> Result<Option<CacheEntry>>;
    fn put(&self, store: StoreKind, identifier: &str, data: &GameDetails, permanent: bool)
        -> Result<()>;
    fn clear(&self) -> Result<usize>;
    fn entry_count(&self) -> Result<usize>;
}

/// Post IDs that have already been processed.
pub trait SeenLedger: Send + Sync {
    fn is_seen(&self, post_id: &str) -> Result<bool>;
    /// Claims `post_id`; `false` when it was already recorded.
    fn mark_seen(&self, post_id: &str) -> Result<bool>;
    fn seen_entry(&self, post_id: &str) -> Result<Option<SeenEntry>>;
    fn record_check(&self, at: DateTime<Utc>) -> Result<()>;
    fn stats(&self) -> Result<LedgerStats>;
}
