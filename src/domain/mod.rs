pub mod game;
pub mod post;
pub mod store_kind;

pub use game::{CacheEntry, GameDetails, PriceInfo, PLACEHOLDER_TITLE};
pub use post::{
    Announcement, Candidates, ContentType, LedgerStats, PostContext, RawPost, SeenEntry,
};
pub use store_kind::StoreKind;
