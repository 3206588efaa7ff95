//! # Freebie
//!
//! Turns free-game announcement posts into structured store metadata.
//!
//! ## Architecture
//!
//! ```text
//! Feed → Extract → Resolver (Cache → Provider → Price lookup → Fallback) → Delivery
//! ```
//!
//! - [`fetcher`]: Reddit feed polling with retries and conditional requests
//! - [`extract`]: Store identifiers, titles and content type from post text
//! - [`resolver`]: Cache-first metadata resolution across storefronts
//! - [`store`]: SQLite metadata cache and seen-post ledger
//! - [`delivery`]: Announcement rendering
//!
//! ## Quick Start
//!
//! ```bash
//! # Scan the feed once
//! freebie scan
//!
//! # Resolve a single link
//! freebie resolve "https://store.steampowered.com/app/400/"
//!
//! # Scan every 30 minutes
//! freebie daemon --interval 30m
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store,
/// providers, resolver, feed and pipeline.
pub mod app;

/// Command-line interface using clap.
pub mod cli;

/// Configuration loaded from `~/.config/freebie/config.toml`.
pub mod config;

/// Scheduled scanning with signal-driven shutdown.
pub mod daemon;

/// Rendering and output of announcements.
pub mod delivery;

/// Core domain models.
///
/// - [`StoreKind`](domain::StoreKind): Supported storefronts in priority order
/// - [`GameDetails`](domain::GameDetails): Normalized metadata record
/// - [`RawPost`](domain::RawPost): A post as fetched from the feed
pub mod domain;

/// Pattern-based extraction from post text.
pub mod extract;

/// HTTP fetching and the Reddit feed source.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for conditional fetching
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation with retries
/// - [`RedditFeed`](fetcher::RedditFeed): Atom feed of a subreddit
pub mod fetcher;

/// Per-post processing and scan cycles.
pub mod pipeline;

/// Storefront metadata providers and the IsThereAnyDeal lookup.
pub mod provider;

/// Async rate limiting shared by providers.
pub mod rate_limiter;

/// Cache-first metadata resolution.
pub mod resolver;

/// SQLite persistence layer.
///
/// - [`GameCache`](store::GameCache): Metadata cache operations
/// - [`SeenLedger`](store::SeenLedger): Processed post IDs
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation of both
pub mod store;
