use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::app::{AppContext, FreebieError, Result};
use crate::daemon::{Daemon, DaemonConfig};
use crate::delivery::{price_line, render_announcement, Delivery};
use crate::domain::{RawPost, StoreKind};
use crate::extract::extract_urls;
use crate::pipeline::ScanOptions;
use crate::store::{GameCache, SeenLedger};

pub async fn scan(
    ctx: &AppContext,
    delivery: &dyn Delivery,
    limit: Option<usize>,
    ignore_seen: bool,
) -> Result<()> {
    let options = ScanOptions {
        limit: limit.unwrap_or(ctx.config.feed.limit),
        ignore_seen,
    };

    let report = ctx.run_cycle(delivery, options).await?;

    println!(
        "Scan complete: {} fetched, {} new, {} resolved, {} delivered, {} failed",
        report.fetched, report.announced, report.resolved, report.delivered, report.failed
    );
    Ok(())
}

/// Runs free text through the same path a feed post takes, without
/// touching the seen ledger.
pub async fn resolve(ctx: &AppContext, text: &str) -> Result<()> {
    let mut post = RawPost::new(RawPost::generate_id("manual", text), text.trim());
    post.links = extract_urls(text);

    match ctx.pipeline.process_post(&post, true).await? {
        Some(announcement) => println!("{}", render_announcement(&announcement)),
        None => println!("Nothing to announce (informational post)"),
    }
    Ok(())
}

pub fn cache_clear(ctx: &AppContext) -> Result<()> {
    let removed = ctx.store.clear()?;
    println!("Removed {} cached entries", removed);
    Ok(())
}

pub fn cache_show(ctx: &AppContext, store: &str, identifier: &str) -> Result<()> {
    let store: StoreKind = store.parse().map_err(FreebieError::Other)?;

    let Some(entry) = ctx.store.get_entry(store, identifier)? else {
        println!("No cache entry for {}:{}", store, identifier);
        return Ok(());
    };

    let details = &entry.data;
    println!("{} ({}:{})", details.name, entry.store, entry.identifier);
    println!(
        "  fetched {}{}",
        entry.fetched_at.format("%Y-%m-%d %H:%M:%S UTC"),
        if entry.permanent { ", permanent" } else { "" }
    );
    println!("  free: {}", details.is_free);
    if let Some(price) = price_line(&details.price) {
        println!("  price: {}", price);
    }
    if let Some(url) = &details.store_url {
        println!("  url: {}", url);
    }
    if let Some(image) = &details.image {
        println!("  image: {}", image);
    }
    Ok(())
}

pub async fn price(ctx: &AppContext, title: &str) -> Result<()> {
    let itad = ctx.itad.as_ref().ok_or_else(|| {
        FreebieError::Config("IsThereAnyDeal API key is not configured".into())
    })?;

    let check = itad
        .price_check(title)
        .await
        .map_err(|e| FreebieError::Other(format!("price check failed: {}", e)))?;

    match check {
        Some(check) => {
            if !check.exact {
                println!("Exact match not found, showing results for: {}", check.game.title);
            }
            println!("{}", check.summary());
        }
        None => println!("No price information for '{}'", title),
    }
    Ok(())
}

pub fn status(ctx: &AppContext) -> Result<()> {
    let stats = ctx.store.stats()?;
    let format = |t: Option<DateTime<Utc>>| {
        t.map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "never".to_string())
    };

    println!("Last check: {}", format(stats.last_check_at));
    println!(
        "Seen posts: {} (latest {})",
        stats.seen_posts,
        format(stats.last_seen_at)
    );
    println!("Cached games: {}", ctx.store.entry_count()?);
    Ok(())
}

pub fn seen(ctx: &AppContext, post_id: &str) -> Result<()> {
    match ctx.store.seen_entry(post_id)? {
        Some(entry) => println!(
            "{} seen at {}",
            entry.post_id,
            entry.inserted_at.format("%Y-%m-%d %H:%M:%S UTC")
        ),
        None => println!("{} has not been seen", post_id),
    }
    Ok(())
}

pub async fn daemon(
    ctx: Arc<AppContext>,
    delivery: Arc<dyn Delivery>,
    interval: Option<&str>,
    no_initial_scan: bool,
) -> Result<()> {
    let mut config = DaemonConfig::from_section(&ctx.config.daemon).map_err(FreebieError::Config)?;
    if let Some(interval) = interval {
        config.interval_secs = DaemonConfig::parse_interval(interval).map_err(FreebieError::Config)?;
    }
    if no_initial_scan {
        config.scan_on_start = false;
    }

    Daemon::new(ctx, delivery, config).run().await
}
