//! Hand-off of processed posts to whatever announces them.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::{Announcement, ContentType, GameDetails, PostContext, PriceInfo, StoreKind};

const MAX_LINKS: usize = 5;
const MAX_SOURCES: usize = 3;

/// Resolvable storefronts by URL fragment, checked in order.
const STORE_DOMAINS: [(&str, StoreKind); 5] = [
    ("store.steampowered.com", StoreKind::Steam),
    ("store.epicgames.com", StoreKind::Epic),
    ("itch.io", StoreKind::Itch),
    ("gog.com", StoreKind::Gog),
    ("store.playstation.com", StoreKind::PlayStation),
];

/// Platforms that are named in announcements but never resolved.
const OTHER_PLATFORMS: [(&str, &str); 3] = [
    ("amazon.com", "Amazon Prime Gaming"),
    ("onstove.com", "STOVE"),
    ("stove.com", "STOVE"),
];

#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, announcement: &Announcement) -> Result<()>;
}

/// Writes rendered announcements to stdout.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleDelivery;

#[async_trait]
impl Delivery for ConsoleDelivery {
    async fn deliver(&self, announcement: &Announcement) -> Result<()> {
        println!("{}\n", render_announcement(announcement));
        Ok(())
    }
}

pub fn platform_name(url: &str) -> Option<&'static str> {
    STORE_DOMAINS
        .iter()
        .find(|(fragment, _)| url.contains(fragment))
        .map(|(_, store)| store.display_name())
        .or_else(|| {
            OTHER_PLATFORMS
                .iter()
                .find(|(fragment, _)| url.contains(fragment))
                .map(|(_, name)| *name)
        })
}

/// Lowercased URL without query, fragment or trailing slash.
pub fn normalize_url(url: &str) -> String {
    let url = url.split(['?', '#']).next().unwrap_or_default();
    url.trim_end_matches('/').to_lowercase()
}

pub fn render_announcement(announcement: &Announcement) -> String {
    match &announcement.details {
        Some(details) => render_details(details, &announcement.context),
        None => render_plain(&announcement.context),
    }
}

fn title_prefix(content_type: ContentType) -> &'static str {
    match content_type {
        ContentType::Game => "FREE GAME",
        ContentType::Item => "FREE ITEM",
        ContentType::Info | ContentType::Unknown => "FREE",
    }
}

pub fn price_line(price: &PriceInfo) -> Option<String> {
    match price {
        PriceInfo::FreeToPlay => Some("Free to Play".to_string()),
        PriceInfo::Formatted { text } => Some(text.clone()),
        PriceInfo::Structured {
            original,
            discount_percent,
            ..
        } => Some(format!(
            "~~{}~~ -> FREE ({}% off)",
            original.as_deref().unwrap_or("N/A"),
            discount_percent.unwrap_or(0)
        )),
        PriceInfo::Unpriced => None,
    }
}

fn render_details(details: &GameDetails, context: &PostContext) -> String {
    let store_url = details
        .store_url
        .as_deref()
        .or_else(|| context.links.first().map(String::as_str))
        .unwrap_or_default();
    let platform = platform_name(store_url);

    let mut lines = vec![format!(
        "{}: {}",
        title_prefix(context.content_type),
        details.name
    )];
    if !store_url.is_empty() {
        lines.push(store_url.to_string());
    }
    if platform.is_none() && !context.text.is_empty() {
        lines.push(context.text.clone());
    }

    if let Some(price) = price_line(&details.price) {
        lines.push(format!("Price: {}", price));
    }
    if let Some(release_date) = &details.release_date {
        lines.push(format!("Release Date: {}", release_date));
    }
    if !details.developers.is_empty() || !details.publishers.is_empty() {
        let join = |names: &[String]| {
            if names.is_empty() {
                "N/A".to_string()
            } else {
                names.join(", ")
            }
        };
        lines.push(format!(
            "Dev: {} | Pub: {}",
            join(&details.developers),
            join(&details.publishers)
        ));
    }
    if let Some(platform) = platform {
        lines.push(format!("Platform: {}", platform));
    }
    if let Some(image) = &details.image {
        lines.push(format!("Image: {}", image));
    }

    let mut excluded: HashSet<String> = context.source_links.iter().map(|s| normalize_url(s)).collect();
    excluded.insert(normalize_url(store_url));

    let mut others = Vec::new();
    for link in &context.links {
        // `insert` doubles as the duplicate check
        if excluded.insert(normalize_url(link)) {
            others.push(link.as_str());
        }
    }
    push_list(&mut lines, "Links", &others, MAX_LINKS);

    let sources: Vec<&str> = context.source_links.iter().map(String::as_str).collect();
    push_list(&mut lines, "Sources", &sources, MAX_SOURCES);

    lines.join("\n")
}

fn push_list(lines: &mut Vec<String>, heading: &str, items: &[&str], max: usize) {
    if items.is_empty() {
        return;
    }
    lines.push(format!("{}:", heading));
    lines.extend(items.iter().take(max).map(|item| format!("- {}", item)));
    if items.len() > max {
        lines.push(format!("...and {} more", items.len() - max));
    }
}

fn render_plain(context: &PostContext) -> String {
    let mut content = context.text.clone();
    for link in context.links.iter().chain(context.source_links.iter()) {
        if !content.contains(link.as_str()) {
            content.push('\n');
            content.push_str(link);
        }
    }
    content
}
