//! Free-text heuristics that turn a post into store identifiers.
//!
//! Everything here is pure and regex based; results keep first-seen order
//! so the store-priority rule in [`Candidates::primary`] is deterministic.

use std::sync::LazyLock;

use regex::Regex;

use crate::domain::{Candidates, ContentType, PLACEHOLDER_TITLE};

/// Raffle, giveaway and key-reseller domains never treated as store links.
pub const DENY_DOMAINS: [&str; 7] = [
    "givee.club",
    "gleam.io",
    "indiegala.com",
    "rafflecopter.com",
    "woobox.com",
    "stove.com",
    "onstove.com",
];

/// Dedicated storefronts preferred over generic hosts for the fallback link.
pub const PREFERRED_FALLBACK_DOMAINS: [&str; 4] =
    ["gog.com", "amazon.com", "onstove.com", "stove.com"];

const ITEM_MARKERS: [&str; 6] = ["(dlc)", "(beta)", "(alpha)", "(item)", "(other)", "(loot)"];

/// Longest post text that is taken verbatim as a title.
const VERBATIM_TITLE_MAX: usize = 50;

static STEAM_APP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"store\.steampowered\.com/app/(\d+)").expect("valid regex"));

static EPIC_GAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"store\.epicgames\.com/(?:[^/\s]+/)?p/([^/\s?#]+)").expect("valid regex")
});

static ITCH_GAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://[a-zA-Z0-9-]+\.itch\.io/[a-zA-Z0-9-]+").expect("valid regex")
});

static PS_GAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://store\.playstation\.com/(?:[^/\s]+/)?product/[a-zA-Z0-9_-]+")
        .expect("valid regex")
});

static GOG_GAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https?://(?:www\.)?gog\.com/(?:[a-z]{2}/)?game/[a-zA-Z0-9_-]+")
        .expect("valid regex")
});

static ANY_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://[^\s<>\]\)]+").expect("valid regex"));

static FGF_TITLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^[\[\(].*?[\]\)]\s*(?:\(.*?\)\s*)?(.+?) is free").expect("valid regex")
});

static FGF_PSA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\[PSA\]\s*(.+?)\s*(?:are|is) complimentary").expect("valid regex")
});

static PSA_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*\[PSA\]").expect("valid regex"));

fn unique_matches(re: &Regex, text: &str, group: usize) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for caps in re.captures_iter(text) {
        if let Some(m) = caps.get(group) {
            let value = m.as_str();
            if !found.iter().any(|f| f == value) {
                found.push(value.to_string());
            }
        }
    }
    found
}

pub fn extract_steam_ids(text: &str) -> Vec<String> {
    unique_matches(&STEAM_APP, text, 1)
}

pub fn extract_epic_slugs(text: &str) -> Vec<String> {
    unique_matches(&EPIC_GAME, text, 1)
}

pub fn extract_itch_urls(text: &str) -> Vec<String> {
    unique_matches(&ITCH_GAME, text, 0)
}

pub fn extract_ps_urls(text: &str) -> Vec<String> {
    unique_matches(&PS_GAME, text, 0)
}

pub fn extract_gog_urls(text: &str) -> Vec<String> {
    unique_matches(&GOG_GAME, text, 0)
}

pub fn extract_urls(text: &str) -> Vec<String> {
    unique_matches(&ANY_URL, text, 0)
}

pub fn is_safe_link(url: &str) -> bool {
    !DENY_DOMAINS.iter().any(|domain| url.contains(domain))
}

pub fn is_reddit_link(url: &str) -> bool {
    url.contains("reddit.com/") || url.contains("redd.it/")
}

/// Title from the usual `[Platform] (Type) Title is free` or
/// `[PSA] Title is complimentary` post shapes.
pub fn extract_game_title(text: &str) -> Option<String> {
    [&*FGF_TITLE, &*FGF_PSA]
        .iter()
        .find_map(|re| re.captures(text))
        .map(|caps| caps[1].trim().to_string())
        .filter(|title| !title.is_empty())
}

/// Best title for a synthesized record. Short link-free text is taken as
/// the title itself.
pub fn fallback_title(text: &str) -> String {
    if let Some(title) = extract_game_title(text) {
        return title;
    }

    let text = text.trim();
    if !text.is_empty() && text.chars().count() < VERBATIM_TITLE_MAX && !text.contains("http") {
        text.to_string()
    } else {
        PLACEHOLDER_TITLE.to_string()
    }
}

pub fn determine_content_type(text: &str) -> ContentType {
    let lower = text.to_lowercase();

    if lower.contains("(game)") {
        ContentType::Game
    } else if ITEM_MARKERS.iter().any(|marker| lower.contains(marker)) {
        ContentType::Item
    } else if PSA_PREFIX.is_match(text) {
        ContentType::Info
    } else {
        ContentType::Unknown
    }
}

/// First link on a dedicated storefront, otherwise the first link.
pub fn preferred_fallback_link(links: &[String]) -> Option<&str> {
    links
        .iter()
        .find(|link| PREFERRED_FALLBACK_DOMAINS.iter().any(|d| link.contains(d)))
        .or_else(|| links.first())
        .map(String::as_str)
}

impl Candidates {
    /// Extract every store identifier from a blob of post text and links.
    pub fn from_text(blob: &str) -> Self {
        Self {
            steam_ids: extract_steam_ids(blob),
            epic_slugs: extract_epic_slugs(blob),
            itch_urls: extract_itch_urls(blob),
            ps_urls: extract_ps_urls(blob),
            gog_urls: extract_gog_urls(blob),
            title: extract_game_title(blob),
        }
    }
}
