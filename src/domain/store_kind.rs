use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Storefronts the engine knows how to resolve, plus the generic price lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Steam,
    Epic,
    Itch,
    #[serde(rename = "playstation")]
    PlayStation,
    Gog,
    Itad,
}

impl StoreKind {
    /// Resolution order for identifier groups extracted from one post.
    pub const PRIORITY: [StoreKind; 5] = [
        StoreKind::Steam,
        StoreKind::Epic,
        StoreKind::Itch,
        StoreKind::PlayStation,
        StoreKind::Gog,
    ];

    /// Stable key used in the cache table.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKind::Steam => "steam",
            StoreKind::Epic => "epic",
            StoreKind::Itch => "itch",
            StoreKind::PlayStation => "playstation",
            StoreKind::Gog => "gog",
            StoreKind::Itad => "itad",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            StoreKind::Steam => "Steam",
            StoreKind::Epic => "Epic Games Store",
            StoreKind::Itch => "Itch.io",
            StoreKind::PlayStation => "PlayStation Store",
            StoreKind::Gog => "GOG.com",
            StoreKind::Itad => "IsThereAnyDeal",
        }
    }

    /// Canonical store page for an identifier.
    ///
    /// Steam and Epic identifiers are bare IDs; the URL-keyed stores already
    /// carry the page URL as their identifier.
    pub fn store_url(&self, identifier: &str) -> Option<String> {
        match self {
            StoreKind::Steam => Some(format!("https://store.steampowered.com/app/{}/", identifier)),
            StoreKind::Epic => Some(format!("https://store.epicgames.com/p/{}", identifier)),
            StoreKind::Itch | StoreKind::PlayStation | StoreKind::Gog => {
                Some(identifier.to_string())
            }
            StoreKind::Itad => None,
        }
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StoreKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "steam" => Ok(StoreKind::Steam),
            "epic" => Ok(StoreKind::Epic),
            "itch" => Ok(StoreKind::Itch),
            "playstation" | "ps" => Ok(StoreKind::PlayStation),
            "gog" => Ok(StoreKind::Gog),
            "itad" => Ok(StoreKind::Itad),
            other => Err(format!("Unknown store: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_str() {
        for kind in StoreKind::PRIORITY {
            assert_eq!(kind.as_str().parse::<StoreKind>().unwrap(), kind);
        }
        assert_eq!("itad".parse::<StoreKind>().unwrap(), StoreKind::Itad);
        assert!("amazon".parse::<StoreKind>().is_err());
    }

    #[test]
    fn test_store_url_is_derived_from_identifier() {
        assert_eq!(
            StoreKind::Steam.store_url("400").as_deref(),
            Some("https://store.steampowered.com/app/400/")
        );
        assert_eq!(
            StoreKind::Epic.store_url("fortnite").as_deref(),
            Some("https://store.epicgames.com/p/fortnite")
        );
        assert_eq!(
            StoreKind::Itch.store_url("https://tobyfox.itch.io/deltarune").as_deref(),
            Some("https://tobyfox.itch.io/deltarune")
        );
        assert_eq!(StoreKind::Itad.store_url("steam:400"), None);
    }
}
