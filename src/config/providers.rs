//! Outbound HTTP settings and per-store request rates.

use std::time::Duration;

use serde::Deserialize;

use crate::domain::StoreKind;
use crate::provider::http::DEFAULT_USER_AGENT;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
    /// Requests per second; zero or less disables the limit.
    pub steam_rate: f64,
    pub epic_rate: f64,
    pub itch_rate: f64,
    pub gog_rate: f64,
    pub playstation_rate: f64,
    pub itad_rate: f64,
    /// IsThereAnyDeal API key. The generic lookup is off without one.
    pub itad_api_key: Option<String>,
    /// Country IsThereAnyDeal quotes prices for.
    pub itad_country: String,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout_secs: 10,
            steam_rate: 0.66,
            epic_rate: 1.0,
            itch_rate: 1.0,
            gog_rate: 0.2,
            playstation_rate: 0.5,
            itad_rate: 1.0,
            itad_api_key: None,
            itad_country: "US".to_string(),
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn rate(&self, store: StoreKind) -> f64 {
        match store {
            StoreKind::Steam => self.steam_rate,
            StoreKind::Epic => self.epic_rate,
            StoreKind::Itch => self.itch_rate,
            StoreKind::Gog => self.gog_rate,
            StoreKind::PlayStation => self.playstation_rate,
            StoreKind::Itad => self.itad_rate,
        }
    }

    /// Blank keys count as absent.
    pub fn itad_key(&self) -> Option<&str> {
        self.itad_api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
