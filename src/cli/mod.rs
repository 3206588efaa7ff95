pub mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "freebie")]
#[command(about = "Resolve free-game announcements into store metadata", long_about = None)]
pub struct Cli {
    /// Config file (default: ~/.config/freebie/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// SQLite database path, overriding the config file
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch the feed once and announce new posts
    Scan {
        /// Number of posts to fetch
        #[arg(short, long)]
        limit: Option<usize>,

        /// Reprocess posts that were already seen
        #[arg(long)]
        ignore_seen: bool,
    },
    /// Resolve an ad hoc post text or store URL
    Resolve {
        /// Post text, may contain links
        text: String,
    },
    /// Inspect or clear the metadata cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Look up current and historical-low prices on IsThereAnyDeal
    Price {
        /// Game title
        title: String,
    },
    /// Show the last check time and cache and ledger totals
    Status,
    /// Check whether a post ID has been processed
    Seen {
        /// Feed post ID, e.g. t3_1abcde
        post_id: String,
    },
    /// Scan on a schedule until interrupted
    Daemon {
        /// Scan interval (e.g., "30m", "1h", "1d"); overrides the config file
        #[arg(short, long)]
        interval: Option<String>,

        /// Skip the initial scan on start
        #[arg(long)]
        no_initial_scan: bool,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Delete every cached entry
    Clear,
    /// Show one cached entry
    Show {
        /// steam, epic, itch, playstation, gog or itad
        store: String,
        /// Store identifier (app ID, slug or URL)
        identifier: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scan_with_globals() {
        let cli = Cli::parse_from(["freebie", "scan", "--limit", "5", "--ignore-seen", "--db", "x.db"]);
        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert!(matches!(
            cli.command,
            Commands::Scan {
                limit: Some(5),
                ignore_seen: true
            }
        ));
    }

    #[test]
    fn test_parse_price_and_status() {
        let cli = Cli::parse_from(["freebie", "price", "Portal 2"]);
        assert!(matches!(cli.command, Commands::Price { title } if title == "Portal 2"));

        let cli = Cli::parse_from(["freebie", "status"]);
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_parse_cache_show() {
        let cli = Cli::parse_from(["freebie", "cache", "show", "steam", "400"]);
        match cli.command {
            Commands::Cache {
                action: CacheAction::Show { store, identifier },
            } => {
                assert_eq!(store, "steam");
                assert_eq!(identifier, "400");
            }
            _ => panic!("expected cache show"),
        }
    }
}
