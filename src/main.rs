use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use freebie::app::AppContext;
use freebie::cli::{commands, CacheAction, Cli, Commands};
use freebie::config::Config;
use freebie::delivery::{ConsoleDelivery, Delivery};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(config, cli.db)?;
    let delivery: Arc<dyn Delivery> = Arc::new(ConsoleDelivery);

    match cli.command {
        Commands::Scan { limit, ignore_seen } => {
            commands::scan(&ctx, delivery.as_ref(), limit, ignore_seen).await?;
        }
        Commands::Resolve { text } => {
            commands::resolve(&ctx, &text).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Clear => commands::cache_clear(&ctx)?,
            CacheAction::Show { store, identifier } => {
                commands::cache_show(&ctx, &store, &identifier)?;
            }
        },
        Commands::Price { title } => {
            commands::price(&ctx, &title).await?;
        }
        Commands::Status => {
            commands::status(&ctx)?;
        }
        Commands::Seen { post_id } => {
            commands::seen(&ctx, &post_id)?;
        }
        Commands::Daemon {
            interval,
            no_initial_scan,
        } => {
            commands::daemon(Arc::new(ctx), delivery, interval.as_deref(), no_initial_scan).await?;
        }
    }

    Ok(())
}
