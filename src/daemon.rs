//! Long-running scan loop.
//!
//! Scans the feed on a fixed interval until SIGINT or SIGTERM. On unix,
//! SIGHUP triggers an extra scan on its own task without disturbing the
//! schedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::app::{AppContext, FreebieError, Result};
use crate::config::DaemonSection;
use crate::delivery::Delivery;

/// Daemon configuration
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// Scan interval in seconds (default: 1800 = 30 minutes)
    pub interval_secs: u64,
    /// Whether to scan immediately on start
    pub scan_on_start: bool,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            interval_secs: 1800,
            scan_on_start: true,
        }
    }
}

impl DaemonConfig {
    pub fn from_section(section: &DaemonSection) -> std::result::Result<Self, String> {
        Ok(Self {
            interval_secs: Self::parse_interval(&section.interval)?,
            scan_on_start: section.scan_on_start,
        })
    }

    /// Parse interval string like "1h", "30m", "6h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();

        let secs = if let Some(hours) = s.strip_suffix('h') {
            hours
                .parse::<u64>()
                .map(|h| h * 3600)
                .map_err(|_| format!("Invalid hours: {}", hours))
        } else if let Some(minutes) = s.strip_suffix('m') {
            minutes
                .parse::<u64>()
                .map(|m| m * 60)
                .map_err(|_| format!("Invalid minutes: {}", minutes))
        } else if let Some(days) = s.strip_suffix('d') {
            days.parse::<u64>()
                .map(|d| d * 86400)
                .map_err(|_| format!("Invalid days: {}", days))
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map_err(|_| format!("Invalid seconds: {}", secs))
        } else {
            s.parse::<u64>()
                .map_err(|_| format!("Invalid interval: {}. Use format like '1h', '30m', '1d'", s))
        }?;

        if secs == 0 {
            return Err("Interval must be greater than zero".to_string());
        }
        Ok(secs)
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs.is_multiple_of(86400) {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

/// Daemon runner
pub struct Daemon {
    ctx: Arc<AppContext>,
    delivery: Arc<dyn Delivery>,
    config: DaemonConfig,
    running: Arc<AtomicBool>,
    shutdown: Arc<Notify>,
}

impl Daemon {
    pub fn new(ctx: Arc<AppContext>, delivery: Arc<dyn Delivery>, config: DaemonConfig) -> Self {
        Self {
            ctx,
            delivery,
            config,
            running: Arc::new(AtomicBool::new(true)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    fn spawn_signal_handlers(&self) {
        let running = self.running.clone();
        let shutdown = self.shutdown.clone();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            tokio::spawn(async move {
                let (mut sigterm, mut sigint) =
                    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                        (Ok(term), Ok(int)) => (term, int),
                        (Err(e), _) | (_, Err(e)) => {
                            error!("Failed to set up shutdown signal handlers: {}", e);
                            return;
                        }
                    };

                tokio::select! {
                    _ = sigterm.recv() => {},
                    _ = sigint.recv() => {},
                }
                running.store(false, Ordering::SeqCst);
                shutdown.notify_one();
            });

            let ctx = self.ctx.clone();
            let delivery = self.delivery.clone();
            tokio::spawn(async move {
                let mut sighup = match signal(SignalKind::hangup()) {
                    Ok(sighup) => sighup,
                    Err(e) => {
                        warn!("Manual scan trigger unavailable: {}", e);
                        return;
                    }
                };

                while sighup.recv().await.is_some() {
                    let ctx = ctx.clone();
                    let delivery = delivery.clone();
                    // Runs alongside any scheduled cycle
                    tokio::spawn(async move {
                        info!("Running manual scan...");
                        run_cycle(&ctx, delivery.as_ref()).await;
                    });
                }
            });
        }

        #[cfg(windows)]
        {
            tokio::spawn(async move {
                let _ = tokio::signal::ctrl_c().await;
                running.store(false, Ordering::SeqCst);
                shutdown.notify_one();
            });
        }
    }

    /// Run the daemon
    pub async fn run(&self) -> Result<()> {
        if self.config.interval_secs == 0 {
            return Err(FreebieError::Config(
                "daemon interval must be greater than zero".to_string(),
            ));
        }

        self.spawn_signal_handlers();

        info!(
            "freebie daemon started (scan interval: {}, PID: {})",
            DaemonConfig::format_interval(self.config.interval_secs),
            std::process::id()
        );

        if self.config.scan_on_start && self.is_running() {
            info!("Running initial scan...");
            run_cycle(&self.ctx, self.delivery.as_ref()).await;
        }

        let mut timer = interval(Duration::from_secs(self.config.interval_secs));
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer.tick().await; // Skip the first immediate tick

        while self.is_running() {
            tokio::select! {
                _ = timer.tick() => {},
                _ = self.shutdown.notified() => break,
            }

            if !self.is_running() {
                break;
            }

            info!("Running scheduled scan...");
            run_cycle(&self.ctx, self.delivery.as_ref()).await;
        }

        info!("Daemon shutting down...");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stop the daemon (called externally)
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.notify_one();
    }
}

/// One scan; failures are logged and never end the loop.
async fn run_cycle(ctx: &AppContext, delivery: &dyn Delivery) {
    let start = Utc::now();

    match ctx.run_cycle(delivery, ctx.scan_options()).await {
        Ok(report) => {
            let elapsed = Utc::now().signed_duration_since(start);
            info!(
                "Scan complete: {} new, {} delivered, {} failed ({:.1}s)",
                report.announced,
                report.delivered,
                report.failed,
                elapsed.num_milliseconds() as f64 / 1000.0
            );
        }
        Err(e) => error!("Scan failed: {}", e),
    }
}
