//! CLI commands for the bid undercut engine.

pub mod active_campaigns;
pub mod daemon;
pub mod history;
pub mod run_once;

pub use active_campaigns::{run_active_campaigns, ActiveCampaignsArgs};
pub use daemon::{run_daemon, DaemonArgs};
pub use history::{run_history, HistoryArgs};
pub use run_once::{run_run_once, RunOnceArgs};

use anyhow::{Context, Result};
use undercut_core::config::EngineConfig;
use undercut_core::model::BidUpdate;
use undercut_core::ConfigLoader;

/// Loads the engine configuration from `path` plus `UNDERCUT_*` overrides.
pub(crate) fn load_config(path: &str) -> Result<EngineConfig> {
    ConfigLoader::load_from(path).with_context(|| format!("failed to load config from {path}"))
}

pub(crate) fn print_updates(title: &str, updates: &[BidUpdate]) {
    println!();
    println!("{}", "=".repeat(80));
    println!("{title}");
    println!("{}", "=".repeat(80));

    if updates.is_empty() {
        println!("(none)");
        println!();
        return;
    }

    println!(
        "{:<14} {:<14} {:>10} {:>10} {:>10}  {}",
        "Campaign", "Bid", "Previous", "New", "Change", "Time"
    );
    println!("{}", "-".repeat(80));

    for update in updates {
        println!(
            "{:<14} {:<14} {:>10.4} {:>10.4} {:>+10.4}  {}",
            update.campaign_id,
            update.bid_id,
            update.previous_bid,
            update.new_bid,
            update.delta(),
            update.timestamp
        );
    }

    println!("{}", "=".repeat(80));
    println!();
}
