//! Single engine run.

use super::{load_config, print_updates};
use anyhow::{Context, Result};
use clap::Args;
use rust_decimal::Decimal;
use std::path::PathBuf;
use undercut_core::config::EngineConfig;
use undercut_core::UpdateLog;
use undercut_trafficjunky::{AdsEngine, RunReport};

/// Arguments for the run-once command.
#[derive(Args, Debug, Clone)]
pub struct RunOnceArgs {
    /// Compute updates without sending them.
    #[arg(long)]
    pub read_only: bool,

    /// Margin below the best competing bid (overrides the config).
    #[arg(long)]
    pub undercut: Option<Decimal>,

    /// Campaign id to include; repeat for several. Defaults to every live active campaign.
    #[arg(long = "campaign")]
    pub campaigns: Vec<String>,

    /// Append sent updates to this JSON-lines file.
    #[arg(long, env = "UNDERCUT_UPDATES_PATH")]
    pub updates_path: Option<PathBuf>,
}

impl RunOnceArgs {
    /// Layers the command-line flags over the loaded configuration.
    #[must_use]
    pub fn apply(&self, mut config: EngineConfig) -> EngineConfig {
        if self.read_only {
            config = config.with_read_only(true);
        }
        if let Some(undercut) = self.undercut {
            config = config.with_undercut(undercut);
        }
        if !self.campaigns.is_empty() {
            config = config.with_campaign_allow_list(self.campaigns.iter().cloned());
        }
        config
    }
}

/// Runs the run-once command.
///
/// # Errors
/// Returns an error if the configuration is invalid, the run fails, or the
/// update log cannot be written.
pub async fn run_run_once(args: RunOnceArgs, config_path: &str) -> Result<()> {
    let config = args.apply(load_config(config_path)?);
    config.validate()?;

    tracing::info!(
        read_only = config.read_only,
        undercut = %config.undercut_amount,
        campaigns = config.campaign_allow_list.len(),
        "Starting run"
    );

    let report = AdsEngine::from_env(config)
        .run_once()
        .await
        .context("engine run failed")?;

    print_report(&report);

    UpdateLog::from_option(args.updates_path.as_ref())
        .append(&report.attempted())
        .context("failed to write update log")?;

    Ok(())
}

fn print_report(report: &RunReport) {
    let title = if report.read_only {
        format!(
            "PROPOSED UPDATES (read-only) - {} campaigns, {} bids",
            report.campaigns, report.bids
        )
    } else {
        format!(
            "BID UPDATES - {} campaigns, {} bids, {} sent, {} failed",
            report.campaigns,
            report.bids,
            report.succeeded(),
            report.failed()
        )
    };
    print_updates(&title, &report.proposed);

    for outcome in report.outcomes.iter().filter(|o| !o.is_success()) {
        if let Some(err) = &outcome.error {
            println!("FAILED {}: {}", outcome.update.bid_id, err);
        }
    }
}
