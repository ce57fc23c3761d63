//! Session smoke test: sign in and list live active campaigns.

use super::load_config;
use anyhow::{Context, Result};
use clap::Args;
use undercut_trafficjunky::{
    AuthenticatedSession, CancelToken, Credentials, CredentialsConfig, RateLimiter, SessionConfig,
};

/// Arguments for the active-campaigns command.
#[derive(Args, Debug, Clone)]
pub struct ActiveCampaignsArgs {
    /// Print ids only, one per line.
    #[arg(long)]
    pub quiet: bool,
}

/// Runs the active-campaigns command.
///
/// # Errors
/// Returns an error if sign-in or the dashboard query fails.
pub async fn run_active_campaigns(args: ActiveCampaignsArgs, config_path: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let credentials = Credentials::from_env(&CredentialsConfig::default());
    let limiter = RateLimiter::new(config.request_interval())?;
    let cancel = CancelToken::new();
    let _deadline = cancel.cancel_after(config.run_timeout());

    let session = AuthenticatedSession::establish(
        &credentials,
        SessionConfig::from_engine(&config)?,
        limiter,
        cancel,
    )
    .await
    .context("sign-in failed")?;

    let ids = session
        .list_active_campaign_ids()
        .await
        .context("failed to list active campaigns")?;

    if args.quiet {
        for id in &ids {
            println!("{id}");
        }
        return Ok(());
    }

    println!();
    println!("Active campaigns: {}", ids.len());
    println!("{}", "-".repeat(40));
    for id in &ids {
        println!("  {id}");
    }
    println!();

    Ok(())
}
