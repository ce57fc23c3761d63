//! Scheduler loop.
//!
//! Each cycle re-reads the state file so an operator can pause the job or
//! change the undercut between runs without restarting the process.

use super::load_config;
use anyhow::Result;
use clap::Args;
use std::future::Future;
use std::path::{Path, PathBuf};
use undercut_core::config::EngineConfig;
use undercut_core::{MarketClock, RunState, UpdateLog};
use undercut_trafficjunky::AdsEngine;

/// Arguments for the daemon command.
#[derive(Args, Debug, Clone)]
pub struct DaemonArgs {
    /// JSON run state file (enabled flag, undercut, interval).
    #[arg(long, env = "UNDERCUT_STATE_PATH", default_value = "data/state.json")]
    pub state_path: PathBuf,

    /// Append sent updates to this JSON-lines file.
    #[arg(long, env = "UNDERCUT_UPDATES_PATH")]
    pub updates_path: Option<PathBuf>,

    /// Compute updates without sending them.
    #[arg(long)]
    pub read_only: bool,
}

/// Builds the configuration for one cycle from the base config and the
/// current run state.
///
/// The allow-list only applies while the state's debug flag is set;
/// otherwise every live active campaign is considered.
#[must_use]
pub fn cycle_config(base: &EngineConfig, state: &RunState, read_only: bool) -> EngineConfig {
    let mut config = base.clone().with_undercut(state.undercut);
    if read_only {
        config = config.with_read_only(true);
    }
    if !state.debug_enabled {
        config = config.with_campaign_allow_list(Vec::<String>::new());
    }
    config
}

/// Runs the daemon command until Ctrl-C.
///
/// # Errors
/// Returns an error if the base configuration cannot be loaded or the
/// state file cannot be created.
pub async fn run_daemon(args: DaemonArgs, config_path: &str) -> Result<()> {
    let base = load_config(config_path)?;
    let clock = base.clock()?;
    let log = UpdateLog::from_option(args.updates_path.as_ref());
    ensure_state_file(&args.state_path)?;

    tracing::info!(state = %args.state_path.display(), "Starting scheduler");

    let read_only = args.read_only;
    schedule(&args.state_path, clock, tokio::signal::ctrl_c(), |state| {
        run_cycle(cycle_config(&base, state, read_only), log.clone())
    })
    .await;

    tracing::info!("Received Ctrl+C, stopping scheduler");
    Ok(())
}

/// Scheduler loop. Returns once `shutdown` completes, whether that happens
/// during a cycle or between cycles. An interrupted cycle is dropped and its
/// run is not stamped.
async fn schedule<S, C, F>(state_path: &Path, clock: MarketClock, shutdown: S, mut cycle: C)
where
    S: Future,
    C: FnMut(&RunState) -> F,
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        let state = RunState::load_or_default(state_path);

        if state.enabled {
            tokio::select! {
                () = cycle(&state) => {}
                _ = &mut shutdown => return,
            }

            let mut latest = RunState::load_or_default(state_path);
            latest.last_updated = clock.timestamp_now();
            if let Err(e) = latest.save(state_path) {
                tracing::error!("Failed to save run state: {:#}", e);
            }
        } else {
            tracing::info!("Scheduler disabled, skipping run");
        }

        let interval = state.run_interval();
        tracing::info!(minutes = interval.as_secs() / 60, "Cycle finished");

        tokio::select! {
            () = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => return,
        }
    }
}

async fn run_cycle(config: EngineConfig, log: UpdateLog) {
    if let Err(e) = config.validate() {
        tracing::error!("Invalid run configuration: {:#}", e);
        return;
    }

    match AdsEngine::from_env(config).run_once().await {
        Ok(report) => {
            if let Err(e) = log.append(&report.attempted()) {
                tracing::error!("Failed to write update log: {:#}", e);
            }
        }
        Err(e) => tracing::error!(error = %e, "Scheduled run failed"),
    }
}

/// Ensures the state file's directory exists and writes defaults if the
/// file is missing.
///
/// # Errors
/// Returns an error if the directory or file cannot be written.
pub fn ensure_state_file(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    RunState::default().save(path)
}
