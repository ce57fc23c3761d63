//! Recent bid updates from the update log.

use super::print_updates;
use anyhow::{bail, Result};
use clap::Args;
use std::path::PathBuf;
use undercut_core::update_log::DEFAULT_MAX_HISTORY;
use undercut_core::UpdateLog;

/// Arguments for the history command.
#[derive(Args, Debug, Clone)]
pub struct HistoryArgs {
    /// JSON-lines update log to read.
    #[arg(long, env = "UNDERCUT_UPDATES_PATH")]
    pub updates_path: Option<PathBuf>,

    /// Maximum number of records, newest first.
    #[arg(long, default_value_t = DEFAULT_MAX_HISTORY)]
    pub max: usize,
}

/// Runs the history command.
///
/// # Errors
/// Returns an error if no log path is set or the log cannot be read.
pub fn run_history(args: &HistoryArgs) -> Result<()> {
    let log = UpdateLog::from_option(args.updates_path.as_ref());
    if log.path().is_none() {
        bail!("no update log configured; pass --updates-path or set UNDERCUT_UPDATES_PATH");
    }

    let updates = log.read_recent(args.max)?;
    print_updates(&format!("RECENT BID UPDATES ({})", updates.len()), &updates);
    Ok(())
}
