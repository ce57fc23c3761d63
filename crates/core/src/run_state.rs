//! Operator-controlled run state persisted between scheduler cycles.

use crate::reconciler::DEFAULT_UNDERCUT;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_RUN_EVERY_MINUTES: u64 = 15;
pub const LAST_UPDATED_UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunState {
    #[serde(with = "rust_decimal::serde::float")]
    pub undercut: Decimal,
    /// Minutes between scheduler cycles.
    pub run_every: u64,
    pub enabled: bool,
    /// Restrict runs to the configured campaign allow-list.
    pub debug_enabled: bool,
    pub last_updated: String,
}

impl Default for RunState {
    fn default() -> Self {
        Self {
            undercut: DEFAULT_UNDERCUT,
            run_every: DEFAULT_RUN_EVERY_MINUTES,
            enabled: false,
            debug_enabled: true,
            last_updated: LAST_UPDATED_UNKNOWN.to_string(),
        }
    }
}

impl RunState {
    /// Reads the state file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not valid JSON.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read run state {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("invalid run state {}", path.display()))
    }

    /// Reads the state file, falling back to defaults on any error.
    #[must_use]
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Using default run state: {:#}", e);
            Self::default()
        })
    }

    /// Writes the state file, replacing previous contents.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write run state {}", path.display()))
    }

    /// Time to sleep between cycles. Never shorter than one minute.
    #[must_use]
    pub fn run_interval(&self) -> Duration {
        Duration::from_secs(self.run_every.max(1) * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_defaults() {
        let state = RunState::default();
        assert_eq!(state.undercut, dec!(0.001));
        assert_eq!(state.run_every, 15);
        assert!(!state.enabled);
        assert!(state.debug_enabled);
        assert_eq!(state.last_updated, "unknown");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");

        let state = RunState {
            undercut: dec!(0.002),
            run_every: 5,
            enabled: true,
            ..Default::default()
        };
        state.save(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"runEvery\": 5"));

        assert_eq!(RunState::load(&path).unwrap(), state);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let state = RunState::load_or_default(dir.path().join("missing.json"));
        assert_eq!(state, RunState::default());
    }

    #[test]
    fn test_run_interval_floor() {
        let state = RunState {
            run_every: 0,
            ..Default::default()
        };
        assert_eq!(state.run_interval(), Duration::from_secs(60));
    }
}
