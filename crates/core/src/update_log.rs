//! Append-only log of executed bid updates.
//!
//! One JSON object per line. Readers get the newest records first.

use crate::model::BidUpdate;
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Default number of records returned by [`UpdateLog::read_recent`].
pub const DEFAULT_MAX_HISTORY: usize = 200;

#[derive(Debug, Clone, Default)]
pub struct UpdateLog {
    path: Option<PathBuf>,
}

impl UpdateLog {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A log that accepts and returns nothing.
    #[must_use]
    pub fn disabled() -> Self {
        Self { path: None }
    }

    /// Creates a log from an optional path; `None` or an empty path disables it.
    #[must_use]
    pub fn from_option(path: Option<impl AsRef<Path>>) -> Self {
        match path {
            Some(p) if !p.as_ref().as_os_str().is_empty() => Self::new(p.as_ref()),
            _ => Self::disabled(),
        }
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Appends updates, creating the file if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or written.
    pub fn append(&self, updates: &[BidUpdate]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if updates.is_empty() {
            return Ok(());
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open update log {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        for update in updates {
            serde_json::to_writer(&mut writer, update)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;

        tracing::debug!(count = updates.len(), path = %path.display(), "Appended bid updates");
        Ok(())
    }

    /// Reads at most `max` records, newest first. A missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is not a valid record.
    pub fn read_recent(&self, max: usize) -> Result<Vec<BidUpdate>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };

        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to open update log {}", path.display()))
            }
        };

        let mut updates = serde_json::Deserializer::from_reader(BufReader::new(file))
            .into_iter::<BidUpdate>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .with_context(|| format!("corrupt update log {}", path.display()))?;

        updates.reverse();
        updates.truncate(max);
        Ok(updates)
    }
}
