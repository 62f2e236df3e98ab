//! Append-only run history.
//!
//! One record per processed job per batch, whatever the outcome. The file
//! is a JSON array rewritten as a whole on every append; insertion order is
//! chronological order.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failure,
    Skipped,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failure => write!(f, "failure"),
            RunStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// A record of one job execution attempt. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub script: String,
    pub run_time: NaiveDateTime,
    pub status: RunStatus,
    pub reason: String,
    pub insert_file: Option<PathBuf>,
    pub update_file: Option<PathBuf>,
    pub backup_file: Option<PathBuf>,
}

/// Whole-file access to the run history array.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the full history. Missing file is empty history; a corrupt file
    /// is logged and treated as empty (the next append overwrites it).
    pub fn load(&self) -> Vec<RunRecord> {
        if !self.path.exists() {
            return Vec::new();
        }
        match std::fs::read_to_string(&self.path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| serde_json::from_str(&raw).map_err(anyhow::Error::from))
        {
            Ok(history) => history,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "Corrupt run history file, treating as empty: {e}");
                Vec::new()
            }
        }
    }

    /// Append one record and rewrite the whole file. Never deduplicates and
    /// never mutates prior entries.
    pub fn append(&self, record: &RunRecord) -> Result<()> {
        let mut history = self.load();
        history.push(record.clone());

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let payload = serde_json::to_string_pretty(&history)?;
        std::fs::write(&self.path, payload)
            .with_context(|| format!("writing {}", self.path.display()))?;
        Ok(())
    }
}
