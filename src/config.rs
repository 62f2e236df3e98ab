//! Directory layout for a pipeline root.
//!
//! Everything the pipeline reads or writes lives under a single root
//! directory: configuration, producer scripts, per-run output, pre-update
//! backups, and logs.

use std::io;
use std::path::{Path, PathBuf};

pub const SCHEDULE_FILE: &str = "ingestion_schedule.json";
pub const HISTORY_FILE: &str = "run_history.json";

/// Resolved directory layout rooted at the pipeline's working directory.
#[derive(Debug, Clone)]
pub struct Dirs {
    root: PathBuf,
}

impl Dirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root.join("config")
    }

    pub fn scripts_dir(&self) -> PathBuf {
        self.root.join("scripts")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn output_dir(&self) -> PathBuf {
        self.data_dir().join("output")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.root.join("backup")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("logs")
    }

    pub fn schedule_file(&self) -> PathBuf {
        self.config_dir().join(SCHEDULE_FILE)
    }

    pub fn history_file(&self) -> PathBuf {
        self.data_dir().join(HISTORY_FILE)
    }

    /// Output directory for one job on one run date, e.g.
    /// `data/output/2024-01-10/flu_subclade/`.
    pub fn job_output_dir(&self, run_date: &str, job_name: &str) -> PathBuf {
        self.output_dir().join(run_date).join(job_name)
    }

    /// Backup directory for one job on one run date, e.g.
    /// `backup/2024-01-10/flu_subclade/`.
    pub fn job_backup_dir(&self, run_date: &str, job_name: &str) -> PathBuf {
        self.backup_dir().join(run_date).join(job_name)
    }

    /// Create the writable directories. Config and scripts are provisioned
    /// externally and left alone.
    pub fn ensure(&self) -> io::Result<()> {
        std::fs::create_dir_all(self.data_dir())?;
        std::fs::create_dir_all(self.output_dir())?;
        std::fs::create_dir_all(self.backup_dir())?;
        std::fs::create_dir_all(self.log_dir())?;
        Ok(())
    }
}
