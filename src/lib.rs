//! Solringest -- scheduled data-ingestion and safe-commit pipeline for Solr.
//!
//! This crate orchestrates external producer scripts on a per-job interval
//! schedule, validates the JSON document batches they emit, snapshots
//! affected documents before any update, and commits insert/update batches
//! to Solr cores through an external commit tool. An append-only run
//! history records every attempt.

pub mod backup;
pub mod commit;
pub mod config;
pub mod error;
pub mod exec;
pub mod history;
pub mod pipeline;
pub mod runner;
pub mod schedule;
pub mod validate;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use crate::config::Dirs;
use crate::exec::SystemProcess;
use crate::pipeline::{BatchSummary, Pipeline};

/// Run one scheduled ingestion batch rooted at `root`. With `no_commit`,
/// the schedule's global commit switch is forced off for this run; scripts
/// still execute, validate and back up.
pub async fn run_ingestion(root: &Path, no_commit: bool) -> Result<BatchSummary> {
    let dirs = Dirs::new(root);
    dirs.ensure()?;

    let mut pipeline = Pipeline::new(dirs, Arc::new(SystemProcess));
    if no_commit {
        pipeline = pipeline.with_commit_override(false);
    }
    pipeline.run_batch().await
}
