//! Commit gateway: applies a validated batch via the external commit tool.
//!
//! Invocation: `<tool> --insert|--update <core_name> <file>`. The global
//! commit switch is enforced by the orchestrator, not here.

use std::fmt;
use std::path::Path;

use tracing::{error, info};

use crate::error::JobError;
use crate::exec::{CommandSpec, ProcessRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitMode {
    Insert,
    Update,
}

impl CommitMode {
    pub fn flag(&self) -> &'static str {
        match self {
            CommitMode::Insert => "--insert",
            CommitMode::Update => "--update",
        }
    }
}

impl fmt::Display for CommitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommitMode::Insert => write!(f, "insert"),
            CommitMode::Update => write!(f, "update"),
        }
    }
}

pub async fn commit_changes(
    process: &dyn ProcessRunner,
    tool: &str,
    mode: CommitMode,
    core_name: &str,
    data_file: &Path,
) -> Result<(), JobError> {
    if !data_file.exists() {
        return Err(JobError::Config(format!(
            "commit data file not found: {}",
            data_file.display()
        )));
    }

    let spec = CommandSpec::new(tool)
        .arg(mode.flag())
        .arg(core_name)
        .arg(data_file.display().to_string());

    info!(core = core_name, %mode, "Running: {}", spec.display_line());
    let result = process.run(&spec).await?;

    if !result.stdout.trim().is_empty() {
        info!(core = core_name, "Commit tool stdout:\n{}", result.stdout.trim());
    }
    if !result.stderr.trim().is_empty() {
        info!(core = core_name, "Commit tool stderr:\n{}", result.stderr.trim());
    }

    if !result.success() {
        error!(core = core_name, code = result.code, "Commit tool failed");
        let mut output = result.stderr.trim().to_string();
        if output.is_empty() {
            output = result.stdout.trim().to_string();
        }
        return Err(JobError::CommitFailed {
            core: core_name.to_string(),
            code: result.code,
            output,
        });
    }

    info!(core = core_name, %mode, "Successfully committed changes");
    Ok(())
}
