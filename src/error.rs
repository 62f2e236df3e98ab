//! Job-level error taxonomy.
//!
//! Every failure inside a single job's pipeline is one of these variants.
//! The orchestrator catches them at the job boundary and converts them into
//! a `failure` run record; they never abort the whole batch.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("missing required config: {0}")]
    Config(String),

    #[error("script file not found: {}", .0.display())]
    ScriptNotFound(PathBuf),

    #[error("script exited with code {code}; log kept at {}", .log_file.display())]
    ExecutionFailed { code: i32, log_file: PathBuf },

    #[error("{}: expected a JSON array of documents: {detail}", .path.display())]
    InvalidFormat { path: PathBuf, detail: String },

    #[error("{}: document {index} is missing unique key '{key}'", .path.display())]
    MissingKey {
        path: PathBuf,
        index: usize,
        key: String,
    },

    #[error("{}: document {index} has unexpected field '{field}' (allowed: {allowed:?})", .path.display())]
    UnexpectedField {
        path: PathBuf,
        index: usize,
        field: String,
        allowed: Vec<String>,
    },

    #[error("{}: document {index} field '{field}' holds an update operator; insert values must be plain", .path.display())]
    InvalidInsertShape {
        path: PathBuf,
        index: usize,
        field: String,
    },

    #[error("{}: document {index} field '{field}' is not an operator object (set/add/remove/inc)", .path.display())]
    InvalidUpdateShape {
        path: PathBuf,
        index: usize,
        field: String,
    },

    #[error("backup of core '{core}' failed: {detail}")]
    BackupFailed { core: String, detail: String },

    #[error("commit tool exited with code {code} for core '{core}': {output}")]
    CommitFailed {
        core: String,
        code: i32,
        output: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
