//! Process execution capability.
//!
//! Producer scripts and the Solr commit tool are both external programs.
//! Components invoke them through the [`ProcessRunner`] trait so tests can
//! substitute a scripted fake instead of spawning real processes.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;

/// One external command invocation.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
    /// When set, combined stdout/stderr streams to this file and the
    /// in-memory capture stays empty.
    pub log_file: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            log_file: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn log_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Human-readable command line for logging.
    pub fn display_line(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[derive(Debug, Clone)]
pub struct ProcessOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<ProcessOutput>;
}

/// The real thing: spawns via `tokio::process::Command` and blocks the
/// calling task until the child exits. No timeout is applied; a hung
/// external script hangs the pipeline.
pub struct SystemProcess;

#[async_trait]
impl ProcessRunner for SystemProcess {
    async fn run(&self, spec: &CommandSpec) -> std::io::Result<ProcessOutput> {
        let mut cmd = tokio::process::Command::new(&spec.program);
        cmd.args(&spec.args);

        if let Some(log_path) = &spec.log_file {
            let log = std::fs::File::create(log_path)?;
            let log_err = log.try_clone()?;
            cmd.stdout(Stdio::from(log)).stderr(Stdio::from(log_err));
            let status = cmd.status().await?;
            Ok(ProcessOutput {
                code: status.code().unwrap_or(-1),
                stdout: String::new(),
                stderr: String::new(),
            })
        } else {
            let out = cmd.output().await?;
            Ok(ProcessOutput {
                code: out.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
            })
        }
    }
}
