//! Job runner: invokes a producer script under the fixed CLI contract.
//!
//! Contract: `<script> --date <since> --work_dir <dir> [--insert_file <p>]
//! [--update_file <p>]`. The script is trusted to write only inside its
//! assigned directory; there is no sandboxing.

use std::path::PathBuf;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::config::Dirs;
use crate::error::JobError;
use crate::exec::{CommandSpec, ProcessRunner};

/// Paths produced by one script invocation. Absence of a requested file is
/// not an error here; the orchestrator validates what actually exists.
#[derive(Debug, Clone)]
pub struct ScriptOutput {
    pub insert_file: Option<PathBuf>,
    pub update_file: Option<PathBuf>,
    pub log_file: PathBuf,
}

#[allow(clippy::too_many_arguments)]
pub async fn run_script(
    process: &dyn ProcessRunner,
    dirs: &Dirs,
    job_name: &str,
    script_file: &str,
    last_run: NaiveDate,
    has_insert: bool,
    has_update: bool,
    run_date: &str,
) -> Result<ScriptOutput, JobError> {
    let script_path = dirs.scripts_dir().join(script_file);
    if !script_path.is_file() {
        return Err(JobError::ScriptNotFound(script_path));
    }

    let output_dir = dirs.job_output_dir(run_date, job_name);
    std::fs::create_dir_all(&output_dir)?;

    let insert_file = has_insert.then(|| output_dir.join(format!("{job_name}_insert.json")));
    let update_file = has_update.then(|| output_dir.join(format!("{job_name}_update.json")));
    let log_file = output_dir.join(format!("{job_name}.log"));

    let mut spec = CommandSpec::new(&script_path)
        .arg("--date")
        .arg(last_run.format("%Y-%m-%d").to_string())
        .arg("--work_dir")
        .arg(output_dir.display().to_string())
        .log_to(&log_file);
    if let Some(path) = &insert_file {
        info!(job = job_name, file = %path.display(), "Script will generate insert file");
        spec = spec.arg("--insert_file").arg(path.display().to_string());
    }
    if let Some(path) = &update_file {
        info!(job = job_name, file = %path.display(), "Script will generate update file");
        spec = spec.arg("--update_file").arg(path.display().to_string());
    }

    info!(job = job_name, log = %log_file.display(), "Running: {}", spec.display_line());
    let result = process.run(&spec).await?;

    if !result.success() {
        // The log file stays behind for diagnosis; partial outputs do not.
        for path in [&insert_file, &update_file].into_iter().flatten() {
            if path.exists() {
                match std::fs::remove_file(path) {
                    Ok(()) => info!(job = job_name, "Removed incomplete file: {}", path.display()),
                    Err(e) => warn!(job = job_name, "Could not remove {}: {e}", path.display()),
                }
            }
        }
        return Err(JobError::ExecutionFailed {
            code: result.code,
            log_file,
        });
    }

    info!(job = job_name, log = %log_file.display(), "Script finished successfully");
    Ok(ScriptOutput {
        insert_file,
        update_file,
        log_file,
    })
}
