//! Orchestrator: runs the scheduled batch, one job at a time.
//!
//! Per-job ordering is fixed: gate on disabled/script/policy, run the
//! script, validate produced artifacts, back up before any update commit,
//! commit, then advance the schedule. Every processed job gets exactly one
//! run-history record, whatever the outcome.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tracing::{error, info};

use crate::backup;
use crate::commit::{self, CommitMode};
use crate::config::Dirs;
use crate::error::JobError;
use crate::exec::ProcessRunner;
use crate::history::{HistoryLog, RunRecord, RunStatus};
use crate::runner;
use crate::schedule::{JobDescriptor, RunDecision, Schedule, ScheduleStore, Settings};
use crate::validate;

/// Outcome counts for one batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn processed(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }
}

/// File paths a job produced along the way, recorded in its run record even
/// when a later phase fails.
#[derive(Debug, Default)]
struct Artifacts {
    insert_file: Option<PathBuf>,
    update_file: Option<PathBuf>,
    backup_file: Option<PathBuf>,
}

enum JobOutcome {
    Skipped(String),
    Completed(String),
}

pub struct Pipeline {
    dirs: Dirs,
    store: ScheduleStore,
    history: HistoryLog,
    process: Arc<dyn ProcessRunner>,
    http: reqwest::Client,
    commit_override: Option<bool>,
}

impl Pipeline {
    pub fn new(dirs: Dirs, process: Arc<dyn ProcessRunner>) -> Self {
        let store = ScheduleStore::new(dirs.schedule_file());
        let history = HistoryLog::new(dirs.history_file());
        Self {
            dirs,
            store,
            history,
            process,
            http: reqwest::Client::new(),
            commit_override: None,
        }
    }

    /// Override the schedule's `commit_solr` setting for this run. Used by
    /// `run --no-commit` dry runs.
    pub fn with_commit_override(mut self, enabled: bool) -> Self {
        self.commit_override = Some(enabled);
        self
    }

    /// Process every job in the schedule, strictly sequentially, in map
    /// iteration order. A job failure never aborts the batch.
    pub async fn run_batch(&self) -> anyhow::Result<BatchSummary> {
        let mut schedule = self.store.load();
        if schedule.scripts.is_empty() {
            info!("No scripts found in the schedule");
            return Ok(BatchSummary::default());
        }

        let settings = schedule.settings.clone();
        let commit_enabled = self.commit_override.unwrap_or(settings.commit_solr);
        let mut summary = BatchSummary::default();

        let names: Vec<String> = schedule.scripts.keys().cloned().collect();
        for name in names {
            let Some(job) = schedule.scripts.get(&name).cloned() else {
                continue;
            };
            info!(job = %name, "Processing job from the schedule");
            let run_time = Local::now().naive_local();
            let mut artifacts = Artifacts::default();

            let outcome = self
                .run_job(&name, &job, &settings, commit_enabled, run_time, &mut artifacts)
                .await;

            let (status, reason) = match outcome {
                Ok(JobOutcome::Skipped(reason)) => {
                    summary.skipped += 1;
                    (RunStatus::Skipped, reason)
                }
                Ok(JobOutcome::Completed(reason)) => {
                    match self.advance(&mut schedule, &name, run_time) {
                        Ok(()) => {
                            summary.succeeded += 1;
                            (RunStatus::Success, reason)
                        }
                        Err(e) => {
                            error!(job = %name, "Could not persist schedule: {e}");
                            summary.failed += 1;
                            (RunStatus::Failure, format!("schedule save failed: {e}"))
                        }
                    }
                }
                Err(e) => {
                    error!(job = %name, "FAILED: {e}");
                    summary.failed += 1;
                    (RunStatus::Failure, e.to_string())
                }
            };

            let record = RunRecord {
                script: name.clone(),
                run_time,
                status,
                reason,
                insert_file: artifacts.insert_file,
                update_file: artifacts.update_file,
                backup_file: artifacts.backup_file,
            };
            // The record must land even for skips and failures.
            if let Err(e) = self.history.append(&record) {
                error!(job = %name, "Could not append run history: {e}");
            }
        }

        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            "Batch finished"
        );
        Ok(summary)
    }

    /// Advance `last_run` to the run's start date, clear the one-shot
    /// force flag, and rewrite the whole schedule file.
    fn advance(
        &self,
        schedule: &mut Schedule,
        name: &str,
        run_time: NaiveDateTime,
    ) -> anyhow::Result<()> {
        if let Some(entry) = schedule.scripts.get_mut(name) {
            entry.last_run = run_time.date();
            entry.force_run = false;
        }
        self.store.save(schedule)
    }

    async fn run_job(
        &self,
        name: &str,
        job: &JobDescriptor,
        settings: &Settings,
        commit_enabled: bool,
        run_time: NaiveDateTime,
        artifacts: &mut Artifacts,
    ) -> Result<JobOutcome, JobError> {
        if job.disabled {
            info!(job = name, "Job is disabled, skipping execution");
            return Ok(JobOutcome::Skipped("disabled".to_string()));
        }

        let Some(script_file) = job.script_file.as_deref() else {
            info!(job = name, "No script file specified, skipping");
            return Ok(JobOutcome::Skipped("no script_file".to_string()));
        };

        let decision = job.decide(run_time);
        let reason = decision.reason();
        if matches!(decision, RunDecision::NotDue { .. }) {
            info!(job = name, "Not due yet ({reason})");
            return Ok(JobOutcome::Skipped(reason));
        }
        info!(job = name, script = script_file, "Job is running ({reason})");

        let has_insert = !job.solr_insert.is_empty();
        let has_update = !job.solr_update.is_empty();
        let run_date = run_time.date().format("%Y-%m-%d").to_string();

        let output = runner::run_script(
            self.process.as_ref(),
            &self.dirs,
            name,
            script_file,
            job.last_run,
            has_insert,
            has_update,
            &run_date,
        )
        .await?;
        artifacts.insert_file = output.insert_file.clone();
        artifacts.update_file = output.update_file.clone();

        if let Some(insert_file) = output.insert_file.as_deref().filter(|p| p.exists()) {
            info!(job = name, file = %insert_file.display(), "Validating insert file");
            // Only the first configured target is honored: one core per
            // direction per job.
            let target = self.first_insert_target(name, job)?;
            let key = target.key.as_deref().ok_or_else(|| {
                JobError::Config(format!("solr_insert config for {name} is missing 'key'"))
            })?;
            validate::validate_insert(insert_file, key)?;
        }

        if let Some(update_file) = output.update_file.as_deref().filter(|p| p.exists()) {
            info!(job = name, file = %update_file.display(), "Validating update file");
            let target = self.first_update_target(name, job)?;
            let key = target.key.as_deref().ok_or_else(|| {
                JobError::Config(format!("solr_update config for {name} is missing 'key'"))
            })?;
            let docs = validate::validate_update(update_file, key, &target.fields)?;

            // Backup must succeed before any commit is attempted.
            let ids = backup::extract_ids(&docs, key);
            let backup_dir = self.dirs.job_backup_dir(&run_date, name);
            std::fs::create_dir_all(&backup_dir)?;
            let backup_file = backup_dir.join(format!("{name}_backup.json"));
            info!(job = name, core = %target.core_name, ids = ids.len(), "Backing up documents before update");
            backup::backup_documents(
                &self.http,
                &settings.solr_url,
                &target.core_name,
                key,
                &ids,
                &backup_file,
            )
            .await?;
            artifacts.backup_file = Some(backup_file);
        }

        if artifacts.insert_file.is_none() && artifacts.update_file.is_none() {
            info!(job = name, "Job didn't generate output files");
        }

        if commit_enabled {
            if let Some(file) = artifacts.insert_file.as_deref().filter(|p| p.exists()) {
                let target = self.first_insert_target(name, job)?;
                commit::commit_changes(
                    self.process.as_ref(),
                    &settings.commit_tool,
                    CommitMode::Insert,
                    &target.core_name,
                    file,
                )
                .await?;
            }
            if let Some(file) = artifacts.update_file.as_deref().filter(|p| p.exists()) {
                let target = self.first_update_target(name, job)?;
                commit::commit_changes(
                    self.process.as_ref(),
                    &settings.commit_tool,
                    CommitMode::Update,
                    &target.core_name,
                    file,
                )
                .await?;
            }
        } else {
            info!(job = name, "commit_solr = false, skipping Solr commit");
        }

        Ok(JobOutcome::Completed(reason))
    }

    fn first_insert_target<'a>(
        &self,
        name: &str,
        job: &'a JobDescriptor,
    ) -> Result<&'a crate::schedule::InsertTarget, JobError> {
        job.solr_insert
            .first()
            .ok_or_else(|| JobError::Config(format!("no solr_insert target configured for {name}")))
    }

    fn first_update_target<'a>(
        &self,
        name: &str,
        job: &'a JobDescriptor,
    ) -> Result<&'a crate::schedule::UpdateTarget, JobError> {
        job.solr_update
            .first()
            .ok_or_else(|| JobError::Config(format!("no solr_update target configured for {name}")))
    }
}
