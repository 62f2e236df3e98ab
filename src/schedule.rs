//! Schedule store and scheduling policy.
//!
//! The schedule file maps job names to typed descriptors plus a top-level
//! settings block. It is always read and rewritten as a whole; nothing in
//! the pipeline patches individual entries on disk.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SOLR_URL: &str = "http://localhost:8983/solr";
pub const DEFAULT_COMMIT_TOOL: &str = "solr-commit";

/// Top-level settings block of the schedule file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Global commit switch. When false, jobs still run, validate and back
    /// up, but nothing is committed to Solr.
    #[serde(default)]
    pub commit_solr: bool,
    #[serde(default = "default_solr_url")]
    pub solr_url: String,
    #[serde(default = "default_commit_tool")]
    pub commit_tool: String,
}

fn default_solr_url() -> String {
    DEFAULT_SOLR_URL.to_string()
}

fn default_commit_tool() -> String {
    DEFAULT_COMMIT_TOOL.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            commit_solr: false,
            solr_url: default_solr_url(),
            commit_tool: default_commit_tool(),
        }
    }
}

/// Insert destination: a core and the unique key every document must carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertTarget {
    pub core_name: String,
    /// Absence is a per-job config error, surfaced when an insert file is
    /// actually produced.
    pub key: Option<String>,
}

/// Update destination: a core, the unique key, and the whitelist of fields
/// a producer script is allowed to mutate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateTarget {
    pub core_name: String,
    pub key: Option<String>,
    #[serde(default)]
    pub fields: Vec<String>,
}

fn default_disabled() -> bool {
    true
}

/// One scheduled job. Jobs are disabled unless the config says otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    #[serde(default)]
    pub script_file: Option<String>,
    pub last_run: NaiveDate,
    pub interval_days: i64,
    #[serde(default)]
    pub force_run: bool,
    #[serde(default = "default_disabled")]
    pub disabled: bool,
    #[serde(default)]
    pub solr_insert: Vec<InsertTarget>,
    #[serde(default)]
    pub solr_update: Vec<UpdateTarget>,
}

/// Outcome of the scheduling policy for one job at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunDecision {
    Forced,
    Due { next_run: NaiveDateTime },
    NotDue { next_run: NaiveDateTime },
}

impl RunDecision {
    pub fn reason(&self) -> String {
        match self {
            RunDecision::Forced => "forced execution".to_string(),
            RunDecision::Due { next_run } => format!("due since {next_run}"),
            RunDecision::NotDue { next_run } => format!("not due until {next_run}"),
        }
    }
}

impl JobDescriptor {
    /// Next run instant: midnight of `last_run + interval_days`.
    pub fn next_run(&self) -> NaiveDateTime {
        (self.last_run + Duration::days(self.interval_days)).and_time(NaiveTime::MIN)
    }

    /// Pure scheduling policy: `force_run` wins, otherwise the job is due
    /// once `now` reaches the next-run instant (equality runs).
    pub fn decide(&self, now: NaiveDateTime) -> RunDecision {
        if self.force_run {
            return RunDecision::Forced;
        }
        let next_run = self.next_run();
        if now >= next_run {
            RunDecision::Due { next_run }
        } else {
            RunDecision::NotDue { next_run }
        }
    }
}

/// The whole schedule file: settings plus the job map. BTreeMap keeps the
/// batch iteration order stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub scripts: BTreeMap<String, JobDescriptor>,
}

/// Whole-file load/save access to the schedule.
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    path: PathBuf,
}

impl ScheduleStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the full schedule. A missing or malformed file is logged and
    /// treated as an empty schedule, never as a fatal error.
    pub fn load(&self) -> Schedule {
        if !self.path.exists() {
            tracing::info!(path = %self.path.display(), "Schedule file not found");
            return Schedule::default();
        }

        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(path = %self.path.display(), "Cannot read schedule file: {e}");
                return Schedule::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::error!(path = %self.path.display(), "Cannot parse schedule file: {e}");
                Schedule::default()
            }
        }
    }

    /// Atomically rewrite the schedule file with the full mapping,
    /// pretty-printed. Writes to a sibling temp file and renames over.
    pub fn save(&self, schedule: &Schedule) -> Result<()> {
        let payload = serde_json::to_string_pretty(schedule)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, payload)
            .with_context(|| format!("writing {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(last_run: &str, interval_days: i64) -> JobDescriptor {
        JobDescriptor {
            script_file: Some("fetch.sh".to_string()),
            last_run: last_run.parse().unwrap(),
            interval_days,
            force_run: false,
            disabled: false,
            solr_insert: Vec::new(),
            solr_update: Vec::new(),
        }
    }

    fn at(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    #[test]
    fn test_force_run_wins_regardless_of_interval() {
        let mut j = job("2099-01-01", 365);
        j.force_run = true;
        assert_eq!(j.decide(at("2024-01-10T00:00:00")), RunDecision::Forced);
    }

    #[test]
    fn test_due_exactly_at_boundary() {
        let j = job("2024-01-01", 7);
        let next = at("2024-01-08T00:00:00");
        assert_eq!(
            j.decide(at("2024-01-08T00:00:00")),
            RunDecision::Due { next_run: next }
        );
        assert_eq!(
            j.decide(at("2024-01-07T23:59:59")),
            RunDecision::NotDue { next_run: next }
        );
    }

    #[test]
    fn test_due_when_overdue() {
        let j = job("2024-01-01", 7);
        assert!(matches!(
            j.decide(at("2024-01-10T12:00:00")),
            RunDecision::Due { .. }
        ));
    }

    #[test]
    fn test_not_due_reason_carries_next_run() {
        let j = job("2024-01-01", 7);
        let reason = j.decide(at("2024-01-02T00:00:00")).reason();
        assert!(reason.contains("2024-01-08"), "reason was: {reason}");
    }

    #[test]
    fn test_disabled_defaults_to_true() {
        let j: JobDescriptor = serde_json::from_str(
            r#"{"script_file": "x.sh", "last_run": "2024-01-01", "interval_days": 7}"#,
        )
        .unwrap();
        assert!(j.disabled);
        assert!(!j.force_run);
    }

    #[test]
    fn test_save_load_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(tmp.path().join("schedule.json"));

        let mut schedule = Schedule::default();
        schedule.settings.commit_solr = true;
        let mut j = job("2024-01-01", 7);
        j.solr_update.push(UpdateTarget {
            core_name: "genome".to_string(),
            key: Some("genome_id".to_string()),
            fields: vec!["subclade".to_string()],
        });
        schedule.scripts.insert("flu_subclade".to_string(), j);

        store.save(&schedule).unwrap();
        assert_eq!(store.load(), schedule);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let store = ScheduleStore::new(tmp.path().join("absent.json"));
        assert_eq!(store.load(), Schedule::default());
    }

    #[test]
    fn test_load_malformed_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("schedule.json");
        std::fs::write(&path, "{ not json").unwrap();
        let store = ScheduleStore::new(path);
        assert_eq!(store.load(), Schedule::default());
    }
}
