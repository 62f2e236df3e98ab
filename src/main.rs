use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use solringest::config::Dirs;
use solringest::history::HistoryLog;
use solringest::schedule::ScheduleStore;

#[derive(Parser)]
#[command(
    name = "solringest",
    about = "Scheduled data-ingestion and safe-commit pipeline for Solr cores",
    version,
    long_about = None
)]
struct Cli {
    /// Pipeline root directory (holds config/, scripts/, data/, backup/, logs/)
    #[arg(long, default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process the schedule once: run due jobs, validate, back up, commit
    Run {
        /// Skip Solr commits regardless of the schedule's commit_solr setting
        #[arg(long)]
        no_commit: bool,
    },

    /// Inspect or adjust the job schedule
    Schedule {
        #[command(subcommand)]
        action: ScheduleAction,
    },

    /// Show recent run history
    History {
        /// Number of records to show, newest last
        #[arg(long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum ScheduleAction {
    /// List all jobs with their due status
    List,

    /// Set the one-shot force-run flag on a job
    Force {
        /// Job name
        #[arg(long)]
        name: String,
    },

    /// Enable a job
    Enable {
        /// Job name
        #[arg(long)]
        name: String,
    },

    /// Disable a job
    Disable {
        /// Job name
        #[arg(long)]
        name: String,
    },
}

/// Console logging always; a dated file under logs/ additionally when the
/// pipeline actually runs.
fn init_logging(log_file: Option<PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::File::create(&path)?;
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .with(fmt::layer().with_writer(Arc::new(file)).with_ansi(false))
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer())
                .init();
        }
    }
    Ok(())
}

fn set_job_flag(dirs: &Dirs, name: &str, apply: impl FnOnce(&mut solringest::schedule::JobDescriptor)) -> Result<()> {
    let store = ScheduleStore::new(dirs.schedule_file());
    let mut schedule = store.load();
    let Some(entry) = schedule.scripts.get_mut(name) else {
        anyhow::bail!("Job '{}' not found in schedule", name);
    };
    apply(entry);
    store.save(&schedule)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let dirs = Dirs::new(&cli.root);

    let log_file = match &cli.command {
        Commands::Run { .. } => Some(dirs.log_dir().join(format!(
            "{}_ingestion.log",
            Local::now().format("%Y-%m-%d_%H-%M-%S")
        ))),
        _ => None,
    };
    init_logging(log_file)?;

    match cli.command {
        Commands::Run { no_commit } => {
            tracing::info!(root = %cli.root.display(), "Starting ingestion batch");
            let summary = solringest::run_ingestion(&cli.root, no_commit).await?;
            println!(
                "Batch finished: {} succeeded, {} failed, {} skipped",
                summary.succeeded, summary.failed, summary.skipped
            );
        }

        Commands::Schedule { action } => match action {
            ScheduleAction::List => {
                let schedule = ScheduleStore::new(dirs.schedule_file()).load();
                if schedule.scripts.is_empty() {
                    println!("No jobs scheduled.");
                } else {
                    let now = Local::now().naive_local();
                    println!(
                        "{:<20} | {:<12} | {:<8} | {:<8} | Status",
                        "Name", "Last run", "Interval", "Enabled"
                    );
                    println!("{:-<20}-|-{:-<12}-|-{:-<8}-|-{:-<8}-|-{:-<30}", "", "", "", "", "");
                    for (name, job) in &schedule.scripts {
                        let status = if job.disabled {
                            "disabled".to_string()
                        } else {
                            job.decide(now).reason()
                        };
                        let last_run = job.last_run.format("%Y-%m-%d").to_string();
                        let interval = format!("{}d", job.interval_days);
                        println!(
                            "{:<20} | {:<12} | {:<8} | {:<8} | {}",
                            name,
                            last_run,
                            interval,
                            if job.disabled { "no" } else { "yes" },
                            status
                        );
                    }
                }
            }
            ScheduleAction::Force { name } => {
                set_job_flag(&dirs, &name, |job| job.force_run = true)?;
                println!("Job '{}' will run on the next batch.", name);
            }
            ScheduleAction::Enable { name } => {
                set_job_flag(&dirs, &name, |job| job.disabled = false)?;
                println!("Job '{}' enabled.", name);
            }
            ScheduleAction::Disable { name } => {
                set_job_flag(&dirs, &name, |job| job.disabled = true)?;
                println!("Job '{}' disabled.", name);
            }
        },

        Commands::History { limit } => {
            let history = HistoryLog::new(dirs.history_file()).load();
            if history.is_empty() {
                println!("No run history found.");
            } else {
                let start = history.len().saturating_sub(limit);
                println!("{:<20} | {:<20} | {:<8} | Reason", "Time", "Job", "Status");
                println!("{:-<20}-|-{:-<20}-|-{:-<8}-|-{:-<40}", "", "", "", "");
                for record in &history[start..] {
                    let time = record.run_time.format("%Y-%m-%d %H:%M:%S").to_string();
                    let status = record.status.to_string();
                    println!(
                        "{:<20} | {:<20} | {:<8} | {}",
                        time, record.script, status, record.reason
                    );
                }
            }
        }
    }

    Ok(())
}
