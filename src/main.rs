//! `charm`: cycle predictions from the encrypted offline snapshot.
//!
//! ```text
//! export CHARM_PASSPHRASE=...
//! charm init
//! charm onboard --last-period 2024-01-01 --cycle-length 29
//! charm log 2024-01-30 2024-02-03
//! charm symptom Cramps
//! charm day --mood good --energy 4
//! charm dashboard
//! charm calendar 2024 2
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{Months, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use cycle_charm::config::Settings;
use cycle_charm::context::{build_chat_context, ContextInput};
use cycle_charm::insights::{self, MoodPoint, SymptomCount};
use cycle_charm::models::{
    CycleProfile, CycleStats, DailyLog, FlowLevel, Mood, Snapshot, DEFAULT_CYCLE_LENGTH,
    DEFAULT_PERIOD_LENGTH,
};
use cycle_charm::reminders::TracingScheduler;
use cycle_charm::service::CycleService;
use cycle_charm::storage;
use cycle_charm::store::{DailyLogStore, MemoryStore, PeriodLogStore};

/// Window of the insights summary.
const INSIGHT_MONTHS: u32 = 3;
const TOP_SYMPTOMS: usize = 5;
const MOOD_DAYS: usize = 14;

#[derive(Parser, Debug)]
#[command(name = "charm", version, about = "Cycle predictions from an encrypted offline snapshot")]
struct Cli {
    /// Path to a TOML settings file.
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Passphrase the snapshot is sealed with.
    #[arg(long, env = "CHARM_PASSPHRASE", hide_env_values = true)]
    passphrase: String,

    /// Evaluate as of this date instead of the local date.
    #[arg(long, value_name = "YYYY-MM-DD")]
    today: Option<NaiveDate>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create an empty snapshot for a new user.
    Init,
    /// Replace the snapshot with a plain JSON export.
    Import { file: PathBuf },
    /// Delete the snapshot permanently.
    Wipe,
    #[command(flatten)]
    Snapshot(SnapshotCommand),
}

#[derive(Subcommand, Debug)]
enum SnapshotCommand {
    /// Print the decrypted snapshot as JSON.
    Export,
    /// Create the cycle profile.
    Onboard {
        #[arg(long, value_name = "YYYY-MM-DD")]
        last_period: NaiveDate,
        #[arg(long, default_value_t = DEFAULT_CYCLE_LENGTH)]
        cycle_length: i32,
        #[arg(long, default_value_t = DEFAULT_PERIOD_LENGTH)]
        period_length: i32,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        age: Option<u32>,
    },
    /// Change the average cycle and period lengths.
    Settings {
        #[arg(long)]
        cycle_length: i32,
        #[arg(long)]
        period_length: i32,
    },
    /// Log a period start, and its end if known.
    Log { start: NaiveDate, end: Option<NaiveDate> },
    /// Record the end of an ongoing period.
    End { id: Uuid, end: NaiveDate },
    /// Remove a logged period.
    Delete { id: Uuid },
    /// Log a symptom for a day, or remove it if it is already logged.
    Symptom {
        name: String,
        /// Defaults to today.
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
    },
    /// Save mood, energy, sleep and notes for a day, replacing that day's entry.
    Day {
        /// Defaults to today.
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<NaiveDate>,
        /// great, good, okay, low or stressed.
        #[arg(long)]
        mood: Option<Mood>,
        /// 1-5
        #[arg(long)]
        energy: Option<u8>,
        /// 1-5
        #[arg(long)]
        sleep: Option<u8>,
        /// spotting, light, medium or heavy.
        #[arg(long)]
        flow: Option<FlowLevel>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Current phase, next period and upcoming reminders.
    Dashboard,
    /// Day-by-day annotations for a month.
    Calendar { year: i32, month: u32 },
    /// Cycle, symptom and mood statistics.
    Stats,
    /// Cycle summary handed to the chat assistant.
    Context,
}

#[derive(Serialize)]
struct Insights {
    cycles: CycleStats,
    top_symptoms: Vec<SymptomCount>,
    mood: Vec<MoodPoint>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    let path = settings.snapshot_path()?;
    let today = cli
        .today
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    match cli.command {
        Command::Init => {
            if storage::exists(&path) {
                bail!("a snapshot already exists at {}", path.display());
            }
            let snapshot = Snapshot::new(Uuid::new_v4());
            storage::save(&path, &cli.passphrase, &snapshot)?;
            tracing::info!(user = %snapshot.user_id, path = %path.display(), "snapshot created");
            Ok(())
        }
        Command::Import { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let snapshot: Snapshot = serde_json::from_str(&raw).context("parsing snapshot JSON")?;
            snapshot.validate().context("rejecting snapshot")?;
            storage::save(&path, &cli.passphrase, &snapshot)?;
            tracing::info!(user = %snapshot.user_id, periods = snapshot.period_logs.len(), "snapshot imported");
            Ok(())
        }
        Command::Wipe => {
            if !storage::wipe(&path)? {
                tracing::warn!(path = %path.display(), "no snapshot to wipe");
            }
            Ok(())
        }
        Command::Snapshot(command) => run(command, &path, &cli.passphrase, settings, today),
    }
}

fn run(
    command: SnapshotCommand,
    path: &Path,
    passphrase: &str,
    settings: Settings,
    today: NaiveDate,
) -> Result<()> {
    let mut snapshot = storage::load(path, passphrase)
        .with_context(|| format!("opening snapshot {}", path.display()))?;
    let user = snapshot.user_id;
    let service = CycleService::new(
        MemoryStore::from_snapshot(&snapshot),
        Box::new(TracingScheduler),
        settings,
    );

    let changed = match command {
        SnapshotCommand::Export => {
            print_json(&snapshot)?;
            false
        }
        SnapshotCommand::Onboard {
            last_period,
            cycle_length,
            period_length,
            name,
            age,
        } => {
            service.onboard(
                user,
                CycleProfile {
                    last_period_date: last_period,
                    average_cycle_length: cycle_length,
                    average_period_length: period_length,
                },
            )?;
            snapshot.display_name = name.or(snapshot.display_name);
            snapshot.age = age.or(snapshot.age);
            true
        }
        SnapshotCommand::Settings {
            cycle_length,
            period_length,
        } => {
            print_json(&service.update_profile(user, cycle_length, period_length)?)?;
            true
        }
        SnapshotCommand::Log { start, end } => {
            print_json(&service.log_period(user, start, end, today)?)?;
            true
        }
        SnapshotCommand::End { id, end } => {
            print_json(&service.end_period(user, id, end, today)?)?;
            true
        }
        SnapshotCommand::Delete { id } => {
            service.delete_period(user, id)?;
            true
        }
        SnapshotCommand::Symptom { name, date } => {
            let date = date.unwrap_or(today);
            let logged = service.toggle_symptom(user, date, &name, today)?;
            print_json(&serde_json::json!({
                "date": date,
                "symptom": name.trim(),
                "logged": logged,
            }))?;
            true
        }
        SnapshotCommand::Day {
            date,
            mood,
            energy,
            sleep,
            flow,
            notes,
        } => {
            let log = DailyLog {
                date: date.unwrap_or(today),
                mood,
                energy_level: energy,
                sleep_quality: sleep,
                flow,
                notes,
            };
            print_json(&service.log_day(user, log, today)?)?;
            true
        }
        SnapshotCommand::Dashboard => {
            print_json(&service.refresh(user, today)?)?;
            true
        }
        SnapshotCommand::Calendar { year, month } => {
            print_json(&service.month(user, year, month, today)?)?;
            false
        }
        SnapshotCommand::Stats => {
            let since = today
                .checked_sub_months(Months::new(INSIGHT_MONTHS))
                .context("date out of range")?;
            let symptoms = service.store().symptoms(user)?;
            let daily_logs = service.store().daily_logs(user)?;
            print_json(&Insights {
                cycles: service.stats(user)?,
                top_symptoms: insights::top_symptoms(&symptoms, since, TOP_SYMPTOMS),
                mood: insights::mood_trend(&daily_logs, since, MOOD_DAYS),
            })?;
            false
        }
        SnapshotCommand::Context => {
            let dashboard = service.refresh(user, today)?;
            let periods = service.store().recent_periods(user, None)?;
            let symptoms = service.store().symptoms(user)?;
            let daily_logs = service.store().daily_logs(user)?;
            println!(
                "{}",
                build_chat_context(&ContextInput {
                    display_name: snapshot.display_name.as_deref(),
                    age: snapshot.age,
                    profile: &dashboard.profile,
                    phase: &dashboard.phase,
                    periods: &periods,
                    symptoms: &symptoms,
                    daily_logs: &daily_logs,
                    today,
                })
            );
            true
        }
    };

    if changed {
        service.store().write_into(&mut snapshot)?;
        snapshot.last_sync = Some(Utc::now());
        storage::save(path, passphrase, &snapshot)?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
