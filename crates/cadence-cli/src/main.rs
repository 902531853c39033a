use std::path::PathBuf;

use anyhow::{anyhow, bail, Result};
use cadence_core::{
    format_next_run, format_timing, next_runs, ScheduleManager, ScheduleStatus, Timing,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cadence", about = "Inspect and manage recurring schedules", version)]
struct Cli {
    /// Path to the schedules file (default: ~/.cadence/schedules.json)
    #[arg(short, long)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all schedules
    List,
    /// Show one schedule in full
    Show { id: String },
    /// Preview the upcoming occurrences of a schedule
    Next {
        id: String,
        /// How many occurrences to show
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
    /// Show schedules that are overdue right now
    Missed,
    /// Preview occurrences for a timing without saving it
    Preview {
        /// once | daily | weekly | monthly | cron
        frequency: String,
        /// Wall-clock time "HH:MM" (all frequencies except cron)
        #[arg(short, long)]
        time: Option<String>,
        /// ISO date for once schedules, e.g. 2026-03-01
        #[arg(short, long)]
        date: Option<String>,
        /// Day of month for monthly schedules (1-31)
        #[arg(long)]
        day: Option<u8>,
        /// Comma-separated weekdays for weekly schedules (0=Sunday)
        #[arg(long)]
        days: Option<String>,
        /// Cron expression, e.g. "0 9 * * 1"
        #[arg(short, long)]
        expr: Option<String>,
        /// IANA timezone name
        #[arg(long)]
        timezone: Option<String>,
        /// How many occurrences to show
        #[arg(short = 'n', long, default_value_t = 5)]
        count: usize,
    },
    /// Suspend a schedule
    Pause { id: String },
    /// Reactivate a schedule (clears its failure counter)
    Resume { id: String },
    /// Delete a schedule
    Remove { id: String },
}

fn default_store_path() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".cadence").join("schedules.json"))
        .unwrap_or_else(|| PathBuf::from("schedules.json"))
}

fn status_marker(status: ScheduleStatus) -> &'static str {
    match status {
        ScheduleStatus::Active => " ",
        ScheduleStatus::Paused => "-",
        ScheduleStatus::Completed => "*",
        ScheduleStatus::Error => "!",
    }
}

/// Assemble a [`Timing`] from loose command-line arguments.
fn parse_timing(
    frequency: &str,
    time: Option<String>,
    date: Option<String>,
    day: Option<u8>,
    days: Option<String>,
    expr: Option<String>,
    timezone: Option<String>,
) -> Result<Timing> {
    let require_time =
        |time: Option<String>| time.ok_or_else(|| anyhow!("--time is required for {frequency}"));
    match frequency {
        "once" => Ok(Timing::Once {
            date: date.ok_or_else(|| anyhow!("--date is required for once"))?,
            time: require_time(time)?,
            timezone,
        }),
        "daily" => Ok(Timing::Daily {
            time: require_time(time)?,
            timezone,
        }),
        "weekly" => {
            let days = days.ok_or_else(|| anyhow!("--days is required for weekly"))?;
            let days_of_week: Vec<u8> = days
                .split(',')
                .map(|d| d.trim().parse())
                .collect::<Result<_, _>>()
                .map_err(|_| anyhow!("--days must be a comma-separated list of 0-6"))?;
            Ok(Timing::Weekly {
                time: require_time(time)?,
                days_of_week,
                timezone,
            })
        }
        "monthly" => Ok(Timing::Monthly {
            date: day.ok_or_else(|| anyhow!("--day is required for monthly"))?,
            time: require_time(time)?,
            timezone,
        }),
        "cron" => Ok(Timing::Cron {
            cron_expression: expr.ok_or_else(|| anyhow!("--expr is required for cron"))?,
            timezone,
        }),
        other => bail!("unknown frequency '{other}' (expected once|daily|weekly|monthly|cron)"),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let path = cli.store.unwrap_or_else(default_store_path);
    let mut manager = ScheduleManager::load(&path);
    let now = Utc::now();

    match cli.command {
        Commands::List => {
            let schedules = manager.list();
            if schedules.is_empty() {
                println!("No schedules in {}", path.display());
                return Ok(());
            }
            for s in schedules {
                println!(
                    "{} {}  {:<24} {:<32} next: {}",
                    status_marker(s.status),
                    s.id,
                    s.name,
                    format_timing(&s.timing),
                    format_next_run(s.next_run_at, now)
                );
            }
        }
        Commands::Show { id } => {
            manager.list();
            let Some(s) = manager.get(&id) else {
                bail!("no schedule with id '{id}'");
            };
            println!("{} ({})", s.name, s.id);
            if let Some(desc) = &s.description {
                println!("  {desc}");
            }
            println!("  status:   {}", s.status.as_str());
            println!("  timing:   {}", format_timing(&s.timing));
            println!("  next run: {}", format_next_run(s.next_run_at, now));
            if let Some(last) = s.last_run_at {
                println!("  last run: {last}");
            }
            if s.consecutive_failures > 0 {
                println!("  consecutive failures: {}", s.consecutive_failures);
            }
            if !s.history.is_empty() {
                println!("  history:");
                for entry in &s.history {
                    let outcome = if entry.success { "ok" } else { "failed" };
                    let detail = entry.error.as_deref().or(entry.note.as_deref()).unwrap_or("");
                    println!("    {} {outcome} {detail}", entry.executed_at);
                }
            }
        }
        Commands::Next { id, count } => {
            manager.list();
            let Some(s) = manager.get(&id) else {
                bail!("no schedule with id '{id}'");
            };
            let runs = next_runs(&s.timing, count, now);
            if runs.is_empty() {
                println!("{}: no upcoming runs", s.name);
            }
            for run in runs {
                println!("{}  ({})", run, format_next_run(Some(run), now));
            }
        }
        Commands::Preview {
            frequency,
            time,
            date,
            day,
            days,
            expr,
            timezone,
            count,
        } => {
            let timing = parse_timing(&frequency, time, date, day, days, expr, timezone)?;
            println!("{}", format_timing(&timing));
            let runs = next_runs(&timing, count, now);
            if runs.is_empty() {
                println!("No upcoming runs");
            }
            for run in runs {
                println!("{}  ({})", run, format_next_run(Some(run), now));
            }
        }
        Commands::Missed => {
            for s in manager.missed_schedules(now) {
                println!(
                    "{}  {:<24} was due {}",
                    s.id,
                    s.name,
                    s.next_run_at.map(|t| t.to_rfc3339()).unwrap_or_default()
                );
            }
        }
        Commands::Pause { id } => match manager.pause(&id)? {
            Some(s) => println!("Paused '{}'", s.name),
            None => bail!("no schedule with id '{id}'"),
        },
        Commands::Resume { id } => match manager.resume(&id)? {
            Some(s) => println!(
                "Resumed '{}'; next run {}",
                s.name,
                format_next_run(s.next_run_at, now)
            ),
            None => bail!("no schedule with id '{id}'"),
        },
        Commands::Remove { id } => {
            if !manager.delete(&id)? {
                bail!("no schedule with id '{id}'");
            }
            println!("Removed {id}");
        }
    }

    Ok(())
}
