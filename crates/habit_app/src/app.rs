use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use chrono::{Datelike, NaiveDate, NaiveTime};
use clap::{Parser, Subcommand};
use habit_core::{
    clock::Clock,
    model::{Cadence, Habit, HabitId, MilestoneSlot, NewHabit, ReminderConfig, Toggle},
    notifications::{self, TracingSink},
    store::JsonFileStore,
    HabitService,
};
use tracing::{debug, info};

const DEFAULT_STORE: &str = "habits.json";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub store_path: PathBuf,
    pub default_reminder: NaiveTime,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(DEFAULT_STORE),
            default_reminder: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unusable values fall back to
    /// the defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup("HABIT_STORE") {
            let path = path.trim();
            if !path.is_empty() {
                config.store_path = PathBuf::from(path);
            }
        }
        if let Some(raw) = lookup("HABIT_DEFAULT_REMINDER") {
            match parse_time(&raw) {
                Ok(time) => config.default_reminder = time,
                Err(err) => tracing::warn!(%raw, %err, "ignoring HABIT_DEFAULT_REMINDER"),
            }
        }
        Ok(config)
    }
}

#[derive(Debug, Parser)]
#[command(name = "habit", about = "Track habits, streaks and milestones")]
pub struct Cli {
    /// Path of the JSON habit store (overrides HABIT_STORE)
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List habits with their streak and milestone progress
    List,
    /// Register a new habit
    Add {
        name: String,
        #[arg(long, default_value = "daily")]
        cadence: Cadence,
        /// Enable reminders, optionally at HH:MM
        #[arg(long, num_args = 0..=1, value_name = "HH:MM")]
        remind: Option<Option<String>>,
        /// Weekday indices for reminders, 0 = Sunday
        #[arg(long, value_delimiter = ',')]
        days: Vec<u8>,
    },
    /// Mark a day complete, or unmark it when already complete
    Toggle {
        habit: String,
        /// Day to toggle as YYYY-MM-DD, defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Delete a habit and all of its completions
    Delete { habit: String },
    /// Show a month calendar for one habit, or for all habits
    Calendar {
        habit: Option<String>,
        /// Month as YYYY-MM, defaults to the current month
        #[arg(long)]
        month: Option<String>,
    },
    /// Show which habits were completed on a day
    Day { date: NaiveDate },
}

pub fn run(config: AppConfig, cli: Cli, out: &mut impl Write) -> Result<()> {
    let store_path = cli.store.clone().unwrap_or(config.store_path.clone());
    info!(path = %store_path.display(), "opening habit store");
    let service = HabitService::builder()
        .with_store(Box::new(JsonFileStore::new(&store_path)))
        .with_notification_sink(Box::new(TracingSink))
        .build()
        .with_context(|| format!("failed to load habits from {}", store_path.display()))?;

    match cli.command {
        Command::List => list(&service, out),
        Command::Add {
            name,
            cadence,
            remind,
            days,
        } => {
            let name = name.trim().to_string();
            if name.is_empty() {
                bail!("habit name must not be empty");
            }
            let reminder = match remind {
                None => ReminderConfig::disabled(),
                Some(None) => ReminderConfig::at(config.default_reminder, days),
                Some(Some(raw)) => ReminderConfig::at(parse_time(&raw)?, days),
            };
            let id = service.add_habit(NewHabit::new(name.clone(), cadence).with_reminder(reminder));
            writeln!(out, "added {name} ({cadence}) {id}")?;
            Ok(())
        }
        Command::Toggle { habit, date } => {
            let id = resolve(&service, &habit)?;
            let day = date.unwrap_or_else(|| service.clock().today());
            let outcome = service.toggle_completion(id, day)?;
            let habit = service.habit(id)?;
            match outcome.toggle {
                Toggle::Marked => writeln!(out, "{} marked complete on {day}", habit.name)?,
                Toggle::Unmarked => writeln!(out, "{} unmarked on {day}", habit.name)?,
            }
            for slot in outcome.reached {
                writeln!(
                    out,
                    "milestone {}: {}",
                    slot.index(),
                    notifications::celebration_request(&habit, slot).body
                )?;
            }
            Ok(())
        }
        Command::Delete { habit } => {
            let id = resolve(&service, &habit)?;
            let removed = service.delete_habit(id)?;
            writeln!(out, "deleted {}", removed.name)?;
            Ok(())
        }
        Command::Calendar { habit, month } => {
            let anchor = match month {
                Some(raw) => parse_month(&raw)?,
                None => service.clock().today(),
            };
            calendar(&service, habit.as_deref(), anchor, out)
        }
        Command::Day { date } => {
            let habits = service.habits_completed_on(date);
            if habits.is_empty() {
                writeln!(out, "no habits completed on {date}")?;
            }
            for habit in habits {
                writeln!(out, "{}  {}", date.format("%a %b %-d"), habit.name)?;
            }
            Ok(())
        }
    }
}

fn list(service: &HabitService, out: &mut impl Write) -> Result<()> {
    let habits = service.habits();
    if habits.is_empty() {
        writeln!(out, "no habits yet")?;
        return Ok(());
    }
    for habit in habits {
        let streak = service.current_streak(habit.id)?;
        let progress = service.milestone_progress(habit.id)?;
        let done = if service.is_completed_today(habit.id)? {
            "x"
        } else {
            " "
        };
        let milestones: String = MilestoneSlot::ALL
            .into_iter()
            .map(|slot| {
                let (value, target) = progress.for_slot(slot);
                let mark = if habit.milestones.slot(slot).is_reached() {
                    "*"
                } else {
                    ""
                };
                format!(" {value}/{target}{mark}")
            })
            .collect();
        writeln!(
            out,
            "[{done}] {:<24} {:<8} streak {:>3}  milestones{}  {}",
            habit.name, habit.cadence, streak, milestones, habit.id
        )?;
        if let Some(banner) = service.celebration_for_today(habit.id)? {
            writeln!(out, "    {}", banner.message)?;
        }
    }
    Ok(())
}

fn calendar(
    service: &HabitService,
    habit: Option<&str>,
    anchor: NaiveDate,
    out: &mut impl Write,
) -> Result<()> {
    writeln!(out, "{}", anchor.format("%B %Y"))?;
    writeln!(out, " Su  Mo  Tu  We  Th  Fr  Sa")?;
    let cells: Vec<String> = match habit {
        Some(query) => {
            let id = resolve(service, query)?;
            service
                .habit_calendar(id, anchor)?
                .into_iter()
                .map(|day| {
                    let mark = if !day.in_current_month {
                        ' '
                    } else if day.in_active_streak {
                        '#'
                    } else if day.completed {
                        'x'
                    } else if day.is_today {
                        '.'
                    } else {
                        ' '
                    };
                    format!("{:>2}{}", day.date.day(), mark)
                })
                .collect()
        }
        None => service
            .unified_calendar(anchor)
            .into_iter()
            .map(|day| {
                let mark = match (day.in_current_month, day.completed_count) {
                    (false, _) | (true, 0) => ' ',
                    (true, n) if n > 9 => '+',
                    (true, n) => char::from_digit(n as u32, 10).unwrap_or('+'),
                };
                format!("{:>2}{}", day.date.day(), mark)
            })
            .collect(),
    };
    for week in cells.chunks(7) {
        writeln!(out, "{}", week.join(" "))?;
    }
    Ok(())
}

/// Accept a full id or an unambiguous prefix of one.
fn resolve(service: &HabitService, query: &str) -> Result<HabitId> {
    let query = query.trim();
    if query.is_empty() {
        bail!("habit name or id must not be empty");
    }
    if let Ok(id) = query.parse::<HabitId>() {
        return Ok(id);
    }
    let needle = query.to_ascii_lowercase();
    let matches: Vec<Habit> = service
        .habits()
        .into_iter()
        .filter(|habit| {
            habit.id.to_string().starts_with(&needle) || habit.name.to_ascii_lowercase() == needle
        })
        .collect();
    debug!(%query, candidates = matches.len(), "resolving habit");
    match matches.as_slice() {
        [habit] => Ok(habit.id),
        [] => Err(anyhow!("no habit matches `{query}`")),
        _ => Err(anyhow!("`{query}` matches {} habits", matches.len())),
    }
}

fn parse_time(raw: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .with_context(|| format!("invalid time `{raw}`, expected HH:MM"))
}

fn parse_month(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
        .with_context(|| format!("invalid month `{raw}`, expected YYYY-MM"))
}
