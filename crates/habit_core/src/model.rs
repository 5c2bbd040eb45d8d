use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identity of a habit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HabitId(Uuid);

impl HabitId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for HabitId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HabitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for HabitId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown cadence `{0}`, expected daily, weekly or monthly")]
pub struct ParseCadenceError(String);

impl FromStr for Cadence {
    type Err = ParseCadenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" | "d" => Ok(Cadence::Daily),
            "weekly" | "w" => Ok(Cadence::Weekly),
            "monthly" | "m" => Ok(Cadence::Monthly),
            _ => Err(ParseCadenceError(s.to_string())),
        }
    }
}

/// Reminder settings. Weekday indices run from 0 (Sunday) to 6 (Saturday).
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderConfig {
    pub enabled: bool,
    pub time: Option<NaiveTime>,
    pub days: BTreeSet<u8>,
}

impl ReminderConfig {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn at(time: NaiveTime, days: impl IntoIterator<Item = u8>) -> Self {
        Self {
            enabled: true,
            time: Some(time),
            days: days.into_iter().filter(|day| *day < 7).collect(),
        }
    }

    /// Selected weekdays, or the whole week when none were picked.
    pub fn effective_days(&self) -> Vec<u8> {
        if self.days.is_empty() {
            (0..7).collect()
        } else {
            self.days.iter().copied().collect()
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Completion {
    pub date: NaiveDate,
    pub completed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Marked,
    Unmarked,
}

/// Completion records of one habit keyed by calendar day.
///
/// At most one record exists per day, so a toggle is a single keyed
/// insert-or-remove. Records loaded with `completed == false` are kept for
/// round-tripping but never count as completions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Completion>", into = "Vec<Completion>")]
pub struct CompletionLog {
    entries: BTreeMap<NaiveDate, Completion>,
}

impl CompletionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, day: NaiveDate) -> Toggle {
        match self.entries.entry(day) {
            Entry::Occupied(entry) if entry.get().completed => {
                entry.remove();
                Toggle::Unmarked
            }
            Entry::Occupied(mut entry) => {
                entry.get_mut().completed = true;
                Toggle::Marked
            }
            Entry::Vacant(entry) => {
                entry.insert(Completion {
                    date: day,
                    completed: true,
                });
                Toggle::Marked
            }
        }
    }

    pub fn is_completed(&self, day: NaiveDate) -> bool {
        self.entries
            .get(&day)
            .map(|completion| completion.completed)
            .unwrap_or(false)
    }

    /// Completed days in ascending order.
    pub fn completed_days(&self) -> impl DoubleEndedIterator<Item = NaiveDate> + '_ {
        self.entries
            .values()
            .filter(|completion| completion.completed)
            .map(|completion| completion.date)
    }

    pub fn completed_count(&self) -> usize {
        self.completed_days().count()
    }

    pub fn is_empty(&self) -> bool {
        self.completed_count() == 0
    }

    pub fn records(&self) -> impl Iterator<Item = &Completion> {
        self.entries.values()
    }
}

impl From<Vec<Completion>> for CompletionLog {
    fn from(records: Vec<Completion>) -> Self {
        let mut entries: BTreeMap<NaiveDate, Completion> = BTreeMap::new();
        for record in records {
            match entries.entry(record.date) {
                Entry::Occupied(mut existing) => {
                    if record.completed {
                        existing.insert(record);
                    }
                }
                Entry::Vacant(slot) => {
                    slot.insert(record);
                }
            }
        }
        Self { entries }
    }
}

impl From<CompletionLog> for Vec<Completion> {
    fn from(log: CompletionLog) -> Self {
        log.entries.into_values().collect()
    }
}

impl FromIterator<NaiveDate> for CompletionLog {
    fn from_iter<T: IntoIterator<Item = NaiveDate>>(iter: T) -> Self {
        let entries = iter
            .into_iter()
            .map(|date| {
                (
                    date,
                    Completion {
                        date,
                        completed: true,
                    },
                )
            })
            .collect();
        Self { entries }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum MilestoneSlot {
    First,
    Second,
    Third,
}

impl MilestoneSlot {
    pub const ALL: [MilestoneSlot; 3] = [
        MilestoneSlot::First,
        MilestoneSlot::Second,
        MilestoneSlot::Third,
    ];

    pub fn index(&self) -> u8 {
        match self {
            MilestoneSlot::First => 1,
            MilestoneSlot::Second => 2,
            MilestoneSlot::Third => 3,
        }
    }
}

/// Persisted shape of a milestone slot.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MilestoneRecord {
    pub reached: bool,
    pub date: Option<DateTime<Utc>>,
}

/// A single achievement slot. Reached exactly when it carries a timestamp.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "MilestoneRecord", into = "MilestoneRecord")]
pub struct Milestone {
    reached_at: Option<DateTime<Utc>>,
}

impl Milestone {
    pub fn is_reached(&self) -> bool {
        self.reached_at.is_some()
    }

    pub fn reached_at(&self) -> Option<DateTime<Utc>> {
        self.reached_at
    }

    /// Returns `true` only for the call that actually reaches the slot.
    pub(crate) fn reach(&mut self, at: DateTime<Utc>) -> bool {
        if self.reached_at.is_some() {
            return false;
        }
        self.reached_at = Some(at);
        true
    }
}

impl From<MilestoneRecord> for Milestone {
    fn from(record: MilestoneRecord) -> Self {
        Self {
            reached_at: record.date.filter(|_| record.reached),
        }
    }
}

impl From<Milestone> for MilestoneRecord {
    fn from(milestone: Milestone) -> Self {
        Self {
            reached: milestone.is_reached(),
            date: milestone.reached_at,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MilestoneState {
    pub first: Milestone,
    pub second: Milestone,
    pub third: Milestone,
}

impl MilestoneState {
    pub fn slot(&self, slot: MilestoneSlot) -> &Milestone {
        match slot {
            MilestoneSlot::First => &self.first,
            MilestoneSlot::Second => &self.second,
            MilestoneSlot::Third => &self.third,
        }
    }

    pub(crate) fn slot_mut(&mut self, slot: MilestoneSlot) -> &mut Milestone {
        match slot {
            MilestoneSlot::First => &mut self.first,
            MilestoneSlot::Second => &mut self.second,
            MilestoneSlot::Third => &mut self.third,
        }
    }

    pub fn reached_slots(&self) -> Vec<MilestoneSlot> {
        MilestoneSlot::ALL
            .into_iter()
            .filter(|slot| self.slot(*slot).is_reached())
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Habit {
    pub id: HabitId,
    pub name: String,
    pub cadence: Cadence,
    pub created_at: DateTime<Utc>,
    /// Local calendar day of `created_at`, fixed when the habit is created.
    pub start_day: NaiveDate,
    #[serde(default)]
    pub reminder: ReminderConfig,
    #[serde(default)]
    pub completions: CompletionLog,
    #[serde(default)]
    pub milestones: MilestoneState,
}

impl Habit {
    pub fn new(
        name: impl Into<String>,
        cadence: Cadence,
        created_at: DateTime<Utc>,
        start_day: NaiveDate,
    ) -> Self {
        Self {
            id: HabitId::new(),
            name: name.into(),
            cadence,
            created_at,
            start_day,
            reminder: ReminderConfig::disabled(),
            completions: CompletionLog::new(),
            milestones: MilestoneState::default(),
        }
    }

    pub fn with_reminder(mut self, reminder: ReminderConfig) -> Self {
        self.reminder = reminder;
        self
    }
}

/// User input for the "add habit" action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewHabit {
    pub name: String,
    pub cadence: Cadence,
    pub reminder: ReminderConfig,
}

impl NewHabit {
    pub fn new(name: impl Into<String>, cadence: Cadence) -> Self {
        Self {
            name: name.into(),
            cadence,
            reminder: ReminderConfig::disabled(),
        }
    }

    pub fn with_reminder(mut self, reminder: ReminderConfig) -> Self {
        self.reminder = reminder;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, d).unwrap()
    }

    #[test]
    fn toggle_inserts_then_removes() {
        let mut log = CompletionLog::new();
        assert_eq!(log.toggle(day(3)), Toggle::Marked);
        assert!(log.is_completed(day(3)));
        assert_eq!(log.toggle(day(3)), Toggle::Unmarked);
        assert!(!log.is_completed(day(3)));
        assert_eq!(log.records().count(), 0);
    }

    #[test]
    fn uncompleted_records_are_ignored_and_upgraded_by_toggle() {
        let mut log = CompletionLog::from(vec![
            Completion {
                date: day(1),
                completed: false,
            },
            Completion {
                date: day(2),
                completed: true,
            },
        ]);
        assert_eq!(log.completed_days().collect::<Vec<_>>(), vec![day(2)]);
        assert_eq!(log.toggle(day(1)), Toggle::Marked);
        assert_eq!(log.completed_count(), 2);
    }

    #[test]
    fn duplicate_records_collapse_to_completed() {
        let log = CompletionLog::from(vec![
            Completion {
                date: day(5),
                completed: true,
            },
            Completion {
                date: day(5),
                completed: false,
            },
        ]);
        assert!(log.is_completed(day(5)));
        assert_eq!(log.records().count(), 1);
    }

    #[test]
    fn milestone_reaches_once() {
        let mut milestone = Milestone::default();
        let first = Utc::now();
        assert!(milestone.reach(first));
        assert!(!milestone.reach(first + chrono::Duration::days(1)));
        assert_eq!(milestone.reached_at(), Some(first));
    }

    #[test]
    fn habit_serializes_with_legacy_milestone_shape() {
        let created = DateTime::parse_from_rfc3339("2025-11-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut habit = Habit::new("Read", Cadence::Daily, created, day(1));
        habit.completions.toggle(day(1));
        habit.milestones.first.reach(created);

        let json = serde_json::to_value(&habit).unwrap();
        assert_eq!(json["cadence"], "daily");
        assert_eq!(json["milestones"]["first"]["reached"], true);
        assert_eq!(json["milestones"]["second"]["reached"], false);
        assert!(json["milestones"]["second"]["date"].is_null());
        assert_eq!(json["completions"][0]["date"], "2025-11-01");

        let back: Habit = serde_json::from_value(json).unwrap();
        assert_eq!(back, habit);
    }

    #[test]
    fn milestone_record_without_date_loads_unreached() {
        let milestone: Milestone =
            serde_json::from_value(serde_json::json!({"reached": true, "date": null})).unwrap();
        assert!(!milestone.is_reached());
        assert_eq!(milestone.reached_at(), None);

        let stale: Milestone = serde_json::from_value(serde_json::json!({
            "reached": false,
            "date": "2025-11-01T08:00:00Z"
        }))
        .unwrap();
        assert!(!stale.is_reached());

        let mut slot = milestone;
        assert!(slot.reach(Utc::now()));
    }

    #[test]
    fn cadence_parses_case_insensitively() {
        assert_eq!("Weekly".parse::<Cadence>().unwrap(), Cadence::Weekly);
        assert!("yearly".parse::<Cadence>().is_err());
    }

    #[test]
    fn reminder_without_days_covers_whole_week() {
        let time = NaiveTime::from_hms_opt(9, 0, 0).unwrap();
        assert_eq!(ReminderConfig::at(time, []).effective_days().len(), 7);
        assert_eq!(
            ReminderConfig::at(time, [1, 3, 9]).effective_days(),
            vec![1, 3]
        );
    }
}
