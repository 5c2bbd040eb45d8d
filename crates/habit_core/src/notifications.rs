use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::model::{Cadence, Habit, HabitId, MilestoneSlot};

pub const REMINDER_TITLE: &str = "Habit Reminder";
pub const CELEBRATION_TITLE: &str = "🎉 Milestone Achieved!";

/// A repeating weekly reminder for one habit on one weekday.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReminderRequest {
    pub habit_id: HabitId,
    pub identifier: String,
    pub title: String,
    pub body: String,
    pub weekday: Weekday,
    pub time: NaiveTime,
}

/// An immediate notification for a newly reached milestone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CelebrationRequest {
    pub habit_id: HabitId,
    pub slot: MilestoneSlot,
    pub identifier: String,
    pub title: String,
    pub body: String,
}

/// Delivery backend for reminders and celebrations, injected into the service.
pub trait NotificationSink: Send + Sync {
    fn schedule_reminder(&self, reminder: &ReminderRequest);
    fn cancel_reminders(&self, habit_id: HabitId, identifiers: &[String]);
    fn send_celebration(&self, celebration: &CelebrationRequest);
}

/// Sink that only records requests in the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn schedule_reminder(&self, reminder: &ReminderRequest) {
        tracing::info!(
            habit = %reminder.habit_id,
            id = %reminder.identifier,
            weekday = ?reminder.weekday,
            time = %reminder.time,
            "reminder scheduled"
        );
    }

    fn cancel_reminders(&self, habit_id: HabitId, identifiers: &[String]) {
        tracing::info!(habit = %habit_id, count = identifiers.len(), "reminders cancelled");
    }

    fn send_celebration(&self, celebration: &CelebrationRequest) {
        tracing::info!(
            habit = %celebration.habit_id,
            milestone = celebration.slot.index(),
            body = %celebration.body,
            "milestone celebration"
        );
    }
}

fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

pub fn reminder_identifier(habit_id: HabitId, day_index: u8) -> String {
    format!("{habit_id}-{day_index}")
}

/// Reminders to schedule for `habit`. Only enabled daily habits with a
/// reminder time produce any.
pub fn reminder_requests(habit: &Habit) -> Vec<ReminderRequest> {
    let reminder = &habit.reminder;
    let Some(time) = reminder.time.filter(|_| reminder.enabled) else {
        return Vec::new();
    };
    if habit.cadence != Cadence::Daily {
        return Vec::new();
    }
    reminder
        .effective_days()
        .into_iter()
        .filter_map(|index| {
            let weekday = weekday_from_index(index)?;
            Some(ReminderRequest {
                habit_id: habit.id,
                identifier: reminder_identifier(habit.id, index),
                title: REMINDER_TITLE.to_string(),
                body: format!("Don't forget to complete: {}", habit.name),
                weekday,
                time,
            })
        })
        .collect()
}

/// Identifiers to cancel for `habit`, covering every selected weekday.
pub fn reminder_identifiers(habit: &Habit) -> Vec<String> {
    habit
        .reminder
        .effective_days()
        .into_iter()
        .map(|index| reminder_identifier(habit.id, index))
        .collect()
}

/// Human wording of a milestone. Weekly and monthly habits only ever reach
/// the first slot, so their second and third phrases are never delivered.
pub fn milestone_text(cadence: Cadence, slot: MilestoneSlot) -> &'static str {
    match (slot, cadence) {
        (MilestoneSlot::First, Cadence::Daily) => "3 days",
        (MilestoneSlot::First, Cadence::Weekly) => "3 weeks",
        (MilestoneSlot::First, Cadence::Monthly) => "3 months",
        (MilestoneSlot::Second, Cadence::Daily) => "3 weeks",
        (MilestoneSlot::Second, Cadence::Weekly) => "3 months",
        (MilestoneSlot::Second, Cadence::Monthly) => "3 quarters",
        (MilestoneSlot::Third, Cadence::Daily) => "3 months",
        (MilestoneSlot::Third, Cadence::Weekly) => "3 quarters",
        (MilestoneSlot::Third, Cadence::Monthly) => "3 years",
    }
}

pub fn celebration_request(habit: &Habit, slot: MilestoneSlot) -> CelebrationRequest {
    CelebrationRequest {
        habit_id: habit.id,
        slot,
        identifier: format!("milestone-{}-{}", habit.id, slot.index()),
        title: CELEBRATION_TITLE.to_string(),
        body: format!(
            "Congratulations! You've completed {} of {}!",
            milestone_text(habit.cadence, slot),
            habit.name
        ),
    }
}

/// In-app banner for a milestone reached today.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CelebrationMessage {
    pub slot: MilestoneSlot,
    pub message: String,
}

/// Banner for the lowest reached milestone if it was reached today. Higher
/// slots are not considered once a lower one is reached.
pub fn todays_celebration(habit: &Habit, clock: &dyn Clock) -> Option<CelebrationMessage> {
    let slot = MilestoneSlot::ALL
        .into_iter()
        .find(|slot| habit.milestones.slot(*slot).is_reached())?;
    let reached_at = habit.milestones.slot(slot).reached_at()?;
    if clock.day_of(reached_at) != clock.today() {
        return None;
    }
    let suffix = match slot {
        MilestoneSlot::First => "Keep it up! 🎉",
        MilestoneSlot::Second => "Amazing progress! 🎉",
        MilestoneSlot::Third => "Incredible achievement! 🎉",
    };
    Some(CelebrationMessage {
        slot,
        message: format!(
            "You've completed {} of {}! {}",
            milestone_text(habit.cadence, slot),
            habit.name,
            suffix
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::model::ReminderConfig;
    use chrono::{DateTime, Duration, NaiveDate, Utc};

    fn created() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-11-02T07:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn habit(cadence: Cadence) -> Habit {
        Habit::new(
            "Journal",
            cadence,
            created(),
            NaiveDate::from_ymd_opt(2025, 11, 2).unwrap(),
        )
    }

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    #[test]
    fn daily_reminders_cover_selected_days() {
        let habit = habit(Cadence::Daily).with_reminder(ReminderConfig::at(nine(), [0, 3]));
        let requests = reminder_requests(&habit);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].weekday, Weekday::Sun);
        assert_eq!(requests[1].weekday, Weekday::Wed);
        assert_eq!(requests[1].identifier, format!("{}-3", habit.id));
        assert_eq!(requests[0].title, REMINDER_TITLE);
        assert_eq!(requests[0].body, "Don't forget to complete: Journal");
    }

    #[test]
    fn reminders_default_to_every_day() {
        let habit = habit(Cadence::Daily).with_reminder(ReminderConfig::at(nine(), []));
        assert_eq!(reminder_requests(&habit).len(), 7);
        assert_eq!(reminder_identifiers(&habit).len(), 7);
    }

    #[test]
    fn no_reminders_when_disabled_or_not_daily() {
        assert!(reminder_requests(&habit(Cadence::Daily)).is_empty());

        let mut no_time = habit(Cadence::Daily);
        no_time.reminder.enabled = true;
        assert!(reminder_requests(&no_time).is_empty());

        for cadence in [Cadence::Weekly, Cadence::Monthly] {
            let habit = habit(cadence).with_reminder(ReminderConfig::at(nine(), [1]));
            assert!(reminder_requests(&habit).is_empty());
        }
    }

    #[test]
    fn celebration_text_follows_cadence_table() {
        let weekly = habit(Cadence::Weekly);
        let request = celebration_request(&weekly, MilestoneSlot::Second);
        assert_eq!(request.identifier, format!("milestone-{}-2", weekly.id));
        assert_eq!(request.title, CELEBRATION_TITLE);
        assert_eq!(
            request.body,
            "Congratulations! You've completed 3 months of Journal!"
        );
        assert_eq!(milestone_text(Cadence::Monthly, MilestoneSlot::Third), "3 years");
        assert_eq!(milestone_text(Cadence::Daily, MilestoneSlot::First), "3 days");
    }

    #[test]
    fn todays_celebration_only_on_the_reaching_day() {
        let clock = FixedClock::utc(created());
        let mut habit = habit(Cadence::Daily);
        assert!(todays_celebration(&habit, &clock).is_none());

        habit.milestones.first.reach(created());
        let banner = todays_celebration(&habit, &clock).unwrap();
        assert_eq!(banner.slot, MilestoneSlot::First);
        assert_eq!(banner.message, "You've completed 3 days of Journal! Keep it up! 🎉");

        clock.advance(Duration::days(1));
        assert!(todays_celebration(&habit, &clock).is_none());
    }

    #[test]
    fn todays_celebration_stops_at_lowest_reached_slot() {
        let clock = FixedClock::utc(created());
        let mut habit = habit(Cadence::Daily);
        habit.milestones.first.reach(created() - Duration::days(30));
        habit.milestones.second.reach(created());
        assert!(todays_celebration(&habit, &clock).is_none());
    }
}
