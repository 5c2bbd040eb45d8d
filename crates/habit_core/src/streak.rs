//! Streak and milestone arithmetic over a habit's completion log.
//!
//! Two different streak notions live here. [`consecutive_days_since_start`]
//! counts forward from the habit's start day and drives milestones, while
//! [`current_streak`] counts backward from today and drives the streak badge.
//! They can disagree and are kept apart on purpose.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::clock::Moment;
use crate::model::{Cadence, Habit, MilestoneSlot, Toggle};

/// Every milestone slot targets three units of its cadence bucket.
pub const MILESTONE_TARGET: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub toggle: Toggle,
    /// Slots reached by this toggle. Always empty for an unmark.
    pub reached: Vec<MilestoneSlot>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct MilestoneProgress {
    pub first: u32,
    pub second: u32,
    pub third: u32,
    pub first_target: u32,
    pub second_target: u32,
    pub third_target: u32,
}

impl MilestoneProgress {
    fn zero() -> Self {
        Self {
            first: 0,
            second: 0,
            third: 0,
            first_target: MILESTONE_TARGET,
            second_target: MILESTONE_TARGET,
            third_target: MILESTONE_TARGET,
        }
    }

    pub fn for_slot(&self, slot: MilestoneSlot) -> (u32, u32) {
        match slot {
            MilestoneSlot::First => (self.first, self.first_target),
            MilestoneSlot::Second => (self.second, self.second_target),
            MilestoneSlot::Third => (self.third, self.third_target),
        }
    }
}

/// Toggle completion of `day`. Marking a day evaluates milestones; unmarking
/// never retracts one that was already granted.
pub fn mark_complete(habit: &mut Habit, day: NaiveDate, now: Moment) -> ToggleOutcome {
    match habit.completions.toggle(day) {
        Toggle::Unmarked => ToggleOutcome {
            toggle: Toggle::Unmarked,
            reached: Vec::new(),
        },
        Toggle::Marked => ToggleOutcome {
            toggle: Toggle::Marked,
            reached: evaluate_milestones(habit, now),
        },
    }
}

/// Grant every milestone whose threshold is met and that is not yet reached.
/// Returns the newly reached slots in slot order.
pub fn evaluate_milestones(habit: &mut Habit, now: Moment) -> Vec<MilestoneSlot> {
    let days = days_since_start(habit, now.today);
    let mut satisfied = Vec::new();
    match habit.cadence {
        Cadence::Daily => {
            let consecutive = consecutive_days_since_start(habit, now.today);
            if consecutive >= MILESTONE_TARGET {
                satisfied.push(MilestoneSlot::First);
            }
            if consecutive / 7 >= MILESTONE_TARGET {
                satisfied.push(MilestoneSlot::Second);
            }
            if days / 30 >= i64::from(MILESTONE_TARGET) {
                satisfied.push(MilestoneSlot::Third);
            }
        }
        // Only the first slot has a threshold for these cadences.
        Cadence::Weekly => {
            if days / 7 >= i64::from(MILESTONE_TARGET) {
                satisfied.push(MilestoneSlot::First);
            }
        }
        Cadence::Monthly => {
            if days / 30 >= i64::from(MILESTONE_TARGET) {
                satisfied.push(MilestoneSlot::First);
            }
        }
    }

    satisfied
        .into_iter()
        .filter(|slot| habit.milestones.slot_mut(*slot).reach(now.at))
        .collect()
}

/// Completed days in an unbroken run starting at the habit's start day,
/// never looking past `today`.
pub fn consecutive_days_since_start(habit: &Habit, today: NaiveDate) -> u32 {
    let mut count = 0;
    let mut day = habit.start_day;
    while day <= today && habit.completions.is_completed(day) {
        count += 1;
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    count
}

/// Whole calendar days between the start day and `today`. Negative when the
/// start day lies in the future.
pub fn days_since_start(habit: &Habit, today: NaiveDate) -> i64 {
    today.signed_duration_since(habit.start_day).num_days()
}

/// Length of the run of completed days ending today. Zero when today is not
/// completed, even if yesterday was.
pub fn current_streak(habit: &Habit, today: NaiveDate) -> u32 {
    streak_days(habit, today).len() as u32
}

/// The days making up the current streak, newest first.
fn streak_days(habit: &Habit, today: NaiveDate) -> Vec<NaiveDate> {
    let mut days = Vec::new();
    let mut day = today;
    while habit.completions.is_completed(day) {
        days.push(day);
        match day.pred_opt() {
            Some(previous) => day = previous,
            None => break,
        }
    }
    days
}

pub fn active_streak_days(habit: &Habit, today: NaiveDate) -> BTreeSet<NaiveDate> {
    streak_days(habit, today).into_iter().collect()
}

pub fn milestone_progress(habit: &Habit, today: NaiveDate) -> MilestoneProgress {
    match habit.cadence {
        Cadence::Daily => {
            let consecutive = consecutive_days_since_start(habit, today);
            let months = (days_since_start(habit, today) / 30).max(0) as u32;
            MilestoneProgress {
                first: consecutive.min(MILESTONE_TARGET),
                second: (consecutive / 7).min(MILESTONE_TARGET),
                third: months.min(MILESTONE_TARGET),
                ..MilestoneProgress::zero()
            }
        }
        // Progress is not tracked for these cadences yet.
        Cadence::Weekly | Cadence::Monthly => MilestoneProgress::zero(),
    }
}

pub fn is_completed_on(habit: &Habit, day: NaiveDate) -> bool {
    habit.completions.is_completed(day)
}
