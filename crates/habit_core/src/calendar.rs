use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::model::Habit;
use crate::streak;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub in_current_month: bool,
    pub is_today: bool,
    pub is_start_date: bool,
    pub completed: bool,
    pub in_active_streak: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct UnifiedDay {
    pub date: NaiveDate,
    pub in_current_month: bool,
    pub is_today: bool,
    pub completed_count: usize,
    pub in_active_streak: bool,
}

/// Dates of `anchor`'s month laid out in Sunday-first weeks, padded with the
/// neighbouring months' days so every row is full. Empty when the padding
/// would fall before the first representable date.
pub fn month_grid(anchor: NaiveDate) -> Vec<NaiveDate> {
    let Some(first) = anchor.with_day(1) else {
        return Vec::new();
    };
    let leading = first.weekday().num_days_from_sunday();
    let Some(grid_start) = first.checked_sub_days(Days::new(u64::from(leading))) else {
        return Vec::new();
    };
    let month_len = first
        .iter_days()
        .take_while(|day| day.month() == first.month())
        .count();
    let cells = (leading as usize + month_len).div_ceil(7) * 7;
    grid_start.iter_days().take(cells).collect()
}

fn same_month(a: NaiveDate, b: NaiveDate) -> bool {
    a.year() == b.year() && a.month() == b.month()
}

pub fn habit_calendar(habit: &Habit, anchor: NaiveDate, today: NaiveDate) -> Vec<CalendarDay> {
    let streak_days = streak::active_streak_days(habit, today);
    month_grid(anchor)
        .into_iter()
        .map(|date| CalendarDay {
            date,
            in_current_month: same_month(date, anchor),
            is_today: date == today,
            is_start_date: date == habit.start_day,
            completed: habit.completions.is_completed(date),
            in_active_streak: streak_days.contains(&date),
        })
        .collect()
}

/// Calendar across every habit: per day, how many habits were completed and
/// whether any habit's current streak runs through it.
pub fn unified_calendar(habits: &[Habit], anchor: NaiveDate, today: NaiveDate) -> Vec<UnifiedDay> {
    let streaks: Vec<_> = habits
        .iter()
        .map(|habit| streak::active_streak_days(habit, today))
        .collect();
    month_grid(anchor)
        .into_iter()
        .map(|date| UnifiedDay {
            date,
            in_current_month: same_month(date, anchor),
            is_today: date == today,
            completed_count: habits
                .iter()
                .filter(|habit| habit.completions.is_completed(date))
                .count(),
            in_active_streak: streaks.iter().any(|days| days.contains(&date)),
        })
        .collect()
}

/// Habits completed on `date`, in the order given.
pub fn day_detail(habits: &[Habit], date: NaiveDate) -> Vec<&Habit> {
    habits
        .iter()
        .filter(|habit| habit.completions.is_completed(date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Cadence;
    use chrono::{NaiveDateTime, NaiveTime, Weekday};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn habit(name: &str, start: NaiveDate, done: &[NaiveDate]) -> Habit {
        let created = NaiveDateTime::new(start, NaiveTime::from_hms_opt(8, 0, 0).unwrap()).and_utc();
        let mut habit = Habit::new(name, Cadence::Daily, created, start);
        habit.completions = done.iter().copied().collect();
        habit
    }

    #[test]
    fn grid_starts_on_sunday_and_fills_weeks() {
        for month in 1..=12 {
            let grid = month_grid(date(2025, month, 15));
            assert_eq!(grid[0].weekday(), Weekday::Sun, "month {month}");
            assert_eq!(grid.len() % 7, 0, "month {month}");
            assert!(grid.contains(&date(2025, month, 1)));
        }
    }

    #[test]
    fn november_2025_grid_is_padded_both_ways() {
        // 1 Nov 2025 is a Saturday and 30 Nov a Sunday.
        let grid = month_grid(date(2025, 11, 20));
        assert_eq!(grid.len(), 42);
        assert_eq!(grid[0], date(2025, 10, 26));
        assert_eq!(grid[6], date(2025, 11, 1));
        assert_eq!(*grid.last().unwrap(), date(2025, 12, 6));
    }

    #[test]
    fn february_starting_on_sunday_needs_four_rows() {
        let grid = month_grid(date(2026, 2, 1));
        assert_eq!(grid.len(), 28);
        assert_eq!(grid[0], date(2026, 2, 1));
    }

    #[test]
    fn grid_at_the_edges_of_the_date_range() {
        // The first representable month starts on a Thursday, so its padding
        // would precede the range.
        assert!(month_grid(NaiveDate::MIN).is_empty());

        let last = month_grid(NaiveDate::MAX);
        assert_eq!(last[0].weekday(), Weekday::Sun);
        assert!(last.iter().all(|day| *day <= NaiveDate::MAX));
    }

    #[test]
    fn habit_calendar_marks_streak_and_start() {
        let start = date(2025, 11, 3);
        let habit = habit(
            "Walk",
            start,
            &[date(2025, 11, 3), date(2025, 11, 5), date(2025, 11, 6)],
        );
        let days = habit_calendar(&habit, start, date(2025, 11, 6));
        let find = |d: NaiveDate| days.iter().find(|cell| cell.date == d).copied().unwrap();

        assert!(find(start).is_start_date);
        assert!(find(start).completed);
        assert!(!find(start).in_active_streak);
        assert!(find(date(2025, 11, 5)).in_active_streak);
        assert!(find(date(2025, 11, 6)).is_today);
        assert!(!find(date(2025, 10, 26)).in_current_month);
    }

    #[test]
    fn unified_calendar_counts_habits_per_day() {
        let day = date(2025, 11, 10);
        let habits = vec![
            habit("Walk", date(2025, 11, 1), &[day]),
            habit("Read", date(2025, 11, 1), &[day, date(2025, 11, 9)]),
            habit("Code", date(2025, 11, 1), &[]),
        ];
        let cells = unified_calendar(&habits, day, day);
        let cell = cells.iter().find(|cell| cell.date == day).unwrap();
        assert_eq!(cell.completed_count, 2);
        assert!(cell.in_active_streak);

        let previous = cells.iter().find(|cell| cell.date == date(2025, 11, 9)).unwrap();
        assert_eq!(previous.completed_count, 1);
        assert!(previous.in_active_streak);

        let names: Vec<_> = day_detail(&habits, day).iter().map(|h| h.name.as_str()).collect();
        assert_eq!(names, vec!["Walk", "Read"]);
    }
}
