use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    calendar,
    clock::{Clock, SystemClock},
    model::{Habit, HabitId, NewHabit},
    notifications::{self, CelebrationMessage, NotificationSink},
    store::{HabitStore, MemoryStore, StoreError},
    streak::{self, MilestoneProgress, ToggleOutcome},
};

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("habit {0} is not loaded")]
    UnknownHabit(HabitId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, ServiceError>;

/// `None` once the habit has been deleted. A caller that fetched the handle
/// before the delete sees the marker after locking.
type HabitHandle = Arc<Mutex<Option<Habit>>>;

/// Owns the loaded habits and routes every mutation through the streak
/// engine. Each habit sits behind its own mutex so a toggle's check and
/// write happen under one lock, and a delete cannot interleave with them.
pub struct HabitService {
    habits: RwLock<HashMap<HabitId, HabitHandle>>,
    store: Box<dyn HabitStore>,
    notification_sink: Option<Box<dyn NotificationSink>>,
    clock: Box<dyn Clock>,
}

pub struct HabitServiceBuilder {
    store: Option<Box<dyn HabitStore>>,
    notification_sink: Option<Box<dyn NotificationSink>>,
    clock: Option<Box<dyn Clock>>,
}

impl HabitServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            notification_sink: None,
            clock: None,
        }
    }

    pub fn with_store(mut self, store: Box<dyn HabitStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_notification_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.notification_sink = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Load every habit from the store. Failing here is fatal for the caller.
    pub fn build(self) -> Result<HabitService> {
        let service = HabitService {
            habits: RwLock::new(HashMap::new()),
            store: self.store.unwrap_or_else(|| Box::new(MemoryStore::new())),
            notification_sink: self.notification_sink,
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
        };
        service.reload()?;
        Ok(service)
    }
}

impl Default for HabitServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl HabitService {
    pub fn builder() -> HabitServiceBuilder {
        HabitServiceBuilder::new()
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Replace the in-memory habits with the store's contents.
    pub fn reload(&self) -> Result<()> {
        let loaded = self.store.load_all()?;
        let mut habits = self.habits.write();
        habits.clear();
        for habit in loaded {
            habits.insert(habit.id, Arc::new(Mutex::new(Some(habit))));
        }
        info!(count = habits.len(), "habits loaded");
        Ok(())
    }

    pub fn add_habit(&self, new: NewHabit) -> HabitId {
        let moment = self.clock.moment();
        let habit = Habit::new(new.name, new.cadence, moment.at, moment.today)
            .with_reminder(new.reminder);
        let id = habit.id;
        info!(habit = %id, name = %habit.name, cadence = %habit.cadence, "habit added");

        self.persist(&habit);
        if let Some(sink) = &self.notification_sink {
            for reminder in notifications::reminder_requests(&habit) {
                sink.schedule_reminder(&reminder);
            }
        }
        self.habits.write().insert(id, Arc::new(Mutex::new(Some(habit))));
        id
    }

    /// Mark or unmark `day` for the habit, celebrating any milestone reached.
    pub fn toggle_completion(&self, id: HabitId, day: NaiveDate) -> Result<ToggleOutcome> {
        let handle = self.handle(id)?;
        self.toggle_handle(&handle, id, day)
    }

    /// Toggle the local calendar day that `instant` falls on.
    pub fn toggle_completion_at(&self, id: HabitId, instant: DateTime<Utc>) -> Result<ToggleOutcome> {
        let day = self.clock.day_of(instant);
        self.toggle_completion(id, day)
    }

    /// Drop the habit together with its completions and pending reminders.
    pub fn delete_habit(&self, id: HabitId) -> Result<Habit> {
        let handle = self
            .habits
            .write()
            .remove(&id)
            .ok_or(ServiceError::UnknownHabit(id))?;
        // Held until the store delete finishes so no toggle can save in between.
        let mut slot = handle.lock();
        let habit = slot.take().ok_or(ServiceError::UnknownHabit(id))?;

        if let Some(sink) = &self.notification_sink {
            sink.cancel_reminders(id, &notifications::reminder_identifiers(&habit));
        }
        if let Err(err) = self.store.delete(id) {
            warn!(habit = %id, %err, "failed to delete habit from store");
        }
        drop(slot);
        info!(habit = %id, completions = habit.completions.completed_count(), "habit deleted");
        Ok(habit)
    }

    pub fn habit(&self, id: HabitId) -> Result<Habit> {
        self.read(id, Habit::clone)
    }

    /// Snapshot of every habit, oldest first.
    pub fn habits(&self) -> Vec<Habit> {
        let handles: Vec<HabitHandle> = self.habits.read().values().cloned().collect();
        let mut habits: Vec<Habit> = handles
            .iter()
            .filter_map(|handle| handle.lock().clone())
            .collect();
        habits.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        habits
    }

    pub fn current_streak(&self, id: HabitId) -> Result<u32> {
        let today = self.clock.today();
        self.read(id, |habit| streak::current_streak(habit, today))
    }

    pub fn milestone_progress(&self, id: HabitId) -> Result<MilestoneProgress> {
        let today = self.clock.today();
        self.read(id, |habit| streak::milestone_progress(habit, today))
    }

    pub fn is_completed_today(&self, id: HabitId) -> Result<bool> {
        let today = self.clock.today();
        self.read(id, |habit| streak::is_completed_on(habit, today))
    }

    pub fn celebration_for_today(&self, id: HabitId) -> Result<Option<CelebrationMessage>> {
        self.read(id, |habit| notifications::todays_celebration(habit, self.clock.as_ref()))
    }

    pub fn habits_completed_on(&self, day: NaiveDate) -> Vec<Habit> {
        let habits = self.habits();
        calendar::day_detail(&habits, day)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn habit_calendar(&self, id: HabitId, anchor: NaiveDate) -> Result<Vec<calendar::CalendarDay>> {
        let today = self.clock.today();
        self.read(id, |habit| calendar::habit_calendar(habit, anchor, today))
    }

    pub fn unified_calendar(&self, anchor: NaiveDate) -> Vec<calendar::UnifiedDay> {
        calendar::unified_calendar(&self.habits(), anchor, self.clock.today())
    }
}

impl HabitService {
    fn handle(&self, id: HabitId) -> Result<HabitHandle> {
        self.habits
            .read()
            .get(&id)
            .cloned()
            .ok_or(ServiceError::UnknownHabit(id))
    }

    fn read<T>(&self, id: HabitId, f: impl FnOnce(&Habit) -> T) -> Result<T> {
        let handle = self.handle(id)?;
        let habit = handle.lock();
        habit.as_ref().map(f).ok_or(ServiceError::UnknownHabit(id))
    }

    fn toggle_handle(&self, handle: &HabitHandle, id: HabitId, day: NaiveDate) -> Result<ToggleOutcome> {
        let mut slot = handle.lock();
        let habit = slot.as_mut().ok_or(ServiceError::UnknownHabit(id))?;
        let outcome = streak::mark_complete(habit, day, self.clock.moment());
        debug!(habit = %id, %day, toggle = ?outcome.toggle, reached = ?outcome.reached, "completion toggled");

        if let Some(sink) = &self.notification_sink {
            for reached in &outcome.reached {
                sink.send_celebration(&notifications::celebration_request(habit, *reached));
            }
        }
        self.persist(habit);
        Ok(outcome)
    }

    /// The in-memory habit stays authoritative when the write fails.
    fn persist(&self, habit: &Habit) {
        if let Err(err) = self.store.save(habit) {
            warn!(habit = %habit.id, %err, "failed to persist habit");
        }
    }
}
