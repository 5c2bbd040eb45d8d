use chrono::{DateTime, Duration, FixedOffset, Local, NaiveDate, Offset, Utc};
use parking_lot::Mutex;

/// A point in time together with the local calendar day it falls on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Moment {
    pub at: DateTime<Utc>,
    pub today: NaiveDate,
}

impl Moment {
    pub fn new(at: DateTime<Utc>, today: NaiveDate) -> Self {
        Self { at, today }
    }
}

/// Source of "now" and of day-boundary normalisation in the user's calendar.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate;

    fn today(&self) -> NaiveDate {
        self.day_of(self.now())
    }

    fn moment(&self) -> Moment {
        let at = self.now();
        Moment::new(at, self.day_of(at))
    }
}

/// Wall clock bucketed by the machine's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&Local).date_naive()
    }
}

/// Manually driven clock with a fixed UTC offset.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
    offset: FixedOffset,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        Self {
            now: Mutex::new(now),
            offset,
        }
    }

    pub fn utc(now: DateTime<Utc>) -> Self {
        Self::new(now, Utc.fix())
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }

    fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.offset).date_naive()
    }
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        (**self).day_of(instant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instant(raw: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn day_boundary_follows_offset() {
        let late_evening_utc = instant("2025-11-03T23:30:00Z");
        let tokyo = FixedClock::new(late_evening_utc, FixedOffset::east_opt(9 * 3600).unwrap());
        let utc = FixedClock::utc(late_evening_utc);

        assert_eq!(utc.today(), NaiveDate::from_ymd_opt(2025, 11, 3).unwrap());
        assert_eq!(tokyo.today(), NaiveDate::from_ymd_opt(2025, 11, 4).unwrap());
    }

    #[test]
    fn advance_moves_today() {
        let clock = FixedClock::utc(instant("2025-11-03T10:00:00Z"));
        clock.advance(Duration::days(2));
        let moment = clock.moment();
        assert_eq!(moment.today, NaiveDate::from_ymd_opt(2025, 11, 5).unwrap());
        assert_eq!(moment.at, instant("2025-11-05T10:00:00Z"));
    }
}
