//! Past/future classification of event instances.

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::parse_times::ClockTime;

/// Source of the current wall-clock time.
pub trait Clock {
    fn now(&self) -> NaiveDateTime;
}

/// Local wall time of the machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// A clock stopped at a given instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDateTime);

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        self.0
    }
}

/// Whether an event on `event_date` ending at `end` finished strictly before `now`.
///
/// Without a date nothing can be said, so the event counts as not past.
pub fn is_past(event_date: Option<NaiveDate>, end: ClockTime, now: NaiveDateTime) -> bool {
    match event_date {
        Some(date) => date.and_time(end.to_naive_time()) < now,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn event_from_a_previous_day_is_past() {
        let date = NaiveDate::from_ymd_opt(2024, 4, 5);
        let end = ClockTime::new(11, 0).unwrap();
        assert!(is_past(date, end, at(2024, 4, 6, 0, 0)));
    }

    #[test]
    fn unknown_date_is_never_past() {
        let end = ClockTime::new(11, 0).unwrap();
        assert!(!is_past(None, end, at(2024, 4, 6, 0, 0)));
        assert!(!is_past(None, end, at(2999, 1, 1, 0, 0)));
    }

    #[test]
    fn end_instant_itself_is_not_past() {
        let date = NaiveDate::from_ymd_opt(2024, 4, 5);
        let end = ClockTime::new(11, 0).unwrap();
        assert!(!is_past(date, end, at(2024, 4, 5, 11, 0)));
        assert!(is_past(
            date,
            end,
            at(2024, 4, 5, 11, 0) + chrono::Duration::milliseconds(1)
        ));
        assert!(!is_past(date, end, at(2024, 4, 5, 10, 59)));
    }

    #[test]
    fn fixed_clock_reports_its_instant() {
        let instant = at(2024, 4, 6, 12, 0);
        assert_eq!(FixedClock(instant).now(), instant);
    }
}
