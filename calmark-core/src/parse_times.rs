//! Extraction of event times and dates from a chip's flattened text.
//!
//! Chips render their time range as `10:00 – 11:30` (en-dash) or `9:00 - 10:00`,
//! sometimes with a trailing `am`/`pm` on the end time, and the screen-reader
//! text carries the full date as `April 5, 2024`. Both parsers are pure and
//! return `None` for anything they do not recognize.

use chrono::{Month, NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;

static TIME_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d{1,2}):(\d{2})\s*(?:–|-)\s*(\d{1,2}):(\d{2})(?:\s*([AaPp][Mm])(?:[^a-z]|$))?")
        .expect("valid time range pattern")
});

static EVENT_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(January|February|March|April|May|June|July|August|September|October|November|December)\s+(\d{1,2}),\s+(\d{4})",
    )
    .expect("valid event date pattern")
});

static CLOCK_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d{1,2}:\d{2}").expect("valid clock token pattern"));

/// A time of day in 24-hour form, minute resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    hour: u32,
    minute: u32,
}

impl ClockTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(self) -> u32 {
        self.hour
    }

    pub fn minute(self) -> u32 {
        self.minute
    }

    pub fn minutes_since_midnight(self) -> i32 {
        (self.hour * 60 + self.minute) as i32
    }

    pub fn to_naive_time(self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }
}

impl std::fmt::Display for ClockTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Meridiem {
    Am,
    Pm,
}

impl Meridiem {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_lowercase().as_str() {
            "am" => Some(Meridiem::Am),
            "pm" => Some(Meridiem::Pm),
            _ => None,
        }
    }

    /// `PM` lifts 1–11 into the afternoon, `AM` turns 12 into midnight.
    pub fn to_24h(self, hour: u32) -> u32 {
        match (self, hour) {
            (Meridiem::Pm, h) if h < 12 => h + 12,
            (Meridiem::Am, 12) => 0,
            (_, h) => h,
        }
    }
}

/// Start and end of an event on the same calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedTimeRange {
    pub start: ClockTime,
    pub end: ClockTime,
}

/// Finds the first `H:MM – H:MM` range in `text`.
///
/// Only the end token honours an `am`/`pm` suffix; the start hour is always taken
/// as written. The suffix may run straight into the next word (`11:00pmTeam sync`)
/// but not into a lowercase letter, so `12:30 Amsterdam` stays 12:30. Returns `None`
/// when fewer than two tokens are present or when a token is not a valid time of day.
///
/// # Examples
///
/// ```
/// # use calmark_core::parse_times::{parse_time_range, ClockTime};
/// let range = parse_time_range("Standup, 10:00 – 11:30, Room 4").unwrap();
/// assert_eq!(range.start, ClockTime::new(10, 0).unwrap());
/// assert_eq!(range.end, ClockTime::new(11, 30).unwrap());
///
/// let pm = parse_time_range("1:00 - 2:00PM").unwrap();
/// assert_eq!(pm.end, ClockTime::new(14, 0).unwrap());
///
/// assert!(parse_time_range("Lunch at 12:00").is_none());
/// ```
pub fn parse_time_range(text: &str) -> Option<ParsedTimeRange> {
    let caps = TIME_RANGE.captures(text)?;
    let number = |i: usize| caps.get(i)?.as_str().parse::<u32>().ok();

    let start = ClockTime::new(number(1)?, number(2)?)?;

    let mut end_hour = number(3)?;
    if let Some(meridiem) = caps.get(5).and_then(|m| Meridiem::from_suffix(m.as_str())) {
        end_hour = meridiem.to_24h(end_hour);
    }
    let end = ClockTime::new(end_hour, number(4)?)?;

    Some(ParsedTimeRange { start, end })
}

/// Finds the first `Month D, YYYY` date in `text`.
///
/// # Examples
///
/// ```
/// # use chrono::NaiveDate;
/// # use calmark_core::parse_times::parse_event_date;
/// assert_eq!(
///     parse_event_date("Review, Friday, April 5, 2024"),
///     NaiveDate::from_ymd_opt(2024, 4, 5)
/// );
/// assert_eq!(parse_event_date("no date here"), None);
/// ```
pub fn parse_event_date(text: &str) -> Option<NaiveDate> {
    let caps = EVENT_DATE.captures(text)?;
    let month: Month = caps.get(1)?.as_str().parse().ok()?;
    let day = caps.get(2)?.as_str().parse::<u32>().ok()?;
    let year = caps.get(3)?.as_str().parse::<i32>().ok()?;
    NaiveDate::from_ymd_opt(year, month.number_from_month(), day)
}

/// Whether `text` looks like it holds a clock time.
pub fn contains_clock_token(text: &str) -> bool {
    CLOCK_TOKEN.is_match(text)
}
