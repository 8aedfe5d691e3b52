//! Duration labels.

use crate::parse_times::ClockTime;

/// Hours between `start` and `end` on the same day, e.g. `"1h"` or `"1.5h"`.
///
/// There is no overnight wrap: an end before the start yields a negative label.
/// Fractions are rounded to one decimal from the binary value of `minutes / 60`;
/// exact ties round away from zero.
///
/// # Examples
///
/// ```
/// # use calmark_core::duration::compute_duration;
/// # use calmark_core::parse_times::ClockTime;
/// let t = |h, m| ClockTime::new(h, m).unwrap();
/// assert_eq!(compute_duration(t(10, 0), t(11, 30)), "1.5h");
/// assert_eq!(compute_duration(t(9, 0), t(10, 0)), "1h");
/// ```
pub fn compute_duration(start: ClockTime, end: ClockTime) -> String {
    format_minutes(end.minutes_since_midnight() - start.minutes_since_midnight())
}

/// The text placed inside a duration label, e.g. `" (1.5h)"`.
pub fn format_label(duration: &str) -> String {
    format!(" ({duration})")
}

fn format_minutes(minutes: i32) -> String {
    if minutes % 60 == 0 {
        return format!("{}h", minutes / 60);
    }
    // Exact binary ties (0.25h, 0.75h, ...) round away from zero.
    if minutes.unsigned_abs() % 30 == 15 {
        let sign = if minutes < 0 { "-" } else { "" };
        let tenths = (minutes.unsigned_abs() + 3) / 6;
        return format!("{sign}{}.{}h", tenths / 10, tenths % 10);
    }
    let hours = f64::from(minutes) / 60.0;
    format!("{hours:.1}h")
}
