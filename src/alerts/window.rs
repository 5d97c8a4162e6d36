//! Time-of-day gating for alert rules

use chrono::{DateTime, Datelike, Local, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

use super::AlertHours;

/// Whether `now` falls inside the rule's alert hours.
///
/// Misconfiguration never silences alerts: a malformed `HH:MM` admits the
/// alert and an unknown zone name falls back to UTC.
pub fn is_within_window(hours: Option<&AlertHours>, now: DateTime<Utc>) -> bool {
    let Some(hours) = hours else {
        return true;
    };

    let (weekday, time) = wall_clock(hours.timezone.as_deref(), now);

    if !hours.days.is_empty() && !hours.days.iter().any(|d| day_matches(d, weekday)) {
        return false;
    }

    let (start, end) = match (parse_hhmm(&hours.start), parse_hhmm(&hours.end)) {
        (Some(start), Some(end)) => (start, end),
        _ => {
            tracing::warn!(
                start = %hours.start,
                end = %hours.end,
                "Malformed alert_hours, alerting anyway"
            );
            return true;
        }
    };

    if end < start {
        // window spans midnight
        time > start || time < end
    } else {
        time > start && time < end
    }
}

/// Weekday and time of day of `now` in the configured zone
fn wall_clock(timezone: Option<&str>, now: DateTime<Utc>) -> (Weekday, NaiveTime) {
    let name = timezone
        .map(str::trim)
        .filter(|tz| !tz.is_empty() && !tz.eq_ignore_ascii_case("local"));

    match name {
        None => {
            let local = now.with_timezone(&Local);
            (local.weekday(), local.time())
        }
        Some(name) => match name.parse::<Tz>() {
            Ok(tz) => {
                let zoned = now.with_timezone(&tz);
                (zoned.weekday(), zoned.time())
            }
            Err(_) => {
                tracing::warn!(timezone = %name, "Unknown timezone in alert_hours, using UTC");
                (now.weekday(), now.time())
            }
        },
    }
}

fn parse_hhmm(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M").ok()
}

/// Accepts `mon`..`sun` or full day names, any case
fn day_matches(day: &str, weekday: Weekday) -> bool {
    let day = day.trim().to_lowercase();
    let (short, long) = match weekday {
        Weekday::Mon => ("mon", "monday"),
        Weekday::Tue => ("tue", "tuesday"),
        Weekday::Wed => ("wed", "wednesday"),
        Weekday::Thu => ("thu", "thursday"),
        Weekday::Fri => ("fri", "friday"),
        Weekday::Sat => ("sat", "saturday"),
        Weekday::Sun => ("sun", "sunday"),
    };
    day == short || day == long
}
