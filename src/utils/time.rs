use chrono::{DateTime, Local, TimeZone, Utc};
use now::DateTimeNow;

/// Formats a millisecond duration as `H:MM:SS`. Hours are unpadded and
/// unbounded, so a multi-day total like 90 hours prints as `90:00:00`.
pub fn format_duration(ms: i64) -> String {
    let ms = ms.max(0);
    let hours = ms / 3_600_000;
    let minutes = ms % 3_600_000 / 60_000;
    let seconds = ms % 60_000 / 1000;
    format!("{hours}:{minutes:02}:{seconds:02}")
}

/// Returns the most recent midnight before `moment` in its own time zone.
pub fn day_start<Tz: TimeZone>(moment: DateTime<Tz>) -> DateTime<Tz> {
    moment.beginning_of_day()
}

/// Renders an instant as a local 12-hour clock time, e.g. `9:05:40 PM`.
pub fn local_clock(moment: DateTime<Utc>) -> String {
    moment.with_timezone(&Local).format("%-I:%M:%S %p").to_string()
}
