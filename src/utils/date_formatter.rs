use chrono::{DateTime, Utc};
use chrono_tz::Tz;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SmartDateFormat {
    DayMonth,   // 12 Jan
    HourMin,    // 10:30
    HourMinSec, // 10:30:15
}

/// Determines the label format from the tick spacing (in seconds).
pub fn determine_date_format(tick_interval_sec: i64) -> SmartDateFormat {
    const MINUTE: i64 = 60;
    const DAY: i64 = 24 * 3600;

    if tick_interval_sec >= DAY {
        SmartDateFormat::DayMonth
    } else if tick_interval_sec >= MINUTE {
        SmartDateFormat::HourMin
    } else {
        SmartDateFormat::HourMinSec
    }
}

/// Formats an instant in the given zone.
pub fn format_timestamp(value: DateTime<Utc>, format: SmartDateFormat, tz: Tz) -> String {
    let local = value.with_timezone(&tz);
    match format {
        SmartDateFormat::DayMonth => local.format("%d %b").to_string(),
        SmartDateFormat::HourMin => local.format("%H:%M").to_string(),
        SmartDateFormat::HourMinSec => local.format("%H:%M:%S").to_string(),
    }
}
