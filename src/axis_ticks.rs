//! Time-axis tick selection.
//!
//! The spacing is picked from a fixed ladder of "nice" intervals. Intervals up
//! to three hours align to UTC multiples; longer ones align to local wall time
//! so that daily ticks land on local midnight.

use crate::data_types::ViewportRange;
use crate::utils::date_formatter::{determine_date_format, format_timestamp};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

const MINUTE: i64 = 60;
const HOUR: i64 = 3600;
const DAY: i64 = 24 * HOUR;

/// Allowed tick spacings in seconds: 1m .. 2d.
pub const TICK_LADDER: [i64; 14] = [
    MINUTE,
    2 * MINUTE,
    3 * MINUTE,
    5 * MINUTE,
    10 * MINUTE,
    15 * MINUTE,
    30 * MINUTE,
    HOUR,
    2 * HOUR,
    3 * HOUR,
    6 * HOUR,
    12 * HOUR,
    DAY,
    2 * DAY,
];

/// Intervals strictly above this align to local time.
pub const LOCAL_ALIGNMENT_ABOVE: i64 = 3 * HOUR;

const MAX_TICKS: usize = 512;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AxisTick {
    pub at: DateTime<Utc>,
    pub label: String,
}

/// Ladder interval nearest to `visible_secs / label_count`. Ties pick the
/// shorter interval.
pub fn select_interval(visible_secs: f64, label_count: usize) -> i64 {
    let target = visible_secs / label_count.max(1) as f64;
    TICK_LADDER
        .iter()
        .copied()
        .min_by(|a, b| {
            let da = (*a as f64 - target).abs();
            let db = (*b as f64 - target).abs();
            da.total_cmp(&db)
        })
        .unwrap_or(HOUR)
}

/// Tick instants inside `range`.
pub fn tick_instants(range: &ViewportRange, label_count: usize, tz: Tz) -> Vec<DateTime<Utc>> {
    let span = range.span();
    if !(span.is_finite() && span > 0.0) {
        return Vec::new();
    }
    let (Some(min), Some(max)) = (range.min_time(), range.max_time()) else {
        return Vec::new();
    };
    let interval = select_interval(span, label_count);
    if interval > LOCAL_ALIGNMENT_ABOVE {
        local_aligned(min, max, interval, tz)
    } else {
        utc_aligned(min, max, interval)
    }
}

/// Tick instants with labels formatted in `tz`.
pub fn ticks(range: &ViewportRange, label_count: usize, tz: Tz) -> Vec<AxisTick> {
    let interval = select_interval(range.span(), label_count);
    let format = determine_date_format(interval);
    tick_instants(range, label_count, tz)
        .into_iter()
        .map(|at| AxisTick {
            at,
            label: format_timestamp(at, format, tz),
        })
        .collect()
}

fn utc_aligned(min: DateTime<Utc>, max: DateTime<Utc>, interval: i64) -> Vec<DateTime<Utc>> {
    let mut secs = min.timestamp().div_euclid(interval) * interval;
    let mut out = Vec::new();
    while out.len() < MAX_TICKS {
        let Some(at) = DateTime::from_timestamp(secs, 0) else {
            break;
        };
        if at > max {
            break;
        }
        if at >= min {
            out.push(at);
        }
        secs += interval;
    }
    out
}

fn local_aligned(min: DateTime<Utc>, max: DateTime<Utc>, interval: i64, tz: Tz) -> Vec<DateTime<Utc>> {
    let mut day = min.with_timezone(&tz).date_naive();
    let (day_step, hour_step) = if interval >= DAY {
        ((interval / DAY) as u64, 24)
    } else {
        (1, (interval / HOUR) as u32)
    };

    let mut out = Vec::new();
    'days: while out.len() < MAX_TICKS {
        for hour in (0..24).step_by(hour_step.max(1) as usize) {
            // Wall times skipped by a DST jump have no instant.
            let Some(at) = local_instant(day, hour, tz) else {
                continue;
            };
            if at > max {
                break 'days;
            }
            if at >= min {
                out.push(at);
            }
        }
        match day.checked_add_days(Days::new(day_step)) {
            Some(next) => day = next,
            None => break,
        }
    }
    out
}

fn local_instant(day: NaiveDate, hour: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let naive = day.and_hms_opt(hour, 0, 0)?;
    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}
