use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::Europe::Helsinki;
use chrono_tz::Tz;
use sensor_chart::axis_ticks::{select_interval, tick_instants, ticks};
use sensor_chart::data_types::ViewportRange;
use sensor_chart::utils::date_formatter::{determine_date_format, SmartDateFormat};

fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
}

#[test]
fn test_axis_range_pan() {
    let mut range = ViewportRange::new(100.0, 200.0);
    range.pan(50.0);
    assert_eq!(range.min, 150.0);
    assert_eq!(range.max, 250.0);
    assert_eq!(range.span(), 100.0);
}

#[test]
fn test_axis_range_zoom_center() {
    let mut range = ViewportRange::new(100.0, 200.0);
    // Zoom in (factor 0.5) at center (pivot_pct 0.5)
    range.zoom_at(150.0, 0.5, 0.5);
    assert_eq!(range.min, 125.0);
    assert_eq!(range.max, 175.0);
    assert_eq!(range.span(), 50.0);
}

#[test]
fn test_axis_range_zoom_edge() {
    let mut range = ViewportRange::new(100.0, 200.0);
    // Zoom out (factor 2.0) at left edge (pivot_pct 0.0)
    range.zoom_at(100.0, 0.0, 2.0);
    assert_eq!(range.min, 100.0);
    assert_eq!(range.max, 300.0);
}

#[test]
fn test_axis_range_clamp() {
    let mut range = ViewportRange::new(100.0, 200.0).with_limits(Some(50.0), Some(250.0));

    // Pan within limits
    range.pan(-20.0); // [80, 180]
    range.clamp();
    assert_eq!(range.min, 80.0);

    // Pan outside min limit
    range.pan(-40.0); // [40, 140]
    range.clamp();
    assert_eq!(range.min, 50.0);
    assert_eq!(range.max, 150.0); // Span should be preserved

    // Pan outside max limit
    range.pan(150.0); // [200, 300]
    range.clamp();
    assert_eq!(range.max, 250.0);
    assert_eq!(range.min, 150.0);
}

#[test]
fn test_expanded_query_range() {
    let range = ViewportRange::new(1_000.0, 2_000.0);
    assert_eq!(range.expanded(range.span()), ViewportRange::new(-1_000.0, 4_000.0));
    assert!(range.contains(1_000.0) && range.contains(2_000.0));
    assert!(!range.contains(2_000.5));
}

#[test]
fn test_interval_ladder_selection() {
    // One hour over six labels: 10 minutes.
    assert_eq!(select_interval(3_600.0, 6), 600);
    // Four hours per label sits between 3h and 6h, nearer 3h.
    assert_eq!(select_interval(24.0 * 3_600.0, 6), 3 * 3_600);
    // 4.5h is equidistant from 3h and 6h: the shorter interval wins.
    assert_eq!(select_interval(27.0 * 3_600.0, 6), 3 * 3_600);
    // Seven days over six labels: one day.
    assert_eq!(select_interval(7.0 * 86_400.0, 6), 86_400);
    // Clamped to the ends of the ladder.
    assert_eq!(select_interval(10.0, 6), 60);
    assert_eq!(select_interval(365.0 * 86_400.0, 6), 2 * 86_400);
    assert_eq!(select_interval(3_600.0, 0), 3_600);
}

#[test]
fn test_short_intervals_align_to_utc() {
    let range = ViewportRange::from_times(utc(2026, 3, 10, 10, 7), utc(2026, 3, 10, 11, 7));
    let instants = tick_instants(&range, 6, Helsinki);

    let expected: Vec<DateTime<Utc>> = (1..=6)
        .map(|i| utc(2026, 3, 10, 10, 0) + chrono::Duration::minutes(10 * i))
        .collect();
    assert_eq!(instants, expected);
    assert!(instants.iter().all(|t| t.timestamp() % 600 == 0));
}

#[test]
fn test_daily_ticks_land_on_local_midnight_across_dst() {
    // EU summer time starts on 2026-03-29; the local day is 23 hours long.
    let range = ViewportRange::from_times(utc(2026, 3, 26, 0, 0), utc(2026, 4, 2, 0, 0));
    let instants = tick_instants(&range, 6, Helsinki);

    assert_eq!(instants.len(), 7);
    for t in &instants {
        let local = t.with_timezone(&Helsinki);
        assert_eq!((local.hour(), local.minute()), (0, 0), "{local}");
    }
    let first = instants[0].with_timezone(&Helsinki);
    assert_eq!(first.format("%Y-%m-%d").to_string(), "2026-03-27");

    let gaps: Vec<i64> = instants
        .windows(2)
        .map(|w| (w[1] - w[0]).num_hours())
        .collect();
    assert_eq!(gaps, vec![24, 24, 23, 24, 24, 24]);

    let labels = ticks(&range, 6, Helsinki);
    assert_eq!(labels[0].label, "27 Mar");
    assert_eq!(labels[6].label, "02 Apr");
}

#[test]
fn test_half_day_ticks_use_local_wall_time() {
    let range = ViewportRange::from_times(utc(2026, 6, 1, 0, 0), utc(2026, 6, 3, 0, 0));
    let instants = tick_instants(&range, 4, Helsinki);

    assert!(!instants.is_empty());
    for t in &instants {
        let local = t.with_timezone(&Helsinki);
        assert!(local.hour() == 0 || local.hour() == 12, "{local}");
        assert_eq!(local.minute(), 0);
    }

    // The same window in UTC lands on UTC wall time instead.
    for t in tick_instants(&range, 4, Tz::UTC) {
        assert!(t.hour() == 0 || t.hour() == 12);
    }
}

#[test]
fn test_degenerate_ranges_have_no_ticks() {
    assert!(tick_instants(&ViewportRange::new(5.0, 5.0), 6, Helsinki).is_empty());
    assert!(tick_instants(&ViewportRange::new(10.0, 5.0), 6, Helsinki).is_empty());
    assert!(tick_instants(&ViewportRange::new(0.0, f64::INFINITY), 6, Helsinki).is_empty());
}

#[test]
fn test_label_format_follows_interval() {
    assert_eq!(determine_date_format(86_400), SmartDateFormat::DayMonth);
    assert_eq!(determine_date_format(600), SmartDateFormat::HourMin);
    assert_eq!(determine_date_format(30), SmartDateFormat::HourMinSec);

    let range = ViewportRange::from_times(utc(2026, 3, 10, 10, 7), utc(2026, 3, 10, 11, 7));
    let labels = ticks(&range, 6, Helsinki);
    // Helsinki is UTC+2 in March before the switch.
    assert_eq!(labels[0].label, "12:10");
}
