use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sensor_chart::data_types::{
    absolute_humidity, ChartPoint, DimensionTag, HumidityUnit, Measurement, SensorId,
    TemperatureUnit, UnitSettings,
};
use sensor_chart::decimation::{
    decimate, decimate_cancellable, decimate_points, decimate_with, Bucketing,
};
use std::sync::atomic::AtomicBool;

fn ts(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

fn temperature_series(values: &[f64]) -> Vec<Measurement> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            Measurement::new(SensorId::from("s"), ts(i as i64)).with(DimensionTag::Temperature, *v)
        })
        .collect()
}

fn points(values: &[(f64, f64)]) -> Vec<ChartPoint> {
    values.iter().map(|(x, y)| ChartPoint::new(*x, *y)).collect()
}

fn celsius() -> sensor_chart::data_types::Projection {
    DimensionTag::Temperature.projection(&UnitSettings::default())
}

#[test]
fn test_lttb_sine_wave() {
    let count = 100;
    let values: Vec<f64> = (0..count).map(|i| (i as f64 * 0.1).sin()).collect();

    let max_points = 10;
    let decimated = decimate(&temperature_series(&values), &celsius(), max_points);

    assert_eq!(decimated.len(), max_points);
    assert_eq!(decimated[0].x, 0.0);
    assert_eq!(decimated[max_points - 1].x, (count - 1) as f64);

    // Check monotony of X
    let mut last_x = -1.0;
    for p in &decimated {
        assert!(p.x > last_x);
        last_x = p.x;
    }
}

#[test]
fn test_lttb_small_data() {
    let data = temperature_series(&[0.0, 1.0, 2.0, 3.0, 4.0]);
    let decimated = decimate(&data, &celsius(), 10);
    assert_eq!(decimated.len(), 5);
    for (i, p) in decimated.iter().enumerate() {
        assert_eq!(p.x, i as f64);
        assert_eq!(p.y, i as f64);
        assert!(!p.singleton);
    }
}

#[test]
fn test_lttb_preserves_peak() {
    // 0, 0, 100, 0, 0 with 3 points keeps (0,0), (2,100), (4,0)
    let data = points(&[(0.0, 0.0), (1.0, 0.0), (2.0, 100.0), (3.0, 0.0), (4.0, 0.0)]);
    let decimated = decimate_points(&data, 3, Bucketing::EqualCount);

    assert_eq!(decimated.len(), 3);
    assert_eq!((decimated[0].x, decimated[0].y), (0.0, 0.0));
    assert_eq!((decimated[1].x, decimated[1].y), (2.0, 100.0));
    assert_eq!((decimated[2].x, decimated[2].y), (4.0, 0.0));
}

#[test]
fn test_budget_four_keeps_single_interior_point() {
    let data = points(&[(0.0, 1.0), (1.0, 2.0), (2.0, 3.0), (3.0, 4.0), (4.0, 5.0)]);
    let decimated = decimate_points(&data, 4, Bucketing::EqualCount);

    let xs: Vec<f64> = decimated.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![0.0, 1.0, 2.0, 4.0]);
    assert!(decimated[2].singleton, "lone interior point is drawn as a marker");
    assert!(!decimated[0].singleton);
}

#[test]
fn test_tiny_budgets() {
    let data = points(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0), (3.0, 1.0), (4.0, 0.0), (5.0, 1.0)]);
    assert!(decimate_points(&data, 0, Bucketing::EqualCount).is_empty());

    let one = decimate_points(&data, 1, Bucketing::EqualCount);
    assert_eq!(one.len(), 1);
    assert_eq!(one[0].x, 5.0);

    let two = decimate_points(&data, 2, Bucketing::EqualCount);
    let xs: Vec<f64> = two.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![0.0, 5.0]);
}

#[test]
fn test_identity_when_under_budget() {
    let data: Vec<ChartPoint> = (0..50).map(|i| ChartPoint::new(i as f64, (i * i) as f64)).collect();
    assert_eq!(decimate_points(&data, 50, Bucketing::EqualCount), data);
    assert_eq!(decimate_points(&data, 51, Bucketing::EqualSpan), data);
}

#[test]
fn test_bound_and_endpoint_laws_hold_for_random_input() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..200 {
        let n = rng.random_range(0..1500);
        let budget = rng.random_range(0..200);
        let mut x = 0.0;
        let data: Vec<ChartPoint> = (0..n)
            .map(|_| {
                x += rng.random_range(0.5..120.0);
                ChartPoint::new(x, rng.random_range(-40.0..60.0))
            })
            .collect();

        for mode in [Bucketing::EqualCount, Bucketing::EqualSpan] {
            let out = decimate_points(&data, budget, mode);
            if n <= budget {
                assert_eq!(out, data);
                continue;
            }
            assert!(out.len() <= budget, "n={n} budget={budget}");
            for w in out.windows(2) {
                assert!(w[0].x < w[1].x, "output must stay time ordered");
            }
            if budget >= 5 {
                assert_eq!(out[0], data[0]);
                assert_eq!(out[1], data[1]);
                assert_eq!(out[out.len() - 2], data[n - 2]);
                assert_eq!(out[out.len() - 1], data[n - 1]);
            }
        }
    }
}

#[test]
fn test_every_output_point_comes_from_the_input() {
    let mut rng = StdRng::seed_from_u64(42);
    let data: Vec<ChartPoint> = (0..5000)
        .map(|i| ChartPoint::new(i as f64 * 60.0, rng.random_range(0.0..1.0)))
        .collect();
    let out = decimate_points(&data, 300, Bucketing::EqualCount);
    assert_eq!(out.len(), 300);
    for p in &out {
        let idx = (p.x / 60.0) as usize;
        assert_eq!(data[idx], *p);
    }
}

#[test]
fn test_equal_span_skips_empty_buckets() {
    // Two dense clusters separated by a long gap: middle buckets are empty.
    let mut data = Vec::new();
    for i in 0..20 {
        data.push(ChartPoint::new(i as f64, (i % 3) as f64));
    }
    for i in 0..20 {
        data.push(ChartPoint::new(10_000.0 + i as f64, (i % 5) as f64));
    }

    let out = decimate_points(&data, 12, Bucketing::EqualSpan);
    assert!(out.len() < 12, "empty buckets contribute nothing");
    assert!(out.len() >= 6);
    assert_eq!(out[0], data[0]);
    assert_eq!(*out.last().unwrap(), *data.last().unwrap());
    for p in &out {
        assert!(data.contains(p));
    }

    // Equal-count buckets are never empty, so the budget is filled.
    let filled = decimate_points(&data, 12, Bucketing::EqualCount);
    assert_eq!(filled.len(), 12);
}

#[test]
fn test_missing_values_are_skipped_before_decimation() {
    let mut data = temperature_series(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    data[2].fields.insert(DimensionTag::Temperature, None);
    data[3].fields.insert(DimensionTag::Temperature, Some(f64::NAN));

    let out = decimate(&data, &celsius(), 100);
    let xs: Vec<f64> = out.iter().map(|p| p.x).collect();
    assert_eq!(xs, vec![0.0, 1.0, 4.0, 5.0]);
}

#[test]
fn test_converted_values_are_emitted_in_display_units() {
    let data = temperature_series(&[0.0, 10.0, 100.0]);
    let units = UnitSettings {
        temperature: TemperatureUnit::Fahrenheit,
        temperature_offset: -1.0,
        ..UnitSettings::default()
    };
    let out = decimate(&data, &DimensionTag::Temperature.projection(&units), 10);
    let expected = [30.2, 48.2, 210.2];
    assert_eq!(out.len(), expected.len());
    for (p, want) in out.iter().zip(expected) {
        assert!((p.y - want).abs() < 1e-9, "{} != {}", p.y, want);
    }
}

#[test]
fn test_unit_conversion_drives_selection() {
    // (temperature °C, relative humidity %) per sample. The reserved points
    // share one value so only the vertical deviation of the interior matters.
    let samples = [
        (10.0, 50.0),
        (10.0, 50.0),
        (0.0, 80.0),  // largest deviation in %RH
        (30.0, 50.0), // largest deviation in g/m³
        (10.0, 60.0),
        (10.0, 50.0),
        (10.0, 50.0),
    ];
    let data: Vec<Measurement> = samples
        .iter()
        .enumerate()
        .map(|(i, (t, rh))| {
            Measurement::new(SensorId::from("s"), ts(i as i64))
                .with(DimensionTag::Temperature, *t)
                .with(DimensionTag::Humidity, *rh)
        })
        .collect();

    let relative = DimensionTag::Humidity.projection(&UnitSettings::default());
    let out = decimate_with(&data, &relative, 5, Bucketing::EqualCount);
    assert_eq!(out.len(), 5);
    assert_eq!(out[2].x, 2.0);
    assert_eq!(out[2].y, 80.0);

    let absolute = DimensionTag::Humidity.projection(&UnitSettings {
        humidity: HumidityUnit::Absolute,
        ..UnitSettings::default()
    });
    let out = decimate_with(&data, &absolute, 5, Bucketing::EqualCount);
    assert_eq!(out.len(), 5);
    assert_eq!(out[2].x, 3.0);
    assert!((out[2].y - absolute_humidity(30.0, 50.0)).abs() < 1e-9);
}

#[test]
fn test_cancelled_decimation_returns_nothing() {
    let values: Vec<f64> = (0..5_000).map(|i| (i as f64 * 0.01).sin()).collect();
    let data = temperature_series(&values);

    let running = AtomicBool::new(false);
    let full = decimate_cancellable(&data, &celsius(), 100, Bucketing::EqualCount, &running);
    assert_eq!(
        full,
        Some(decimate_with(&data, &celsius(), 100, Bucketing::EqualCount))
    );

    let cancelled = AtomicBool::new(true);
    assert_eq!(
        decimate_cancellable(&data, &celsius(), 100, Bucketing::EqualCount, &cancelled),
        None
    );
}
