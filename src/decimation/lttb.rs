use super::bucketing::{calculate_buckets_generic, Bucketing};
use super::common::{find_max_area_index, mean_xy, project};
use crate::data_types::{ChartPoint, Measurement, Projection};
use rayon::prelude::*;
use std::sync::atomic::{AtomicBool, Ordering};

/// Smallest budget that leaves room for one interior bucket.
pub const MIN_BUCKETED_BUDGET: usize = 5;

/// Decimates `points` for `projection` down to at most `budget` points.
pub fn decimate(points: &[Measurement], projection: &Projection, budget: usize) -> Vec<ChartPoint> {
    decimate_with(points, projection, budget, Bucketing::EqualCount)
}

pub fn decimate_with(
    points: &[Measurement],
    projection: &Projection,
    budget: usize,
    bucketing: Bucketing,
) -> Vec<ChartPoint> {
    // Unit conversion happens first so areas reflect the displayed values.
    let projected = project(points, projection);
    decimate_points(&projected, budget, bucketing)
}

/// Same as [`decimate_with`], but gives up between buckets once `cancel` is
/// set. Returns `None` when cancelled.
pub fn decimate_cancellable(
    points: &[Measurement],
    projection: &Projection,
    budget: usize,
    bucketing: Bucketing,
    cancel: &AtomicBool,
) -> Option<Vec<ChartPoint>> {
    let projected = project(points, projection);
    if cancel.load(Ordering::Relaxed) {
        return None;
    }
    largest_triangle(&projected, budget, bucketing, Some(cancel))
}

/// Largest-triangle bucketing over already projected points.
///
/// The first two and last two points are kept verbatim; the interior is split
/// into `budget - 4` buckets and each bucket contributes the point spanning the
/// largest triangle with the previously selected point and the mean of the
/// next non-empty bucket (the reserved tail for the last one).
pub fn decimate_points(data: &[ChartPoint], budget: usize, bucketing: Bucketing) -> Vec<ChartPoint> {
    largest_triangle(data, budget, bucketing, None).unwrap_or_default()
}

fn largest_triangle(
    data: &[ChartPoint],
    budget: usize,
    bucketing: Bucketing,
    cancel: Option<&AtomicBool>,
) -> Option<Vec<ChartPoint>> {
    let cancelled = || cancel.is_some_and(|flag| flag.load(Ordering::Relaxed));
    let n = data.len();
    if n <= budget {
        return Some(data.to_vec());
    }
    if budget < MIN_BUCKETED_BUDGET {
        return Some(decimate_small_budget(data, budget));
    }

    let interior = &data[2..n - 2];
    let bucket_count = budget - 4;
    let buckets = calculate_buckets_generic(
        interior.len(),
        |i| interior[i].x,
        bucket_count,
        bucketing,
    );

    let means: Vec<Option<(f64, f64)>> = buckets
        .par_iter()
        .map(|range| mean_xy(&interior[range.clone()]))
        .collect();
    if cancelled() {
        return None;
    }

    let tail = &data[n - 2..];
    let tail_mean = mean_xy(tail).unwrap_or((tail[1].x, tail[1].y));

    // Mean of the next non-empty bucket, scanning from the right.
    let mut next_mean = vec![tail_mean; buckets.len()];
    let mut carry = tail_mean;
    for i in (0..buckets.len()).rev() {
        next_mean[i] = carry;
        if let Some(m) = means[i] {
            carry = m;
        }
    }

    let mut output = Vec::with_capacity(budget);
    output.extend_from_slice(&data[..2]);

    let mut prev = data[1];
    for (i, range) in buckets.iter().enumerate() {
        if range.is_empty() {
            continue;
        }
        if cancelled() {
            return None;
        }
        let chunk = &interior[range.clone()];
        let idx = find_max_area_index(chunk, (prev.x, prev.y), next_mean[i]);
        prev = chunk[idx];
        output.push(prev);
    }

    output.extend_from_slice(tail);
    Some(output)
}

// Removal order when the budget cannot hold the reserved points.
const DROP_TAIL_INNER: u8 = 0;
const DROP_SECOND: u8 = 1;
const DROP_SELECTED: u8 = 2;
const DROP_FIRST: u8 = 3;
const DROP_LAST: u8 = 4;

/// Budgets below five: `[first, second, selected, second-to-last, last]`
/// trimmed by dropping second-to-last, second, selected, then first.
fn decimate_small_budget(data: &[ChartPoint], budget: usize) -> Vec<ChartPoint> {
    let n = data.len();
    if budget == 0 || n == 0 {
        return Vec::new();
    }
    if n == 1 {
        return data.to_vec();
    }

    let mut slots: Vec<(u8, ChartPoint)> = Vec::with_capacity(5);
    slots.push((DROP_FIRST, data[0]));
    if n >= 3 {
        slots.push((DROP_SECOND, data[1]));
    }
    if n >= 5 {
        let interior = &data[2..n - 2];
        let selected = if interior.len() == 1 {
            ChartPoint {
                singleton: true,
                ..interior[0]
            }
        } else {
            let tail_mean = mean_xy(&data[n - 2..]).unwrap_or((data[n - 1].x, data[n - 1].y));
            interior[find_max_area_index(interior, (data[1].x, data[1].y), tail_mean)]
        };
        slots.push((DROP_SELECTED, selected));
    }
    if n >= 4 {
        slots.push((DROP_TAIL_INNER, data[n - 2]));
    }
    slots.push((DROP_LAST, data[n - 1]));

    while slots.len() > budget {
        let Some(pos) = slots
            .iter()
            .enumerate()
            .min_by_key(|(_, (rank, _))| *rank)
            .map(|(pos, _)| pos)
        else {
            break;
        };
        slots.remove(pos);
    }

    slots.into_iter().map(|(_, p)| p).collect()
}
