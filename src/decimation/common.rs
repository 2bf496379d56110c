use crate::data_types::{ChartPoint, Measurement, Projection};

/// Projects raw samples into display units, dropping those without a value.
pub fn project(points: &[Measurement], projection: &Projection) -> Vec<ChartPoint> {
    points
        .iter()
        .filter_map(|m| projection.value(m).map(|y| ChartPoint::new(m.x(), y)))
        .collect()
}

/// Arithmetic mean (x̄, ȳ) of a chunk, `None` when empty.
pub fn mean_xy(chunk: &[ChartPoint]) -> Option<(f64, f64)> {
    if chunk.is_empty() {
        return None;
    }
    let len = chunk.len() as f64;
    let (sum_x, sum_y) = chunk
        .iter()
        .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some((sum_x / len, sum_y / len))
}

/// Index of the point in `chunk` forming the largest triangle with `a` and `c`.
/// Ties keep the earliest point.
pub fn find_max_area_index(chunk: &[ChartPoint], a: (f64, f64), c: (f64, f64)) -> usize {
    let c1 = a.1 - c.1;
    let c2 = c.0 - a.0;
    let c3 = a.0 * c.1 - c.0 * a.1;

    let mut max_area = -1.0;
    let mut best_idx = 0;
    for (i, p) in chunk.iter().enumerate() {
        let area = (p.x * c1 + p.y * c2 + c3).abs();
        if area > max_area {
            max_area = area;
            best_idx = i;
        }
    }
    best_idx
}
