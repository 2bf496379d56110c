use serde::{Deserialize, Serialize};
use std::ops::Range;

/// How the interior of a decimation run is split into buckets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bucketing {
    /// Bucket sizes differ by at most one point. Never empty.
    #[default]
    EqualCount,
    /// Buckets cover equal time spans. Sparse stretches yield empty buckets.
    EqualSpan,
}

/// Splits `n` points into `bucket_count` contiguous ranges.
/// Generic over how we retrieve the x-value for a given index.
pub fn calculate_buckets_generic<F>(
    n: usize,
    get_x_at: F,
    bucket_count: usize,
    mode: Bucketing,
) -> Vec<Range<usize>>
where
    F: Fn(usize) -> f64,
{
    if n == 0 || bucket_count == 0 {
        return Vec::new();
    }
    match mode {
        Bucketing::EqualCount => equal_count_buckets(n, bucket_count),
        Bucketing::EqualSpan => {
            let first = get_x_at(0);
            let width = (get_x_at(n - 1) - first) / bucket_count as f64;
            if !(width.is_finite() && width > 0.0) {
                return equal_count_buckets(n, bucket_count);
            }

            let mut buckets = Vec::with_capacity(bucket_count);
            let mut start = 0;
            for i in 0..bucket_count {
                let end = if i + 1 == bucket_count {
                    n
                } else {
                    let boundary = first + width * (i + 1) as f64;
                    lower_bound(start, n, &get_x_at, boundary)
                };
                buckets.push(start..end);
                start = end;
            }
            buckets
        }
    }
}

/// Bucket `i` covers `[i*n/k, (i+1)*n/k)`.
pub fn equal_count_buckets(n: usize, bucket_count: usize) -> Vec<Range<usize>> {
    if bucket_count == 0 {
        return Vec::new();
    }
    (0..bucket_count)
        .map(|i| (i * n / bucket_count)..((i + 1) * n / bucket_count))
        .collect()
}

/// First index in `[lo, hi)` whose x is not below `value`.
fn lower_bound<F>(lo: usize, hi: usize, get_x_at: &F, value: f64) -> usize
where
    F: Fn(usize) -> f64,
{
    let mut left = lo;
    let mut right = hi;
    while left < right {
        let mid = left + (right - left) / 2;
        if get_x_at(mid) < value {
            left = mid + 1;
        } else {
            right = mid;
        }
    }
    left
}
