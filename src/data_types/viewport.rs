use super::measurement::{timestamp_to_x, x_to_timestamp};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Visible time window of a chart, in unix seconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewportRange {
    pub min: f64,
    pub max: f64,
    pub min_limit: Option<f64>,
    pub max_limit: Option<f64>,
}

impl ViewportRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            ..Default::default()
        }
    }

    pub fn from_times(min: DateTime<Utc>, max: DateTime<Utc>) -> Self {
        Self::new(timestamp_to_x(min), timestamp_to_x(max))
    }

    pub fn with_limits(mut self, min_limit: Option<f64>, max_limit: Option<f64>) -> Self {
        self.min_limit = min_limit;
        self.max_limit = max_limit;
        self
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }

    pub fn min_time(&self) -> Option<DateTime<Utc>> {
        x_to_timestamp(self.min)
    }

    pub fn max_time(&self) -> Option<DateTime<Utc>> {
        x_to_timestamp(self.max)
    }

    pub fn contains(&self, x: f64) -> bool {
        x >= self.min && x <= self.max
    }

    /// Query range tolerating gesture momentum: `slack` on each side, twice.
    pub fn expanded(&self, slack: f64) -> Self {
        Self::new(self.min - 2.0 * slack, self.max + 2.0 * slack)
    }

    /// Pure zoom without constraints to preserve the pivot point.
    pub fn zoom_at(&mut self, pivot_data: f64, pivot_pct: f64, factor: f64) {
        let new_span = self.span() * factor;
        self.min = pivot_data - new_span * pivot_pct;
        self.max = self.min + new_span;
    }

    pub fn pan(&mut self, delta: f64) {
        self.min += delta;
        self.max += delta;
    }

    /// Shifts the window back inside its limits without changing its span.
    /// A window wider than the limits is moved so it covers them.
    pub fn clamp(&mut self) {
        let lo = self.min_limit.unwrap_or(f64::NEG_INFINITY);
        let hi = self.max_limit.unwrap_or(f64::INFINITY);
        let shift = if self.span() <= hi - lo {
            (lo - self.min).max(0.0) + (hi - self.max).min(0.0)
        } else {
            (lo - self.min).min(0.0) + (hi - self.max).max(0.0)
        };
        if shift != 0.0 {
            self.pan(shift);
        }
    }
}
