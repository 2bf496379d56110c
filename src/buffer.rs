//! In-memory history retained for one sensor's chart.
//!
//! Points are kept strictly ascending by timestamp with no duplicate
//! timestamps. Every mutation preserves that invariant, so range queries can
//! binary-search.

use crate::data_types::{DimensionTag, Measurement, SensorId, ViewportRange};
use chrono::{DateTime, Utc};
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq)]
pub struct TimeSeriesBuffer {
    sensor: SensorId,
    points: Vec<Measurement>,
}

impl TimeSeriesBuffer {
    pub fn new(sensor: SensorId) -> Self {
        Self {
            sensor,
            points: Vec::new(),
        }
    }

    /// Builds a buffer from arbitrary input, sorting and dropping duplicates.
    pub fn from_measurements(sensor: SensorId, points: Vec<Measurement>) -> Self {
        let mut buffer = Self::new(sensor);
        buffer.replace(points);
        buffer
    }

    pub fn sensor(&self) -> &SensorId {
        &self.sensor
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn as_slice(&self) -> &[Measurement] {
        &self.points
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.first().map(|m| m.timestamp)
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.points.last().map(|m| m.timestamp)
    }

    pub fn latest(&self) -> Option<&Measurement> {
        self.points.last()
    }

    /// Covered time range, `None` when empty.
    pub fn covered_range(&self) -> Option<ViewportRange> {
        match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => Some(ViewportRange::new(first.x(), last.x())),
            _ => None,
        }
    }

    /// Replaces the whole content. Foreign-sensor samples are ignored.
    pub fn replace(&mut self, mut points: Vec<Measurement>) {
        points.retain(|m| m.sensor_id == self.sensor);
        // Stable sort keeps the first of equal timestamps for dedup.
        points.sort_by_key(|m| m.timestamp);
        points.dedup_by_key(|m| m.timestamp);
        self.points = points;
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }

    /// Merges `batch` and returns the samples that were actually new, in
    /// ascending order. Already-known timestamps are left untouched.
    pub fn append(&mut self, batch: impl IntoIterator<Item = Measurement>) -> Vec<Measurement> {
        let mut inserted: Vec<Measurement> = Vec::new();
        for m in batch {
            if m.sensor_id != self.sensor {
                continue;
            }
            match self.points.last() {
                Some(last) if m.timestamp <= last.timestamp => {
                    if let Err(idx) = self
                        .points
                        .binary_search_by_key(&m.timestamp, |p| p.timestamp)
                    {
                        self.points.insert(idx, m.clone());
                        inserted.push(m);
                    }
                }
                _ => {
                    self.points.push(m.clone());
                    inserted.push(m);
                }
            }
        }
        inserted.sort_by_key(|m| m.timestamp);
        inserted
    }

    /// Drops every sample strictly older than `horizon`. Returns how many went.
    pub fn prune_before(&mut self, horizon: DateTime<Utc>) -> usize {
        let cut = self.points.partition_point(|m| m.timestamp < horizon);
        self.points.drain(..cut);
        cut
    }

    /// Applies the retention window `now - retention`.
    pub fn prune(&mut self, now: DateTime<Utc>, retention: chrono::Duration) -> usize {
        self.prune_before(now - retention)
    }

    /// Samples whose timestamp lies in `[range.min, range.max]`.
    pub fn range(&self, range: &ViewportRange) -> &[Measurement] {
        let start = self.points.partition_point(|m| m.x() < range.min);
        let end = self.points.partition_point(|m| m.x() <= range.max);
        if start >= end {
            return &[];
        }
        &self.points[start..end]
    }

    /// Dimensions present in at least one sample, in declaration order.
    pub fn available_dimensions(&self) -> Vec<DimensionTag> {
        DimensionTag::ALL
            .into_iter()
            .filter(|tag| self.points.iter().any(|m| m.has(*tag)))
            .collect()
    }
}

/// Read-only access to immutable buffer snapshots.
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> Arc<TimeSeriesBuffer>;

    /// Samples within `range`, copied out of the current snapshot.
    fn measurements_in(&self, range: &ViewportRange) -> Vec<Measurement> {
        self.snapshot().range(range).to_vec()
    }
}

impl SnapshotSource for Arc<TimeSeriesBuffer> {
    fn snapshot(&self) -> Arc<TimeSeriesBuffer> {
        Arc::clone(self)
    }
}
