use super::StorageProvider;
use crate::buffer::TimeSeriesBuffer;
use crate::data_types::{DimensionTag, Measurement, SensorId};
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// In-process storage holding every sample in memory.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    sensors: RwLock<HashMap<SensorId, TimeSeriesBuffer>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, measurement: Measurement) {
        self.insert_many(std::iter::once(measurement));
    }

    pub fn insert_many(&self, batch: impl IntoIterator<Item = Measurement>) {
        let mut sensors = self.sensors.write();
        for m in batch {
            sensors
                .entry(m.sensor_id.clone())
                .or_insert_with(|| TimeSeriesBuffer::new(m.sensor_id.clone()))
                .append(std::iter::once(m));
        }
    }

    /// Removes all history of `sensor`.
    pub fn delete(&self, sensor: &SensorId) {
        self.sensors.write().remove(sensor);
    }

    pub fn len(&self, sensor: &SensorId) -> usize {
        self.sensors.read().get(sensor).map_or(0, TimeSeriesBuffer::len)
    }

    fn newer_than(&self, sensor: &SensorId, after: DateTime<Utc>) -> Vec<Measurement> {
        let sensors = self.sensors.read();
        let Some(buffer) = sensors.get(sensor) else {
            return Vec::new();
        };
        let points = buffer.as_slice();
        let start = points.partition_point(|m| m.timestamp <= after);
        points[start..].to_vec()
    }
}

#[async_trait]
impl StorageProvider for MemoryStorage {
    async fn read_latest(&self, sensor: &SensorId) -> Result<Option<Measurement>, StorageError> {
        Ok(self
            .sensors
            .read()
            .get(sensor)
            .and_then(|b| b.latest().cloned()))
    }

    async fn read(
        &self,
        sensor: &SensorId,
        after: DateTime<Utc>,
        min_interval: Duration,
    ) -> Result<Vec<Measurement>, StorageError> {
        let min_interval = chrono::Duration::from_std(min_interval)
            .map_err(|e| StorageError::Read(e.to_string()))?;
        let mut last_kept: Option<DateTime<Utc>> = None;
        Ok(self
            .newer_than(sensor, after)
            .into_iter()
            .filter(|m| match last_kept {
                Some(prev) if m.timestamp - prev < min_interval => false,
                _ => {
                    last_kept = Some(m.timestamp);
                    true
                }
            })
            .collect())
    }

    async fn read_downsampled(
        &self,
        sensor: &SensorId,
        after: DateTime<Utc>,
        bucket_minutes: u32,
        pick: u32,
    ) -> Result<Vec<Measurement>, StorageError> {
        let bucket_secs = i64::from(bucket_minutes.max(1)) * 60;
        let raw = self.newer_than(sensor, after);

        let mut aggregated = Vec::new();
        let mut start = 0;
        while start < raw.len() {
            let bucket = raw[start].timestamp.timestamp().div_euclid(bucket_secs);
            let end = start
                + raw[start..]
                    .iter()
                    .take_while(|m| m.timestamp.timestamp().div_euclid(bucket_secs) == bucket)
                    .count();
            if let Some(m) = aggregate_chunk(&raw[start..end]) {
                aggregated.push(m);
            }
            start = end;
        }

        let pick = pick as usize;
        if pick == 0 || aggregated.len() <= pick {
            return Ok(aggregated);
        }
        // Stride pick keeps the oldest and the newest bucket.
        let last = aggregated.len() - 1;
        let steps = (pick - 1).max(1);
        Ok((0..pick)
            .map(|i| aggregated[i * last / steps].clone())
            .collect())
    }

    async fn read_last(
        &self,
        sensor: &SensorId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, StorageError> {
        Ok(self.newer_than(sensor, since))
    }
}

/// Averages every field over a bucket; the timestamp is the bucket's first.
pub fn aggregate_chunk(chunk: &[Measurement]) -> Option<Measurement> {
    let first = chunk.first()?;
    let mut sums: BTreeMap<DimensionTag, (f64, usize)> = BTreeMap::new();
    for m in chunk {
        for (tag, value) in &m.fields {
            if let Some(v) = value {
                let entry = sums.entry(*tag).or_insert((0.0, 0));
                entry.0 += v;
                entry.1 += 1;
            }
        }
    }

    let mut out = Measurement::new(first.sensor_id.clone(), first.timestamp);
    for (tag, (sum, count)) in sums {
        out.fields.insert(tag, Some(sum / count as f64));
    }
    Some(out)
}
