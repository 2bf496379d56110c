use super::dimension::DimensionTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identifier of a sensor (typically its MAC address).
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SensorId(pub String);

impl SensorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SensorId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// The sensor a chart is configured for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    pub name: String,
    /// Whether the sensor is claimed in the cloud and can be synced from there.
    pub is_cloud: bool,
}

impl Sensor {
    pub fn new(id: impl Into<String>) -> Self {
        let id = SensorId::new(id);
        Self {
            name: id.0.clone(),
            id,
            is_cloud: false,
        }
    }

    pub fn with_cloud(mut self, is_cloud: bool) -> Self {
        self.is_cloud = is_cloud;
        self
    }
}

/// One timestamped sample. Any dimension may be missing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    pub sensor_id: SensorId,
    pub timestamp: DateTime<Utc>,
    pub fields: BTreeMap<DimensionTag, Option<f64>>,
}

impl Measurement {
    pub fn new(sensor_id: SensorId, timestamp: DateTime<Utc>) -> Self {
        Self {
            sensor_id,
            timestamp,
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, tag: DimensionTag, value: f64) -> Self {
        self.fields.insert(tag, Some(value));
        self
    }

    pub fn value(&self, tag: DimensionTag) -> Option<f64> {
        self.fields.get(&tag).copied().flatten()
    }

    pub fn has(&self, tag: DimensionTag) -> bool {
        self.value(tag).is_some()
    }

    /// Timestamp as fractional unix seconds, the x coordinate of chart points.
    pub fn x(&self) -> f64 {
        timestamp_to_x(self.timestamp)
    }
}

pub fn timestamp_to_x(ts: DateTime<Utc>) -> f64 {
    ts.timestamp_millis() as f64 / 1000.0
}

pub fn x_to_timestamp(x: f64) -> Option<DateTime<Utc>> {
    if !x.is_finite() {
        return None;
    }
    DateTime::from_timestamp_millis((x * 1000.0).round() as i64)
}
