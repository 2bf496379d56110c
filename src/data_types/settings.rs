use super::dimension::UnitSettings;
use crate::error::ConfigError;
use eyre::{Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Serializes a `Duration` as whole seconds.
pub mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_secs)
    }
}

/// Foreground/background state of the host application.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppState {
    #[default]
    Foreground,
    Background,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionPolicy {
    pub retention_hours: u32,
    #[serde(with = "duration_secs")]
    pub poll_interval_foreground: Duration,
    #[serde(with = "duration_secs")]
    pub poll_interval_background: Duration,
    /// Implied point count at or above which storage-side decimation is used.
    pub downsample_threshold: usize,
    pub max_decimated_points: usize,
    pub bucket_minutes: u32,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            retention_hours: 240,
            poll_interval_foreground: Duration::from_secs(60),
            poll_interval_background: Duration::from_secs(300),
            downsample_threshold: 1000,
            max_decimated_points: 3000,
            bucket_minutes: 15,
        }
    }
}

impl RetentionPolicy {
    pub fn retention(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.retention_hours))
    }

    pub fn poll_interval(&self, state: AppState) -> Duration {
        match state {
            AppState::Foreground => self.poll_interval_foreground,
            AppState::Background => self.poll_interval_background,
        }
    }
}

/// Everything `configure` needs besides the sensor itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartSettings {
    pub retention: RetentionPolicy,
    pub units: UnitSettings,
    /// Minimum spacing between raw points read from storage.
    #[serde(with = "duration_secs")]
    pub dedupe_interval: Duration,
    /// Expected spacing of stored samples, used to estimate the point count.
    #[serde(with = "duration_secs")]
    pub sample_interval: Duration,
    /// Global "sync per sensor" switch gating the one-shot cloud sync.
    pub cloud_sync_per_sensor: bool,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            retention: RetentionPolicy::default(),
            units: UnitSettings::default(),
            dedupe_interval: Duration::from_secs(2),
            sample_interval: Duration::from_secs(60),
            cloud_sync_per_sensor: false,
        }
    }
}

impl ChartSettings {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings: Self =
            serde_json::from_str(json).wrap_err("failed to parse chart settings")?;
        settings
            .validate()
            .wrap_err("chart settings are invalid")?;
        Ok(settings)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .wrap_err_with(|| format!("failed to read {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let r = &self.retention;
        if r.retention_hours == 0 {
            return Err(ConfigError::ZeroRetention);
        }
        if r.poll_interval_foreground.is_zero() {
            return Err(ConfigError::ZeroPollInterval("foreground"));
        }
        if r.poll_interval_background.is_zero() {
            return Err(ConfigError::ZeroPollInterval("background"));
        }
        if r.bucket_minutes == 0 {
            return Err(ConfigError::ZeroBucket);
        }
        if r.downsample_threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        if r.max_decimated_points < 5 {
            return Err(ConfigError::BudgetTooSmall(r.max_decimated_points));
        }
        if self.sample_interval.is_zero() || self.dedupe_interval.is_zero() {
            return Err(ConfigError::ZeroSampleInterval);
        }
        let u = &self.units;
        for (name, offset) in [
            ("temperature", u.temperature_offset),
            ("humidity", u.humidity_offset),
            ("pressure", u.pressure_offset),
        ] {
            if !offset.is_finite() {
                return Err(ConfigError::InvalidOffset(name));
            }
        }
        Ok(())
    }

    /// Number of points a full retention window is expected to hold.
    pub fn implied_point_count(&self) -> usize {
        let window = u64::from(self.retention.retention_hours) * 3600;
        (window / self.sample_interval.as_secs().max(1)) as usize
    }
}
