//! Read side of the persistence collaborator and the fetch policy.

pub mod memory;

pub use memory::MemoryStorage;

use crate::data_types::{ChartSettings, Measurement, RetentionPolicy, SensorId};
use crate::error::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Point reads served by the host's database. Calls may complete out of
/// issuance order.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn read_latest(&self, sensor: &SensorId) -> Result<Option<Measurement>, StorageError>;

    /// Raw samples newer than `after`, at least `min_interval` apart.
    async fn read(
        &self,
        sensor: &SensorId,
        after: DateTime<Utc>,
        min_interval: Duration,
    ) -> Result<Vec<Measurement>, StorageError>;

    /// Storage-side decimated samples: `bucket_minutes` buckets, at most `pick` points.
    async fn read_downsampled(
        &self,
        sensor: &SensorId,
        after: DateTime<Utc>,
        bucket_minutes: u32,
        pick: u32,
    ) -> Result<Vec<Measurement>, StorageError>;

    /// Every sample strictly newer than `since`.
    async fn read_last(
        &self,
        sensor: &SensorId,
        since: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, StorageError>;
}

/// Strategy used whenever the full retention range is (re)loaded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    Raw { min_interval: Duration },
    Downsampled { bucket_minutes: u32, pick: u32 },
}

impl FetchMode {
    /// Raw below the threshold, storage-side decimation at or above it.
    pub fn select(point_count: usize, policy: &RetentionPolicy, dedupe_interval: Duration) -> Self {
        if point_count < policy.downsample_threshold {
            Self::Raw {
                min_interval: dedupe_interval,
            }
        } else {
            Self::Downsampled {
                bucket_minutes: policy.bucket_minutes,
                pick: u32::try_from(policy.max_decimated_points).unwrap_or(u32::MAX),
            }
        }
    }

    pub fn for_settings(settings: &ChartSettings) -> Self {
        Self::select(
            settings.implied_point_count(),
            &settings.retention,
            settings.dedupe_interval,
        )
    }

    pub fn is_raw(&self) -> bool {
        matches!(self, Self::Raw { .. })
    }

    pub(crate) async fn fetch(
        self,
        storage: &dyn StorageProvider,
        sensor: &SensorId,
        after: DateTime<Utc>,
    ) -> Result<Vec<Measurement>, StorageError> {
        match self {
            Self::Raw { min_interval } => storage.read(sensor, after, min_interval).await,
            Self::Downsampled {
                bucket_minutes,
                pick,
            } => {
                storage
                    .read_downsampled(sensor, after, bucket_minutes, pick)
                    .await
            }
        }
    }
}
