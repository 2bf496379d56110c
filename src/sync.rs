//! Bulk-history sync collaborators and the GATT sync sub-state.

use crate::data_types::SensorId;
use crate::error::SyncError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Progress reported while a GATT transfer runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncProgress {
    Connecting,
    Reading { points: usize },
    Disconnecting,
}

pub type ProgressFn = Arc<dyn Fn(SyncProgress) + Send + Sync>;

/// Bluetooth bulk-history download.
#[async_trait]
pub trait GattSync: Send + Sync {
    fn is_syncing(&self, sensor: &SensorId) -> bool;

    /// Downloads history logged since `from` and persists it.
    async fn sync_logs(
        &self,
        sensor: &SensorId,
        from: DateTime<Utc>,
        progress: ProgressFn,
    ) -> Result<(), SyncError>;

    /// Asks a running transfer to stop. Returns whether one was running.
    fn stop(&self, sensor: &SensorId) -> bool;
}

/// Cloud history sync.
#[async_trait]
pub trait CloudSync: Send + Sync {
    async fn sync(&self, sensor: &SensorId) -> Result<(), SyncError>;
}

/// Orthogonal GATT sync state of a chart.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SyncState {
    #[default]
    NotSyncing,
    Syncing,
    Completed,
    Interrupted,
    Failed,
}

impl SyncState {
    pub fn is_active(self) -> bool {
        self == Self::Syncing
    }
}
