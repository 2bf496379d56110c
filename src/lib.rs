//! sensor_chart crate: live time-series charting pipeline for environmental sensors

pub mod axis_ticks;
pub mod buffer;
pub mod clock;
pub mod controller;
pub mod data_types;
pub mod decimation;
pub mod error;
pub mod lifecycle;
pub mod storage;
pub mod subscription;
pub mod sync;
pub mod utils;
pub mod view_controller;
pub mod viewport_coordinator;

pub use buffer::{SnapshotSource, TimeSeriesBuffer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use controller::{BufferView, Collaborators, TimeSeriesController};
pub use data_types::{
    ChartDataset, ChartPoint, ChartSettings, DimensionTag, Measurement, Sensor, SensorId,
    ViewportRange,
};
pub use error::{ErrorKind, PipelineError};
pub use lifecycle::ChartLifecycle;
pub use storage::{FetchMode, MemoryStorage, StorageProvider};
pub use subscription::{ChartObserver, SubscriptionId};
pub use sync::{CloudSync, GattSync, SyncProgress, SyncState};
pub use viewport_coordinator::{CoordinatorConfig, DatasetListener, ViewportCoordinator};
