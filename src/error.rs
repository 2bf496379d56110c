use thiserror::Error;

/// Failure reading from the storage collaborator. Transient, never fatal.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StorageError {
    #[error("storage read failed: {0}")]
    Read(String),
    #[error("sensor {0} is unknown to storage")]
    UnknownSensor(String),
}

/// Failure of the GATT or cloud sync subsystems.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SyncError {
    #[error("sync transport error: {0}")]
    Transport(String),
    #[error("sync authorization error: {0}")]
    Auth(String),
    #[error("a sync is already running for this sensor")]
    AlreadySyncing,
    #[error("no sync provider is available")]
    Unavailable,
    #[error("sync interrupted")]
    Interrupted,
}

/// Missing or invalid settings. Aborts `configure` before any buffer mutation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("retention must be at least one hour")]
    ZeroRetention,
    #[error("{0} poll interval must be non-zero")]
    ZeroPollInterval(&'static str),
    #[error("bucket width must be at least one minute")]
    ZeroBucket,
    #[error("downsample threshold must be non-zero")]
    ZeroThreshold,
    #[error("sample and dedupe intervals must be non-zero")]
    ZeroSampleInterval,
    #[error("decimation budget {0} is below the minimum of 5 points")]
    BudgetTooSmall(usize),
    #[error("calibration offset for {0} is not finite")]
    InvalidOffset(&'static str),
    #[error("controller has not been configured")]
    NotConfigured,
    #[error("failed to build decimation worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid lifecycle transition from {from:?} on {event:?}")]
pub struct LifecycleError {
    pub from: crate::lifecycle::ChartLifecycle,
    pub event: crate::lifecycle::LifecycleEvent,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    StorageRead(#[from] StorageError),
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    /// Superseded by a newer generation or job. Never surfaced to observers.
    #[error("operation cancelled")]
    Cancelled,
}

impl PipelineError {
    /// The kind reported to observers, `None` for internal cancellations.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::StorageRead(_) => Some(ErrorKind::StorageRead),
            Self::Sync(_) => Some(ErrorKind::Sync),
            Self::Config(_) | Self::Lifecycle(_) => Some(ErrorKind::Config),
            Self::Cancelled => None,
        }
    }
}

/// Error category delivered to `ChartObserver::on_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    StorageRead,
    Sync,
    Config,
}
