use crate::error::LifecycleError;

/// Lifecycle of a chart:
/// `Idle -> Configuring -> Live <-> Paused -> Reconfiguring -> Idle`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ChartLifecycle {
    #[default]
    Idle,
    Configuring,
    Live,
    Paused,
    Reconfiguring,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    Configure,
    Loaded,
    Pause,
    Resume,
    Reconfigure,
    Reset,
    Teardown,
}

impl ChartLifecycle {
    pub fn next(self, event: LifecycleEvent) -> Result<Self, LifecycleError> {
        use ChartLifecycle::*;
        use LifecycleEvent::*;
        let next = match (self, event) {
            (Idle, Configure) => Configuring,
            (Configuring, Loaded) => Live,
            (Live, Pause) => Paused,
            (Paused, Resume) => Live,
            (Configuring | Live | Paused, Reconfigure) => Reconfiguring,
            (Reconfiguring, Reset) => Idle,
            (_, Teardown) => Idle,
            (from, event) => return Err(LifecycleError { from, event }),
        };
        Ok(next)
    }

    /// Whether the poll clock may run in this state.
    pub fn is_polling(self) -> bool {
        self == Self::Live
    }

    pub fn is_configured(self) -> bool {
        matches!(self, Self::Configuring | Self::Live | Self::Paused)
    }
}
