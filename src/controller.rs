//! Controller
//!
//! `TimeSeriesController` is the single owner of a chart's live buffer. All
//! buffer mutation happens under its state lock, and only after checking the
//! generation the work was issued under: every `configure` bumps the
//! generation, so fetches that complete afterwards are dropped without side
//! effects. Readers only ever see immutable `Arc<TimeSeriesBuffer>` snapshots.

use crate::buffer::{SnapshotSource, TimeSeriesBuffer};
use crate::clock::Clock;
use crate::data_types::{AppState, ChartSettings, Sensor, SensorId};
use crate::error::{ConfigError, ErrorKind, PipelineError, SyncError};
use crate::lifecycle::{ChartLifecycle, LifecycleEvent};
use crate::storage::{FetchMode, StorageProvider};
use crate::subscription::{ChartEvent, ChartObserver, SubscriptionId, SubscriptionRegistry};
use crate::sync::{CloudSync, GattSync, ProgressFn, SyncState};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

/// External collaborators the controller talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn StorageProvider>,
    pub gatt: Option<Arc<dyn GattSync>>,
    pub cloud: Option<Arc<dyn CloudSync>>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    pub fn new(storage: Arc<dyn StorageProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            gatt: None,
            cloud: None,
            clock,
        }
    }

    pub fn with_gatt(mut self, gatt: Arc<dyn GattSync>) -> Self {
        self.gatt = Some(gatt);
        self
    }

    pub fn with_cloud(mut self, cloud: Arc<dyn CloudSync>) -> Self {
        self.cloud = Some(cloud);
        self
    }
}

#[derive(Clone, Debug)]
struct ActiveChart {
    sensor: Sensor,
    settings: ChartSettings,
}

#[derive(Debug)]
struct ControllerState {
    active: Option<ActiveChart>,
    buffer: Arc<TimeSeriesBuffer>,
    /// Newest timestamp ever fetched; poll ticks read strictly after it.
    fetch_watermark: Option<DateTime<Utc>>,
    /// Point up to which GATT history is known to be synced.
    sync_watermark: Option<DateTime<Utc>>,
    sync_state: SyncState,
    /// Token of the GATT transfer whose completion may still apply.
    running_sync: Option<u64>,
    lifecycle: ChartLifecycle,
    app_state: AppState,
    last_updated: Option<DateTime<Utc>>,
}

impl Default for ControllerState {
    fn default() -> Self {
        Self {
            active: None,
            buffer: Arc::new(TimeSeriesBuffer::new(SensorId::default())),
            fetch_watermark: None,
            sync_watermark: None,
            sync_state: SyncState::NotSyncing,
            running_sync: None,
            lifecycle: ChartLifecycle::Idle,
            app_state: AppState::Foreground,
            last_updated: None,
        }
    }
}

impl ControllerState {
    fn poll_interval(&self) -> Duration {
        self.active
            .as_ref()
            .map(|a| a.settings.retention.poll_interval(self.app_state))
            .unwrap_or_else(|| ChartSettings::default().retention.poll_interval(self.app_state))
    }
}

struct Inner {
    collab: Collaborators,
    generation: AtomicU64,
    sync_seq: AtomicU64,
    state: Arc<Mutex<ControllerState>>,
    registry: SubscriptionRegistry,
    poll_task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.poll_task.get_mut().take() {
            task.abort();
        }
    }
}

/// Owner of one sensor chart's live buffer, poll clock and sync sub-state.
#[derive(Clone)]
pub struct TimeSeriesController {
    inner: Arc<Inner>,
}

/// Snapshot view over the controller's buffer, handed to viewport jobs.
#[derive(Clone)]
pub struct BufferView {
    state: Arc<Mutex<ControllerState>>,
}

impl SnapshotSource for BufferView {
    fn snapshot(&self) -> Arc<TimeSeriesBuffer> {
        Arc::clone(&self.state.lock().buffer)
    }
}

impl TimeSeriesController {
    pub fn new(collab: Collaborators) -> Self {
        Self {
            inner: Arc::new(Inner {
                collab,
                generation: AtomicU64::new(0),
                sync_seq: AtomicU64::new(0),
                state: Arc::new(Mutex::new(ControllerState::default())),
                registry: SubscriptionRegistry::new(),
                poll_task: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self, sensor: SensorId, observer: Arc<dyn ChartObserver>) -> SubscriptionId {
        self.inner.registry.subscribe(sensor, observer)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.registry.unsubscribe(id)
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    pub fn lifecycle(&self) -> ChartLifecycle {
        self.inner.state.lock().lifecycle
    }

    pub fn sync_state(&self) -> SyncState {
        self.inner.state.lock().sync_state
    }

    pub fn sync_watermark(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().sync_watermark
    }

    /// Time of the last successful storage read.
    pub fn last_updated(&self) -> Option<DateTime<Utc>> {
        self.inner.state.lock().last_updated
    }

    pub fn sensor(&self) -> Option<Sensor> {
        self.inner.state.lock().active.as_ref().map(|a| a.sensor.clone())
    }

    pub fn settings(&self) -> Option<ChartSettings> {
        self.inner
            .state
            .lock()
            .active
            .as_ref()
            .map(|a| a.settings.clone())
    }

    pub fn fetch_mode(&self) -> Option<FetchMode> {
        self.settings().map(|s| FetchMode::for_settings(&s))
    }

    pub fn snapshot(&self) -> Arc<TimeSeriesBuffer> {
        Arc::clone(&self.inner.state.lock().buffer)
    }

    pub fn snapshot_source(&self) -> Arc<dyn SnapshotSource> {
        Arc::new(BufferView {
            state: Arc::clone(&self.inner.state),
        })
    }

    pub fn is_polling(&self) -> bool {
        self.inner
            .poll_task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Resets the buffer for `sensor`, loads the retention window and starts
    /// the poll clock. Invalid settings abort before anything is touched.
    pub async fn configure(&self, sensor: Sensor, settings: ChartSettings) -> Result<(), PipelineError> {
        settings.validate()?;

        let generation = {
            let mut st = self.inner.state.lock();
            let mut lifecycle = st.lifecycle;
            if lifecycle != ChartLifecycle::Idle {
                lifecycle = lifecycle
                    .next(LifecycleEvent::Reconfigure)?
                    .next(LifecycleEvent::Reset)?;
            }
            lifecycle = lifecycle.next(LifecycleEvent::Configure)?;

            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            let app_state = st.app_state;
            *st = ControllerState {
                active: Some(ActiveChart {
                    sensor: sensor.clone(),
                    settings: settings.clone(),
                }),
                buffer: Arc::new(TimeSeriesBuffer::new(sensor.id.clone())),
                lifecycle,
                app_state,
                ..ControllerState::default()
            };
            generation
        };
        self.abort_polling();
        debug!(sensor = %sensor.id, generation, "configuring chart");

        match self.load_full(generation).await {
            Err(PipelineError::Cancelled) => {
                trace!(sensor = %sensor.id, generation, "configure superseded");
                return Ok(());
            }
            // Reported to observers; polling still starts from an empty buffer.
            Err(PipelineError::StorageRead(_)) | Ok(()) => {}
            Err(other) => return Err(other),
        }

        self.start_polling(generation);

        if sensor.is_cloud && settings.cloud_sync_per_sensor && self.inner.collab.cloud.is_some() {
            let has_local = matches!(
                self.inner.collab.storage.read_latest(&sensor.id).await,
                Ok(Some(_))
            );
            if has_local {
                self.spawn_cloud_sync(generation);
            } else {
                debug!(sensor = %sensor.id, "no local record, skipping cloud sync");
            }
        }
        Ok(())
    }

    /// Reloads the full retention window in the current generation.
    pub async fn reload(&self) -> Result<(), PipelineError> {
        self.load_full(self.generation()).await
    }

    /// History was deleted: drop everything in flight, including a running
    /// GATT transfer, and load again.
    pub async fn on_data_deleted(&self) -> Result<(), PipelineError> {
        let (generation, stop_sync) = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            let active = st.active.as_ref().ok_or(ConfigError::NotConfigured)?;
            let sensor = active.sensor.id.clone();
            st.buffer = Arc::new(TimeSeriesBuffer::new(sensor.clone()));
            st.fetch_watermark = None;
            st.sync_watermark = None;
            let stop_sync = st.running_sync.take().map(|_| sensor);
            if stop_sync.is_some() {
                st.sync_state = SyncState::NotSyncing;
            }
            let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            (generation, stop_sync)
        };
        if let (Some(sensor), Some(gatt)) = (stop_sync, self.inner.collab.gatt.as_ref()) {
            gatt.stop(&sensor);
        }
        let was_polling = self.is_polling();
        self.abort_polling();

        let result = self.load_full(generation).await;
        if was_polling && self.generation() == generation && self.lifecycle().is_polling() {
            self.start_polling(generation);
        }
        result
    }

    async fn load_full(&self, generation: u64) -> Result<(), PipelineError> {
        let (sensor, settings) = self.active_for(generation)?;
        let now = self.inner.collab.clock.now();
        let retention = settings.retention.retention();
        let mode = FetchMode::for_settings(&settings);
        debug!(sensor = %sensor.id, generation, ?mode, "loading retention window");

        let storage = self.inner.collab.storage.as_ref();
        let fetched = match mode.fetch(storage, &sensor.id, now - retention).await {
            Ok(points) => storage
                .read_latest(&sensor.id)
                .await
                .map(|latest| (points, latest)),
            Err(e) => Err(e),
        };

        let mut events = Vec::new();
        let result = {
            let mut guard = self.inner.state.lock();
            if self.generation() != generation {
                trace!(sensor = %sensor.id, generation, "dropping stale load");
                return Err(PipelineError::Cancelled);
            }
            let st = &mut *guard;
            if st.lifecycle == ChartLifecycle::Configuring {
                st.lifecycle = st.lifecycle.next(LifecycleEvent::Loaded)?;
            }
            match fetched {
                Ok((points, latest)) => {
                    let buffer = Arc::make_mut(&mut st.buffer);
                    buffer.replace(points);
                    let pruned = buffer.prune(now, retention);
                    // Aggregated buckets are stamped with their first sample, so
                    // polling resumes after the newest stored sample instead.
                    let newest = latest.as_ref().map(|m| m.timestamp);
                    st.fetch_watermark = buffer
                        .last_timestamp()
                        .max(newest)
                        .max(st.fetch_watermark);
                    st.last_updated = Some(now);
                    debug!(
                        sensor = %sensor.id,
                        points = buffer.len(),
                        pruned,
                        "retention window loaded"
                    );
                    events.push(ChartEvent::ChartsAvailable(buffer.available_dimensions()));
                    if let Some(latest) = latest.or_else(|| buffer.latest().cloned()) {
                        events.push(ChartEvent::LatestRecordUpdated(latest));
                    }
                    Ok(())
                }
                Err(e) => {
                    warn!(sensor = %sensor.id, error = %e, "failed to load history");
                    events.push(ChartEvent::Error(ErrorKind::StorageRead));
                    Err(e.into())
                }
            }
        };
        self.inner.registry.dispatch(&sensor.id, &events);
        result
    }

    /// Runs one poll tick now. Returns how many new samples were appended.
    pub async fn poll_now(&self) -> Result<usize, PipelineError> {
        self.poll_tick(self.generation()).await
    }

    async fn poll_tick(&self, generation: u64) -> Result<usize, PipelineError> {
        let (sensor, settings) = self.active_for(generation)?;
        let retention = settings.retention.retention();
        // Pruning uses the wall clock at tick time, not at fetch completion.
        let now = self.inner.collab.clock.now();
        let since = self
            .inner
            .state
            .lock()
            .fetch_watermark
            .unwrap_or(now - retention);

        let fetched = self.inner.collab.storage.read_last(&sensor.id, since).await;

        let mut events = Vec::new();
        let result = {
            let mut guard = self.inner.state.lock();
            if self.generation() != generation {
                trace!(sensor = %sensor.id, generation, "dropping stale poll");
                return Err(PipelineError::Cancelled);
            }
            let st = &mut *guard;
            let buffer = Arc::make_mut(&mut st.buffer);
            let result = match fetched {
                Ok(points) => {
                    let inserted = buffer.append(points.into_iter().filter(|m| m.timestamp > since));
                    if let Some(newest) = inserted.last() {
                        st.fetch_watermark = Some(newest.timestamp).max(st.fetch_watermark);
                        events.push(ChartEvent::LatestRecordUpdated(newest.clone()));
                    }
                    st.last_updated = Some(now);
                    let count = inserted.len();
                    if count > 0 {
                        events.insert(0, ChartEvent::MeasurementsInserted(inserted));
                    }
                    Ok(count)
                }
                Err(e) => {
                    warn!(sensor = %sensor.id, error = %e, "poll read failed");
                    events.push(ChartEvent::Error(ErrorKind::StorageRead));
                    Err(e.into())
                }
            };
            let pruned = buffer.prune(now, retention);
            trace!(sensor = %sensor.id, pruned, remaining = buffer.len(), "poll tick");
            result
        };
        self.inner.registry.dispatch(&sensor.id, &events);
        result
    }

    /// Halts the poll clock (Live -> Paused).
    pub fn stop_observing(&self) -> Result<(), PipelineError> {
        {
            let mut st = self.inner.state.lock();
            st.lifecycle = st.lifecycle.next(LifecycleEvent::Pause)?;
        }
        self.abort_polling();
        Ok(())
    }

    /// Restarts the poll clock (Paused -> Live).
    pub fn resume_observing(&self) -> Result<(), PipelineError> {
        {
            let mut st = self.inner.state.lock();
            st.lifecycle = st.lifecycle.next(LifecycleEvent::Resume)?;
        }
        self.start_polling(self.generation());
        Ok(())
    }

    /// Switches between foreground and background poll intervals. Takes
    /// effect from the next tick.
    pub fn set_app_state(&self, app_state: AppState) {
        self.inner.state.lock().app_state = app_state;
    }

    pub fn poll_interval(&self) -> Duration {
        self.inner.state.lock().poll_interval()
    }

    /// Destroys the buffer and cancels all outstanding work.
    pub fn teardown(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.abort_polling();
        let syncing = {
            let mut st = self.inner.state.lock();
            let syncing = st
                .active
                .as_ref()
                .filter(|_| st.sync_state.is_active())
                .map(|a| a.sensor.id.clone());
            let app_state = st.app_state;
            *st = ControllerState {
                app_state,
                ..ControllerState::default()
            };
            syncing
        };
        if let (Some(sensor), Some(gatt)) = (syncing, self.inner.collab.gatt.as_ref()) {
            gatt.stop(&sensor);
        }
        debug!("chart torn down");
    }

    /// Downloads GATT history since the sync watermark. On completion the
    /// watermark advances to now and the retention window is reloaded.
    pub async fn sync_records(&self, progress: ProgressFn) -> Result<SyncState, PipelineError> {
        let gatt = self
            .inner
            .collab
            .gatt
            .clone()
            .ok_or(SyncError::Unavailable)?;
        let generation = self.generation();
        let now = self.inner.collab.clock.now();
        let token = self.inner.sync_seq.fetch_add(1, Ordering::SeqCst) + 1;

        let (sensor, from) = {
            let mut st = self.inner.state.lock();
            let active = st.active.as_ref().ok_or(ConfigError::NotConfigured)?;
            let sensor = active.sensor.id.clone();
            if st.sync_state.is_active() || gatt.is_syncing(&sensor) {
                return Err(SyncError::AlreadySyncing.into());
            }
            let from = st
                .sync_watermark
                .unwrap_or(now - active.settings.retention.retention());
            st.sync_state = SyncState::Syncing;
            st.running_sync = Some(token);
            (sensor, from)
        };
        info!(sensor = %sensor, %from, token, "starting history sync");

        let result = gatt.sync_logs(&sensor, from, progress).await;
        let finished_at = self.inner.collab.clock.now();

        let (outcome, events) = {
            let mut st = self.inner.state.lock();
            let current = st.running_sync == Some(token);
            if current {
                st.running_sync = None;
            }
            if self.generation() != generation {
                if current {
                    st.sync_state = SyncState::NotSyncing;
                }
                trace!(sensor = %sensor, generation, token, "dropping stale sync completion");
                return Err(PipelineError::Cancelled);
            }
            if !current {
                // Stopped by the user; a newer transfer may own the state now.
                debug!(sensor = %sensor, token, "sync interrupted, watermark kept");
                return Ok(SyncState::Interrupted);
            }
            match result {
                Ok(()) => {
                    st.sync_state = SyncState::Completed;
                    st.sync_watermark = Some(finished_at);
                    (Ok(SyncState::Completed), vec![ChartEvent::SensorUpdated])
                }
                Err(SyncError::Interrupted) => {
                    debug!(sensor = %sensor, token, "device ended sync early, watermark kept");
                    st.sync_state = SyncState::Interrupted;
                    (Ok(SyncState::Interrupted), Vec::new())
                }
                Err(e) => {
                    warn!(sensor = %sensor, error = %e, "history sync failed");
                    st.sync_state = SyncState::Failed;
                    (
                        Err(PipelineError::Sync(e)),
                        vec![ChartEvent::Error(ErrorKind::Sync)],
                    )
                }
            }
        };
        self.inner.registry.dispatch(&sensor, &events);

        if matches!(outcome, Ok(SyncState::Completed)) {
            match self.load_full(generation).await {
                Ok(()) | Err(PipelineError::Cancelled) => {}
                Err(e) => debug!(sensor = %sensor, error = %e, "reload after sync failed"),
            }
        }
        outcome
    }

    /// Interrupts a running GATT sync. The watermark is left untouched so a
    /// later sync resumes from it. Polling is unaffected.
    pub fn stop_sync_records(&self) -> bool {
        let Some(gatt) = self.inner.collab.gatt.as_ref() else {
            return false;
        };
        let sensor = {
            let mut st = self.inner.state.lock();
            let Some(sensor) = st.active.as_ref().map(|a| a.sensor.id.clone()) else {
                return false;
            };
            // Released before stopping so a racing success cannot advance the watermark.
            if st.running_sync.take().is_some() {
                st.sync_state = SyncState::Interrupted;
            }
            sensor
        };
        let stopped = gatt.stop(&sensor);
        debug!(sensor = %sensor, stopped, "sync stop requested");
        stopped
    }

    /// One-shot cloud history sync for the current generation.
    pub async fn run_cloud_sync(&self) -> Result<(), PipelineError> {
        self.cloud_sync(self.generation()).await
    }

    async fn cloud_sync(&self, generation: u64) -> Result<(), PipelineError> {
        let cloud = self
            .inner
            .collab
            .cloud
            .clone()
            .ok_or(SyncError::Unavailable)?;
        let (sensor, _) = self.active_for(generation)?;
        let result = cloud.sync(&sensor.id).await;
        if self.generation() != generation {
            return Err(PipelineError::Cancelled);
        }
        match result {
            Ok(()) => {
                self.inner
                    .registry
                    .dispatch(&sensor.id, &[ChartEvent::SensorUpdated]);
                Ok(())
            }
            Err(e) => {
                warn!(sensor = %sensor.id, error = %e, "cloud sync failed");
                self.inner
                    .registry
                    .dispatch(&sensor.id, &[ChartEvent::Error(ErrorKind::Sync)]);
                Err(e.into())
            }
        }
    }

    fn spawn_cloud_sync(&self, generation: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, cloud sync skipped");
            return;
        };
        let controller = self.clone();
        runtime.spawn(async move {
            if let Err(e) = controller.cloud_sync(generation).await {
                trace!(error = %e, "cloud sync ended");
            }
        });
    }

    fn active_for(&self, generation: u64) -> Result<(Sensor, ChartSettings), PipelineError> {
        let st = self.inner.state.lock();
        if self.generation() != generation {
            return Err(PipelineError::Cancelled);
        }
        let active = st.active.as_ref().ok_or(ConfigError::NotConfigured)?;
        Ok((active.sensor.clone(), active.settings.clone()))
    }

    fn start_polling(&self, generation: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, poll clock not started");
            return;
        };
        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let task = runtime.spawn(async move {
            loop {
                let Some(interval) = weak
                    .upgrade()
                    .map(|inner| inner.state.lock().poll_interval())
                else {
                    break;
                };
                tokio::time::sleep(interval).await;

                let Some(inner) = weak.upgrade() else {
                    break;
                };
                let controller = TimeSeriesController { inner };
                if controller.generation() != generation || !controller.lifecycle().is_polling() {
                    break;
                }
                if let Err(PipelineError::Cancelled) = controller.poll_tick(generation).await {
                    break;
                }
            }
        });
        if let Some(previous) = self.inner.poll_task.lock().replace(task) {
            previous.abort();
        }
    }

    fn abort_polling(&self) {
        if let Some(task) = self.inner.poll_task.lock().take() {
            task.abort();
        }
    }
}
