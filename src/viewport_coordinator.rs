//! Viewport Coordinator
//!
//! Tracks the visible window of one dimension's chart and keeps the displayed
//! dataset in step with it. Every pan/zoom cancels the running decimation job
//! and submits a new one to a small worker pool; only the most recently issued,
//! non-cancelled job may swap the dataset (last writer wins).

use crate::axis_ticks::{self, AxisTick};
use crate::buffer::SnapshotSource;
use crate::data_types::{ChartDataset, Measurement, Projection, ViewportRange};
use crate::decimation::{decimate_cancellable, project, Bucketing};
use crate::error::ConfigError;
use crate::subscription::ChartObserver;
use crate::view_controller::ViewController;
use chrono_tz::Tz;
use parking_lot::{Condvar, Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// Receives every dataset the coordinator applies.
pub trait DatasetListener: Send + Sync {
    fn on_dataset(&self, dataset: Arc<ChartDataset>);
}

impl<F> DatasetListener for F
where
    F: Fn(Arc<ChartDataset>) + Send + Sync,
{
    fn on_dataset(&self, dataset: Arc<ChartDataset>) {
        self(dataset)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Maximum number of points handed to the renderer.
    pub budget: usize,
    /// Decimation jobs allowed to run at once.
    pub workers: usize,
    pub decimation_enabled: bool,
    pub bucketing: Bucketing,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            budget: 3000,
            workers: 3,
            decimation_enabled: true,
            bucketing: Bucketing::EqualCount,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

/// What a live append did to the displayed dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendOutcome {
    /// Decimation disabled: points were appended directly.
    Appended(usize),
    /// A new point landed in the viewport and a recompute was issued.
    Recompute(JobId),
    /// Nothing visible changed; the points wait in the buffer.
    Deferred,
}

struct ActiveJob {
    id: u64,
    cancel: Arc<AtomicBool>,
}

struct CoordState {
    viewport: Option<ViewportRange>,
    dataset: Arc<ChartDataset>,
    active: Option<ActiveJob>,
    in_flight: usize,
    /// Bumped on every dataset swap; delivery never goes backwards.
    version: u64,
}

struct CoordInner {
    source: Arc<dyn SnapshotSource>,
    projection: Projection,
    config: CoordinatorConfig,
    pool: rayon::ThreadPool,
    state: Mutex<CoordState>,
    idle: Condvar,
    next_job: AtomicU64,
    listener: RwLock<Option<Arc<dyn DatasetListener>>>,
    delivered: Mutex<u64>,
}

#[derive(Clone)]
pub struct ViewportCoordinator {
    inner: Arc<CoordInner>,
}

impl ViewportCoordinator {
    pub fn new(
        source: Arc<dyn SnapshotSource>,
        projection: Projection,
        config: CoordinatorConfig,
    ) -> Result<Self, ConfigError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers.max(1))
            .thread_name(|i| format!("viewport-decimation-{i}"))
            .build()?;
        let dataset = Arc::new(ChartDataset::empty(projection.tag));
        Ok(Self {
            inner: Arc::new(CoordInner {
                source,
                projection,
                config,
                pool,
                state: Mutex::new(CoordState {
                    viewport: None,
                    dataset,
                    active: None,
                    in_flight: 0,
                    version: 0,
                }),
                idle: Condvar::new(),
                next_job: AtomicU64::new(0),
                listener: RwLock::new(None),
                delivered: Mutex::new(0),
            }),
        })
    }

    pub fn set_listener(&self, listener: Arc<dyn DatasetListener>) {
        *self.inner.listener.write() = Some(listener);
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.inner.config
    }

    pub fn viewport(&self) -> Option<ViewportRange> {
        self.inner.state.lock().viewport
    }

    /// Immutable snapshot of the displayed dataset.
    pub fn dataset(&self) -> Arc<ChartDataset> {
        Arc::clone(&self.inner.state.lock().dataset)
    }

    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight
    }

    /// Moves the viewport and re-decimates around it.
    pub fn set_viewport(&self, range: ViewportRange) -> JobId {
        let range = if range.min <= range.max {
            range
        } else {
            ViewportRange {
                min: range.max,
                max: range.min,
                ..range
            }
        };
        self.inner.state.lock().viewport = Some(range);
        self.submit(range)
    }

    /// Shows everything the buffer currently covers.
    pub fn show_all(&self) -> Option<JobId> {
        let covered = self.inner.source.snapshot().covered_range()?;
        Some(self.set_viewport(covered))
    }

    /// Pans by a pixel delta on a chart `total_pixels` wide.
    pub fn pan(&self, delta_pixels: f32, total_pixels: f32) -> Option<JobId> {
        let mut range = self.viewport()?;
        ViewController::pan_axis(&mut range, delta_pixels, total_pixels);
        Some(self.set_viewport(range))
    }

    /// Zooms around `pivot_pct` of the visible window.
    pub fn zoom(&self, pivot_pct: f64, factor: f64) -> Option<JobId> {
        let mut range = self.viewport()?;
        ViewController::zoom_axis_at(&mut range, pivot_pct, factor);
        Some(self.set_viewport(range))
    }

    /// Zooms by `steps` of scroll wheel around `pivot_pct`. Positive steps zoom in.
    pub fn scroll_zoom(&self, pivot_pct: f64, steps: f64) -> Option<JobId> {
        self.zoom(pivot_pct, ViewController::scroll_zoom_factor(steps))
    }

    pub fn center_on(&self, x: f64) -> Option<JobId> {
        let mut range = self.viewport()?;
        let limits = self
            .inner
            .source
            .snapshot()
            .covered_range()
            .map(|c| (c.min, c.max));
        ViewController::move_to_center(&mut range, x, limits);
        Some(self.set_viewport(range))
    }

    /// Y extent of the displayed dataset with a relative margin.
    pub fn y_extent(&self, margin_pct: f64) -> Option<(f64, f64)> {
        let (lo, hi) = self.dataset().y_bounds()?;
        ViewController::auto_fit_y(lo, hi, margin_pct)
    }

    /// Ticks for the current viewport, aligned to local time in `tz` for long
    /// intervals.
    pub fn ticks(&self, label_count: usize, tz: Tz) -> Vec<AxisTick> {
        self.viewport()
            .map(|v| axis_ticks::ticks(&v, label_count, tz))
            .unwrap_or_default()
    }

    /// Cancels the running job, if any. Its result will never be applied.
    pub fn cancel(&self) {
        if let Some(job) = self.inner.state.lock().active.take() {
            job.cancel.store(true, Ordering::SeqCst);
            trace!(job = job.id, "viewport job cancelled");
        }
    }

    /// Handles samples freshly appended to the controller's buffer.
    pub fn on_live_append(&self, batch: &[Measurement]) -> AppendOutcome {
        if !self.inner.config.decimation_enabled {
            return self.append_direct(batch);
        }
        match self.viewport() {
            Some(viewport) if batch.iter().any(|m| viewport.contains(m.x())) => {
                AppendOutcome::Recompute(self.submit(viewport))
            }
            _ => AppendOutcome::Deferred,
        }
    }

    /// Blocks until no decimation job is in flight.
    pub fn wait_idle(&self) {
        let mut st = self.inner.state.lock();
        while st.in_flight > 0 {
            self.inner.idle.wait(&mut st);
        }
    }

    /// Like `wait_idle` with an upper bound. Returns whether it went idle.
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        let mut st = self.inner.state.lock();
        while st.in_flight > 0 {
            if self.inner.idle.wait_for(&mut st, timeout).timed_out() {
                return st.in_flight == 0;
            }
        }
        true
    }

    fn append_direct(&self, batch: &[Measurement]) -> AppendOutcome {
        let projected = project(batch, &self.inner.projection);
        let (appended, delivery) = {
            let mut guard = self.inner.state.lock();
            let st = &mut *guard;
            let dataset = Arc::make_mut(&mut st.dataset);
            let mut appended = 0;
            for point in projected {
                if dataset.last_x().map_or(true, |last| point.x > last) {
                    dataset.points.push(point);
                    appended += 1;
                }
            }
            if appended == 0 {
                return AppendOutcome::Appended(0);
            }
            st.version += 1;
            (appended, (st.version, Arc::clone(&st.dataset)))
        };
        self.inner.deliver(delivery.0, delivery.1);
        AppendOutcome::Appended(appended)
    }

    fn submit(&self, viewport: ViewportRange) -> JobId {
        let id = self.inner.next_job.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = Arc::new(AtomicBool::new(false));
        {
            let mut st = self.inner.state.lock();
            if let Some(previous) = st.active.replace(ActiveJob {
                id,
                cancel: Arc::clone(&cancel),
            }) {
                previous.cancel.store(true, Ordering::SeqCst);
                trace!(job = previous.id, superseded_by = id, "viewport job superseded");
            }
            st.in_flight += 1;
        }

        // Slack of one visible span on each side absorbs gesture momentum.
        let query = viewport.expanded(viewport.span());
        debug!(job = id, min = query.min, max = query.max, "submitting viewport job");
        let inner = Arc::clone(&self.inner);
        self.inner
            .pool
            .spawn(move || inner.run_job(id, query, cancel));
        JobId(id)
    }
}

impl CoordInner {
    fn run_job(&self, id: u64, query: ViewportRange, cancel: Arc<AtomicBool>) {
        let dataset = self.build_dataset(id, query, &cancel);

        let delivery = {
            let mut st = self.state.lock();
            let current = st
                .active
                .as_ref()
                .is_some_and(|job| job.id == id && !job.cancel.load(Ordering::SeqCst));
            let delivery = match dataset {
                Some(dataset) if current => {
                    st.dataset = Arc::new(dataset);
                    st.version += 1;
                    Some((st.version, Arc::clone(&st.dataset)))
                }
                _ => {
                    trace!(job = id, "discarding viewport job result");
                    None
                }
            };
            st.in_flight -= 1;
            if st.in_flight == 0 {
                self.idle.notify_all();
            }
            delivery
        };

        if let Some((version, dataset)) = delivery {
            self.deliver(version, dataset);
        }
    }

    fn build_dataset(&self, id: u64, query: ViewportRange, cancel: &AtomicBool) -> Option<ChartDataset> {
        if cancel.load(Ordering::SeqCst) {
            return None;
        }
        let points = self.source.measurements_in(&query);
        if cancel.load(Ordering::SeqCst) {
            return None;
        }
        let budget = if self.config.decimation_enabled {
            self.config.budget
        } else {
            usize::MAX
        };
        let Some(decimated) =
            decimate_cancellable(&points, &self.projection, budget, self.config.bucketing, cancel)
        else {
            trace!(job = id, "viewport job cancelled mid-decimation");
            return None;
        };
        trace!(job = id, raw = points.len(), decimated = decimated.len(), "viewport job done");
        Some(ChartDataset {
            dimension: self.projection.tag,
            points: decimated,
            source_range: Some(query),
            job: Some(id),
        })
    }

    fn deliver(&self, version: u64, dataset: Arc<ChartDataset>) {
        let Some(listener) = self.listener.read().clone() else {
            return;
        };
        let mut delivered = self.delivered.lock();
        if version <= *delivered {
            return;
        }
        *delivered = version;
        listener.on_dataset(dataset);
    }
}

impl ChartObserver for ViewportCoordinator {
    fn on_measurements_inserted(&self, batch: &[Measurement]) {
        let outcome = self.on_live_append(batch);
        trace!(?outcome, "live append");
    }
}
