//! Typed observer registry keyed by sensor.

use crate::data_types::{DimensionTag, Measurement, SensorId};
use crate::error::ErrorKind;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Presentation-layer callbacks. Every method defaults to a no-op.
pub trait ChartObserver: Send + Sync {
    fn on_charts_available(&self, _sensor: &SensorId, _dimensions: &[DimensionTag]) {}
    fn on_latest_record_updated(&self, _record: &Measurement) {}
    fn on_measurements_inserted(&self, _batch: &[Measurement]) {}
    fn on_sensor_updated(&self, _sensor: &SensorId) {}
    fn on_error(&self, _sensor: &SensorId, _kind: ErrorKind) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

/// Notification produced under the controller lock and dispatched after it.
#[derive(Clone, Debug, PartialEq)]
pub enum ChartEvent {
    ChartsAvailable(Vec<DimensionTag>),
    LatestRecordUpdated(Measurement),
    MeasurementsInserted(Vec<Measurement>),
    SensorUpdated,
    Error(ErrorKind),
}

type Entry = (SubscriptionId, Arc<dyn ChartObserver>);

#[derive(Default)]
pub struct SubscriptionRegistry {
    next_id: AtomicU64,
    entries: RwLock<HashMap<SensorId, Vec<Entry>>>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, sensor: SensorId, observer: Arc<dyn ChartObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .entry(sensor)
            .or_default()
            .push((id, observer));
        id
    }

    /// Returns whether `id` was registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut entries = self.entries.write();
        let mut removed = false;
        entries.retain(|_, list| {
            let before = list.len();
            list.retain(|(entry_id, _)| *entry_id != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    pub fn unsubscribe_all(&self, sensor: &SensorId) -> usize {
        self.entries.write().remove(sensor).map_or(0, |list| list.len())
    }

    pub fn observer_count(&self, sensor: &SensorId) -> usize {
        self.entries.read().get(sensor).map_or(0, Vec::len)
    }

    fn observers(&self, sensor: &SensorId) -> Vec<Arc<dyn ChartObserver>> {
        self.entries
            .read()
            .get(sensor)
            .map(|list| list.iter().map(|(_, o)| Arc::clone(o)).collect())
            .unwrap_or_default()
    }

    /// Delivers `events` in order. Observers may re-enter the registry.
    pub fn dispatch(&self, sensor: &SensorId, events: &[ChartEvent]) {
        if events.is_empty() {
            return;
        }
        let observers = self.observers(sensor);
        for event in events {
            for observer in &observers {
                match event {
                    ChartEvent::ChartsAvailable(dims) => observer.on_charts_available(sensor, dims),
                    ChartEvent::LatestRecordUpdated(m) => observer.on_latest_record_updated(m),
                    ChartEvent::MeasurementsInserted(batch) => {
                        observer.on_measurements_inserted(batch)
                    }
                    ChartEvent::SensorUpdated => observer.on_sensor_updated(sensor),
                    ChartEvent::Error(kind) => observer.on_error(sensor, *kind),
                }
            }
        }
    }
}
