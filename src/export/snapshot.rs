//! The set of series produced by one discovery pass.

use super::error::ExportError;
use super::provider::{DataQuery, Dimension, MetricDescriptor};
use super::rule::{StatDefault, Transform};
use super::sink::Sink;
use core::fmt;
use core::time::Duration;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Log target for snapshot bookkeeping
const LOG_TARGET: &str = "  snapshot";

/// Identifies a series within one snapshot and correlates it with its datapoint query.
///
/// Ids are only stable within the snapshot that assigned them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesId(String);

impl SeriesId {
    pub(crate) fn from_index(index: usize) -> Self {
        Self(format!("i{index}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A provider metric with its dimensions in canonical (sorted) order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricRef {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
}

impl MetricRef {
    pub(crate) fn descriptor(&self) -> MetricDescriptor {
        MetricDescriptor {
            namespace: self.namespace.clone(),
            metric_name: self.metric_name.clone(),
            dimensions: self.dimensions.clone(),
        }
    }
}

/// Identity of a series across snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub metric: MetricRef,
    pub statistic: String,
}

/// One statistic of one discovered metric, bound to the gauge that exports it.
#[derive(Debug)]
pub struct TrackedSeries {
    id: SeriesId,
    key: SeriesKey,
    transform: Option<Transform>,
    stat_default: StatDefault,
    sink: Sink,
    labels: Vec<String>,
    state: Mutex<SeriesState>,
}

#[derive(Debug)]
struct SeriesState {
    last_value: Option<f64>,
    retired: bool,
}

impl TrackedSeries {
    pub(crate) fn new(
        id: SeriesId,
        key: SeriesKey,
        transform: Option<Transform>,
        stat_default: StatDefault,
        sink: Sink,
        labels: Vec<String>,
        last_value: Option<f64>,
    ) -> Self {
        Self {
            id,
            key,
            transform,
            stat_default,
            sink,
            labels,
            state: Mutex::new(SeriesState {
                last_value,
                retired: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, SeriesState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub const fn id(&self) -> &SeriesId {
        &self.id
    }

    #[must_use]
    pub const fn key(&self) -> &SeriesKey {
        &self.key
    }

    #[must_use]
    pub fn statistic(&self) -> &str {
        &self.key.statistic
    }

    #[must_use]
    pub const fn stat_default(&self) -> StatDefault {
        self.stat_default
    }

    #[must_use]
    pub const fn sink(&self) -> &Sink {
        &self.sink
    }

    /// Label values of this series within its sink.
    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The most recent value written for this series, if any.
    #[must_use]
    pub fn last_value(&self) -> Option<f64> {
        self.state().last_value
    }

    /// Apply this series' transform to a raw datapoint.
    #[must_use]
    pub fn transformed(&self, raw: f64) -> f64 {
        self.transform.as_ref().map_or(raw, |t| t.apply(raw))
    }

    /// Write `value` to the sink and remember it as the last value.
    ///
    /// Writes to a retired series are dropped so that a late scrape cannot expose it again.
    pub fn write(&self, value: f64) -> Result<(), ExportError> {
        let mut state = self.state();
        if state.retired {
            return Ok(());
        }

        let gauge = self.sink.with_label_values(&self.labels).map_err(|source| ExportError::Sink {
            sink: self.sink.name(),
            source,
        })?;

        gauge.set(value);
        state.last_value = Some(value);
        Ok(())
    }

    /// Whether this series has stopped being exposed.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.state().retired
    }

    /// Stop exposing this series, now and on any later write.
    pub(crate) fn retire(&self) {
        let mut state = self.state();
        state.retired = true;

        match self.sink.remove_label_values(&self.labels) {
            // never written, so never exposed
            Ok(()) | Err(prometheus::Error::Msg(_)) => {}
            Err(err) => {
                log::debug!(target: LOG_TARGET, "Unable to remove series {} from '{}': {err}", self.id, self.sink.name());
            }
        }
    }

    pub(crate) fn query(&self, period: Duration) -> DataQuery {
        DataQuery {
            id: self.id.to_string(),
            metric: self.key.metric.descriptor(),
            statistic: self.key.statistic.clone(),
            period,
        }
    }

    fn exposed_as(&self) -> (String, &[String]) {
        (self.sink.name(), &self.labels)
    }
}

/// Every series tracked as the result of one discovery pass, in production order.
///
/// A snapshot is never modified structurally once built; only sink values and the last values
/// of its series change.
#[derive(Debug, Default)]
pub struct Snapshot {
    series: Vec<TrackedSeries>,
    by_id: HashMap<SeriesId, usize>,
    by_key: HashMap<SeriesKey, usize>,
}

impl Snapshot {
    pub(crate) fn new(series: Vec<TrackedSeries>) -> Self {
        let mut by_id = HashMap::with_capacity(series.len());
        let mut by_key = HashMap::with_capacity(series.len());

        for (index, s) in series.iter().enumerate() {
            let _ = by_id.insert(s.id.clone(), index);
            let _ = by_key.entry(s.key.clone()).or_insert(index);
        }

        Self { series, by_id, by_key }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.series.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrackedSeries> {
        self.series.iter()
    }

    pub(crate) fn as_slice(&self) -> &[TrackedSeries] {
        &self.series
    }

    #[must_use]
    pub fn get(&self, id: &SeriesId) -> Option<&TrackedSeries> {
        self.by_id.get(id).and_then(|&index| self.series.get(index))
    }

    #[must_use]
    pub fn find(&self, key: &SeriesKey) -> Option<&TrackedSeries> {
        self.by_key.get(key).and_then(|&index| self.series.get(index))
    }

    /// Series of this snapshot whose sink and labels no longer appear in `next`.
    pub(crate) fn vanished_from<'a>(&'a self, next: &Snapshot) -> impl Iterator<Item = &'a TrackedSeries> + use<'a> {
        let kept: HashSet<(String, Vec<String>)> = next
            .series
            .iter()
            .map(|s| {
                let (sink, labels) = s.exposed_as();
                (sink, labels.to_vec())
            })
            .collect();

        self.series.iter().filter(move |s| {
            let (sink, labels) = s.exposed_as();
            !kept.contains(&(sink, labels.to_vec()))
        })
    }
}
