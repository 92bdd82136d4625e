//! Mapping of CloudWatch metrics onto Prometheus gauges
//!
//! This module holds the engine of the exporter. It turns a declarative set of export rules
//! into registered gauges, finds the CloudWatch time-series each rule selects, and keeps those
//! gauges populated with the most recent datapoints.
//!
//! # Implementation Model
//!
//! - **Compilation**: [`compile`] validates each [`ExportRule`], compiles its dimension filters
//!   and registers one gauge per statistic in a [`SinkRegistry`], yielding [`CompiledRule`]s.
//! - **Discovery**: [`discover`] pages through the provider's metric catalog for every rule,
//!   keeps the metrics the rule selects and produces a [`Snapshot`] of tracked series.
//! - **Retrieval**: [`retrieve`] fetches datapoints for a snapshot in capped batches and writes
//!   them to the gauges, falling back to each statistic's [`StatDefault`] when no datapoint
//!   arrives.
//! - **Refresh**: [`RefreshScheduler`] reruns discovery in the background with an adaptive
//!   interval and publishes each new snapshot by atomic swap.
//!
//! The monitoring backend is reached only through the [`ProviderApi`] trait, which keeps the
//! engine testable without network access.

mod discovery;
mod error;
mod matcher;
pub mod names;
mod provider;
mod retriever;
mod rule;
mod scheduler;
mod sink;
mod snapshot;

pub use discovery::discover;
pub use error::{ConfigErrorKind, ExportError};
pub use matcher::{includes, label_values};
pub use provider::{
    DataPage, DataQuery, DataResult, DiagnosticMessage, Dimension, MetricDescriptor, MetricsPage, ProviderApi, ProviderError,
};
pub use retriever::{MAX_QUERIES_PER_BATCH, RetrievalInstruments, retrieve};
pub use rule::{CompiledRule, ExportRule, StatBinding, StatDefault, Transform, compile};
pub use scheduler::{MAX_INTERVAL, MIN_INTERVAL, RefreshScheduler, sleep_range};
pub use sink::{Sink, SinkRegistry};
pub use snapshot::{MetricRef, SeriesId, SeriesKey, Snapshot, TrackedSeries};
