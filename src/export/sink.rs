//! Registered Prometheus gauges that exported values are written into.

use prometheus::core::Collector;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};

/// The registry every exported gauge and self-instrumentation metric is registered with.
///
/// One registry is built at process start and handed to the rule compiler and the
/// retriever; tests build a fresh one each so registrations never collide across tests.
#[derive(Debug, Clone, Default)]
pub struct SinkRegistry {
    registry: Registry,
}

impl SinkRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a gauge family named `name` with one label per entry of `label_names`.
    ///
    /// Fails if a collector with the same name is already registered or if the name or labels
    /// are not valid Prometheus identifiers.
    pub fn register_gauge(&self, name: &str, help: &str, label_names: &[String]) -> prometheus::Result<Sink> {
        let labels: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let gauges = GaugeVec::new(Opts::new(name, help), &labels)?;
        self.registry.register(Box::new(gauges.clone()))?;

        Ok(Sink {
            gauges,
            label_count: labels.len(),
        })
    }

    /// Register a counter family, used for the exporter's own instrumentation.
    pub fn register_counter(&self, name: &str, help: &str, label_names: &[&str]) -> prometheus::Result<IntCounterVec> {
        let counters = IntCounterVec::new(Opts::new(name, help), label_names)?;
        self.registry.register(Box::new(counters.clone()))?;
        Ok(counters)
    }

    /// Register a single unlabeled gauge, used for the exporter's own instrumentation.
    pub fn register_plain_gauge(&self, name: &str, help: &str) -> prometheus::Result<Gauge> {
        let gauge = Gauge::with_opts(Opts::new(name, help))?;
        self.registry.register(Box::new(gauge.clone()))?;
        Ok(gauge)
    }

    /// Snapshot every registered metric family.
    #[must_use]
    pub fn gather(&self) -> Vec<prometheus::proto::MetricFamily> {
        self.registry.gather()
    }

    /// Render every registered metric in the Prometheus text exposition format.
    pub fn encode_text(&self) -> prometheus::Result<String> {
        let families = self.gather();
        let mut buffer = String::new();
        TextEncoder::new().encode_utf8(&families, &mut buffer)?;
        Ok(buffer)
    }

    /// The content type matching [`Self::encode_text`].
    #[must_use]
    pub fn content_type() -> String {
        TextEncoder::new().format_type().to_string()
    }
}

/// One registered gauge family; each label tuple addresses one exported series.
#[derive(Debug, Clone)]
pub struct Sink {
    gauges: GaugeVec,
    label_count: usize,
}

impl Sink {
    /// The fully-qualified metric name of this sink.
    #[must_use]
    pub fn name(&self) -> String {
        self.gauges
            .desc()
            .first()
            .map(|desc| desc.fq_name.clone())
            .unwrap_or_default()
    }

    /// Number of labels every label tuple of this sink must have.
    #[must_use]
    pub const fn label_count(&self) -> usize {
        self.label_count
    }

    /// The gauge for one label tuple, created on first use.
    ///
    /// `values` must be ordered like the label names the sink was registered with.
    pub fn with_label_values(&self, values: &[String]) -> prometheus::Result<Gauge> {
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        self.gauges.get_metric_with_label_values(&values)
    }

    /// Stop exposing the series for one label tuple.
    pub fn remove_label_values(&self, values: &[String]) -> prometheus::Result<()> {
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        self.gauges.remove_label_values(&values)
    }
}
