use super::error::ExportError;
use super::provider::{DataPage, DiagnosticMessage, ProviderApi, ProviderError};
use super::rule::StatDefault;
use super::sink::SinkRegistry;
use super::snapshot::{Snapshot, TrackedSeries};
use chrono::{DateTime, Utc};
use core::time::Duration;
use prometheus::IntCounterVec;
use std::collections::{HashMap, HashSet};

/// Log target for retrieval
const LOG_TARGET: &str = " retriever";

/// Most queries a single datapoint request may carry.
pub const MAX_QUERIES_PER_BATCH: usize = 100;

/// Self-instrumentation updated while retrieving datapoints.
#[derive(Debug, Clone)]
pub struct RetrievalInstruments {
    messages: IntCounterVec,
}

impl RetrievalInstruments {
    pub fn register(registry: &SinkRegistry) -> prometheus::Result<Self> {
        let messages = registry.register_counter(
            "monitoring_cloudwatch_get_metric_data_messages_count",
            "Count of messages returned by GetMetricData, by message code",
            &["code"],
        )?;

        Ok(Self { messages })
    }

    fn record(&self, message: &DiagnosticMessage) {
        log::warn!(target: LOG_TARGET, "Provider returned message code={} value={}", message.code, message.value);
        self.messages.with_label_values(&[message.code.as_str()]).inc();
    }
}

/// Fetch the datapoints of every series in `snapshot` for the window `[start, start + period)`.
///
/// Series are queried in batches of at most [`MAX_QUERIES_PER_BATCH`]. Each series with a
/// datapoint gets its newest value, transformed, written to its gauge; every other series gets
/// its [`StatDefault`] applied. A failing batch aborts the call, but values written by the
/// batches before it are kept.
pub async fn retrieve(
    snapshot: &Snapshot,
    start: DateTime<Utc>,
    period: Duration,
    provider: &dyn ProviderApi,
    instruments: &RetrievalInstruments,
) -> Result<(), ExportError> {
    let end = start + period;

    for (batch, chunk) in snapshot.as_slice().chunks(MAX_QUERIES_PER_BATCH).enumerate() {
        retrieve_batch(chunk, start, end, period, provider, instruments)
            .await
            .map_err(|err| match err {
                BatchError::Provider(source) => ExportError::Retrieval { batch, source },
                BatchError::Export(err) => err,
            })?;
    }

    log::debug!(target: LOG_TARGET, "Retrieved datapoints for {} series starting at {start}", snapshot.len());
    Ok(())
}

enum BatchError {
    Provider(ProviderError),
    Export(ExportError),
}

impl From<ExportError> for BatchError {
    fn from(err: ExportError) -> Self {
        Self::Export(err)
    }
}

async fn retrieve_batch(
    chunk: &[TrackedSeries],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    period: Duration,
    provider: &dyn ProviderApi,
    instruments: &RetrievalInstruments,
) -> Result<(), BatchError> {
    let queries: Vec<_> = chunk.iter().map(|s| s.query(period)).collect();
    let by_id: HashMap<&str, &TrackedSeries> = chunk.iter().map(|s| (s.id().as_str(), s)).collect();
    let mut written = HashSet::new();
    let mut next_token = None;

    loop {
        let page: DataPage = provider
            .get_metric_data(&queries, start, end, next_token)
            .await
            .map_err(BatchError::Provider)?;

        for message in &page.messages {
            instruments.record(message);
        }

        for (id, result) in &page.results {
            let Some(&raw) = result.values.first() else {
                continue;
            };

            if let Some(series) = by_id.get(id.as_str()) {
                series.write(series.transformed(raw))?;
                let _ = written.insert(series.id());
            } else {
                log::debug!(target: LOG_TARGET, "Ignoring result for unknown query id '{id}'");
            }
        }

        match page.next_token {
            Some(token) => next_token = Some(token),
            None => break,
        }
    }

    for series in chunk.iter().filter(|s| !written.contains(s.id())) {
        match series.stat_default() {
            StatDefault::Prior => {}
            StatDefault::Zero => series.write(0.0)?,
            StatDefault::NaN => series.write(f64::NAN)?,
        }
    }

    Ok(())
}
