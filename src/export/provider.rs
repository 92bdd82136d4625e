//! The monitoring backend as seen by discovery and retrieval.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use core::time::Duration;
use std::collections::HashMap;

/// Errors surfaced by a [`ProviderApi`] implementation.
pub type ProviderError = Box<dyn core::error::Error + Send + Sync + 'static>;

/// A name/value pair qualifying a provider metric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A metric as returned by the provider's listing call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetricDescriptor {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
}

/// One page of a metric listing.
#[derive(Debug, Clone, Default)]
pub struct MetricsPage {
    pub metrics: Vec<MetricDescriptor>,
    pub next_token: Option<String>,
}

/// One statistic of one metric to fetch datapoints for.
#[derive(Debug, Clone, PartialEq)]
pub struct DataQuery {
    /// Correlates the query with its result; unique within one request.
    pub id: String,
    pub metric: MetricDescriptor,
    pub statistic: String,
    /// Reporting granularity.
    pub period: Duration,
}

/// Datapoints returned for one [`DataQuery`], newest first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataResult {
    pub values: Vec<f64>,
}

/// A side-channel notice attached to a datapoint response, such as a throttling warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticMessage {
    pub code: String,
    pub value: String,
}

/// One page of a datapoint response.
#[derive(Debug, Clone, Default)]
pub struct DataPage {
    /// Results keyed by [`DataQuery::id`].
    pub results: HashMap<String, DataResult>,
    pub messages: Vec<DiagnosticMessage>,
    pub next_token: Option<String>,
}

/// Access to a monitoring backend's metric catalog and datapoints.
///
/// Both calls are paginated: a `None` continuation token requests the first page, and a
/// page with no `next_token` is the last one.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// List the metrics named `metric_name` within `namespace`.
    async fn list_metrics(&self, namespace: &str, metric_name: &str, next_token: Option<String>) -> Result<MetricsPage, ProviderError>;

    /// Fetch datapoints for `queries` within the half-open window `[start, end)`.
    async fn get_metric_data(
        &self,
        queries: &[DataQuery],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        next_token: Option<String>,
    ) -> Result<DataPage, ProviderError>;
}
