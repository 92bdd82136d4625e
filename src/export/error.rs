use super::provider::ProviderError;

/// Errors produced while compiling rules, discovering series or retrieving datapoints.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// A rule is invalid; the exporter must not start with it.
    #[error("invalid export rule (namespace={namespace}, name={name}): {kind}")]
    Config {
        namespace: String,
        name: String,
        #[source]
        kind: ConfigErrorKind,
    },

    /// Listing the metrics of a rule failed.
    #[error("unable to list metrics (namespace={namespace}, name={name})")]
    Discovery {
        namespace: String,
        name: String,
        #[source]
        source: ProviderError,
    },

    /// Fetching the datapoints of one batch failed.
    #[error("unable to fetch metric data for batch {batch}")]
    Retrieval {
        batch: usize,
        #[source]
        source: ProviderError,
    },

    /// A value could not be written to a gauge.
    #[error("unable to write to gauge '{sink}'")]
    Sink {
        sink: String,
        #[source]
        source: prometheus::Error,
    },
}

/// What is wrong with an export rule.
#[derive(Debug, thiserror::Error)]
pub enum ConfigErrorKind {
    #[error("at least one statistic is required")]
    StatisticRequired,

    #[error("DimensionsMatch name '{0}' not in Dimensions")]
    UnknownMatchDimension(String),

    #[error("DimensionsNoMatch name '{0}' not in Dimensions")]
    UnknownNoMatchDimension(String),

    #[error("invalid pattern for dimension '{dimension}'")]
    InvalidPattern {
        dimension: String,
        #[source]
        source: regex::Error,
    },

    #[error("unable to register gauge '{sink}'")]
    SinkRegistration {
        sink: String,
        #[source]
        source: prometheus::Error,
    },

    #[error("transform length {transforms} not equal to statistics length {statistics}")]
    TransformMismatch { transforms: usize, statistics: usize },

    #[error("sinks length {sinks} not equal to statistics length {statistics}")]
    SinkMismatch { sinks: usize, statistics: usize },

    #[error("sink '{sink}' has {labels} labels but the rule has {dimensions} dimensions")]
    SinkLabelMismatch { sink: String, labels: usize, dimensions: usize },
}

impl ExportError {
    pub(crate) fn config(namespace: &str, name: &str, kind: ConfigErrorKind) -> Self {
        Self::Config {
            namespace: namespace.to_string(),
            name: name.to_string(),
            kind,
        }
    }
}
