//! Export rules and their compilation into matchers and sinks.

use super::error::{ConfigErrorKind, ExportError};
use super::names;
use super::sink::{Sink, SinkRegistry};
use core::fmt;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

const LOG_TARGET: &str = "     rules";

/// What to write to a sink when a polling window returns no datapoint for its series.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString, strum::IntoStaticStr,
)]
pub enum StatDefault {
    /// Keep the last known value.
    #[default]
    Prior,

    /// Write zero.
    Zero,

    /// Write not-a-number.
    #[serde(rename = "NaN")]
    #[strum(serialize = "NaN")]
    NaN,
}

/// A function applied to every datapoint before it is written to a sink.
#[derive(Clone)]
pub struct Transform(Arc<dyn Fn(f64) -> f64 + Send + Sync>);

impl Transform {
    pub fn new(f: impl Fn(f64) -> f64 + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    #[must_use]
    pub fn apply(&self, value: f64) -> f64 {
        (self.0)(value)
    }
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Transform")
    }
}

/// Describes which CloudWatch metrics to export and how.
#[derive(Debug, Clone, Default)]
pub struct ExportRule {
    /// Together with `metric_name`, identifies the metric family in CloudWatch.
    pub namespace: String,
    pub metric_name: String,

    /// Names of the dimensions a metric must have, no more and no fewer.
    pub dimensions: Vec<String>,

    /// Statistics to pull, such as `Average` or `Maximum`.
    pub statistics: Vec<String>,

    /// Dimension name to pattern the dimension's value must match.
    pub dimensions_match: BTreeMap<String, String>,

    /// Dimension name to pattern the dimension's value must not match.
    pub dimensions_no_match: BTreeMap<String, String>,

    pub stat_default: StatDefault,

    /// Parallel to `statistics`: empty, or one optional transform per statistic.
    pub transform: Vec<Option<Transform>>,

    /// Parallel to `statistics`: leave empty and the sinks are derived and registered.
    pub sinks: Vec<Sink>,
}

/// One statistic of a compiled rule along with everything needed to export it.
#[derive(Debug, Clone)]
pub struct StatBinding {
    pub statistic: String,
    pub transform: Option<Transform>,
    pub stat_default: StatDefault,
    pub sink: Sink,
}

/// A validated [`ExportRule`] with its patterns compiled and its sinks bound.
#[derive(Debug)]
pub struct CompiledRule {
    namespace: String,
    metric_name: String,
    dimensions: Vec<String>,
    dimensions_match: HashMap<String, Regex>,
    dimensions_no_match: HashMap<String, Regex>,
    stats: Vec<StatBinding>,
}

impl CompiledRule {
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    /// Dimension names, sorted.
    #[must_use]
    pub fn dimensions(&self) -> &[String] {
        &self.dimensions
    }

    #[must_use]
    pub fn match_pattern(&self, dimension: &str) -> Option<&Regex> {
        self.dimensions_match.get(dimension)
    }

    #[must_use]
    pub fn no_match_pattern(&self, dimension: &str) -> Option<&Regex> {
        self.dimensions_no_match.get(dimension)
    }

    /// One binding per statistic, in the order the statistics were configured.
    #[must_use]
    pub fn stats(&self) -> &[StatBinding] {
        &self.stats
    }
}

impl ExportRule {
    /// Validate the rule, compile its patterns and register its sinks with `registry`.
    pub fn compile(mut self, registry: &SinkRegistry) -> Result<CompiledRule, ExportError> {
        let namespace = self.namespace.clone();
        let metric_name = self.metric_name.clone();
        let err = |kind| ExportError::config(&namespace, &metric_name, kind);

        if self.statistics.is_empty() {
            return Err(err(ConfigErrorKind::StatisticRequired));
        }

        // sorted so that matching only needs a positional comparison
        self.dimensions.sort();

        if let Some(key) = self.dimensions_match.keys().find(|k| !self.dimensions.contains(k)) {
            return Err(err(ConfigErrorKind::UnknownMatchDimension(key.clone())));
        }

        if let Some(key) = self.dimensions_no_match.keys().find(|k| !self.dimensions.contains(k)) {
            return Err(err(ConfigErrorKind::UnknownNoMatchDimension(key.clone())));
        }

        let dimensions_match = compile_patterns(&self.dimensions_match).map_err(err)?;
        let dimensions_no_match = compile_patterns(&self.dimensions_no_match).map_err(err)?;

        if self.sinks.is_empty() {
            self.sinks = self.register_sinks(registry).map_err(err)?;
        }

        if !self.transform.is_empty() && self.transform.len() != self.statistics.len() {
            return Err(err(ConfigErrorKind::TransformMismatch {
                transforms: self.transform.len(),
                statistics: self.statistics.len(),
            }));
        }

        if self.sinks.len() != self.statistics.len() {
            return Err(err(ConfigErrorKind::SinkMismatch {
                sinks: self.sinks.len(),
                statistics: self.statistics.len(),
            }));
        }

        if let Some(sink) = self.sinks.iter().find(|s| s.label_count() != self.dimensions.len()) {
            return Err(err(ConfigErrorKind::SinkLabelMismatch {
                sink: sink.name(),
                labels: sink.label_count(),
                dimensions: self.dimensions.len(),
            }));
        }

        let mut transforms = self.transform.into_iter();
        let stats = self
            .statistics
            .into_iter()
            .zip(self.sinks)
            .map(|(statistic, sink)| StatBinding {
                statistic,
                transform: transforms.next().flatten(),
                stat_default: self.stat_default,
                sink,
            })
            .collect();

        Ok(CompiledRule {
            namespace: self.namespace,
            metric_name: self.metric_name,
            dimensions: self.dimensions,
            dimensions_match,
            dimensions_no_match,
            stats,
        })
    }

    fn register_sinks(&self, registry: &SinkRegistry) -> Result<Vec<Sink>, ConfigErrorKind> {
        let label_names: Vec<String> = self.dimensions.iter().map(|d| names::label_name(d)).collect();

        self.statistics
            .iter()
            .map(|statistic| {
                let name = names::sink_name(&self.namespace, &self.metric_name, &self.dimensions, statistic);
                let help = format!("CloudWatch metric {} {} ({statistic})", self.namespace, self.metric_name);

                log::debug!(target: LOG_TARGET, "Registering gauge '{name}' with labels {label_names:?}");
                registry
                    .register_gauge(&name, &help, &label_names)
                    .map_err(|source| ConfigErrorKind::SinkRegistration { sink: name, source })
            })
            .collect()
    }
}

fn compile_patterns(patterns: &BTreeMap<String, String>) -> Result<HashMap<String, Regex>, ConfigErrorKind> {
    patterns
        .iter()
        .map(|(dimension, pattern)| {
            Regex::new(pattern)
                .map(|re| (dimension.clone(), re))
                .map_err(|source| ConfigErrorKind::InvalidPattern {
                    dimension: dimension.clone(),
                    source,
                })
        })
        .collect()
}

/// Compile every rule, failing on the first invalid one.
pub fn compile(rules: impl IntoIterator<Item = ExportRule>, registry: &SinkRegistry) -> Result<Vec<Arc<CompiledRule>>, ExportError> {
    rules.into_iter().map(|rule| rule.compile(registry).map(Arc::new)).collect()
}
