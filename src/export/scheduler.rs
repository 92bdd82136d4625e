use super::discovery::discover;
use super::error::ExportError;
use super::provider::ProviderApi;
use super::rule::CompiledRule;
use super::sink::SinkRegistry;
use super::snapshot::Snapshot;
use arc_swap::ArcSwap;
use core::time::Duration;
use prometheus::Gauge;
use std::sync::Arc;
use std::time::Instant;

/// Log target for the refresh scheduler
const LOG_TARGET: &str = " scheduler";

/// Shortest pause between two discovery passes.
pub const MIN_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Longest pause between two discovery passes.
pub const MAX_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// How many times the duration of the last pass to pause before the next one.
const INTERVAL_MULTIPLIER: u32 = 10;

/// Bound `got` to `[min, max]`.
#[must_use]
pub fn sleep_range(got: Duration, min: Duration, max: Duration) -> Duration {
    if got < min {
        min
    } else if got > max {
        max
    } else {
        got
    }
}

/// Keeps the published [`Snapshot`] current by rerunning discovery in the background.
///
/// The published snapshot is swapped atomically, so readers always see a complete pass.
pub struct RefreshScheduler {
    rules: Vec<Arc<CompiledRule>>,
    provider: Arc<dyn ProviderApi>,
    current: ArcSwap<Snapshot>,
    first_pass: Duration,
    min_interval: Duration,
    max_interval: Duration,
    sleep_gauge: Gauge,
}

impl core::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("rules", &self.rules.len())
            .field("series", &self.current.load().len())
            .field("min_interval", &self.min_interval)
            .field("max_interval", &self.max_interval)
            .finish_non_exhaustive()
    }
}

impl RefreshScheduler {
    /// Run the first discovery pass and publish its snapshot.
    ///
    /// # Errors
    ///
    /// Fails if the first pass fails, in which case there is nothing to serve.
    pub async fn start(
        rules: Vec<Arc<CompiledRule>>,
        provider: Arc<dyn ProviderApi>,
        registry: &SinkRegistry,
    ) -> Result<Self, ExportError> {
        let sleep_gauge = registry
            .register_plain_gauge(
                "monitoring_cloudwatch_list_metrics_sleep_seconds",
                "Time to wait before the next refresh of the tracked metrics",
            )
            .map_err(|source| ExportError::Sink {
                sink: "monitoring_cloudwatch_list_metrics_sleep_seconds".to_string(),
                source,
            })?;

        let started = Instant::now();
        let snapshot = discover(&rules, provider.as_ref(), None).await?;

        Ok(Self {
            rules,
            provider,
            current: ArcSwap::from_pointee(snapshot),
            first_pass: started.elapsed(),
            min_interval: MIN_INTERVAL,
            max_interval: MAX_INTERVAL,
            sleep_gauge,
        })
    }

    /// Override the bounds of the pause between passes.
    #[must_use]
    pub const fn with_intervals(mut self, min: Duration, max: Duration) -> Self {
        self.min_interval = min;
        self.max_interval = max;
        self
    }

    /// The currently published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    /// Run one discovery pass and publish its result, returning how long the pass took.
    ///
    /// Series tracked before but not after the pass stop being exposed.
    pub async fn refresh_once(&self) -> Result<Duration, ExportError> {
        let started = Instant::now();
        let previous = self.current.load_full();
        let next = Arc::new(discover(&self.rules, self.provider.as_ref(), Some(previous.as_ref())).await?);

        let retired = self.current.swap(Arc::clone(&next));
        let mut vanished = 0_usize;
        for series in retired.vanished_from(&next) {
            series.retire();
            vanished += 1;
        }

        if vanished > 0 {
            log::info!(target: LOG_TARGET, "{vanished} series are no longer tracked");
        }

        Ok(started.elapsed())
    }

    /// Refresh forever, pausing in proportion to how long each pass takes.
    ///
    /// Returns only when a pass fails.
    pub async fn run(&self) -> Result<(), ExportError> {
        let mut last_pass = self.first_pass;

        loop {
            let pause = sleep_range(last_pass * INTERVAL_MULTIPLIER, self.min_interval, self.max_interval);
            self.sleep_gauge.set(pause.as_secs_f64());
            log::debug!(target: LOG_TARGET, "Next refresh in {:.1}s", pause.as_secs_f64());

            tokio::time::sleep(pause).await;

            last_pass = self.refresh_once().await.inspect_err(|err| {
                log::error!(target: LOG_TARGET, "Refresh failed: {err}");
            })?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::provider::{DataPage, DataQuery, DataResult, Dimension, MetricDescriptor, MetricsPage, ProviderError};
    use crate::export::retriever::{RetrievalInstruments, retrieve};
    use crate::export::rule::{ExportRule, compile};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    /// Serves one queue list per call, failing once the lists run out. Every datapoint is 9.
    #[derive(Debug)]
    struct ChangingCatalog {
        passes: Mutex<Vec<Vec<&'static str>>>,
    }

    impl ChangingCatalog {
        fn new(passes: Vec<Vec<&'static str>>) -> Self {
            let mut passes = passes;
            passes.reverse();
            Self {
                passes: Mutex::new(passes),
            }
        }
    }

    #[async_trait]
    impl ProviderApi for ChangingCatalog {
        async fn list_metrics(&self, namespace: &str, metric_name: &str, _next_token: Option<String>) -> Result<MetricsPage, ProviderError> {
            let queues = self.passes.lock().unwrap().pop().ok_or("catalog unavailable")?;

            Ok(MetricsPage {
                metrics: queues
                    .into_iter()
                    .map(|q| MetricDescriptor {
                        namespace: namespace.to_string(),
                        metric_name: metric_name.to_string(),
                        dimensions: vec![Dimension::new("QueueName", q)],
                    })
                    .collect(),
                next_token: None,
            })
        }

        async fn get_metric_data(
            &self,
            queries: &[DataQuery],
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _next_token: Option<String>,
        ) -> Result<DataPage, ProviderError> {
            Ok(DataPage {
                results: queries.iter().map(|q| (q.id.clone(), DataResult { values: vec![9.0] })).collect(),
                ..DataPage::default()
            })
        }
    }

    fn rules(registry: &SinkRegistry) -> Vec<Arc<CompiledRule>> {
        let rule = ExportRule {
            namespace: "AWS/SQS".into(),
            metric_name: "NumberOfMessagesSent".into(),
            dimensions: vec!["QueueName".into()],
            statistics: vec!["Sum".into()],
            ..ExportRule::default()
        };
        compile([rule], registry).unwrap()
    }

    fn queues(snapshot: &Snapshot) -> Vec<String> {
        snapshot.iter().map(|s| s.labels()[0].clone()).collect()
    }

    #[test]
    fn test_sleep_range() {
        let min = Duration::from_secs(5 * 60);
        let max = Duration::from_secs(60 * 60);

        assert_eq!(sleep_range(Duration::from_secs(600), min, max), Duration::from_secs(600));
        assert_eq!(sleep_range(Duration::from_secs(7200), min, max), max);
        assert_eq!(sleep_range(Duration::from_secs(1), min, max), min);
        assert_eq!(sleep_range(min, min, max), min);
        assert_eq!(sleep_range(max, min, max), max);
    }

    #[tokio::test]
    async fn test_start_publishes_first_pass() {
        let registry = SinkRegistry::new();
        let provider = Arc::new(ChangingCatalog::new(vec![vec!["a", "b"]]));

        let scheduler = RefreshScheduler::start(rules(&registry), provider, &registry).await.unwrap();
        assert_eq!(queues(&scheduler.snapshot()), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_start_fails_without_catalog() {
        let registry = SinkRegistry::new();
        let provider = Arc::new(ChangingCatalog::new(Vec::new()));

        let err = RefreshScheduler::start(rules(&registry), provider, &registry).await.unwrap_err();
        assert!(matches!(err, ExportError::Discovery { .. }));
    }

    #[tokio::test]
    async fn test_refresh_swaps_and_prunes() {
        let registry = SinkRegistry::new();
        let provider = Arc::new(ChangingCatalog::new(vec![vec!["a", "b"], vec!["b", "c"]]));
        let scheduler = RefreshScheduler::start(rules(&registry), provider, &registry).await.unwrap();

        let before = scheduler.snapshot();
        for series in before.iter() {
            series.write(3.0).unwrap();
        }

        let _ = scheduler.refresh_once().await.unwrap();

        let after = scheduler.snapshot();
        assert_eq!(queues(&after), ["b", "c"]);
        assert_eq!(after.iter().next().unwrap().last_value(), Some(3.0));

        // readers holding the old snapshot still see it whole
        assert_eq!(queues(&before), ["a", "b"]);

        let text = registry.encode_text().unwrap();
        assert!(!text.contains("queue_name=\"a\""));
        assert!(text.contains("queue_name=\"b\""));
    }

    #[tokio::test]
    async fn test_scrape_in_flight_cannot_revive_vanished_series() {
        let registry = SinkRegistry::new();
        let instruments = RetrievalInstruments::register(&registry).unwrap();
        let provider = Arc::new(ChangingCatalog::new(vec![vec!["a", "b"], vec!["b"], vec!["b"], vec!["b"]]));
        let scheduler = RefreshScheduler::start(rules(&registry), Arc::<ChangingCatalog>::clone(&provider), &registry).await.unwrap();

        // a scrape loads the snapshot, then a refresh retires 'a' before its datapoints arrive
        let in_flight = scheduler.snapshot();
        let _ = scheduler.refresh_once().await.unwrap();
        retrieve(&in_flight, Utc::now(), Duration::from_secs(60), provider.as_ref(), &instruments)
            .await
            .unwrap();

        let _ = scheduler.refresh_once().await.unwrap();
        let _ = scheduler.refresh_once().await.unwrap();

        let text = registry.encode_text().unwrap();
        assert!(!text.contains("queue_name=\"a\""), "vanished series 'a' is exposed again");
        assert!(text.contains("aws_sqs_number_of_messages_sent_sum{queue_name=\"b\"} 9"));
        assert!(in_flight.iter().next().unwrap().is_retired());
    }

    #[tokio::test]
    async fn test_run_fails_fast() {
        let registry = SinkRegistry::new();
        let provider = Arc::new(ChangingCatalog::new(vec![vec!["a"], vec!["a", "b"]]));
        let scheduler = RefreshScheduler::start(rules(&registry), provider, &registry)
            .await
            .unwrap()
            .with_intervals(Duration::from_millis(1), Duration::from_millis(5));

        let err = scheduler.run().await.unwrap_err();
        assert!(matches!(err, ExportError::Discovery { .. }));

        // the last good pass stays published
        assert_eq!(queues(&scheduler.snapshot()), ["a", "b"]);
        assert!(registry.encode_text().unwrap().contains("monitoring_cloudwatch_list_metrics_sleep_seconds"));
    }
}
