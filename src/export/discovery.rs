use super::error::ExportError;
use super::matcher::{includes, label_values, sorted_dimensions};
use super::provider::{MetricDescriptor, ProviderApi};
use super::rule::CompiledRule;
use super::snapshot::{MetricRef, SeriesId, SeriesKey, Snapshot, TrackedSeries};
use std::sync::Arc;

/// Log target for discovery
const LOG_TARGET: &str = " discovery";

/// Find every series the rules select and build a snapshot of them.
///
/// Each accepted metric yields one series per statistic of its rule. When `previous` tracks the
/// same metric and statistic, its last value is carried over so that the `Prior` default keeps
/// working across passes. Any listing failure fails the whole pass.
pub async fn discover(rules: &[Arc<CompiledRule>], provider: &dyn ProviderApi, previous: Option<&Snapshot>) -> Result<Snapshot, ExportError> {
    let start_time = std::time::Instant::now();
    let mut series = Vec::new();

    for rule in rules {
        let metrics = list_all(rule, provider).await?;
        let listed = metrics.len();
        let before = series.len();

        for metric in metrics.iter().filter(|m| includes(rule, m)) {
            let labels = label_values(rule, metric);
            let metric_ref = MetricRef {
                namespace: metric.namespace.clone(),
                metric_name: metric.metric_name.clone(),
                dimensions: sorted_dimensions(metric),
            };

            for stat in rule.stats() {
                let key = SeriesKey {
                    metric: metric_ref.clone(),
                    statistic: stat.statistic.clone(),
                };
                let last_value = previous.and_then(|p| p.find(&key)).and_then(TrackedSeries::last_value);

                series.push(TrackedSeries::new(
                    SeriesId::from_index(series.len()),
                    key,
                    stat.transform.clone(),
                    stat.stat_default,
                    stat.sink.clone(),
                    labels.clone(),
                    last_value,
                ));
            }
        }

        log::debug!(
            target: LOG_TARGET,
            "{}/{}: {} metrics listed, {} series tracked",
            rule.namespace(),
            rule.metric_name(),
            listed,
            series.len() - before
        );
    }

    log::info!(
        target: LOG_TARGET,
        "Discovered {} series for {} rules in {:.3}s",
        series.len(),
        rules.len(),
        start_time.elapsed().as_secs_f64()
    );

    Ok(Snapshot::new(series))
}

async fn list_all(rule: &CompiledRule, provider: &dyn ProviderApi) -> Result<Vec<MetricDescriptor>, ExportError> {
    let mut metrics = Vec::new();
    let mut next_token = None;

    loop {
        let page = provider
            .list_metrics(rule.namespace(), rule.metric_name(), next_token)
            .await
            .map_err(|source| ExportError::Discovery {
                namespace: rule.namespace().to_string(),
                name: rule.metric_name().to_string(),
                source,
            })?;

        metrics.extend(page.metrics);

        match page.next_token {
            Some(token) => next_token = Some(token),
            None => return Ok(metrics),
        }
    }
}
