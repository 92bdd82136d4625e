use crate::export::{
    DataPage, DataQuery, DataResult, DiagnosticMessage, Dimension, MetricDescriptor, MetricsPage, ProviderApi, ProviderError,
};
use async_trait::async_trait;
use aws_sdk_cloudwatch::Client;
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::{Dimension as AwsDimension, Metric, MetricDataQuery, MetricStat};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Log target for the CloudWatch client
const LOG_TARGET: &str = "cloudwatch";

/// A CloudWatch client for one region.
#[derive(Debug, Clone)]
pub struct CloudWatch {
    client: Client,
}

impl CloudWatch {
    /// Build a client from the ambient AWS configuration, optionally pinned to `region`.
    pub async fn new(region: Option<String>) -> Self {
        let mut config_loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = region {
            config_loader = config_loader.region(aws_sdk_cloudwatch::config::Region::new(region));
        }

        let config = config_loader.load().await;
        log::debug!(target: LOG_TARGET, "CloudWatch client configured for region {:?}", config.region());

        Self {
            client: Client::new(&config),
        }
    }
}

fn to_query(query: &DataQuery) -> Result<MetricDataQuery, ProviderError> {
    let dimensions = query
        .metric
        .dimensions
        .iter()
        .map(|d| AwsDimension::builder().name(&d.name).value(&d.value).build())
        .collect::<Vec<_>>();

    let metric = Metric::builder()
        .namespace(&query.metric.namespace)
        .metric_name(&query.metric.metric_name)
        .set_dimensions(Some(dimensions))
        .build();

    let stat = MetricStat::builder()
        .metric(metric)
        .period(i32::try_from(query.period.as_secs())?)
        .stat(&query.statistic)
        .build();

    Ok(MetricDataQuery::builder()
        .id(&query.id)
        .metric_stat(stat)
        .return_data(true)
        .build())
}

#[async_trait]
impl ProviderApi for CloudWatch {
    async fn list_metrics(&self, namespace: &str, metric_name: &str, next_token: Option<String>) -> Result<MetricsPage, ProviderError> {
        let output = self
            .client
            .list_metrics()
            .namespace(namespace)
            .metric_name(metric_name)
            .set_next_token(next_token)
            .send()
            .await?;

        let metrics = output
            .metrics()
            .iter()
            .map(|m| MetricDescriptor {
                namespace: m.namespace().unwrap_or(namespace).to_string(),
                metric_name: m.metric_name().unwrap_or(metric_name).to_string(),
                dimensions: m.dimensions().iter().map(|d| Dimension::new(d.name(), d.value())).collect(),
            })
            .collect();

        Ok(MetricsPage {
            metrics,
            next_token: output.next_token().map(ToString::to_string),
        })
    }

    async fn get_metric_data(
        &self,
        queries: &[DataQuery],
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        next_token: Option<String>,
    ) -> Result<DataPage, ProviderError> {
        let queries = queries.iter().map(to_query).collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .get_metric_data()
            .set_metric_data_queries(Some(queries))
            .start_time(AwsDateTime::from_secs(start.timestamp()))
            .end_time(AwsDateTime::from_secs(end.timestamp()))
            .set_next_token(next_token)
            .send()
            .await?;

        let results: HashMap<String, DataResult> = output
            .metric_data_results()
            .iter()
            .filter_map(|r| {
                r.id().map(|id| {
                    (
                        id.to_string(),
                        DataResult {
                            values: r.values().to_vec(),
                        },
                    )
                })
            })
            .collect();

        let messages = output
            .messages()
            .iter()
            .map(|m| DiagnosticMessage {
                code: m.code().unwrap_or_default().to_string(),
                value: m.value().unwrap_or_default().to_string(),
            })
            .collect();

        Ok(DataPage {
            results,
            messages,
            next_token: output.next_token().map(ToString::to_string),
        })
    }
}
