//! Translation of CloudWatch metric names into Prometheus metric names.

use std::sync::LazyLock;

/// Runs of characters that separate independent chunks of a metric name.
static NON_ALPHANUMERIC: LazyLock<regex::Regex> = LazyLock::new(|| regex::Regex::new("[^a-zA-Z0-9]+").expect("invalid regex"));

/// An optional uppercase/digit run followed by an optional lowercase run.
static PASCAL_CASE_WORD: LazyLock<regex::Regex> = LazyLock::new(|| regex::Regex::new("([A-Z0-9]*)([a-z]*)").expect("invalid regex"));

/// Infixes that keep same-named metrics at different scopes of a service apart.
///
/// When a rule's namespace matches and its dimensions include the given dimension, the infix
/// is inserted between the metric name and the statistic before translation.
static SCOPE_DECORATIONS: &[ScopeDecoration] = &[
    ScopeDecoration {
        namespace: "AWS/DynamoDB",
        dimension: "GlobalSecondaryIndexName",
        infix: "Index",
    },
    ScopeDecoration {
        namespace: "AWS/RDS",
        dimension: "DBClusterIdentifier",
        infix: "Cluster",
    },
    ScopeDecoration {
        namespace: "AWS/RDS",
        dimension: "DBInstanceIdentifier",
        infix: "Instance",
    },
];

#[derive(Debug, Clone, Copy)]
struct ScopeDecoration {
    namespace: &'static str,
    dimension: &'static str,
    infix: &'static str,
}

/// Translate a `SequenceOfPascalCaseWords` CloudWatch name into `sequence_of_pascal_case_words`.
///
/// Acronyms stay together (`CPUAllocated` becomes `cpu_allocated`), including pluralized ones
/// (`ConsumedLCUs` becomes `consumed_lcus`), and any non-alphanumeric run acts as a separator.
#[must_use]
pub fn translate(name: &str) -> String {
    let mut words: Vec<&str> = Vec::new();

    for chunk in NON_ALPHANUMERIC.split(name) {
        for captures in PASCAL_CASE_WORD.captures_iter(chunk) {
            let (word, [upper, lower]) = captures.extract();
            if word.is_empty() {
                continue;
            }

            let is_acronym = upper.len() >= 2;
            let is_pluralized = lower == "s";
            let has_adjacent_word = !lower.is_empty();

            if is_acronym && has_adjacent_word && !is_pluralized {
                // the last uppercase character starts the next word, as in "ADAnomaly"
                let split = upper.len() - 1;
                words.push(upper.split_at(split).0);
                words.push(word.split_at(split).1);
            } else {
                words.push(word);
            }
        }
    }

    words.join("_").to_lowercase()
}

/// The scope infix for a metric of `namespace` reported with `dimensions`, if any.
fn scope_infix(namespace: &str, dimensions: &[String]) -> Option<&'static str> {
    SCOPE_DECORATIONS
        .iter()
        .find(|d| d.namespace == namespace && dimensions.iter().any(|dim| dim == d.dimension))
        .map(|d| d.infix)
}

/// The Prometheus name of the gauge exporting `statistic` of a CloudWatch metric.
///
/// The namespace becomes a lower-cased prefix (`AWS/SQS` becomes `aws_sqs`) and the rest is
/// the translated concatenation of metric name, scope infix and statistic.
#[must_use]
pub fn sink_name(namespace: &str, metric_name: &str, dimensions: &[String], statistic: &str) -> String {
    let infix = scope_infix(namespace, dimensions).unwrap_or_default();
    let prefix: String = namespace
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();

    format!("{prefix}_{}", translate(&format!("{metric_name}{infix}{statistic}")))
}

/// The Prometheus label name for a CloudWatch dimension name.
#[must_use]
pub fn label_name(dimension: &str) -> String {
    translate(dimension)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate() {
        let cases = [
            ("AllErrors", "all_errors"),
            ("2xx", "2xx"),
            ("4xxErrors", "4xx_errors"),
            ("DescribeDeliveryStream.Requests", "describe_delivery_stream_requests"),
            (
                "DesyncMitigationMode_NonCompliant_Request_Count",
                "desync_mitigation_mode_non_compliant_request_count",
            ),
            ("ClusterStatus.red", "cluster_status_red"),
            ("ActiveFlowCount_TCP", "active_flow_count_tcp"),
            (
                "ADAnomalyDetectorsIndexStatusIndexExists",
                "ad_anomaly_detectors_index_status_index_exists",
            ),
            ("ADAnomalyDetectorsIndexStatus.red", "ad_anomaly_detectors_index_status_red"),
            ("ConsumedLCUs", "consumed_lcus"),
            ("ConsumedLCUs_TCP", "consumed_lcus_tcp"),
            ("AuroraDMLRejectedMasterFull", "aurora_dml_rejected_master_full"),
            ("CPUAllocated", "cpu_allocated"),
            (
                "dfs.FSNamesystem.PendingReplicationBlocks",
                "dfs_fs_namesystem_pending_replication_blocks",
            ),
            ("HTTPCode_ELB_5XX", "http_code_elb_5xx"),
        ];

        for (input, expected) in cases {
            assert_eq!(translate(input), expected, "translate({input:?})");
        }
    }

    #[test]
    fn test_translate_edge_cases() {
        assert_eq!(translate(""), "");
        assert_eq!(translate("..."), "");
        assert_eq!(translate("TCP"), "tcp");
        assert_eq!(translate("CPUs"), "cpus");
    }

    #[test]
    fn test_sink_name() {
        let dims = vec!["QueueName".to_string()];
        assert_eq!(
            sink_name("AWS/SQS", "ApproximateAgeOfOldestMessage", &dims, "Maximum"),
            "aws_sqs_approximate_age_of_oldest_message_maximum"
        );
    }

    #[test]
    fn test_sink_name_scope_decoration() {
        let table_dims = vec!["TableName".to_string()];
        let index_dims = vec!["GlobalSecondaryIndexName".to_string(), "TableName".to_string()];

        assert_eq!(
            sink_name("AWS/DynamoDB", "ConsumedReadCapacityUnits", &table_dims, "Sum"),
            "aws_dynamodb_consumed_read_capacity_units_sum"
        );
        assert_eq!(
            sink_name("AWS/DynamoDB", "ConsumedReadCapacityUnits", &index_dims, "Sum"),
            "aws_dynamodb_consumed_read_capacity_units_index_sum"
        );

        let cluster_dims = vec!["DBClusterIdentifier".to_string()];
        assert_eq!(
            sink_name("AWS/RDS", "CPUUtilization", &cluster_dims, "Average"),
            "aws_rds_cpu_utilization_cluster_average"
        );

        // the dimension alone does not trigger decoration outside its namespace
        assert_eq!(
            sink_name("Custom/Ddb", "Reads", &index_dims, "Sum"),
            "custom_ddb_reads_sum"
        );
    }

    #[test]
    fn test_label_name() {
        assert_eq!(label_name("QueueName"), "queue_name");
        assert_eq!(label_name("GlobalSecondaryIndexName"), "global_secondary_index_name");
        assert_eq!(label_name("DBInstanceIdentifier"), "db_instance_identifier");
    }
}
