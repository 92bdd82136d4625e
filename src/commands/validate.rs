use camino::{Utf8Path, Utf8PathBuf};
use clap::Parser;
use cloudwatch_exporter::Result;
use cloudwatch_exporter::config::Config;
use cloudwatch_exporter::export::{SinkRegistry, compile, names};
use ohno::IntoAppError;

#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file
    #[arg(long, short = 'c', value_name = "PATH", env = "MC_CONFIG")]
    pub config: Utf8PathBuf,
}

#[expect(clippy::unnecessary_wraps, reason = "Consistent interface with other subcommands")]
pub fn validate_config(args: &ValidateArgs) -> Result<()> {
    match describe_sinks(&args.config) {
        Ok(sinks) => {
            println!("Configuration validation successful");
            println!("Config file: {}", args.config);
            println!();
            for sink in &sinks {
                println!("   {sink}");
            }
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed: {e}");
            std::process::exit(1);
        }
    }
}

/// Compile the configuration at `path` against a scratch registry and describe every gauge it would export.
fn describe_sinks(path: &Utf8Path) -> Result<Vec<String>> {
    let config = Config::load(path)?;
    let registry = SinkRegistry::new();
    let rules = compile(config.export_rules(), &registry).into_app_err("invalid export configuration")?;

    Ok(rules
        .iter()
        .flat_map(|rule| {
            let labels = rule.dimensions().iter().map(|d| names::label_name(d)).collect::<Vec<_>>().join(", ");
            rule.stats()
                .iter()
                .map(move |stat| format!("{} {{{labels}}}", stat.sink.name()))
                .collect::<Vec<_>>()
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, contents: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::try_from(dir.path().join("config.json")).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_describe_sinks() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"{"ExportConfigs": [{
                "Namespace": "AWS/DynamoDB",
                "Name": "ConsumedReadCapacityUnits",
                "Dimensions": ["TableName", "GlobalSecondaryIndexName"],
                "Statistics": ["Sum", "Maximum"]
            }]}"#,
        );

        let sinks = describe_sinks(&path).unwrap();
        assert_eq!(
            sinks,
            [
                "aws_dynamodb_consumed_read_capacity_units_index_sum {global_secondary_index_name, table_name}",
                "aws_dynamodb_consumed_read_capacity_units_index_maximum {global_secondary_index_name, table_name}",
            ]
        );
    }

    #[test]
    fn test_describe_sinks_rejects_invalid_rule() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            r#"{"ExportConfigs": [{"Namespace": "AWS/SQS", "Name": "NumberOfMessagesSent", "Dimensions": ["QueueName"]}]}"#,
        );

        let _ = describe_sinks(&path).unwrap_err();
    }
}
