use crate::Result;
use crate::export::{ExportRule, StatDefault};
use camino::Utf8Path;
use ohno::{IntoAppError, app_err};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fs;

/// Log target for configuration loading
const LOG_TARGET: &str = "    config";

/// Address the metrics endpoint listens on unless configured otherwise
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0:8080";

fn default_listen_address() -> String {
    DEFAULT_LISTEN_ADDRESS.to_string()
}

/// Top-level configuration of the exporter.
///
/// Keys are `PascalCase` so that existing JSON configurations load unchanged.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct Config {
    /// AWS region to query; the SDK's default resolution applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Log at debug level unless a more specific level is requested.
    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_listen_address")]
    pub listen_address: String,

    #[serde(default)]
    pub export_configs: Vec<ExportRuleConfig>,
}

/// One export rule as written in a configuration file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct ExportRuleConfig {
    pub namespace: String,
    pub name: String,

    #[serde(default)]
    pub dimensions: Vec<String>,

    #[serde(default)]
    pub statistics: Vec<String>,

    #[serde(default)]
    pub dimensions_match: BTreeMap<String, String>,

    #[serde(default)]
    pub dimensions_no_match: BTreeMap<String, String>,

    /// `Prior`, `Zero` or `NaN`; empty means `Prior`.
    #[serde(default, deserialize_with = "deserialize_stat_default")]
    pub stat_default: StatDefault,
}

fn deserialize_stat_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<StatDefault, D::Error> {
    let text = String::deserialize(deserializer)?;
    if text.is_empty() {
        return Ok(StatDefault::default());
    }

    text.parse()
        .map_err(|_parse_err| serde::de::Error::custom("StatDefault must be one of Prior, Zero, or NaN"))
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: None,
            debug: false,
            listen_address: default_listen_address(),
            export_configs: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML, YAML or JSON file, picked by extension
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed
    pub fn load(path: &Utf8Path) -> Result<Self> {
        let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration from {path}"))?;

        let extension = path.extension().unwrap_or_default();
        let config: Self = match extension {
            "toml" => toml::from_str(&text).into_app_err_with(|| format!("parsing TOML configuration from {path}"))?,
            "yml" | "yaml" => serde_yaml::from_str(&text).into_app_err_with(|| format!("parsing YAML configuration from {path}"))?,
            "json" => serde_json::from_str(&text).into_app_err_with(|| format!("parsing JSON configuration from {path}"))?,
            _ => return Err(app_err!("unsupported configuration file extension: {extension}")),
        };

        log::debug!(target: LOG_TARGET, "Loaded {} export rules from {path}", config.export_configs.len());
        Ok(config)
    }

    /// The export rules declared by this configuration, ready to be compiled.
    #[must_use]
    pub fn export_rules(&self) -> Vec<ExportRule> {
        self.export_configs.iter().map(ExportRuleConfig::to_rule).collect()
    }
}

impl ExportRuleConfig {
    #[must_use]
    pub fn to_rule(&self) -> ExportRule {
        ExportRule {
            namespace: self.namespace.clone(),
            metric_name: self.name.clone(),
            dimensions: self.dimensions.clone(),
            statistics: self.statistics.clone(),
            dimensions_match: self.dimensions_match.clone(),
            dimensions_no_match: self.dimensions_no_match.clone(),
            stat_default: self.stat_default,
            ..ExportRule::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> Utf8PathBuf {
        let path = Utf8PathBuf::try_from(dir.path().join(name)).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_json() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.json",
            r#"{
                "Region": "us-west-2",
                "Debug": true,
                "ExportConfigs": [
                    {
                        "Namespace": "AWS/SQS",
                        "Name": "ApproximateAgeOfOldestMessage",
                        "Dimensions": ["QueueName"],
                        "Statistics": ["Maximum"],
                        "DimensionsNoMatch": {"QueueName": "(dev|staging)"},
                        "StatDefault": "Zero"
                    },
                    {
                        "Namespace": "AWS/ELB",
                        "Name": "HTTPCode_ELB_5XX",
                        "Dimensions": ["LoadBalancerName"],
                        "Statistics": ["Sum"],
                        "StatDefault": ""
                    }
                ]
            }"#,
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.region.as_deref(), Some("us-west-2"));
        assert!(config.debug);
        assert_eq!(config.listen_address, DEFAULT_LISTEN_ADDRESS);

        let rules = config.export_rules();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].namespace, "AWS/SQS");
        assert_eq!(rules[0].metric_name, "ApproximateAgeOfOldestMessage");
        assert_eq!(rules[0].dimensions_no_match["QueueName"], "(dev|staging)");
        assert_eq!(rules[0].stat_default, StatDefault::Zero);
        assert_eq!(rules[1].stat_default, StatDefault::Prior);
        assert!(rules[1].transform.is_empty());
        assert!(rules[1].sinks.is_empty());
    }

    #[test]
    fn test_load_yaml() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.yml",
            "ListenAddress: \"127.0.0.1:9100\"\n\
             ExportConfigs:\n\
             - Namespace: AWS/DynamoDB\n\
             \x20 Name: ConsumedReadCapacityUnits\n\
             \x20 Dimensions: [TableName, GlobalSecondaryIndexName]\n\
             \x20 Statistics: [Sum]\n\
             \x20 StatDefault: \"NaN\"\n",
        );

        let config = Config::load(&path).unwrap();
        assert_eq!(config.listen_address, "127.0.0.1:9100");
        assert_eq!(config.region, None);
        assert!(!config.debug);
        assert_eq!(config.export_configs[0].stat_default, StatDefault::NaN);
        assert_eq!(config.export_configs[0].dimensions, ["TableName", "GlobalSecondaryIndexName"]);
    }

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.toml",
            r#"
                Region = "eu-central-1"

                [[ExportConfigs]]
                Namespace = "AWS/RDS"
                Name = "CPUUtilization"
                Dimensions = ["DBInstanceIdentifier"]
                Statistics = ["Average", "Maximum"]

                [ExportConfigs.DimensionsMatch]
                DBInstanceIdentifier = "^prod-"
            "#,
        );

        let config = Config::load(&path).unwrap();
        let rules = config.export_rules();
        assert_eq!(rules[0].statistics, ["Average", "Maximum"]);
        assert_eq!(rules[0].dimensions_match["DBInstanceIdentifier"], "^prod-");
        assert_eq!(rules[0].stat_default, StatDefault::Prior);
    }

    #[test]
    fn test_invalid_stat_default() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "config.json",
            r#"{"ExportConfigs": [{"Namespace": "AWS/SQS", "Name": "X", "Statistics": ["Sum"], "StatDefault": "Last"}]}"#,
        );

        let _ = Config::load(&path).unwrap_err();

        let err = serde_json::from_str::<Config>(&fs::read_to_string(&path).unwrap()).unwrap_err();
        assert!(err.to_string().contains("StatDefault must be one of Prior, Zero, or NaN"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.json", r#"{"Regoin": "us-east-1"}"#);

        let _ = Config::load(&path).unwrap_err();
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "config.ini", "Region=us-east-1");

        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("unsupported configuration file extension: ini"));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().join("absent.json")).unwrap();

        let _ = Config::load(&path).unwrap_err();
    }

    #[test]
    fn test_default() {
        let config = Config::default();
        assert_eq!(config.listen_address, "0.0.0.0:8080");
        assert!(config.export_rules().is_empty());
    }
}
