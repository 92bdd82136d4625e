//! Exports AWS CloudWatch metrics as Prometheus gauges.
//!
//! # Overview
//!
//! `cloudwatch-exporter` reads a list of export rules, discovers every CloudWatch metric that
//! matches them, and serves their latest datapoints on a Prometheus `/metrics` endpoint. The set
//! of matching metrics is refreshed in the background; datapoints are fetched on every scrape.
//!
//! # Quick Start
//!
//! ```bash
//! cloudwatch-exporter serve --config exporter.json
//! ```
//!
//! The configuration path may also be supplied through the `MC_CONFIG` environment variable.
//!
//! # Configuration
//!
//! Configurations may be written in JSON, YAML or TOML. Keys are `PascalCase`:
//!
//! ```json
//! {
//!     "Region": "us-east-1",
//!     "ListenAddress": "0.0.0.0:8080",
//!     "ExportConfigs": [
//!         {
//!             "Namespace": "AWS/SQS",
//!             "Name": "ApproximateAgeOfOldestMessage",
//!             "Dimensions": ["QueueName"],
//!             "Statistics": ["Maximum"],
//!             "DimensionsNoMatch": { "QueueName": "-dev$" },
//!             "StatDefault": "Zero"
//!         }
//!     ]
//! }
//! ```
//!
//! Each rule exports one gauge per statistic, named after the namespace, the metric and the
//! statistic (`aws_sqs_approximate_age_of_oldest_message_maximum` above), with one label per
//! dimension. `DimensionsMatch` and `DimensionsNoMatch` filter discovered metrics by regular
//! expression. `StatDefault` decides what a gauge shows when CloudWatch has no datapoint for it:
//!
//! - `Prior` (the default) keeps the last value.
//! - `Zero` writes 0.
//! - `NaN` writes NaN.
//!
//! # Checking a Configuration
//!
//! ```bash
//! cloudwatch-exporter validate --config exporter.json
//! ```
//!
//! This compiles every rule without contacting AWS and lists the gauges that would be exported.
//!
//! # Endpoints
//!
//! - `/metrics` queries CloudWatch for the most recent complete minute and returns every gauge in
//!   the Prometheus text format. The response is a 500 if CloudWatch could not be queried.
//! - `/health` always returns 200.

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use cloudwatch_exporter::Result;

mod commands;

use crate::commands::{ServeArgs, ValidateArgs, serve, validate_config};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "cloudwatch-exporter", version, about)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve CloudWatch metrics to Prometheus
    Serve(ServeArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    match &Cli::parse().command {
        Command::Serve(serve_args) => serve(serve_args).await,
        Command::Validate(validate_args) => validate_config(validate_args),
    }
}
