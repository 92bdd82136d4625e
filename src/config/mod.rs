//! Configuration file support
//!
//! A configuration file declares the AWS region to talk to, the address to serve metrics on and
//! the list of export rules. TOML, YAML and JSON are accepted, chosen by file extension.

#[expect(clippy::module_inception, reason = "The config type lives in its own file like every other component")]
mod config;

pub use config::{Config, DEFAULT_LISTEN_ADDRESS, ExportRuleConfig};
