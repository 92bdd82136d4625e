//! Command-line interface of the exporter
//!
//! # Implementation Model
//!
//! - **serve**: Load the configuration, compile the export rules, run the first discovery pass
//!   and serve `/metrics` while the refresh scheduler keeps the tracked series current
//! - **validate**: Load the configuration and compile the export rules against a scratch
//!   registry, listing the gauges that would be exported without contacting AWS
//!
//! The `common` module holds the logging setup shared by both commands.

mod common;
mod serve;
mod validate;

pub use serve::{ServeArgs, serve};
pub use validate::{ValidateArgs, validate_config};
