//! cloudwatch-exporter crate
//!
//! This crate is an implementation detail of the `cloudwatch-exporter` tool. It discovers
//! CloudWatch time-series matching a declarative set of export rules and republishes their
//! most recent values as Prometheus gauges.
//!
//! # Module Organization
//!
//! - [`config`]: Configuration file loading
//! - [`export`]: Rule compilation, discovery, retrieval and background refresh
//! - `cloudwatch`: The AWS CloudWatch binding of [`export::ProviderApi`]

/// Result type alias using `ohno::AppError` as the default error type.
pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

#[cfg(feature = "aws")]
pub mod cloudwatch;

pub mod config;

pub mod export;
