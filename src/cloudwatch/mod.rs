//! AWS CloudWatch access for the exporter.
//!
//! [`CloudWatch`] implements [`ProviderApi`](crate::export::ProviderApi) over the AWS SDK, using
//! the SDK's standard credential and region resolution. Requests are sent as-is; pagination and
//! batching are driven by the export engine.

mod provider;

pub use provider::CloudWatch;
