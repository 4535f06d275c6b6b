//! Shared configuration types for datadiff runs.

mod base;
mod diff;
mod fetch;
mod source;

pub use base::ValidationError;
pub use diff::{DiffConfig, InitialInterval, ReconcileConfig};
pub use fetch::{FetchConfig, RetryConfig};
pub use source::SourceConfig;
