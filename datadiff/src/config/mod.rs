//! Configuration objects for reconciliation runs.
//!
//! This module contains re-exported configurations that are consumed by the reconciler and
//! the data sources.

// Re-exports.
pub use datadiff_config::shared::*;
