//! Histogram-driven reconciliation of two integer-keyed record stores.
//!
//! Both stores are asked for histograms of their record identifiers. Bins holding as many
//! records as their width on both sides are assumed to match; every other bin is scanned
//! again with narrower bins until single identifiers can be compared. Only the ranges that
//! differ are ever listed identifier by identifier.
//!
//! ```rust,no_run
//! use datadiff::config::ReconcileConfig;
//! use datadiff::reconcile::Reconciler;
//! use datadiff::report::WriterSink;
//! use datadiff::source::MemorySource;
//!
//! # #[tokio::main]
//! # async fn main() -> datadiff::error::DiffResult<()> {
//! let primary = MemorySource::contiguous(0, 10_000);
//! let secondary = MemorySource::new((0..10_000).filter(|id| *id != 4_242));
//!
//! let reconciler = Reconciler::new(
//!     primary,
//!     secondary,
//!     ReconcileConfig::default(),
//!     WriterSink::new(tokio::io::stdout()),
//! );
//!
//! // Prints `4242,-1`.
//! let summary = reconciler.run().await?;
//! assert_eq!(summary.only_primary, 1);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod differ;
pub mod error;
pub mod histogram;
mod macros;
pub mod reconcile;
pub mod report;
pub mod source;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
