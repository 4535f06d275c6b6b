//! Data sources queried by the reconciler.
//!
//! [`DataSource`] is the contract every backend implements. [`AnySource`] selects a
//! backend from configuration, and [`TimeoutSource`] and [`RetryingSource`] add deadlines
//! and retries on top of any source.

mod any;
mod base;
#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;
pub mod memory;
#[cfg(feature = "mysql")]
pub mod mysql;
mod retry;
mod timeout;

pub use any::{AnySource, ConfiguredSource};
pub use base::DataSource;
pub use memory::MemorySource;
pub use retry::RetryingSource;
pub use timeout::TimeoutSource;
