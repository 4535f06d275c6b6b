//! Helpers for testing reconciliations.
//!
//! - [`test_source_wrapper`] wraps any [`crate::source::DataSource`], records the calls
//!   made against it and injects failures.
pub mod test_source_wrapper;
