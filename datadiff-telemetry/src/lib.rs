//! Logging setup shared by the datadiff binary and test suites.

pub mod tracing;
