//! Configuration types and loading for datadiff.
//!
//! The [`shared`] module holds the typed configuration consumed by the core crate and the
//! binary. [`load_config`] builds any [`Config`] implementor from layered files and
//! `APP_`-prefixed environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::Environment;
pub use load::{Config, LoadConfigError, load_config, load_config_from};
