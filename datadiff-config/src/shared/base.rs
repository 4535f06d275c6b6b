use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside its allowed domain.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// The starting interval is not one of the supported powers of ten.
    #[error("Unsupported initial interval {0}: must be one of 10, 100, 1000, 10000")]
    UnsupportedInterval(i64),
    /// No data source is registered under the driver name.
    #[error("No data source matching driver `{0}`")]
    UnknownDriver(String),
    /// Driver-specific options could not be parsed.
    #[error("Invalid options for driver `{driver}`: {reason}")]
    InvalidSourceOptions { driver: String, reason: String },
}

impl ValidationError {
    pub(crate) fn invalid_field(field: impl Into<String>, constraint: impl Into<String>) -> Self {
        ValidationError::InvalidFieldValue {
            field: field.into(),
            constraint: constraint.into(),
        }
    }
}
