//! Error types and result definitions for reconciliation runs.
//!
//! [`DiffError`] carries a classification ([`ErrorKind`]), a static description, optional
//! dynamic detail, an optional originating error and the callsite that created it. The
//! reconciler never inspects errors beyond their kind: any failure aborts the run and is
//! handed back to the caller unchanged.

use std::borrow::Cow;
use std::error;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for datadiff operations.
pub type DiffResult<T> = Result<T, DiffError>;

/// Classification of a [`DiffError`].
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Source errors
    SourceConnectionFailed,
    SourceQueryFailed,
    SourceTimeout,
    SourceDeserializationFailed,
    SourceInvalidResponse,

    // Configuration errors
    ConfigError,
    UnsupportedDriver,

    // General errors
    InvalidData,
    IoError,
    Unknown,
}

impl ErrorKind {
    /// Returns whether this kind describes a failure to fetch from a data source.
    pub fn is_source_error(self) -> bool {
        matches!(
            self,
            ErrorKind::SourceConnectionFailed
                | ErrorKind::SourceQueryFailed
                | ErrorKind::SourceTimeout
                | ErrorKind::SourceDeserializationFailed
                | ErrorKind::SourceInvalidResponse
        )
    }

    /// Returns whether a failed fetch of this kind may succeed when attempted again.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::SourceConnectionFailed | ErrorKind::SourceTimeout
        )
    }
}

/// Main error type of the crate.
#[derive(Debug, Clone)]
pub struct DiffError {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
}

impl DiffError {
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        DiffError {
            kind,
            description,
            detail,
            source,
            location: Location::caller(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    /// Returns the callsite that created this error.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }

    /// Shorthand for `self.kind().is_source_error()`.
    pub fn is_source_error(&self) -> bool {
        self.kind.is_source_error()
    }

    /// Attaches the originating error, exposed through [`error::Error::source`].
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        self.source = Some(Arc::new(source));
        self
    }
}

impl PartialEq for DiffError {
    fn eq(&self, other: &DiffError) -> bool {
        self.kind == other.kind
            && self.description == other.description
            && self.detail == other.detail
    }
}

impl fmt::Display for DiffError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.description)?;

        if let Some(detail) = &self.detail {
            let mut lines = detail.lines();
            if let Some(first) = lines.next() {
                write!(f, ": {first}")?;
            }
            for line in lines {
                write!(f, "\n  {line}")?;
            }
        }

        Ok(())
    }
}

impl error::Error for DiffError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn error::Error + 'static))
    }
}

/// Creates a [`DiffError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for DiffError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> DiffError {
        DiffError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`DiffError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for DiffError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> DiffError {
        DiffError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

impl From<std::io::Error> for DiffError {
    #[track_caller]
    fn from(err: std::io::Error) -> DiffError {
        let detail = err.to_string();
        DiffError::from_components(
            ErrorKind::IoError,
            Cow::Borrowed("I/O operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`serde_json::Error`] into a deserialization failure of a source response.
impl From<serde_json::Error> for DiffError {
    #[track_caller]
    fn from(err: serde_json::Error) -> DiffError {
        let (kind, description) = match err.classify() {
            serde_json::error::Category::Io => (ErrorKind::IoError, "JSON I/O operation failed"),
            serde_json::error::Category::Syntax
            | serde_json::error::Category::Data
            | serde_json::error::Category::Eof => (
                ErrorKind::SourceDeserializationFailed,
                "JSON deserialization failed",
            ),
        };

        let detail = err.to_string();
        DiffError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

impl From<datadiff_config::shared::ValidationError> for DiffError {
    #[track_caller]
    fn from(err: datadiff_config::shared::ValidationError) -> DiffError {
        let kind = match &err {
            datadiff_config::shared::ValidationError::UnknownDriver(_) => {
                ErrorKind::UnsupportedDriver
            }
            _ => ErrorKind::ConfigError,
        };

        let detail = err.to_string();
        DiffError::from_components(
            kind,
            Cow::Borrowed("Invalid configuration"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(feature = "mysql")]
impl From<sqlx::Error> for DiffError {
    #[track_caller]
    fn from(err: sqlx::Error) -> DiffError {
        let kind = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed => ErrorKind::SourceConnectionFailed,
            sqlx::Error::Configuration(_) => ErrorKind::ConfigError,
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                ErrorKind::SourceDeserializationFailed
            }
            _ => ErrorKind::SourceQueryFailed,
        };

        let detail = err.to_string();
        DiffError::from_components(
            kind,
            Cow::Borrowed("Database operation failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(feature = "elasticsearch")]
impl From<reqwest::Error> for DiffError {
    #[track_caller]
    fn from(err: reqwest::Error) -> DiffError {
        let (kind, description) = if err.is_timeout() {
            (ErrorKind::SourceTimeout, "HTTP request timed out")
        } else if err.is_connect() || err.is_request() {
            (ErrorKind::SourceConnectionFailed, "HTTP request failed")
        } else if err.is_decode() {
            (
                ErrorKind::SourceDeserializationFailed,
                "HTTP response could not be decoded",
            )
        } else if err.is_status() {
            (ErrorKind::SourceQueryFailed, "HTTP request was rejected")
        } else {
            (ErrorKind::SourceQueryFailed, "HTTP request failed")
        };

        let detail = err.to_string();
        DiffError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;
    use crate::{bail, diff_error};

    fn failing() -> DiffResult<()> {
        bail!(
            ErrorKind::SourceQueryFailed,
            "Histogram query failed",
            format!("index `{}` missing", "orders")
        );
    }

    #[test]
    fn display_includes_kind_description_and_detail() {
        let err = failing().unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
        assert_eq!(
            err.to_string(),
            "[SourceQueryFailed] Histogram query failed: index `orders` missing"
        );
        assert!(err.location().file().ends_with("error.rs"));
    }

    #[test]
    fn source_is_preserved_across_clones() {
        let io = std::io::Error::other("socket closed");
        let err = diff_error!(
            ErrorKind::SourceConnectionFailed,
            "Connection lost",
            source: io
        );
        let cloned = err.clone();

        assert_eq!(err, cloned);
        assert_eq!(cloned.source().unwrap().to_string(), "socket closed");
    }

    #[test]
    fn kinds_are_grouped() {
        assert!(ErrorKind::SourceTimeout.is_source_error());
        assert!(ErrorKind::SourceTimeout.is_transient());
        assert!(ErrorKind::SourceQueryFailed.is_source_error());
        assert!(!ErrorKind::SourceQueryFailed.is_transient());
        assert!(!ErrorKind::ConfigError.is_source_error());
    }

    #[test]
    fn unknown_driver_maps_to_unsupported_driver() {
        let err: DiffError =
            datadiff_config::shared::ValidationError::UnknownDriver("redis".to_string()).into();
        assert_eq!(err.kind(), ErrorKind::UnsupportedDriver);
        assert!(err.to_string().contains("redis"));
    }
}
