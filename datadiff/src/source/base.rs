use std::future::Future;

use crate::error::DiffResult;
use crate::histogram::{Histogram, RecordId};

/// A store holding one copy of the integer-keyed dataset being reconciled.
///
/// [`DataSource`] implementations translate the three queries the reconciler needs into
/// the backend's query language. Ranges are half open: `gte` is included, `lt` is not.
/// Returned bins and identifiers need not be sorted.
///
/// Sources are cloned into every concurrently scanned branch and must therefore be cheap
/// to clone, typically by sharing a connection pool or HTTP client.
///
/// Failures are reported as a [`crate::error::DiffError`] with one of the source error
/// kinds. The reconciler does not retry; wrap the source in
/// [`crate::source::RetryingSource`] for that.
pub trait DataSource {
    /// Returns the driver name of the source, used in logs.
    fn name(&self) -> &'static str;

    /// Counts every record into bins of width `interval`.
    fn fetch_histogram_all(
        &self,
        interval: i64,
    ) -> impl Future<Output = DiffResult<Histogram>> + Send;

    /// Counts the records in `[gte, lt)` into bins of width `interval`.
    fn fetch_histogram_range(
        &self,
        gte: RecordId,
        lt: RecordId,
        interval: i64,
    ) -> impl Future<Output = DiffResult<Histogram>> + Send;

    /// Lists the identifiers in `[gte, lt)`.
    fn fetch_id_range(
        &self,
        gte: RecordId,
        lt: RecordId,
    ) -> impl Future<Output = DiffResult<Vec<RecordId>>> + Send;
}
