use std::future::Future;
use std::time::Duration;

use crate::diff_error;
use crate::error::{DiffResult, ErrorKind};
use crate::histogram::{Histogram, RecordId};
use crate::source::DataSource;

/// Bounds every call made against the wrapped source by a fixed deadline.
///
/// An expired call fails with [`ErrorKind::SourceTimeout`] and the in-flight request is
/// dropped.
#[derive(Debug, Clone)]
pub struct TimeoutSource<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutSource<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S> TimeoutSource<S>
where
    S: DataSource + Sync,
{
    async fn with_deadline<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = DiffResult<T>>,
    ) -> DiffResult<T> {
        match tokio::time::timeout(self.timeout, future).await {
            Ok(result) => result,
            Err(_) => Err(diff_error!(
                ErrorKind::SourceTimeout,
                "Source did not answer in time",
                format!(
                    "{} `{operation}` exceeded {}ms",
                    self.inner.name(),
                    self.timeout.as_millis()
                )
            )),
        }
    }
}

impl<S> DataSource for TimeoutSource<S>
where
    S: DataSource + Sync,
{
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_histogram_all(&self, interval: i64) -> DiffResult<Histogram> {
        self.with_deadline(
            "fetch_histogram_all",
            self.inner.fetch_histogram_all(interval),
        )
        .await
    }

    async fn fetch_histogram_range(
        &self,
        gte: RecordId,
        lt: RecordId,
        interval: i64,
    ) -> DiffResult<Histogram> {
        self.with_deadline(
            "fetch_histogram_range",
            self.inner.fetch_histogram_range(gte, lt, interval),
        )
        .await
    }

    async fn fetch_id_range(&self, gte: RecordId, lt: RecordId) -> DiffResult<Vec<RecordId>> {
        self.with_deadline("fetch_id_range", self.inner.fetch_id_range(gte, lt))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    #[derive(Debug, Clone)]
    struct StalledSource;

    impl DataSource for StalledSource {
        fn name(&self) -> &'static str {
            "stalled"
        }

        async fn fetch_histogram_all(&self, _interval: i64) -> DiffResult<Histogram> {
            std::future::pending().await
        }

        async fn fetch_histogram_range(
            &self,
            _gte: RecordId,
            _lt: RecordId,
            _interval: i64,
        ) -> DiffResult<Histogram> {
            std::future::pending().await
        }

        async fn fetch_id_range(&self, _gte: RecordId, _lt: RecordId) -> DiffResult<Vec<RecordId>> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetch_times_out() {
        let source = TimeoutSource::new(StalledSource, Duration::from_millis(50));

        let err = source.fetch_histogram_all(10).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::SourceTimeout);
        assert!(err.detail().unwrap().contains("stalled `fetch_histogram_all`"));
    }

    #[tokio::test]
    async fn fast_fetch_passes_through() {
        let source = TimeoutSource::new(MemorySource::new([1, 2]), Duration::from_secs(1));

        assert_eq!(source.fetch_id_range(0, 10).await.unwrap(), vec![1, 2]);
        assert_eq!(source.name(), "memory");
    }
}
