use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{DiffError, DiffResult};
use crate::histogram::{Histogram, RecordId};
use crate::source::DataSource;

/// A call received by a [`TestSourceWrapper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceCall {
    HistogramAll {
        interval: i64,
    },
    HistogramRange {
        gte: RecordId,
        lt: RecordId,
        interval: i64,
    },
    IdRange {
        gte: RecordId,
        lt: RecordId,
    },
}

type FailureCondition = Box<dyn Fn(&SourceCall) -> bool + Send + Sync>;

struct Inner<S> {
    wrapped_source: S,
    calls: Vec<SourceCall>,
    failures: Vec<(FailureCondition, DiffError)>,
}

/// Test wrapper for [`DataSource`] implementations that tracks every call.
///
/// Calls are recorded before they are forwarded, including calls that fail. Failures
/// registered with [`TestSourceWrapper::fail_when`] are returned instead of forwarding the
/// call to the wrapped source.
#[derive(Clone)]
pub struct TestSourceWrapper<S> {
    name: &'static str,
    inner: Arc<RwLock<Inner<S>>>,
}

impl<S> fmt::Debug for TestSourceWrapper<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSourceWrapper")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<S> TestSourceWrapper<S>
where
    S: DataSource + Clone,
{
    pub fn wrap(source: S) -> Self {
        let name = source.name();
        let inner = Inner {
            wrapped_source: source,
            calls: Vec::new(),
            failures: Vec::new(),
        };

        Self {
            name,
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Returns every call received so far, in arrival order.
    pub async fn calls(&self) -> Vec<SourceCall> {
        self.inner.read().await.calls.clone()
    }

    pub async fn calls_count(&self) -> usize {
        self.inner.read().await.calls.len()
    }

    /// Makes every call matching `condition` fail with `error`.
    pub async fn fail_when<F>(&self, condition: F, error: DiffError)
    where
        F: Fn(&SourceCall) -> bool + Send + Sync + 'static,
    {
        self.inner
            .write()
            .await
            .failures
            .push((Box::new(condition), error));
    }

    /// Makes every full-range histogram fetch fail with `error`.
    pub async fn fail_histogram_all(&self, error: DiffError) {
        self.fail_when(
            |call| matches!(call, SourceCall::HistogramAll { .. }),
            error,
        )
        .await
    }

    /// Records `call` and returns either the wrapped source or the injected failure.
    async fn intercept(&self, call: SourceCall) -> DiffResult<S> {
        let mut inner = self.inner.write().await;
        inner.calls.push(call);

        if let Some((_, error)) = inner
            .failures
            .iter()
            .find(|(condition, _)| condition(&call))
        {
            return Err(error.clone());
        }

        Ok(inner.wrapped_source.clone())
    }
}

impl<S> DataSource for TestSourceWrapper<S>
where
    S: DataSource + Clone + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch_histogram_all(&self, interval: i64) -> DiffResult<Histogram> {
        let source = self
            .intercept(SourceCall::HistogramAll { interval })
            .await?;

        source.fetch_histogram_all(interval).await
    }

    async fn fetch_histogram_range(
        &self,
        gte: RecordId,
        lt: RecordId,
        interval: i64,
    ) -> DiffResult<Histogram> {
        let source = self
            .intercept(SourceCall::HistogramRange { gte, lt, interval })
            .await?;

        source.fetch_histogram_range(gte, lt, interval).await
    }

    async fn fetch_id_range(&self, gte: RecordId, lt: RecordId) -> DiffResult<Vec<RecordId>> {
        let source = self.intercept(SourceCall::IdRange { gte, lt }).await?;

        source.fetch_id_range(gte, lt).await
    }
}
