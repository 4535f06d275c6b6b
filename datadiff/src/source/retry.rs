use std::future::Future;
use std::time::Duration;
use datadiff_config::shared::RetryConfig;
use rand::Rng;
use tracing::{info, warn};

use crate::error::DiffResult;
use crate::histogram::{Histogram, RecordId};
use crate::source::DataSource;

/// Maximum share of the backoff delay added as random jitter.
const MAX_JITTER_FACTOR: f64 = 0.3;

/// Retries transient failures of the wrapped source with exponential backoff.
///
/// Only connection failures and timeouts are retried. Any other error, and the last error
/// once [`RetryConfig::max_attempts`] is exhausted, is returned unchanged.
#[derive(Debug, Clone)]
pub struct RetryingSource<S> {
    inner: S,
    config: RetryConfig,
}

impl<S> RetryingSource<S> {
    pub fn new(inner: S, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Delay to wait after the given number of failed attempts (starting at 1).
    ///
    /// Grows by the backoff multiplier per attempt, is capped at the maximum delay, and
    /// carries up to 30% of random jitter on top.
    pub fn backoff(&self, failed_attempts: u32) -> Duration {
        let exponent = failed_attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_delay_ms =
            self.config.initial_delay_ms as f64 * self.config.backoff_multiplier.powi(exponent);
        let capped_delay_ms = base_delay_ms.min(self.config.max_delay_ms as f64);

        let jitter_factor = rand::thread_rng().r#gen::<f64>() * MAX_JITTER_FACTOR;

        Duration::from_millis((capped_delay_ms * (1.0 + jitter_factor)) as u64)
    }
}

impl<S> RetryingSource<S>
where
    S: DataSource + Sync,
{
    async fn retry<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> DiffResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DiffResult<T>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut failed_attempts = 0;

        loop {
            match attempt().await {
                Ok(value) => {
                    if failed_attempts > 0 {
                        info!(
                            source = self.inner.name(),
                            operation, failed_attempts, "fetch succeeded after retrying"
                        );
                    }

                    return Ok(value);
                }
                Err(err) => {
                    failed_attempts += 1;

                    if !err.kind().is_transient() || failed_attempts >= max_attempts {
                        return Err(err);
                    }

                    let delay = self.backoff(failed_attempts);
                    warn!(
                        source = self.inner.name(),
                        operation,
                        attempt = failed_attempts,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient fetch failure, retrying"
                    );

                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl<S> DataSource for RetryingSource<S>
where
    S: DataSource + Sync,
{
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_histogram_all(&self, interval: i64) -> DiffResult<Histogram> {
        self.retry("fetch_histogram_all", || {
            self.inner.fetch_histogram_all(interval)
        })
        .await
    }

    async fn fetch_histogram_range(
        &self,
        gte: RecordId,
        lt: RecordId,
        interval: i64,
    ) -> DiffResult<Histogram> {
        self.retry("fetch_histogram_range", || {
            self.inner.fetch_histogram_range(gte, lt, interval)
        })
        .await
    }

    async fn fetch_id_range(&self, gte: RecordId, lt: RecordId) -> DiffResult<Vec<RecordId>> {
        self.retry("fetch_id_range", || self.inner.fetch_id_range(gte, lt))
            .await
    }
}
