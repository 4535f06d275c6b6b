//! Output of a reconciliation run.
//!
//! The reconciler hands every finding to a [`ReportSink`]. [`WriterSink`] renders the
//! textual report to any [`AsyncWrite`] target (stdout in the CLI) and [`MemorySink`] keeps
//! the findings for inspection.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

use crate::differ::IdMismatch;
use crate::error::DiffResult;
use crate::histogram::{PairedBin, RecordId};

/// A paired bin that could not be resolved at a given interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnresolvedRange {
    pub pair: PairedBin,
    pub interval: i64,
}

impl UnresolvedRange {
    pub fn new(pair: PairedBin, interval: i64) -> Self {
        Self { pair, interval }
    }

    /// Inclusive lower bound of the range.
    pub fn min(&self) -> RecordId {
        self.pair.key
    }

    /// Inclusive upper bound of the range.
    pub fn max(&self) -> RecordId {
        self.pair.key.saturating_add(self.interval - 1)
    }
}

impl fmt::Display for UnresolvedRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Range: [{:>9} {:>9}]   |   Primary: {:>9}   |   Secondary: {:>9}   |   Diff: {:>9}",
            self.min(),
            self.max(),
            self.pair.count_from_primary,
            self.pair.count_from_secondary,
            self.pair.diff_count()
        )
    }
}

/// Receives the findings of a reconciliation.
///
/// Sinks are shared by every concurrently running branch, so implementations serialize
/// writes internally. A failing sink aborts the run like a failing source.
pub trait ReportSink {
    /// Records a range that did not resolve at its histogram level.
    ///
    /// Only called when unresolved reporting is enabled.
    fn record_unresolved(&self, range: UnresolvedRange) -> impl Future<Output = DiffResult<()>> + Send;

    /// Records an identifier found on one side only.
    fn record_mismatch(&self, mismatch: IdMismatch) -> impl Future<Output = DiffResult<()>> + Send;
}

/// Writes the textual report, one finding per line.
///
/// Every line is flushed once written, so findings reach the output even when the run
/// later fails or is cancelled.
#[derive(Debug)]
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    async fn write_line(&self, line: impl fmt::Display) -> DiffResult<()> {
        let line = format!("{line}\n");

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await?;
        writer.flush().await?;

        Ok(())
    }
}

impl<W> ReportSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send,
{
    async fn record_unresolved(&self, range: UnresolvedRange) -> DiffResult<()> {
        self.write_line(range).await
    }

    async fn record_mismatch(&self, mismatch: IdMismatch) -> DiffResult<()> {
        self.write_line(mismatch).await
    }
}

#[derive(Debug, Default)]
struct Inner {
    unresolved: Vec<UnresolvedRange>,
    mismatches: Vec<IdMismatch>,
}

/// Keeps every finding in memory, in the order it was recorded.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn unresolved(&self) -> Vec<UnresolvedRange> {
        self.inner.lock().await.unresolved.clone()
    }

    pub async fn mismatches(&self) -> Vec<IdMismatch> {
        self.inner.lock().await.mismatches.clone()
    }
}

impl ReportSink for MemorySink {
    async fn record_unresolved(&self, range: UnresolvedRange) -> DiffResult<()> {
        self.inner.lock().await.unresolved.push(range);
        Ok(())
    }

    async fn record_mismatch(&self, mismatch: IdMismatch) -> DiffResult<()> {
        self.inner.lock().await.mismatches.push(mismatch);
        Ok(())
    }
}
