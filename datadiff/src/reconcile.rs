//! Recursive reconciliation of two data sources.
//!
//! A run starts with a histogram of the whole identifier space on both sides. Every pair of
//! bins that is not full on both sides is scanned again at one tenth of the interval,
//! restricted to the pair's range, until the interval reaches 1. At that point the
//! identifiers of the range are fetched and compared directly.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use datadiff_config::shared::ReconcileConfig;
use futures::future::BoxFuture;
use futures::{FutureExt, TryStreamExt, stream};
use tracing::{debug, info};

use crate::bail;
use crate::differ::{IdMismatch, Presence, diff_ids};
use crate::error::{DiffResult, ErrorKind};
use crate::histogram::{MergedHistogram, PairedBin, RecordId};
use crate::report::{ReportSink, UnresolvedRange};
use crate::source::DataSource;

/// Factor by which the interval shrinks from one histogram level to the next.
pub const INTERVAL_DIVISOR: i64 = 10;

/// One step of a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Histogram of every record, with bins of width `interval`.
    Top { interval: i64 },
    /// Histogram of the records in `[gte, lt)`, with bins of width `interval`.
    Range {
        gte: RecordId,
        lt: RecordId,
        interval: i64,
    },
    /// Identifier comparison over `[gte, lt)`.
    Leaf { gte: RecordId, lt: RecordId },
}

impl Scan {
    /// Returns the scan of `[gte, lt)` at `next_interval`: another histogram while the
    /// interval is above 1, the identifier comparison otherwise.
    pub fn next(gte: RecordId, lt: RecordId, next_interval: i64) -> Scan {
        if next_interval > 1 {
            Scan::Range {
                gte,
                lt,
                interval: next_interval,
            }
        } else {
            Scan::Leaf { gte, lt }
        }
    }

    /// Scans the range of an unresolved pair found at `interval`.
    ///
    /// Fails with [`ErrorKind::InvalidData`] when the range ends past `i64::MAX`.
    fn refine(pair: &PairedBin, interval: i64) -> DiffResult<Scan> {
        let Some(lt) = pair.upper_bound(interval) else {
            bail!(
                ErrorKind::InvalidData,
                "Bin extends past the largest identifier",
                format!("bin {} of width {interval}", pair.key)
            );
        };

        Ok(Scan::next(pair.key, lt, interval / INTERVAL_DIVISOR))
    }
}

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Histogram queries issued per side.
    pub histogram_scans: u64,
    /// Identifier queries issued per side.
    pub leaf_scans: u64,
    /// Unresolved bin pairs found over all histogram levels.
    pub unresolved_pairs: u64,
    pub only_primary: u64,
    pub only_secondary: u64,
    /// Deepest histogram level reached, the first scan being level 1.
    pub max_depth: u32,
}

impl ReconcileSummary {
    /// Total number of identifiers found on a single side.
    pub fn mismatches(&self) -> u64 {
        self.only_primary + self.only_secondary
    }
}

#[derive(Debug, Default)]
struct Stats {
    histogram_scans: AtomicU64,
    leaf_scans: AtomicU64,
    unresolved_pairs: AtomicU64,
    only_primary: AtomicU64,
    only_secondary: AtomicU64,
    max_depth: AtomicU32,
}

impl Stats {
    fn record_histogram_scan(&self, depth: u32, unresolved_pairs: usize) {
        self.histogram_scans.fetch_add(1, Ordering::Relaxed);
        self.unresolved_pairs
            .fetch_add(unresolved_pairs as u64, Ordering::Relaxed);
        self.max_depth.fetch_max(depth, Ordering::Relaxed);
    }

    fn record_mismatch(&self, mismatch: &IdMismatch) {
        let counter = match mismatch.presence {
            Presence::OnlyPrimary => &self.only_primary,
            Presence::OnlySecondary => &self.only_secondary,
            Presence::Both => return,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn summary(&self) -> ReconcileSummary {
        ReconcileSummary {
            histogram_scans: self.histogram_scans.load(Ordering::Relaxed),
            leaf_scans: self.leaf_scans.load(Ordering::Relaxed),
            unresolved_pairs: self.unresolved_pairs.load(Ordering::Relaxed),
            only_primary: self.only_primary.load(Ordering::Relaxed),
            only_secondary: self.only_secondary.load(Ordering::Relaxed),
            max_depth: self.max_depth.load(Ordering::Relaxed),
        }
    }
}

/// Reconciles a primary and a secondary source, reporting findings to a sink.
///
/// The primary side is the reference: identifiers missing from the secondary are
/// reported as [`Presence::OnlyPrimary`]. Any failed fetch or sink write aborts the run and
/// is returned unchanged; findings already written to the sink stay there.
///
/// Up to [`ReconcileConfig::max_concurrency`] sibling ranges are scanned concurrently.
/// With the default of 1, ranges are scanned depth first in ascending key order.
#[derive(Debug)]
pub struct Reconciler<P, S, R> {
    primary: P,
    secondary: S,
    config: ReconcileConfig,
    sink: R,
}

impl<P, S, R> Reconciler<P, S, R>
where
    P: DataSource + Sync,
    S: DataSource + Sync,
    R: ReportSink + Sync,
{
    pub fn new(primary: P, secondary: S, config: ReconcileConfig, sink: R) -> Self {
        Self {
            primary,
            secondary,
            config,
            sink,
        }
    }

    pub fn sink(&self) -> &R {
        &self.sink
    }

    /// Consumes the reconciler and returns its sink.
    pub fn into_sink(self) -> R {
        self.sink
    }

    /// Runs a full reconciliation starting at the configured initial interval.
    pub async fn run(&self) -> DiffResult<ReconcileSummary> {
        let interval = self.config.initial_interval.get();
        let stats = Stats::default();

        info!(
            primary = self.primary.name(),
            secondary = self.secondary.name(),
            interval,
            max_concurrency = self.config.max_concurrency,
            "starting reconciliation"
        );

        self.scan(Scan::Top { interval }, 1, &stats).await?;

        let summary = stats.summary();
        info!(
            histogram_scans = summary.histogram_scans,
            leaf_scans = summary.leaf_scans,
            unresolved_pairs = summary.unresolved_pairs,
            only_primary = summary.only_primary,
            only_secondary = summary.only_secondary,
            max_depth = summary.max_depth,
            "reconciliation finished"
        );

        Ok(summary)
    }

    fn scan<'a>(
        &'a self,
        scan: Scan,
        depth: u32,
        stats: &'a Stats,
    ) -> BoxFuture<'a, DiffResult<()>> {
        async move {
            debug!(?scan, depth, "scanning");

            match scan {
                Scan::Top { interval } => {
                    let (primary, secondary) = tokio::try_join!(
                        self.primary.fetch_histogram_all(interval),
                        self.secondary.fetch_histogram_all(interval),
                    )?;

                    self.refine(primary.merge(&secondary), None, depth, stats)
                        .await
                }
                Scan::Range { gte, lt, interval } => {
                    let (primary, secondary) = tokio::try_join!(
                        self.primary.fetch_histogram_range(gte, lt, interval),
                        self.secondary.fetch_histogram_range(gte, lt, interval),
                    )?;

                    self.refine(primary.merge(&secondary), Some((gte, lt)), depth, stats)
                        .await
                }
                Scan::Leaf { gte, lt } => {
                    let (primary, secondary) = tokio::try_join!(
                        self.primary.fetch_id_range(gte, lt),
                        self.secondary.fetch_id_range(gte, lt),
                    )?;
                    stats.leaf_scans.fetch_add(1, Ordering::Relaxed);

                    for mismatch in diff_ids(&primary, &secondary) {
                        stats.record_mismatch(&mismatch);
                        self.sink.record_mismatch(mismatch).await?;
                    }

                    Ok(())
                }
            }
        }
        .boxed()
    }

    /// Reports the unresolved pairs of `merged` and scans each of them one level deeper.
    ///
    /// Pairs outside `bounds` are ignored; a source may return bins beyond the requested
    /// range.
    async fn refine(
        &self,
        merged: MergedHistogram,
        bounds: Option<(RecordId, RecordId)>,
        depth: u32,
        stats: &Stats,
    ) -> DiffResult<()> {
        let interval = merged.bin_capacity();
        let unresolved: Vec<PairedBin> = merged
            .unresolved_pairs()
            .into_iter()
            .filter(|pair| bounds.is_none_or(|(gte, lt)| pair.key >= gte && pair.key < lt))
            .collect();

        stats.record_histogram_scan(depth, unresolved.len());
        debug!(
            interval,
            depth,
            pairs = merged.bin_pairs().len(),
            unresolved = unresolved.len(),
            "histograms merged"
        );

        if self.config.report_unresolved {
            for pair in &unresolved {
                self.sink
                    .record_unresolved(UnresolvedRange::new(*pair, interval))
                    .await?;
            }
        }

        stream::iter(unresolved.iter().map(|pair| Scan::refine(pair, interval)))
        .try_for_each_concurrent(self.config.max_concurrency.max(1), |scan| {
            self.scan(scan, depth + 1, stats)
        })
        .await
    }
}
