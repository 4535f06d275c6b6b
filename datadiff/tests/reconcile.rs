#![cfg(feature = "test-utils")]

use std::collections::BTreeSet;
use datadiff::config::{InitialInterval, ReconcileConfig};
use datadiff::diff_error;
use datadiff::differ::{IdMismatch, Presence};
use datadiff::error::ErrorKind;
use datadiff::error::DiffResult;
use datadiff::histogram::{Bin, Histogram, PairedBin, RecordId};
use datadiff::reconcile::{ReconcileSummary, Reconciler};
use datadiff::report::{MemorySink, UnresolvedRange, WriterSink};
use datadiff::source::{DataSource, MemorySource};
use datadiff::test_utils::test_source_wrapper::{SourceCall, TestSourceWrapper};
use datadiff_telemetry::tracing::init_test_tracing;

fn config(initial_interval: InitialInterval) -> ReconcileConfig {
    ReconcileConfig {
        initial_interval,
        ..ReconcileConfig::default()
    }
}

/// Answers range histograms with one extra record just below and just above the range.
#[derive(Debug, Clone)]
struct OverreachingSource(MemorySource);

impl DataSource for OverreachingSource {
    fn name(&self) -> &'static str {
        "overreaching"
    }

    async fn fetch_histogram_all(&self, interval: i64) -> DiffResult<Histogram> {
        self.0.fetch_histogram_all(interval).await
    }

    async fn fetch_histogram_range(
        &self,
        gte: RecordId,
        lt: RecordId,
        interval: i64,
    ) -> DiffResult<Histogram> {
        let histogram = self.0.fetch_histogram_range(gte, lt, interval).await?;

        let mut bins = histogram.bins().to_vec();
        bins.push(Bin::new(gte - interval, 1));
        bins.push(Bin::new(lt, 1));

        Ok(Histogram::new(bins, interval))
    }

    async fn fetch_id_range(&self, gte: RecordId, lt: RecordId) -> DiffResult<Vec<RecordId>> {
        self.0.fetch_id_range(gte, lt).await
    }
}

fn mismatch_set(mismatches: &[IdMismatch]) -> BTreeSet<(i64, i8)> {
    mismatches
        .iter()
        .map(|m| (m.id, m.presence.code()))
        .collect()
}

#[tokio::test(flavor = "multi_thread")]
async fn full_match_stops_after_first_histogram() {
    init_test_tracing();

    let primary = TestSourceWrapper::wrap(MemorySource::contiguous(0, 20));
    let secondary = TestSourceWrapper::wrap(MemorySource::contiguous(0, 20));
    let sink = MemorySink::new();

    let reconciler = Reconciler::new(
        primary.clone(),
        secondary.clone(),
        config(InitialInterval::Ten),
        sink.clone(),
    );
    let summary = reconciler.run().await.unwrap();

    assert!(sink.mismatches().await.is_empty());
    assert_eq!(primary.calls().await, vec![SourceCall::HistogramAll { interval: 10 }]);
    assert_eq!(secondary.calls().await, vec![SourceCall::HistogramAll { interval: 10 }]);
    assert_eq!(
        summary,
        ReconcileSummary {
            histogram_scans: 1,
            max_depth: 1,
            ..ReconcileSummary::default()
        }
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn equal_counts_below_capacity_are_compared_by_identifier() {
    init_test_tracing();

    let primary = TestSourceWrapper::wrap(MemorySource::new([1, 2, 3, 4, 5, 7]));
    let secondary = TestSourceWrapper::wrap(MemorySource::new([1, 2, 3, 4, 5, 6]));
    let sink = MemorySink::new();

    let summary = Reconciler::new(
        primary.clone(),
        secondary.clone(),
        config(InitialInterval::Ten),
        sink.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(
        mismatch_set(&sink.mismatches().await),
        BTreeSet::from([(7, -1), (6, 1)])
    );
    assert_eq!(
        secondary.calls().await,
        vec![
            SourceCall::HistogramAll { interval: 10 },
            SourceCall::IdRange { gte: 0, lt: 10 },
        ]
    );
    assert_eq!(summary.only_primary, 1);
    assert_eq!(summary.only_secondary, 1);
    assert_eq!(summary.mismatches(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn histogram_failure_aborts_before_any_sub_fetch() {
    init_test_tracing();

    let primary = TestSourceWrapper::wrap(MemorySource::new([1, 2, 3]));
    let secondary = TestSourceWrapper::wrap(MemorySource::new([1, 2]));
    let injected = diff_error!(
        ErrorKind::SourceConnectionFailed,
        "Connection refused",
        "secondary is down"
    );
    secondary.fail_histogram_all(injected.clone()).await;
    let sink = MemorySink::new();

    let err = Reconciler::new(
        primary.clone(),
        secondary.clone(),
        config(InitialInterval::Hundred),
        sink.clone(),
    )
    .run()
    .await
    .unwrap_err();

    assert_eq!(err, injected);
    assert!(err.is_source_error());
    assert!(sink.mismatches().await.is_empty());
    assert!(
        primary
            .calls()
            .await
            .iter()
            .all(|call| matches!(call, SourceCall::HistogramAll { .. }))
    );
    assert_eq!(secondary.calls_count().await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn empty_sources_produce_no_output() {
    init_test_tracing();

    let sink = WriterSink::new(Vec::new());
    let reconciler = Reconciler::new(
        MemorySource::default(),
        MemorySource::default(),
        ReconcileConfig::default(),
        sink,
    );

    let summary = reconciler.run().await.unwrap();

    assert_eq!(summary.histogram_scans, 1);
    assert_eq!(summary.leaf_scans, 0);
    assert_eq!(summary.unresolved_pairs, 0);
    assert!(reconciler.into_sink().into_inner().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_identifier_is_narrowed_level_by_level() {
    init_test_tracing();

    let primary = TestSourceWrapper::wrap(MemorySource::contiguous(0, 1_000));
    let secondary = TestSourceWrapper::wrap(MemorySource::new(
        (0..1_000).filter(|id| *id != 537),
    ));
    let sink = MemorySink::new();

    let summary = Reconciler::new(
        primary.clone(),
        secondary.clone(),
        config(InitialInterval::Hundred),
        sink.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(
        sink.mismatches().await,
        vec![IdMismatch::new(537, Presence::OnlyPrimary)]
    );
    assert_eq!(
        primary.calls().await,
        vec![
            SourceCall::HistogramAll { interval: 100 },
            SourceCall::HistogramRange {
                gte: 500,
                lt: 600,
                interval: 10
            },
            SourceCall::IdRange { gte: 530, lt: 540 },
        ]
    );
    assert_eq!(summary.max_depth, 2);
    assert_eq!(summary.histogram_scans, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn unresolved_ranges_are_reported_at_every_level() {
    init_test_tracing();

    let sink = MemorySink::new();
    let config = ReconcileConfig {
        initial_interval: InitialInterval::Hundred,
        report_unresolved: true,
        ..ReconcileConfig::default()
    };

    Reconciler::new(
        MemorySource::contiguous(0, 200),
        MemorySource::new((0..200).filter(|id| *id != 150)),
        config,
        sink.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(
        sink.unresolved().await,
        vec![
            UnresolvedRange::new(
                PairedBin {
                    key: 100,
                    count_from_primary: 100,
                    count_from_secondary: 99,
                },
                100
            ),
            UnresolvedRange::new(
                PairedBin {
                    key: 150,
                    count_from_primary: 10,
                    count_from_secondary: 9,
                },
                10
            ),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn writer_output_is_sorted_when_sequential() {
    init_test_tracing();

    let primary = MemorySource::new((0..3_000).filter(|id| id % 997 != 0));
    let secondary = MemorySource::new((0..3_000).filter(|id| *id != 1_234 && *id != 2_500));
    let sink = WriterSink::new(Vec::new());

    let reconciler = Reconciler::new(primary, secondary, ReconcileConfig::default(), sink);
    reconciler.run().await.unwrap();

    let output = String::from_utf8(reconciler.into_sink().into_inner()).unwrap();
    assert_eq!(output, "0,1\n997,1\n1234,-1\n1994,1\n2500,-1\n2991,1\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrent_scan_finds_the_same_mismatches() {
    init_test_tracing();

    let removed_from_secondary = [3, 1_411, 5_000, 7_777, 9_999];
    let removed_from_primary = [42, 6_100, 8_001];

    let primary = MemorySource::new((0..10_000).filter(|id| !removed_from_primary.contains(id)));
    let secondary =
        MemorySource::new((0..10_000).filter(|id| !removed_from_secondary.contains(id)));

    let mut expected = BTreeSet::new();
    expected.extend(removed_from_secondary.iter().map(|id| (*id, -1)));
    expected.extend(removed_from_primary.iter().map(|id| (*id, 1)));

    for max_concurrency in [1, 4, 16] {
        let sink = MemorySink::new();
        let config = ReconcileConfig {
            initial_interval: InitialInterval::TenThousand,
            max_concurrency,
            report_unresolved: false,
        };

        let summary = Reconciler::new(primary.clone(), secondary.clone(), config, sink.clone())
            .run()
            .await
            .unwrap();

        assert_eq!(mismatch_set(&sink.mismatches().await), expected);
        assert_eq!(summary.max_depth, 4);
        assert_eq!(summary.leaf_scans, 8);
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn leaf_failure_in_concurrent_branch_aborts_the_run() {
    init_test_tracing();

    let primary = TestSourceWrapper::wrap(MemorySource::contiguous(0, 1_000));
    let secondary = TestSourceWrapper::wrap(MemorySource::new(
        (0..1_000).filter(|id| id % 100 != 0),
    ));
    secondary
        .fail_when(
            |call| matches!(call, SourceCall::IdRange { gte: 700, .. }),
            diff_error!(ErrorKind::SourceQueryFailed, "Query rejected"),
        )
        .await;

    let config = ReconcileConfig {
        initial_interval: InitialInterval::Thousand,
        max_concurrency: 8,
        report_unresolved: false,
    };

    let err = Reconciler::new(primary, secondary.clone(), config, MemorySink::new())
        .run()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
    assert!(
        secondary
            .calls()
            .await
            .contains(&SourceCall::IdRange { gte: 700, lt: 710 })
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn bins_outside_the_scanned_range_are_not_followed() {
    init_test_tracing();

    let primary = TestSourceWrapper::wrap(OverreachingSource(MemorySource::contiguous(0, 1_000)));
    let secondary = TestSourceWrapper::wrap(MemorySource::new(
        (0..1_000).filter(|id| *id != 537),
    ));
    let sink = MemorySink::new();

    let summary = Reconciler::new(
        primary.clone(),
        secondary.clone(),
        config(InitialInterval::Hundred),
        sink.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(
        sink.mismatches().await,
        vec![IdMismatch::new(537, Presence::OnlyPrimary)]
    );
    assert_eq!(
        primary.calls().await,
        vec![
            SourceCall::HistogramAll { interval: 100 },
            SourceCall::HistogramRange {
                gte: 500,
                lt: 600,
                interval: 10
            },
            SourceCall::IdRange { gte: 530, lt: 540 },
        ]
    );
    assert_eq!(secondary.calls_count().await, 3);
    assert_eq!(summary.unresolved_pairs, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn identifiers_near_the_ends_of_the_range_are_reconciled() {
    init_test_tracing();

    let sink = MemorySink::new();

    Reconciler::new(
        MemorySource::new([i64::MIN + 8, i64::MAX - 8]),
        MemorySource::default(),
        config(InitialInterval::Ten),
        sink.clone(),
    )
    .run()
    .await
    .unwrap();

    assert_eq!(
        sink.mismatches().await,
        vec![
            IdMismatch::new(i64::MIN + 8, Presence::OnlyPrimary),
            IdMismatch::new(i64::MAX - 8, Presence::OnlyPrimary),
        ]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn identifiers_whose_bin_overflows_abort_the_run() {
    init_test_tracing();

    for id in [i64::MAX - 2, i64::MAX, i64::MIN + 2, i64::MIN] {
        let sink = MemorySink::new();

        let err = Reconciler::new(
            MemorySource::new([id]),
            MemorySource::default(),
            config(InitialInterval::Ten),
            sink.clone(),
        )
        .run()
        .await
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidData, "{id}");
        assert!(sink.mismatches().await.is_empty());
    }
}
