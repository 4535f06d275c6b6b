use datadiff::reconcile::{ReconcileSummary, Reconciler};
use datadiff::report::WriterSink;
use datadiff::source::AnySource;
use datadiff_config::shared::{DiffConfig, FetchConfig, ReconcileConfig, SourceConfig};
use tracing::{debug, info, warn};

use crate::error::{CliError, CliResult};

/// Connects both sources and runs the reconciliation, writing the report to stdout.
///
/// Ctrl+C drops the running reconciliation, which cancels every in-flight fetch.
pub async fn start_diff_with_config(config: DiffConfig) -> CliResult<ReconcileSummary> {
    log_config(&config);

    let (primary, secondary) = tokio::try_join!(
        AnySource::connect("primary", &config.primary, &config.fetch),
        AnySource::connect("secondary", &config.secondary, &config.fetch),
    )?;
    info!(
        primary = config.primary.driver(),
        secondary = config.secondary.driver(),
        "sources connected"
    );

    let reconciler = Reconciler::new(
        primary,
        secondary,
        config.reconcile,
        WriterSink::new(tokio::io::stdout()),
    );

    tokio::select! {
        result = reconciler.run() => Ok(result?),
        _ = tokio::signal::ctrl_c() => {
            warn!("ctrl+c received, cancelling reconciliation");
            Err(CliError::Interrupted)
        }
    }
}

fn log_config(config: &DiffConfig) {
    log_reconcile_config(&config.reconcile);
    log_fetch_config(&config.fetch);
    log_source_config("primary", &config.primary);
    log_source_config("secondary", &config.secondary);
}

fn log_reconcile_config(config: &ReconcileConfig) {
    debug!(
        initial_interval = config.initial_interval.get(),
        max_concurrency = config.max_concurrency,
        report_unresolved = config.report_unresolved,
        "reconcile config"
    );
}

fn log_fetch_config(config: &FetchConfig) {
    debug!(
        timeout_ms = config.timeout_ms,
        max_attempts = config.retry.max_attempts,
        initial_delay_ms = config.retry.initial_delay_ms,
        max_delay_ms = config.retry.max_delay_ms,
        backoff_multiplier = config.retry.backoff_multiplier,
        "fetch config"
    );
}

fn log_source_config(side: &str, config: &SourceConfig) {
    match config {
        SourceConfig::Memory { ids } => {
            debug!(side, ids = ids.len(), "using memory source config");
        }
        SourceConfig::Mysql {
            connection: _,
            table_name,
            field_name,
            conditions,
        } => {
            debug!(
                side,
                table_name,
                field_name,
                conditions = conditions.len(),
                "using mysql source config"
            );
        }
        SourceConfig::ElasticsearchLegacy {
            connection,
            index,
            doc_type,
            field,
        } => {
            debug!(
                side,
                connection, index, doc_type, field, "using elasticsearch 0.90 source config"
            );
        }
        SourceConfig::Elasticsearch7 {
            connection,
            index,
            field,
        }
        | SourceConfig::Elasticsearch8 {
            connection,
            index,
            field,
        } => {
            debug!(
                side,
                driver = config.driver(),
                connection,
                index,
                field,
                "using elasticsearch source config"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sources_reconcile_end_to_end() {
        let config = DiffConfig {
            reconcile: ReconcileConfig::default(),
            fetch: FetchConfig::default(),
            primary: SourceConfig::Memory {
                ids: (0..100).collect(),
            },
            secondary: SourceConfig::Memory {
                ids: (0..100).filter(|id| *id != 42).collect(),
            },
        };

        let summary = start_diff_with_config(config).await.unwrap();

        assert_eq!(summary.only_primary, 1);
        assert_eq!(summary.only_secondary, 0);
    }
}
