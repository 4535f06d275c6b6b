use datadiff_config::shared::{FetchConfig, SourceConfig};

use crate::bail;
use crate::error::{DiffResult, ErrorKind};
use crate::histogram::{Histogram, RecordId};
#[cfg(feature = "elasticsearch")]
use crate::source::elasticsearch::{
    ElasticsearchSource, ElasticsearchVersion, LegacyElasticsearchSource,
};
#[cfg(feature = "mysql")]
use crate::source::mysql::MySqlSource;
use crate::source::{DataSource, MemorySource, RetryingSource, TimeoutSource};

/// A source as built by [`AnySource::connect`]: every call carries a deadline and
/// transient failures are retried as configured.
pub type ConfiguredSource = RetryingSource<TimeoutSource<AnySource>>;

/// Any of the supported backends, selected by the `driver` of a [`SourceConfig`].
#[derive(Debug, Clone)]
pub enum AnySource {
    Memory(MemorySource),
    #[cfg(feature = "mysql")]
    MySql(MySqlSource),
    #[cfg(feature = "elasticsearch")]
    LegacyElasticsearch(LegacyElasticsearchSource),
    #[cfg(feature = "elasticsearch")]
    Elasticsearch(ElasticsearchSource),
}

impl AnySource {
    /// Connects the backend described by `config` and wraps it according to `fetch`.
    ///
    /// `side` names the source in validation errors, e.g. `primary`. Drivers compiled out
    /// of this build fail with [`ErrorKind::UnsupportedDriver`].
    pub async fn connect(
        side: &str,
        config: &SourceConfig,
        fetch: &FetchConfig,
    ) -> DiffResult<ConfiguredSource> {
        let source = Self::connect_backend(side, config).await?;

        Ok(RetryingSource::new(
            TimeoutSource::new(source, fetch.timeout()),
            fetch.retry.clone(),
        ))
    }

    /// Connects the backend described by `config` without any wrapper.
    pub async fn connect_backend(side: &str, config: &SourceConfig) -> DiffResult<AnySource> {
        config.validate(side)?;

        match config {
            SourceConfig::Memory { ids } => Ok(AnySource::Memory(MemorySource::new(
                ids.iter().copied(),
            ))),
            #[cfg(feature = "mysql")]
            SourceConfig::Mysql {
                connection,
                table_name,
                field_name,
                conditions,
            } => Ok(AnySource::MySql(
                MySqlSource::connect(connection, table_name, field_name, conditions).await?,
            )),
            #[cfg(feature = "elasticsearch")]
            SourceConfig::ElasticsearchLegacy {
                connection,
                index,
                doc_type,
                field,
            } => Ok(AnySource::LegacyElasticsearch(
                LegacyElasticsearchSource::connect(connection, index, doc_type, field).await?,
            )),
            #[cfg(feature = "elasticsearch")]
            SourceConfig::Elasticsearch7 {
                connection,
                index,
                field,
            } => Ok(AnySource::Elasticsearch(
                ElasticsearchSource::connect(connection, index, field, ElasticsearchVersion::V7)
                    .await?,
            )),
            #[cfg(feature = "elasticsearch")]
            SourceConfig::Elasticsearch8 {
                connection,
                index,
                field,
            } => Ok(AnySource::Elasticsearch(
                ElasticsearchSource::connect(connection, index, field, ElasticsearchVersion::V8)
                    .await?,
            )),
            #[allow(unreachable_patterns)]
            other => bail!(
                ErrorKind::UnsupportedDriver,
                "Driver is not available in this build",
                other.driver()
            ),
        }
    }
}

impl DataSource for AnySource {
    fn name(&self) -> &'static str {
        match self {
            AnySource::Memory(source) => source.name(),
            #[cfg(feature = "mysql")]
            AnySource::MySql(source) => source.name(),
            #[cfg(feature = "elasticsearch")]
            AnySource::LegacyElasticsearch(source) => source.name(),
            #[cfg(feature = "elasticsearch")]
            AnySource::Elasticsearch(source) => source.name(),
        }
    }

    async fn fetch_histogram_all(&self, interval: i64) -> DiffResult<Histogram> {
        match self {
            AnySource::Memory(source) => source.fetch_histogram_all(interval).await,
            #[cfg(feature = "mysql")]
            AnySource::MySql(source) => source.fetch_histogram_all(interval).await,
            #[cfg(feature = "elasticsearch")]
            AnySource::LegacyElasticsearch(source) => source.fetch_histogram_all(interval).await,
            #[cfg(feature = "elasticsearch")]
            AnySource::Elasticsearch(source) => source.fetch_histogram_all(interval).await,
        }
    }

    async fn fetch_histogram_range(
        &self,
        gte: RecordId,
        lt: RecordId,
        interval: i64,
    ) -> DiffResult<Histogram> {
        match self {
            AnySource::Memory(source) => source.fetch_histogram_range(gte, lt, interval).await,
            #[cfg(feature = "mysql")]
            AnySource::MySql(source) => source.fetch_histogram_range(gte, lt, interval).await,
            #[cfg(feature = "elasticsearch")]
            AnySource::LegacyElasticsearch(source) => {
                source.fetch_histogram_range(gte, lt, interval).await
            }
            #[cfg(feature = "elasticsearch")]
            AnySource::Elasticsearch(source) => {
                source.fetch_histogram_range(gte, lt, interval).await
            }
        }
    }

    async fn fetch_id_range(&self, gte: RecordId, lt: RecordId) -> DiffResult<Vec<RecordId>> {
        match self {
            AnySource::Memory(source) => source.fetch_id_range(gte, lt).await,
            #[cfg(feature = "mysql")]
            AnySource::MySql(source) => source.fetch_id_range(gte, lt).await,
            #[cfg(feature = "elasticsearch")]
            AnySource::LegacyElasticsearch(source) => source.fetch_id_range(gte, lt).await,
            #[cfg(feature = "elasticsearch")]
            AnySource::Elasticsearch(source) => source.fetch_id_range(gte, lt).await,
        }
    }
}
