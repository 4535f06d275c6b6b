use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::DiffResult;
use crate::histogram::{Bin, Histogram, RecordId};
use crate::source::DataSource;
use crate::source::elasticsearch::{
    EsClient, HISTOGRAM_NAME, ids_from_hit_fields, page_size, range_clause,
    record_id_from_value,
};

/// Major version of the cluster behind an [`ElasticsearchSource`].
///
/// Both versions share the same typeless search API; the version only names the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElasticsearchVersion {
    V7,
    V8,
}

impl ElasticsearchVersion {
    pub fn driver(self) -> &'static str {
        match self {
            ElasticsearchVersion::V7 => "elasticsearch7",
            ElasticsearchVersion::V8 => "elasticsearch8",
        }
    }
}

/// Source backed by an Elasticsearch 7.x or 8.x index.
///
/// Histograms use a `histogram` aggregation over the identifier field with
/// `min_doc_count: 1`, so empty bins are never returned. Identifiers are read from doc
/// values, without loading `_source`.
#[derive(Debug, Clone)]
pub struct ElasticsearchSource {
    client: EsClient,
    index: String,
    field: String,
    version: ElasticsearchVersion,
}

impl ElasticsearchSource {
    pub fn new(
        client: EsClient,
        index: impl Into<String>,
        field: impl Into<String>,
        version: ElasticsearchVersion,
    ) -> Self {
        Self {
            client,
            index: index.into(),
            field: field.into(),
            version,
        }
    }

    /// Connects to the node at `connection` and checks that it answers.
    pub async fn connect(
        connection: &str,
        index: &str,
        field: &str,
        version: ElasticsearchVersion,
    ) -> DiffResult<Self> {
        let client = EsClient::connect(connection).await?;

        Ok(Self::new(client, index, field, version))
    }

    pub fn version(&self) -> ElasticsearchVersion {
        self.version
    }

    async fn fetch_histogram(
        &self,
        range: Option<(RecordId, RecordId)>,
        interval: i64,
    ) -> DiffResult<Histogram> {
        let request = histogram_request(&self.field, range, interval);
        let response: HistogramResponse = self.client.search(&self.index, &request).await?;

        response.into_histogram(interval)
    }
}

impl DataSource for ElasticsearchSource {
    fn name(&self) -> &'static str {
        self.version.driver()
    }

    async fn fetch_histogram_all(&self, interval: i64) -> DiffResult<Histogram> {
        self.fetch_histogram(None, interval).await
    }

    async fn fetch_histogram_range(
        &self,
        gte: RecordId,
        lt: RecordId,
        interval: i64,
    ) -> DiffResult<Histogram> {
        self.fetch_histogram(Some((gte, lt)), interval).await
    }

    async fn fetch_id_range(&self, gte: RecordId, lt: RecordId) -> DiffResult<Vec<RecordId>> {
        if gte >= lt {
            return Ok(Vec::new());
        }

        let request = id_request(&self.field, gte, lt);
        let response: IdsResponse = self.client.search(&self.index, &request).await?;

        ids_from_hit_fields(&self.field, response.hits.hits.iter().map(|hit| &hit.fields))
    }
}

fn histogram_request(field: &str, range: Option<(RecordId, RecordId)>, interval: i64) -> Value {
    let mut request = json!({
        "size": 0,
        "aggs": {
            HISTOGRAM_NAME: {
                "histogram": {
                    "field": field,
                    "interval": interval,
                    "min_doc_count": 1,
                }
            }
        }
    });

    if let Some((gte, lt)) = range {
        request["query"] = range_clause(field, gte, lt);
    }

    request
}

fn id_request(field: &str, gte: RecordId, lt: RecordId) -> Value {
    json!({
        "size": page_size(gte, lt),
        "_source": false,
        "docvalue_fields": [field],
        "query": range_clause(field, gte, lt),
    })
}

#[derive(Debug, Deserialize)]
struct HistogramResponse {
    aggregations: Aggregations,
}

#[derive(Debug, Deserialize)]
struct Aggregations {
    ids: HistogramAggregate,
}

#[derive(Debug, Deserialize)]
struct HistogramAggregate {
    buckets: Vec<HistogramBucket>,
}

#[derive(Debug, Deserialize)]
struct HistogramBucket {
    key: Value,
    doc_count: u64,
}

impl HistogramResponse {
    fn into_histogram(self, interval: i64) -> DiffResult<Histogram> {
        let bins = self
            .aggregations
            .ids
            .buckets
            .into_iter()
            .map(|bucket| Ok(Bin::new(record_id_from_value(&bucket.key)?, bucket.doc_count)))
            .collect::<DiffResult<Vec<_>>>()?;

        Ok(Histogram::new(bins, interval))
    }
}

#[derive(Debug, Deserialize)]
struct IdsResponse {
    hits: Hits,
}

#[derive(Debug, Deserialize)]
struct Hits {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(default)]
    fields: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn full_histogram_request_has_no_query() {
        assert_eq!(
            histogram_request("order_id", None, 1000),
            json!({
                "size": 0,
                "aggs": {
                    "ids": {
                        "histogram": {"field": "order_id", "interval": 1000, "min_doc_count": 1}
                    }
                }
            })
        );
    }

    #[test]
    fn range_histogram_request_filters_on_the_configured_field() {
        let request = histogram_request("order_id", Some((2000, 3000)), 100);

        assert_eq!(
            request["query"],
            json!({"range": {"order_id": {"gte": 2000, "lt": 3000}}})
        );
        assert_eq!(request["aggs"]["ids"]["histogram"]["interval"], json!(100));
    }

    #[test]
    fn id_request_reads_doc_values() {
        assert_eq!(
            id_request("order_id", 40, 50),
            json!({
                "size": 10,
                "_source": false,
                "docvalue_fields": ["order_id"],
                "query": {"range": {"order_id": {"gte": 40, "lt": 50}}},
            })
        );
    }

    #[test]
    fn buckets_become_bins() {
        let response: HistogramResponse = serde_json::from_value(json!({
            "took": 3,
            "aggregations": {
                "ids": {
                    "buckets": [
                        {"key": 0.0, "doc_count": 10},
                        {"key": 10.0, "doc_count": 4},
                    ]
                }
            }
        }))
        .unwrap();

        let histogram = response.into_histogram(10).unwrap();

        assert_eq!(histogram.bins(), &[Bin::new(0, 10), Bin::new(10, 4)]);
        assert_eq!(histogram.bin_capacity(), 10);
    }

    #[test]
    fn fractional_bucket_key_is_rejected() {
        let response: HistogramResponse = serde_json::from_value(json!({
            "aggregations": {"ids": {"buckets": [{"key": 0.5, "doc_count": 1}]}}
        }))
        .unwrap();

        let err = response.into_histogram(1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceInvalidResponse);
    }
}
