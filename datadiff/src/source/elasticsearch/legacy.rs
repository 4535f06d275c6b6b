use serde::Deserialize;
use serde_json::{Map, Value, json};

use crate::error::DiffResult;
use crate::histogram::{Bin, Histogram, RecordId};
use crate::source::DataSource;
use crate::source::elasticsearch::{
    EsClient, HISTOGRAM_NAME, ids_from_hit_fields, page_size, range_clause,
    record_id_from_value,
};

/// Source backed by a typed index of an Elasticsearch 0.90 cluster.
///
/// Histograms come from a `histogram` facet; ranges are applied as a `filtered` query.
#[derive(Debug, Clone)]
pub struct LegacyElasticsearchSource {
    client: EsClient,
    index: String,
    doc_type: String,
    field: String,
}

impl LegacyElasticsearchSource {
    pub fn new(
        client: EsClient,
        index: impl Into<String>,
        doc_type: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        Self {
            client,
            index: index.into(),
            doc_type: doc_type.into(),
            field: field.into(),
        }
    }

    pub async fn connect(
        connection: &str,
        index: &str,
        doc_type: &str,
        field: &str,
    ) -> DiffResult<Self> {
        let client = EsClient::connect(connection).await?;

        Ok(Self::new(client, index, doc_type, field))
    }

    fn search_path(&self) -> String {
        format!("{}/{}", self.index, self.doc_type)
    }

    async fn fetch_histogram(
        &self,
        range: Option<(RecordId, RecordId)>,
        interval: i64,
    ) -> DiffResult<Histogram> {
        let request = facet_request(&self.field, range, interval);
        let response: FacetResponse = self.client.search(&self.search_path(), &request).await?;

        response.into_histogram(interval)
    }
}

impl DataSource for LegacyElasticsearchSource {
    fn name(&self) -> &'static str {
        "elasticsearch"
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

        let request = json!({
            "size": page_size(gte, lt),
            "fields": [self.field],
            "query": filtered_range_query(&self.field, gte, lt),
        });
        let response: FieldsResponse = self.client.search(&self.search_path(), &request).await?;

        ids_from_hit_fields(&self.field, response.hits.hits.iter().map(|hit| &hit.fields))
    }
}

fn filtered_range_query(field: &str, gte: RecordId, lt: RecordId) -> Value {
    json!({
        "filtered": {
            "query": {"match_all": {}},
            "filter": range_clause(field, gte, lt),
        }
    })
}

fn facet_request(field: &str, range: Option<(RecordId, RecordId)>, interval: i64) -> Value {
    let mut request = json!({
        "size": 0,
        "facets": {
            HISTOGRAM_NAME: {
                "histogram": {
                    "field": field,
                    "interval": interval,
                }
            }
        }
    });

    if let Some((gte, lt)) = range {
        request["query"] = filtered_range_query(field, gte, lt);
    }

    request
}

#[derive(Debug, Deserialize)]
struct FacetResponse {
    facets: Facets,
}

#[derive(Debug, Deserialize)]
struct Facets {
    ids: HistogramFacet,
}

#[derive(Debug, Deserialize)]
struct HistogramFacet {
    #[serde(default)]
    entries: Vec<FacetEntry>,
}

#[derive(Debug, Deserialize)]
struct FacetEntry {
    key: Value,
    count: u64,
}

impl FacetResponse {
    fn into_histogram(self, interval: i64) -> DiffResult<Histogram> {
        let bins = self
            .facets
            .ids
            .entries
            .into_iter()
            .map(|entry| Ok(Bin::new(record_id_from_value(&entry.key)?, entry.count)))
            .collect::<DiffResult<Vec<_>>>()?;

        Ok(Histogram::new(bins, interval))
    }
}

#[derive(Debug, Deserialize)]
struct FieldsResponse {
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
