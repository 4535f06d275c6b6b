//! Elasticsearch backends.
//!
//! Both flavors talk to the cluster's REST API through a shared [`EsClient`]:
//! [`LegacyElasticsearchSource`] speaks the 0.90 facet API, [`ElasticsearchSource`] the
//! aggregation API of 7.x and 8.x.

mod legacy;
mod modern;

use std::sync::Arc;

pub use legacy::LegacyElasticsearchSource;
pub use modern::{ElasticsearchSource, ElasticsearchVersion};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{DiffResult, ErrorKind};
use crate::histogram::RecordId;
use crate::{bail, diff_error};

/// Name of the histogram facet or aggregation in every request.
const HISTOGRAM_NAME: &str = "ids";

/// HTTP client bound to one cluster node.
#[derive(Debug, Clone)]
pub struct EsClient {
    http: reqwest::Client,
    base_url: Arc<str>,
}

impl EsClient {
    /// Creates a client for the node at `base_url` and checks that it answers.
    pub async fn connect(base_url: &str) -> DiffResult<Self> {
        let client = Self::new(base_url)?;
        client.ping().await?;

        Ok(client)
    }

    /// Creates a client without contacting the node.
    pub fn new(base_url: &str) -> DiffResult<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        if base_url.is_empty() {
            bail!(
                ErrorKind::ConfigError,
                "Elasticsearch connection URL is empty"
            );
        }

        let http = reqwest::Client::builder().build()?;

        Ok(Self {
            http,
            base_url: Arc::from(base_url),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends `GET /` and fails unless the node answers with a success status.
    pub async fn ping(&self) -> DiffResult<()> {
        let url = format!("{}/", self.base_url);
        let response = self.http.get(&url).send().await.map_err(|err| {
            diff_error!(
                ErrorKind::SourceConnectionFailed,
                "Elasticsearch node is unreachable",
                format!("GET {url}: {err}"),
                source: err
            )
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".to_string());
            bail!(
                ErrorKind::SourceConnectionFailed,
                "Elasticsearch node rejected the connection check",
                format!("GET {url} responded with {status} and body `{body}`")
            );
        }

        debug!(url = %self.base_url, "elasticsearch node is reachable");

        Ok(())
    }

    /// Posts `body` to `{base_url}/{path}/_search` and decodes the response.
    pub async fn search<T>(&self, path: &str, body: &Value) -> DiffResult<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}/{}/_search", self.base_url, path.trim_matches('/'));

        let response = self.http.post(&url).json(body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".to_string());
            bail!(
                ErrorKind::SourceQueryFailed,
                "Elasticsearch search request failed",
                format!("POST {url} responded with {status} and body `{body}`")
            );
        }

        let bytes = response.bytes().await?;

        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Builds a `range` clause selecting `field` values in `[gte, lt)`.
fn range_clause(field: &str, gte: RecordId, lt: RecordId) -> Value {
    json!({
        "range": {
            field: {
                "gte": gte,
                "lt": lt,
            }
        }
    })
}

/// Number of hits to request so that every identifier of `[gte, lt)` fits in one page.
fn page_size(gte: RecordId, lt: RecordId) -> i64 {
    lt.saturating_sub(gte).max(0)
}

/// Converts a numeric JSON value holding a bin key or identifier into a [`RecordId`].
///
/// Elasticsearch returns numbers as floats (`1000.0`) or, for some field types, as
/// strings. Single-valued fields may also come wrapped in an array.
fn record_id_from_value(value: &Value) -> DiffResult<RecordId> {
    match value {
        Value::Number(number) => {
            if let Some(id) = number.as_i64() {
                return Ok(id);
            }

            match number.as_f64() {
                Some(float) if float.fract() == 0.0 && float.is_finite() => Ok(float as i64),
                _ => bail!(
                    ErrorKind::SourceInvalidResponse,
                    "Elasticsearch returned a non-integer identifier",
                    number
                ),
            }
        }
        Value::String(text) => text.trim().parse::<RecordId>().map_err(|err| {
            diff_error!(
                ErrorKind::SourceInvalidResponse,
                "Elasticsearch returned a non-integer identifier",
                format!("`{text}`: {err}")
            )
        }),
        Value::Array(values) => match values.as_slice() {
            [single] => record_id_from_value(single),
            _ => bail!(
                ErrorKind::SourceInvalidResponse,
                "Elasticsearch returned an identifier field with multiple values",
                value
            ),
        },
        other => bail!(
            ErrorKind::SourceInvalidResponse,
            "Elasticsearch returned an unexpected identifier value",
            other
        ),
    }
}

/// Extracts `field` from the `fields` object of every hit.
fn ids_from_hit_fields<'a, I>(field: &str, hits: I) -> DiffResult<Vec<RecordId>>
where
    I: IntoIterator<Item = &'a serde_json::Map<String, Value>>,
{
    hits.into_iter()
        .map(|fields| match fields.get(field) {
            Some(value) => record_id_from_value(value),
            None => bail!(
                ErrorKind::SourceInvalidResponse,
                "Elasticsearch hit does not carry the identifier field",
                format!("missing field `{field}`")
            ),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_read_from_numbers_strings_and_arrays() {
        assert_eq!(record_id_from_value(&json!(42)).unwrap(), 42);
        assert_eq!(record_id_from_value(&json!(-7.0)).unwrap(), -7);
        assert_eq!(record_id_from_value(&json!("19")).unwrap(), 19);
        assert_eq!(record_id_from_value(&json!([5])).unwrap(), 5);

        for invalid in [json!(1.5), json!("abc"), json!([1, 2]), json!(null), json!({})] {
            let err = record_id_from_value(&invalid).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::SourceInvalidResponse, "{invalid}");
        }
    }

    #[test]
    fn range_clause_is_half_open() {
        assert_eq!(
            range_clause("order_id", 10, 20),
            json!({"range": {"order_id": {"gte": 10, "lt": 20}}})
        );
        assert_eq!(page_size(10, 20), 10);
        assert_eq!(page_size(20, 10), 0);
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let err = EsClient::new(" / ").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigError);

        let client = EsClient::new("http://localhost:9200/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:9200");
    }
}
