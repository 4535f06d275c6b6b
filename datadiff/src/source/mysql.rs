use secrecy::{ExposeSecret, SecretString};
use sqlx::mysql::MySqlPoolOptions;
use sqlx::{Connection, MySqlPool};
use tracing::debug;

use crate::bail;
use crate::error::{DiffResult, ErrorKind};
use crate::histogram::{Bin, Histogram, RecordId};
use crate::source::DataSource;

/// Connections kept open against the database.
const MAX_CONNECTIONS: u32 = 4;

/// Source backed by an integer column of a MySQL table.
///
/// Every query is restricted by the configured `conditions`, raw SQL predicates that are
/// AND-ed into the `WHERE` clause as written. Table and column names are validated and
/// quoted; range bounds are bound as parameters.
#[derive(Debug, Clone)]
pub struct MySqlSource {
    pool: MySqlPool,
    query: MySqlQueryBuilder,
}

impl MySqlSource {
    /// Opens a pool against `connection` and checks that the database answers.
    pub async fn connect(
        connection: &SecretString,
        table_name: &str,
        field_name: &str,
        conditions: &[String],
    ) -> DiffResult<Self> {
        let query = MySqlQueryBuilder::new(table_name, field_name, conditions)?;

        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect(connection.expose_secret())
            .await?;

        pool.acquire().await?.ping().await?;

        debug!(table = table_name, field = field_name, "mysql source connected");

        Ok(Self { pool, query })
    }

    async fn fetch_histogram(
        &self,
        range: Option<(RecordId, RecordId)>,
        interval: i64,
    ) -> DiffResult<Histogram> {
        let sql = self.query.histogram(interval, range.is_some());

        let mut query = sqlx::query_as::<_, (i64, i64)>(&sql);
        if let Some((gte, lt)) = range {
            query = query.bind(gte).bind(lt);
        }

        let rows = query.fetch_all(&self.pool).await?;

        let bins = rows
            .into_iter()
            .map(|(key, count)| Bin::new(key, count.max(0) as u64))
            .collect();

        Ok(Histogram::new(bins, interval))
    }
}

impl DataSource for MySqlSource {
    fn name(&self) -> &'static str {
        "mysql"
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
        let sql = self.query.ids();

        let rows: Vec<(i64,)> = sqlx::query_as(&sql)
            .bind(gte)
            .bind(lt)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}

/// Renders the SQL statements of a [`MySqlSource`].
#[derive(Debug, Clone, PartialEq, Eq)]
struct MySqlQueryBuilder {
    table: String,
    field: String,
    conditions: Vec<String>,
}

impl MySqlQueryBuilder {
    fn new(table_name: &str, field_name: &str, conditions: &[String]) -> DiffResult<Self> {
        let table = table_name
            .split('.')
            .map(quote_identifier)
            .collect::<DiffResult<Vec<_>>>()?
            .join(".");
        let field = quote_identifier(field_name)?;

        let conditions = conditions
            .iter()
            .map(|condition| condition.trim())
            .filter(|condition| !condition.is_empty())
            .map(|condition| format!("({condition})"))
            .collect();

        Ok(Self {
            table,
            field,
            conditions,
        })
    }

    /// `SELECT` of bin keys and counts; the range variant expects `gte` and `lt` binds.
    fn histogram(&self, interval: i64, ranged: bool) -> String {
        format!(
            "SELECT CAST(FLOOR({field} / {interval}) * {interval} AS SIGNED) AS bin_key, \
             COUNT(*) AS bin_count FROM {table}{where_clause} GROUP BY bin_key",
            field = self.field,
            table = self.table,
            where_clause = self.where_clause(ranged),
        )
    }

    /// `SELECT` of identifiers, expecting `gte` and `lt` binds.
    fn ids(&self) -> String {
        format!(
            "SELECT CAST({field} AS SIGNED) AS id FROM {table}{where_clause}",
            field = self.field,
            table = self.table,
            where_clause = self.where_clause(true),
        )
    }

    fn where_clause(&self, ranged: bool) -> String {
        let mut predicates = Vec::with_capacity(self.conditions.len() + 2);
        if ranged {
            predicates.push(format!("{} >= ?", self.field));
            predicates.push(format!("{} < ?", self.field));
        } else {
            // Rows without an identifier would form a NULL bin.
            predicates.push(format!("{} IS NOT NULL", self.field));
        }
        predicates.extend(self.conditions.iter().cloned());

        format!(" WHERE {}", predicates.join(" AND "))
    }
}

/// Quotes a MySQL identifier made of letters, digits, `_` and `$`.
fn quote_identifier(identifier: &str) -> DiffResult<String> {
    let identifier = identifier.trim();

    let valid = !identifier.is_empty()
        && identifier
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$');
    if !valid {
        bail!(
            ErrorKind::ConfigError,
            "Invalid MySQL identifier",
            format!("`{identifier}` may only contain letters, digits, `_` and `$`")
        );
    }

    Ok(format!("`{identifier}`"))
}
