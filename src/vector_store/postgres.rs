//! Postgres + pgvector backed store.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pgvector::Vector;
use tokio_postgres::error::SqlState;
use tokio_postgres::types::FromSql;
use tokio_postgres::{Client, NoTls, Row};

use super::{check_dimensions, vector_literal, DistanceMetric, TableName, VectorStore};
use crate::chunker::Chunk;
use crate::error::StorageError;

/// Connection and layout settings for [`PgVectorStore`].
#[derive(Debug, Clone)]
pub struct PgVectorStoreConfig {
    /// Postgres connection string (`postgres://...` or key=value form).
    pub database_url: String,
    /// Target table.
    pub table: TableName,
    /// Fixed dimensionality of the embedding column.
    pub dimensions: usize,
    /// Ranking metric; the index operator class follows it.
    pub metric: DistanceMetric,
    /// IVF list count used when the index is created.
    pub ivfflat_lists: usize,
    /// Optional `ivfflat.probes` for this session (higher = better recall, slower).
    pub ivfflat_probes: Option<usize>,
}

/// Rows per IVF list needed before the index is trained. Below
/// `lists * MIN_ROWS_PER_LIST` rows no index is built and search is an exact
/// sequential scan; from there on ranking is approximate.
pub const MIN_ROWS_PER_LIST: usize = 39;

/// pgvector store sharing one multiplexed client across requests.
#[derive(Clone)]
pub struct PgVectorStore {
    client: Arc<Client>,
    table: TableName,
    dimensions: usize,
    ivfflat_lists: usize,
    insert_sql: Arc<String>,
    search_sql: Arc<String>,
    count_sql: Arc<String>,
    index_sql: Arc<String>,
}

impl PgVectorStore {
    /// Connects, prepares the schema if missing, and returns the store.
    pub async fn connect(config: PgVectorStoreConfig) -> Result<Self> {
        anyhow::ensure!(config.dimensions > 0, "embedding dimension must be positive");
        let (client, connection) = tokio_postgres::connect(&config.database_url, NoTls)
            .await
            .context("failed to connect to Postgres")?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "postgres connection error");
            }
        });

        ensure_schema(&client, &config).await?;
        if let Some(probes) = config.ivfflat_probes {
            client
                .batch_execute(&format!("SET ivfflat.probes = {}", probes.max(1)))
                .await
                .context("failed to set ivfflat.probes")?;
        }

        let store = Self {
            client: Arc::new(client),
            ivfflat_lists: config.ivfflat_lists.max(1),
            insert_sql: Arc::new(insert_sql(&config.table)),
            search_sql: Arc::new(search_sql(&config.table, config.metric)),
            count_sql: Arc::new(format!("SELECT COUNT(*) FROM {}", config.table.qualified())),
            index_sql: Arc::new(index_ddl(&config.table, config.metric, config.ivfflat_lists)),
            table: config.table,
            dimensions: config.dimensions,
        };
        store.ensure_index().await?;
        Ok(store)
    }

    /// Builds the IVF-flat index once the table holds enough rows to train
    /// its lists, then refreshes planner statistics. Returns whether the
    /// index is in place; until it is, search stays exact.
    pub async fn ensure_index(&self) -> Result<bool> {
        let rows = self.count().await.context("failed to count rows")?;
        if !index_ready(rows, self.ivfflat_lists) {
            tracing::info!(
                rows,
                needed = self.ivfflat_lists * MIN_ROWS_PER_LIST,
                "too few rows to train ivfflat index; searching exactly"
            );
            return Ok(false);
        }
        execute_idempotent(&self.client, &self.index_sql)
            .await
            .context("failed to create ivfflat index")?;
        let analyze = format!("ANALYZE {}", self.table.qualified());
        if let Err(err) = self.client.batch_execute(&analyze).await {
            tracing::warn!(error = %err, table = %self.table.qualified(), "ANALYZE failed");
        }
        Ok(true)
    }

    /// Table this store writes to.
    pub fn table(&self) -> &TableName {
        &self.table
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn insert(&self, document: &str, chunk: &Chunk, vector: &[f32]) -> Result<(), StorageError> {
        check_dimensions(self.dimensions, vector)?;
        let ordinal = i64::try_from(chunk.ordinal)
            .map_err(|_| StorageError::Query(format!("ordinal {} exceeds i64 range", chunk.ordinal)))?;
        let literal = vector_literal(vector);
        self.client
            .execute(
                self.insert_sql.as_str(),
                &[&document, &chunk.id, &ordinal, &chunk.text, &literal],
            )
            .await?;
        Ok(())
    }

    async fn search(&self, query: &[f32], k: usize) -> Result<Vec<Chunk>, StorageError> {
        check_dimensions(self.dimensions, query)?;
        if k == 0 {
            return Ok(Vec::new());
        }
        let vector = Vector::from(query.to_vec());
        let limit = k as i64;
        let rows = self
            .client
            .query(self.search_sql.as_str(), &[&vector, &limit])
            .await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let ordinal: i64 = column(&row, "ordinal")?;
            out.push(Chunk {
                id: column(&row, "chunk_id")?,
                text: column(&row, "text")?,
                source_document: column(&row, "doc_name")?,
                ordinal: usize::try_from(ordinal).unwrap_or_default(),
            });
        }
        Ok(out)
    }

    async fn count(&self) -> Result<usize, StorageError> {
        let row = self.client.query_one(self.count_sql.as_str(), &[]).await?;
        let count: i64 = row
            .try_get(0)
            .map_err(|err| StorageError::Query(err.to_string()))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn column<'a, T>(row: &'a Row, name: &str) -> Result<T, StorageError>
where
    T: FromSql<'a>,
{
    row.try_get(name)
        .map_err(|err| StorageError::Query(format!("column {name}: {err}")))
}

async fn ensure_schema(client: &Client, config: &PgVectorStoreConfig) -> Result<()> {
    execute_idempotent(client, "CREATE EXTENSION IF NOT EXISTS vector")
        .await
        .context("failed to ensure pgvector extension")?;
    execute_idempotent(client, &table_ddl(&config.table, config.dimensions))
        .await
        .context("failed to create chunk table")?;
    Ok(())
}

/// Runs DDL guarded by `IF NOT EXISTS`, tolerating the catalog conflicts two
/// processes racing the same statement can still hit.
async fn execute_idempotent(client: &Client, sql: &str) -> Result<(), tokio_postgres::Error> {
    match client.batch_execute(sql).await {
        Ok(()) => Ok(()),
        Err(err) if is_creation_race(&err) => {
            tracing::debug!(error = %err, "schema object created concurrently");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

fn is_creation_race(err: &tokio_postgres::Error) -> bool {
    matches!(
        err.code(),
        Some(code) if *code == SqlState::UNIQUE_VIOLATION
            || *code == SqlState::DUPLICATE_OBJECT
            || *code == SqlState::DUPLICATE_TABLE
    )
}

fn index_ready(rows: usize, lists: usize) -> bool {
    rows >= lists.max(1) * MIN_ROWS_PER_LIST
}

fn table_ddl(table: &TableName, dims: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            doc_name TEXT NOT NULL,
            chunk_id TEXT NOT NULL,
            ordinal BIGINT NOT NULL,
            text TEXT NOT NULL,
            embedding VECTOR({dims}) NOT NULL
        )",
        table.qualified()
    )
}

fn index_ddl(table: &TableName, metric: DistanceMetric, lists: usize) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} USING ivfflat (embedding {}) WITH (lists = {})",
        table.ivfflat_index_name(),
        table.qualified(),
        metric.operator_class(),
        lists.max(1)
    )
}

fn insert_sql(table: &TableName) -> String {
    format!(
        "INSERT INTO {} (doc_name, chunk_id, ordinal, text, embedding) \
            VALUES ($1, $2, $3, $4, $5::text::vector)",
        table.qualified()
    )
}

fn search_sql(table: &TableName, metric: DistanceMetric) -> String {
    format!(
        "SELECT doc_name, chunk_id, ordinal, text \
        FROM {} \
        ORDER BY embedding {} $1 ASC \
        LIMIT $2",
        table.qualified(),
        metric.operator()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> TableName {
        TableName::new("public", "chunks").unwrap()
    }

    #[test]
    fn search_orders_by_metric_operator() {
        let cosine = search_sql(&table(), DistanceMetric::Cosine);
        assert!(cosine.contains("ORDER BY embedding <=> $1 ASC"));
        let l2 = search_sql(&table(), DistanceMetric::Euclidean);
        assert!(l2.contains("ORDER BY embedding <-> $1 ASC"));
        assert!(l2.contains("LIMIT $2"));
    }

    #[test]
    fn index_opclass_follows_metric() {
        let ddl = index_ddl(&table(), DistanceMetric::Euclidean, 0);
        assert!(ddl.starts_with("CREATE INDEX IF NOT EXISTS"));
        assert!(ddl.contains("USING ivfflat (embedding vector_l2_ops) WITH (lists = 1)"));
    }

    #[test]
    fn index_waits_for_enough_rows_per_list() {
        assert!(!index_ready(0, 100));
        assert!(!index_ready(3, 100));
        assert!(!index_ready(3_899, 100));
        assert!(index_ready(3_900, 100));
        assert!(index_ready(39, 0));
    }

    #[test]
    fn table_ddl_fixes_dimensions() {
        let ddl = table_ddl(&table(), 768);
        assert!(ddl.contains("CREATE TABLE IF NOT EXISTS \"public\".\"chunks\""));
        assert!(ddl.contains("embedding VECTOR(768) NOT NULL"));
    }

    #[test]
    fn insert_casts_literal_to_vector() {
        let sql = insert_sql(&table());
        assert!(sql.contains("$5::text::vector"));
    }
}
