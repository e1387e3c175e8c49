
pub mod queries;
pub mod schema;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tracing::{debug, info};

use super::ChunkRepository;
use super::models::{ChunkRow, SearchResult, SimilarityQuery, ensure_unique_keys};
use crate::config::PostgresConfig;
use crate::{IngestError, Result};
use queries::ChunkQueries;
use schema::TableName;

/// pgvector-backed chunk repository.
///
/// Every operation checks out its own pooled connection, so concurrent callers
/// never share a session. Writes run inside one transaction that is committed
/// only after every statement succeeds; an error, timeout or dropped future
/// rolls it back.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    table: TableName,
    query_timeout: Duration,
}

impl PostgresStore {
    /// Validate `config` and open a connection pool.
    #[inline]
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        config.validate()?;
        let table = TableName::parse(&config.table)?;

        let mut options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user);
        if let Some(ref password) = config.password {
            options = options.password(password);
        }

        debug!(
            "Connecting to PostgreSQL at {}:{}/{}",
            config.host, config.port, config.database
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(|e| {
                IngestError::connection(
                    format!(
                        "Failed to connect to PostgreSQL at {}:{}",
                        config.host, config.port
                    ),
                    e,
                )
            })?;

        info!("Connected to PostgreSQL database {}", config.database);
        Ok(Self::from_pool(pool, table, config.query_timeout()))
    }

    /// Wrap an existing pool.
    #[inline]
    pub fn from_pool(pool: PgPool, table: TableName, query_timeout: Duration) -> Self {
        Self {
            pool,
            table,
            query_timeout,
        }
    }

    #[inline]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[inline]
    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Create the pgvector extension, the chunk table and its source index
    /// if they are missing.
    #[inline]
    pub async fn ensure_schema(&self, dimension: usize) -> Result<()> {
        if dimension == 0 {
            return Err(IngestError::InvalidInput(
                "embedding dimension must be positive".to_string(),
            ));
        }

        info!(
            "Ensuring table {} with {} dimensions",
            self.table.qualified(),
            dimension
        );

        let statements = [
            schema::CREATE_VECTOR_EXTENSION.to_string(),
            schema::create_table_sql(&self.table, dimension),
            schema::create_source_index_sql(&self.table),
        ];

        self.with_timeout("schema setup", async {
            let mut conn = self.acquire().await?;
            for statement in &statements {
                sqlx::query(statement)
                    .execute(&mut *conn)
                    .await
                    .map_err(|e| classify_sqlx_error("Failed to prepare schema", e))?;
            }
            Ok(())
        })
        .await?;

        debug!("Schema ready");
        Ok(())
    }

    /// Round-trip a trivial query to prove the store is reachable.
    #[inline]
    pub async fn health_check(&self) -> Result<()> {
        self.with_timeout("health check", async {
            let mut conn = self.acquire().await?;
            sqlx::query("SELECT 1")
                .execute(&mut *conn)
                .await
                .map_err(|e| classify_sqlx_error("Health check query failed", e))?;
            Ok(())
        })
        .await
    }

    /// Close every pooled connection.
    #[inline]
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<sqlx::Postgres>> {
        self.pool
            .acquire()
            .await
            .map_err(|e| IngestError::connection("Failed to acquire connection", e))
    }

    async fn with_timeout<T, F>(&self, operation: &'static str, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        tokio::time::timeout(self.query_timeout, future)
            .await
            .map_err(|_| IngestError::Timeout {
                operation,
                elapsed: self.query_timeout,
            })?
    }
}

#[async_trait]
impl ChunkRepository for PostgresStore {
    async fn insert_chunks(&self, rows: Vec<ChunkRow>, batch_size: usize) -> Result<u64> {
        if batch_size == 0 {
            return Err(IngestError::InvalidInput(
                "batch size must be at least 1".to_string(),
            ));
        }
        if rows.is_empty() {
            return Ok(0);
        }
        ensure_unique_keys(rows.iter().map(|row| (row.url.as_str(), row.chunk_number)))?;

        self.with_timeout("chunk insert", async {
            let mut transaction = self
                .pool
                .begin()
                .await
                .map_err(|e| IngestError::connection("Failed to begin transaction", e))?;

            let written =
                ChunkQueries::insert_batch(&mut transaction, &self.table, &rows, batch_size)
                    .await?;

            transaction
                .commit()
                .await
                .map_err(|e| classify_sqlx_error("Failed to commit chunk batch", e))?;

            info!("Committed {} chunks to {}", written, self.table.table());
            Ok(written)
        })
        .await
    }

    async fn search(&self, query: &SimilarityQuery) -> Result<Vec<SearchResult>> {
        self.with_timeout("similarity search", async {
            let mut conn = self.acquire().await?;
            ChunkQueries::search(&mut conn, &self.table, query).await
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.with_timeout("chunk count", async {
            let mut conn = self.acquire().await?;
            ChunkQueries::count(&mut conn, &self.table).await
        })
        .await
    }
}

/// Map a sqlx error to the connection or query kind depending on whether the
/// session itself failed.
pub(crate) fn classify_sqlx_error(message: impl Into<String>, error: sqlx::Error) -> IngestError {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed => IngestError::connection(message, error),
        other => IngestError::query_caused_by(message, other),
    }
}
