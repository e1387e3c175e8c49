#[cfg(test)]
mod tests;

use pgvector::Vector;
use sqlx::types::Json;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use tracing::debug;

use super::classify_sqlx_error;
use super::schema::TableName;
use crate::Result;
use crate::database::models::{ChunkRow, SearchResult, SimilarityQuery};

/// Postgres rejects statements with more bind parameters than this.
pub const MAX_BIND_PARAMETERS: usize = u16::MAX as usize;
/// Bound columns per inserted row.
const INSERT_COLUMNS: usize = 5;
/// Largest row count one INSERT can carry.
pub const MAX_ROWS_PER_INSERT: usize = MAX_BIND_PARAMETERS / INSERT_COLUMNS;

/// Rows per INSERT for a requested `batch_size`.
#[inline]
pub fn rows_per_insert(batch_size: usize) -> usize {
    batch_size.clamp(1, MAX_ROWS_PER_INSERT)
}

pub struct ChunkQueries;

impl ChunkQueries {
    /// Multi-row `INSERT` for one slice of rows.
    #[inline]
    pub fn insert_statement<'a>(table: &TableName, rows: &'a [ChunkRow]) -> QueryBuilder<'a, Postgres> {
        let mut builder = QueryBuilder::new(format!(
            "INSERT INTO {} (url, chunk_number, content, embedding, metadata) ",
            table.qualified()
        ));
        builder.push_values(rows, |mut values, row| {
            values
                .push_bind(row.url.as_str())
                .push_bind(row.chunk_number)
                .push_bind(row.content.as_str())
                .push_bind(Vector::from(row.embedding.clone()))
                .push_bind(Json(&row.metadata));
        });
        builder
    }

    /// Insert `rows` in statements of at most `batch_size` rows, never more
    /// than [`MAX_ROWS_PER_INSERT`], on an open connection. The caller owns
    /// the surrounding transaction.
    #[inline]
    pub async fn insert_batch(
        conn: &mut PgConnection,
        table: &TableName,
        rows: &[ChunkRow],
        batch_size: usize,
    ) -> Result<u64> {
        let mut written = 0;
        for slice in rows.chunks(rows_per_insert(batch_size)) {
            let result = Self::insert_statement(table, slice)
                .build()
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    classify_sqlx_error(
                        format!("Failed to insert {} chunks into {}", slice.len(), table.table()),
                        e,
                    )
                })?;
            written += result.rows_affected();
            debug!("Inserted {} of {} chunks", written, rows.len());
        }
        Ok(written)
    }

    /// Ranked nearest-neighbour query:
    /// `SELECT url, content, metadata, 1 - (embedding <=> $1) AS similarity
    ///  FROM t [WHERE metadata->>'source' = $2] ORDER BY embedding <=> $n LIMIT $m`
    #[inline]
    pub fn similarity_statement(
        table: &TableName,
        query: &SimilarityQuery,
    ) -> QueryBuilder<'static, Postgres> {
        let vector = Vector::from(query.embedding.clone());

        let mut builder =
            QueryBuilder::new("SELECT url, content, metadata, 1 - (embedding <=> ");
        builder.push_bind(vector.clone());
        builder.push(") AS similarity FROM ");
        builder.push(table.qualified());

        if let Some(ref source) = query.filter.source {
            builder.push(" WHERE metadata->>'source' = ");
            builder.push_bind(source.clone());
        }

        builder.push(" ORDER BY embedding <=> ");
        builder.push_bind(vector);
        builder.push(" LIMIT ");
        builder.push_bind(i64::try_from(query.match_count).unwrap_or(i64::MAX));
        builder
    }

    #[inline]
    pub async fn search(
        conn: &mut PgConnection,
        table: &TableName,
        query: &SimilarityQuery,
    ) -> Result<Vec<SearchResult>> {
        let mut statement = Self::similarity_statement(table, query);
        statement
            .build_query_as::<SearchResult>()
            .fetch_all(&mut *conn)
            .await
            .map_err(|e| classify_sqlx_error(format!("Failed to search {}", table.table()), e))
    }

    #[inline]
    pub async fn count(conn: &mut PgConnection, table: &TableName) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", table.qualified());
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&mut *conn)
            .await
            .map_err(|e| classify_sqlx_error(format!("Failed to count {}", table.table()), e))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
