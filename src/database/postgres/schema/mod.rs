
use crate::{IngestError, Result};

/// Chunk table name, optionally schema-qualified (`schema.table`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableName {
    schema: Option<String>,
    table: String,
}

impl TableName {
    #[inline]
    pub fn parse(name: &str) -> Result<Self> {
        let name = name.trim();
        let (schema, table) = match name.split_once('.') {
            Some((schema, table)) => (Some(schema.trim()), table.trim()),
            None => (None, name),
        };

        if table.is_empty() || schema.is_some_and(str::is_empty) {
            return Err(IngestError::Config(format!("invalid table name: {name:?}")));
        }

        Ok(Self {
            schema: schema.map(str::to_string),
            table: table.to_string(),
        })
    }

    #[inline]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Quoted reference safe to splice into SQL.
    #[inline]
    pub fn qualified(&self) -> String {
        match self.schema {
            Some(ref schema) => format!("{}.{}", quote_ident(schema), quote_ident(&self.table)),
            None => quote_ident(&self.table),
        }
    }

    /// Name of the expression index on `metadata->>'source'`.
    #[inline]
    pub fn source_index_name(&self) -> String {
        let prefix = match self.schema {
            Some(ref schema) => format!("{}_{}", sanitize_ident(schema), sanitize_ident(&self.table)),
            None => sanitize_ident(&self.table),
        };
        quote_ident(&format!("{prefix}_metadata_source_idx"))
    }
}

/// Quotes a Postgres identifier, doubling embedded quotes.
#[inline]
pub fn quote_ident(input: &str) -> String {
    format!("\"{}\"", input.replace('"', "\"\""))
}

fn sanitize_ident(input: &str) -> String {
    input
        .chars()
        .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
        .collect()
}

pub const CREATE_VECTOR_EXTENSION: &str = "CREATE EXTENSION IF NOT EXISTS vector";

#[inline]
pub fn create_table_sql(table: &TableName, dimension: usize) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id BIGSERIAL PRIMARY KEY,
            url TEXT NOT NULL,
            chunk_number INTEGER NOT NULL,
            content TEXT NOT NULL,
            metadata JSONB NOT NULL DEFAULT '{{}}'::jsonb,
            embedding VECTOR({dimension}) NOT NULL,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            UNIQUE (url, chunk_number)
        )",
        table.qualified()
    )
}

#[inline]
pub fn create_source_index_sql(table: &TableName) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {} ON {} ((metadata->>'source'))",
        table.source_index_name(),
        table.qualified()
    )
}
