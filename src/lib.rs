use std::time::Duration;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, IngestError>;

/// Boxed cause attached to embedding failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Embedding error: {message}")]
    Embedding {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Query error: {message}")]
    Query {
        message: String,
        #[source]
        source: Option<sqlx::Error>,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification of an [`IngestError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Connection,
    Embedding,
    Query,
    InvalidInput,
    Timeout,
    Io,
}

impl IngestError {
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        match *self {
            Self::Config(_) => ErrorKind::Config,
            Self::Connection { .. } => ErrorKind::Connection,
            Self::Embedding { .. } => ErrorKind::Embedding,
            Self::Query { .. } => ErrorKind::Query,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    #[inline]
    pub fn connection(message: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Connection {
            message: message.into(),
            source,
        }
    }

    #[inline]
    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding {
            message: message.into(),
            source: None,
        }
    }

    #[inline]
    pub fn embedding_caused_by(
        message: impl Into<String>,
        source: impl Into<BoxError>,
    ) -> Self {
        Self::Embedding {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    #[inline]
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            message: message.into(),
            source: None,
        }
    }

    #[inline]
    pub fn query_caused_by(message: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Query {
            message: message.into(),
            source: Some(source),
        }
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod search;
pub mod store;

#[cfg(test)]
mod test_support;
