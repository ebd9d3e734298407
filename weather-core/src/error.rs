use thiserror::Error;

use crate::transform::Column;

/// Failures while talking to the weather API.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("Invalid API base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("Failed to build HTTP client")]
    Client(#[source] reqwest::Error),

    #[error("Network request to {url} failed")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Request to {url} failed with status {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Malformed response body from {url}")]
    Malformed {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Response from {url} has no 'data' field")]
    MissingData { url: String },
}

/// Batch-level rejections raised by the transform stage.
#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("Batch is missing required columns: {}", format_columns(.0))]
    MissingColumns(Vec<Column>),
}

fn format_columns(cols: &[Column]) -> String {
    cols.iter().map(|c| c.as_str()).collect::<Vec<_>>().join(", ")
}

/// Failures while writing to the relational store.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to connect to database at {host}:{port}/{database}")]
    Connect {
        host: String,
        port: u16,
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to create schema")]
    Schema(#[source] sqlx::Error),

    #[error("Failed to upsert city '{name}'")]
    UpsertCity {
        name: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Failed to insert weather record for '{city}'")]
    InsertRecord {
        city: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Transaction failed")]
    Transaction(#[source] sqlx::Error),
}
