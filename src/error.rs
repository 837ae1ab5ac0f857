//! Error types for the store and the routing pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Failures raised by the link store
#[derive(Debug)]
pub enum StoreError {
    /// The underlying database failed (transaction, table access, I/O)
    Database(String),
    /// A stored record could not be deserialized
    Corrupt(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(message) => write!(f, "database error: {}", message),
            StoreError::Corrupt(message) => write!(f, "corrupt record: {}", message),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        StoreError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Corrupt(err.to_string())
    }
}

/// Failures surfaced by the waterfall router
///
/// Secondary lookup faults (schedule, A/B test, destinations) are degraded
/// inside the router and never reach this type; a visitor only ever sees a
/// generic "link unavailable" response.
#[derive(Debug)]
pub enum RouteError {
    /// No active short link matches the requested code
    NotFound,
    /// The short link row itself could not be read
    Store(StoreError),
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteError::NotFound => write!(f, "short link not found or inactive"),
            RouteError::Store(err) => write!(f, "store failure: {}", err),
        }
    }
}

impl std::error::Error for RouteError {}

impl From<StoreError> for RouteError {
    fn from(err: StoreError) -> Self {
        RouteError::Store(err)
    }
}

impl IntoResponse for RouteError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            RouteError::NotFound => (
                StatusCode::NOT_FOUND,
                json!({
                    "error": "Short link not found or inactive"
                }),
            ),
            RouteError::Store(_) => (
                StatusCode::SERVICE_UNAVAILABLE,
                json!({
                    "error": "This link is temporarily unavailable"
                }),
            ),
        };

        (status, Json(message)).into_response()
    }
}
