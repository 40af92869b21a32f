//! Error taxonomy for each boundary of the pipeline.
//!
//! Errors are handled at the boundary nearest their origin; none of them
//! crosses the event bus.

use thiserror::Error;

/// Failures of the upstream weather provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("weather provider is unreachable: {0}")]
    Unavailable(String),

    #[error("city not found: {0}")]
    CityNotFound(String),

    #[error("weather provider answered with status {status}")]
    Status { status: u16 },

    #[error("malformed weather provider response: {0}")]
    MalformedResponse(String),

    #[error("city must not be empty")]
    EmptyCity,
}

/// Failures of the event bus, on either side.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("failed to publish event: {0}")]
    Publish(String),

    #[error("failed to receive events: {0}")]
    Subscribe(String),

    #[error("event serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("event bus is closed")]
    Closed,
}

/// Failures of persistent storage.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage operation timed out after {0}s")]
    Timeout(u64),
}

/// Failures surfaced by the history service.
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("invalid reading: {0}")]
    InvalidReading(String),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

pub type HistoryResult<T> = Result<T, HistoryError>;
