use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::{
    error::HistoryResult,
    model::{NewReading, Reading},
    store::{DEFAULT_HISTORY_LIMIT, ReadingStore},
};

/// Write and query side of the reading history.
///
/// Both write paths (direct and queue-driven) go through [`HistoryService::persist`],
/// which stamps `created_at` with the current time right before the insert.
/// Any timestamp carried by the input is discarded.
#[derive(Clone)]
pub struct HistoryService {
    store: Arc<dyn ReadingStore>,
}

impl HistoryService {
    pub fn new(store: Arc<dyn ReadingStore>) -> Self {
        Self { store }
    }

    /// Direct write of a client-supplied reading.
    pub async fn record(&self, input: NewReading) -> HistoryResult<Reading> {
        input.validate()?;
        self.persist(input.into()).await
    }

    /// Store a reading, assigning its commit time.
    #[instrument(skip(self, reading), fields(city = %reading.city))]
    pub async fn persist(&self, reading: Reading) -> HistoryResult<Reading> {
        NewReading::from(&reading).validate()?;

        let pending = Reading { id: None, ..reading }.stamped(Utc::now());
        let stored = self.store.insert(&pending).await?;

        debug!(id = ?stored.id, "Stored reading");
        Ok(stored)
    }

    /// The most recent readings for `city`, newest first.
    pub async fn recent(&self, city: &str) -> HistoryResult<Vec<Reading>> {
        self.list_by_city(city, DEFAULT_HISTORY_LIMIT).await
    }

    pub async fn list_by_city(&self, city: &str, limit: usize) -> HistoryResult<Vec<Reading>> {
        Ok(self.store.list_by_city(city, limit).await?)
    }
}
