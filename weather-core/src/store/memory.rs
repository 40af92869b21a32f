use async_trait::async_trait;
use chrono::Utc;
use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use tokio::sync::Mutex;

use super::ReadingStore;
use crate::{error::StoreError, model::Reading};

/// In-memory store with the same ordering rules as the database.
#[derive(Clone, Default)]
pub struct MemoryStore {
    rows: Arc<Mutex<Vec<Reading>>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the database going away (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }
        Ok(())
    }
}

#[async_trait]
impl ReadingStore for MemoryStore {
    async fn insert(&self, reading: &Reading) -> Result<Reading, StoreError> {
        self.check_available()?;

        let mut rows = self.rows.lock().await;
        let id = i64::try_from(rows.len()).unwrap_or(i64::MAX - 1) + 1;
        let stored = Reading {
            id: Some(id),
            created_at: Some(reading.created_at.unwrap_or_else(Utc::now)),
            ..reading.clone()
        };
        rows.push(stored.clone());

        Ok(stored)
    }

    async fn list_by_city(&self, city: &str, limit: usize) -> Result<Vec<Reading>, StoreError> {
        self.check_available()?;

        let rows = self.rows.lock().await;
        let mut matching: Vec<Reading> = rows.iter().filter(|r| r.city == city).cloned().collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        matching.truncate(limit);

        Ok(matching)
    }
}
