//! Persistent storage for readings.
//!
//! Writes are single atomic statements; readings are never updated or
//! deleted once stored.

use async_trait::async_trait;

use crate::{error::StoreError, model::Reading};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgReadingStore;

/// Default number of rows returned by a history query.
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Insert `reading`, returning it with its storage-assigned `id`.
    ///
    /// A supplied `created_at` is stored unchanged; a missing one is set to
    /// the current time. Any `id` on the input is ignored.
    async fn insert(&self, reading: &Reading) -> Result<Reading, StoreError>;

    /// At most `limit` readings for `city` (case-sensitive), newest first.
    ///
    /// Equal timestamps are ordered by descending `id`.
    async fn list_by_city(&self, city: &str, limit: usize) -> Result<Vec<Reading>, StoreError>;
}
