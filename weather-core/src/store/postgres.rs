use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, postgres::PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument, warn};

use super::ReadingStore;
use crate::{error::StoreError, model::Reading};

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS weather_history (
    id          BIGSERIAL PRIMARY KEY,
    city        TEXT NOT NULL,
    temperature DOUBLE PRECISION NOT NULL,
    condition   TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
)"#;

const CREATE_CITY_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS weather_history_city_created_at_idx
    ON weather_history (city, created_at DESC)"#;

const INSERT_READING: &str = r#"
INSERT INTO weather_history (city, temperature, condition, created_at)
VALUES ($1, $2, $3, COALESCE($4, now()))
RETURNING id, created_at"#;

const SELECT_BY_CITY: &str = r#"
SELECT id, city, temperature, condition, created_at
FROM weather_history
WHERE city = $1
ORDER BY created_at DESC, id DESC
LIMIT $2"#;

/// Open the shared connection pool.
pub async fn connect(
    database_url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(database_url)
        .await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

#[derive(Debug, FromRow)]
struct ReadingRow {
    id: i64,
    city: String,
    temperature: f64,
    condition: String,
    created_at: DateTime<Utc>,
}

impl From<ReadingRow> for Reading {
    fn from(row: ReadingRow) -> Self {
        Reading {
            id: Some(row.id),
            city: row.city,
            temperature: row.temperature,
            condition: row.condition,
            created_at: Some(row.created_at),
        }
    }
}

/// PostgreSQL-backed store over a pool shared by handlers and the consumer.
#[derive(Clone)]
pub struct PgReadingStore {
    pool: PgPool,
    timeout: Duration,
}

impl PgReadingStore {
    /// `timeout` bounds every statement, pool acquisition included.
    pub fn new(pool: PgPool, timeout: Duration) -> Self {
        Self { pool, timeout }
    }

    /// Create the table and index when missing.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.bounded(sqlx::query(CREATE_TABLE).execute(&self.pool))
            .await?;
        self.bounded(sqlx::query(CREATE_CITY_INDEX).execute(&self.pool))
            .await?;
        Ok(())
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        tokio::time::timeout(self.timeout, op)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout.as_secs()))?
            .map_err(StoreError::from)
    }
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    #[instrument(skip(self, reading), fields(city = %reading.city))]
    async fn insert(&self, reading: &Reading) -> Result<Reading, StoreError> {
        let (id, created_at): (i64, DateTime<Utc>) = self
            .bounded(
                sqlx::query_as(INSERT_READING)
                    .bind(&reading.city)
                    .bind(reading.temperature)
                    .bind(&reading.condition)
                    .bind(reading.created_at)
                    .fetch_one(&self.pool),
            )
            .await?;

        Ok(Reading {
            id: Some(id),
            created_at: Some(created_at),
            ..reading.clone()
        })
    }

    #[instrument(skip(self))]
    async fn list_by_city(&self, city: &str, limit: usize) -> Result<Vec<Reading>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .bounded(
                sqlx::query(SELECT_BY_CITY)
                    .bind(city)
                    .bind(limit)
                    .fetch_all(&self.pool),
            )
            .await?;

        let mut readings = Vec::with_capacity(rows.len());
        for row in &rows {
            match ReadingRow::from_row(row) {
                Ok(row) => readings.push(row.into()),
                Err(e) => warn!(error = %e, "Skipping unreadable history row"),
            }
        }

        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DEFAULT_HISTORY_LIMIT;

    async fn test_store() -> PgReadingStore {
        let url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| crate::config::DEFAULT_DATABASE_URL.to_string());
        let pool = connect(&url, 2, Duration::from_secs(5)).await.unwrap();
        let store = PgReadingStore::new(pool, Duration::from_secs(5));
        store.ensure_schema().await.unwrap();
        store
    }

    // Requires a PostgreSQL instance; run with `cargo test -- --ignored`.
    #[tokio::test]
    #[ignore]
    async fn insert_then_list_returns_newest_first() {
        let store = test_store().await;
        let city = format!("Istanbul-{}", std::process::id());

        let first = store
            .insert(&Reading::pending(&city, 20.0, "Clouds").stamped(Utc::now()))
            .await
            .unwrap();
        let second = store
            .insert(&Reading::pending(&city, 21.5, "Clear").stamped(Utc::now()))
            .await
            .unwrap();

        let history = store.list_by_city(&city, DEFAULT_HISTORY_LIMIT).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert_eq!(history[1].id, first.id);
        assert!(second.id > first.id);
    }

    #[tokio::test]
    #[ignore]
    async fn missing_timestamp_is_assigned_by_the_database() {
        let store = test_store().await;
        let stored = store
            .insert(&Reading::pending("Trabzon", 12.0, "Rain"))
            .await
            .unwrap();

        assert!(stored.is_persisted());
    }
}
