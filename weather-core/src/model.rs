use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::HistoryError;

/// A single weather reading for a city.
///
/// This is both the event-bus payload and the persisted record. Before
/// persistence `id` is absent; `created_at` is only authoritative once the
/// history side has stamped it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_id"
    )]
    pub id: Option<i64>,
    pub city: String,
    pub temperature: f64,
    #[serde(default)]
    pub condition: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Reading {
    /// A reading as produced by the provider adapter: no identity, no timestamp.
    pub fn pending(city: impl Into<String>, temperature: f64, condition: impl Into<String>) -> Self {
        Self {
            id: None,
            city: city.into(),
            temperature,
            condition: condition.into(),
            created_at: None,
        }
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some() && self.created_at.is_some()
    }

    /// Same reading with the given commit time.
    pub fn stamped(self, created_at: DateTime<Utc>) -> Self {
        Self {
            created_at: Some(created_at),
            ..self
        }
    }
}

/// Body of a direct write. Every field is required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReading {
    pub city: String,
    pub temperature: f64,
    pub condition: String,
}

impl NewReading {
    pub fn validate(&self) -> Result<(), HistoryError> {
        if self.city.trim().is_empty() {
            return Err(HistoryError::InvalidReading("city must not be empty".to_string()));
        }
        if !self.temperature.is_finite() {
            return Err(HistoryError::InvalidReading(
                "temperature must be a finite number".to_string(),
            ));
        }
        Ok(())
    }
}

impl From<NewReading> for Reading {
    fn from(input: NewReading) -> Self {
        Reading::pending(input.city, input.temperature, input.condition)
    }
}

impl From<&Reading> for NewReading {
    fn from(reading: &Reading) -> Self {
        Self {
            city: reading.city.clone(),
            temperature: reading.temperature,
            condition: reading.condition.clone(),
        }
    }
}

// Producers may send `"id": 0` for a reading that has not been stored yet.
fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let id = Option::<i64>::deserialize(deserializer)?;
    Ok(id.filter(|id| *id != 0))
}
