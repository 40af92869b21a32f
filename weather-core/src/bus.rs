//! Fanout event bus carrying pending readings from ingestion to history.
//!
//! Semantics shared by every backend:
//! - one topic, any number of durable queues bound to it
//! - a published message lands in every queue bound *at publish time*;
//!   with no bound queue it is lost
//! - binding is idempotent and never replays earlier messages
//! - deliveries are acknowledged on receipt (at-most-once)

use async_trait::async_trait;

use crate::{error::BusError, model::Reading};

pub mod memory;
pub mod redis_streams;

pub use memory::MemoryBus;
pub use redis_streams::{RedisStreamPublisher, RedisStreamSubscriber};

/// Topic readings are published to.
pub const WEATHER_EVENTS_TOPIC: &str = "weather_events";

/// Durable queue the history service consumes from.
pub const HISTORY_QUEUE: &str = "weather_history";

/// Publishing side of the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish `reading`; returns the broker-assigned message id.
    async fn publish(&self, reading: &Reading) -> Result<String, BusError>;
}

/// Consuming side of the bus, bound to one durable queue.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Declare the queue and bind it to the topic. Safe to call repeatedly.
    async fn bind(&self) -> Result<(), BusError>;

    /// Wait a bounded time for deliveries. An empty batch means "idle".
    ///
    /// Returned deliveries are already acknowledged.
    async fn receive(&self) -> Result<Vec<Delivery>, BusError>;
}

/// A raw message taken off a queue.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub message_id: String,
    pub payload: String,
}

impl Delivery {
    pub fn new(message_id: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            message_id: message_id.into(),
            payload: payload.into(),
        }
    }

    pub fn decode(&self) -> Result<Reading, BusError> {
        Ok(serde_json::from_str(&self.payload)?)
    }
}

/// Canonical wire form of a reading.
pub fn encode(reading: &Reading) -> Result<String, BusError> {
    Ok(serde_json::to_string(reading)?)
}
