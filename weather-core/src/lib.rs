//! Core library for the weather ingestion and history services.
//!
//! This crate defines:
//! - Configuration loading
//! - The upstream provider adapter
//! - The fanout event bus carrying readings between services
//! - Storage, history queries and the consumer loop feeding them
//!
//! It is used by `weather-server`, which wires these pieces behind HTTP.
//! Every shared connection (broker, pool) is built once at startup and
//! passed into the components that need it.

pub mod bus;
pub mod config;
pub mod consumer;
pub mod error;
pub mod history;
pub mod ingest;
pub mod model;
pub mod provider;
pub mod store;
pub mod telemetry;

pub use bus::{EventPublisher, EventSubscriber};
pub use config::Config;
pub use consumer::HistoryConsumer;
pub use error::{BusError, HistoryError, ProviderError, StoreError};
pub use history::HistoryService;
pub use ingest::IngestService;
pub use model::{NewReading, Reading};
pub use provider::WeatherProvider;
pub use store::ReadingStore;
