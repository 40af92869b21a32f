use chrono::Utc;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::{
    bus::EventPublisher,
    error::ProviderError,
    model::Reading,
    provider::WeatherProvider,
};

/// Fetch-and-publish front of the pipeline.
#[derive(Clone)]
pub struct IngestService {
    provider: Arc<dyn WeatherProvider>,
    publisher: Arc<dyn EventPublisher>,
}

impl IngestService {
    pub fn new(provider: Arc<dyn WeatherProvider>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            provider,
            publisher,
        }
    }

    /// Fetch current weather for `city` and hand it to the bus.
    ///
    /// The returned reading carries the fetch time in `created_at`. The
    /// publish runs on its own task and is not awaited: its outcome never
    /// affects the result, and nothing is published when the fetch fails.
    #[instrument(skip(self))]
    pub async fn fetch_and_publish(&self, city: &str) -> Result<Reading, ProviderError> {
        let reading = self.provider.current(city).await?.stamped(Utc::now());
        self.publish_detached(reading.clone());
        Ok(reading)
    }

    fn publish_detached(&self, reading: Reading) -> JoinHandle<()> {
        let publisher = self.publisher.clone();

        tokio::spawn(async move {
            match publisher.publish(&reading).await {
                Ok(message_id) => debug!(city = %reading.city, %message_id, "Reading published"),
                Err(e) => warn!(city = %reading.city, error = %e, "Failed to publish reading"),
            }
        })
    }
}
