//! Background loop moving readings from the event bus into storage.
//!
//! Deliveries are acknowledged on receipt, so a crash or a storage failure
//! after receipt loses the message. Failures are logged and never reach the
//! producer.

use std::{sync::Arc, time::Duration};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::{
    bus::{Delivery, EventSubscriber},
    error::BusError,
    history::HistoryService,
    model::Reading,
};

const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(1);

pub struct HistoryConsumer {
    subscriber: Arc<dyn EventSubscriber>,
    history: HistoryService,
}

impl HistoryConsumer {
    pub fn new(subscriber: Arc<dyn EventSubscriber>, history: HistoryService) -> Self {
        Self {
            subscriber,
            history,
        }
    }

    /// Bind the durable queue. Must succeed before traffic flows.
    pub async fn bind(&self) -> Result<(), BusError> {
        self.subscriber.bind().await
    }

    /// Consume until `shutdown` turns true (or its sender is dropped).
    ///
    /// The flag is checked between receives; a receive is never cancelled
    /// halfway since its messages are already acknowledged.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        info!("History consumer started");

        while !should_stop(&shutdown) {
            match self.subscriber.receive().await {
                Ok(deliveries) => {
                    for delivery in deliveries {
                        self.handle(delivery).await;
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to receive events");
                    tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                }
            }
        }

        info!("History consumer stopped");
    }

    /// Decode and store one delivery. Returns the stored reading, if any.
    pub async fn handle(&self, delivery: Delivery) -> Option<Reading> {
        let reading = match delivery.decode() {
            Ok(reading) => reading,
            Err(e) => {
                warn!(message_id = %delivery.message_id, error = %e, "Discarding undecodable event");
                return None;
            }
        };

        match self.history.persist(reading).await {
            Ok(stored) => {
                info!(message_id = %delivery.message_id, city = %stored.city, id = ?stored.id, "Stored reading from event");
                Some(stored)
            }
            Err(e) => {
                error!(message_id = %delivery.message_id, error = %e, "Dropping event, storage failed");
                None
            }
        }
    }
}

fn should_stop(shutdown: &watch::Receiver<bool>) -> bool {
    *shutdown.borrow() || shutdown.has_changed().is_err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::{EventPublisher, MemoryBus},
        store::MemoryStore,
    };

    struct Fixture {
        bus: MemoryBus,
        store: MemoryStore,
        consumer: Arc<HistoryConsumer>,
    }

    async fn fixture() -> Fixture {
        let bus = MemoryBus::new();
        let store = MemoryStore::new();
        let subscriber = bus.subscriber("weather_history").with_wait(Duration::from_millis(10));
        let consumer = Arc::new(HistoryConsumer::new(
            Arc::new(subscriber),
            HistoryService::new(Arc::new(store.clone())),
        ));
        consumer.bind().await.unwrap();

        Fixture {
            bus,
            store,
            consumer,
        }
    }

    async fn wait_for_rows(store: &MemoryStore, rows: usize) {
        for _ in 0..200 {
            if store.len().await >= rows {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {rows} stored readings, found {}", store.len().await);
    }

    #[tokio::test]
    async fn malformed_event_does_not_stop_the_loop() {
        let f = fixture().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let consumer = f.consumer.clone();
        let task = tokio::spawn(async move { consumer.run(shutdown_rx).await });

        f.bus.publish_raw("{definitely not json").await.unwrap();
        f.bus
            .publish(&Reading::pending("Ankara", 15.0, "Rain"))
            .await
            .unwrap();

        wait_for_rows(&f.store, 1).await;
        let history = HistoryService::new(Arc::new(f.store.clone()));
        let stored = history.recent("Ankara").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].temperature, 15.0);
        assert_eq!(stored[0].condition, "Rain");

        shutdown_tx.send(true).unwrap();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn storage_failure_drops_the_event_and_keeps_consuming() {
        let f = fixture().await;

        f.store.set_unavailable(true);
        let lost = f
            .consumer
            .handle(Delivery::new("1-0", r#"{"city":"Izmir","temperature":19.0,"condition":"Clear"}"#))
            .await;
        assert!(lost.is_none());

        f.store.set_unavailable(false);
        let stored = f
            .consumer
            .handle(Delivery::new("2-0", r#"{"city":"Izmir","temperature":20.0,"condition":"Clear"}"#))
            .await;
        assert_eq!(stored.and_then(|r| r.id), Some(1));
        assert_eq!(f.store.len().await, 1);
    }

    #[tokio::test]
    async fn invalid_reading_is_discarded() {
        let f = fixture().await;
        let stored = f
            .consumer
            .handle(Delivery::new("1-0", r#"{"city":"","temperature":1.0,"condition":"x"}"#))
            .await;

        assert!(stored.is_none());
        assert!(f.store.is_empty().await);
    }

    #[tokio::test]
    async fn event_published_before_binding_is_never_stored() {
        let bus = MemoryBus::new();
        let store = MemoryStore::new();
        bus.publish(&Reading::pending("Ankara", 15.0, "Rain"))
            .await
            .unwrap();

        let subscriber = bus.subscriber("weather_history").with_wait(Duration::from_millis(10));
        let consumer = HistoryConsumer::new(
            Arc::new(subscriber),
            HistoryService::new(Arc::new(store.clone())),
        );
        consumer.bind().await.unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let run = consumer.run(shutdown_rx);
        let stop = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            shutdown_tx.send(true).unwrap();
        };
        tokio::join!(run, stop);

        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn run_returns_when_shutdown_sender_is_dropped() {
        let f = fixture().await;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        drop(shutdown_tx);

        tokio::time::timeout(Duration::from_secs(1), f.consumer.run(shutdown_rx))
            .await
            .expect("consumer must stop");
    }
}
