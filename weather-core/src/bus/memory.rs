//! In-process fanout bus with the same binding rules as the broker.
//!
//! Used by tests and local wiring; nothing here survives a restart.

use async_trait::async_trait;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use super::{Delivery, EventPublisher, EventSubscriber, encode};
use crate::{error::BusError, model::Reading};

#[derive(Default)]
struct Inner {
    queues: Mutex<HashMap<String, VecDeque<Delivery>>>,
    published: Notify,
    next_id: AtomicU64,
    unavailable: AtomicBool,
}

/// A single fanout topic with any number of bound queues.
#[derive(Clone, Default)]
pub struct MemoryBus {
    inner: Arc<Inner>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// A subscriber for `queue`; the queue is created by [`EventSubscriber::bind`].
    pub fn subscriber(&self, queue: impl Into<String>) -> MemorySubscriber {
        MemorySubscriber {
            bus: self.clone(),
            queue: queue.into(),
            wait: Duration::from_millis(100),
        }
    }

    /// Simulate the broker going away (or coming back).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.inner.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Publish an arbitrary payload, bypassing serialization.
    pub async fn publish_raw(&self, payload: impl Into<String>) -> Result<String, BusError> {
        if self.inner.unavailable.load(Ordering::SeqCst) {
            return Err(BusError::Publish("broker unavailable".to_string()));
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let message_id = format!("{id}-0");
        let payload = payload.into();

        let mut queues = self.inner.queues.lock().await;
        if queues.is_empty() {
            debug!(message_id = %message_id, "No queue bound, message dropped");
        }
        for queue in queues.values_mut() {
            queue.push_back(Delivery::new(message_id.clone(), payload.clone()));
        }
        drop(queues);

        self.inner.published.notify_waiters();
        Ok(message_id)
    }

    /// Number of undelivered messages in `queue` (zero when unbound).
    pub async fn depth(&self, queue: &str) -> usize {
        self.inner
            .queues
            .lock()
            .await
            .get(queue)
            .map_or(0, VecDeque::len)
    }
}

#[async_trait]
impl EventPublisher for MemoryBus {
    async fn publish(&self, reading: &Reading) -> Result<String, BusError> {
        let payload = encode(reading)?;
        self.publish_raw(payload).await
    }
}

pub struct MemorySubscriber {
    bus: MemoryBus,
    queue: String,
    wait: Duration,
}

impl MemorySubscriber {
    /// How long [`EventSubscriber::receive`] waits on an empty queue.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }
}

#[async_trait]
impl EventSubscriber for MemorySubscriber {
    async fn bind(&self) -> Result<(), BusError> {
        self.bus
            .inner
            .queues
            .lock()
            .await
            .entry(self.queue.clone())
            .or_default();
        Ok(())
    }

    async fn receive(&self) -> Result<Vec<Delivery>, BusError> {
        let published = self.bus.inner.published.notified();

        if let Some(delivery) = self.pop().await? {
            return Ok(vec![delivery]);
        }

        if tokio::time::timeout(self.wait, published).await.is_err() {
            return Ok(vec![]);
        }

        Ok(self.pop().await?.into_iter().collect())
    }
}

impl MemorySubscriber {
    async fn pop(&self) -> Result<Option<Delivery>, BusError> {
        let mut queues = self.bus.inner.queues.lock().await;
        let queue = queues
            .get_mut(&self.queue)
            .ok_or_else(|| BusError::Subscribe(format!("queue '{}' is not bound", self.queue)))?;
        Ok(queue.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn message_published_before_binding_is_lost() {
        let bus = MemoryBus::new();
        bus.publish(&Reading::pending("Ankara", 15.0, "Rain"))
            .await
            .unwrap();

        let subscriber = bus.subscriber("history").with_wait(Duration::from_millis(20));
        subscriber.bind().await.unwrap();

        assert!(subscriber.receive().await.unwrap().is_empty());
        assert_eq!(bus.depth("history").await, 0);
    }

    #[tokio::test]
    async fn every_bound_queue_receives_every_message() {
        let bus = MemoryBus::new();
        let history = bus.subscriber("history");
        let audit = bus.subscriber("audit");
        history.bind().await.unwrap();
        audit.bind().await.unwrap();

        bus.publish(&Reading::pending("Izmir", 19.0, "Clear"))
            .await
            .unwrap();

        assert_eq!(history.receive().await.unwrap()[0].decode().unwrap().city, "Izmir");
        assert_eq!(audit.receive().await.unwrap()[0].decode().unwrap().city, "Izmir");
    }

    #[tokio::test]
    async fn binding_twice_keeps_queued_messages() {
        let bus = MemoryBus::new();
        let subscriber = bus.subscriber("history");
        subscriber.bind().await.unwrap();

        bus.publish_raw("{}").await.unwrap();
        subscriber.bind().await.unwrap();

        assert_eq!(bus.depth("history").await, 1);
    }

    #[tokio::test]
    async fn receive_wakes_up_on_publish() {
        let bus = MemoryBus::new();
        let subscriber = bus.subscriber("history").with_wait(Duration::from_secs(5));
        subscriber.bind().await.unwrap();

        let publisher = bus.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            publisher.publish_raw("payload").await.unwrap();
        });

        let deliveries = subscriber.receive().await.unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].payload, "payload");
    }

    #[tokio::test]
    async fn receive_from_unbound_queue_fails() {
        let bus = MemoryBus::new();
        let err = bus.subscriber("nowhere").receive().await.unwrap_err();

        assert!(matches!(err, BusError::Subscribe(_)));
    }

    #[tokio::test]
    async fn unavailable_bus_rejects_publish() {
        let bus = MemoryBus::new();
        bus.set_unavailable(true);

        let err = bus.publish_raw("{}").await.unwrap_err();
        assert!(matches!(err, BusError::Publish(_)));
    }
}
