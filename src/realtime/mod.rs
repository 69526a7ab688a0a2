use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::model::{AlertKind, EmergencyAlert};

mod redis_fanout;

pub use redis_fanout::{RedisFanout, ALERTS_CHANNEL};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertNotification {
    pub id: Uuid,
    pub site_id: Uuid,
    #[serde(rename = "type")]
    pub kind: AlertKind,
}

impl From<&EmergencyAlert> for AlertNotification {
    fn from(alert: &EmergencyAlert) -> Self {
        Self {
            id: alert.id,
            site_id: alert.site_id,
            kind: alert.kind,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

// Called only after the row is durable.
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish(&self, notification: AlertNotification) -> Result<(), FeedError>;
}

#[derive(Clone)]
pub struct AlertFeed {
    tx: broadcast::Sender<AlertNotification>,
    subscribers: Arc<AtomicUsize>,
}

impl Default for AlertFeed {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl AlertFeed {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn subscribe(&self) -> Subscription {
        let count = self.subscribers.fetch_add(1, Ordering::SeqCst) + 1;
        crate::metrics::set_feed_subscribers(count);
        Subscription {
            rx: Some(self.tx.subscribe()),
            subscribers: self.subscribers.clone(),
        }
    }

    pub fn deliver(&self, notification: AlertNotification) -> usize {
        self.tx.send(notification).unwrap_or(0)
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AlertPublisher for AlertFeed {
    async fn publish(&self, notification: AlertNotification) -> Result<(), FeedError> {
        let receivers = self.deliver(notification);
        tracing::debug!(alert_id = %notification.id, receivers, "delivered alert notification");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Alert(AlertNotification),
    Lagged(u64),
}

pub struct Subscription {
    rx: Option<broadcast::Receiver<AlertNotification>>,
    subscribers: Arc<AtomicUsize>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Delivery> {
        let rx = self.rx.as_mut()?;
        match rx.recv().await {
            Ok(notification) => Some(Delivery::Alert(notification)),
            Err(broadcast::error::RecvError::Lagged(missed)) => Some(Delivery::Lagged(missed)),
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }

    pub fn release(&mut self) {
        if self.rx.take().is_some() {
            let count = self.subscribers.fetch_sub(1, Ordering::SeqCst) - 1;
            crate::metrics::set_feed_subscribers(count);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
