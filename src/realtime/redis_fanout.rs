use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use std::cmp::min;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{AlertFeed, AlertNotification, AlertPublisher, FeedError};

pub const ALERTS_CHANNEL: &str = "emergency_alerts";

#[derive(Clone)]
pub struct RedisFanout {
    client: redis::Client,
    channel: String,
}

impl RedisFanout {
    pub fn new(client: redis::Client) -> Self {
        Self {
            client,
            channel: ALERTS_CHANNEL.to_string(),
        }
    }

    pub fn spawn_relay(&self, feed: AlertFeed, cancel: CancellationToken) -> JoinHandle<()> {
        let client = self.client.clone();
        let channel = self.channel.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = relay(client, channel, feed, cancel.clone()) => {
                    info!("Alert relay finished.");
                }
                _ = cancel.cancelled() => {
                    info!("Alert relay cancelled.");
                }
            }
        })
    }
}

#[async_trait]
impl AlertPublisher for RedisFanout {
    async fn publish(&self, notification: AlertNotification) -> Result<(), FeedError> {
        let payload = serde_json::to_string(&notification)?;
        // New connection per alert, so a Redis restart costs one failed publish at most.
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let receivers: i64 = conn.publish(&self.channel, payload).await?;
        debug!(alert_id = %notification.id, receivers, "published alert notification to redis");
        Ok(())
    }
}

async fn relay(client: redis::Client, channel: String, feed: AlertFeed, cancel: CancellationToken) {
    let mut backoff = Duration::from_millis(500);
    let max_backoff = Duration::from_secs(30);

    loop {
        if cancel.is_cancelled() {
            return;
        }

        let mut pubsub = match client.get_async_pubsub().await {
            Ok(p) => p,
            Err(e) => {
                warn!("Alert relay: redis connection failed: {}. Retrying in {:?}", e, backoff);
                let sleep_for = backoff;
                backoff = min(backoff.saturating_mul(2), max_backoff);
                tokio::select! {
                    _ = tokio::time::sleep(sleep_for) => continue,
                    _ = cancel.cancelled() => return,
                }
            }
        };

        if let Err(e) = pubsub.subscribe(&channel).await {
            error!("Alert relay: failed to subscribe to {}: {}", channel, e);
            tokio::select! {
                _ = tokio::time::sleep(backoff) => continue,
                _ = cancel.cancelled() => return,
            }
        }

        info!("Alert relay subscribed to redis channel {}", channel);
        backoff = Duration::from_millis(500);

        let mut messages = pubsub.on_message();
        loop {
            tokio::select! {
                msg = messages.next() => {
                    let Some(msg) = msg else { break };
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            warn!("Alert relay: unreadable payload: {}", e);
                            continue;
                        }
                    };
                    match serde_json::from_str::<AlertNotification>(&payload) {
                        Ok(notification) => {
                            feed.deliver(notification);
                        }
                        Err(e) => warn!("Alert relay: malformed notification {:?}: {}", payload, e),
                    }
                }
                _ = cancel.cancelled() => return,
            }
        }

        // Anything published while disconnected is gone; dashboards re-fetch.
        warn!("Alert relay: redis subscription dropped, reconnecting");
    }
}
