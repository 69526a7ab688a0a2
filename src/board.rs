use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::model::AlertView;
use crate::realtime::{AlertFeed, AlertNotification, Delivery, Subscription};
use crate::store::{Acknowledgement, AlertStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("could not reach the alert store: {0}")]
    Connectivity(StoreError),
    #[error("alert history has not been loaded")]
    HistoryNotLoaded,
    #[error("alert {0} not found")]
    NotFound(Uuid),
    #[error("failed to acknowledge alert: {0}")]
    Acknowledge(StoreError),
    #[error("alert board was torn down")]
    TornDown,
}

impl BoardError {
    pub fn operator_message(&self) -> &'static str {
        match self {
            BoardError::Connectivity(_) => {
                "Cannot reach the alert service. Check your connection and retry."
            }
            BoardError::HistoryNotLoaded => "Alerts are not loaded yet.",
            BoardError::NotFound(_) => "That alert no longer exists.",
            BoardError::Acknowledge(_) => "Acknowledgement failed. Please try again.",
            BoardError::TornDown => "This alert view is closed.",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BoardEvent {
    Arrived { alert: AlertView, chime: bool },
    Lagged(u64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Unloaded,
    Loaded,
    Live,
    Closed,
}

pub struct AlertBoard {
    store: Arc<dyn AlertStore>,
    feed: AlertFeed,
    alerts: Vec<AlertView>,
    subscription: Option<Subscription>,
    // Received but not yet fetched; survives a cancelled `next_event`.
    pending: Option<AlertNotification>,
    chimed: HashSet<Uuid>,
    cancel: CancellationToken,
    phase: Phase,
}

impl AlertBoard {
    pub fn new(store: Arc<dyn AlertStore>, feed: AlertFeed) -> Self {
        Self::with_cancel(store, feed, CancellationToken::new())
    }

    pub fn with_cancel(
        store: Arc<dyn AlertStore>,
        feed: AlertFeed,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            feed,
            alerts: Vec::new(),
            subscription: None,
            pending: None,
            chimed: HashSet::new(),
            cancel,
            phase: Phase::Unloaded,
        }
    }

    pub fn alerts(&self) -> &[AlertView] {
        &self.alerts
    }

    pub fn is_live(&self) -> bool {
        self.phase == Phase::Live
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn load_history(&mut self) -> Result<&[AlertView], BoardError> {
        if self.phase == Phase::Closed {
            return Err(BoardError::TornDown);
        }

        let history = tokio::select! {
            _ = self.cancel.cancelled() => return Err(BoardError::TornDown),
            result = async {
                self.store.ping().await?;
                self.store.list_alerts().await
            } => result.map_err(|e| {
                error!("failed to load alert history: {}", e);
                BoardError::Connectivity(e)
            })?,
        };

        debug!(count = history.len(), "loaded alert history");
        self.alerts = history;
        if self.phase == Phase::Unloaded {
            self.phase = Phase::Loaded;
        }
        Ok(&self.alerts)
    }

    pub async fn refresh(&mut self) -> Result<&[AlertView], BoardError> {
        if self.phase == Phase::Unloaded {
            return Err(BoardError::HistoryNotLoaded);
        }
        self.load_history().await
    }

    pub fn subscribe(&mut self) -> Result<(), BoardError> {
        match self.phase {
            Phase::Unloaded => Err(BoardError::HistoryNotLoaded),
            Phase::Closed => Err(BoardError::TornDown),
            Phase::Live => Ok(()),
            Phase::Loaded => {
                self.subscription = Some(self.feed.subscribe());
                self.phase = Phase::Live;
                Ok(())
            }
        }
    }

    // Cancel-safe: a notification received before the future was dropped
    // is fetched on the next call.
    pub async fn next_event(&mut self) -> Option<BoardEvent> {
        loop {
            if self.cancel.is_cancelled() {
                return None;
            }

            let notification = match self.pending {
                Some(n) => n,
                None => {
                    let subscription = self.subscription.as_mut()?;
                    let delivery = tokio::select! {
                        _ = self.cancel.cancelled() => return None,
                        delivery = subscription.recv() => delivery?,
                    };
                    match delivery {
                        Delivery::Alert(n) => {
                            self.pending = Some(n);
                            n
                        }
                        Delivery::Lagged(missed) => {
                            warn!(missed, "alert feed lagged");
                            return Some(BoardEvent::Lagged(missed));
                        }
                    }
                }
            };

            let fetched = tokio::select! {
                _ = self.cancel.cancelled() => return None,
                fetched = self.store.find_alert(notification.id) => fetched,
            };
            self.pending = None;

            match fetched {
                Ok(Some(alert)) => {
                    if self.alerts.iter().any(|a| a.id() == alert.id()) {
                        debug!(alert_id = %alert.id(), "live alert already listed");
                        continue;
                    }
                    let chime = alert.alert.kind.chimes() && self.chimed.insert(alert.id());
                    if chime {
                        crate::metrics::increment_chimes();
                    }
                    self.alerts.insert(0, alert.clone());
                    return Some(BoardEvent::Arrived { alert, chime });
                }
                Ok(None) => {
                    warn!(alert_id = %notification.id, "notified alert is not readable");
                }
                Err(e) => {
                    error!(alert_id = %notification.id, "error processing new alert: {}", e);
                }
            }
        }
    }

    // Memory changes only after the store confirms.
    pub async fn acknowledge(&mut self, id: Uuid) -> Result<(), BoardError> {
        if self.phase == Phase::Closed {
            return Err(BoardError::TornDown);
        }

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return Err(BoardError::TornDown),
            result = self.store.acknowledge_alert(id) => result,
        };

        let ack = match result {
            Ok(ack) => ack,
            Err(StoreError::AlertNotFound(id)) => return Err(BoardError::NotFound(id)),
            Err(e) => {
                error!(alert_id = %id, "error acknowledging alert: {}", e);
                return Err(BoardError::Acknowledge(e));
            }
        };

        observe_acknowledgement(&ack);

        if let Some(listed) = self.alerts.iter_mut().find(|a| a.id() == id) {
            listed.alert.acknowledged = true;
        }
        Ok(())
    }

    pub fn teardown(&mut self) {
        self.cancel.cancel();
        if let Some(mut subscription) = self.subscription.take() {
            subscription.release();
        }
        self.pending = None;
        self.phase = Phase::Closed;
    }
}

pub fn observe_acknowledgement(ack: &Acknowledgement) {
    if ack.transitioned {
        let elapsed = chrono::Utc::now().naive_utc() - ack.alert.timestamp;
        crate::metrics::record_acknowledgment(elapsed.num_milliseconds() as f64 / 1000.0);
    }
}

impl Drop for AlertBoard {
    fn drop(&mut self) {
        self.teardown();
    }
}
