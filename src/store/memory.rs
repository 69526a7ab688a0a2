use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{Acknowledgement, AlertStore, SiteDirectory, StoreError};
use crate::model::{AlertView, EmergencyAlert, LinkedSite, NewAlert, SiteSummary};

struct SiteEntry {
    token: String,
    summary: SiteSummary,
    active: bool,
}

#[derive(Default)]
struct Inner {
    // Insertion order.
    alerts: Vec<EmergencyAlert>,
    sites: HashMap<Uuid, SiteEntry>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_site(&self, site_name: &str, contact_name: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        let token = Uuid::new_v4().simple().to_string();
        self.inner.write().await.sites.insert(
            id,
            SiteEntry {
                token: token.clone(),
                summary: SiteSummary {
                    site_name: Some(site_name.to_string()),
                    contact_name: Some(contact_name.to_string()),
                },
                active: true,
            },
        );
        (id, token)
    }

    pub async fn deactivate_site(&self, id: Uuid) {
        if let Some(site) = self.inner.write().await.sites.get_mut(&id) {
            site.active = false;
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn alert_count(&self) -> usize {
        self.inner.read().await.alerts.len()
    }

    fn check_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

fn view(inner: &Inner, alert: &EmergencyAlert) -> AlertView {
    AlertView {
        alert: alert.clone(),
        site: inner.sites.get(&alert.site_id).map(|s| s.summary.clone()),
    }
}

#[async_trait]
impl AlertStore for MemoryStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.check_online()
    }

    async fn insert_alert(&self, alert: NewAlert) -> Result<EmergencyAlert, StoreError> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        if !inner.sites.contains_key(&alert.site_id) {
            return Err(StoreError::UnknownSite(alert.site_id));
        }

        let stored = EmergencyAlert {
            id: Uuid::new_v4(),
            site_id: alert.site_id,
            kind: alert.kind,
            latitude: alert.coordinates.map(|c| c.latitude),
            longitude: alert.coordinates.map(|c| c.longitude),
            timestamp: chrono::Utc::now().naive_utc(),
            acknowledged: false,
        };
        inner.alerts.push(stored.clone());
        Ok(stored)
    }

    async fn acknowledge_alert(&self, id: Uuid) -> Result<Acknowledgement, StoreError> {
        self.check_online()?;
        let mut inner = self.inner.write().await;
        let alert = inner
            .alerts
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or(StoreError::AlertNotFound(id))?;

        let transitioned = !alert.acknowledged;
        alert.acknowledged = true;
        Ok(Acknowledgement {
            alert: alert.clone(),
            transitioned,
        })
    }

    async fn list_alerts(&self) -> Result<Vec<AlertView>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        let mut views: Vec<AlertView> = inner.alerts.iter().rev().map(|a| view(&inner, a)).collect();
        // Stable sort keeps later inserts first when timestamps tie.
        views.sort_by(|a, b| b.alert.timestamp.cmp(&a.alert.timestamp));
        Ok(views)
    }

    async fn find_alert(&self, id: Uuid) -> Result<Option<AlertView>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner.alerts.iter().find(|a| a.id == id).map(|a| view(&inner, a)))
    }
}

#[async_trait]
impl SiteDirectory for MemoryStore {
    async fn resolve_emergency_link(&self, token: &str) -> Result<Option<LinkedSite>, StoreError> {
        self.check_online()?;
        let inner = self.inner.read().await;
        Ok(inner
            .sites
            .iter()
            .find(|(_, site)| site.active && site.token == token)
            .map(|(id, site)| LinkedSite {
                site_id: *id,
                summary: site.summary.clone(),
            }))
    }
}
