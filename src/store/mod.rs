use async_trait::async_trait;
use uuid::Uuid;

use crate::model::{AlertView, EmergencyAlert, LinkedSite, NewAlert};

mod memory;
mod sea;

pub use memory::MemoryStore;
pub use sea::SeaOrmStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
    #[error("alert {0} not found")]
    AlertNotFound(Uuid),
    #[error("site {0} not found")]
    UnknownSite(Uuid),
    #[error("malformed {table} record: {reason}")]
    Malformed { table: &'static str, reason: String },
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Acknowledgement {
    pub alert: EmergencyAlert,
    pub transitioned: bool,
}

#[async_trait]
pub trait AlertStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert_alert(&self, alert: NewAlert) -> Result<EmergencyAlert, StoreError>;

    // Never sets it back.
    async fn acknowledge_alert(&self, id: Uuid) -> Result<Acknowledgement, StoreError>;

    async fn list_alerts(&self) -> Result<Vec<AlertView>, StoreError>;

    async fn find_alert(&self, id: Uuid) -> Result<Option<AlertView>, StoreError>;
}

#[async_trait]
pub trait SiteDirectory: Send + Sync {
    async fn resolve_emergency_link(&self, token: &str) -> Result<Option<LinkedSite>, StoreError>;
}
