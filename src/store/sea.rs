use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use super::{Acknowledgement, AlertStore, SiteDirectory, StoreError};
use crate::entities::{emergency_alert, site, EmergencyAlerts, Sites};
use crate::model::{AlertView, EmergencyAlert, LinkedSite, NewAlert, SiteSummary};

#[derive(Clone)]
pub struct SeaOrmStore {
    db: DatabaseConnection,
}

impl SeaOrmStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

impl TryFrom<emergency_alert::Model> for EmergencyAlert {
    type Error = StoreError;

    fn try_from(model: emergency_alert::Model) -> Result<Self, Self::Error> {
        let kind = model.kind.parse().map_err(|e| StoreError::Malformed {
            table: "emergency_alerts",
            reason: format!("alert {}: {}", model.id, e),
        })?;

        Ok(Self {
            id: model.id,
            site_id: model.site_id,
            kind,
            latitude: model.latitude,
            longitude: model.longitude,
            timestamp: model.timestamp,
            acknowledged: model.acknowledged,
        })
    }
}

impl From<site::Model> for SiteSummary {
    fn from(model: site::Model) -> Self {
        Self {
            site_name: model.site_name,
            contact_name: model.contact_name,
        }
    }
}

fn into_view(
    (alert, site): (emergency_alert::Model, Option<site::Model>),
) -> Result<AlertView, StoreError> {
    Ok(AlertView {
        alert: alert.try_into()?,
        site: site.map(SiteSummary::from),
    })
}

#[async_trait]
impl AlertStore for SeaOrmStore {
    async fn ping(&self) -> Result<(), StoreError> {
        self.db.ping().await?;
        Ok(())
    }

    async fn insert_alert(&self, alert: NewAlert) -> Result<EmergencyAlert, StoreError> {
        if Sites::find_by_id(alert.site_id).one(&self.db).await?.is_none() {
            return Err(StoreError::UnknownSite(alert.site_id));
        }

        let row = emergency_alert::ActiveModel {
            id: Set(Uuid::new_v4()),
            site_id: Set(alert.site_id),
            kind: Set(alert.kind.as_str().to_string()),
            latitude: Set(alert.coordinates.map(|c| c.latitude)),
            longitude: Set(alert.coordinates.map(|c| c.longitude)),
            timestamp: Set(chrono::Utc::now().naive_utc()),
            acknowledged: Set(false),
        };

        row.insert(&self.db).await?.try_into()
    }

    async fn acknowledge_alert(&self, id: Uuid) -> Result<Acknowledgement, StoreError> {
        // Conditional update: concurrent acknowledges converge and only one
        // of them sees a row change.
        let result = EmergencyAlerts::update_many()
            .col_expr(emergency_alert::Column::Acknowledged, Expr::value(true))
            .filter(emergency_alert::Column::Id.eq(id))
            .filter(emergency_alert::Column::Acknowledged.eq(false))
            .exec(&self.db)
            .await?;

        let model = EmergencyAlerts::find_by_id(id)
            .one(&self.db)
            .await?
            .ok_or(StoreError::AlertNotFound(id))?;

        Ok(Acknowledgement {
            alert: model.try_into()?,
            transitioned: result.rows_affected == 1,
        })
    }

    async fn list_alerts(&self) -> Result<Vec<AlertView>, StoreError> {
        EmergencyAlerts::find()
            .find_also_related(Sites)
            .order_by_desc(emergency_alert::Column::Timestamp)
            .all(&self.db)
            .await?
            .into_iter()
            .map(into_view)
            .collect()
    }

    async fn find_alert(&self, id: Uuid) -> Result<Option<AlertView>, StoreError> {
        EmergencyAlerts::find_by_id(id)
            .find_also_related(Sites)
            .one(&self.db)
            .await?
            .map(into_view)
            .transpose()
    }
}

#[async_trait]
impl SiteDirectory for SeaOrmStore {
    async fn resolve_emergency_link(&self, token: &str) -> Result<Option<LinkedSite>, StoreError> {
        let site = Sites::find()
            .filter(site::Column::EmergencyLinkId.eq(token))
            .filter(site::Column::Status.eq(site::STATUS_ACTIVE))
            .one(&self.db)
            .await?;

        Ok(site.map(|s| LinkedSite {
            site_id: s.id,
            summary: s.into(),
        }))
    }
}
