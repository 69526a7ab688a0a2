use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::model::{AlertKind, Coordinates, EmergencyAlert, NewAlert};
use crate::realtime::{AlertNotification, AlertPublisher};
use crate::store::{AlertStore, StoreError};

#[derive(Debug, Default, Clone, Deserialize)]
pub struct EmergencyQuery {
    pub site_id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Site ID and type are required")]
    MissingFields,
    #[error("Invalid alert type")]
    InvalidType,
    #[error("Invalid coordinates")]
    InvalidCoordinates,
    // Also covers unknown ids, so the public endpoint cannot enumerate sites.
    #[error("Invalid emergency submission")]
    InvalidSite,
}

impl Rejection {
    pub fn label(&self) -> &'static str {
        match self {
            Rejection::MissingFields => "missing_fields",
            Rejection::InvalidType => "invalid_type",
            Rejection::InvalidCoordinates => "invalid_coordinates",
            Rejection::InvalidSite => "invalid_site",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("submission rejected: {0}")]
    Rejected(Rejection),
    #[error(transparent)]
    Store(StoreError),
}

fn present(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

pub fn parse_kind(kind: Option<&str>) -> Result<AlertKind, Rejection> {
    present(kind)
        .ok_or(Rejection::MissingFields)?
        .parse()
        .map_err(|_| Rejection::InvalidType)
}

// A lone latitude or longitude is dropped; only a full pair is stored.
pub fn parse_coordinates(
    lat: Option<&str>,
    lng: Option<&str>,
) -> Result<Option<Coordinates>, Rejection> {
    let (Some(lat), Some(lng)) = (present(lat), present(lng)) else {
        return Ok(None);
    };

    let latitude: f64 = lat.parse().map_err(|_| Rejection::InvalidCoordinates)?;
    let longitude: f64 = lng.parse().map_err(|_| Rejection::InvalidCoordinates)?;

    Coordinates::new(latitude, longitude)
        .map(Some)
        .map_err(|_| Rejection::InvalidCoordinates)
}

impl EmergencyQuery {
    pub fn into_new_alert(self) -> Result<NewAlert, Rejection> {
        let site_id = present(self.site_id.as_deref()).ok_or(Rejection::MissingFields)?;
        let kind = parse_kind(self.kind.as_deref())?;
        let site_id = Uuid::parse_str(site_id).map_err(|_| Rejection::InvalidSite)?;
        let coordinates = parse_coordinates(self.lat.as_deref(), self.lng.as_deref())?;

        Ok(NewAlert {
            site_id,
            kind,
            coordinates,
        })
    }
}

// A failed announcement does not undo the insert.
pub async fn submit(
    store: &dyn AlertStore,
    publisher: &dyn AlertPublisher,
    alert: NewAlert,
) -> Result<EmergencyAlert, IngestError> {
    let stored = match store.insert_alert(alert).await {
        Ok(stored) => stored,
        Err(StoreError::UnknownSite(site_id)) => {
            info!(%site_id, "emergency submission for unknown site");
            return Err(IngestError::Rejected(Rejection::InvalidSite));
        }
        Err(e) => return Err(IngestError::Store(e)),
    };

    crate::metrics::increment_alerts_ingested(stored.kind.as_str());
    info!(
        alert_id = %stored.id,
        site_id = %stored.site_id,
        kind = %stored.kind,
        has_location = stored.coordinates().is_some(),
        "emergency alert stored"
    );

    if let Err(e) = publisher.publish(AlertNotification::from(&stored)).await {
        error!(alert_id = %stored.id, "failed to publish alert notification: {}", e);
    }

    Ok(stored)
}
