use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Danger,
    Contact,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Danger => "danger",
            AlertKind::Contact => "contact",
        }
    }

    pub fn chimes(&self) -> bool {
        matches!(self, AlertKind::Danger)
    }
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown alert type `{0}`")]
pub struct UnknownAlertKind(pub String);

impl FromStr for AlertKind {
    type Err = UnknownAlertKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "danger" => Ok(AlertKind::Danger),
            "contact" => Ok(AlertKind::Contact),
            other => Err(UnknownAlertKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("coordinates out of range: ({latitude}, {longitude})")]
pub struct InvalidCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InvalidCoordinates> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);

        if valid {
            Ok(Self { latitude, longitude })
        } else {
            Err(InvalidCoordinates { latitude, longitude })
        }
    }

    pub fn map_url(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmergencyAlert {
    pub id: Uuid,
    pub site_id: Uuid,
    #[serde(rename = "type")]
    pub kind: AlertKind,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub timestamp: NaiveDateTime,
    pub acknowledged: bool,
}

impl EmergencyAlert {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.latitude, self.longitude) {
            (Some(latitude), Some(longitude)) => Some(Coordinates { latitude, longitude }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewAlert {
    pub site_id: Uuid,
    pub kind: AlertKind,
    pub coordinates: Option<Coordinates>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteSummary {
    pub site_name: Option<String>,
    pub contact_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedSite {
    pub site_id: Uuid,
    pub summary: SiteSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertView {
    #[serde(flatten)]
    pub alert: EmergencyAlert,
    pub site: Option<SiteSummary>,
}

impl AlertView {
    pub fn id(&self) -> Uuid {
        self.alert.id
    }
}
