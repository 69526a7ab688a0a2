use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, warn};

use crate::model::{AlertKind, Coordinates, SiteSummary};

const FIXED_EMERGENCY_NUMBERS: &[(&str, &str)] = &[
    ("Police", "110"),
    ("Fire Department", "180"),
    ("Ambulance", "185"),
    ("Operations Control", "0708090910"),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyNumber {
    pub name: String,
    pub number: String,
}

pub fn emergency_numbers() -> Vec<EmergencyNumber> {
    FIXED_EMERGENCY_NUMBERS
        .iter()
        .map(|(name, number)| EmergencyNumber {
            name: name.to_string(),
            number: number.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalSite {
    pub site_name: Option<String>,
    pub contact_name: Option<String>,
    pub emergency_numbers: Vec<EmergencyNumber>,
}

impl From<SiteSummary> for PortalSite {
    fn from(summary: SiteSummary) -> Self {
        Self {
            site_name: summary.site_name,
            contact_name: summary.contact_name,
            emergency_numbers: emergency_numbers(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server answered {status}: {message}")]
    Rejected { status: u16, message: String },
    #[error("invalid server url: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeoError {
    #[error("location permission denied")]
    Denied,
    #[error("location unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait Geolocator: Send + Sync {
    async fn locate(&self) -> Result<Coordinates, GeoError>;
}

pub struct NoLocation;

#[async_trait]
impl Geolocator for NoLocation {
    async fn locate(&self) -> Result<Coordinates, GeoError> {
        Err(GeoError::Unavailable("no location source".to_string()))
    }
}

pub struct FixedLocation(pub Coordinates);

#[async_trait]
impl Geolocator for FixedLocation {
    async fn locate(&self) -> Result<Coordinates, GeoError> {
        Ok(self.0)
    }
}

#[async_trait]
pub trait PortalBackend: Send + Sync {
    async fn resolve_site(&self, token: &str) -> Result<Option<PortalSite>, PortalError>;

    async fn submit(
        &self,
        token: &str,
        kind: AlertKind,
        coordinates: Option<Coordinates>,
    ) -> Result<(), PortalError>;
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Clone)]
pub struct HttpPortalBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpPortalBackend {
    pub fn new(base_url: &str) -> Result<Self, PortalError> {
        let parsed = Url::parse(base_url).map_err(|e| PortalError::InvalidUrl(e.to_string()))?;
        if parsed.cannot_be_a_base() {
            return Err(PortalError::InvalidUrl(base_url.to_string()));
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: parsed,
        })
    }

    // The token is one path segment, escaped, whatever it contains.
    fn link_url(&self, token: &str, tail: Option<&str>) -> Result<Url, PortalError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| PortalError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty().push("emergency").push(token);
            if let Some(tail) = tail {
                segments.push(tail);
            }
        }
        Ok(url)
    }

    async fn rejection(resp: reqwest::Response) -> PortalError {
        let status = resp.status().as_u16();
        let message = match resp.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => "Failed to send emergency alert".to_string(),
        };
        PortalError::Rejected { status, message }
    }
}

#[async_trait]
impl PortalBackend for HttpPortalBackend {
    async fn resolve_site(&self, token: &str) -> Result<Option<PortalSite>, PortalError> {
        let resp = self
            .client
            .get(self.link_url(token, None)?)
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(Self::rejection(resp).await);
        }
        Ok(Some(resp.json().await?))
    }

    async fn submit(
        &self,
        token: &str,
        kind: AlertKind,
        coordinates: Option<Coordinates>,
    ) -> Result<(), PortalError> {
        let mut query = vec![("type", kind.as_str().to_string())];
        if let Some(c) = coordinates {
            query.push(("lat", c.latitude.to_string()));
            query.push(("lng", c.longitude.to_string()));
        }

        let resp = self
            .client
            .post(self.link_url(token, Some("alerts"))?)
            .query(&query)
            .send()
            .await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(Self::rejection(resp).await)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PortalState {
    InvalidLink,
    Ready,
    Sending(AlertKind),
    Sent(AlertKind),
    Failed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("invalid emergency link")]
    InvalidLink,
    #[error("an alert is already being sent")]
    InFlight,
    #[error("an alert was already sent")]
    AlreadySent,
    #[error(transparent)]
    Submit(#[from] PortalError),
}

pub struct PortalSession {
    backend: Arc<dyn PortalBackend>,
    geolocator: Arc<dyn Geolocator>,
    token: String,
    site: Option<PortalSite>,
    geolocation_timeout: Duration,
    state: Mutex<PortalState>,
    // Set on the first press; cleared only when that press fails.
    pressed: AtomicBool,
}

impl PortalSession {
    // Any failure is terminal: a dead link is not something to retry.
    pub async fn open(
        backend: Arc<dyn PortalBackend>,
        geolocator: Arc<dyn Geolocator>,
        token: impl Into<String>,
        geolocation_timeout: Duration,
    ) -> Self {
        let token = token.into();
        let site = match backend.resolve_site(&token).await {
            Ok(site) => site,
            Err(e) => {
                warn!("emergency link could not be resolved: {}", e);
                None
            }
        };
        let state = if site.is_some() {
            PortalState::Ready
        } else {
            PortalState::InvalidLink
        };

        Self {
            backend,
            geolocator,
            token,
            site,
            geolocation_timeout,
            state: Mutex::new(state),
            pressed: AtomicBool::new(false),
        }
    }

    pub fn site(&self) -> Option<&PortalSite> {
        self.site.as_ref()
    }

    pub fn state(&self) -> PortalState {
        self.state.lock().map(|s| s.clone()).unwrap_or(PortalState::InvalidLink)
    }

    fn set_state(&self, state: PortalState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    pub async fn trigger(&self, kind: AlertKind) -> Result<(), TriggerError> {
        if self.site.is_none() {
            return Err(TriggerError::InvalidLink);
        }
        if self.pressed.swap(true, Ordering::AcqRel) {
            return Err(match self.state() {
                PortalState::Sent(_) => TriggerError::AlreadySent,
                _ => TriggerError::InFlight,
            });
        }

        self.set_state(PortalState::Sending(kind));
        let coordinates = self.locate().await;

        match self.backend.submit(&self.token, kind, coordinates).await {
            Ok(()) => {
                info!(%kind, has_location = coordinates.is_some(), "emergency alert sent");
                self.set_state(PortalState::Sent(kind));
                Ok(())
            }
            Err(e) => {
                warn!(%kind, "emergency alert failed: {}", e);
                let message = match &e {
                    PortalError::Rejected { message, .. } => message.clone(),
                    PortalError::Transport(_) | PortalError::InvalidUrl(_) => {
                        "Failed to send emergency alert".to_string()
                    }
                };
                self.set_state(PortalState::Failed(message));
                self.pressed.store(false, Ordering::Release);
                Err(e.into())
            }
        }
    }

    async fn locate(&self) -> Option<Coordinates> {
        match tokio::time::timeout(self.geolocation_timeout, self.geolocator.locate()).await {
            Ok(Ok(coordinates)) => Some(coordinates),
            Ok(Err(e)) => {
                warn!("Location not available: {}", e);
                None
            }
            Err(_) => {
                warn!(
                    "Location not available: timed out after {:?}",
                    self.geolocation_timeout
                );
                None
            }
        }
    }
}
