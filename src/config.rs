use axum::http::HeaderValue;
use std::env;
use std::net::SocketAddr;
use tracing::{info, warn};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
pub const DEFAULT_DASHBOARD_ORIGIN: &str = "http://localhost:3003";
pub const DEFAULT_GEOLOCATION_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Debug, Clone)]
pub struct BootstrapOperator {
    pub email: String,
    pub password: String,
    pub name: String,
}

#[derive(Debug, Clone, Default)]
pub struct TwilioSettings {
    pub account_sid: Option<String>,
    pub auth_token: Option<String>,
    pub whatsapp_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub redis_url: Option<String>,
    pub dashboard_origin: HeaderValue,
    // At least 64 bytes when set.
    pub session_secret: Option<Vec<u8>>,
    pub bootstrap_operator: Option<BootstrapOperator>,
    pub twilio: TwilioSettings,
}

fn optional(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = optional("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_addr = optional("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                name: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let dashboard_origin = optional("DASHBOARD_ORIGIN")
            .unwrap_or_else(|| DEFAULT_DASHBOARD_ORIGIN.to_string())
            .parse::<HeaderValue>()
            .map_err(|e| ConfigError::Invalid {
                name: "DASHBOARD_ORIGIN",
                reason: e.to_string(),
            })?;

        let session_secret = match optional("SESSION_SECRET") {
            Some(secret) if secret.len() < 64 => {
                return Err(ConfigError::Invalid {
                    name: "SESSION_SECRET",
                    reason: "must be at least 64 bytes".to_string(),
                })
            }
            Some(secret) => Some(secret.into_bytes()),
            None => None,
        };

        let bootstrap_operator = match (
            optional("BOOTSTRAP_OPERATOR_EMAIL"),
            optional("BOOTSTRAP_OPERATOR_PASSWORD"),
        ) {
            (Some(email), Some(password)) => Some(BootstrapOperator {
                email,
                password,
                name: optional("BOOTSTRAP_OPERATOR_NAME").unwrap_or_else(|| "Operations".to_string()),
            }),
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            redis_url: optional("REDIS_URL"),
            dashboard_origin,
            session_secret,
            bootstrap_operator,
            twilio: TwilioSettings {
                account_sid: optional("TWILIO_ACCOUNT_SID"),
                auth_token: optional("TWILIO_AUTH_TOKEN"),
                whatsapp_number: optional("TWILIO_WHATSAPP_NUMBER"),
            },
        })
    }

    pub fn log_summary(&self) {
        info!("--- Configuration ---");
        info!("Bind address: {}", self.bind_addr);
        info!("Dashboard origin: {:?}", self.dashboard_origin);
        info!(
            "Alert fan-out: {}",
            if self.redis_url.is_some() { "redis" } else { "in-process" }
        );
        if self.session_secret.is_none() {
            warn!("SESSION_SECRET not set; operator sessions will not survive a restart");
        }
        if self.bootstrap_operator.is_none() {
            warn!("No bootstrap operator configured");
        }
    }
}
