use tracing::{error, info, warn};

use super::NotificationTemplates;
use crate::config::TwilioSettings;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("TWILIO_WHATSAPP_NUMBER not set")]
    MissingSender,
    #[error("Twilio error: {0}")]
    Twilio(String),
}

fn whatsapp_address(number: &str) -> String {
    if number.starts_with("whatsapp:") {
        number.to_string()
    } else {
        format!("whatsapp:{}", number)
    }
}

#[derive(Clone)]
pub struct WhatsAppNotifier {
    client: Option<twilio::Client>,
    from: Option<String>,
}

impl WhatsAppNotifier {
    pub fn new(settings: &TwilioSettings) -> Self {
        let client = match (&settings.account_sid, &settings.auth_token) {
            (Some(sid), Some(token)) => Some(twilio::Client::new(sid, token)),
            _ => None,
        };

        if client.is_none() {
            warn!("⚠️ Twilio credentials not found. WhatsApp notifications will be mocked.");
        }

        Self {
            client,
            from: settings.whatsapp_number.as_deref().map(whatsapp_address),
        }
    }

    pub fn mock() -> Self {
        Self {
            client: None,
            from: None,
        }
    }

    pub fn is_mock(&self) -> bool {
        self.client.is_none()
    }

    pub async fn send(&self, to_number: &str, body: &str) -> Result<(), NotifyError> {
        let to = whatsapp_address(to_number);

        let Some(client) = &self.client else {
            info!("(Mock) 💬 Would send WhatsApp to: {}", to);
            info!("(Mock) Body length: {} chars", body.len());
            crate::metrics::increment_notifications_sent("whatsapp");
            return Ok(());
        };
        let from = self.from.as_deref().ok_or(NotifyError::MissingSender)?;

        match client
            .send_message(twilio::OutboundMessage::new(from, &to, body))
            .await
        {
            Ok(_) => {
                info!("✅ WhatsApp message sent to {}", to);
                crate::metrics::increment_notifications_sent("whatsapp");
                Ok(())
            }
            Err(e) => {
                error!("❌ Failed to send WhatsApp message: {}", e);
                crate::metrics::increment_notifications_failed("whatsapp");
                Err(NotifyError::Twilio(e.to_string()))
            }
        }
    }

    pub async fn relay(&self, kind: &str, to_number: &str, message: &str) -> Result<(), NotifyError> {
        let body = NotificationTemplates::relay_message(kind, message);
        self.send(to_number, &body).await
    }
}
