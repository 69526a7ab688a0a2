use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::json;
use tracing::field::display;

use super::AppState;

fn default_kind() -> String {
    "incident".to_string()
}

#[derive(Deserialize)]
pub struct NotifyRequest {
    pub message: Option<String>,
    pub to: Option<String>,
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
}

// POST /functions/v1/notify
pub async fn send_notification(
    Extension(state): Extension<AppState>,
    Json(payload): Json<NotifyRequest>,
) -> Response {
    let message = payload.message.filter(|m| !m.trim().is_empty());
    let to = payload.to.filter(|t| !t.trim().is_empty());
    let (Some(message), Some(to)) = (message, to) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Message and recipient are required"})),
        )
            .into_response();
    };

    match state.notifier.relay(&payload.kind, &to, &message).await {
        Ok(()) => {
            tracing::Span::current()
                .record("action", "send_whatsapp_notification")
                .record("business_event", "Notification relayed")
                .record("error", tracing::field::Empty);
            (StatusCode::OK, Json(json!({"success": true}))).into_response()
        }
        Err(e) => {
            tracing::Span::current()
                .record("action", "send_whatsapp_notification_error")
                .record("error", display(&e));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to send notification"})),
            )
                .into_response()
        }
    }
}
