use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::field::display;

use super::AppState;
use crate::ingest::{self, EmergencyQuery, IngestError, Rejection};
use crate::model::NewAlert;
use crate::portal::PortalSite;

fn invalid_link() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Invalid emergency link"})),
    )
        .into_response()
}

fn rejected(rejection: Rejection) -> Response {
    crate::metrics::increment_alerts_rejected(rejection.label());
    tracing::Span::current()
        .record("table", "emergency_alerts")
        .record("action", "create_emergency_alert_rejected")
        .record("error", rejection.label());

    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": rejection.to_string()})),
    )
        .into_response()
}

async fn raise(state: &AppState, alert: NewAlert) -> Response {
    match ingest::submit(state.alerts.as_ref(), state.publisher.as_ref(), alert).await {
        Ok(stored) => {
            tracing::Span::current()
                .record("table", "emergency_alerts")
                .record("action", "create_emergency_alert")
                .record("site_id", display(stored.site_id))
                .record("alert_id", display(stored.id))
                .record("business_event", "Emergency alert created")
                .record("error", tracing::field::Empty);

            (
                StatusCode::OK,
                Json(json!({"message": "Emergency alert created successfully"})),
            )
                .into_response()
        }
        Err(IngestError::Rejected(rejection)) => rejected(rejection),
        Err(IngestError::Store(e)) => {
            tracing::Span::current()
                .record("table", "emergency_alerts")
                .record("action", "create_emergency_alert_error")
                .record("error", display(&e));

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to create emergency alert"})),
            )
                .into_response()
        }
    }
}

// POST /functions/v1/emergency?site_id=&type=&lat=&lng=
pub async fn ingest_emergency(
    Extension(state): Extension<AppState>,
    Query(query): Query<EmergencyQuery>,
) -> Response {
    match query.into_new_alert() {
        Ok(alert) => raise(&state, alert).await,
        Err(rejection) => rejected(rejection),
    }
}

// GET /emergency/:token
pub async fn show_portal(
    Extension(state): Extension<AppState>,
    Path(token): Path<String>,
) -> Response {
    match state.sites.resolve_emergency_link(&token).await {
        Ok(Some(linked)) => {
            tracing::Span::current()
                .record("table", "sites")
                .record("action", "resolve_emergency_link")
                .record("site_id", display(linked.site_id));

            (StatusCode::OK, Json(PortalSite::from(linked.summary))).into_response()
        }
        Ok(None) => invalid_link(),
        Err(e) => {
            tracing::Span::current()
                .record("table", "sites")
                .record("action", "resolve_emergency_link_error")
                .record("error", display(&e));

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to load emergency link"})),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct PortalAlertQuery {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub lat: Option<String>,
    pub lng: Option<String>,
}

// POST /emergency/:token/alerts?type=&lat=&lng=
//
// The site is resolved from the link, so the portal never learns its id.
pub async fn submit_portal_alert(
    Extension(state): Extension<AppState>,
    Path(token): Path<String>,
    Query(query): Query<PortalAlertQuery>,
) -> Response {
    let kind = match ingest::parse_kind(query.kind.as_deref()) {
        Ok(kind) => kind,
        Err(rejection) => return rejected(rejection),
    };
    let coordinates = match ingest::parse_coordinates(query.lat.as_deref(), query.lng.as_deref()) {
        Ok(coordinates) => coordinates,
        Err(rejection) => return rejected(rejection),
    };

    let linked = match state.sites.resolve_emergency_link(&token).await {
        Ok(Some(linked)) => linked,
        Ok(None) => return invalid_link(),
        Err(e) => {
            tracing::Span::current()
                .record("table", "sites")
                .record("action", "resolve_emergency_link_error")
                .record("error", display(&e));

            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to create emergency alert"})),
            )
                .into_response();
        }
    };

    raise(
        &state,
        NewAlert {
            site_id: linked.site_id,
            kind,
            coordinates,
        },
    )
    .await
}
