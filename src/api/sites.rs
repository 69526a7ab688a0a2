use axum::{
    extract::{Extension, Json, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{ActiveModelTrait, EntityTrait, QueryOrder, Set};
use serde::Deserialize;
use serde_json::json;
use tracing::field::display;
use uuid::Uuid;

use super::AppState;
use crate::entities::{site, Sites};

pub fn new_link_token() -> String {
    Uuid::new_v4().simple().to_string()
}

fn valid_status(status: &str) -> bool {
    status == site::STATUS_ACTIVE || status == site::STATUS_INACTIVE
}

fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Site not found"})),
    )
        .into_response()
}

fn server_error(action: &'static str, e: &sea_orm::DbErr, message: &'static str) -> Response {
    tracing::Span::current()
        .record("table", "sites")
        .record("action", action)
        .record("error", display(e));
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": message})),
    )
        .into_response()
}

// GET /sites
pub async fn list_sites(Extension(state): Extension<AppState>) -> Response {
    match Sites::find()
        .order_by_asc(site::Column::SiteName)
        .all(&state.db)
        .await
    {
        Ok(sites) => (StatusCode::OK, Json(sites)).into_response(),
        Err(e) => server_error("list_sites_error", &e, "Failed to fetch sites"),
    }
}

#[derive(Deserialize)]
pub struct CreateSiteRequest {
    pub company_name: Option<String>,
    pub site_name: String,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
}

// POST /sites
pub async fn create_site(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CreateSiteRequest>,
) -> Response {
    if payload.site_name.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "Site name is required"})),
        )
            .into_response();
    }

    let now = chrono::Utc::now().naive_utc();
    let new_site = site::ActiveModel {
        id: Set(Uuid::new_v4()),
        company_name: Set(payload.company_name),
        site_name: Set(Some(payload.site_name)),
        contact_name: Set(payload.contact_name),
        contact_phone: Set(payload.contact_phone),
        emergency_link_id: Set(new_link_token()),
        status: Set(site::STATUS_ACTIVE.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match new_site.insert(&state.db).await {
        Ok(created) => {
            tracing::Span::current()
                .record("table", "sites")
                .record("action", "create_site")
                .record("site_id", display(created.id))
                .record("business_event", "Site registered")
                .record("error", tracing::field::Empty);

            crate::metrics::increment_sites();
            (StatusCode::CREATED, Json(created)).into_response()
        }
        Err(e) => server_error("create_site_error", &e, "Failed to create site"),
    }
}

#[derive(Deserialize)]
pub struct UpdateSiteRequest {
    pub company_name: Option<String>,
    pub site_name: Option<String>,
    pub contact_name: Option<String>,
    pub contact_phone: Option<String>,
    pub status: Option<String>,
}

// PATCH /sites/:id
pub async fn update_site(
    Extension(state): Extension<AppState>,
    Path(site_id): Path<Uuid>,
    Json(payload): Json<UpdateSiteRequest>,
) -> Response {
    tracing::Span::current().record("site_id", display(site_id));

    if let Some(status) = payload.status.as_deref() {
        if !valid_status(status) {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Status must be active or inactive"})),
            )
                .into_response();
        }
    }

    let existing = match Sites::find_by_id(site_id).one(&state.db).await {
        Ok(Some(s)) => s,
        Ok(None) => return not_found(),
        Err(e) => return server_error("update_site_error", &e, "Failed to update site"),
    };
    let was_active = existing.status == site::STATUS_ACTIVE;

    let mut active: site::ActiveModel = existing.into();
    if let Some(company_name) = payload.company_name {
        active.company_name = Set(Some(company_name));
    }
    if let Some(site_name) = payload.site_name {
        active.site_name = Set(Some(site_name));
    }
    if let Some(contact_name) = payload.contact_name {
        active.contact_name = Set(Some(contact_name));
    }
    if let Some(contact_phone) = payload.contact_phone {
        active.contact_phone = Set(Some(contact_phone));
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    active.updated_at = Set(chrono::Utc::now().naive_utc());

    match active.update(&state.db).await {
        Ok(updated) => {
            let is_active = updated.status == site::STATUS_ACTIVE;
            match (was_active, is_active) {
                (false, true) => crate::metrics::increment_sites(),
                (true, false) => crate::metrics::decrement_sites(),
                _ => {}
            }

            tracing::Span::current()
                .record("table", "sites")
                .record("action", "update_site")
                .record("business_event", "Site updated")
                .record("error", tracing::field::Empty);
            (StatusCode::OK, Json(updated)).into_response()
        }
        Err(e) => server_error("update_site_error", &e, "Failed to update site"),
    }
}

// POST /sites/:id/emergency-link
//
// Issues a new token; the previous link stops resolving immediately.
pub async fn rotate_emergency_link(
    Extension(state): Extension<AppState>,
    Path(site_id): Path<Uuid>,
) -> Response {
    tracing::Span::current().record("site_id", display(site_id));

    let existing = match Sites::find_by_id(site_id).one(&state.db).await {
        Ok(Some(s)) => s,
        Ok(None) => return not_found(),
        Err(e) => return server_error("rotate_link_error", &e, "Failed to rotate emergency link"),
    };

    let mut active: site::ActiveModel = existing.into();
    active.emergency_link_id = Set(new_link_token());
    active.updated_at = Set(chrono::Utc::now().naive_utc());

    match active.update(&state.db).await {
        Ok(updated) => {
            tracing::Span::current()
                .record("table", "sites")
                .record("action", "rotate_emergency_link")
                .record("business_event", "Emergency link rotated")
                .record("error", tracing::field::Empty);
            (
                StatusCode::OK,
                Json(json!({"emergency_link_id": updated.emergency_link_id})),
            )
                .into_response()
        }
        Err(e) => server_error("rotate_link_error", &e, "Failed to rotate emergency link"),
    }
}
