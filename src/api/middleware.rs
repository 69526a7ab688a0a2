use axum::{
    extract::{Extension, Request},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tower_cookies::Cookies;

use super::AppState;

pub const SESSION_COOKIE: &str = "guardpost_operator";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorId(pub i32);

pub async fn auth_middleware(
    Extension(state): Extension<AppState>,
    cookies: Cookies,
    mut request: Request,
    next: Next,
) -> Response {
    let operator_id = cookies
        .signed(&state.cookie_key)
        .get(SESSION_COOKIE)
        .and_then(|cookie| cookie.value().parse::<i32>().ok());

    match operator_id {
        Some(id) => {
            tracing::Span::current().record("operator_id", id);
            request.extensions_mut().insert(OperatorId(id));
            next.run(request).await
        }
        None => (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"}))).into_response(),
    }
}
