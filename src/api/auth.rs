use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, Set, SqlErr,
};
use serde_json::json;
use tower_cookies::{Cookie, Cookies};
use tracing::field::display;
use tracing::info;

use super::middleware::SESSION_COOKIE;
use super::AppState;
use crate::config::BootstrapOperator;
use crate::entities::{operator, Operators};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("failed to hash password")]
    Hash,
    #[error(transparent)]
    Database(#[from] DbErr),
}

pub fn hash_password(password: &str) -> Option<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .ok()
}

fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

async fn insert_operator(
    db: &DatabaseConnection,
    email: String,
    password_hash: String,
    name: String,
) -> Result<operator::Model, DbErr> {
    let now = chrono::Utc::now().naive_utc();
    operator::ActiveModel {
        email: Set(email),
        password_hash: Set(password_hash),
        name: Set(name),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
}

pub async fn ensure_bootstrap_operator(
    db: &DatabaseConnection,
    bootstrap: &BootstrapOperator,
) -> Result<bool, BootstrapError> {
    if Operators::find().count(db).await? > 0 {
        return Ok(false);
    }

    let password_hash = hash_password(&bootstrap.password).ok_or(BootstrapError::Hash)?;
    let created = insert_operator(
        db,
        bootstrap.email.clone(),
        password_hash,
        bootstrap.name.clone(),
    )
    .await?;
    info!(operator_id = created.id, "created bootstrap operator {}", created.email);
    Ok(true)
}

#[derive(serde::Deserialize)]
pub struct CreateOperatorRequest {
    email: String,
    password: String,
    name: String,
}

pub async fn create_operator(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CreateOperatorRequest>,
) -> Response {
    let Some(password_hash) = hash_password(&payload.password) else {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "Failed to hash password"})),
        )
            .into_response();
    };

    match insert_operator(&state.db, payload.email, password_hash, payload.name).await {
        Ok(created) => {
            tracing::Span::current()
                .record("table", "operators")
                .record("action", "create_operator")
                .record("business_event", "Operator created")
                .record("error", tracing::field::Empty);

            (
                StatusCode::CREATED,
                Json(json!({"id": created.id, "email": created.email, "name": created.name})),
            )
                .into_response()
        }
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            tracing::Span::current()
                .record("table", "operators")
                .record("action", "create_operator_failed")
                .record("error", "duplicate_email");

            (
                StatusCode::CONFLICT,
                Json(json!({"error": "Email already exists"})),
            )
                .into_response()
        }
        Err(e) => {
            tracing::Span::current()
                .record("table", "operators")
                .record("action", "create_operator_error")
                .record("error", display(&e));

            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to create operator"})),
            )
                .into_response()
        }
    }
}

#[derive(serde::Deserialize)]
pub struct LoginRequest {
    email: String,
    password: String,
}

pub async fn login(
    Extension(state): Extension<AppState>,
    cookies: Cookies,
    Json(payload): Json<LoginRequest>,
) -> Response {
    let found = match Operators::find()
        .filter(operator::Column::Email.eq(payload.email.clone()))
        .one(&state.db)
        .await
    {
        Ok(found) => found,
        Err(e) => {
            tracing::Span::current()
                .record("table", "operators")
                .record("action", "login_operator_error")
                .record("error", display(&e));
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Login failed"})),
            )
                .into_response();
        }
    };

    let operator = match found {
        Some(op) if verify_password(&payload.password, &op.password_hash) => op,
        _ => {
            tracing::Span::current()
                .record("table", "operators")
                .record("action", "login_operator_failed")
                .record("error", "invalid_credentials");
            return (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Invalid email or password"})),
            )
                .into_response();
        }
    };

    let mut cookie = Cookie::new(SESSION_COOKIE, operator.id.to_string());
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookies.signed(&state.cookie_key).add(cookie);

    tracing::Span::current()
        .record("table", "operators")
        .record("action", "login_operator")
        .record("operator_id", operator.id)
        .record("business_event", "Operator logged in")
        .record("error", tracing::field::Empty);

    (
        StatusCode::OK,
        Json(json!({"id": operator.id, "email": operator.email, "name": operator.name})),
    )
        .into_response()
}

pub async fn logout(cookies: Cookies) -> Response {
    let mut cookie = Cookie::from(SESSION_COOKIE);
    cookie.set_path("/");
    cookies.remove(cookie);

    tracing::Span::current()
        .record("action", "logout_operator")
        .record("business_event", "Operator logged out");

    (StatusCode::OK, Json(json!({"message": "Logged out"}))).into_response()
}
