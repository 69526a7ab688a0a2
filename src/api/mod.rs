use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, patch, post},
    Extension, Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_cookies::{CookieManagerLayer, Key};
use tower_http::cors::{Any, CorsLayer};

use crate::notifications::WhatsAppNotifier;
use crate::realtime::{AlertFeed, AlertPublisher};
use crate::store::{AlertStore, SeaOrmStore, SiteDirectory};

pub mod alerts;
pub mod auth;
pub mod emergency;
pub mod middleware;
pub mod notify;
pub mod sites;

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub alerts: Arc<dyn AlertStore>,
    pub sites: Arc<dyn SiteDirectory>,
    pub feed: AlertFeed,
    pub publisher: Arc<dyn AlertPublisher>,
    pub notifier: WhatsAppNotifier,
    pub cookie_key: Key,
    // Cancelled when the server begins shutting down; live streams end with it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        db: DatabaseConnection,
        feed: AlertFeed,
        publisher: Arc<dyn AlertPublisher>,
        notifier: WhatsAppNotifier,
        cookie_key: Key,
    ) -> Self {
        let store = Arc::new(SeaOrmStore::new(db.clone()));
        Self {
            db,
            alerts: store.clone(),
            sites: store,
            feed,
            publisher,
            notifier,
            cookie_key,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }
}

async fn health_check() -> &'static str {
    "OK"
}

pub fn router(state: AppState, dashboard_origin: HeaderValue) -> Router {
    // Reached from agents' phones and kiosks on any origin.
    let public_routes = Router::new()
        .route("/functions/v1/emergency", post(emergency::ingest_emergency))
        .route("/emergency/:token", get(emergency::show_portal))
        .route("/emergency/:token/alerts", post(emergency::submit_portal_alert))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]),
        );

    let auth_routes = Router::new()
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout));

    let protected_routes = Router::new()
        .route("/operators", post(auth::create_operator))
        .route("/alerts", get(alerts::list_alerts))
        .route("/alerts/stream", get(alerts::alert_stream))
        .route("/alerts/:id", get(alerts::get_alert))
        .route("/alerts/:id/acknowledge", post(alerts::acknowledge_alert))
        .route("/sites", get(sites::list_sites).post(sites::create_site))
        .route("/sites/:id", patch(sites::update_site))
        .route("/sites/:id/emergency-link", post(sites::rotate_emergency_link))
        .route("/functions/v1/notify", post(notify::send_notification))
        .route_layer(axum::middleware::from_fn(middleware::auth_middleware));

    let dashboard_routes = auth_routes.merge(protected_routes).layer(
        CorsLayer::new()
            .allow_origin(dashboard_origin)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
    );

    Router::new()
        .route("/health", get(health_check))
        .merge(public_routes)
        .merge(dashboard_routes)
        .layer(Extension(state))
        .layer(CookieManagerLayer::new())
        .layer(
            tower_http::trace::TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<axum::body::Body>| {
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched| matched.as_str());

                    let span_name = match matched_path {
                        Some(path) => format!("{} {}", request.method(), path),
                        None => format!("{} {}", request.method(), request.uri().path()),
                    };

                    let client_ip = request
                        .headers()
                        .get("x-forwarded-for")
                        .and_then(|v| v.to_str().ok())
                        .or_else(|| {
                            request
                                .headers()
                                .get("x-real-ip")
                                .and_then(|v| v.to_str().ok())
                        })
                        .unwrap_or("unknown");

                    // Handlers fill in the empty fields.
                    tracing::info_span!(
                        "request",
                        "otel.name" = span_name,
                        client_ip = client_ip,
                        method = ?request.method(),
                        uri = ?request.uri(),
                        table = tracing::field::Empty,
                        action = tracing::field::Empty,
                        site_id = tracing::field::Empty,
                        alert_id = tracing::field::Empty,
                        operator_id = tracing::field::Empty,
                        business_event = tracing::field::Empty,
                        error = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency = tracing::field::Empty,
                    )
                })
                .on_request(|_request: &axum::http::Request<axum::body::Body>, _span: &tracing::Span| {})
                .on_response(
                    |response: &axum::http::Response<_>, latency: std::time::Duration, span: &tracing::Span| {
                        span.record("status", tracing::field::display(response.status()));
                        span.record("latency", tracing::field::debug(latency));
                        tracing::info!("request completed");
                    },
                ),
        )
}
