use axum::routing::get;
use guardpost_server::api::{self, auth, AppState};
use guardpost_server::config::AppConfig;
use guardpost_server::notifications::WhatsAppNotifier;
use guardpost_server::realtime::{AlertFeed, AlertPublisher, RedisFanout};
use guardpost_server::{migrator, telemetry};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_cookies::Key;

#[tokio::main]
async fn main() {
    let config = AppConfig::from_env().expect("Invalid configuration");

    telemetry::init_telemetry("guardpost-server");
    config.log_summary();

    let (prometheus_layer, metric_handle) = axum_prometheus::PrometheusMetricLayer::pair();

    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    migrator::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    if let Some(bootstrap) = &config.bootstrap_operator {
        auth::ensure_bootstrap_operator(&db, bootstrap)
            .await
            .expect("Failed to create bootstrap operator");
    }

    guardpost_server::metrics::init_metrics(&db).await;

    let feed = AlertFeed::default();
    let shutdown = CancellationToken::new();

    // With Redis every instance publishes there and relays back into its
    // own feed; without it inserts go straight to the local feed.
    let publisher: Arc<dyn AlertPublisher> = match &config.redis_url {
        Some(url) => {
            let client = redis::Client::open(url.as_str()).expect("Invalid Redis URL");
            let fanout = RedisFanout::new(client);
            fanout.spawn_relay(feed.clone(), shutdown.clone());
            Arc::new(fanout)
        }
        None => Arc::new(feed.clone()),
    };

    let cookie_key = match &config.session_secret {
        Some(secret) => Key::from(secret.as_slice()),
        None => Key::generate(),
    };

    let state = AppState::new(
        db,
        feed,
        publisher,
        WhatsAppNotifier::new(&config.twilio),
        cookie_key,
    )
    .with_shutdown(shutdown.clone());

    let app = api::router(state, config.dashboard_origin.clone())
        .layer(prometheus_layer)
        .route("/metrics", get(|| async move { metric_handle.render() }));

    tracing::info!("listening on {}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .expect("Failed to bind");

    let signal = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
            signal.cancel();
        })
        .await
        .expect("Server error");
}
