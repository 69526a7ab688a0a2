use axum::body::{Body, BodyDataStream};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use futures::StreamExt;
use guardpost_server::api::{self, auth, AppState};
use guardpost_server::entities::{operator, site};
use guardpost_server::migrator::Migrator;
use guardpost_server::notifications::WhatsAppNotifier;
use guardpost_server::realtime::AlertFeed;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_cookies::Key;
use uuid::Uuid;

pub const DASHBOARD_ORIGIN: &str = "http://localhost:3003";
pub const OPERATOR_EMAIL: &str = "control@guardpost.test";
pub const OPERATOR_PASSWORD: &str = "night-shift-2026";

// One connection, so every query sees the same in-memory database.
pub async fn test_db() -> DatabaseConnection {
    let mut opts = ConnectOptions::new("sqlite::memory:");
    opts.max_connections(1)
        .min_connections(1)
        .sqlx_logging(false);
    let db = Database::connect(opts)
        .await
        .expect("to open in-memory database");
    Migrator::up(&db, None).await.expect("to run migrations");
    db
}

pub struct SeededSite {
    pub id: Uuid,
    pub token: String,
}

pub async fn seed_site(db: &DatabaseConnection, site_name: &str, status: &str) -> SeededSite {
    let now = chrono::Utc::now().naive_utc();
    let id = Uuid::new_v4();
    let token = api::sites::new_link_token();
    site::ActiveModel {
        id: Set(id),
        company_name: Set(Some("Sentinel Guarding".to_string())),
        site_name: Set(Some(site_name.to_string())),
        contact_name: Set(Some("Mariam Koné".to_string())),
        contact_phone: Set(Some("+2250700000001".to_string())),
        emergency_link_id: Set(token.clone()),
        status: Set(status.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(db)
    .await
    .expect("to seed site");
    SeededSite { id, token }
}

pub async fn seed_operator(db: &DatabaseConnection) {
    let now = chrono::Utc::now().naive_utc();
    operator::ActiveModel {
        email: Set(OPERATOR_EMAIL.to_string()),
        password_hash: Set(auth::hash_password(OPERATOR_PASSWORD).expect("to hash")),
        name: Set("Night Control".to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("to seed operator");
}

pub struct TestContext {
    pub db: DatabaseConnection,
    pub feed: AlertFeed,
    app: Router,
}

fn test_state(db: DatabaseConnection, feed: AlertFeed) -> AppState {
    AppState::new(
        db,
        feed.clone(),
        Arc::new(feed),
        WhatsAppNotifier::mock(),
        Key::generate(),
    )
}

pub async fn serve(db: DatabaseConnection, shutdown: CancellationToken) -> (String, JoinHandle<()>) {
    let state = test_state(db, AlertFeed::default()).with_shutdown(shutdown.clone());
    let app = api::router(state, HeaderValue::from_static(DASHBOARD_ORIGIN));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("to bind an ephemeral port");
    let addr = listener.local_addr().expect("local address");
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
            .expect("server to run");
    });
    (format!("http://{}", addr), server)
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_feed(AlertFeed::default()).await
    }

    pub async fn with_feed(feed: AlertFeed) -> Self {
        let db = test_db().await;
        let state = test_state(db.clone(), feed.clone());
        let app = api::router(state, HeaderValue::from_static(DASHBOARD_ORIGIN));
        Self { db, feed, app }
    }

    pub fn app(&self) -> Router {
        self.app.clone()
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.app()
            .oneshot(req)
            .await
            .expect("axum to always respond")
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::builder().method(Method::GET).uri(path);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).expect("to build GET request"))
            .await
    }

    pub async fn post_empty(&self, path: &str, cookie: Option<&str>) -> Response {
        let mut req = Request::builder().method(Method::POST).uri(path);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        self.send(req.body(Body::empty()).expect("to build POST request"))
            .await
    }

    pub async fn send_json<P>(
        &self,
        method: Method,
        path: &str,
        payload: &P,
        cookie: Option<&str>,
    ) -> Response
    where
        P: Serialize + ?Sized,
    {
        let mut req = Request::builder()
            .method(method)
            .uri(path)
            .header(header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref());
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        let body = Body::from(serde_json::to_vec(payload).expect("to serialize request body"));
        self.send(req.body(body).expect("to build request")).await
    }

    pub async fn post<P>(&self, path: &str, payload: &P, cookie: Option<&str>) -> Response
    where
        P: Serialize + ?Sized,
    {
        self.send_json(Method::POST, path, payload, cookie).await
    }

    pub async fn login(&self) -> String {
        seed_operator(&self.db).await;
        let response = self
            .post(
                "/auth/login",
                &serde_json::json!({"email": OPERATOR_EMAIL, "password": OPERATOR_PASSWORD}),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);

        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .expect("login to set a session cookie")
            .to_str()
            .expect("cookie to be ascii");
        set_cookie
            .split(';')
            .next()
            .expect("cookie pair")
            .to_string()
    }
}

pub async fn json_body(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("to read body");
    serde_json::from_slice(&bytes).expect("body to be JSON")
}

#[derive(Debug)]
pub struct SseEvent {
    pub event: String,
    pub data: serde_json::Value,
}

pub struct SseReader {
    body: BodyDataStream,
    buf: String,
}

impl SseReader {
    pub fn new(response: Response) -> Self {
        Self {
            body: response.into_body().into_data_stream(),
            buf: String::new(),
        }
    }

    // `None` once the server ends the stream.
    pub async fn next(&mut self) -> Option<SseEvent> {
        loop {
            while let Some(end) = self.buf.find("\n\n") {
                let frame: String = self.buf.drain(..end + 2).collect();
                let mut event = None;
                let mut data = String::new();
                for line in frame.lines() {
                    if let Some(value) = line.strip_prefix("event:") {
                        event = Some(value.trim_start().to_string());
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data.push_str(value.trim_start());
                    }
                }
                if let Some(event) = event {
                    let data = serde_json::from_str(&data).expect("event data to be JSON");
                    return Some(SseEvent { event, data });
                }
            }

            let chunk = tokio::time::timeout(Duration::from_secs(5), self.body.next())
                .await
                .expect("an event within five seconds")?;
            let chunk = chunk.expect("to read the event stream");
            self.buf
                .push_str(std::str::from_utf8(&chunk).expect("event stream to be UTF-8"));
        }
    }

    pub async fn expect_event(&mut self, event: &str) -> serde_json::Value {
        let next = self.next().await.expect("the stream to stay open");
        assert_eq!(next.event, event, "unexpected event: {:?}", next);
        next.data
    }
}
