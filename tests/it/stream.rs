use axum::http::{header, StatusCode};
use guardpost_server::realtime::AlertFeed;
use sea_orm::ConnectionTrait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::support::{seed_operator, seed_site, serve, test_db, SseReader, TestContext};
use crate::support::{OPERATOR_EMAIL, OPERATOR_PASSWORD};

async fn raise(t: &TestContext, site_id: uuid::Uuid, kind: &str) {
    let response = t
        .post_empty(
            &format!("/functions/v1/emergency?site_id={}&type={}", site_id, kind),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

async fn open_stream(t: &TestContext, cookie: &str) -> SseReader {
    let response = t.get("/alerts/stream", Some(cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        mime::TEXT_EVENT_STREAM.as_ref()
    );
    SseReader::new(response)
}

#[tokio::test]
async fn stream_requires_a_session() {
    let t = TestContext::new().await;
    let response = t.get("/alerts/stream", None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(t.feed.subscriber_count(), 0);
}

#[tokio::test]
async fn snapshot_then_live_alerts_with_chime() {
    let t = TestContext::new().await;
    let cookie = t.login().await;
    let site = seed_site(&t.db, "Treichville Port", "active").await;
    raise(&t, site.id, "contact").await;

    let mut events = open_stream(&t, &cookie).await;
    let snapshot = events.expect_event("snapshot").await;
    assert_eq!(snapshot.as_array().unwrap().len(), 1);
    assert_eq!(snapshot[0]["site"]["site_name"], "Treichville Port");
    assert_eq!(t.feed.subscriber_count(), 1);

    raise(&t, site.id, "danger").await;
    let danger = events.expect_event("alert").await;
    assert_eq!(danger["chime"], true);
    assert_eq!(danger["alert"]["type"], "danger");
    assert_eq!(danger["alert"]["site_id"], site.id.to_string());
    assert_eq!(danger["alert"]["site"]["contact_name"], "Mariam Koné");

    raise(&t, site.id, "contact").await;
    let contact = events.expect_event("alert").await;
    assert_eq!(contact["chime"], false);
    assert_eq!(contact["alert"]["type"], "contact");

    drop(events);
    assert_eq!(t.feed.subscriber_count(), 0);
}

#[tokio::test]
async fn failed_history_sends_one_error_and_ends() {
    let t = TestContext::new().await;
    let cookie = t.login().await;
    t.db.execute_unprepared("DROP TABLE emergency_alerts")
        .await
        .unwrap();

    let mut events = open_stream(&t, &cookie).await;
    let error = events.expect_event("error").await;
    assert!(error["error"].as_str().unwrap().contains("Cannot reach"));
    assert!(events.next().await.is_none());
    assert_eq!(t.feed.subscriber_count(), 0);
}

#[tokio::test]
async fn lagging_stream_reports_the_gap_and_resyncs() {
    let t = TestContext::with_feed(AlertFeed::new(1)).await;
    let cookie = t.login().await;
    let site = seed_site(&t.db, "Adjamé Market", "active").await;

    let mut events = open_stream(&t, &cookie).await;
    assert!(events
        .expect_event("snapshot")
        .await
        .as_array()
        .unwrap()
        .is_empty());

    for _ in 0..3 {
        raise(&t, site.id, "danger").await;
    }

    let lagged = events.expect_event("lagged").await;
    assert_eq!(lagged["missed"], 2);
    let snapshot = events.expect_event("snapshot").await;
    assert_eq!(snapshot.as_array().unwrap().len(), 3);
    assert_eq!(t.feed.subscriber_count(), 1);
}

#[tokio::test]
async fn open_stream_does_not_block_shutdown() {
    let db = test_db().await;
    seed_operator(&db).await;
    let shutdown = CancellationToken::new();
    let (base_url, server) = serve(db, shutdown.clone()).await;

    let client = reqwest::Client::new();
    let login = client
        .post(format!("{}/auth/login", base_url))
        .json(&serde_json::json!({"email": OPERATOR_EMAIL, "password": OPERATOR_PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), reqwest::StatusCode::OK);
    let cookie = login
        .headers()
        .get(reqwest::header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let mut stream = client
        .get(format!("{}/alerts/stream", base_url))
        .header(reqwest::header::COOKIE, cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(stream.status(), reqwest::StatusCode::OK);
    let first = stream.chunk().await.unwrap().unwrap();
    assert!(String::from_utf8_lossy(&first).contains("snapshot"));

    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server to stop with a stream open")
        .unwrap();
}
