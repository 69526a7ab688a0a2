use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use guardpost_server::entities::EmergencyAlerts;
use guardpost_server::realtime::Delivery;
use sea_orm::{EntityTrait, PaginatorTrait};
use serde_json::json;
use uuid::Uuid;

use crate::support::{json_body, seed_site, TestContext};

#[tokio::test]
async fn danger_alert_with_location_is_stored_and_announced() {
    let t = TestContext::new().await;
    let site = seed_site(&t.db, "Plateau Tower", "active").await;
    let mut sub = t.feed.subscribe();

    let response = t
        .post_empty(
            &format!(
                "/functions/v1/emergency?site_id={}&type=danger&lat=5.3364&lng=-4.0267",
                site.id
            ),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        json_body(response).await,
        json!({"message": "Emergency alert created successfully"})
    );

    let rows = EmergencyAlerts::find().all(&t.db).await.unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row.site_id, site.id);
    assert_eq!(row.kind, "danger");
    assert_eq!(row.latitude, Some(5.3364));
    assert_eq!(row.longitude, Some(-4.0267));
    assert!(!row.acknowledged);

    match sub.recv().await {
        Some(Delivery::Alert(n)) => assert_eq!(n.id, row.id),
        other => panic!("expected an alert notification, got {:?}", other),
    }
}

#[tokio::test]
async fn contact_alert_without_location_stores_nulls() {
    let t = TestContext::new().await;
    let site = seed_site(&t.db, "Marcory Depot", "active").await;

    let response = t
        .post_empty(
            &format!("/functions/v1/emergency?site_id={}&type=contact", site.id),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let row = EmergencyAlerts::find().one(&t.db).await.unwrap().unwrap();
    assert_eq!(row.kind, "contact");
    assert_eq!(row.latitude, None);
    assert_eq!(row.longitude, None);
}

#[tokio::test]
async fn missing_type_is_rejected_without_insert() {
    let t = TestContext::new().await;
    let site = seed_site(&t.db, "Plateau Tower", "active").await;

    let response = t
        .post_empty(&format!("/functions/v1/emergency?site_id={}", site.id), None)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await,
        json!({"error": "Site ID and type are required"})
    );
    assert_eq!(EmergencyAlerts::find().count(&t.db).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_type_is_rejected_without_insert() {
    let t = TestContext::new().await;
    let site = seed_site(&t.db, "Plateau Tower", "active").await;

    let response = t
        .post_empty(
            &format!("/functions/v1/emergency?site_id={}&type=fire", site.id),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Invalid alert type"}));
    assert_eq!(EmergencyAlerts::find().count(&t.db).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_and_malformed_sites_get_the_same_answer() {
    let t = TestContext::new().await;

    for site_id in [Uuid::new_v4().to_string(), "site-42".to_string()] {
        let response = t
            .post_empty(
                &format!("/functions/v1/emergency?site_id={}&type=danger", site_id),
                None,
            )
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            json_body(response).await,
            json!({"error": "Invalid emergency submission"})
        );
    }
    assert_eq!(EmergencyAlerts::find().count(&t.db).await.unwrap(), 0);
}

#[tokio::test]
async fn out_of_range_coordinates_are_rejected() {
    let t = TestContext::new().await;
    let site = seed_site(&t.db, "Plateau Tower", "active").await;

    let response = t
        .post_empty(
            &format!(
                "/functions/v1/emergency?site_id={}&type=danger&lat=91&lng=0",
                site.id
            ),
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, json!({"error": "Invalid coordinates"}));
}

#[tokio::test]
async fn preflight_is_answered_for_any_origin() {
    let t = TestContext::new().await;

    let response = t
        .send(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/functions/v1/emergency")
                .header(header::ORIGIN, "https://guard-phone.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                .body(Body::empty())
                .unwrap(),
        )
        .await;

    assert!(response.status().is_success());
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn health_check_works() {
    let t = TestContext::new().await;
    let response = t.get("/health", None).await;
    assert!(response.status().is_success());
}
