use guardpost_server::entities::EmergencyAlerts;
use guardpost_server::model::{AlertKind, Coordinates};
use guardpost_server::portal::{
    FixedLocation, HttpPortalBackend, NoLocation, PortalSession, PortalState, TriggerError,
};
use sea_orm::EntityTrait;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::support::{seed_site, serve, test_db};

#[tokio::test]
async fn panic_button_raises_one_alert_over_http() {
    let db = test_db().await;
    let site = seed_site(&db, "Cocody Residence", "active").await;
    let (base_url, _server) = serve(db.clone(), CancellationToken::new()).await;
    let here = Coordinates::new(5.35, -3.98).unwrap();

    let session = PortalSession::open(
        Arc::new(HttpPortalBackend::new(&base_url).unwrap()),
        Arc::new(FixedLocation(here)),
        site.token.clone(),
        Duration::from_secs(1),
    )
    .await;
    assert_eq!(
        session.site().unwrap().site_name.as_deref(),
        Some("Cocody Residence")
    );

    session.trigger(AlertKind::Danger).await.unwrap();
    assert_eq!(session.state(), PortalState::Sent(AlertKind::Danger));
    assert!(matches!(
        session.trigger(AlertKind::Danger).await,
        Err(TriggerError::AlreadySent)
    ));

    let rows = EmergencyAlerts::find().all(&db).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].site_id, site.id);
    assert_eq!(rows[0].latitude, Some(5.35));
    assert_eq!(rows[0].longitude, Some(-3.98));
}

#[tokio::test]
async fn stale_link_opens_in_invalid_state() {
    let db = test_db().await;
    let (base_url, _server) = serve(db, CancellationToken::new()).await;

    let session = PortalSession::open(
        Arc::new(HttpPortalBackend::new(&base_url).unwrap()),
        Arc::new(NoLocation),
        "revoked-link",
        Duration::from_millis(100),
    )
    .await;

    assert_eq!(session.state(), PortalState::InvalidLink);
    assert!(matches!(
        session.trigger(AlertKind::Contact).await,
        Err(TriggerError::InvalidLink)
    ));
}
