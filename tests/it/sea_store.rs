use guardpost_server::api::auth;
use guardpost_server::config::BootstrapOperator;
use guardpost_server::entities::{emergency_alert, Operators};
use guardpost_server::model::{AlertKind, Coordinates, NewAlert};
use guardpost_server::store::{AlertStore, SeaOrmStore, SiteDirectory, StoreError};
use sea_orm::{ActiveModelTrait, EntityTrait, PaginatorTrait, Set};
use std::sync::Arc;
use uuid::Uuid;

use crate::support::{seed_site, test_db};

#[tokio::test]
async fn inserted_alerts_read_back_with_their_site() {
    let db = test_db().await;
    let site = seed_site(&db, "Plateau Tower", "active").await;
    let store = SeaOrmStore::new(db);

    let stored = store
        .insert_alert(NewAlert {
            site_id: site.id,
            kind: AlertKind::Danger,
            coordinates: Some(Coordinates::new(5.3364, -4.0267).unwrap()),
        })
        .await
        .unwrap();
    assert!(!stored.acknowledged);

    let view = store.find_alert(stored.id).await.unwrap().unwrap();
    assert_eq!(view.alert.id, stored.id);
    assert_eq!(view.alert.kind, AlertKind::Danger);
    assert_eq!(view.alert.coordinates(), stored.coordinates());
    assert_eq!(
        view.site.unwrap().site_name.as_deref(),
        Some("Plateau Tower")
    );
    assert!(store.find_alert(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn insert_for_unknown_site_fails() {
    let store = SeaOrmStore::new(test_db().await);
    let missing = Uuid::new_v4();

    let err = store
        .insert_alert(NewAlert {
            site_id: missing,
            kind: AlertKind::Contact,
            coordinates: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownSite(id) if id == missing));
}

#[tokio::test]
async fn concurrent_acknowledges_transition_once() {
    let db = test_db().await;
    let site = seed_site(&db, "Plateau Tower", "active").await;
    let store = Arc::new(SeaOrmStore::new(db));
    let alert = store
        .insert_alert(NewAlert {
            site_id: site.id,
            kind: AlertKind::Danger,
            coordinates: None,
        })
        .await
        .unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.acknowledge_alert(alert.id).await })
        })
        .collect();

    let mut transitions = 0;
    for handle in handles {
        let ack = handle.await.unwrap().unwrap();
        assert!(ack.alert.acknowledged);
        if ack.transitioned {
            transitions += 1;
        }
    }
    assert_eq!(transitions, 1);

    let err = store.acknowledge_alert(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, StoreError::AlertNotFound(_)));
}

#[tokio::test]
async fn rows_with_unknown_types_are_rejected() {
    let db = test_db().await;
    let site = seed_site(&db, "Plateau Tower", "active").await;
    emergency_alert::ActiveModel {
        id: Set(Uuid::new_v4()),
        site_id: Set(site.id),
        kind: Set("sos".to_string()),
        latitude: Set(None),
        longitude: Set(None),
        timestamp: Set(chrono::Utc::now().naive_utc()),
        acknowledged: Set(false),
    }
    .insert(&db)
    .await
    .unwrap();

    let store = SeaOrmStore::new(db);
    let err = store.list_alerts().await.unwrap_err();
    assert!(matches!(err, StoreError::Malformed { table: "emergency_alerts", .. }));
}

#[tokio::test]
async fn only_active_links_resolve() {
    let db = test_db().await;
    let open = seed_site(&db, "Plateau Tower", "active").await;
    let closed = seed_site(&db, "Closed Warehouse", "inactive").await;
    let store = SeaOrmStore::new(db);

    let linked = store
        .resolve_emergency_link(&open.token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(linked.site_id, open.id);
    assert_eq!(linked.summary.contact_name.as_deref(), Some("Mariam Koné"));

    assert!(store
        .resolve_emergency_link(&closed.token)
        .await
        .unwrap()
        .is_none());
    assert!(store.resolve_emergency_link("").await.unwrap().is_none());
}

#[tokio::test]
async fn bootstrap_operator_is_created_once() {
    let db = test_db().await;
    let bootstrap = BootstrapOperator {
        email: "boot@guardpost.test".to_string(),
        password: "first-login".to_string(),
        name: "Bootstrap".to_string(),
    };

    assert!(auth::ensure_bootstrap_operator(&db, &bootstrap).await.unwrap());
    assert!(!auth::ensure_bootstrap_operator(&db, &bootstrap).await.unwrap());
    assert_eq!(Operators::find().count(&db).await.unwrap(), 1);
}
