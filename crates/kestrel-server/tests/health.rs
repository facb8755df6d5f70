use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use kestrel_db::{create_pool, run_migrations, DbRuntimeSettings, SqliteStore};
use kestrel_server::outbox::StoringActor;
use kestrel_server::{app, AppState};
use kestrel_types::{Account, ActivityVerb, ClientMessage, ObjectType, Payload};
use kestrel_workers::{Collaborators, Processor, ProcessingConfig, StreamHub};
use serde_json::Value;
use tower::ServiceExt;

fn state() -> (tempfile::NamedTempFile, AppState) {
    let file = tempfile::NamedTempFile::new().expect("should create temp db file");
    let path = file.path().to_str().expect("temp path should be utf-8");
    let pool = create_pool(path, DbRuntimeSettings::default()).expect("should create pool");
    {
        let conn = pool.get().expect("should get connection");
        run_migrations(&conn).expect("migrations should succeed");
    }

    let store = SqliteStore::new(pool);
    let streams = Arc::new(StreamHub::new());
    let processor = Processor::new(
        ProcessingConfig::new("kestrel.test"),
        Collaborators::new(
            Arc::new(store.clone()),
            Arc::new(StoringActor::new(store)),
            streams.clone(),
        ),
    );
    (file, AppState { processor, streams })
}

async fn get_health(state: AppState) -> Value {
    let response = app(state)
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .expect("request should build"),
        )
        .await
        .expect("request should succeed");
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should be readable");
    serde_json::from_slice(&body).expect("body should be json")
}

#[tokio::test]
async fn health_reports_status_and_instance() {
    let (_file, state) = state();
    let json = get_health(state).await;

    assert_eq!(json["status"], "ok");
    assert_eq!(json["version"], "0.0.1");
    assert_eq!(json["instance"], "kestrel.test");
    assert_eq!(json["queues"]["client"], 0);
    assert_eq!(json["queues"]["federator"], 0);
    assert_eq!(json["streams"], 0);
}

#[tokio::test]
async fn health_reports_queued_messages() {
    let (_file, state) = state();
    let account = Account {
        id: "a1".to_string(),
        uri: "https://kestrel.test/users/a1".to_string(),
        username: "a1".to_string(),
        domain: None,
        inbox_uri: "https://kestrel.test/users/a1/inbox".to_string(),
        outbox_uri: "https://kestrel.test/users/a1/outbox".to_string(),
        followers_uri: "https://kestrel.test/users/a1/followers".to_string(),
        locked: false,
        admin: false,
        also_known_as: Vec::new(),
        moved_to_uri: None,
        move_id: None,
        suspended_at: None,
        created_at: Utc::now(),
    };
    assert!(state.processor.enqueue_client(ClientMessage::new(
        ActivityVerb::Update,
        ObjectType::Profile,
        Payload::Account(account.clone()),
        account,
    )));
    let _rx = state.streams.subscribe("a1");

    let json = get_health(state).await;
    assert_eq!(json["queues"]["client"], 1);
    assert_eq!(json["streams"], 1);
}
