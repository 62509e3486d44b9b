//! Request Pipeline Tests
//!
//! Exercises the pipeline end to end against the in-memory emulator:
//! - Generated ids stay unique under concurrent writes
//! - Conflict policy: `fail_if_exists` vs get-or-create
//! - Outcome classification (Transient / ClientError / ServerError / Conflict)
//! - Conditional writes and session token replay

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use cosmos_sql::emulator::{Fault, InMemoryBackend};
use cosmos_sql::pipeline::headers;
use cosmos_sql::{
    ClientConfig, ConnectionPolicy, ConsistencyLevel, Container, ContainerProperties, CosmosClient,
    CosmosError,
};
use serde_json::json;

// =============================================================================
// Test Utilities
// =============================================================================

async fn setup_with(config: ClientConfig) -> (CosmosClient, Arc<InMemoryBackend>, Container) {
    let (client, backend) = CosmosClient::with_emulator(config).unwrap();
    let database = client.create_database("db", true).await.unwrap().database;
    let container = database
        .create_container(ContainerProperties::new("coll").with_partition_key("/pk"), true)
        .await
        .unwrap()
        .container;
    (client, backend, container)
}

async fn setup() -> (CosmosClient, Arc<InMemoryBackend>, Container) {
    setup_with(ClientConfig::emulator()).await
}

// =============================================================================
// Id Generation
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_generated_ids_unique_across_concurrent_upserts() {
    let (_client, _backend, container) = setup().await;

    let mut tasks = Vec::new();
    for i in 0..64 {
        let container = container.clone();
        tasks.push(tokio::spawn(async move {
            let response = container
                .upsert_item(json!({"pk": format!("p{}", i % 5), "n": i}))
                .await
                .unwrap();
            response.metadata.generated_id.unwrap()
        }));
    }

    let mut ids = HashSet::new();
    for task in tasks {
        assert!(ids.insert(task.await.unwrap()));
    }
    assert_eq!(ids.len(), 64);

    let stored = container.list_items().unwrap().collect_all().await.unwrap();
    assert_eq!(stored.len(), 64);
}

#[tokio::test]
async fn test_caller_supplied_id_is_kept() {
    let (_client, _backend, container) = setup().await;
    let response = container
        .create_item(json!({"id": "mine", "pk": "a"}))
        .await
        .unwrap();
    assert_eq!(response.id(), Some("mine"));
    assert!(response.metadata.generated_id.is_none());
}

// =============================================================================
// Conflict Policy
// =============================================================================

#[tokio::test]
async fn test_container_conflict_and_get_or_create() {
    let (client, _backend, _container) = setup().await;
    let database = client.database("db").unwrap();

    let err = database
        .create_container(ContainerProperties::new("coll").with_partition_key("/pk"), true)
        .await
        .unwrap_err();
    assert!(matches!(err, CosmosError::Conflict { status: 409, .. }));

    let existing = database
        .create_container(ContainerProperties::new("coll").with_partition_key("/other"), false)
        .await
        .unwrap();
    assert_eq!(existing.properties.partition_key.as_ref().unwrap().path(), "/pk");
    assert_eq!(existing.container.link(), "dbs/db/colls/coll");
}

#[tokio::test]
async fn test_item_create_conflict_surfaces() {
    let (_client, _backend, container) = setup().await;
    container.create_item(json!({"id": "a", "pk": "x"})).await.unwrap();

    let err = container
        .create_item(json!({"id": "a", "pk": "x"}))
        .await
        .unwrap_err();
    assert!(err.is_conflict());

    // Same id under another partition key is a different item
    container.create_item(json!({"id": "a", "pk": "y"})).await.unwrap();
}

// =============================================================================
// Classification
// =============================================================================

#[tokio::test]
async fn test_throttling_and_connection_failures_are_transient() {
    let (client, backend, container) = setup().await;

    backend.inject_fault(Fault::Status(429));
    let err = container.read_item("a", "x").await.unwrap_err();
    assert!(matches!(err, CosmosError::Transient { status: Some(429), .. }));
    assert!(err.is_retryable());

    backend.inject_fault(Fault::Connection);
    let err = container.read_item("a", "x").await.unwrap_err();
    assert!(matches!(err, CosmosError::Transient { status: None, .. }));

    let metrics = client.metrics();
    assert_eq!(metrics.transient_failures, 2);
}

#[tokio::test]
async fn test_server_errors_are_not_retried() {
    let (_client, backend, container) = setup().await;
    let before = backend.requests().len();

    backend.inject_fault(Fault::Status(503));
    let err = container.create_item(json!({"pk": "x"})).await.unwrap_err();
    assert!(matches!(err, CosmosError::ServerError { status: 503, .. }));
    assert!(!err.is_retryable());
    assert_eq!(backend.requests().len(), before + 1);
}

#[tokio::test]
async fn test_not_found_is_client_error() {
    let (_client, _backend, container) = setup().await;
    let err = container.read_item("missing", "x").await.unwrap_err();
    assert!(matches!(err, CosmosError::ClientError { status: 404, .. }));
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_request_timeout_is_transient() {
    let config = ClientConfig::emulator().with_connection_policy(ConnectionPolicy {
        request_timeout_ms: 20,
        ..ConnectionPolicy::default()
    });
    let (_client, backend, container) = setup_with(config).await;

    backend.set_latency(Duration::from_millis(500));
    let err = container.read_item("a", "x").await.unwrap_err();
    assert!(matches!(err, CosmosError::Transient { status: Some(408), .. }));
}

// =============================================================================
// Conditional Writes
// =============================================================================

#[tokio::test]
async fn test_stale_etag_is_precondition_failure() {
    let (_client, _backend, container) = setup().await;
    let created = container
        .create_item(json!({"id": "a", "pk": "x", "v": 1}))
        .await
        .unwrap();
    let first_etag = created.metadata.etag.clone().unwrap();

    container
        .replace_item_if_match("a", "x", json!({"id": "a", "pk": "x", "v": 2}), &first_etag)
        .await
        .unwrap();

    let err = container
        .replace_item_if_match("a", "x", json!({"id": "a", "pk": "x", "v": 3}), &first_etag)
        .await
        .unwrap_err();
    assert!(matches!(err, CosmosError::ClientError { status: 412, .. }));

    let current = container.read_item("a", "x").await.unwrap();
    assert_eq!(current.resource["v"], 2);
}

#[tokio::test]
async fn test_replace_cannot_move_partition() {
    let (_client, _backend, container) = setup().await;
    container.create_item(json!({"id": "a", "pk": "x"})).await.unwrap();

    let err = container
        .replace_item("a", "x", json!({"id": "a", "pk": "y"}))
        .await
        .unwrap_err();
    assert!(matches!(err, CosmosError::ClientError { status: 400, .. }));
}

// =============================================================================
// Session Tokens
// =============================================================================

#[tokio::test]
async fn test_session_token_captured_and_replayed() {
    let (_client, backend, container) = setup().await;
    let written = container
        .create_item(json!({"id": "a", "pk": "x"}))
        .await
        .unwrap();
    let token = written.metadata.session_token.clone().unwrap();

    container.read_item("a", "x").await.unwrap();
    let requests = backend.requests();
    let read = requests.last().unwrap();
    assert_eq!(read.header(headers::SESSION_TOKEN), Some(token.as_str()));
    assert_eq!(read.header(headers::CONSISTENCY_LEVEL), Some("Session"));
}

#[tokio::test]
async fn test_eventual_consistency_sends_no_token() {
    let config = ClientConfig::emulator().with_consistency_level(ConsistencyLevel::Eventual);
    let (_client, backend, container) = setup_with(config).await;
    container.create_item(json!({"id": "a", "pk": "x"})).await.unwrap();
    container.read_item("a", "x").await.unwrap();

    let requests = backend.requests();
    assert!(requests.last().unwrap().header(headers::SESSION_TOKEN).is_none());
}
