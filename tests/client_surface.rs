//! Client Surface Tests
//!
//! Account → database → container → item handles over the in-memory
//! emulator, plus configuration loading.

use std::io::Write;

use cosmos_sql::resource::PartitionKeyDefinition;
use cosmos_sql::{
    ClientConfig, ConsistencyLevel, ContainerProperties, CosmosClient, CosmosError, QueryOptions,
    SqlQuerySpec,
};
use serde_json::json;
use tempfile::NamedTempFile;

fn client() -> CosmosClient {
    CosmosClient::with_emulator(ClientConfig::emulator()).unwrap().0
}

// =============================================================================
// Databases
// =============================================================================

#[tokio::test]
async fn test_list_and_query_databases() {
    let client = client();
    for id in ["alpha", "beta", "gamma"] {
        client.create_database(id, true).await.unwrap();
    }

    let all = client.list_databases().unwrap().collect_all().await.unwrap();
    assert_eq!(all.len(), 3);
    assert!(all.iter().all(|d| d["_rid"].is_string()));

    let spec = SqlQuerySpec::new("SELECT * FROM root r WHERE r.id = @id")
        .with_parameter("@id", json!("beta"));
    let found = client.query_databases(spec).unwrap().collect_all().await.unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["id"], "beta");
}

#[tokio::test]
async fn test_delete_database_removes_containers() {
    let client = client();
    let database = client.create_database("db", true).await.unwrap().database;
    database
        .create_container(ContainerProperties::new("coll").with_partition_key("/pk"), true)
        .await
        .unwrap();

    client.delete_database("db").await.unwrap();
    assert!(client.delete_database("db").await.unwrap_err().is_not_found());
    assert!(database.get_container("coll").await.unwrap_err().is_not_found());
}

// =============================================================================
// Containers
// =============================================================================

#[tokio::test]
async fn test_container_lifecycle() {
    let client = client();
    let database = client.create_database("db", true).await.unwrap().database;

    let created = database
        .create_container(
            ContainerProperties::new("products")
                .with_partition_key("/category")
                .with_default_ttl(-1),
            true,
        )
        .await
        .unwrap();
    assert_eq!(created.properties.default_ttl, Some(-1));
    assert!(created.properties.indexing_policy.is_some());
    assert!(created.properties.system.etag.is_some());

    database
        .create_container(ContainerProperties::new("orders").with_partition_key("/customer"), true)
        .await
        .unwrap();

    let mut ids: Vec<String> = database
        .list_containers()
        .unwrap()
        .collect_all()
        .await
        .unwrap()
        .iter()
        .filter_map(|c| c["id"].as_str().map(str::to_string))
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["orders", "products"]);

    database.delete_container("orders").await.unwrap();
    assert!(database.get_container("orders").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_container_partition_key_is_immutable() {
    let client = client();
    let database = client.create_database("db", true).await.unwrap().database;
    let container = database
        .create_container(ContainerProperties::new("coll").with_partition_key("/pk"), true)
        .await
        .unwrap()
        .container;

    let mut properties = container.read_properties().await.unwrap();
    properties.partition_key = Some(PartitionKeyDefinition::new("/other"));
    let err = database
        .replace_container_properties(properties)
        .await
        .unwrap_err();
    assert!(matches!(err, CosmosError::ClientError { status: 400, .. }));

    let current = container.read_properties().await.unwrap();
    assert_eq!(current.partition_key.unwrap().path(), "/pk");
}

#[tokio::test]
async fn test_replace_container_with_stale_etag() {
    let client = client();
    let database = client.create_database("db", true).await.unwrap().database;
    let container = database
        .create_container(ContainerProperties::new("coll").with_partition_key("/pk"), true)
        .await
        .unwrap()
        .container;

    let stale = container.read_properties().await.unwrap();
    let mut fresh = stale.clone();
    fresh.default_ttl = Some(30);
    let replaced = database.replace_container_properties(fresh).await.unwrap();
    assert_eq!(replaced.properties.default_ttl, Some(30));
    assert_eq!(replaced.properties.system.rid, stale.system.rid);

    let err = database
        .replace_container_properties(stale)
        .await
        .unwrap_err();
    assert!(matches!(err, CosmosError::ClientError { status: 412, .. }));
}

// =============================================================================
// Items
// =============================================================================

#[tokio::test]
async fn test_upsert_then_query_walkthrough() {
    let client = client();
    let database = client.create_database("testDatabase", false).await.unwrap().database;
    let container = database
        .create_container(
            ContainerProperties::new("testContainer").with_partition_key("/lastName"),
            false,
        )
        .await
        .unwrap()
        .container;

    let first = container
        .upsert_item(json!({"id": "something", "value": "else", "lastName": "Smith"}))
        .await
        .unwrap();
    assert_eq!(first.metadata.status, 201);
    let second = container
        .upsert_item(json!({"id": "something", "value": "new", "lastName": "Smith"}))
        .await
        .unwrap();
    assert_eq!(second.metadata.status, 200);
    assert_eq!(second.resource["_rid"], first.resource["_rid"]);

    let items = container
        .query_items(
            "SELECT * FROM root r WHERE r.id = \"something\"",
            QueryOptions::new().with_partition_key("Smith"),
        )
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["value"], "new");
}

#[tokio::test]
async fn test_undefined_partition_key_items() {
    let client = client();
    let database = client.create_database("db", true).await.unwrap().database;
    let container = database
        .create_container(ContainerProperties::new("coll").with_partition_key("/pk"), true)
        .await
        .unwrap()
        .container;

    container.create_item(json!({"id": "nokey"})).await.unwrap();
    let read = container
        .read_item("nokey", cosmos_sql::PartitionKey::undefined())
        .await
        .unwrap();
    assert_eq!(read.id(), Some("nokey"));
    assert!(container.read_item("nokey", "x").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_numeric_partition_keys_compare_by_value() {
    let client = client();
    let database = client.create_database("db", true).await.unwrap().database;
    let container = database
        .create_container(ContainerProperties::new("coll").with_partition_key("/pk"), true)
        .await
        .unwrap()
        .container;

    container.create_item(json!({"id": "x", "pk": 1.0})).await.unwrap();
    assert_eq!(container.read_item("x", 1i64).await.unwrap().id(), Some("x"));
    assert_eq!(container.read_item("x", 1.0).await.unwrap().id(), Some("x"));

    let found = container
        .query_items("SELECT VALUE c.id FROM c", QueryOptions::new().with_partition_key(1i64))
        .unwrap()
        .collect_all()
        .await
        .unwrap();
    assert_eq!(found, vec![json!("x")]);
}

#[tokio::test]
async fn test_metrics_track_requests_and_pages() {
    let client = client();
    let database = client.create_database("db", true).await.unwrap().database;
    let container = database
        .create_container(ContainerProperties::new("coll").with_partition_key("/pk"), true)
        .await
        .unwrap()
        .container;
    for i in 0..5 {
        container.create_item(json!({"pk": "a", "i": i})).await.unwrap();
    }
    let _ = container.create_item(json!({"id": "dup", "pk": "a"})).await;
    let _ = container.create_item(json!({"id": "dup", "pk": "a"})).await;

    container
        .query_items(
            "SELECT * FROM c",
            QueryOptions::new().with_partition_key("a").with_max_item_count(2),
        )
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    let metrics = client.metrics();
    assert_eq!(metrics.conflicts, 1);
    assert_eq!(metrics.documents_returned, 6);
    assert_eq!(metrics.pages_fetched, 3);
    assert!(metrics.request_charge > 0.0);
    assert!(metrics.requests_sent >= 12);
}

// =============================================================================
// Configuration
// =============================================================================

#[test]
fn test_config_from_file_fills_defaults() {
    let mut file = NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"endpoint": "https://example.documents.azure.com:443/", "key": "secret", "consistency_level": "Eventual"}}"#
    )
    .unwrap();

    let config = ClientConfig::from_file(file.path()).unwrap();
    assert_eq!(config.consistency_level, ConsistencyLevel::Eventual);
    assert_eq!(config.connection_policy.max_item_count, 100);
    assert!(!format!("{:?}", config).contains("secret"));
}

#[test]
fn test_config_from_file_rejects_invalid() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, r#"{{"endpoint": "localhost", "key": "secret"}}"#).unwrap();
    assert!(matches!(
        ClientConfig::from_file(file.path()),
        Err(CosmosError::Config(_))
    ));
}
