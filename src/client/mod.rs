//! # Client Surface
//!
//! `CosmosClient` → `Database` → `Container` handles. Handles are cheap to
//! clone and share one request pipeline; creating a handle never makes a
//! request.

mod account;
mod container;
mod database;

pub use account::CosmosClient;
pub use container::Container;
pub use database::Database;

use crate::error::CosmosResult;
use crate::pipeline::{ResourceResponse, ResponseMetadata};
use crate::resource::{ContainerProperties, DatabaseProperties};

/// A database handle with the properties the service returned
#[derive(Debug, Clone)]
pub struct DatabaseResponse {
    pub database: Database,
    pub properties: DatabaseProperties,
    pub metadata: ResponseMetadata,
}

impl DatabaseResponse {
    fn from_response(database: Database, response: ResourceResponse) -> CosmosResult<Self> {
        Ok(Self {
            properties: response.deserialize()?,
            database,
            metadata: response.metadata,
        })
    }
}

/// A container handle with the properties the service returned
#[derive(Debug, Clone)]
pub struct ContainerResponse {
    pub container: Container,
    pub properties: ContainerProperties,
    pub metadata: ResponseMetadata,
}

impl ContainerResponse {
    fn from_response(container: Container, response: ResourceResponse) -> CosmosResult<Self> {
        Ok(Self {
            properties: response.deserialize()?,
            container,
            metadata: response.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::config::ClientConfig;
    use crate::error::CosmosError;
    use crate::query::QueryOptions;

    fn client() -> CosmosClient {
        CosmosClient::with_emulator(ClientConfig::emulator()).unwrap().0
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = CosmosClient::with_emulator(ClientConfig::new("localhost", "key"));
        assert!(matches!(result, Err(CosmosError::Config(_))));
    }

    #[test]
    fn test_handles_validate_ids() {
        let client = client();
        assert!(matches!(client.database("a/b"), Err(CosmosError::InvalidIdentifier(_))));
        let database = client.database("db").unwrap();
        assert_eq!(database.link(), "dbs/db");
        let container = database.container("coll").unwrap();
        assert_eq!(container.link(), "dbs/db/colls/coll");
        assert!(database.container("").is_err());
    }

    #[tokio::test]
    async fn test_database_lifecycle() {
        let client = client();
        let created = client.create_database("db", true).await.unwrap();
        assert_eq!(created.properties.id, "db");
        assert_eq!(created.metadata.status, 201);
        assert!(created.properties.system.rid.is_some());

        let conflict = client.create_database("db", true).await.unwrap_err();
        assert!(conflict.is_conflict());

        let existing = client.create_database("db", false).await.unwrap();
        assert_eq!(existing.properties.system.rid, created.properties.system.rid);
        assert_eq!(existing.metadata.status, 200);

        assert_eq!(client.list_databases().unwrap().collect_all().await.unwrap().len(), 1);

        client.delete_database("db").await.unwrap();
        let missing = client.get_database("db").await.unwrap_err();
        assert!(missing.is_not_found());
    }

    #[tokio::test]
    async fn test_item_round_trip() {
        let client = client();
        let database = client.create_database("db", false).await.unwrap().database;
        let container = database
            .create_container(ContainerProperties::new("coll").with_partition_key("/pk"), true)
            .await
            .unwrap()
            .container;

        let created = container.create_item(json!({"pk": "a", "n": 1})).await.unwrap();
        let id = created.metadata.generated_id.clone().unwrap();
        assert_eq!(created.id(), Some(id.as_str()));

        let read = container.read_item(&id, "a").await.unwrap();
        assert_eq!(read.resource["n"], 1);

        let cursor = container
            .query_items("SELECT VALUE c.n FROM c", QueryOptions::new().with_partition_key("a"))
            .unwrap();
        assert_eq!(cursor.collect_all().await.unwrap(), vec![json!(1)]);

        container.delete_item(&id, "a").await.unwrap();
        assert!(container.read_item(&id, "a").await.unwrap_err().is_not_found());
    }
}
