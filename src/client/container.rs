//! Container handle: item operations and queries

use std::sync::Arc;

use serde_json::Value;

use crate::error::CosmosResult;
use crate::pipeline::{OperationKind, Request, RequestOptions, RequestPipeline, ResourceResponse};
use crate::query::{QueryCursor, QueryOptions, SqlQuerySpec};
use crate::resource::{ContainerProperties, PartitionKey, ResourcePath};

use super::ContainerResponse;

/// Handle to one container
#[derive(Clone)]
pub struct Container {
    pipeline: Arc<RequestPipeline>,
    path: ResourcePath,
}

impl Container {
    pub(crate) fn new(pipeline: Arc<RequestPipeline>, database: &str, id: &str) -> CosmosResult<Self> {
        Ok(Self {
            pipeline,
            path: ResourcePath::container(database, id)?,
        })
    }

    pub fn id(&self) -> &str {
        self.path.container_id().unwrap_or_default()
    }

    pub fn database_id(&self) -> &str {
        self.path.database_id().unwrap_or_default()
    }

    pub fn link(&self) -> String {
        self.path.to_string()
    }

    pub(crate) fn path(&self) -> &ResourcePath {
        &self.path
    }

    fn items(&self) -> ResourcePath {
        ResourcePath::Items {
            database: self.database_id().to_string(),
            container: self.id().to_string(),
        }
    }

    fn item(&self, id: &str) -> CosmosResult<ResourcePath> {
        self.items().child(id)
    }

    pub async fn read(&self) -> CosmosResult<ContainerResponse> {
        let response = self.pipeline.execute(Request::read(self.path.clone())).await?;
        ContainerResponse::from_response(self.clone(), response)
    }

    pub async fn read_properties(&self) -> CosmosResult<ContainerProperties> {
        Ok(self.read().await?.properties)
    }

    /// Create an item. A missing `id` is generated and reported in
    /// `metadata.generated_id`.
    pub async fn create_item(&self, document: Value) -> CosmosResult<ResourceResponse> {
        let request = Request::new(OperationKind::Create, self.items()).with_body(document);
        self.pipeline.execute(request).await
    }

    /// Create or replace an item
    pub async fn upsert_item(&self, document: Value) -> CosmosResult<ResourceResponse> {
        let request = Request::new(OperationKind::Upsert, self.items()).with_body(document);
        self.pipeline.execute(request).await
    }

    pub async fn read_item(
        &self,
        id: &str,
        partition_key: impl Into<PartitionKey>,
    ) -> CosmosResult<ResourceResponse> {
        let request = Request::read(self.item(id)?)
            .with_options(RequestOptions::new().with_partition_key(partition_key.into()));
        self.pipeline.execute(request).await
    }

    /// Replace an item. The partition key value cannot change.
    pub async fn replace_item(
        &self,
        id: &str,
        partition_key: impl Into<PartitionKey>,
        document: Value,
    ) -> CosmosResult<ResourceResponse> {
        let options = RequestOptions::new().with_partition_key(partition_key.into());
        self.replace_item_with(id, document, options).await
    }

    /// Replace an item only if its etag still matches
    pub async fn replace_item_if_match(
        &self,
        id: &str,
        partition_key: impl Into<PartitionKey>,
        document: Value,
        etag: &str,
    ) -> CosmosResult<ResourceResponse> {
        let options = RequestOptions::new()
            .with_partition_key(partition_key.into())
            .with_if_match(etag);
        self.replace_item_with(id, document, options).await
    }

    async fn replace_item_with(
        &self,
        id: &str,
        document: Value,
        options: RequestOptions,
    ) -> CosmosResult<ResourceResponse> {
        let request = Request::new(OperationKind::Replace, self.item(id)?)
            .with_body(document)
            .with_options(options);
        self.pipeline.execute(request).await
    }

    pub async fn delete_item(&self, id: &str, partition_key: impl Into<PartitionKey>) -> CosmosResult<()> {
        let request = Request::delete(self.item(id)?)
            .with_options(RequestOptions::new().with_partition_key(partition_key.into()));
        self.pipeline.execute(request).await?;
        Ok(())
    }

    /// Every item, range by range
    pub fn list_items(&self) -> CosmosResult<QueryCursor> {
        self.query_items(SqlQuerySpec::new("SELECT * FROM c"), QueryOptions::new().cross_partition())
    }

    /// Validate the query and return a cursor over its results.
    ///
    /// Scope with `QueryOptions::with_partition_key` or fan out with
    /// `QueryOptions::cross_partition`; an unscoped query against a
    /// container with several ranges is rejected by the service.
    pub fn query_items(
        &self,
        spec: impl Into<SqlQuerySpec>,
        options: QueryOptions,
    ) -> CosmosResult<QueryCursor> {
        QueryCursor::new(Arc::clone(&self.pipeline), self.items(), spec.into(), options)
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("path", &self.path).finish()
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}
