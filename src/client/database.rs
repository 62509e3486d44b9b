//! Database handle

use std::sync::Arc;

use crate::error::CosmosResult;
use crate::pipeline::{ConflictPolicy, OperationKind, Request, RequestOptions, RequestPipeline};
use crate::query::{QueryCursor, QueryOptions, SqlQuerySpec};
use crate::resource::{ContainerProperties, ResourcePath};

use super::container::Container;
use super::{ContainerResponse, DatabaseResponse};

/// Handle to one database
#[derive(Clone)]
pub struct Database {
    pipeline: Arc<RequestPipeline>,
    path: ResourcePath,
}

impl Database {
    pub(crate) fn new(pipeline: Arc<RequestPipeline>, id: &str) -> CosmosResult<Self> {
        Ok(Self {
            pipeline,
            path: ResourcePath::database(id)?,
        })
    }

    pub fn id(&self) -> &str {
        self.path.database_id().unwrap_or_default()
    }

    pub fn link(&self) -> String {
        self.path.to_string()
    }

    pub async fn read(&self) -> CosmosResult<DatabaseResponse> {
        let response = self.pipeline.execute(Request::read(self.path.clone())).await?;
        DatabaseResponse::from_response(self.clone(), response)
    }

    /// Handle to a container. No request is made.
    pub fn container(&self, id: &str) -> CosmosResult<Container> {
        Container::new(Arc::clone(&self.pipeline), self.id(), id)
    }

    /// Create a container. With `fail_if_exists` unset an existing
    /// container's properties are returned instead of a `Conflict`.
    pub async fn create_container(
        &self,
        properties: ContainerProperties,
        fail_if_exists: bool,
    ) -> CosmosResult<ContainerResponse> {
        let container = self.container(&properties.id)?;
        let request = Request::new(OperationKind::Create, ResourcePath::containers(self.id())?)
            .with_body(serde_json::to_value(&properties)?)
            .with_options(
                RequestOptions::new()
                    .with_conflict_policy(ConflictPolicy::from_fail_if_exists(fail_if_exists)),
            );
        let response = self.pipeline.execute(request).await?;
        ContainerResponse::from_response(container, response)
    }

    pub async fn get_container(&self, id: &str) -> CosmosResult<ContainerResponse> {
        self.container(id)?.read().await
    }

    /// Replace a container's properties. The partition key cannot change.
    ///
    /// Properties carrying an `_etag` (e.g. from a previous read) make the
    /// replace conditional on it.
    pub async fn replace_container_properties(
        &self,
        properties: ContainerProperties,
    ) -> CosmosResult<ContainerResponse> {
        let container = self.container(&properties.id)?;
        let mut options = RequestOptions::new();
        options.if_match = properties.system.etag.clone();

        let mut body = serde_json::to_value(&properties)?;
        if let Some(object) = body.as_object_mut() {
            object.retain(|key, _| !key.starts_with('_'));
        }

        let request = Request::new(OperationKind::Replace, container.path().clone())
            .with_body(body)
            .with_options(options);
        let response = self.pipeline.execute(request).await?;
        ContainerResponse::from_response(container, response)
    }

    pub async fn delete_container(&self, id: &str) -> CosmosResult<()> {
        let path = ResourcePath::container(self.id(), id)?;
        self.pipeline.execute(Request::delete(path)).await?;
        Ok(())
    }

    pub fn list_containers(&self) -> CosmosResult<QueryCursor> {
        self.query_containers(SqlQuerySpec::new("SELECT * FROM root"))
    }

    pub fn query_containers(&self, spec: impl Into<SqlQuerySpec>) -> CosmosResult<QueryCursor> {
        let feed = ResourcePath::containers(self.id())?;
        QueryCursor::new(Arc::clone(&self.pipeline), feed, spec.into(), QueryOptions::new())
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

impl PartialEq for Database {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}
