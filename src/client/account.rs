//! Account-level client

use std::sync::Arc;

use serde_json::json;

use crate::config::ClientConfig;
use crate::emulator::InMemoryBackend;
use crate::error::CosmosResult;
use crate::observability::MetricsSnapshot;
use crate::pipeline::{ConflictPolicy, OperationKind, Request, RequestOptions, RequestPipeline, Transport};
use crate::query::{QueryCursor, QueryOptions, SqlQuerySpec};
use crate::resource::ResourcePath;

use super::database::Database;
use super::DatabaseResponse;

/// Entry point: one account, one configuration, one pipeline.
///
/// Cheap to clone; clones share the pipeline, session tokens and metrics.
#[derive(Clone)]
pub struct CosmosClient {
    pipeline: Arc<RequestPipeline>,
}

impl CosmosClient {
    /// Validate the configuration and build the request pipeline
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> CosmosResult<Self> {
        config.validate()?;
        Ok(Self {
            pipeline: Arc::new(RequestPipeline::new(Arc::new(config), transport)),
        })
    }

    /// Client backed by a fresh in-memory account
    pub fn with_emulator(config: ClientConfig) -> CosmosResult<(Self, Arc<InMemoryBackend>)> {
        let backend = Arc::new(InMemoryBackend::new());
        let client = Self::new(config, backend.clone())?;
        Ok((client, backend))
    }

    pub fn config(&self) -> &ClientConfig {
        self.pipeline.config()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.pipeline.metrics().snapshot()
    }

    /// Handle to a database. No request is made.
    pub fn database(&self, id: &str) -> CosmosResult<Database> {
        Database::new(Arc::clone(&self.pipeline), id)
    }

    /// Create a database. With `fail_if_exists` unset an existing database
    /// is returned instead of a `Conflict`.
    pub async fn create_database(&self, id: &str, fail_if_exists: bool) -> CosmosResult<DatabaseResponse> {
        let database = self.database(id)?;
        let request = Request::new(OperationKind::Create, ResourcePath::Databases)
            .with_body(json!({ "id": id }))
            .with_options(
                RequestOptions::new()
                    .with_conflict_policy(ConflictPolicy::from_fail_if_exists(fail_if_exists)),
            );
        let response = self.pipeline.execute(request).await?;
        DatabaseResponse::from_response(database, response)
    }

    /// Read a database's properties
    pub async fn get_database(&self, id: &str) -> CosmosResult<DatabaseResponse> {
        let database = self.database(id)?;
        database.read().await
    }

    pub async fn delete_database(&self, id: &str) -> CosmosResult<()> {
        let path = ResourcePath::database(id)?;
        self.pipeline.execute(Request::delete(path)).await?;
        Ok(())
    }

    /// Every database of the account
    pub fn list_databases(&self) -> CosmosResult<QueryCursor> {
        self.query_databases(SqlQuerySpec::new("SELECT * FROM root"))
    }

    pub fn query_databases(&self, spec: impl Into<SqlQuerySpec>) -> CosmosResult<QueryCursor> {
        QueryCursor::new(
            Arc::clone(&self.pipeline),
            ResourcePath::Databases,
            spec.into(),
            QueryOptions::new(),
        )
    }
}

impl std::fmt::Debug for CosmosClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CosmosClient")
            .field("config", self.pipeline.config())
            .finish()
    }
}
