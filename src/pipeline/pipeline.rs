//! Request Pipeline
//!
//! Executes exactly one logical operation:
//! prepare (id generation, headers) → middleware chain → transport →
//! classify → conflict policy.
//!
//! The pipeline never retries; classified failures go back to the caller.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::Value;
use uuid::Uuid;

use crate::config::ClientConfig;
use crate::error::{CosmosError, CosmosResult};
use crate::observability::{ClientMetrics, Logger};
use crate::resource::{validate_id, ResourcePath, ResourceType};

use super::context::RequestContext;
use super::headers;
use super::middleware::observe::ObserveMiddleware;
use super::middleware::session::SessionMiddleware;
use super::middleware::Middleware;
use super::operation::{ConflictPolicy, OperationKind, Request};
use super::response::{ResourceResponse, ResponseMetadata};
use super::transport::{Transport, TransportError, TransportRequest, TransportResponse, TransportResult};

/// Next stage in the chain
pub struct Next<'a> {
    middleware: &'a [Arc<dyn Middleware>],
    transport: &'a dyn Transport,
    timeout: Duration,
}

impl<'a> Next<'a> {
    /// Run the next middleware, or the transport at the end of the chain
    pub fn run(self, request: TransportRequest, ctx: &'a RequestContext) -> BoxFuture<'a, TransportResult> {
        Box::pin(async move {
            if let Some((first, rest)) = self.middleware.split_first() {
                let next = Next {
                    middleware: rest,
                    transport: self.transport,
                    timeout: self.timeout,
                };
                first.process(request, ctx, next).await
            } else {
                match tokio::time::timeout(self.timeout, self.transport.send(request)).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(self.timeout)),
                }
            }
        })
    }
}

/// The request pipeline shared by every handle derived from one client
pub struct RequestPipeline {
    config: Arc<ClientConfig>,
    transport: Arc<dyn Transport>,
    middleware: Vec<Arc<dyn Middleware>>,
    metrics: Arc<ClientMetrics>,
}

impl RequestPipeline {
    /// Pipeline with the standard stages: observability, then session
    /// token propagation
    pub fn new(config: Arc<ClientConfig>, transport: Arc<dyn Transport>) -> Self {
        let metrics = Arc::new(ClientMetrics::new());
        let consistency = config.consistency_level;
        Self::bare(config, transport, Arc::clone(&metrics))
            .with_middleware(ObserveMiddleware::new(metrics))
            .with_middleware(SessionMiddleware::new(consistency))
    }

    /// Pipeline with no middleware
    pub fn bare(
        config: Arc<ClientConfig>,
        transport: Arc<dyn Transport>,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self {
            config,
            transport,
            middleware: Vec::new(),
            metrics,
        }
    }

    /// Append a middleware stage
    pub fn with_middleware(mut self, m: impl Middleware + 'static) -> Self {
        self.middleware.push(Arc::new(m));
        self
    }

    pub fn middleware_count(&self) -> usize {
        self.middleware.len()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<ClientMetrics> {
        &self.metrics
    }

    /// Execute one logical operation
    pub async fn execute(&self, mut request: Request) -> CosmosResult<ResourceResponse> {
        let generated_id = prepare_body(&mut request)?;

        let response = self.send(&request).await?;
        if response.is_success() {
            let mut metadata = ResponseMetadata::from_transport(&response);
            metadata.generated_id = generated_id;
            return Ok(ResourceResponse::new(
                response.body.unwrap_or(Value::Null),
                metadata,
            ));
        }

        let error = CosmosError::from_status(response.status, response.message());
        if error.is_conflict()
            && request.operation == OperationKind::Create
            && request.options.conflict_policy == ConflictPolicy::ReturnExisting
        {
            return self.read_existing(&request).await;
        }
        Err(error)
    }

    /// Get-or-create: the create collided, return what is already there
    async fn read_existing(&self, create: &Request) -> CosmosResult<ResourceResponse> {
        let id = create
            .body
            .as_ref()
            .and_then(|b| b.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| CosmosError::bad_request("conflicting create carried no id"))?;
        let path = create.path.child(id)?;

        Logger::info(
            "CONFLICT_RETURNING_EXISTING",
            &[("path", &path.to_string())],
        );

        let mut read = Request::read(path);
        read.options.partition_key = create.options.partition_key.clone();
        read.options.session_token = create.options.session_token.clone();

        let response = self.send(&read).await?;
        if response.is_success() {
            let metadata = ResponseMetadata::from_transport(&response);
            Ok(ResourceResponse::new(
                response.body.unwrap_or(Value::Null),
                metadata,
            ))
        } else {
            Err(CosmosError::from_status(response.status, response.message()))
        }
    }

    /// Build the wire request, run the chain and map transport failures
    async fn send(&self, request: &Request) -> CosmosResult<TransportResponse> {
        let ctx = RequestContext::new();
        let wire = self.build_transport_request(request, &ctx);

        let next = Next {
            middleware: &self.middleware,
            transport: self.transport.as_ref(),
            timeout: self.config.connection_policy.request_timeout(),
        };

        match next.run(wire, &ctx).await {
            Ok(response) => Ok(response),
            Err(TransportError::Timeout(elapsed)) => Err(CosmosError::transient(
                Some(408),
                format!("request timed out after {:?}", elapsed),
            )),
            Err(TransportError::Connection(msg)) => Err(CosmosError::transient(None, msg)),
        }
    }

    fn build_transport_request(&self, request: &Request, ctx: &RequestContext) -> TransportRequest {
        let options = &request.options;
        let mut wire = TransportRequest::new(request.operation, request.path.clone());
        wire.body = request.body.clone();

        wire.set_header(headers::ACTIVITY_ID, ctx.activity_id.to_string());
        wire.set_header(
            headers::DATE,
            chrono::Utc::now()
                .format("%a, %d %b %Y %H:%M:%S GMT")
                .to_string(),
        );
        wire.set_header(
            headers::CONSISTENCY_LEVEL,
            self.config.consistency_level.as_str(),
        );

        if let Some(key) = &options.partition_key {
            wire.set_header(headers::PARTITION_KEY, key.to_header());
        }
        if let Some(range) = &options.partition_key_range_id {
            wire.set_header(headers::PARTITION_KEY_RANGE_ID, range.clone());
        }
        if let Some(etag) = &options.if_match {
            wire.set_header(headers::IF_MATCH, etag.clone());
        }
        if let Some(token) = &options.session_token {
            wire.set_header(headers::SESSION_TOKEN, token.clone());
        }
        if let Some(continuation) = &options.continuation {
            wire.set_header(headers::CONTINUATION, continuation.clone());
        }
        if request.operation == OperationKind::Query {
            let page_size = options
                .max_item_count
                .unwrap_or(self.config.connection_policy.max_item_count);
            wire.set_header(headers::MAX_ITEM_COUNT, page_size.to_string());
            if options.enable_cross_partition_query {
                wire.set_header(headers::ENABLE_CROSS_PARTITION, "true");
            }
        }
        if request.operation == OperationKind::Upsert {
            wire.set_header(headers::IS_UPSERT, "true");
        }
        wire
    }
}

/// Validate the body of a create/upsert/replace and assign an id to items
/// that lack one. Returns the generated id.
fn prepare_body(request: &mut Request) -> CosmosResult<Option<String>> {
    if !matches!(
        request.operation,
        OperationKind::Create | OperationKind::Upsert | OperationKind::Replace
    ) {
        return Ok(None);
    }

    let kind = request.path.resource_type();
    let generate = kind == ResourceType::Item
        && request.operation != OperationKind::Replace
        && !request.options.disable_automatic_id_generation;

    let body = request
        .body
        .as_mut()
        .ok_or_else(|| CosmosError::bad_request(format!("{} requires a body", request.operation.name())))?;
    let object = body
        .as_object_mut()
        .ok_or_else(|| CosmosError::bad_request("resource body must be a JSON object"))?;

    let missing_id = matches!(object.get("id"), None | Some(Value::Null));
    let mut generated = None;
    if missing_id && generate {
        let id = Uuid::new_v4().to_string();
        object.insert("id".to_string(), Value::String(id.clone()));
        generated = Some(id);
    }

    match object.get("id") {
        Some(Value::String(id)) => {
            validate_id(kind, id)?;
            if let Some(path_id) = own_id(&request.path) {
                if id != path_id {
                    return Err(CosmosError::bad_request(format!(
                        "body id {:?} does not match path id {:?}",
                        id, path_id
                    )));
                }
            }
        }
        None | Some(Value::Null) => {}
        Some(other) => {
            return Err(CosmosError::invalid_identifier(format!(
                "id must be a string, got {}",
                other
            )));
        }
    }

    Ok(generated)
}

/// Id named by the last segment of a non-feed path
fn own_id(path: &ResourcePath) -> Option<&str> {
    match path {
        ResourcePath::Database { database } => Some(database),
        ResourcePath::Container { container, .. } => Some(container),
        ResourcePath::Item { item, .. } => Some(item),
        _ => None,
    }
}
