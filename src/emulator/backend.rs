//! In-memory backend
//!
//! Implements `Transport` over an `AccountStore`, answering with the same
//! statuses, headers and bodies as the service: 201 on create, 204 on
//! delete, 404/409/412 on failures, paged query bodies with continuations.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use futures_util::future::BoxFuture;
use serde_json::{json, Value};

use crate::observability::Logger;
use crate::pipeline::{headers, OperationKind, Transport, TransportError, TransportRequest, TransportResponse, TransportResult};
use crate::query::{execute, fold_aggregate, BoundQuery, SqlQuerySpec};
use crate::resource::ResourcePath;

use super::store::{AccountStore, Rejection, Scope, StoreResult};

/// Number of physical partitions of a partitioned container
pub const DEFAULT_PARTITION_COUNT: usize = 4;

/// Default page size when the request carries none
const DEFAULT_PAGE_SIZE: usize = 100;

/// One-shot failure injected ahead of normal handling
#[derive(Debug, Clone, PartialEq)]
pub enum Fault {
    /// Answer with this status
    Status(u16),
    /// Fail the exchange itself
    Connection,
}

/// Request units charged per operation
fn charge(operation: OperationKind) -> f64 {
    match operation {
        OperationKind::Read => 1.0,
        OperationKind::Query | OperationKind::ReadPartitionKeyRanges => 2.5,
        OperationKind::Delete => 5.0,
        OperationKind::Create | OperationKind::Upsert | OperationKind::Replace => 6.2,
    }
}

/// In-memory account
pub struct InMemoryBackend {
    store: RwLock<AccountStore>,
    clock_offset: AtomicI64,
    lsn: AtomicU64,
    faults: Mutex<VecDeque<Fault>>,
    latency: Mutex<Duration>,
    requests: Mutex<Vec<TransportRequest>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::with_partition_count(DEFAULT_PARTITION_COUNT)
    }

    pub fn with_partition_count(count: usize) -> Self {
        Self {
            store: RwLock::new(AccountStore::new(count)),
            clock_offset: AtomicI64::new(0),
            lsn: AtomicU64::new(0),
            faults: Mutex::new(VecDeque::new()),
            latency: Mutex::new(Duration::ZERO),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Move the backend clock forward, e.g. to expire items
    pub fn advance_clock(&self, seconds: i64) {
        self.clock_offset.fetch_add(seconds, Ordering::SeqCst);
    }

    /// Fail the next request
    pub fn inject_fault(&self, fault: Fault) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push_back(fault);
        }
    }

    /// Delay every response
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut current) = self.latency.lock() {
            *current = latency;
        }
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<TransportRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Latest session token handed out
    pub fn session_token(&self) -> String {
        format!("0:{}", self.lsn.load(Ordering::SeqCst))
    }

    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp() + self.clock_offset.load(Ordering::SeqCst)
    }

    fn next_fault(&self) -> Option<Fault> {
        self.faults.lock().ok().and_then(|mut f| f.pop_front())
    }

    fn handle(&self, request: &TransportRequest) -> TransportResponse {
        let result = match request.operation {
            OperationKind::Query | OperationKind::ReadPartitionKeyRanges | OperationKind::Read => {
                self.handle_read(request)
            }
            _ => self.handle_write(request),
        };

        let mut response = match result {
            Ok(response) => response,
            Err(rejection) => TransportResponse::new(rejection.status).with_body(json!({
                "code": rejection.code(),
                "message": rejection.message,
            })),
        };

        if let Some(activity_id) = request.header(headers::ACTIVITY_ID) {
            response = response.with_header(headers::ACTIVITY_ID, activity_id);
        }
        if let Some(etag) = response
            .body
            .as_ref()
            .and_then(|b| b.get("_etag"))
            .and_then(Value::as_str)
            .map(str::to_string)
        {
            response = response.with_header(headers::ETAG, etag);
        }
        response
            .with_header(headers::REQUEST_CHARGE, charge(request.operation).to_string())
            .with_header(headers::SESSION_TOKEN, self.session_token())
    }

    fn handle_read(&self, request: &TransportRequest) -> StoreResult<TransportResponse> {
        // Expired items are purged before anything reads them
        if let Some((database, container)) = container_of(&request.path) {
            let now = self.now();
            let mut store = self.write_store()?;
            if let Ok(entry) = store.container_mut(database, container) {
                entry.purge_expired(now);
            }
        }

        let store = self.read_store()?;
        let key = request.header(headers::PARTITION_KEY);

        match (&request.path, request.operation) {
            (ResourcePath::Database { database }, OperationKind::Read) => {
                Ok(ok(200, store.read_database(database)?))
            }
            (ResourcePath::Container { database, container }, OperationKind::Read) => Ok(ok(
                200,
                store.container(database, container)?.properties().clone(),
            )),
            (ResourcePath::Item { database, container, item }, OperationKind::Read) => Ok(ok(
                200,
                store.container(database, container)?.read_item(item, key)?,
            )),
            (ResourcePath::Databases, OperationKind::Query) => {
                query_page(request, store.databases())
            }
            (ResourcePath::Containers { database }, OperationKind::Query) => {
                query_page(request, store.containers(database)?)
            }
            (ResourcePath::Items { database, container }, OperationKind::Query) => {
                let entry = store.container(database, container)?;
                let scope = query_scope(request, entry.partition_count())?;
                query_page(request, entry.scoped_items(&scope)?)
            }
            (ResourcePath::PartitionKeyRanges { database, container }, OperationKind::ReadPartitionKeyRanges) => {
                let count = store.container(database, container)?.partition_count();
                let ranges: Vec<Value> = (0..count).map(|id| json!({"id": id.to_string()})).collect();
                Ok(ok(200, json!({"PartitionKeyRanges": ranges, "_count": count}))
                    .with_header(headers::ITEM_COUNT, count.to_string()))
            }
            (path, operation) => Err(unsupported(path, operation)),
        }
    }

    fn handle_write(&self, request: &TransportRequest) -> StoreResult<TransportResponse> {
        let now = self.now();
        let key = request.header(headers::PARTITION_KEY);
        let if_match = request.header(headers::IF_MATCH);
        let body = || {
            request
                .body
                .clone()
                .ok_or_else(|| Rejection::bad_request("request body is required"))
        };

        let mut store = self.write_store()?;
        let response = match (&request.path, request.operation) {
            (ResourcePath::Databases, OperationKind::Create) => ok(201, store.create_database(body()?, now)?),
            (ResourcePath::Database { database }, OperationKind::Delete) => {
                store.delete_database(database)?;
                TransportResponse::new(204)
            }
            (ResourcePath::Containers { database }, OperationKind::Create) => {
                ok(201, store.create_container(database, body()?, now)?)
            }
            (ResourcePath::Container { database, container }, OperationKind::Replace) => {
                ok(200, store.replace_container(database, container, body()?, if_match, now)?)
            }
            (ResourcePath::Container { database, container }, OperationKind::Delete) => {
                store.delete_container(database, container)?;
                TransportResponse::new(204)
            }
            (ResourcePath::Items { database, container }, OperationKind::Create | OperationKind::Upsert) => {
                let upsert = request.operation == OperationKind::Upsert;
                let entry = store.container_mut(database, container)?;
                entry.purge_expired(now);
                let (document, created) =
                    entry.write_item(&request.path, body()?, key, upsert, if_match, now)?;
                ok(if created { 201 } else { 200 }, document)
            }
            (ResourcePath::Item { database, container, item }, OperationKind::Replace) => {
                let entry = store.container_mut(database, container)?;
                entry.purge_expired(now);
                ok(200, entry.replace_item(&request.path, item, body()?, key, if_match, now)?)
            }
            (ResourcePath::Item { database, container, item }, OperationKind::Delete) => {
                let entry = store.container_mut(database, container)?;
                entry.purge_expired(now);
                entry.delete_item(item, key, if_match)?;
                TransportResponse::new(204)
            }
            (path, operation) => return Err(unsupported(path, operation)),
        };

        self.lsn.fetch_add(1, Ordering::SeqCst);
        Ok(response)
    }

    fn read_store(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, AccountStore>> {
        self.store
            .read()
            .map_err(|_| Rejection::new(500, "account state is poisoned"))
    }

    fn write_store(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, AccountStore>> {
        self.store
            .write()
            .map_err(|_| Rejection::new(500, "account state is poisoned"))
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for InMemoryBackend {
    fn send(&self, request: TransportRequest) -> BoxFuture<'_, TransportResult> {
        Box::pin(async move {
            let latency = self.latency.lock().map(|l| *l).unwrap_or_default();
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }

            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request.clone());
            }

            match self.next_fault() {
                Some(Fault::Connection) => {
                    return Err(TransportError::Connection("connection reset by peer".to_string()))
                }
                Some(Fault::Status(status)) => {
                    let rejection = Rejection::new(status, "injected fault");
                    return Ok(TransportResponse::new(status).with_body(json!({
                        "code": rejection.code(),
                        "message": rejection.message,
                    })));
                }
                None => {}
            }

            let response = self.handle(&request);
            Logger::trace(
                "BACKEND_HANDLED",
                &[
                    ("operation", request.operation.name()),
                    ("path", &request.path.to_string()),
                    ("status", &response.status.to_string()),
                ],
            );
            Ok(response)
        })
    }
}

fn ok(status: u16, body: Value) -> TransportResponse {
    TransportResponse::new(status).with_body(body)
}

fn unsupported(path: &ResourcePath, operation: OperationKind) -> Rejection {
    Rejection::new(
        405,
        format!("{} is not supported on {}", operation.name(), path),
    )
}

fn container_of(path: &ResourcePath) -> Option<(&str, &str)> {
    Some((path.database_id()?, path.container_id()?))
}

/// Partition key header, then range id, then the whole container.
/// An unscoped query over several ranges needs the cross-partition flag.
fn query_scope(request: &TransportRequest, partition_count: usize) -> StoreResult<Scope> {
    if let Some(key) = request.header(headers::PARTITION_KEY) {
        return Ok(Scope::Logical(key.to_string()));
    }
    if let Some(range) = request.header(headers::PARTITION_KEY_RANGE_ID) {
        return range
            .parse()
            .map(Scope::Range)
            .map_err(|_| Rejection::bad_request(format!("invalid partition key range id {:?}", range)));
    }
    let cross_partition = request.header(headers::ENABLE_CROSS_PARTITION) == Some("true");
    if partition_count > 1 && !cross_partition {
        return Err(Rejection::bad_request(
            "Cross partition query is required but disabled. Please set x-ms-documentdb-query-enablecrosspartition to true, specify x-ms-documentdb-partitionkey, or revise your query to avoid this exception.",
        ));
    }
    Ok(Scope::All)
}

/// Evaluate the query over `documents` and cut the page named by the
/// continuation.
fn query_page(request: &TransportRequest, documents: Vec<&Value>) -> StoreResult<TransportResponse> {
    let body = request
        .body
        .clone()
        .ok_or_else(|| Rejection::bad_request("query body is required"))?;
    let spec: SqlQuerySpec = serde_json::from_value(body)
        .map_err(|e| Rejection::bad_request(format!("invalid query body: {}", e)))?;
    let bound = BoundQuery::bind(&spec)?;

    // One partial per partition; the client merges them
    if let Some(aggregate) = bound.query.aggregate() {
        let partial = fold_aggregate(&bound, aggregate, documents);
        let partial = serde_json::to_value(&partial)
            .map_err(|e| Rejection::new(500, format!("cannot encode aggregate: {}", e)))?;
        return Ok(ok(200, json!({"Documents": [partial], "_count": 1}))
            .with_header(headers::ITEM_COUNT, "1"));
    }

    let rows = execute(&bound, documents);
    let ordered = bound.query.merge_order().is_some();

    let offset = match request.header(headers::CONTINUATION) {
        Some(token) => token
            .parse::<usize>()
            .map_err(|_| Rejection::bad_request(format!("invalid continuation {:?}", token)))?,
        None => 0,
    };
    let page_size = request
        .header(headers::MAX_ITEM_COUNT)
        .and_then(|v| v.parse::<i64>().ok())
        .map(|n| if n <= 0 { usize::MAX } else { n as usize })
        .unwrap_or(DEFAULT_PAGE_SIZE);

    let total_rows = rows.len();
    let end = offset.saturating_add(page_size).min(total_rows);
    let page: Vec<Value> = rows
        .into_iter()
        .skip(offset)
        .take(end.saturating_sub(offset))
        .map(|row| match (ordered, row.order_key) {
            (true, Some(key)) => json!({"orderByItems": [{"item": key}], "payload": row.payload}),
            (_, _) => row.payload,
        })
        .collect();
    let count = page.len();

    let mut response = ok(200, json!({"Documents": page, "_count": count}))
        .with_header(headers::ITEM_COUNT, count.to_string());
    if end < total_rows {
        response = response.with_header(headers::CONTINUATION, end.to_string());
    }
    Ok(response)
}
