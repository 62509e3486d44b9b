//! # Query Cursor
//!
//! Explicit, forward-only cursor over the documents of a query.
//!
//! ```text
//! Initial -> FetchingPage -> HasPage -> Exhausted
//!     \            \            \
//!      +------------+------------+--> Failed (terminal)
//! ```
//!
//! Methods take `&mut self`: one cursor is driven by one caller at a time.
//! A `CancelHandle` can stop it from any task, including while a page
//! request is in flight.

use std::collections::VecDeque;
use std::sync::Arc;

use futures_util::Stream;
use serde_json::Value;
use tokio::sync::watch;

use crate::error::{CosmosError, CosmosResult};
use crate::observability::Logger;
use crate::pipeline::{OperationKind, Request, RequestOptions, RequestPipeline, ResourceResponse};
use crate::resource::{PartitionKey, ResourcePath};

use super::aggregate::PartialAggregate;
use super::ast::{AggregateFunction, SortDirection};
use super::merge::{select_next, OrderKeyGuard};
use super::parser::BoundQuery;
use super::spec::SqlQuerySpec;

/// Per-query options
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Scope the query to one logical partition
    pub partition_key: Option<PartitionKey>,
    /// Fan out over every partition key range
    pub enable_cross_partition_query: bool,
    /// Page size; the client default applies when unset
    pub max_item_count: Option<usize>,
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_partition_key(mut self, key: impl Into<PartitionKey>) -> Self {
        self.partition_key = Some(key.into());
        self
    }

    pub fn cross_partition(mut self) -> Self {
        self.enable_cross_partition_query = true;
        self
    }

    pub fn with_max_item_count(mut self, count: usize) -> Self {
        self.max_item_count = Some(count);
        self
    }
}

/// Cursor state
#[derive(Debug, Clone)]
pub enum QueryState {
    /// Validated, nothing requested yet
    Initial,
    /// A page must be (or is being) requested
    FetchingPage,
    /// Buffered documents are available
    HasPage,
    /// Every document has been returned
    Exhausted,
    /// Terminal failure; every later call returns this error
    Failed(CosmosError),
}

impl QueryState {
    pub fn name(&self) -> &'static str {
        match self {
            QueryState::Initial => "initial",
            QueryState::FetchingPage => "fetching_page",
            QueryState::HasPage => "has_page",
            QueryState::Exhausted => "exhausted",
            QueryState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, QueryState::Exhausted | QueryState::Failed(_))
    }
}

/// Cancels a cursor from any task
#[derive(Debug, Clone)]
pub struct CancelHandle {
    signal: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    fn new() -> Self {
        let (signal, _) = watch::channel(false);
        Self {
            signal: Arc::new(signal),
        }
    }

    pub fn cancel(&self) {
        self.signal.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.signal.borrow()
    }

    /// Resolves once `cancel` has been called
    async fn cancelled(&self) {
        let mut receiver = self.signal.subscribe();
        let _ = receiver.wait_for(|cancelled| *cancelled).await;
    }
}

/// Where a page request is routed
#[derive(Debug, Clone, PartialEq)]
enum PageTarget {
    Partition(PartitionKey),
    Range(String),
    Unscoped,
}

impl PageTarget {
    fn describe(&self) -> String {
        match self {
            PageTarget::Partition(key) => format!("pk:{}", key),
            PageTarget::Range(id) => format!("range:{}", id),
            PageTarget::Unscoped => "unscoped".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
struct Row {
    order_key: Option<Value>,
    payload: Value,
}

/// Paging position within one target
#[derive(Debug)]
struct RangeCursor {
    target: PageTarget,
    buffer: VecDeque<Row>,
    continuation: Option<String>,
    done: bool,
}

impl RangeCursor {
    fn new(target: PageTarget) -> Self {
        Self {
            target,
            buffer: VecDeque::new(),
            continuation: None,
            done: false,
        }
    }
}

/// Forward-only query cursor
pub struct QueryCursor {
    pipeline: Arc<RequestPipeline>,
    feed: ResourcePath,
    spec: SqlQuerySpec,
    bound: BoundQuery,
    options: QueryOptions,
    state: QueryState,
    ranges: Vec<RangeCursor>,
    current: usize,
    yielded: usize,
    guard: OrderKeyGuard,
    cancel: CancelHandle,
    fetch_in_flight: bool,
    aggregated: bool,
}

impl QueryCursor {
    /// Validate the query and create a cursor over `feed`.
    ///
    /// Fails with `UnboundParameter` when placeholders and bindings
    /// disagree, and with `ClientError(400)` on a syntax error.
    pub fn new(
        pipeline: Arc<RequestPipeline>,
        feed: ResourcePath,
        spec: SqlQuerySpec,
        options: QueryOptions,
    ) -> CosmosResult<Self> {
        if !feed.is_feed() {
            return Err(CosmosError::bad_request(format!("{} is not a feed", feed)));
        }
        let bound = BoundQuery::bind(&spec)?;

        Ok(Self {
            pipeline,
            feed,
            spec,
            bound,
            options,
            state: QueryState::Initial,
            ranges: Vec::new(),
            current: 0,
            yielded: 0,
            guard: OrderKeyGuard::new(),
            cancel: CancelHandle::new(),
            fetch_in_flight: false,
            aggregated: false,
        })
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn spec(&self) -> &SqlQuerySpec {
        &self.spec
    }

    /// Whether `next` may still return a document
    pub fn has_more(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Cancel the query. Every later `next` fails with `Cancelled`.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if !self.state.is_terminal() {
            self.fail(CosmosError::Cancelled);
        }
    }

    /// Next document, or `None` once the query is exhausted
    pub async fn next(&mut self) -> CosmosResult<Option<Value>> {
        match &self.state {
            QueryState::Failed(error) => return Err(error.clone()),
            QueryState::Exhausted => return Ok(None),
            _ => {}
        }

        // A previous `next` was dropped while waiting on a page
        if self.fetch_in_flight || self.cancel.is_cancelled() {
            self.fetch_in_flight = false;
            return Err(self.fail(CosmosError::Cancelled));
        }

        match self.advance().await {
            Ok(Some(document)) => {
                self.yielded += 1;
                self.settle();
                Ok(Some(document))
            }
            Ok(None) => {
                self.state = QueryState::Exhausted;
                Ok(None)
            }
            Err(error) => Err(self.fail(error)),
        }
    }

    /// Drain the cursor
    pub async fn collect_all(mut self) -> CosmosResult<Vec<Value>> {
        let mut documents = Vec::new();
        while let Some(document) = self.next().await? {
            documents.push(document);
        }
        Ok(documents)
    }

    /// Adapt the cursor into a stream that ends after the first error
    pub fn into_stream(self) -> impl Stream<Item = CosmosResult<Value>> {
        futures_util::stream::unfold(Some(self), |cursor| async move {
            let mut cursor = cursor?;
            match cursor.next().await {
                Ok(Some(document)) => Some((Ok(document), Some(cursor))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
    }

    async fn advance(&mut self) -> CosmosResult<Option<Value>> {
        if self.top_reached() {
            return Ok(None);
        }
        if matches!(self.state, QueryState::Initial) {
            self.state = QueryState::FetchingPage;
            self.ranges = self.resolve_targets().await?;
        }

        if let Some(function) = self.bound.query.aggregate().map(|a| a.function) {
            return self.next_aggregate(function).await;
        }
        match self.bound.query.merge_order().map(|o| o.direction) {
            Some(direction) => self.next_merged(direction).await,
            None => self.next_sequential().await,
        }
    }

    /// Drain every range and merge the partials into one value.
    /// An undefined aggregate yields `null`.
    async fn next_aggregate(&mut self, function: AggregateFunction) -> CosmosResult<Option<Value>> {
        if self.aggregated {
            return Ok(None);
        }

        let mut total = PartialAggregate::default();
        for index in 0..self.ranges.len() {
            while !self.ranges[index].done {
                self.fetch_page(index).await?;
            }
            for row in std::mem::take(&mut self.ranges[index].buffer) {
                let partial: PartialAggregate = serde_json::from_value(row.payload)?;
                total.merge(function, partial);
            }
        }

        self.aggregated = true;
        Ok(Some(total.finish(function).unwrap_or(Value::Null)))
    }

    /// Range by range, in enumeration order
    async fn next_sequential(&mut self) -> CosmosResult<Option<Value>> {
        loop {
            let Some(range) = self.ranges.get_mut(self.current) else {
                return Ok(None);
            };
            if let Some(row) = range.buffer.pop_front() {
                return Ok(Some(row.payload));
            }
            if range.done {
                self.current += 1;
                continue;
            }
            self.fetch_page(self.current).await?;
        }
    }

    /// k-way merge over one buffered page per range
    async fn next_merged(&mut self, direction: SortDirection) -> CosmosResult<Option<Value>> {
        for index in 0..self.ranges.len() {
            while self.ranges[index].buffer.is_empty() && !self.ranges[index].done {
                self.fetch_page(index).await?;
            }
        }

        let heads: Vec<Option<&Value>> = self
            .ranges
            .iter()
            .map(|r| r.buffer.front().and_then(|row| row.order_key.as_ref()))
            .collect();
        let Some(index) = select_next(&heads, direction) else {
            return Ok(None);
        };

        Ok(self.ranges[index].buffer.pop_front().map(|row| row.payload))
    }

    fn top_reached(&self) -> bool {
        self.bound.query.top.is_some_and(|top| self.yielded >= top)
    }

    fn settle(&mut self) {
        let buffered = self.ranges.iter().any(|r| !r.buffer.is_empty());
        let pending = self.ranges.iter().any(|r| !r.done);
        self.state = if self.top_reached() || (!buffered && !pending) {
            QueryState::Exhausted
        } else if buffered {
            QueryState::HasPage
        } else {
            QueryState::FetchingPage
        };
    }

    fn fail(&mut self, error: CosmosError) -> CosmosError {
        if matches!(error, CosmosError::Cancelled) {
            self.pipeline.metrics().increment_queries_cancelled();
            Logger::info(
                "QUERY_CANCELLED",
                &[
                    ("feed", &self.feed.to_string()),
                    ("returned", &self.yielded.to_string()),
                    ("state", self.state.name()),
                ],
            );
        }
        self.state = QueryState::Failed(error.clone());
        error
    }

    /// Send one request, racing it against cancellation
    async fn dispatch(&mut self, request: Request) -> CosmosResult<ResourceResponse> {
        let pipeline = Arc::clone(&self.pipeline);
        let cancel = self.cancel.clone();

        self.fetch_in_flight = true;
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CosmosError::Cancelled),
            response = pipeline.execute(request) => response,
        };
        self.fetch_in_flight = false;
        result
    }

    /// Pages are requested from one partition, from every range in
    /// ascending range id order, or unscoped.
    async fn resolve_targets(&mut self) -> CosmosResult<Vec<RangeCursor>> {
        if let Some(key) = &self.options.partition_key {
            return Ok(vec![RangeCursor::new(PageTarget::Partition(key.clone()))]);
        }

        let (database, container) = match &self.feed {
            ResourcePath::Items { database, container } if self.options.enable_cross_partition_query => {
                (database.clone(), container.clone())
            }
            _ => return Ok(vec![RangeCursor::new(PageTarget::Unscoped)]),
        };

        let path = ResourcePath::PartitionKeyRanges { database, container };
        let response = self
            .dispatch(Request::new(OperationKind::ReadPartitionKeyRanges, path))
            .await?;

        let mut ids: Vec<String> = response
            .resource
            .get("PartitionKeyRanges")
            .and_then(Value::as_array)
            .ok_or_else(|| CosmosError::Serialization("missing PartitionKeyRanges".to_string()))?
            .iter()
            .filter_map(|range| range.get("id").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        ids.sort_by(|a, b| match (a.parse::<u64>(), b.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            _ => a.cmp(b),
        });

        Ok(ids
            .into_iter()
            .map(|id| RangeCursor::new(PageTarget::Range(id)))
            .collect())
    }

    async fn fetch_page(&mut self, index: usize) -> CosmosResult<()> {
        self.state = QueryState::FetchingPage;

        let range = &self.ranges[index];
        let target = range.target.clone();
        let mut options = RequestOptions {
            continuation: range.continuation.clone(),
            max_item_count: self.options.max_item_count,
            ..RequestOptions::default()
        };
        match &target {
            PageTarget::Partition(key) => options.partition_key = Some(key.clone()),
            PageTarget::Range(id) => {
                options.partition_key_range_id = Some(id.clone());
                options.enable_cross_partition_query = true;
            }
            PageTarget::Unscoped => {}
        }

        let request = Request::new(OperationKind::Query, self.feed.clone())
            .with_body(serde_json::to_value(&self.spec)?)
            .with_options(options);
        let response = self.dispatch(request).await?;

        let continuation = response.metadata.continuation.clone();
        let documents = match response.resource {
            Value::Object(mut body) => body.remove("Documents"),
            _ => None,
        };
        let Some(Value::Array(documents)) = documents else {
            return Err(CosmosError::Serialization(
                "query page is missing Documents".to_string(),
            ));
        };

        let count = documents.len();
        let mut rows = VecDeque::with_capacity(count);
        for document in documents {
            rows.push_back(self.unwrap_row(document)?);
        }

        let metrics = self.pipeline.metrics();
        metrics.increment_pages_fetched();
        metrics.add_documents_returned(count as u64);
        Logger::trace(
            "QUERY_PAGE_FETCHED",
            &[
                ("count", &count.to_string()),
                ("feed", &self.feed.to_string()),
                ("more", if continuation.is_some() { "true" } else { "false" }),
                ("target", &target.describe()),
            ],
        );

        let range = &mut self.ranges[index];
        range.buffer.extend(rows);
        range.done = continuation.is_none();
        range.continuation = continuation;
        Ok(())
    }

    /// ORDER BY pages carry `{"orderByItems": [{"item": key}], "payload": doc}`
    fn unwrap_row(&mut self, document: Value) -> CosmosResult<Row> {
        if self.bound.query.merge_order().is_none() {
            return Ok(Row {
                order_key: None,
                payload: document,
            });
        }

        let Value::Object(mut wrapper) = document else {
            return Err(CosmosError::Serialization(
                "ORDER BY result is not an object".to_string(),
            ));
        };
        let key = wrapper
            .get("orderByItems")
            .and_then(|items| items.get(0))
            .and_then(|item| item.get("item"))
            .cloned()
            .ok_or_else(|| CosmosError::Serialization("ORDER BY result has no key".to_string()))?;
        self.guard.check(&key)?;

        Ok(Row {
            order_key: Some(key),
            payload: wrapper.remove("payload").unwrap_or(Value::Null),
        })
    }
}

impl std::fmt::Debug for QueryCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCursor")
            .field("feed", &self.feed)
            .field("query", &self.spec.query)
            .field("state", &self.state)
            .field("yielded", &self.yielded)
            .finish()
    }
}
