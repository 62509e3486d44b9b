//! Account state of the in-memory backend
//!
//! Databases own containers; containers own a fixed set of physical
//! partitions, each a map from (partition key, id) to the stored document.

use std::collections::BTreeMap;

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::CosmosError;
use crate::resource::{
    validate_id, ContainerProperties, IndexingPolicy, PartitionKey, PartitionKeyDefinition,
    ResourcePath, ResourceType,
};

/// Error status plus message returned to the caller
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub status: u16,
    pub message: String,
}

impl Rejection {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(400, message)
    }

    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::new(404, format!("Resource Not Found: {}", what))
    }

    pub fn conflict(what: impl std::fmt::Display) -> Self {
        Self::new(409, format!("Resource with specified id or name already exists: {}", what))
    }

    pub fn precondition_failed() -> Self {
        Self::new(412, "Operation cannot be performed because one of the specified precondition is not met")
    }

    /// Wire error code for the status
    pub fn code(&self) -> &'static str {
        match self.status {
            400 => "BadRequest",
            404 => "NotFound",
            408 => "RequestTimeout",
            409 => "Conflict",
            412 => "PreconditionFailed",
            429 => "TooManyRequests",
            503 => "ServiceUnavailable",
            s if s >= 500 => "InternalServerError",
            _ => "Unknown",
        }
    }
}

impl From<CosmosError> for Rejection {
    fn from(error: CosmosError) -> Self {
        Self::new(error.status_code().unwrap_or(400), error.to_string())
    }
}

pub type StoreResult<T> = Result<T, Rejection>;

/// Which items a query reads
#[derive(Debug, Clone, PartialEq)]
pub enum Scope {
    /// One logical partition, by normalized key header
    Logical(String),
    /// One physical partition
    Range(usize),
    /// Every partition in range order
    All,
}

type ItemKey = (String, String);

pub struct ContainerEntry {
    properties: Value,
    definition: Option<PartitionKeyDefinition>,
    partitions: Vec<BTreeMap<ItemKey, Value>>,
}

impl ContainerEntry {
    pub fn properties(&self) -> &Value {
        &self.properties
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    fn default_ttl(&self) -> Option<i64> {
        self.properties.get("defaultTtl").and_then(Value::as_i64)
    }

    fn partition_of(&self, key_header: &str) -> usize {
        crc32fast::hash(key_header.as_bytes()) as usize % self.partitions.len()
    }

    /// Drop items whose time to live has elapsed
    pub fn purge_expired(&mut self, now: i64) {
        let default_ttl = self.default_ttl();
        if default_ttl.is_none() {
            return;
        }
        for partition in &mut self.partitions {
            partition.retain(|_, item| !is_expired(item, default_ttl, now));
        }
    }

    /// Normalized key of a document being written
    fn document_key(&self, document: &Value, header: Option<&str>) -> StoreResult<String> {
        let from_document = match &self.definition {
            Some(definition) => PartitionKey::from_document(document, definition)?,
            None => PartitionKey::Undefined,
        };
        if let Some(header) = header {
            if PartitionKey::from_header(header)? != from_document {
                return Err(Rejection::bad_request(
                    "PartitionKey extracted from document doesn't match the one specified in the header",
                ));
            }
        }
        Ok(from_document.to_header())
    }

    /// Normalized key for a point operation
    fn point_key(&self, header: Option<&str>) -> StoreResult<String> {
        match (header, &self.definition) {
            (Some(header), _) => Ok(PartitionKey::from_header(header)?.to_header()),
            (None, None) => Ok(PartitionKey::Undefined.to_header()),
            (None, Some(_)) => Err(Rejection::bad_request(
                "PartitionKey value must be supplied for this operation",
            )),
        }
    }

    /// Create, or replace when `upsert` is set
    pub fn write_item(
        &mut self,
        link: &ResourcePath,
        mut document: Value,
        key_header: Option<&str>,
        upsert: bool,
        if_match: Option<&str>,
        now: i64,
    ) -> StoreResult<(Value, bool)> {
        let id = item_id(&document)?;
        let key = self.document_key(&document, key_header)?;
        let partition = self.partition_of(&key);
        let item_key = (key, id.clone());

        let existing = self.partitions[partition].get(&item_key);
        let rid = match existing {
            Some(current) if upsert => {
                check_etag(current, if_match)?;
                current.get("_rid").and_then(Value::as_str).map(str::to_string)
            }
            Some(_) => return Err(Rejection::conflict(&id)),
            None => None,
        };
        let created = rid.is_none();

        stamp(&mut document, link.child(&id)?.to_string(), rid, now);
        self.partitions[partition].insert(item_key, document.clone());
        Ok((document, created))
    }

    pub fn read_item(&self, id: &str, key_header: Option<&str>) -> StoreResult<Value> {
        let key = self.point_key(key_header)?;
        let partition = self.partition_of(&key);
        self.partitions[partition]
            .get(&(key, id.to_string()))
            .cloned()
            .ok_or_else(|| Rejection::not_found(id))
    }

    pub fn replace_item(
        &mut self,
        link: &ResourcePath,
        id: &str,
        mut document: Value,
        key_header: Option<&str>,
        if_match: Option<&str>,
        now: i64,
    ) -> StoreResult<Value> {
        let key = self.point_key(key_header)?;
        if self.document_key(&document, None)? != key {
            return Err(Rejection::bad_request(
                "partition key of a replaced item cannot change",
            ));
        }
        let partition = self.partition_of(&key);
        let item_key = (key, id.to_string());

        let current = self.partitions[partition]
            .get(&item_key)
            .ok_or_else(|| Rejection::not_found(id))?;
        check_etag(current, if_match)?;
        let rid = current.get("_rid").and_then(Value::as_str).map(str::to_string);

        stamp(&mut document, link.to_string(), rid, now);
        self.partitions[partition].insert(item_key, document.clone());
        Ok(document)
    }

    pub fn delete_item(&mut self, id: &str, key_header: Option<&str>, if_match: Option<&str>) -> StoreResult<()> {
        let key = self.point_key(key_header)?;
        let partition = self.partition_of(&key);
        let item_key = (key, id.to_string());

        let current = self.partitions[partition]
            .get(&item_key)
            .ok_or_else(|| Rejection::not_found(id))?;
        check_etag(current, if_match)?;
        self.partitions[partition].remove(&item_key);
        Ok(())
    }

    /// Items visible to a query, in partition then key order
    pub fn scoped_items(&self, scope: &Scope) -> StoreResult<Vec<&Value>> {
        match scope {
            Scope::Logical(key) => {
                let key = PartitionKey::from_header(key)?.to_header();
                let partition = self.partition_of(&key);
                Ok(self.partitions[partition]
                    .iter()
                    .filter(|((k, _), _)| *k == key)
                    .map(|(_, item)| item)
                    .collect())
            }
            Scope::Range(index) => self
                .partitions
                .get(*index)
                .map(|p| p.values().collect())
                .ok_or_else(|| Rejection::new(410, format!("partition key range {} is gone", index))),
            Scope::All => Ok(self.partitions.iter().flat_map(|p| p.values()).collect()),
        }
    }
}

struct DatabaseEntry {
    properties: Value,
    containers: BTreeMap<String, ContainerEntry>,
}

/// Every database of the account
pub struct AccountStore {
    databases: BTreeMap<String, DatabaseEntry>,
    partition_count: usize,
}

impl AccountStore {
    pub fn new(partition_count: usize) -> Self {
        Self {
            databases: BTreeMap::new(),
            partition_count: partition_count.max(1),
        }
    }

    pub fn create_database(&mut self, mut body: Value, now: i64) -> StoreResult<Value> {
        let id = resource_id(&body, ResourceType::Database)?;
        if self.databases.contains_key(&id) {
            return Err(Rejection::conflict(&id));
        }
        stamp(&mut body, ResourcePath::database(&id)?.to_string(), None, now);
        self.databases.insert(
            id,
            DatabaseEntry {
                properties: body.clone(),
                containers: BTreeMap::new(),
            },
        );
        Ok(body)
    }

    pub fn read_database(&self, id: &str) -> StoreResult<Value> {
        Ok(self.database(id)?.properties.clone())
    }

    pub fn delete_database(&mut self, id: &str) -> StoreResult<()> {
        self.databases
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Rejection::not_found(id))
    }

    pub fn databases(&self) -> Vec<&Value> {
        self.databases.values().map(|d| &d.properties).collect()
    }

    fn database(&self, id: &str) -> StoreResult<&DatabaseEntry> {
        self.databases.get(id).ok_or_else(|| Rejection::not_found(id))
    }

    fn database_mut(&mut self, id: &str) -> StoreResult<&mut DatabaseEntry> {
        self.databases.get_mut(id).ok_or_else(|| Rejection::not_found(id))
    }

    pub fn create_container(&mut self, database: &str, body: Value, now: i64) -> StoreResult<Value> {
        let partition_count = self.partition_count;
        let id = resource_id(&body, ResourceType::Container)?;
        let mut properties = parse_container(body)?;
        let link = ResourcePath::container(database, &id)?;

        let db = self.database_mut(database)?;
        if db.containers.contains_key(&id) {
            return Err(Rejection::conflict(&id));
        }

        if properties.indexing_policy.is_none() {
            properties.indexing_policy = Some(IndexingPolicy::default());
        }
        let definition = properties.partition_key.clone();
        let partitions = if definition.is_some() { partition_count } else { 1 };

        let mut document = serde_json::to_value(&properties).map_err(CosmosError::from)?;
        stamp(&mut document, link.to_string(), None, now);
        db.containers.insert(
            id,
            ContainerEntry {
                properties: document.clone(),
                definition,
                partitions: vec![BTreeMap::new(); partitions],
            },
        );
        Ok(document)
    }

    /// Replace container properties. The partition key cannot change.
    pub fn replace_container(
        &mut self,
        database: &str,
        id: &str,
        body: Value,
        if_match: Option<&str>,
        now: i64,
    ) -> StoreResult<Value> {
        let properties = parse_container(body)?;
        let link = ResourcePath::container(database, id)?;
        let entry = self.container_mut(database, id)?;

        if properties.partition_key != entry.definition {
            return Err(Rejection::bad_request(
                "the partition key of a container cannot be changed",
            ));
        }
        check_etag(&entry.properties, if_match)?;

        let mut document = serde_json::to_value(&properties).map_err(CosmosError::from)?;
        if document.get("indexingPolicy").is_none() {
            if let Some(policy) = entry.properties.get("indexingPolicy") {
                document["indexingPolicy"] = policy.clone();
            }
        }
        let rid = entry
            .properties
            .get("_rid")
            .and_then(Value::as_str)
            .map(str::to_string);
        stamp(&mut document, link.to_string(), rid, now);
        entry.properties = document.clone();
        Ok(document)
    }

    pub fn delete_container(&mut self, database: &str, id: &str) -> StoreResult<()> {
        self.database_mut(database)?
            .containers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Rejection::not_found(id))
    }

    pub fn containers(&self, database: &str) -> StoreResult<Vec<&Value>> {
        Ok(self
            .database(database)?
            .containers
            .values()
            .map(|c| &c.properties)
            .collect())
    }

    pub fn container(&self, database: &str, id: &str) -> StoreResult<&ContainerEntry> {
        self.database(database)?
            .containers
            .get(id)
            .ok_or_else(|| Rejection::not_found(id))
    }

    pub fn container_mut(&mut self, database: &str, id: &str) -> StoreResult<&mut ContainerEntry> {
        self.database_mut(database)?
            .containers
            .get_mut(id)
            .ok_or_else(|| Rejection::not_found(id))
    }
}

fn parse_container(body: Value) -> StoreResult<ContainerProperties> {
    let properties: ContainerProperties = serde_json::from_value(body)
        .map_err(|e| Rejection::bad_request(format!("invalid container properties: {}", e)))?;

    if let Some(definition) = &properties.partition_key {
        if definition.paths.len() != 1 || !definition.path().starts_with('/') {
            return Err(Rejection::bad_request(
                "partition key definition needs exactly one path starting with '/'",
            ));
        }
    }
    if let Some(ttl) = properties.default_ttl {
        if ttl == 0 || ttl < -1 {
            return Err(Rejection::bad_request(
                "defaultTtl must be -1 or a positive number of seconds",
            ));
        }
    }
    Ok(properties)
}

fn resource_id(body: &Value, kind: ResourceType) -> StoreResult<String> {
    let id = body
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| Rejection::bad_request("The input content is invalid because the required property, id, is missing"))?;
    validate_id(kind, id)?;
    Ok(id.to_string())
}

fn item_id(document: &Value) -> StoreResult<String> {
    resource_id(document, ResourceType::Item)
}

fn check_etag(current: &Value, if_match: Option<&str>) -> StoreResult<()> {
    match if_match {
        Some(expected) if current.get("_etag").and_then(Value::as_str) != Some(expected) => {
            Err(Rejection::precondition_failed())
        }
        _ => Ok(()),
    }
}

/// Set the system properties of a stored resource
fn stamp(document: &mut Value, self_link: String, rid: Option<String>, now: i64) {
    if !document.is_object() {
        *document = Value::Object(Map::new());
    }
    if let Value::Object(map) = document {
        let rid = rid.unwrap_or_else(|| Uuid::new_v4().simple().to_string().chars().take(12).collect());
        map.insert("_rid".to_string(), Value::String(rid));
        map.insert("_ts".to_string(), Value::from(now));
        map.insert("_self".to_string(), Value::String(self_link));
        map.insert(
            "_etag".to_string(),
            Value::String(format!("\"{}\"", Uuid::new_v4())),
        );
    }
}

/// Item `ttl` overrides the container default; `-1` never expires.
/// Without a container default, expiry is off entirely.
pub fn is_expired(item: &Value, default_ttl: Option<i64>, now: i64) -> bool {
    let Some(default_ttl) = default_ttl else {
        return false;
    };
    let ttl = item.get("ttl").and_then(Value::as_i64).unwrap_or(default_ttl);
    if ttl <= 0 {
        return false;
    }
    let written = item.get("_ts").and_then(Value::as_i64).unwrap_or(now);
    now >= written + ttl
}
