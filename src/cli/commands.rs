//! CLI command implementations

use serde_json::{json, Value};

use crate::client::CosmosClient;
use crate::config::ClientConfig;
use crate::observability::{Logger, Severity};
use crate::query::{BoundQuery, QueryOptions, SqlParameter, SqlQuerySpec};
use crate::resource::{resolve as resolve_resource, ContainerProperties, PartitionKey};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_response, write_step};

const SAMPLE_DATABASE: &str = "testDatabase";
const SAMPLE_CONTAINER: &str = "testContainer";

/// Dispatch a parsed command
pub fn run_command(command: Command) -> CliResult<()> {
    match command {
        Command::Resolve {
            database,
            container,
            item,
            partition_key,
        } => resolve(&database, &container, item.as_deref(), partition_key.as_deref()),
        Command::CheckQuery { query, params } => check_query(&query, &params),
        Command::Sample { config, log_level } => {
            Logger::set_min_severity(Severity::from(log_level));
            let config = match config {
                Some(path) => ClientConfig::from_file(path)?,
                None => ClientConfig::emulator(),
            };
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?;
            runtime.block_on(sample(config))
        }
    }
}

/// Print the canonical link and routing header
pub fn resolve(
    database: &str,
    container: &str,
    item: Option<&str>,
    partition_key: Option<&str>,
) -> CliResult<()> {
    let partition_key = partition_key
        .map(|raw| -> CliResult<PartitionKey> {
            let value: Value = serde_json::from_str(raw)
                .map_err(|e| CliError::invalid_argument(format!("partition key: {}", e)))?;
            Ok(PartitionKey::new(value)?)
        })
        .transpose()?;

    let resolved = resolve_resource(database, container, item, partition_key)?;
    write_response(json!({
        "link": resolved.link(),
        "resource_type": resolved.path.resource_type().as_str(),
        "partition_key_header": resolved.partition_key_header(),
    }))
}

/// Validate query text and bindings, print the parsed plan
pub fn check_query(query: &str, params: &[String]) -> CliResult<()> {
    let mut spec = SqlQuerySpec::new(query);
    for raw in params {
        spec.parameters.push(parse_param(raw)?);
    }

    let bound = BoundQuery::bind(&spec)?;
    write_response(json!({
        "plan": serde_json::to_value(&bound.query)?,
        "parameters": bound.parameters,
    }))
}

/// `name=json`; a bare string that is not valid JSON is taken as a string
fn parse_param(raw: &str) -> CliResult<SqlParameter> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| CliError::invalid_argument(format!("expected NAME=JSON, got {:?}", raw)))?;
    if !name.starts_with('@') || name.len() < 2 {
        return Err(CliError::invalid_argument(format!(
            "parameter name must start with '@': {:?}",
            name
        )));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok(SqlParameter::new(name, value))
}

/// Walk the resource hierarchy against a fresh emulator account
pub async fn sample(config: ClientConfig) -> CliResult<()> {
    let (client, backend) = CosmosClient::with_emulator(config)?;

    let database = client.create_database(SAMPLE_DATABASE, false).await?;
    write_step("create_database", serde_json::to_value(&database.properties)?)?;

    let properties = ContainerProperties::new(SAMPLE_CONTAINER).with_partition_key("/lastName");
    let created = database.database.create_container(properties, false).await?;
    write_step("create_container", serde_json::to_value(&created.properties)?)?;

    let container = client
        .get_database(SAMPLE_DATABASE)
        .await?
        .database
        .get_container(SAMPLE_CONTAINER)
        .await?
        .container;

    container
        .upsert_item(json!({"id": "something", "value": "else", "lastName": "Smith"}))
        .await?;
    let updated = container
        .upsert_item(json!({"id": "something", "value": "new", "lastName": "Smith"}))
        .await?;
    write_step("upsert_item", updated.resource)?;

    let last_names = ["Smith", "Jones", "Brown"];
    for i in 1..10 {
        container
            .upsert_item(json!({
                "id": format!("item{}", i),
                "firstName": "David",
                "lastName": last_names[i % last_names.len()],
                "age": 20 + (i * 7) % 13,
            }))
            .await?;
    }

    let by_id = SqlQuerySpec::new("SELECT * FROM root r WHERE r.id = @id")
        .with_parameter("@id", json!("something"));
    let found = container
        .query_items(by_id, QueryOptions::new().with_partition_key("Smith"))?
        .collect_all()
        .await?;
    write_step("query_by_id", Value::Array(found))?;

    let ordered = container
        .query_items(
            "SELECT r.id, r.lastName, r.age FROM root r WHERE r.firstName = 'David' ORDER BY r.age DESC",
            QueryOptions::new().cross_partition(),
        )?
        .collect_all()
        .await?;
    write_step("cross_partition_order_by", Value::Array(ordered))?;

    let mut properties = container.read_properties().await?;
    properties.default_ttl = Some(10);
    let replaced = database.database.replace_container_properties(properties).await?;
    write_step("set_default_ttl", serde_json::to_value(&replaced.properties)?)?;

    backend.advance_clock(11);
    let remaining = container.list_items()?.collect_all().await?;
    write_step("after_ttl", json!({ "items": remaining.len() }))?;

    write_response(serde_json::to_value(client.metrics())?)
}
