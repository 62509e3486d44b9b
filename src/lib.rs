//! cosmos-sql - client SDK core for Cosmos-style SQL API document databases
//!
//! Resource hierarchy: account → database → container → item.
//!
//! - `resource`: canonical paths and partition routing keys
//! - `pipeline`: one logical operation, classified into a typed outcome
//! - `query`: SQL subset, parameter binding and the paged cursor
//! - `client`: `CosmosClient` / `Database` / `Container` handles
//! - `emulator`: in-memory backend behind the `Transport` boundary

pub mod cli;
pub mod client;
pub mod config;
pub mod emulator;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod query;
pub mod resource;

pub use client::{Container, ContainerResponse, CosmosClient, Database, DatabaseResponse};
pub use config::{ClientConfig, ConnectionPolicy, ConsistencyLevel};
pub use error::{CosmosError, CosmosResult, ParameterFault};
pub use query::{QueryCursor, QueryOptions, SqlParameter, SqlQuerySpec};
pub use resource::{ContainerProperties, PartitionKey, ResourcePath};
