//! # Resource Model
//!
//! Resource hierarchy (account → database → container → item), canonical
//! paths, partition keys and property documents.
//!
//! Resolution is a pure function of its inputs: no I/O, no shared state.

mod partition_key;
mod path;
mod properties;

pub use partition_key::{lookup_path, PartitionKey};
pub use path::{resolve, validate_id, ResolvedResource, ResourcePath, ResourceType, MAX_ID_LENGTH};
pub use properties::{
    ContainerProperties, DatabaseProperties, IndexPath, IndexingMode, IndexingPolicy,
    PartitionKeyDefinition, SystemProperties,
};
