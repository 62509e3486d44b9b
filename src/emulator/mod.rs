//! # In-Memory Backend
//!
//! A local stand-in for the service behind the `Transport` boundary. It
//! keeps databases, containers and items in memory, partitions items by a
//! hash of their partition key, evaluates queries per partition and pages
//! results with continuations. Used by tests, the CLI walkthrough and
//! anyone wanting to run the client without an account.

mod backend;
mod store;

pub use backend::{Fault, InMemoryBackend, DEFAULT_PARTITION_COUNT};
pub use store::is_expired;
