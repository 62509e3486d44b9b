//! Resource Path Resolver Tests
//!
//! - Every valid (database, container, item, partition key) tuple resolves
//!   to a canonical link and parses back to the same path
//! - Invalid ids fail fast with `InvalidIdentifier`
//! - Partition key values keep their wire encoding

use cosmos_sql::resource::{resolve, PartitionKey, ResolvedResource, ResourcePath, MAX_ID_LENGTH};
use cosmos_sql::CosmosError;
use serde_json::json;

// =============================================================================
// Round Trip
// =============================================================================

#[test]
fn test_resolve_round_trips_through_wire_form() {
    let keys = vec![
        None,
        Some(PartitionKey::from("a")),
        Some(PartitionKey::from(7)),
        Some(PartitionKey::from(false)),
        Some(PartitionKey::new(json!(null)).unwrap()),
        Some(PartitionKey::undefined()),
    ];
    let ids = ["db", "Products-2024", "with space", "ünïcode", "a.b_c"];

    for database in ids {
        for container in ids {
            for item in [None, Some("item1"), Some("x y z")] {
                for key in &keys {
                    let resolved = resolve(database, container, item, key.clone()).unwrap();
                    let link = resolved.link();
                    let header = resolved.partition_key_header();

                    let rebuilt = ResolvedResource::from_wire(&link, header.as_deref()).unwrap();
                    assert_eq!(rebuilt, resolved, "link {}", link);
                }
            }
        }
    }
}

#[test]
fn test_canonical_links() {
    let resolved = resolve("testDatabase", "testContainer", Some("something"), None).unwrap();
    assert_eq!(
        resolved.link(),
        "dbs/testDatabase/colls/testContainer/docs/something"
    );

    let resolved = resolve("testDatabase", "testContainer", None, Some("a".into())).unwrap();
    assert_eq!(resolved.link(), "dbs/testDatabase/colls/testContainer");
    assert_eq!(resolved.partition_key_header().as_deref(), Some("[\"a\"]"));
}

#[test]
fn test_partition_key_headers() {
    assert_eq!(PartitionKey::from(1).to_header(), "[1]");
    assert_eq!(PartitionKey::new(json!(null)).unwrap().to_header(), "[null]");
    assert_eq!(PartitionKey::undefined().to_header(), "[{}]");
    assert_eq!(PartitionKey::from_header("[{}]").unwrap(), PartitionKey::Undefined);
    assert!(PartitionKey::from_header("[1, 2]").is_err());
    assert!(PartitionKey::new(json!({"a": 1})).is_err());
}

// =============================================================================
// Invalid Identifiers
// =============================================================================

#[test]
fn test_invalid_ids_rejected() {
    let too_long = "x".repeat(MAX_ID_LENGTH + 1);
    for bad in ["", "a/b", "a\\b", "a?b", "a#b", "trailing ", too_long.as_str()] {
        assert!(
            matches!(resolve(bad, "c", None, None), Err(CosmosError::InvalidIdentifier(_))),
            "database id {:?}",
            bad
        );
        assert!(
            matches!(resolve("db", bad, None, None), Err(CosmosError::InvalidIdentifier(_))),
            "container id {:?}",
            bad
        );
        assert!(
            matches!(resolve("db", "c", Some(bad), None), Err(CosmosError::InvalidIdentifier(_))),
            "item id {:?}",
            bad
        );
    }
}

#[test]
fn test_max_length_id_accepted() {
    let longest = "x".repeat(MAX_ID_LENGTH);
    assert!(resolve(&longest, "c", None, None).is_ok());
}

#[test]
fn test_feed_and_child_paths() {
    let item = ResourcePath::item("db", "c", "i").unwrap();
    let feed = item.feed();
    assert!(feed.is_feed());
    assert_eq!(feed.to_string(), "dbs/db/colls/c/docs");
    assert_eq!(feed.child("i").unwrap(), item);
    assert_eq!(item.container_path(), Some(ResourcePath::container("db", "c").unwrap()));
    assert_eq!(ResourcePath::parse("dbs/db/colls/c/pkranges").unwrap().to_string(), "dbs/db/colls/c/pkranges");
}
