//! Canonical resource paths
//!
//! Maps logical resource identity to the addressable link used on the wire
//! (`dbs/{db}/colls/{coll}/docs/{id}`) and back.

use std::fmt;

use crate::error::{CosmosError, CosmosResult};

use super::partition_key::PartitionKey;

/// Maximum id length in characters
pub const MAX_ID_LENGTH: usize = 255;

/// Characters that would break link segmentation
const DISALLOWED_ID_CHARS: [char; 4] = ['/', '\\', '?', '#'];

const DATABASES_SEGMENT: &str = "dbs";
const CONTAINERS_SEGMENT: &str = "colls";
const ITEMS_SEGMENT: &str = "docs";
const PKRANGES_SEGMENT: &str = "pkranges";

/// Kind of resource a path addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Database,
    Container,
    Item,
    PartitionKeyRange,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Database => "database",
            ResourceType::Container => "container",
            ResourceType::Item => "item",
            ResourceType::PartitionKeyRange => "pkrange",
        }
    }
}

/// Validate a database, container or item id.
///
/// Ids are non-empty, at most [`MAX_ID_LENGTH`] characters, contain none of
/// `/ \ ? #` and do not end with a space.
pub fn validate_id(kind: ResourceType, id: &str) -> CosmosResult<()> {
    if id.is_empty() {
        return Err(CosmosError::invalid_identifier(format!(
            "{} id cannot be empty",
            kind.as_str()
        )));
    }
    if id.chars().count() > MAX_ID_LENGTH {
        return Err(CosmosError::invalid_identifier(format!(
            "{} id exceeds {} characters",
            kind.as_str(),
            MAX_ID_LENGTH
        )));
    }
    if let Some(c) = id.chars().find(|c| DISALLOWED_ID_CHARS.contains(c)) {
        return Err(CosmosError::invalid_identifier(format!(
            "{} id {:?} contains disallowed character {:?}",
            kind.as_str(),
            id,
            c
        )));
    }
    if id.ends_with(' ') {
        return Err(CosmosError::invalid_identifier(format!(
            "{} id {:?} cannot end with a space",
            kind.as_str(),
            id
        )));
    }
    Ok(())
}

/// An addressable resource or feed
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourcePath {
    /// All databases in the account
    Databases,
    Database {
        database: String,
    },
    /// All containers in a database
    Containers {
        database: String,
    },
    Container {
        database: String,
        container: String,
    },
    /// All items in a container
    Items {
        database: String,
        container: String,
    },
    Item {
        database: String,
        container: String,
        item: String,
    },
    /// Physical partitions of a container
    PartitionKeyRanges {
        database: String,
        container: String,
    },
}

impl ResourcePath {
    pub fn database(database: &str) -> CosmosResult<Self> {
        validate_id(ResourceType::Database, database)?;
        Ok(Self::Database {
            database: database.to_string(),
        })
    }

    pub fn containers(database: &str) -> CosmosResult<Self> {
        validate_id(ResourceType::Database, database)?;
        Ok(Self::Containers {
            database: database.to_string(),
        })
    }

    pub fn container(database: &str, container: &str) -> CosmosResult<Self> {
        validate_id(ResourceType::Database, database)?;
        validate_id(ResourceType::Container, container)?;
        Ok(Self::Container {
            database: database.to_string(),
            container: container.to_string(),
        })
    }

    pub fn items(database: &str, container: &str) -> CosmosResult<Self> {
        validate_id(ResourceType::Database, database)?;
        validate_id(ResourceType::Container, container)?;
        Ok(Self::Items {
            database: database.to_string(),
            container: container.to_string(),
        })
    }

    pub fn item(database: &str, container: &str, item: &str) -> CosmosResult<Self> {
        validate_id(ResourceType::Database, database)?;
        validate_id(ResourceType::Container, container)?;
        validate_id(ResourceType::Item, item)?;
        Ok(Self::Item {
            database: database.to_string(),
            container: container.to_string(),
            item: item.to_string(),
        })
    }

    pub fn partition_key_ranges(database: &str, container: &str) -> CosmosResult<Self> {
        validate_id(ResourceType::Database, database)?;
        validate_id(ResourceType::Container, container)?;
        Ok(Self::PartitionKeyRanges {
            database: database.to_string(),
            container: container.to_string(),
        })
    }

    /// Parse a link produced by `Display`. A leading or trailing `/` is
    /// accepted.
    pub fn parse(link: &str) -> CosmosResult<Self> {
        let trimmed = link.trim_matches('/');
        let segments: Vec<&str> = if trimmed.is_empty() {
            Vec::new()
        } else {
            trimmed.split('/').collect()
        };

        match segments.as_slice() {
            [DATABASES_SEGMENT] => Ok(Self::Databases),
            [DATABASES_SEGMENT, db] => Self::database(db),
            [DATABASES_SEGMENT, db, CONTAINERS_SEGMENT] => Self::containers(db),
            [DATABASES_SEGMENT, db, CONTAINERS_SEGMENT, coll] => Self::container(db, coll),
            [DATABASES_SEGMENT, db, CONTAINERS_SEGMENT, coll, ITEMS_SEGMENT] => {
                Self::items(db, coll)
            }
            [DATABASES_SEGMENT, db, CONTAINERS_SEGMENT, coll, ITEMS_SEGMENT, id] => {
                Self::item(db, coll, id)
            }
            [DATABASES_SEGMENT, db, CONTAINERS_SEGMENT, coll, PKRANGES_SEGMENT] => {
                Self::partition_key_ranges(db, coll)
            }
            _ => Err(CosmosError::invalid_identifier(format!(
                "not a resource link: {:?}",
                link
            ))),
        }
    }

    pub fn database_id(&self) -> Option<&str> {
        match self {
            Self::Databases => None,
            Self::Database { database }
            | Self::Containers { database }
            | Self::Container { database, .. }
            | Self::Items { database, .. }
            | Self::Item { database, .. }
            | Self::PartitionKeyRanges { database, .. } => Some(database),
        }
    }

    pub fn container_id(&self) -> Option<&str> {
        match self {
            Self::Container { container, .. }
            | Self::Items { container, .. }
            | Self::Item { container, .. }
            | Self::PartitionKeyRanges { container, .. } => Some(container),
            _ => None,
        }
    }

    pub fn item_id(&self) -> Option<&str> {
        match self {
            Self::Item { item, .. } => Some(item),
            _ => None,
        }
    }

    /// Whether the path names a collection of resources rather than one
    pub fn is_feed(&self) -> bool {
        matches!(
            self,
            Self::Databases | Self::Containers { .. } | Self::Items { .. } | Self::PartitionKeyRanges { .. }
        )
    }

    pub fn resource_type(&self) -> ResourceType {
        match self {
            Self::Databases | Self::Database { .. } => ResourceType::Database,
            Self::Containers { .. } | Self::Container { .. } => ResourceType::Container,
            Self::Items { .. } | Self::Item { .. } => ResourceType::Item,
            Self::PartitionKeyRanges { .. } => ResourceType::PartitionKeyRange,
        }
    }

    /// The feed a resource is created in
    pub fn feed(&self) -> Self {
        match self {
            Self::Database { .. } => Self::Databases,
            Self::Container { database, .. } => Self::Containers {
                database: database.clone(),
            },
            Self::Item {
                database,
                container,
                ..
            } => Self::Items {
                database: database.clone(),
                container: container.clone(),
            },
            other => other.clone(),
        }
    }

    /// The member of this feed with the given id
    pub fn child(&self, id: &str) -> CosmosResult<Self> {
        match self {
            Self::Databases => Self::database(id),
            Self::Containers { database } => Self::container(database, id),
            Self::Items {
                database,
                container,
            } => Self::item(database, container, id),
            other => Err(CosmosError::invalid_identifier(format!(
                "{} has no addressable children",
                other
            ))),
        }
    }

    /// The container a path belongs to, if any
    pub fn container_path(&self) -> Option<Self> {
        match (self.database_id(), self.container_id()) {
            (Some(database), Some(container)) => Some(Self::Container {
                database: database.to_string(),
                container: container.to_string(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Databases => write!(f, "{}", DATABASES_SEGMENT),
            Self::Database { database } => write!(f, "{}/{}", DATABASES_SEGMENT, database),
            Self::Containers { database } => {
                write!(f, "{}/{}/{}", DATABASES_SEGMENT, database, CONTAINERS_SEGMENT)
            }
            Self::Container {
                database,
                container,
            } => write!(
                f,
                "{}/{}/{}/{}",
                DATABASES_SEGMENT, database, CONTAINERS_SEGMENT, container
            ),
            Self::Items {
                database,
                container,
            } => write!(
                f,
                "{}/{}/{}/{}/{}",
                DATABASES_SEGMENT, database, CONTAINERS_SEGMENT, container, ITEMS_SEGMENT
            ),
            Self::Item {
                database,
                container,
                item,
            } => write!(
                f,
                "{}/{}/{}/{}/{}/{}",
                DATABASES_SEGMENT, database, CONTAINERS_SEGMENT, container, ITEMS_SEGMENT, item
            ),
            Self::PartitionKeyRanges {
                database,
                container,
            } => write!(
                f,
                "{}/{}/{}/{}/{}",
                DATABASES_SEGMENT, database, CONTAINERS_SEGMENT, container, PKRANGES_SEGMENT
            ),
        }
    }
}

/// A resolved target: canonical path plus the routing key for
/// partition-scoped operations
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedResource {
    pub path: ResourcePath,
    pub partition_key: Option<PartitionKey>,
}

impl ResolvedResource {
    /// Canonical link string
    pub fn link(&self) -> String {
        self.path.to_string()
    }

    /// Value of the partition key routing header, if any
    pub fn partition_key_header(&self) -> Option<String> {
        self.partition_key.as_ref().map(PartitionKey::to_header)
    }

    /// Rebuild a resolution from its wire form
    pub fn from_wire(link: &str, partition_key_header: Option<&str>) -> CosmosResult<Self> {
        let path = ResourcePath::parse(link)?;
        let partition_key = partition_key_header
            .map(PartitionKey::from_header)
            .transpose()?;
        Ok(Self {
            path,
            partition_key,
        })
    }
}

/// Resolve a (database, container, item, partition key) tuple.
///
/// With an item id the result addresses the item; without one it addresses
/// the container, and a partition key (if given) scopes container-level
/// operations such as queries to one logical partition.
pub fn resolve(
    database: &str,
    container: &str,
    item: Option<&str>,
    partition_key: Option<PartitionKey>,
) -> CosmosResult<ResolvedResource> {
    let path = match item {
        Some(id) => ResourcePath::item(database, container, id)?,
        None => ResourcePath::container(database, container)?,
    };
    Ok(ResolvedResource {
        path,
        partition_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_links() {
        assert_eq!(ResourcePath::database("db").unwrap().to_string(), "dbs/db");
        assert_eq!(
            ResourcePath::container("db", "products").unwrap().to_string(),
            "dbs/db/colls/products"
        );
        assert_eq!(
            ResourcePath::item("db", "products", "item1").unwrap().to_string(),
            "dbs/db/colls/products/docs/item1"
        );
        assert_eq!(
            ResourcePath::partition_key_ranges("db", "c").unwrap().to_string(),
            "dbs/db/colls/c/pkranges"
        );
    }

    #[test]
    fn test_parse_accepts_leading_slash() {
        let path = ResourcePath::parse("/dbs/testDatabase").unwrap();
        assert_eq!(path, ResourcePath::database("testDatabase").unwrap());
    }

    #[test]
    fn test_parse_rejects_unknown_shapes() {
        assert!(ResourcePath::parse("").is_err());
        assert!(ResourcePath::parse("dbs/a/users/b").is_err());
        assert!(ResourcePath::parse("dbs/a/colls/b/docs/c/d").is_err());
    }

    #[test]
    fn test_invalid_identifiers() {
        for bad in ["", "a/b", "a\\b", "what?", "#tag", "trailing "] {
            let err = ResourcePath::database(bad).unwrap_err();
            assert!(matches!(err, CosmosError::InvalidIdentifier(_)), "{:?}", bad);
        }
        let long = "x".repeat(MAX_ID_LENGTH + 1);
        assert!(ResourcePath::item("db", "c", &long).is_err());
        assert!(ResourcePath::item("db", "c", &"x".repeat(MAX_ID_LENGTH)).is_ok());
    }

    #[test]
    fn test_feed_and_child() {
        let item = ResourcePath::item("db", "c", "i").unwrap();
        let feed = item.feed();
        assert_eq!(feed.to_string(), "dbs/db/colls/c/docs");
        assert!(feed.is_feed());
        assert_eq!(feed.child("i").unwrap(), item);
        assert_eq!(
            item.container_path().unwrap(),
            ResourcePath::container("db", "c").unwrap()
        );
        assert!(ResourcePath::Databases.container_path().is_none());
    }

    #[test]
    fn test_resolve_round_trip() {
        let resolved = resolve(
            "db",
            "c",
            Some("item 1"),
            Some(PartitionKey::from("tenant-a")),
        )
        .unwrap();
        let header = resolved.partition_key_header();
        let back = ResolvedResource::from_wire(&resolved.link(), header.as_deref()).unwrap();
        assert_eq!(back, resolved);
    }

    #[test]
    fn test_resolve_without_item_addresses_container() {
        let resolved = resolve("db", "c", None, None).unwrap();
        assert_eq!(resolved.link(), "dbs/db/colls/c");
        assert!(resolved.partition_key_header().is_none());
    }
}
