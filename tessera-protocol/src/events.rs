use derive_more::{Constructor, Display};

/// Kind of topology change delivered by the cluster's event channel. Covers both
/// membership changes and pure status flips.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Display)]
pub enum TopologyEventKind {
    NodeAdded,
    NodeRemoved,
    NodeUp,
    NodeDown,
}

/// Kind of schema change delivered by the cluster's event channel.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Display)]
pub enum SchemaChangeKind {
    Created,
    Updated,
    Dropped,
}

/// The schema object a change applies to.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum SchemaChangeTarget {
    Keyspace {
        keyspace: String,
    },
    Table {
        keyspace: String,
        name: String,
    },
    MaterializedView {
        keyspace: String,
        name: String,
    },
    UserType {
        keyspace: String,
        name: String,
    },
}

impl SchemaChangeTarget {
    /// Name of the keyspace the change applies to.
    pub fn keyspace(&self) -> &str {
        match self {
            SchemaChangeTarget::Keyspace { keyspace }
            | SchemaChangeTarget::Table { keyspace, .. }
            | SchemaChangeTarget::MaterializedView { keyspace, .. }
            | SchemaChangeTarget::UserType { keyspace, .. } => keyspace,
        }
    }
}

/// A schema change notification, as decoded by the transport layer.
#[derive(Debug, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Constructor)]
pub struct SchemaChange {
    pub kind: SchemaChangeKind,
    pub target: SchemaChangeTarget,
}
