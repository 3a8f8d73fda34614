use derive_more::Constructor;
use uuid::Uuid;

/// A change notification emitted after a new snapshot has been published.
///
/// Events carry identity only - listeners interested in the object itself fetch
/// it from the current snapshot, which is guaranteed to be at least as new as
/// the one the event was derived from. Within one batch, events are ordered
/// dependency-safe: creations precede anything that could reference them and
/// drops run child-before-parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefreshEvent {
    NodeAdded(Uuid),
    NodeRemoved(Uuid),
    NodeUp(Uuid),
    NodeDown(Uuid),
    KeyspaceCreated(String),
    KeyspaceUpdated(String),
    KeyspaceDropped(String),
    TableCreated { keyspace: String, name: String },
    TableUpdated { keyspace: String, name: String },
    TableDropped { keyspace: String, name: String },
    ViewCreated { keyspace: String, name: String },
    ViewUpdated { keyspace: String, name: String },
    ViewDropped { keyspace: String, name: String },
    UserTypeCreated { keyspace: String, name: String },
    UserTypeUpdated { keyspace: String, name: String },
    UserTypeDropped { keyspace: String, name: String },
}

/// Ordered events produced by one refresh, tagged with the version of the
/// snapshot they resulted from.
#[derive(Debug, Clone, PartialEq, Eq, Constructor)]
pub struct EventBatch {
    pub version: u64,
    pub events: Vec<RefreshEvent>,
}
