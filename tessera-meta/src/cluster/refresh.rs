use tessera_protocol::events::{SchemaChange, TopologyEventKind};

use crate::cluster::rows::{NodeRow, SchemaRows};
use crate::cluster::ClusterMetadata;
use crate::error::RefreshError;
use crate::events::RefreshEvent;

mod full_resync;
mod schema;
mod topology;

/// One metadata refresh: a pure function from the current snapshot to a new
/// snapshot plus the ordered events describing the change.
///
/// Refreshes are computed without side effects - the new snapshot must be
/// published before any event becomes visible, so events are returned rather
/// than dispatched from here. A refresh failure leaves the old snapshot as the
/// published one and produces no events.
///
/// `compute` is only ever called from the metadata manager's sequencer task,
/// one refresh at a time, and does not need to be thread-safe.
#[derive(Debug, Clone, PartialEq)]
pub enum MetadataRefresh {
    /// Complete node and schema dump. Events are diffed against the old
    /// snapshot - a resync with identical content emits nothing.
    FullResync {
        nodes: Vec<NodeRow>,
        schema: SchemaRows,
    },
    /// A single node joined, left, or changed status.
    Topology {
        kind: TopologyEventKind,
        node: NodeRow,
    },
    /// A schema object was created, updated, or dropped. `rows` carries the
    /// re-fetched rows for the affected keyspace; drops ignore it.
    Schema {
        change: SchemaChange,
        rows: SchemaRows,
    },
}

impl MetadataRefresh {
    /// Computes the new snapshot and its events. All-or-nothing: any error
    /// leaves no partial result behind.
    pub fn compute(
        &self,
        old: &ClusterMetadata,
    ) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
        let (new, events) = match self {
            MetadataRefresh::FullResync { nodes, schema } => {
                full_resync::compute(nodes, schema, old)?
            }
            MetadataRefresh::Topology { kind, node } => topology::compute(*kind, node, old)?,
            MetadataRefresh::Schema { change, rows } => schema::compute(change, rows, old)?,
        };

        Ok((new.with_version(old.version() + 1), events))
    }
}

//noinspection DuplicatedCode
#[cfg(test)]
mod tests {
    use fxhash::FxHashMap;
    use lazy_static::lazy_static;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use uuid::Uuid;

    use tessera_protocol::events::{
        SchemaChange, SchemaChangeKind, SchemaChangeTarget, TopologyEventKind,
    };
    use tessera_protocol::token::Partitioner;

    use crate::cluster::rows::{
        ColumnRow, KeyspaceRow, NodeRow, SchemaRows, TableRow, ViewRow,
    };
    use crate::cluster::schema::{ColumnKind, ColumnType};
    use crate::cluster::topology::NodeState;
    use crate::cluster::{ClusterMetadata, MetadataRefresh};
    use crate::error::{RefreshError, TopologyInconsistencyError};
    use crate::events::RefreshEvent;

    lazy_static! {
        static ref HOST_ID_1: Uuid = Uuid::new_v4();
        static ref HOST_ID_2: Uuid = Uuid::new_v4();
    }

    fn node_row(host_id: Uuid, tokens: &[i64]) -> NodeRow {
        NodeRow::new(
            host_id,
            SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2)), 9042),
            None,
            None,
            "dc1".into(),
            "r1".into(),
            tokens.iter().map(|token| token.to_string()).collect(),
        )
    }

    fn keyspace_row(name: &str, replication_factor: usize) -> KeyspaceRow {
        let mut replication = FxHashMap::default();
        replication.insert("class".into(), "SimpleStrategy".into());
        replication.insert("replication_factor".into(), replication_factor.to_string());
        KeyspaceRow::new(name.into(), replication)
    }

    fn column(name: &str, kind: ColumnKind, position: i32) -> ColumnRow {
        ColumnRow::new(
            name.into(),
            kind,
            position,
            ColumnType::Native("text".into()),
        )
    }

    fn schema_with_view(keyspace: &str) -> SchemaRows {
        SchemaRows {
            keyspaces: vec![keyspace_row(keyspace, 1)],
            tables: vec![TableRow::new(
                keyspace.into(),
                "users".into(),
                vec![
                    column("id", ColumnKind::PartitionKey, 0),
                    column("name", ColumnKind::Regular, -1),
                ],
            )],
            views: vec![ViewRow::new(
                keyspace.into(),
                "users_by_name".into(),
                "users".into(),
                vec![
                    column("name", ColumnKind::PartitionKey, 0),
                    column("id", ColumnKind::Clustering, 0),
                ],
            )],
            ..Default::default()
        }
    }

    fn initial_metadata() -> ClusterMetadata {
        let refresh = MetadataRefresh::FullResync {
            nodes: vec![node_row(*HOST_ID_1, &[0]), node_row(*HOST_ID_2, &[100])],
            schema: schema_with_view("ks"),
        };

        let (metadata, _) = refresh
            .compute(&ClusterMetadata::empty(Partitioner::Murmur3))
            .unwrap();
        metadata
    }

    #[test]
    fn should_emit_diffed_events_on_initial_resync() {
        let refresh = MetadataRefresh::FullResync {
            nodes: vec![node_row(*HOST_ID_1, &[0])],
            schema: schema_with_view("ks"),
        };

        let (metadata, events) = refresh
            .compute(&ClusterMetadata::empty(Partitioner::Murmur3))
            .unwrap();

        assert_eq!(metadata.version(), 1);
        assert_eq!(
            events,
            vec![
                RefreshEvent::NodeAdded(*HOST_ID_1),
                RefreshEvent::KeyspaceCreated("ks".into()),
            ]
        );
        assert!(metadata.keyspace("ks").is_some());
        assert!(metadata.find_node_by_host_id(&HOST_ID_1).is_some());
    }

    #[test]
    fn should_emit_nothing_on_identical_resync() {
        let old = initial_metadata();

        let refresh = MetadataRefresh::FullResync {
            nodes: vec![node_row(*HOST_ID_1, &[0]), node_row(*HOST_ID_2, &[100])],
            schema: schema_with_view("ks"),
        };
        let (new, events) = refresh.compute(&old).unwrap();

        assert!(events.is_empty());
        assert_eq!(new.version(), old.version() + 1);
        assert_eq!(new.nodes(), old.nodes());
        assert_eq!(new.keyspaces(), old.keyspaces());
    }

    #[test]
    fn should_diff_removed_nodes_and_dropped_keyspaces_on_resync() {
        let old = initial_metadata();

        let refresh = MetadataRefresh::FullResync {
            nodes: vec![node_row(*HOST_ID_1, &[0])],
            schema: SchemaRows::default(),
        };
        let (new, events) = refresh.compute(&old).unwrap();

        assert_eq!(
            events,
            vec![
                RefreshEvent::KeyspaceDropped("ks".into()),
                RefreshEvent::NodeRemoved(*HOST_ID_2),
            ]
        );
        assert!(new.keyspace("ks").is_none());
        assert!(new.find_node_by_host_id(&HOST_ID_2).is_none());
    }

    #[test]
    fn should_reject_duplicate_tokens_across_nodes() {
        let refresh = MetadataRefresh::FullResync {
            nodes: vec![node_row(*HOST_ID_1, &[0]), node_row(*HOST_ID_2, &[0])],
            schema: SchemaRows::default(),
        };

        let error = refresh.compute(&ClusterMetadata::empty(Partitioner::Murmur3));
        assert!(matches!(
            error,
            Err(RefreshError::TopologyInconsistency(
                TopologyInconsistencyError::DuplicateToken { .. }
            ))
        ));
    }

    #[test]
    fn should_add_a_node() {
        let old = initial_metadata();
        let new_host = Uuid::new_v4();

        let refresh = MetadataRefresh::Topology {
            kind: TopologyEventKind::NodeAdded,
            node: node_row(new_host, &[50]),
        };
        let (new, events) = refresh.compute(&old).unwrap();

        assert_eq!(events, vec![RefreshEvent::NodeAdded(new_host)]);
        assert_eq!(
            new.find_node_by_host_id(&new_host).unwrap().state(),
            NodeState::Up
        );
    }

    #[test]
    fn should_not_emit_when_re_adding_a_known_node() {
        let old = initial_metadata();

        let refresh = MetadataRefresh::Topology {
            kind: TopologyEventKind::NodeAdded,
            node: node_row(*HOST_ID_1, &[0]),
        };
        let (_, events) = refresh.compute(&old).unwrap();

        assert!(events.is_empty());
    }

    #[test]
    fn should_remove_a_node() {
        let old = initial_metadata();

        let refresh = MetadataRefresh::Topology {
            kind: TopologyEventKind::NodeRemoved,
            node: node_row(*HOST_ID_2, &[100]),
        };
        let (new, events) = refresh.compute(&old).unwrap();

        assert_eq!(events, vec![RefreshEvent::NodeRemoved(*HOST_ID_2)]);
        assert!(new.find_node_by_host_id(&HOST_ID_2).is_none());
        assert_eq!(new.token_map().token_ranges().len(), 1);
    }

    #[test]
    fn should_ignore_removal_of_unknown_node() {
        let old = initial_metadata();

        let refresh = MetadataRefresh::Topology {
            kind: TopologyEventKind::NodeRemoved,
            node: node_row(Uuid::new_v4(), &[]),
        };
        let (new, events) = refresh.compute(&old).unwrap();

        assert!(events.is_empty());
        assert_eq!(new.nodes(), old.nodes());
    }

    #[test]
    fn should_flip_status_without_recomputing_the_ring() {
        let old = initial_metadata();

        let refresh = MetadataRefresh::Topology {
            kind: TopologyEventKind::NodeDown,
            node: node_row(*HOST_ID_1, &[0]),
        };
        let (down, events) = refresh.compute(&old).unwrap();

        assert_eq!(events, vec![RefreshEvent::NodeDown(*HOST_ID_1)]);
        assert_eq!(
            down.find_node_by_host_id(&HOST_ID_1).unwrap().state(),
            NodeState::Down
        );
        assert_eq!(
            down.token_map().token_ranges(),
            old.token_map().token_ranges()
        );
        assert_eq!(
            down.replicas_for("ks", b"alpha")
                .iter()
                .map(|node| node.host_id())
                .collect::<Vec<_>>(),
            old.replicas_for("ks", b"alpha")
                .iter()
                .map(|node| node.host_id())
                .collect::<Vec<_>>()
        );

        let refresh = MetadataRefresh::Topology {
            kind: TopologyEventKind::NodeUp,
            node: node_row(*HOST_ID_1, &[0]),
        };
        let (up, events) = refresh.compute(&down).unwrap();

        assert_eq!(events, vec![RefreshEvent::NodeUp(*HOST_ID_1)]);
        assert_eq!(
            up.find_node_by_host_id(&HOST_ID_1).unwrap().state(),
            NodeState::Up
        );
    }

    #[test]
    fn should_not_emit_for_redundant_status_event() {
        let old = initial_metadata();

        let refresh = MetadataRefresh::Topology {
            kind: TopologyEventKind::NodeUp,
            node: node_row(*HOST_ID_1, &[0]),
        };
        let (up, _) = refresh.compute(&old).unwrap();
        let (_, events) = refresh.compute(&up).unwrap();

        assert!(events.is_empty());
    }

    #[test]
    fn should_cascade_keyspace_drop_child_before_parent() {
        let old = initial_metadata();

        let refresh = MetadataRefresh::Schema {
            change: SchemaChange::new(
                SchemaChangeKind::Dropped,
                SchemaChangeTarget::Keyspace {
                    keyspace: "ks".into(),
                },
            ),
            rows: SchemaRows::default(),
        };
        let (new, events) = refresh.compute(&old).unwrap();

        assert_eq!(
            events,
            vec![
                RefreshEvent::ViewDropped {
                    keyspace: "ks".into(),
                    name: "users_by_name".into()
                },
                RefreshEvent::TableDropped {
                    keyspace: "ks".into(),
                    name: "users".into()
                },
                RefreshEvent::KeyspaceDropped("ks".into()),
            ]
        );
        assert!(new.keyspace("ks").is_none());
    }

    #[test]
    fn should_drop_views_before_their_base_table() {
        let old = initial_metadata();

        let refresh = MetadataRefresh::Schema {
            change: SchemaChange::new(
                SchemaChangeKind::Dropped,
                SchemaChangeTarget::Table {
                    keyspace: "ks".into(),
                    name: "users".into(),
                },
            ),
            rows: SchemaRows::default(),
        };
        let (new, events) = refresh.compute(&old).unwrap();

        assert_eq!(
            events,
            vec![
                RefreshEvent::ViewDropped {
                    keyspace: "ks".into(),
                    name: "users_by_name".into()
                },
                RefreshEvent::TableDropped {
                    keyspace: "ks".into(),
                    name: "users".into()
                },
            ]
        );

        let keyspace = new.keyspace("ks").unwrap();
        assert!(keyspace.table("users").is_none());
        assert!(keyspace.view("users_by_name").is_none());
    }

    #[test]
    fn should_recompute_replicas_only_on_replication_change() {
        let old = initial_metadata();
        assert_eq!(old.replicas_for("ks", b"alpha").len(), 1);

        let refresh = MetadataRefresh::Schema {
            change: SchemaChange::new(
                SchemaChangeKind::Updated,
                SchemaChangeTarget::Keyspace {
                    keyspace: "ks".into(),
                },
            ),
            rows: SchemaRows {
                keyspaces: vec![keyspace_row("ks", 2)],
                ..schema_with_view("ks")
            },
        };
        let (new, events) = refresh.compute(&old).unwrap();

        assert_eq!(events, vec![RefreshEvent::KeyspaceUpdated("ks".into())]);
        assert_eq!(new.replicas_for("ks", b"alpha").len(), 2);
    }

    #[test]
    fn should_create_a_table_in_an_existing_keyspace() {
        let old = initial_metadata();

        let refresh = MetadataRefresh::Schema {
            change: SchemaChange::new(
                SchemaChangeKind::Created,
                SchemaChangeTarget::Table {
                    keyspace: "ks".into(),
                    name: "events".into(),
                },
            ),
            rows: SchemaRows {
                tables: vec![TableRow::new(
                    "ks".into(),
                    "events".into(),
                    vec![column("id", ColumnKind::PartitionKey, 0)],
                )],
                ..Default::default()
            },
        };
        let (new, events) = refresh.compute(&old).unwrap();

        assert_eq!(
            events,
            vec![RefreshEvent::TableCreated {
                keyspace: "ks".into(),
                name: "events".into()
            }]
        );
        assert!(new.keyspace("ks").unwrap().table("events").is_some());
    }

    #[test]
    fn should_fail_refresh_on_invalid_view_without_snapshot_change() {
        let old = initial_metadata();

        let mut rows = SchemaRows::default();
        rows.views.push(ViewRow::new(
            "ks".into(),
            "users_by_name_only".into(),
            "users".into(),
            // omits the base partition key column "id"
            vec![column("name", ColumnKind::PartitionKey, 0)],
        ));

        let refresh = MetadataRefresh::Schema {
            change: SchemaChange::new(
                SchemaChangeKind::Created,
                SchemaChangeTarget::MaterializedView {
                    keyspace: "ks".into(),
                    name: "users_by_name_only".into(),
                },
            ),
            rows,
        };

        let error = refresh.compute(&old);
        assert!(matches!(
            error,
            Err(RefreshError::InvalidViewDefinition(_))
        ));
        // the old snapshot is untouched by the failed attempt
        assert!(old.keyspace("ks").unwrap().view("users_by_name_only").is_none());
    }

    #[test]
    fn should_reject_schema_event_for_unknown_keyspace() {
        let old = initial_metadata();

        let refresh = MetadataRefresh::Schema {
            change: SchemaChange::new(
                SchemaChangeKind::Created,
                SchemaChangeTarget::Table {
                    keyspace: "missing".into(),
                    name: "users".into(),
                },
            ),
            rows: SchemaRows::default(),
        };

        let error = refresh.compute(&old);
        assert!(matches!(error, Err(RefreshError::SchemaParse(_))));
    }
}
