use fxhash::{FxHashMap, FxHashSet};
use itertools::Itertools;
use std::sync::Arc;
use tracing::*;

use crate::cluster::rows::{NodeRow, SchemaRows};
use crate::cluster::schema::KeyspaceMetadata;
use crate::cluster::topology::{Node, NodeMap, NodeState};
use crate::cluster::ClusterMetadata;
use crate::error::RefreshError;
use crate::events::RefreshEvent;

/// Rebuilds the whole snapshot from a complete node and schema dump.
///
/// Node states survive the resync - a dump says nothing about liveness, so
/// known nodes keep their state and new nodes start out unknown. Events are
/// the diff against the old snapshot; a resync carrying identical content
/// emits nothing.
pub(super) fn compute(
    node_rows: &[NodeRow],
    schema: &SchemaRows,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    let partitioner = old.token_map().partitioner();

    let mut nodes = NodeMap::default();
    for row in node_rows {
        if nodes.contains_key(&row.host_id) {
            warn!(host_id = %row.host_id, "Duplicate node entries - keeping only the first one.");
            continue;
        }

        let state = old
            .find_node_by_host_id(&row.host_id)
            .map(|node| node.state())
            .unwrap_or(NodeState::Unknown);

        nodes.insert(
            row.host_id,
            Arc::new(Node::from_row(row, partitioner, state)?),
        );
    }

    let mut keyspaces = FxHashMap::default();
    for row in &schema.keyspaces {
        if keyspaces.contains_key(&row.name) {
            warn!(keyspace = %row.name, "Duplicate keyspace rows - keeping only the first one.");
            continue;
        }

        keyspaces.insert(
            row.name.clone(),
            Arc::new(KeyspaceMetadata::from_rows(row, schema)?),
        );
    }

    let new = ClusterMetadata::new(partitioner, nodes, keyspaces, old.version())?;
    let events = diff_events(old, &new);

    Ok((new, events))
}

// additions first, removals last, so a listener following the batch never
// references an object the snapshot no longer has
fn diff_events(old: &ClusterMetadata, new: &ClusterMetadata) -> Vec<RefreshEvent> {
    let old_hosts: FxHashSet<_> = old.nodes().keys().copied().collect();
    let new_hosts: FxHashSet<_> = new.nodes().keys().copied().collect();

    let mut events = Vec::new();

    for host_id in new_hosts.difference(&old_hosts).sorted_unstable() {
        events.push(RefreshEvent::NodeAdded(*host_id));
    }

    for name in new.keyspaces().keys().sorted_unstable() {
        match old.keyspace(name) {
            None => events.push(RefreshEvent::KeyspaceCreated(name.clone())),
            Some(existing) if **existing != *new.keyspaces()[name] => {
                events.push(RefreshEvent::KeyspaceUpdated(name.clone()));
            }
            Some(_) => {}
        }
    }

    for name in old.keyspaces().keys().sorted_unstable() {
        if new.keyspace(name).is_none() {
            events.push(RefreshEvent::KeyspaceDropped(name.clone()));
        }
    }

    for host_id in old_hosts.difference(&new_hosts).sorted_unstable() {
        events.push(RefreshEvent::NodeRemoved(*host_id));
    }

    events
}
