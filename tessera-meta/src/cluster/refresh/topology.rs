use std::sync::Arc;
use tracing::*;

use tessera_protocol::events::TopologyEventKind;

use crate::cluster::rows::NodeRow;
use crate::cluster::topology::{Node, NodeState};
use crate::cluster::ClusterMetadata;
use crate::error::RefreshError;
use crate::events::RefreshEvent;

/// Applies a single-node topology change.
///
/// Adding or removing a node rebuilds the ring and every keyspace's replica
/// placement; status changes only swap the node object. Events that do not
/// change anything observable produce no outbound events.
pub(super) fn compute(
    kind: TopologyEventKind,
    row: &NodeRow,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    match kind {
        TopologyEventKind::NodeAdded => add_node(row, old),
        TopologyEventKind::NodeRemoved => remove_node(row, old),
        TopologyEventKind::NodeUp => set_node_state(row, old, NodeState::Up),
        TopologyEventKind::NodeDown => set_node_state(row, old, NodeState::Down),
    }
}

fn add_node(
    row: &NodeRow,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    let partitioner = old.token_map().partitioner();

    match old.find_node_by_host_id(&row.host_id) {
        Some(existing) => {
            // already known, e.g. a re-announce after an address change; the
            // node info is replaced in place without an outbound event
            debug!(host_id = %row.host_id, "Node already known - replacing its info.");
            let node = Node::from_row(row, partitioner, existing.state())?;
            Ok((old.clone_with_node(Arc::new(node))?, vec![]))
        }
        None => {
            let node = Node::from_row(row, partitioner, NodeState::Up)?;
            Ok((
                old.clone_with_node(Arc::new(node))?,
                vec![RefreshEvent::NodeAdded(row.host_id)],
            ))
        }
    }
}

fn remove_node(
    row: &NodeRow,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    if old.find_node_by_host_id(&row.host_id).is_none() {
        warn!(host_id = %row.host_id, "Removal of an unknown node - ignoring.");
        return Ok((old.clone(), vec![]));
    }

    Ok((
        old.clone_without_node(row.host_id)?,
        vec![RefreshEvent::NodeRemoved(row.host_id)],
    ))
}

fn set_node_state(
    row: &NodeRow,
    old: &ClusterMetadata,
    state: NodeState,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    let node = match old.find_node_by_host_id(&row.host_id) {
        Some(node) => node,
        None => {
            warn!(host_id = %row.host_id, "Status change for an unknown node - ignoring.");
            return Ok((old.clone(), vec![]));
        }
    };

    if node.state() == state {
        return Ok((old.clone(), vec![]));
    }

    let event = match state {
        NodeState::Up => RefreshEvent::NodeUp(row.host_id),
        _ => RefreshEvent::NodeDown(row.host_id),
    };

    Ok((old.clone_with_node_state(row.host_id, state), vec![event]))
}
