use std::net::SocketAddr;
use uuid::Uuid;

use tessera_protocol::token::{Partitioner, Token};

use crate::cluster::rows::NodeRow;
use crate::cluster::topology::NodeState;
use crate::error::TopologyInconsistencyError;

/// Metadata about one node of the cluster, as seen in a single snapshot.
///
/// Nodes are immutable - a refresh never mutates a node in place, it replaces
/// the whole object in a new snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    host_id: Uuid,
    broadcast_rpc_address: SocketAddr,
    broadcast_address: Option<SocketAddr>,
    listen_address: Option<SocketAddr>,
    state: NodeState,
    tokens: Vec<Token>,
    rack: String,
    datacenter: String,
}

impl Node {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        host_id: Uuid,
        broadcast_rpc_address: SocketAddr,
        broadcast_address: Option<SocketAddr>,
        listen_address: Option<SocketAddr>,
        state: NodeState,
        tokens: Vec<Token>,
        rack: String,
        datacenter: String,
    ) -> Self {
        Node {
            host_id,
            broadcast_rpc_address,
            broadcast_address,
            listen_address,
            state,
            tokens,
            rack,
            datacenter,
        }
    }

    /// Builds a node from a decoded system row, parsing its tokens against the
    /// ring's partitioner.
    pub(crate) fn from_row(
        row: &NodeRow,
        partitioner: Partitioner,
        state: NodeState,
    ) -> Result<Self, TopologyInconsistencyError> {
        let tokens = row
            .tokens
            .iter()
            .map(|token| {
                partitioner.parse_token(token).map_err(|source| {
                    TopologyInconsistencyError::InvalidToken {
                        host_id: row.host_id,
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Node {
            host_id: row.host_id,
            broadcast_rpc_address: row.broadcast_rpc_address,
            broadcast_address: row.broadcast_address,
            listen_address: row.listen_address,
            state,
            tokens,
            rack: row.rack.clone(),
            datacenter: row.datacenter.clone(),
        })
    }

    /// The host id assigned to this node by the cluster. Identifies a node even
    /// when its addresses change.
    #[inline]
    pub fn host_id(&self) -> Uuid {
        self.host_id
    }

    /// The address the node expects clients to connect to.
    #[inline]
    pub fn broadcast_rpc_address(&self) -> SocketAddr {
        self.broadcast_rpc_address
    }

    /// The address other nodes use to communicate with this node.
    #[inline]
    pub fn broadcast_address(&self) -> Option<SocketAddr> {
        self.broadcast_address
    }

    /// The address the node listens on internally.
    #[inline]
    pub fn listen_address(&self) -> Option<SocketAddr> {
        self.listen_address
    }

    #[inline]
    pub fn state(&self) -> NodeState {
        self.state
    }

    #[inline]
    pub fn is_up(&self) -> bool {
        self.state == NodeState::Up
    }

    /// Tokens this node owns on the ring.
    #[inline]
    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// The rack the node is in.
    #[inline]
    pub fn rack(&self) -> &str {
        &self.rack
    }

    /// The datacenter the node is in.
    #[inline]
    pub fn datacenter(&self) -> &str {
        &self.datacenter
    }

    /// Creates a copy of this node with a different state. Used by status-only
    /// refreshes, which never touch the token ring.
    #[must_use]
    pub(crate) fn clone_with_state(&self, state: NodeState) -> Self {
        Node {
            state,
            tokens: self.tokens.clone(),
            rack: self.rack.clone(),
            datacenter: self.datacenter.clone(),
            ..*self
        }
    }
}
