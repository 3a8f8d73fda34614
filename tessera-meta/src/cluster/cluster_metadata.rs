use fxhash::FxHashMap;
use itertools::Itertools;
use std::net::SocketAddr;
use std::sync::Arc;
use uuid::Uuid;

use tessera_protocol::token::Partitioner;

use crate::cluster::schema::KeyspaceMetadata;
use crate::cluster::topology::{DatacenterMetadata, Node, NodeMap, NodeState};
use crate::cluster::TokenMap;
use crate::error::TopologyInconsistencyError;

fn build_datacenter_info(nodes: &NodeMap) -> FxHashMap<String, DatacenterMetadata> {
    let grouped_by_dc = nodes
        .values()
        .sorted_unstable_by_key(|node| node.datacenter())
        .chunk_by(|node| node.datacenter());

    (&grouped_by_dc)
        .into_iter()
        .map(|(dc, nodes)| {
            (
                dc.into(),
                DatacenterMetadata::new(nodes.unique_by(|node| node.rack()).count()),
            )
        })
        .collect()
}

/// Immutable snapshot of the cluster this driver instance is connected to:
/// node set, schema and per-keyspace token map.
///
/// Exactly one snapshot is current at any instant and replacement is atomic, so
/// readers never observe a half-updated view. A refresh always builds a new
/// snapshot, structurally sharing unchanged nodes and keyspaces with the old
/// one.
#[derive(Debug, Clone, Default)]
pub struct ClusterMetadata {
    nodes: NodeMap,
    keyspaces: FxHashMap<String, Arc<KeyspaceMetadata>>,
    datacenters: FxHashMap<String, DatacenterMetadata>,
    token_map: TokenMap,
    version: u64,
}

impl ClusterMetadata {
    /// The empty snapshot published at startup, before the first resync.
    pub fn empty(partitioner: Partitioner) -> Self {
        ClusterMetadata {
            token_map: TokenMap::empty(partitioner),
            ..Default::default()
        }
    }

    pub(crate) fn new(
        partitioner: Partitioner,
        nodes: NodeMap,
        keyspaces: FxHashMap<String, Arc<KeyspaceMetadata>>,
        version: u64,
    ) -> Result<Self, TopologyInconsistencyError> {
        let token_map = TokenMap::new(partitioner, &nodes, &keyspaces)?;
        let datacenters = build_datacenter_info(&nodes);

        Ok(ClusterMetadata {
            nodes,
            keyspaces,
            datacenters,
            token_map,
            version,
        })
    }

    /// Monotonically increasing version, bumped on every published refresh.
    #[inline]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub(crate) fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Returns current token map.
    #[inline]
    pub fn token_map(&self) -> &TokenMap {
        &self.token_map
    }

    /// Returns all known nodes.
    #[inline]
    pub fn nodes(&self) -> &NodeMap {
        &self.nodes
    }

    /// Checks if any nodes are known.
    #[inline]
    pub fn has_nodes(&self) -> bool {
        !self.nodes.is_empty()
    }

    /// Returns known keyspaces.
    #[inline]
    pub fn keyspaces(&self) -> &FxHashMap<String, Arc<KeyspaceMetadata>> {
        &self.keyspaces
    }

    /// Returns known keyspace, if present.
    #[inline]
    pub fn keyspace(&self, keyspace: &str) -> Option<&Arc<KeyspaceMetadata>> {
        self.keyspaces.get(keyspace)
    }

    /// Returns known datacenters.
    #[inline]
    pub fn datacenters(&self) -> &FxHashMap<String, DatacenterMetadata> {
        &self.datacenters
    }

    /// Returns known datacenter, if present.
    #[inline]
    pub fn datacenter(&self, name: &str) -> Option<&DatacenterMetadata> {
        self.datacenters.get(name)
    }

    /// Finds a node by its host id.
    #[inline]
    pub fn find_node_by_host_id(&self, host_id: &Uuid) -> Option<Arc<Node>> {
        self.nodes.get(host_id).cloned()
    }

    /// Finds a node by its broadcast rpc address.
    #[inline]
    pub fn find_node_by_rpc_address(&self, broadcast_rpc_address: SocketAddr) -> Option<Arc<Node>> {
        self.nodes
            .values()
            .find(|node| node.broadcast_rpc_address() == broadcast_rpc_address)
            .cloned()
    }

    /// Ordered replica nodes for a partition key in a keyspace. Empty when the
    /// keyspace or the ring is unknown.
    pub fn replicas_for(&self, keyspace: &str, partition_key: &[u8]) -> Vec<Arc<Node>> {
        let token = self.token_map.hash(partition_key);
        self.token_map
            .replicas_for_token(keyspace, token)
            .map(|hosts| {
                hosts
                    .iter()
                    .filter_map(|host_id| self.nodes.get(host_id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Creates a new metadata with a keyspace replaced/added. The keyspace's
    /// replica placement is recomputed only when requested - replication
    /// changes require it, while table-level changes do not.
    #[must_use]
    pub(crate) fn clone_with_keyspace(
        &self,
        keyspace: Arc<KeyspaceMetadata>,
        recompute_replicas: bool,
    ) -> Self {
        let token_map = if recompute_replicas {
            self.token_map.clone_with_keyspace(&keyspace, &self.nodes)
        } else {
            self.token_map.clone()
        };

        let mut keyspaces = self.keyspaces.clone();
        keyspaces.insert(keyspace.name().into(), keyspace);

        ClusterMetadata {
            nodes: self.nodes.clone(),
            keyspaces,
            datacenters: self.datacenters.clone(),
            token_map,
            version: self.version,
        }
    }

    /// Creates a new metadata with a keyspace removed.
    #[must_use]
    pub(crate) fn clone_without_keyspace(&self, keyspace: &str) -> Self {
        let mut keyspaces = self.keyspaces.clone();
        keyspaces.remove(keyspace);

        ClusterMetadata {
            nodes: self.nodes.clone(),
            keyspaces,
            datacenters: self.datacenters.clone(),
            token_map: self.token_map.clone_without_keyspace(keyspace),
            version: self.version,
        }
    }

    /// Creates a new metadata with a node replaced/added. The ring and every
    /// keyspace's replica placement are rebuilt.
    pub(crate) fn clone_with_node(
        &self,
        node: Arc<Node>,
    ) -> Result<Self, TopologyInconsistencyError> {
        let mut nodes = self.nodes.clone();
        nodes.insert(node.host_id(), node);

        ClusterMetadata::new(
            self.token_map.partitioner(),
            nodes,
            self.keyspaces.clone(),
            self.version,
        )
    }

    /// Creates a new metadata with a node removed.
    pub(crate) fn clone_without_node(
        &self,
        host_id: Uuid,
    ) -> Result<Self, TopologyInconsistencyError> {
        let mut nodes = self.nodes.clone();
        nodes.remove(&host_id);

        ClusterMetadata::new(
            self.token_map.partitioner(),
            nodes,
            self.keyspaces.clone(),
            self.version,
        )
    }

    /// Creates a new metadata with a node's state flipped. Status-only changes
    /// never touch the ring or replica placement.
    #[must_use]
    pub(crate) fn clone_with_node_state(&self, host_id: Uuid, state: NodeState) -> Self {
        let mut nodes = self.nodes.clone();
        if let Some(node) = self.nodes.get(&host_id) {
            nodes.insert(host_id, Arc::new(node.clone_with_state(state)));
        }

        ClusterMetadata {
            nodes,
            keyspaces: self.keyspaces.clone(),
            datacenters: self.datacenters.clone(),
            token_map: self.token_map.clone(),
            version: self.version,
        }
    }
}

//noinspection DuplicatedCode
#[cfg(test)]
mod tests {
    use fxhash::FxHashMap;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};
    use std::sync::Arc;
    use uuid::Uuid;

    use tessera_protocol::token::{Partitioner, Token};

    use crate::cluster::cluster_metadata::build_datacenter_info;
    use crate::cluster::rows::{KeyspaceRow, SchemaRows};
    use crate::cluster::schema::KeyspaceMetadata;
    use crate::cluster::topology::{Node, NodeMap, NodeState};
    use crate::cluster::ClusterMetadata;

    fn node(datacenter: &str, rack: &str, tokens: Vec<i64>) -> (Uuid, Arc<Node>) {
        let host_id = Uuid::new_v4();
        (
            host_id,
            Arc::new(Node::new(
                host_id,
                SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 2)), 9042),
                None,
                None,
                NodeState::Up,
                tokens.into_iter().map(Token::Murmur3).collect(),
                rack.into(),
                datacenter.into(),
            )),
        )
    }

    fn simple_keyspace(name: &str, replication_factor: usize) -> Arc<KeyspaceMetadata> {
        let mut replication = FxHashMap::default();
        replication.insert("class".into(), "SimpleStrategy".into());
        replication.insert("replication_factor".into(), replication_factor.to_string());

        Arc::new(
            KeyspaceMetadata::from_rows(
                &KeyspaceRow::new(name.into(), replication),
                &SchemaRows::default(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn should_build_datacenter_info() {
        let mut nodes = NodeMap::default();
        for (datacenter, rack) in [("dc1", "r1"), ("dc1", "r1"), ("dc1", "r2"), ("dc2", "r1")] {
            let (host_id, node) = node(datacenter, rack, vec![]);
            nodes.insert(host_id, node);
        }

        let dc_info = build_datacenter_info(&nodes);
        assert_eq!(dc_info.get("dc1").unwrap().rack_count, 2);
        assert_eq!(dc_info.get("dc2").unwrap().rack_count, 1);
    }

    #[test]
    fn should_return_the_single_node_for_every_key() {
        let (host_id, only_node) = node("dc1", "r1", vec![0]);
        let mut nodes = NodeMap::default();
        nodes.insert(host_id, only_node);

        let mut keyspaces = FxHashMap::default();
        keyspaces.insert("ks".to_string(), simple_keyspace("ks", 1));

        let metadata =
            ClusterMetadata::new(Partitioner::Murmur3, nodes, keyspaces, 1).unwrap();

        for key in [&b"alpha"[..], b"beta", b"gamma", b""] {
            let replicas = metadata.replicas_for("ks", key);
            assert_eq!(replicas.len(), 1);
            assert_eq!(replicas[0].host_id(), host_id);
        }
    }

    #[test]
    fn should_return_both_nodes_after_scaling_out() {
        let (first_id, first) = node("dc1", "r1", vec![0]);
        let mut nodes = NodeMap::default();
        nodes.insert(first_id, first);

        let mut keyspaces = FxHashMap::default();
        keyspaces.insert("ks".to_string(), simple_keyspace("ks", 2));

        let metadata =
            ClusterMetadata::new(Partitioner::Murmur3, nodes, keyspaces, 1).unwrap();
        assert_eq!(metadata.replicas_for("ks", b"alpha").len(), 1);

        let (second_id, second) = node("dc1", "r2", vec![100]);
        let metadata = metadata.clone_with_node(second).unwrap();

        for key in [&b"alpha"[..], b"beta", b"gamma"] {
            let replicas = metadata.replicas_for("ks", key);
            assert_eq!(replicas.len(), 2);

            let mut host_ids: Vec<_> =
                replicas.iter().map(|replica| replica.host_id()).collect();
            host_ids.sort_unstable();
            let mut expected = vec![first_id, second_id];
            expected.sort_unstable();
            assert_eq!(host_ids, expected);
        }
    }

    #[test]
    fn should_share_unchanged_parts_between_snapshots() {
        let (host_id, only_node) = node("dc1", "r1", vec![0]);
        let mut nodes = NodeMap::default();
        nodes.insert(host_id, only_node);

        let mut keyspaces = FxHashMap::default();
        keyspaces.insert("ks".to_string(), simple_keyspace("ks", 1));

        let metadata =
            ClusterMetadata::new(Partitioner::Murmur3, nodes, keyspaces, 1).unwrap();
        let updated = metadata.clone_with_keyspace(simple_keyspace("other", 1), true);

        assert!(Arc::ptr_eq(
            metadata.keyspace("ks").unwrap(),
            updated.keyspace("ks").unwrap()
        ));
        assert!(Arc::ptr_eq(
            metadata.find_node_by_host_id(&host_id).as_ref().unwrap(),
            updated.find_node_by_host_id(&host_id).as_ref().unwrap()
        ));
    }

    #[test]
    fn should_flip_node_state_without_ring_recomputation() {
        let (host_id, only_node) = node("dc1", "r1", vec![0]);
        let mut nodes = NodeMap::default();
        nodes.insert(host_id, only_node);

        let metadata =
            ClusterMetadata::new(Partitioner::Murmur3, nodes, FxHashMap::default(), 1).unwrap();

        let down = metadata.clone_with_node_state(host_id, NodeState::Down);
        assert_eq!(
            down.find_node_by_host_id(&host_id).unwrap().state(),
            NodeState::Down
        );
        assert_eq!(down.token_map().token_ranges(), metadata.token_map().token_ranges());
    }
}
