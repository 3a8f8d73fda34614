use derive_more::Constructor;
use fxhash::FxHashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use tessera_protocol::token::{Partitioner, Token};

use crate::cluster::schema::{KeyspaceMetadata, ReplicationStrategy};
use crate::cluster::topology::NodeMap;
use crate::error::TopologyInconsistencyError;

/// A half-open `(start, end]` interval on the token ring. For any ring, the
/// ranges derived from the node set partition the ring exactly: no gaps, no
/// overlaps. A single-token ring yields one range wrapping the whole ring.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Constructor)]
pub struct TokenRange {
    pub start: Token,
    pub end: Token,
}

type ReplicaMap = BTreeMap<Token, Vec<Uuid>>;

/// Map of tokens to nodes, with replica placement precomputed per keyspace.
///
/// Replicas for the range ending at a token are the nodes collected by walking
/// the ring clockwise from that token, so a partition key lookup is a hash
/// plus one ordered-map lookup.
#[derive(Debug, Clone, Default)]
pub struct TokenMap {
    partitioner: Partitioner,
    token_ring: BTreeMap<Token, Uuid>,
    keyspace_replicas: FxHashMap<String, Arc<ReplicaMap>>,
}

impl TokenMap {
    /// An empty ring for the startup snapshot.
    pub(crate) fn empty(partitioner: Partitioner) -> Self {
        TokenMap {
            partitioner,
            token_ring: BTreeMap::new(),
            keyspace_replicas: FxHashMap::default(),
        }
    }

    /// Builds the ring from a node set and computes replica placement for every
    /// keyspace. A token claimed by two distinct nodes is a topology
    /// inconsistency and fails the whole build.
    pub(crate) fn new(
        partitioner: Partitioner,
        nodes: &NodeMap,
        keyspaces: &FxHashMap<String, Arc<KeyspaceMetadata>>,
    ) -> Result<Self, TopologyInconsistencyError> {
        let mut token_ring = BTreeMap::new();
        for (host_id, node) in nodes {
            for token in node.tokens() {
                if let Some(previous) = token_ring.insert(*token, *host_id) {
                    if previous != *host_id {
                        return Err(TopologyInconsistencyError::DuplicateToken {
                            token: token.to_string(),
                            first: previous,
                            second: *host_id,
                        });
                    }
                }
            }
        }

        let mut map = TokenMap {
            partitioner,
            token_ring,
            keyspace_replicas: FxHashMap::default(),
        };

        for (name, keyspace) in keyspaces {
            let replicas = map.compute_replicas(keyspace.replication_strategy(), nodes);
            map.keyspace_replicas.insert(name.clone(), Arc::new(replicas));
        }

        Ok(map)
    }

    /// The partitioner this ring uses.
    #[inline]
    pub fn partitioner(&self) -> Partitioner {
        self.partitioner
    }

    /// Hashes partition key bytes onto this ring.
    #[inline]
    pub fn hash(&self, partition_key: &[u8]) -> Token {
        self.partitioner.hash(partition_key)
    }

    /// Checks if any tokens are known.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.token_ring.is_empty()
    }

    /// The token ranges derived from the node set, in ring order.
    pub fn token_ranges(&self) -> Vec<TokenRange> {
        let last = match self.token_ring.keys().next_back() {
            Some(last) => *last,
            None => return Vec::new(),
        };

        let mut start = last;
        self.token_ring
            .keys()
            .map(|end| {
                let range = TokenRange::new(start, *end);
                start = *end;
                range
            })
            .collect()
    }

    /// Ordered replicas for the range a token falls into, for a given keyspace.
    /// Returns `None` when the keyspace or the ring is unknown.
    pub fn replicas_for_token(&self, keyspace: &str, token: Token) -> Option<&[Uuid]> {
        let replicas = self.keyspace_replicas.get(keyspace)?;
        replicas
            .range(token..)
            .next()
            .or_else(|| replicas.iter().next())
            .map(|(_, hosts)| hosts.as_slice())
    }

    /// Creates a copy with one keyspace's replica placement (re)computed.
    #[must_use]
    pub(crate) fn clone_with_keyspace(&self, keyspace: &KeyspaceMetadata, nodes: &NodeMap) -> Self {
        let mut map = self.clone();
        let replicas = map.compute_replicas(keyspace.replication_strategy(), nodes);
        map.keyspace_replicas
            .insert(keyspace.name().into(), Arc::new(replicas));

        map
    }

    /// Creates a copy with a keyspace's replica placement removed.
    #[must_use]
    pub(crate) fn clone_without_keyspace(&self, keyspace: &str) -> Self {
        let mut map = self.clone();
        map.keyspace_replicas.remove(keyspace);

        map
    }

    /// Computes the replica map for one strategy over the current ring.
    /// The ring walk starts at each range's end token and proceeds clockwise,
    /// wrapping around; if fewer nodes are available than the requested factor,
    /// all available nodes are returned rather than failing.
    fn compute_replicas(&self, strategy: &ReplicationStrategy, nodes: &NodeMap) -> ReplicaMap {
        self.token_ring
            .keys()
            .map(|end| (*end, self.walk_ring(*end, strategy, nodes)))
            .collect()
    }

    fn walk_ring(&self, end: Token, strategy: &ReplicationStrategy, nodes: &NodeMap) -> Vec<Uuid> {
        // every ring token exactly once, starting at the range end
        let walk = self
            .token_ring
            .range(end..)
            .chain(self.token_ring.range(..end))
            .map(|(_, host_id)| host_id);

        match strategy {
            ReplicationStrategy::Simple { replication_factor } => {
                collect_distinct(walk, *replication_factor)
            }
            ReplicationStrategy::NetworkTopology {
                datacenter_replication_factor,
            } => {
                let mut remaining: FxHashMap<&str, usize> = datacenter_replication_factor
                    .iter()
                    .map(|(datacenter, factor)| (datacenter.as_str(), *factor))
                    .collect();
                let desired = datacenter_replication_factor.values().sum();

                let mut replicas: Vec<Uuid> = Vec::with_capacity(desired);
                for host_id in walk {
                    let datacenter = match nodes.get(host_id) {
                        Some(node) => node.datacenter(),
                        None => continue,
                    };

                    if let Some(left) = remaining.get_mut(datacenter) {
                        if *left > 0 && !replicas.contains(host_id) {
                            *left -= 1;
                            replicas.push(*host_id);

                            if replicas.len() == desired {
                                break;
                            }
                        }
                    }
                }

                replicas
            }
            // uninterpreted strategies fall back to the primary replica only
            ReplicationStrategy::Other => collect_distinct(walk, 1),
        }
    }
}

fn collect_distinct<'a>(walk: impl Iterator<Item = &'a Uuid>, count: usize) -> Vec<Uuid> {
    // a factor of zero means no replicas, e.g. a keyspace being drained
    if count == 0 {
        return Vec::new();
    }

    let mut replicas = Vec::with_capacity(count);
    for host_id in walk {
        if !replicas.contains(host_id) {
            replicas.push(*host_id);

            if replicas.len() == count {
                break;
            }
        }
    }

    replicas
}
