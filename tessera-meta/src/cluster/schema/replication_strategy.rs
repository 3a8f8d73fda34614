use fxhash::FxHashMap;

use crate::error::SchemaParseError;

const CLASS: &str = "class";
const REPLICATION_FACTOR: &str = "replication_factor";
const SIMPLE_STRATEGY: &str = "SimpleStrategy";
const NETWORK_TOPOLOGY_STRATEGY: &str = "NetworkTopologyStrategy";

/// A replication strategy determines the nodes where replicas are placed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplicationStrategy {
    /// Replicas are placed on the next distinct nodes along the ring,
    /// regardless of datacenter.
    Simple { replication_factor: usize },
    /// Replicas honor a per-datacenter factor; placement still follows ring order.
    NetworkTopology {
        datacenter_replication_factor: FxHashMap<String, usize>,
    },
    /// A strategy the driver does not interpret (e.g. a local-only keyspace).
    Other,
}

impl ReplicationStrategy {
    /// Parses the raw replication options map of a keyspace row. Unknown
    /// strategy classes map to [`ReplicationStrategy::Other`]; a garbled map
    /// for a known class is a parse error.
    pub(crate) fn from_options(
        keyspace: &str,
        options: &FxHashMap<String, String>,
    ) -> Result<Self, SchemaParseError> {
        let class = options
            .get(CLASS)
            .ok_or_else(|| SchemaParseError::InvalidReplication {
                keyspace: keyspace.into(),
                message: "missing strategy class".into(),
            })?;

        // the class may come fully qualified
        let class = class.rsplit('.').next().unwrap_or(class);

        match class {
            SIMPLE_STRATEGY => {
                let replication_factor = options
                    .get(REPLICATION_FACTOR)
                    .and_then(|factor| factor.parse().ok())
                    .ok_or_else(|| SchemaParseError::InvalidReplication {
                        keyspace: keyspace.into(),
                        message: "missing or invalid replication_factor".into(),
                    })?;

                Ok(ReplicationStrategy::Simple { replication_factor })
            }
            NETWORK_TOPOLOGY_STRATEGY => {
                let datacenter_replication_factor = options
                    .iter()
                    .filter(|(key, _)| *key != CLASS)
                    .map(|(datacenter, factor)| {
                        factor.parse().map(|factor| (datacenter.clone(), factor)).map_err(
                            |_| SchemaParseError::InvalidReplication {
                                keyspace: keyspace.into(),
                                message: format!(
                                    "invalid replication factor for datacenter {}",
                                    datacenter
                                ),
                            },
                        )
                    })
                    .collect::<Result<_, _>>()?;

                Ok(ReplicationStrategy::NetworkTopology {
                    datacenter_replication_factor,
                })
            }
            _ => Ok(ReplicationStrategy::Other),
        }
    }
}
