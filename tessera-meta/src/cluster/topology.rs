use fxhash::FxHashMap;
use std::sync::Arc;
use uuid::Uuid;

mod datacenter_metadata;
mod node;
mod node_state;

pub use self::datacenter_metadata::DatacenterMetadata;
pub use self::node::Node;
pub use self::node_state::NodeState;

/// Known nodes, keyed by host id.
pub type NodeMap = FxHashMap<Uuid, Arc<Node>>;
