use derive_more::Display;

/// The state of a node, as viewed from the driver.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug, Display)]
pub enum NodeState {
    /// The node has been discovered, but no status event about it has arrived yet.
    Unknown,
    /// The last status event about the node reported it up.
    Up,
    /// The last status event about the node reported it down.
    Down,
}
