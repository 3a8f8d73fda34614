use derive_more::Constructor;

/// Datacenter metadata derived from the node set.
#[derive(Clone, Debug, PartialEq, Eq, Constructor)]
pub struct DatacenterMetadata {
    pub rack_count: usize,
}
