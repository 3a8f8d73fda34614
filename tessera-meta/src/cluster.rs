pub use self::cluster_metadata::ClusterMetadata;
pub use self::metadata_manager::{MetadataManager, MetadataManagerConfig};
pub use self::refresh::MetadataRefresh;
pub use self::rows::{
    ColumnRow, KeyspaceRow, NodeRow, SchemaRows, TableRow, UserTypeRow, ViewRow,
};
pub use self::token_map::{TokenMap, TokenRange};

mod cluster_metadata;
mod metadata_manager;
mod refresh;
mod rows;
pub mod schema;
mod token_map;
pub mod topology;
