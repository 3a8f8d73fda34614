//! Immutable schema object model: keyspaces, tables, materialized views,
//! columns and user types, parsed and validated from decoded system rows.

mod column;
mod keyspace;
mod replication_strategy;
mod table;
mod user_type;
mod view;

pub use self::column::{ColumnKind, ColumnMetadata, ColumnType};
pub use self::keyspace::KeyspaceMetadata;
pub use self::replication_strategy::ReplicationStrategy;
pub use self::table::TableMetadata;
pub use self::user_type::UserTypeMetadata;
pub use self::view::MaterializedViewMetadata;
