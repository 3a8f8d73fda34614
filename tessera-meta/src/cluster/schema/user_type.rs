use derive_more::Constructor;

use crate::cluster::schema::ColumnType;

/// A user-defined type. Field names and types are positional and immutable.
#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct UserTypeMetadata {
    pub name: String,
    pub field_names: Vec<String>,
    pub field_types: Vec<ColumnType>,
}
