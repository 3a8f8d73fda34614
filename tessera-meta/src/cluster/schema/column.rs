use derive_more::{Constructor, Display};
use fxhash::FxHashMap;
use itertools::Itertools;
use std::sync::Arc;

use crate::cluster::rows::ColumnRow;
use crate::cluster::schema::UserTypeMetadata;
use crate::error::SchemaParseError;

/// Declared type of a column. Carried opaquely by the metadata engine, except
/// that user type references must resolve against the keyspace's known types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// A built-in type, kept as its textual name.
    Native(String),
    /// A reference to a user type defined in the same keyspace.
    UserDefined(String),
}

/// Kind of a column within a table's primary key layout.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Display)]
pub enum ColumnKind {
    PartitionKey,
    Clustering,
    Regular,
}

/// Column metadata within a table or materialized view.
#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct ColumnMetadata {
    pub name: String,
    pub kind: ColumnKind,
    pub column_type: ColumnType,
}

/// Orders raw column rows into the canonical layout - partition key columns in
/// partition order, then clustering columns in clustering order, then regular
/// columns by name - validating name uniqueness, partition key presence and
/// user type resolution. Returns the ordered columns together with the
/// partition key and clustering column counts.
pub(crate) fn build_column_list(
    keyspace: &str,
    table: &str,
    rows: &[ColumnRow],
    user_types: &FxHashMap<String, Arc<UserTypeMetadata>>,
) -> Result<(Vec<ColumnMetadata>, usize, usize), SchemaParseError> {
    let mut seen = Vec::with_capacity(rows.len());
    for row in rows {
        if seen.contains(&&row.name) {
            return Err(SchemaParseError::DuplicateColumn {
                keyspace: keyspace.into(),
                table: table.into(),
                column: row.name.clone(),
            });
        }
        seen.push(&row.name);

        if let ColumnType::UserDefined(user_type) = &row.column_type {
            if !user_types.contains_key(user_type) {
                return Err(SchemaParseError::UnresolvedUserType {
                    keyspace: keyspace.into(),
                    table: table.into(),
                    column: row.name.clone(),
                    user_type: user_type.clone(),
                });
            }
        }
    }

    let partition_key = rows
        .iter()
        .filter(|row| row.kind == ColumnKind::PartitionKey)
        .sorted_unstable_by_key(|row| row.position)
        .collect_vec();
    let clustering = rows
        .iter()
        .filter(|row| row.kind == ColumnKind::Clustering)
        .sorted_unstable_by_key(|row| row.position)
        .collect_vec();
    let regular = rows
        .iter()
        .filter(|row| row.kind == ColumnKind::Regular)
        .sorted_unstable_by_key(|row| &row.name)
        .collect_vec();

    if partition_key.is_empty() {
        return Err(SchemaParseError::MissingPartitionKey {
            keyspace: keyspace.into(),
            table: table.into(),
        });
    }

    let partition_key_len = partition_key.len();
    let clustering_len = clustering.len();

    let columns = partition_key
        .into_iter()
        .chain(clustering)
        .chain(regular)
        .map(|row| ColumnMetadata::new(row.name.clone(), row.kind, row.column_type.clone()))
        .collect();

    Ok((columns, partition_key_len, clustering_len))
}
