use fxhash::FxHashMap;
use std::sync::Arc;

use crate::cluster::rows::ViewRow;
use crate::cluster::schema::column::build_column_list;
use crate::cluster::schema::{ColumnMetadata, TableMetadata, UserTypeMetadata};
use crate::error::{InvalidViewDefinitionError, RefreshError};

/// Materialized view metadata. A view always references exactly one base table
/// in the same keyspace; the base table exposes the reverse link.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedViewMetadata {
    name: String,
    base_table: String,
    columns: Vec<ColumnMetadata>,
    partition_key_len: usize,
    clustering_len: usize,
}

impl MaterializedViewMetadata {
    /// Builds and validates a view from its decoded row against its base table.
    ///
    /// The view's primary key must contain every partition key column of the
    /// base - otherwise the view could not route writes - and violating that
    /// is [`InvalidViewDefinitionError`], distinct from plain parse errors.
    pub(crate) fn from_row(
        row: &ViewRow,
        base: &TableMetadata,
        user_types: &FxHashMap<String, Arc<UserTypeMetadata>>,
    ) -> Result<Self, RefreshError> {
        let (columns, partition_key_len, clustering_len) =
            build_column_list(&row.keyspace, &row.name, &row.columns, user_types)
                .map_err(RefreshError::from)?;

        let primary_key = &columns[..partition_key_len + clustering_len];
        for base_column in base.partition_key() {
            if !primary_key.iter().any(|column| column.name == base_column.name) {
                return Err(InvalidViewDefinitionError {
                    keyspace: row.keyspace.clone(),
                    view: row.name.clone(),
                    column: base_column.name.clone(),
                }
                .into());
            }
        }

        Ok(MaterializedViewMetadata {
            name: row.name.clone(),
            base_table: row.base_table.clone(),
            columns,
            partition_key_len,
            clustering_len,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the base table this view is derived from.
    #[inline]
    pub fn base_table(&self) -> &str {
        &self.base_table
    }

    /// All columns in canonical order.
    #[inline]
    pub fn columns(&self) -> &[ColumnMetadata] {
        &self.columns
    }

    /// Partition key columns, in partition order.
    #[inline]
    pub fn partition_key(&self) -> &[ColumnMetadata] {
        &self.columns[..self.partition_key_len]
    }

    /// Clustering columns, in clustering order.
    #[inline]
    pub fn clustering_columns(&self) -> &[ColumnMetadata] {
        &self.columns[self.partition_key_len..self.partition_key_len + self.clustering_len]
    }
}
