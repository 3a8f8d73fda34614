use fxhash::FxHashMap;
use std::sync::Arc;

use crate::cluster::rows::TableRow;
use crate::cluster::schema::column::build_column_list;
use crate::cluster::schema::{ColumnMetadata, UserTypeMetadata};
use crate::error::SchemaParseError;

/// Table metadata.
///
/// Columns are ordered partition key columns first (in partition order), then
/// clustering columns (in clustering order), then regular columns.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMetadata {
    name: String,
    columns: Vec<ColumnMetadata>,
    partition_key_len: usize,
    clustering_len: usize,
    views: Vec<String>,
}

impl TableMetadata {
    /// Builds and validates a table from its decoded row. `views` carries the
    /// names of materialized views based on this table, so the reverse link is
    /// part of the immutable value.
    pub(crate) fn from_row(
        row: &TableRow,
        user_types: &FxHashMap<String, Arc<UserTypeMetadata>>,
        mut views: Vec<String>,
    ) -> Result<Self, SchemaParseError> {
        let (columns, partition_key_len, clustering_len) =
            build_column_list(&row.keyspace, &row.name, &row.columns, user_types)?;
        views.sort_unstable();

        Ok(TableMetadata {
            name: row.name.clone(),
            columns,
            partition_key_len,
            clustering_len,
            views,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
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

    /// Columns outside the primary key.
    #[inline]
    pub fn regular_columns(&self) -> &[ColumnMetadata] {
        &self.columns[self.partition_key_len + self.clustering_len..]
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnMetadata> {
        self.columns.iter().find(|column| column.name == name)
    }

    /// Names of materialized views based on this table.
    #[inline]
    pub fn views(&self) -> &[String] {
        &self.views
    }

    /// Creates a copy of this table with a different set of view back-links.
    #[must_use]
    pub(crate) fn clone_with_views(&self, mut views: Vec<String>) -> Self {
        views.sort_unstable();
        TableMetadata {
            name: self.name.clone(),
            columns: self.columns.clone(),
            partition_key_len: self.partition_key_len,
            clustering_len: self.clustering_len,
            views,
        }
    }
}
