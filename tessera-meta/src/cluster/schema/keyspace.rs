use fxhash::FxHashMap;
use itertools::Itertools;
use std::sync::Arc;

use crate::cluster::rows::{KeyspaceRow, SchemaRows};
use crate::cluster::schema::{
    ColumnType, MaterializedViewMetadata, ReplicationStrategy, TableMetadata, UserTypeMetadata,
};
use crate::error::{RefreshError, SchemaParseError};

/// Keyspace metadata: replication settings plus the tables, materialized views
/// and user types the keyspace owns. Dropping a keyspace drops all of its
/// dependents in the same refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyspaceMetadata {
    name: String,
    replication_strategy: ReplicationStrategy,
    tables: FxHashMap<String, Arc<TableMetadata>>,
    views: FxHashMap<String, Arc<MaterializedViewMetadata>>,
    user_types: FxHashMap<String, Arc<UserTypeMetadata>>,
}

impl KeyspaceMetadata {
    /// Assembles a keyspace from a schema row dump, taking only the rows that
    /// belong to it. Validates user types first, then tables, then views, so
    /// every reference resolves against already-validated objects.
    pub(crate) fn from_rows(
        row: &KeyspaceRow,
        schema: &SchemaRows,
    ) -> Result<Self, RefreshError> {
        let replication_strategy = ReplicationStrategy::from_options(&row.name, &row.replication)?;

        let known_type_names = schema
            .user_types
            .iter()
            .filter(|user_type| user_type.keyspace == row.name)
            .map(|user_type| user_type.name.clone())
            .collect_vec();

        let mut user_types = FxHashMap::default();
        for user_type in &schema.user_types {
            if user_type.keyspace != row.name {
                continue;
            }

            // user types may reference each other, so resolution goes against
            // the full name set rather than insertion order
            for (field_name, field_type) in
                user_type.field_names.iter().zip(&user_type.field_types)
            {
                if let ColumnType::UserDefined(reference) = field_type {
                    if !known_type_names.contains(reference) {
                        return Err(SchemaParseError::UnresolvedUserType {
                            keyspace: row.name.clone(),
                            table: user_type.name.clone(),
                            column: field_name.clone(),
                            user_type: reference.clone(),
                        }
                        .into());
                    }
                }
            }

            user_types.insert(
                user_type.name.clone(),
                Arc::new(UserTypeMetadata::new(
                    user_type.name.clone(),
                    user_type.field_names.clone(),
                    user_type.field_types.clone(),
                )),
            );
        }

        let mut views_by_base: FxHashMap<&str, Vec<String>> = FxHashMap::default();
        for view in &schema.views {
            if view.keyspace == row.name {
                views_by_base
                    .entry(&view.base_table)
                    .or_default()
                    .push(view.name.clone());
            }
        }

        let mut tables = FxHashMap::default();
        for table in &schema.tables {
            if table.keyspace != row.name {
                continue;
            }

            let views = views_by_base.remove(table.name.as_str()).unwrap_or_default();
            tables.insert(
                table.name.clone(),
                Arc::new(TableMetadata::from_row(table, &user_types, views)?),
            );
        }

        let mut views = FxHashMap::default();
        for view in &schema.views {
            if view.keyspace != row.name {
                continue;
            }

            let base = tables.get(&view.base_table).ok_or_else(|| {
                SchemaParseError::UnknownBaseTable {
                    keyspace: row.name.clone(),
                    view: view.name.clone(),
                    base_table: view.base_table.clone(),
                }
            })?;

            views.insert(
                view.name.clone(),
                Arc::new(MaterializedViewMetadata::from_row(view, base, &user_types)?),
            );
        }

        Ok(KeyspaceMetadata {
            name: row.name.clone(),
            replication_strategy,
            tables,
            views,
            user_types,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn replication_strategy(&self) -> &ReplicationStrategy {
        &self.replication_strategy
    }

    /// Returns known tables.
    #[inline]
    pub fn tables(&self) -> &FxHashMap<String, Arc<TableMetadata>> {
        &self.tables
    }

    /// Returns a known table, if present.
    #[inline]
    pub fn table(&self, name: &str) -> Option<&Arc<TableMetadata>> {
        self.tables.get(name)
    }

    /// Returns known materialized views.
    #[inline]
    pub fn views(&self) -> &FxHashMap<String, Arc<MaterializedViewMetadata>> {
        &self.views
    }

    /// Returns a known materialized view, if present.
    #[inline]
    pub fn view(&self, name: &str) -> Option<&Arc<MaterializedViewMetadata>> {
        self.views.get(name)
    }

    /// Returns known user types.
    #[inline]
    pub fn user_types(&self) -> &FxHashMap<String, Arc<UserTypeMetadata>> {
        &self.user_types
    }

    /// Returns a known user type, if present.
    #[inline]
    pub fn user_type(&self, name: &str) -> Option<&Arc<UserTypeMetadata>> {
        self.user_types.get(name)
    }

    /// Creates a copy with a table replaced/added. The view back-links of the
    /// incoming table are trusted to be consistent with the keyspace's views.
    #[must_use]
    pub(crate) fn clone_with_table(&self, table: Arc<TableMetadata>) -> Self {
        let mut tables = self.tables.clone();
        tables.insert(table.name().into(), table);

        KeyspaceMetadata {
            tables,
            ..self.clone()
        }
    }

    /// Creates a copy with a table and all views based on it removed.
    #[must_use]
    pub(crate) fn clone_without_table(&self, name: &str) -> Self {
        let mut tables = self.tables.clone();
        tables.remove(name);

        let views = self
            .views
            .iter()
            .filter(|(_, view)| view.base_table() != name)
            .map(|(view_name, view)| (view_name.clone(), view.clone()))
            .collect();

        KeyspaceMetadata {
            tables,
            views,
            ..self.clone()
        }
    }

    /// Creates a copy with a view replaced/added, rebuilding the base table's
    /// reverse link.
    #[must_use]
    pub(crate) fn clone_with_view(&self, view: Arc<MaterializedViewMetadata>) -> Self {
        let mut views = self.views.clone();
        views.insert(view.name().into(), view.clone());

        let mut tables = self.tables.clone();
        if let Some(base) = tables.get(view.base_table()) {
            let mut view_names = base
                .views()
                .iter()
                .filter(|name| *name != view.name())
                .cloned()
                .collect_vec();
            view_names.push(view.name().into());

            tables.insert(
                view.base_table().into(),
                Arc::new(base.clone_with_views(view_names)),
            );
        }

        KeyspaceMetadata {
            tables,
            views,
            ..self.clone()
        }
    }

    /// Creates a copy with a view removed, rebuilding the base table's reverse link.
    #[must_use]
    pub(crate) fn clone_without_view(&self, name: &str) -> Self {
        let mut views = self.views.clone();
        let removed = views.remove(name);

        let mut tables = self.tables.clone();
        if let Some(removed) = removed {
            if let Some(base) = tables.get(removed.base_table()) {
                let view_names = base
                    .views()
                    .iter()
                    .filter(|view_name| view_name.as_str() != name)
                    .cloned()
                    .collect_vec();

                tables.insert(
                    removed.base_table().into(),
                    Arc::new(base.clone_with_views(view_names)),
                );
            }
        }

        KeyspaceMetadata {
            tables,
            views,
            ..self.clone()
        }
    }

    /// Creates a copy with a user type replaced/added.
    #[must_use]
    pub(crate) fn clone_with_user_type(&self, user_type: Arc<UserTypeMetadata>) -> Self {
        let mut user_types = self.user_types.clone();
        user_types.insert(user_type.name.clone(), user_type);

        KeyspaceMetadata {
            user_types,
            ..self.clone()
        }
    }

    /// Creates a copy with a user type removed.
    #[must_use]
    pub(crate) fn clone_without_user_type(&self, name: &str) -> Self {
        let mut user_types = self.user_types.clone();
        user_types.remove(name);

        KeyspaceMetadata {
            user_types,
            ..self.clone()
        }
    }
}
