use itertools::Itertools;
use std::sync::Arc;
use tracing::*;

use tessera_protocol::events::{SchemaChange, SchemaChangeKind, SchemaChangeTarget};

use crate::cluster::rows::SchemaRows;
use crate::cluster::schema::{
    ColumnType, KeyspaceMetadata, MaterializedViewMetadata, TableMetadata, UserTypeMetadata,
};
use crate::cluster::ClusterMetadata;
use crate::error::{RefreshError, SchemaParseError};
use crate::events::RefreshEvent;

/// Applies a single schema change notification.
///
/// Creations and updates rebuild the affected object from the re-fetched rows;
/// drops work off the current snapshot alone. Replica placement is recomputed
/// only when a keyspace's replication options actually changed.
pub(super) fn compute(
    change: &SchemaChange,
    rows: &SchemaRows,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    match &change.target {
        SchemaChangeTarget::Keyspace { keyspace } => match change.kind {
            SchemaChangeKind::Dropped => drop_keyspace(keyspace, old),
            kind => update_keyspace(kind, keyspace, rows, old),
        },
        SchemaChangeTarget::Table { keyspace, name } => match change.kind {
            SchemaChangeKind::Dropped => drop_table(keyspace, name, old),
            kind => update_table(kind, keyspace, name, rows, old),
        },
        SchemaChangeTarget::MaterializedView { keyspace, name } => match change.kind {
            SchemaChangeKind::Dropped => drop_view(keyspace, name, old),
            kind => update_view(kind, keyspace, name, rows, old),
        },
        SchemaChangeTarget::UserType { keyspace, name } => match change.kind {
            SchemaChangeKind::Dropped => drop_user_type(keyspace, name, old),
            kind => update_user_type(kind, keyspace, name, rows, old),
        },
    }
}

fn update_keyspace(
    kind: SchemaChangeKind,
    name: &str,
    rows: &SchemaRows,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    let row = rows
        .keyspaces
        .iter()
        .find(|row| row.name == name)
        .ok_or_else(|| SchemaParseError::IncompleteRows {
            keyspace: name.into(),
            message: "missing keyspace row".into(),
        })?;

    let keyspace = Arc::new(KeyspaceMetadata::from_rows(row, rows)?);

    // replica placement only depends on replication options, so a keyspace
    // update that leaves them alone keeps the old placement
    let recompute_replicas = old
        .keyspace(name)
        .map(|existing| existing.replication_strategy() != keyspace.replication_strategy())
        .unwrap_or(true);

    let event = match kind {
        SchemaChangeKind::Created => RefreshEvent::KeyspaceCreated(name.into()),
        _ => RefreshEvent::KeyspaceUpdated(name.into()),
    };

    Ok((
        old.clone_with_keyspace(keyspace, recompute_replicas),
        vec![event],
    ))
}

fn drop_keyspace(
    name: &str,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    let keyspace = match old.keyspace(name) {
        Some(keyspace) => keyspace,
        None => {
            warn!(keyspace = name, "Drop of an unknown keyspace - ignoring.");
            return Ok((old.clone(), vec![]));
        }
    };

    // drops cascade child-before-parent so a listener never sees an event for
    // an object whose dependents still appear live
    let mut events = Vec::new();
    for view in keyspace.views().keys().sorted_unstable() {
        events.push(RefreshEvent::ViewDropped {
            keyspace: name.into(),
            name: view.clone(),
        });
    }
    for table in keyspace.tables().keys().sorted_unstable() {
        events.push(RefreshEvent::TableDropped {
            keyspace: name.into(),
            name: table.clone(),
        });
    }
    for user_type in keyspace.user_types().keys().sorted_unstable() {
        events.push(RefreshEvent::UserTypeDropped {
            keyspace: name.into(),
            name: user_type.clone(),
        });
    }
    events.push(RefreshEvent::KeyspaceDropped(name.into()));

    Ok((old.clone_without_keyspace(name), events))
}

fn update_table(
    kind: SchemaChangeKind,
    keyspace_name: &str,
    name: &str,
    rows: &SchemaRows,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    let keyspace = known_keyspace(keyspace_name, old)?;

    let row = rows
        .tables
        .iter()
        .find(|row| row.keyspace == keyspace_name && row.name == name)
        .ok_or_else(|| SchemaParseError::IncompleteRows {
            keyspace: keyspace_name.into(),
            message: format!("missing table row for \"{name}\""),
        })?;

    // view back-links are carried over from the current keyspace
    let views = keyspace
        .views()
        .values()
        .filter(|view| view.base_table() == name)
        .map(|view| view.name().to_string())
        .collect();

    let table = Arc::new(TableMetadata::from_row(row, keyspace.user_types(), views)?);
    let keyspace = Arc::new(keyspace.clone_with_table(table));

    let event = match kind {
        SchemaChangeKind::Created => RefreshEvent::TableCreated {
            keyspace: keyspace_name.into(),
            name: name.into(),
        },
        _ => RefreshEvent::TableUpdated {
            keyspace: keyspace_name.into(),
            name: name.into(),
        },
    };

    Ok((old.clone_with_keyspace(keyspace, false), vec![event]))
}

fn drop_table(
    keyspace_name: &str,
    name: &str,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    let keyspace = known_keyspace(keyspace_name, old)?;
    if keyspace.table(name).is_none() {
        warn!(
            keyspace = keyspace_name,
            table = name,
            "Drop of an unknown table - ignoring."
        );
        return Ok((old.clone(), vec![]));
    }

    // dependent views go down with their base table
    let mut events = Vec::new();
    for view in keyspace
        .views()
        .values()
        .filter(|view| view.base_table() == name)
        .map(|view| view.name().to_string())
        .sorted_unstable()
    {
        events.push(RefreshEvent::ViewDropped {
            keyspace: keyspace_name.into(),
            name: view,
        });
    }
    events.push(RefreshEvent::TableDropped {
        keyspace: keyspace_name.into(),
        name: name.into(),
    });

    let keyspace = Arc::new(keyspace.clone_without_table(name));
    Ok((old.clone_with_keyspace(keyspace, false), events))
}

fn update_view(
    kind: SchemaChangeKind,
    keyspace_name: &str,
    name: &str,
    rows: &SchemaRows,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    let keyspace = known_keyspace(keyspace_name, old)?;

    let row = rows
        .views
        .iter()
        .find(|row| row.keyspace == keyspace_name && row.name == name)
        .ok_or_else(|| SchemaParseError::IncompleteRows {
            keyspace: keyspace_name.into(),
            message: format!("missing view row for \"{name}\""),
        })?;

    let base =
        keyspace
            .table(&row.base_table)
            .ok_or_else(|| SchemaParseError::UnknownBaseTable {
                keyspace: keyspace_name.into(),
                view: name.into(),
                base_table: row.base_table.clone(),
            })?;

    let view = Arc::new(MaterializedViewMetadata::from_row(
        row,
        base,
        keyspace.user_types(),
    )?);
    let keyspace = Arc::new(keyspace.clone_with_view(view));

    let event = match kind {
        SchemaChangeKind::Created => RefreshEvent::ViewCreated {
            keyspace: keyspace_name.into(),
            name: name.into(),
        },
        _ => RefreshEvent::ViewUpdated {
            keyspace: keyspace_name.into(),
            name: name.into(),
        },
    };

    Ok((old.clone_with_keyspace(keyspace, false), vec![event]))
}

fn drop_view(
    keyspace_name: &str,
    name: &str,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    let keyspace = known_keyspace(keyspace_name, old)?;
    if keyspace.view(name).is_none() {
        warn!(
            keyspace = keyspace_name,
            view = name,
            "Drop of an unknown view - ignoring."
        );
        return Ok((old.clone(), vec![]));
    }

    let keyspace = Arc::new(keyspace.clone_without_view(name));
    Ok((
        old.clone_with_keyspace(keyspace, false),
        vec![RefreshEvent::ViewDropped {
            keyspace: keyspace_name.into(),
            name: name.into(),
        }],
    ))
}

fn update_user_type(
    kind: SchemaChangeKind,
    keyspace_name: &str,
    name: &str,
    rows: &SchemaRows,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    let keyspace = known_keyspace(keyspace_name, old)?;

    let row = rows
        .user_types
        .iter()
        .find(|row| row.keyspace == keyspace_name && row.name == name)
        .ok_or_else(|| SchemaParseError::IncompleteRows {
            keyspace: keyspace_name.into(),
            message: format!("missing user type row for \"{name}\""),
        })?;

    // references must resolve against the keyspace's types, counting the
    // incoming type itself for self-recursion
    for (field_name, field_type) in row.field_names.iter().zip(&row.field_types) {
        if let ColumnType::UserDefined(reference) = field_type {
            if reference != name && keyspace.user_type(reference).is_none() {
                return Err(SchemaParseError::UnresolvedUserType {
                    keyspace: keyspace_name.into(),
                    table: name.into(),
                    column: field_name.clone(),
                    user_type: reference.clone(),
                }
                .into());
            }
        }
    }

    let user_type = Arc::new(UserTypeMetadata::new(
        row.name.clone(),
        row.field_names.clone(),
        row.field_types.clone(),
    ));
    let keyspace = Arc::new(keyspace.clone_with_user_type(user_type));

    let event = match kind {
        SchemaChangeKind::Created => RefreshEvent::UserTypeCreated {
            keyspace: keyspace_name.into(),
            name: name.into(),
        },
        _ => RefreshEvent::UserTypeUpdated {
            keyspace: keyspace_name.into(),
            name: name.into(),
        },
    };

    Ok((old.clone_with_keyspace(keyspace, false), vec![event]))
}

fn drop_user_type(
    keyspace_name: &str,
    name: &str,
    old: &ClusterMetadata,
) -> Result<(ClusterMetadata, Vec<RefreshEvent>), RefreshError> {
    let keyspace = known_keyspace(keyspace_name, old)?;
    if keyspace.user_type(name).is_none() {
        warn!(
            keyspace = keyspace_name,
            user_type = name,
            "Drop of an unknown user type - ignoring."
        );
        return Ok((old.clone(), vec![]));
    }

    let keyspace = Arc::new(keyspace.clone_without_user_type(name));
    Ok((
        old.clone_with_keyspace(keyspace, false),
        vec![RefreshEvent::UserTypeDropped {
            keyspace: keyspace_name.into(),
            name: name.into(),
        }],
    ))
}

fn known_keyspace<'a>(
    name: &str,
    old: &'a ClusterMetadata,
) -> Result<&'a Arc<KeyspaceMetadata>, RefreshError> {
    old.keyspace(name)
        .ok_or_else(|| SchemaParseError::UnknownKeyspace {
            keyspace: name.into(),
        }
        .into())
}
