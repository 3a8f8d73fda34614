use derive_more::Constructor;
use fxhash::FxHashMap;
use std::net::SocketAddr;
use uuid::Uuid;

use crate::cluster::schema::{ColumnKind, ColumnType};

/// A decoded row describing one node, as handed over by the transport layer
/// from the cluster's system tables. Tokens arrive in their textual form and
/// are parsed against the ring's partitioner during ingestion.
#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct NodeRow {
    pub host_id: Uuid,
    pub broadcast_rpc_address: SocketAddr,
    pub broadcast_address: Option<SocketAddr>,
    pub listen_address: Option<SocketAddr>,
    pub datacenter: String,
    pub rack: String,
    pub tokens: Vec<String>,
}

/// A decoded keyspace row. Replication options keep the raw map shape the
/// database exposes, including the `class` entry.
#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct KeyspaceRow {
    pub name: String,
    pub replication: FxHashMap<String, String>,
}

/// A decoded column row. `position` orders columns within their kind; the
/// database reports `-1` for regular columns.
#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct ColumnRow {
    pub name: String,
    pub kind: ColumnKind,
    pub position: i32,
    pub column_type: ColumnType,
}

/// A decoded table row with its column rows.
#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct TableRow {
    pub keyspace: String,
    pub name: String,
    pub columns: Vec<ColumnRow>,
}

/// A decoded materialized view row with its column rows.
#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct ViewRow {
    pub keyspace: String,
    pub name: String,
    pub base_table: String,
    pub columns: Vec<ColumnRow>,
}

/// A decoded user type row. Field names and types are positional.
#[derive(Debug, Clone, PartialEq, Constructor)]
pub struct UserTypeRow {
    pub keyspace: String,
    pub name: String,
    pub field_names: Vec<String>,
    pub field_types: Vec<ColumnType>,
}

/// Schema row dump covering one or more keyspaces.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaRows {
    pub keyspaces: Vec<KeyspaceRow>,
    pub tables: Vec<TableRow>,
    pub views: Vec<ViewRow>,
    pub user_types: Vec<UserTypeRow>,
}
