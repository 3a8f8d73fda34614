use thiserror::Error as ThisError;
use uuid::Uuid;

use tessera_protocol::error::Error as ProtocolError;

/// Malformed or internally inconsistent schema definition.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SchemaParseError {
    /// A table must declare at least one partition key column.
    #[error("Table {keyspace}.{table} has no partition key columns")]
    MissingPartitionKey { keyspace: String, table: String },
    /// Column names are unique within a table or view.
    #[error("Duplicate column {column} in {keyspace}.{table}")]
    DuplicateColumn {
        keyspace: String,
        table: String,
        column: String,
    },
    /// A column type references a user type the keyspace does not define.
    #[error("Column {column} in {keyspace}.{table} references unknown user type {user_type}")]
    UnresolvedUserType {
        keyspace: String,
        table: String,
        column: String,
        user_type: String,
    },
    /// A materialized view references a base table that does not exist in its keyspace.
    #[error("Materialized view {keyspace}.{view} references unknown base table {base_table}")]
    UnknownBaseTable {
        keyspace: String,
        view: String,
        base_table: String,
    },
    /// Replication options could not be interpreted.
    #[error("Invalid replication options for keyspace {keyspace}: {message}")]
    InvalidReplication { keyspace: String, message: String },
    /// A schema change referenced a keyspace the driver does not know.
    #[error("Unknown keyspace {keyspace}")]
    UnknownKeyspace { keyspace: String },
    /// A schema change arrived without the rows describing the changed object.
    #[error("Schema rows for {keyspace} are incomplete: {message}")]
    IncompleteRows { keyspace: String, message: String },
}

/// A materialized view that cannot route writes back to its base table. The
/// view's primary key must contain every partition key column of the base.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
#[error("Materialized view {keyspace}.{view} omits base table partition key column {column}")]
pub struct InvalidViewDefinitionError {
    pub keyspace: String,
    pub view: String,
    pub column: String,
}

/// Duplicate or unparseable token assignment found while ingesting topology.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum TopologyInconsistencyError {
    /// Two distinct nodes claim ownership of the same token.
    #[error("Token {token} claimed by both {first} and {second}")]
    DuplicateToken {
        token: String,
        first: Uuid,
        second: Uuid,
    },
    /// A node reported a token the ring's partitioner cannot parse.
    #[error("Node {host_id} reported an invalid token: {source}")]
    InvalidToken {
        host_id: Uuid,
        source: ProtocolError,
    },
}

/// Error surfaced to the transport collaborator when a refresh is rejected.
/// A failed refresh leaves the published snapshot and the event stream exactly
/// as they were.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum RefreshError {
    #[error(transparent)]
    SchemaParse(#[from] SchemaParseError),
    #[error(transparent)]
    InvalidViewDefinition(#[from] InvalidViewDefinitionError),
    #[error(transparent)]
    TopologyInconsistency(#[from] TopologyInconsistencyError),
    /// The metadata manager no longer accepts notifications.
    #[error("Metadata manager is shut down")]
    Shutdown,
}
