use arc_swap::ArcSwap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::*;

use tessera_protocol::events::{SchemaChange, TopologyEventKind};
use tessera_protocol::token::Partitioner;

use crate::cluster::rows::{NodeRow, SchemaRows};
use crate::cluster::{ClusterMetadata, MetadataRefresh};
use crate::error::RefreshError;
use crate::events::EventBatch;

const DEFAULT_COMMAND_BUFFER_SIZE: usize = 128;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 128;

/// Configuration for a [`MetadataManager`].
#[derive(Debug, Clone)]
pub struct MetadataManagerConfig {
    partitioner: Partitioner,
    command_buffer_size: usize,
    event_buffer_size: usize,
}

impl Default for MetadataManagerConfig {
    fn default() -> Self {
        MetadataManagerConfig {
            partitioner: Default::default(),
            command_buffer_size: DEFAULT_COMMAND_BUFFER_SIZE,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl MetadataManagerConfig {
    pub fn new() -> Self {
        Default::default()
    }

    /// Sets the ring partitioner. Fixed for the lifetime of the manager.
    #[must_use]
    pub fn with_partitioner(mut self, partitioner: Partitioner) -> Self {
        self.partitioner = partitioner;
        self
    }

    /// Sets the refresh command buffer size.
    #[must_use]
    pub fn with_command_buffer_size(mut self, command_buffer_size: usize) -> Self {
        self.command_buffer_size = command_buffer_size;
        self
    }

    /// Sets the outbound event buffer size.
    #[must_use]
    pub fn with_event_buffer_size(mut self, event_buffer_size: usize) -> Self {
        self.event_buffer_size = event_buffer_size;
        self
    }
}

struct RefreshCommand {
    refresh: MetadataRefresh,
    result_sender: oneshot::Sender<Result<u64, RefreshError>>,
}

/// Owner of the current [`ClusterMetadata`] snapshot and the single writer
/// applying refreshes to it.
///
/// Refreshes from all sources funnel through one worker task and are applied
/// strictly one at a time, in submission order. A successful refresh first
/// publishes the new snapshot, then broadcasts its [`EventBatch`], then
/// completes the caller's future - a listener reacting to an event always
/// observes a snapshot at least as new as the one the event came from. A
/// failed refresh changes nothing and emits nothing.
///
/// Reading the snapshot is lock-free and never waits for in-flight refreshes.
pub struct MetadataManager {
    metadata: Arc<ArcSwap<ClusterMetadata>>,
    command_sender: mpsc::Sender<RefreshCommand>,
    event_sender: broadcast::Sender<EventBatch>,
}

impl MetadataManager {
    /// Creates a manager with an empty startup snapshot and spawns its worker
    /// task. The worker stops when the manager is dropped.
    pub fn new(config: MetadataManagerConfig) -> Self {
        let metadata = Arc::new(ArcSwap::from_pointee(ClusterMetadata::empty(
            config.partitioner,
        )));
        let (command_sender, command_receiver) = mpsc::channel(config.command_buffer_size);
        let (event_sender, _) = broadcast::channel(config.event_buffer_size);

        tokio::spawn(process_refreshes(
            command_receiver,
            metadata.clone(),
            event_sender.clone(),
        ));

        MetadataManager {
            metadata,
            command_sender,
            event_sender,
        }
    }

    /// The current snapshot. Calls at different times may observe different
    /// snapshots, but each returned snapshot is internally consistent.
    #[inline]
    pub fn metadata(&self) -> Arc<ClusterMetadata> {
        self.metadata.load_full()
    }

    /// Subscribes to event batches of future refreshes.
    #[inline]
    pub fn subscribe(&self) -> broadcast::Receiver<EventBatch> {
        self.event_sender.subscribe()
    }

    /// Replaces the snapshot from a complete node and schema dump.
    pub async fn apply_full_resync(
        &self,
        nodes: Vec<NodeRow>,
        schema: SchemaRows,
    ) -> Result<u64, RefreshError> {
        self.refresh(MetadataRefresh::FullResync { nodes, schema })
            .await
    }

    /// Applies a single-node topology change.
    pub async fn apply_topology_event(
        &self,
        kind: TopologyEventKind,
        node: NodeRow,
    ) -> Result<u64, RefreshError> {
        self.refresh(MetadataRefresh::Topology { kind, node }).await
    }

    /// Applies a schema change with its re-fetched rows.
    pub async fn apply_schema_event(
        &self,
        change: SchemaChange,
        rows: SchemaRows,
    ) -> Result<u64, RefreshError> {
        self.refresh(MetadataRefresh::Schema { change, rows }).await
    }

    /// Submits a refresh and waits for it to be applied, returning the version
    /// of the snapshot it produced. When the future resolves, the new snapshot
    /// is already published.
    pub async fn refresh(&self, refresh: MetadataRefresh) -> Result<u64, RefreshError> {
        let (result_sender, result_receiver) = oneshot::channel();
        self.command_sender
            .send(RefreshCommand {
                refresh,
                result_sender,
            })
            .await
            .map_err(|_| RefreshError::Shutdown)?;

        result_receiver.await.map_err(|_| RefreshError::Shutdown)?
    }
}

async fn process_refreshes(
    mut command_receiver: mpsc::Receiver<RefreshCommand>,
    metadata: Arc<ArcSwap<ClusterMetadata>>,
    event_sender: broadcast::Sender<EventBatch>,
) {
    while let Some(command) = command_receiver.recv().await {
        let old = metadata.load_full();
        let result = match command.refresh.compute(&old) {
            Ok((new, events)) => {
                let version = new.version();
                debug!(version, event_count = events.len(), "Publishing new metadata.");

                // publish before notify
                metadata.store(Arc::new(new));
                if !events.is_empty() {
                    // an error here only means there are no subscribers
                    let _ = event_sender.send(EventBatch::new(version, events));
                }

                Ok(version)
            }
            Err(error) => {
                warn!(%error, "Metadata refresh failed - keeping the current snapshot.");
                Err(error)
            }
        };

        let _ = command.result_sender.send(result);
    }
}
