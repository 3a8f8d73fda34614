//! Client-side cluster metadata engine for the tessera driver.
//!
//! Maintains the driver's local view of cluster topology (nodes, datacenters,
//! tokens) and schema (keyspaces, tables, materialized views, user types),
//! keeps that view consistent as the cluster changes, and notifies subscribers
//! once a new view is published.
//!
//! The entry point is [`MetadataManager`](crate::cluster::MetadataManager): the
//! control connection feeds it raw change notifications, and routing or
//! load-balancing code reads the current [`ClusterMetadata`](crate::cluster::ClusterMetadata)
//! snapshot without blocking. Snapshots are immutable - a refresh always builds
//! a new one and swaps it in atomically before any event is dispatched, so a
//! listener handling an event can rely on the current snapshot reflecting at
//! least that change.

pub mod cluster;
pub mod error;
pub mod events;
