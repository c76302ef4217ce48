//! Runtime Caches
//!
//! Derived data that is recomputed lazily from a node tree.
//!
//! # Overview
//!
//! The topology cache turns the editable tree (id-keyed maps) into flat
//! index-based arrays that every analysis pass runs on: node and socket
//! lists, adjacency, logical origins and topological orders.
//!
//! The cache is guarded by a [`CacheMutex`]. Tagging a tree marks it dirty,
//! and the next query rebuilds it under the lock. Queries in between return
//! the same `Arc`.

mod cache;
mod origins;
mod topology;
mod toposort;

pub use cache::CacheMutex;
pub use topology::{CachedLink, CachedNode, CachedSocket, LogicalOrigins, TopologyCache};
pub use toposort::ToposortDirection;
