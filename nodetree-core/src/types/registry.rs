//! Node Type Registry
//!
//! Maps idnames to node type implementations. The registry is shared between
//! all trees of a database (and possibly across threads), so it is backed by
//! a concurrent map: registering a plugin type never blocks readers that are
//! resolving other types.

use std::sync::Arc;

use dashmap::DashMap;

use super::builtin;
use super::node_type::{NodeType, UndefinedNodeType};
use crate::error::{NodeTreeError, Result};

/// Lookup table from idname to node type.
#[derive(Debug, Default)]
pub struct NodeTypeRegistry {
    types: DashMap<String, Arc<dyn NodeType>>,
}

impl NodeTypeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding all built-in node types.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for node_type in builtin::all() {
            // Built-in idnames are unique.
            let _ = registry.register(node_type);
        }
        registry
    }

    /// Register a node type under its idname.
    pub fn register(&self, node_type: Arc<dyn NodeType>) -> Result<()> {
        let idname = node_type.idname().to_string();
        match self.types.entry(idname) {
            dashmap::mapref::entry::Entry::Occupied(entry) => {
                Err(NodeTreeError::DuplicateNodeType(entry.key().clone()))
            }
            dashmap::mapref::entry::Entry::Vacant(entry) => {
                entry.insert(node_type);
                Ok(())
            }
        }
    }

    /// Remove a node type. Existing nodes keep their resolved type.
    pub fn unregister(&self, idname: &str) -> Option<Arc<dyn NodeType>> {
        self.types.remove(idname).map(|(_, node_type)| node_type)
    }

    /// Find a registered type.
    pub fn find(&self, idname: &str) -> Option<Arc<dyn NodeType>> {
        self.types.get(idname).map(|entry| Arc::clone(entry.value()))
    }

    /// Find a registered type, falling back to an undefined placeholder.
    pub fn resolve(&self, idname: &str) -> Arc<dyn NodeType> {
        match self.find(idname) {
            Some(node_type) => node_type,
            None => {
                tracing::warn!(idname, "node type is not registered, using undefined type");
                Arc::new(UndefinedNodeType::new(idname))
            }
        }
    }

    pub fn contains(&self, idname: &str) -> bool {
        self.types.contains_key(idname)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
