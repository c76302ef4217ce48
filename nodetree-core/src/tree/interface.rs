//! Tree Interface
//!
//! The sockets a tree exposes when it is used as a group. Group nodes in
//! other trees only ever see a [`GroupSnapshot`] of the tree they reference:
//! the interface, the field inferencing result and whether it contains an
//! output. Snapshots are collected before a tree is borrowed mutably, so no
//! update pass ever holds references into two trees at once.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::ids::TreeId;
use super::node_tree::NodeTree;
use crate::field::FieldInferencingInterface;
use crate::types::SocketType;

/// One socket of the tree interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceSocket {
    identifier: String,
    name: String,
    socket_type: SocketType,
}

impl InterfaceSocket {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn socket_type(&self) -> SocketType {
        self.socket_type
    }
}

/// Inputs and outputs exposed by a tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeInterface {
    inputs: Vec<InterfaceSocket>,
    outputs: Vec<InterfaceSocket>,
    next_identifier: u32,
}

impl TreeInterface {
    pub fn inputs(&self) -> &[InterfaceSocket] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[InterfaceSocket] {
        &self.outputs
    }

    /// Append an input and return its generated identifier.
    pub fn add_input(&mut self, name: impl Into<String>, socket_type: SocketType) -> String {
        let socket = self.new_socket(name.into(), socket_type);
        let identifier = socket.identifier.clone();
        self.inputs.push(socket);
        identifier
    }

    /// Append an output and return its generated identifier.
    pub fn add_output(&mut self, name: impl Into<String>, socket_type: SocketType) -> String {
        let socket = self.new_socket(name.into(), socket_type);
        let identifier = socket.identifier.clone();
        self.outputs.push(socket);
        identifier
    }

    pub fn remove_input(&mut self, identifier: &str) -> bool {
        let len = self.inputs.len();
        self.inputs.retain(|s| s.identifier != identifier);
        self.inputs.len() != len
    }

    pub fn remove_output(&mut self, identifier: &str) -> bool {
        let len = self.outputs.len();
        self.outputs.retain(|s| s.identifier != identifier);
        self.outputs.len() != len
    }

    fn new_socket(&mut self, name: String, socket_type: SocketType) -> InterfaceSocket {
        let identifier = format!("Socket_{}", self.next_identifier);
        self.next_identifier += 1;
        InterfaceSocket {
            identifier,
            name,
            socket_type,
        }
    }
}

/// What group nodes need to know about the tree they reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupSnapshot {
    pub interface: TreeInterface,
    /// `None` while the referenced tree has not been updated yet.
    pub field_interface: Option<FieldInferencingInterface>,
    pub contains_output: bool,
}

impl GroupSnapshot {
    pub fn of(tree: &NodeTree) -> Self {
        Self {
            interface: tree.interface().clone(),
            field_interface: tree.field_inferencing_interface().cloned(),
            contains_output: tree.contains_output(),
        }
    }
}

/// Snapshots of the trees referenced by the group nodes of one tree.
#[derive(Debug, Clone, Default)]
pub struct GroupSnapshots {
    snapshots: HashMap<TreeId, GroupSnapshot>,
}

impl GroupSnapshots {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(tree: TreeId, snapshot: GroupSnapshot) -> Self {
        let mut snapshots = Self::new();
        snapshots.insert(tree, snapshot);
        snapshots
    }

    pub fn insert(&mut self, tree: TreeId, snapshot: GroupSnapshot) {
        self.snapshots.insert(tree, snapshot);
    }

    pub fn get(&self, tree: TreeId) -> Option<&GroupSnapshot> {
        self.snapshots.get(&tree)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_never_reused() {
        let mut interface = TreeInterface::default();
        let a = interface.add_input("A", SocketType::Float);
        let b = interface.add_output("B", SocketType::Geometry);
        assert_ne!(a, b);

        assert!(interface.remove_input(&a));
        assert!(!interface.remove_input(&a));
        let c = interface.add_input("A", SocketType::Float);
        assert_ne!(a, c);
        assert_eq!(interface.inputs().len(), 1);
        assert_eq!(interface.outputs()[0].socket_type(), SocketType::Geometry);
    }
}
