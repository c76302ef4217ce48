//! Tagging API
//!
//! One function per kind of edit. Each sets the matching [`ChangedFlag`] on
//! the tree and, where it applies, on the node and socket, and marks the
//! topology cache dirty. The next update decides what to recompute from the
//! accumulated flags.
//!
//! The editing methods of [`NodeTree`] call these already. They are public
//! for edits of state the tree doesn't own.

use super::flags::ChangedFlag;
use crate::tree::{LinkId, NodeId, NodeTree, SocketId};

impl NodeTree {
    pub(crate) fn add_tree_tag(&mut self, flag: ChangedFlag) {
        self.runtime.changed |= flag;
        self.runtime.topology.tag_dirty();
    }

    pub(crate) fn add_node_tag(&mut self, node: NodeId, flag: ChangedFlag) {
        self.add_tree_tag(flag);
        if let Some(node) = self.node_mut(node) {
            node.changed |= flag;
        }
    }

    pub(crate) fn add_socket_tag(&mut self, socket: SocketId, flag: ChangedFlag) {
        let Some(node) = self.socket(socket).map(|socket| socket.node()) else {
            self.add_tree_tag(flag);
            return;
        };
        self.add_node_tag(node, flag);
        if let Some(socket) = self.socket_mut(socket) {
            socket.changed |= flag;
        }
    }
}

/// Everything has to be recomputed.
pub fn tag_all(tree: &mut NodeTree) {
    tree.add_tree_tag(ChangedFlag::ANY);
}

/// A node setting changed.
pub fn tag_node_property(tree: &mut NodeTree, node: NodeId) {
    tree.add_node_tag(node, ChangedFlag::NODE_PROPERTY);
}

/// A node was added.
pub fn tag_node_new(tree: &mut NodeTree, node: NodeId) {
    tree.add_node_tag(node, ChangedFlag::NODE_PROPERTY);
}

/// A node was muted or unmuted.
pub fn tag_node_mute(tree: &mut NodeTree, node: NodeId) {
    tree.add_node_tag(node, ChangedFlag::NODE_PROPERTY);
}

/// A node was removed.
pub fn tag_node_removed(tree: &mut NodeTree) {
    tree.add_tree_tag(ChangedFlag::REMOVED_NODE);
}

/// The node order changed. Affects which output node is used.
pub fn tag_node_reordered(tree: &mut NodeTree) {
    tree.add_tree_tag(ChangedFlag::ANY);
}

/// Internal links of a node changed.
pub fn tag_node_internal_link(tree: &mut NodeTree, node: NodeId) {
    tree.add_node_tag(node, ChangedFlag::INTERNAL_LINK);
}

/// A socket value or setting changed.
pub fn tag_socket_property(tree: &mut NodeTree, socket: SocketId) {
    tree.add_socket_tag(socket, ChangedFlag::SOCKET_PROPERTY);
}

/// A socket was added.
pub fn tag_socket_new(tree: &mut NodeTree, socket: SocketId) {
    tree.add_socket_tag(socket, ChangedFlag::SOCKET_PROPERTY);
}

/// A socket changed its type.
pub fn tag_socket_type(tree: &mut NodeTree, socket: SocketId) {
    tree.add_socket_tag(socket, ChangedFlag::SOCKET_PROPERTY);
}

/// A socket was shown or hidden.
pub fn tag_socket_availability(tree: &mut NodeTree, socket: SocketId) {
    tree.add_socket_tag(socket, ChangedFlag::SOCKET_PROPERTY);
}

/// A socket was removed.
pub fn tag_socket_removed(tree: &mut NodeTree) {
    tree.add_tree_tag(ChangedFlag::REMOVED_SOCKET);
}

/// Links changed in a way not covered by the other link tags.
pub fn tag_link_changed(tree: &mut NodeTree) {
    tree.add_tree_tag(ChangedFlag::LINK);
}

/// A link was added.
pub fn tag_link_added(tree: &mut NodeTree, _link: LinkId) {
    tree.add_tree_tag(ChangedFlag::LINK);
}

/// A link was removed.
pub fn tag_link_removed(tree: &mut NodeTree) {
    tree.add_tree_tag(ChangedFlag::LINK);
}

/// A link was muted or unmuted.
pub fn tag_link_mute(tree: &mut NodeTree, _link: LinkId) {
    tree.add_tree_tag(ChangedFlag::LINK);
}

/// A different output node became active.
pub fn tag_active_output_changed(tree: &mut NodeTree) {
    tree.add_tree_tag(ChangedFlag::ANY);
}

/// Runtime data of the tree was lost, e.g. after loading it.
pub fn tag_missing_runtime_data(tree: &mut NodeTree) {
    tree.add_tree_tag(ChangedFlag::ALL);
}

/// The tree's inputs or outputs changed.
pub fn tag_interface(tree: &mut NodeTree) {
    tree.add_tree_tag(ChangedFlag::INTERFACE);
}
