//! Node Tree
//!
//! The mutable graph: nodes and links in insertion order, the boundary
//! interface and the runtime state maintained by the updater.
//!
//! # Editing
//!
//! Every editing method tags what it changed (see [`crate::update::tag`]),
//! which also marks the topology cache dirty. Callers that change state the
//! tree cannot observe (a property stored outside the tree, say) call the
//! tag functions directly.
//!
//! # Queries
//!
//! Derived indices live in the [`TopologyCache`] returned by
//! [`NodeTree::ensure_topology_cache`]. Node indices in the cache are
//! positions in the tree's node order, so [`NodeTree::node_at`] and
//! [`NodeTree::socket_at`] map cache indices back to the stored data.

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;

use super::ids::{IdRef, LinkId, NodeId, SocketId, TreeId};
use super::interface::{GroupSnapshots, TreeInterface};
use super::link::Link;
use super::node::{InOut, Node, Socket};
use crate::error::{NodeTreeError, Result};
use crate::field::FieldInferencingInterface;
use crate::runtime::{CacheMutex, TopologyCache};
use crate::types::{
    DeclareContext, NodeDeclaration, NodeKind, NodeTypeRegistry, SocketDeclaration, SocketType,
    TreeKind, TreeType,
};
use crate::update::{tag, ChangedFlag};

/// A driver animating a property of the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Driver {
    pub data_path: String,
    pub expression: String,
}

/// Preview image of a node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePreview {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// State owned by the updater. Never part of the user-facing data.
#[derive(Debug)]
pub struct TreeRuntime {
    pub(crate) changed: ChangedFlag,
    pub(crate) topology: CacheMutex<TopologyCache>,
    pub(crate) parallel_topology: bool,
    pub(crate) output_topology_hash: u64,
    pub(crate) field_inferencing_interface: Option<FieldInferencingInterface>,
    pub(crate) contains_output: bool,
    pub(crate) previews: IndexMap<NodeId, NodePreview>,
}

impl Default for TreeRuntime {
    fn default() -> Self {
        Self {
            changed: ChangedFlag::NOTHING,
            topology: CacheMutex::new(),
            parallel_topology: true,
            output_topology_hash: 0,
            field_inferencing_interface: None,
            contains_output: false,
            previews: IndexMap::new(),
        }
    }
}

/// A node tree.
#[derive(Debug)]
pub struct NodeTree {
    pub(crate) id: TreeId,
    pub(crate) name: String,
    pub(crate) tree_type: Arc<dyn TreeType>,
    pub(crate) registry: Arc<NodeTypeRegistry>,
    pub(crate) nodes: IndexMap<NodeId, Node>,
    pub(crate) links: IndexMap<LinkId, Link>,
    pub(crate) interface: TreeInterface,
    pub(crate) drivers: Vec<Driver>,
    pub(crate) runtime: TreeRuntime,
    socket_owners: HashMap<SocketId, (NodeId, InOut)>,
    next_node_id: u32,
    next_socket_id: u32,
    next_link_id: u32,
}

impl NodeTree {
    /// Create an empty tree. New trees are fully tagged.
    pub fn new(
        name: impl Into<String>,
        tree_type: Arc<dyn TreeType>,
        registry: Arc<NodeTypeRegistry>,
    ) -> Self {
        let mut tree = Self {
            id: TreeId::from(0),
            name: name.into(),
            tree_type,
            registry,
            nodes: IndexMap::new(),
            links: IndexMap::new(),
            interface: TreeInterface::default(),
            drivers: Vec::new(),
            runtime: TreeRuntime::default(),
            socket_owners: HashMap::new(),
            next_node_id: 0,
            next_socket_id: 0,
            next_link_id: 0,
        };
        tag::tag_all(&mut tree);
        tree
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tree_type(&self) -> &Arc<dyn TreeType> {
        &self.tree_type
    }

    pub fn kind(&self) -> TreeKind {
        self.tree_type.kind()
    }

    pub fn registry(&self) -> &Arc<NodeTypeRegistry> {
        &self.registry
    }

    pub fn interface(&self) -> &TreeInterface {
        &self.interface
    }

    pub fn drivers(&self) -> &[Driver] {
        &self.drivers
    }

    pub fn changed_flag(&self) -> ChangedFlag {
        self.runtime.changed
    }

    /// Hash of the topology the tree's outputs depend on, as of the last update.
    pub fn output_topology_hash(&self) -> u64 {
        self.runtime.output_topology_hash
    }

    pub fn field_inferencing_interface(&self) -> Option<&FieldInferencingInterface> {
        self.runtime.field_inferencing_interface.as_ref()
    }

    /// Whether the tree has an output node, directly or in a nested group.
    pub fn contains_output(&self) -> bool {
        self.runtime.contains_output
    }

    pub fn set_parallel_topology(&mut self, parallel: bool) {
        self.runtime.parallel_topology = parallel;
    }

    // ---- Topology ----

    /// Rebuild the topology cache if it is dirty and return it.
    pub fn ensure_topology_cache(&self) -> Arc<TopologyCache> {
        self.runtime
            .topology
            .get_or_compute(|| TopologyCache::build(self, self.runtime.parallel_topology))
    }

    pub fn is_topology_cache_dirty(&self) -> bool {
        self.runtime.topology.is_dirty()
    }

    /// Node at a cache node index.
    pub fn node_at(&self, index: usize) -> Option<&Node> {
        self.nodes.get_index(index).map(|(_, node)| node)
    }

    pub(crate) fn node_at_mut(&mut self, index: usize) -> Option<&mut Node> {
        self.nodes.get_index_mut(index).map(|(_, node)| node)
    }

    /// Socket at a cache socket index.
    pub fn socket_at(&self, cache: &TopologyCache, index: usize) -> Option<&Socket> {
        let cached = cache.sockets().get(index)?;
        self.node_at(cached.node)?
            .sockets(cached.in_out)
            .get(cached.index_in_node)
    }

    pub(crate) fn socket_at_mut(
        &mut self,
        cache: &TopologyCache,
        index: usize,
    ) -> Option<&mut Socket> {
        let cached = cache.sockets().get(index)?;
        self.node_at_mut(cached.node)?
            .sockets_mut(cached.in_out)
            .get_mut(cached.index_in_node)
    }

    // ---- Lookup ----

    /// Nodes in tree order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(&id)
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    /// A socket of any node.
    pub fn socket(&self, id: SocketId) -> Option<&Socket> {
        let (node, in_out) = *self.socket_owners.get(&id)?;
        self.nodes
            .get(&node)?
            .sockets(in_out)
            .iter()
            .find(|socket| socket.id == id)
    }

    pub(crate) fn socket_mut(&mut self, id: SocketId) -> Option<&mut Socket> {
        let (node, in_out) = *self.socket_owners.get(&id)?;
        self.nodes
            .get_mut(&node)?
            .sockets_mut(in_out)
            .iter_mut()
            .find(|socket| socket.id == id)
    }

    /// Find a socket of a node by identifier.
    pub fn find_socket(&self, node: NodeId, in_out: InOut, identifier: &str) -> Result<SocketId> {
        let node_ref = self.node(node).ok_or(NodeTreeError::NodeNotFound(node))?;
        node_ref
            .sockets(in_out)
            .iter()
            .find(|socket| socket.identifier == identifier)
            .map(|socket| socket.id)
            .ok_or_else(|| NodeTreeError::SocketIdentifierNotFound {
                node,
                in_out: in_out.as_str(),
                identifier: identifier.to_string(),
            })
    }

    pub fn find_input(&self, node: NodeId, identifier: &str) -> Result<SocketId> {
        self.find_socket(node, InOut::In, identifier)
    }

    pub fn find_output(&self, node: NodeId, identifier: &str) -> Result<SocketId> {
        self.find_socket(node, InOut::Out, identifier)
    }

    /// Links attached to a socket, in link order.
    pub fn links_on_socket(&self, socket: SocketId) -> Vec<LinkId> {
        self.links
            .values()
            .filter(|link| link.from_socket == socket || link.to_socket == socket)
            .map(|link| link.id)
            .collect()
    }

    pub fn preview(&self, node: NodeId) -> Option<&NodePreview> {
        self.runtime.previews.get(&node)
    }

    pub fn preview_count(&self) -> usize {
        self.runtime.previews.len()
    }

    // ---- Nodes ----

    /// Add a node of a registered type. Unknown idnames produce an undefined
    /// node without sockets.
    pub fn add_node(&mut self, idname: &str) -> NodeId {
        let node_type = self.registry.resolve(idname);
        let id = NodeId::from(self.next_node_id);
        self.next_node_id += 1;
        let name = self.unique_node_name(node_type.idname());
        self.nodes.insert(id, Node::new(id, name, node_type));
        self.sync_node_sockets(id, &GroupSnapshots::default());
        tag::tag_node_new(self, id);
        id
    }

    fn unique_node_name(&self, base: &str) -> String {
        let taken = |name: &str| self.nodes.values().any(|node| node.name == name);
        if !taken(base) {
            return base.to_string();
        }
        (1u32..)
            .map(|i| format!("{base}.{i:03}"))
            .find(|name| !taken(name))
            .unwrap_or_else(|| base.to_string())
    }

    /// Remove a node together with its links.
    pub fn remove_node(&mut self, id: NodeId) -> Result<()> {
        let node = self
            .nodes
            .shift_remove(&id)
            .ok_or(NodeTreeError::NodeNotFound(id))?;
        for socket in node.inputs.iter().chain(&node.outputs) {
            self.socket_owners.remove(&socket.id);
        }
        let links_before = self.links.len();
        self.links
            .retain(|_, link| link.from_node != id && link.to_node != id);
        if self.links.len() != links_before {
            tag::tag_link_removed(self);
        }
        self.runtime.previews.shift_remove(&id);
        tag::tag_node_removed(self);
        Ok(())
    }

    /// Move a node to another position in the node order.
    pub fn reorder_node(&mut self, id: NodeId, new_index: usize) -> Result<()> {
        let index = self
            .nodes
            .get_index_of(&id)
            .ok_or(NodeTreeError::NodeNotFound(id))?;
        let new_index = new_index.min(self.nodes.len().saturating_sub(1));
        if index != new_index {
            self.nodes.move_index(index, new_index);
            tag::tag_node_reordered(self);
        }
        Ok(())
    }

    /// Mute or unmute a node.
    pub fn set_node_muted(&mut self, id: NodeId, muted: bool) -> Result<()> {
        let node = self.node_mut(id).ok_or(NodeTreeError::NodeNotFound(id))?;
        if node.muted != muted {
            node.muted = muted;
            tag::tag_node_mute(self, id);
        }
        Ok(())
    }

    /// Point a group node at another tree and rebuild its sockets from the
    /// snapshot of that tree.
    pub fn set_node_group(
        &mut self,
        id: NodeId,
        group: Option<TreeId>,
        groups: &GroupSnapshots,
    ) -> Result<()> {
        let node = self.node_mut(id).ok_or(NodeTreeError::NodeNotFound(id))?;
        node.group = group;
        if group.is_some() {
            node.id_ref = group.map(IdRef::Tree);
        }
        self.redeclare_node(id, groups)?;
        tag::tag_node_property(self, id);
        Ok(())
    }

    pub fn set_node_id_ref(&mut self, id: NodeId, id_ref: Option<IdRef>) -> Result<()> {
        let node = self.node_mut(id).ok_or(NodeTreeError::NodeNotFound(id))?;
        node.id_ref = id_ref;
        tag::tag_node_property(self, id);
        Ok(())
    }

    /// Make an output node the one that is used among nodes of its type.
    pub fn set_active_output(&mut self, id: NodeId) -> Result<()> {
        let idname = self
            .node(id)
            .ok_or(NodeTreeError::NodeNotFound(id))?
            .idname()
            .to_string();
        for node in self.nodes.values_mut() {
            if node.is_output_node() && node.idname() == idname {
                node.is_active_output = node.id == id;
            }
        }
        tag::tag_active_output_changed(self);
        Ok(())
    }

    pub fn set_node_show_preview(&mut self, id: NodeId, show: bool) -> Result<()> {
        let node = self.node_mut(id).ok_or(NodeTreeError::NodeNotFound(id))?;
        node.show_preview = show;
        Ok(())
    }

    /// Get the preview buffer of a node, (re)allocating it for the given size.
    pub fn ensure_preview(&mut self, id: NodeId, width: u32, height: u32) -> Result<&mut NodePreview> {
        if !self.nodes.contains_key(&id) {
            return Err(NodeTreeError::NodeNotFound(id));
        }
        let preview = self.runtime.previews.entry(id).or_insert_with(|| NodePreview {
            width: 0,
            height: 0,
            pixels: Vec::new(),
        });
        if preview.width != width || preview.height != height {
            preview.width = width;
            preview.height = height;
            preview.pixels = vec![0; width as usize * height as usize * 4];
        }
        Ok(preview)
    }

    /// Drop previews of nodes that are gone or no longer show one.
    pub(crate) fn remove_unused_previews(&mut self) {
        let nodes = &self.nodes;
        self.runtime
            .previews
            .retain(|id, _| nodes.get(id).is_some_and(|node| node.show_preview));
    }

    // ---- Sockets ----

    /// Add a socket that is not part of the node's declaration. Only useful
    /// for undefined nodes, whose sockets are never re-declared.
    pub fn add_socket(
        &mut self,
        node: NodeId,
        in_out: InOut,
        name: &str,
        socket_type: SocketType,
    ) -> Result<SocketId> {
        let id = SocketId::from(self.next_socket_id);
        let node_ref = self
            .nodes
            .get_mut(&node)
            .ok_or(NodeTreeError::NodeNotFound(node))?;
        self.next_socket_id += 1;
        let decl = SocketDeclaration::new(name, socket_type);
        node_ref
            .sockets_mut(in_out)
            .push(Socket::from_declaration(id, node, in_out, &decl));
        self.socket_owners.insert(id, (node, in_out));
        tag::tag_socket_new(self, id);
        Ok(id)
    }

    /// Show or hide a socket. Hidden sockets are skipped by the updates.
    pub fn set_socket_available(&mut self, id: SocketId, available: bool) -> Result<()> {
        let socket = self
            .socket_mut(id)
            .ok_or(NodeTreeError::SocketNotFound(id))?;
        if socket.available != available {
            socket.available = available;
            tag::tag_socket_availability(self, id);
        }
        Ok(())
    }

    pub(crate) fn set_socket_type(&mut self, id: SocketId, socket_type: SocketType) {
        let Some(socket) = self.socket_mut(id) else {
            return;
        };
        if socket.socket_type != socket_type {
            socket.socket_type = socket_type;
            tag::tag_socket_type(self, id);
        }
    }

    /// Re-run the node type's declaration and synchronize the sockets.
    ///
    /// Reroutes and undefined nodes keep their sockets. Returns whether
    /// anything changed.
    pub fn redeclare_node(&mut self, id: NodeId, groups: &GroupSnapshots) -> Result<bool> {
        let kind = self.node(id).ok_or(NodeTreeError::NodeNotFound(id))?.kind();
        if matches!(kind, NodeKind::Reroute | NodeKind::Undefined) {
            return Ok(false);
        }
        Ok(self.sync_node_sockets(id, groups))
    }

    fn declaration(&self, node: &Node, groups: &GroupSnapshots) -> NodeDeclaration {
        let group = node.group.and_then(|tree| groups.get(tree));
        node.node_type.declare(&DeclareContext {
            interface: &self.interface,
            group,
        })
    }

    /// Match the sockets of a node against its declaration.
    ///
    /// Sockets are matched by identifier and keep their id. New sockets are
    /// tagged as new, sockets whose properties changed as changed, and stale
    /// sockets are removed together with their links.
    fn sync_node_sockets(&mut self, id: NodeId, groups: &GroupSnapshots) -> bool {
        let Some(node) = self.nodes.get(&id) else {
            return false;
        };
        let decl = self.declaration(node, groups);

        let mut added = Vec::new();
        let mut modified = Vec::new();
        let mut removed = Vec::new();
        let mut reordered = false;
        {
            let Some(node) = self.nodes.get_mut(&id) else {
                return false;
            };
            if node.is_function_node != decl.is_function_node {
                node.is_function_node = decl.is_function_node;
                reordered = true;
            }
            for (in_out, decls) in [(InOut::In, &decl.inputs), (InOut::Out, &decl.outputs)] {
                let mut old = std::mem::take(node.sockets_mut(in_out));
                let old_order: Vec<SocketId> = old.iter().map(|socket| socket.id).collect();
                let mut sockets = Vec::with_capacity(decls.len());
                for socket_decl in decls {
                    match old
                        .iter()
                        .position(|socket| socket.identifier == socket_decl.identifier)
                    {
                        Some(pos) => {
                            let mut socket = old.remove(pos);
                            if socket.apply_declaration(socket_decl) {
                                modified.push(socket.id);
                            }
                            sockets.push(socket);
                        }
                        None => {
                            let socket_id = SocketId::from(self.next_socket_id);
                            self.next_socket_id += 1;
                            sockets.push(Socket::from_declaration(socket_id, id, in_out, socket_decl));
                            added.push((socket_id, in_out));
                        }
                    }
                }
                let kept_in_order = sockets
                    .iter()
                    .map(|socket| socket.id)
                    .filter(|socket_id| old_order.contains(socket_id));
                if !kept_in_order.eq(old_order.iter().copied().filter(|socket_id| {
                    !old.iter().any(|stale| stale.id == *socket_id)
                })) {
                    reordered = true;
                }
                removed.extend(old.iter().map(|socket| socket.id));
                *node.sockets_mut(in_out) = sockets;
            }
            node.internal_links
                .retain(|link| !removed.contains(&link.from) && !removed.contains(&link.to));
        }

        for &(socket_id, in_out) in &added {
            self.socket_owners.insert(socket_id, (id, in_out));
            tag::tag_socket_new(self, socket_id);
        }
        for &socket_id in &modified {
            tag::tag_socket_property(self, socket_id);
        }
        if !removed.is_empty() {
            for socket_id in &removed {
                self.socket_owners.remove(socket_id);
            }
            let links_before = self.links.len();
            self.links.retain(|_, link| {
                !removed.contains(&link.from_socket) && !removed.contains(&link.to_socket)
            });
            if self.links.len() != links_before {
                tag::tag_link_removed(self);
            }
            tag::tag_socket_removed(self);
        }
        if reordered && added.is_empty() && modified.is_empty() && removed.is_empty() {
            tag::tag_node_property(self, id);
        }
        reordered || !added.is_empty() || !modified.is_empty() || !removed.is_empty()
    }

    // ---- Links ----

    /// Link an output socket to an input socket.
    pub fn add_link(&mut self, from: SocketId, to: SocketId) -> Result<LinkId> {
        let (from_node, from_dir) = *self
            .socket_owners
            .get(&from)
            .ok_or(NodeTreeError::SocketNotFound(from))?;
        let (to_node, to_dir) = *self
            .socket_owners
            .get(&to)
            .ok_or(NodeTreeError::SocketNotFound(to))?;
        if from_dir != InOut::Out || to_dir != InOut::In {
            return Err(NodeTreeError::InvalidLinkDirection);
        }
        let multi_input_sort_id = self
            .links
            .values()
            .filter(|link| link.to_socket == to)
            .map(|link| link.multi_input_sort_id + 1)
            .max()
            .unwrap_or(0);

        let id = LinkId::from(self.next_link_id);
        self.next_link_id += 1;
        self.links.insert(
            id,
            Link {
                id,
                from_node,
                from_socket: from,
                to_node,
                to_socket: to,
                muted: false,
                multi_input_sort_id,
                valid: true,
            },
        );
        tag::tag_link_added(self, id);
        Ok(id)
    }

    /// Remove a single link.
    pub fn remove_link(&mut self, id: LinkId) -> Result<()> {
        self.links
            .shift_remove(&id)
            .ok_or(NodeTreeError::LinkNotFound(id))?;
        tag::tag_link_removed(self);
        Ok(())
    }

    /// Move one end of a link to another socket of the same direction.
    pub fn relink(&mut self, id: LinkId, side: InOut, socket: SocketId) -> Result<()> {
        let (node, dir) = *self
            .socket_owners
            .get(&socket)
            .ok_or(NodeTreeError::SocketNotFound(socket))?;
        if dir != side {
            return Err(NodeTreeError::InvalidLinkDirection);
        }
        let link = self
            .links
            .get_mut(&id)
            .ok_or(NodeTreeError::LinkNotFound(id))?;
        match side {
            InOut::Out => {
                link.from_node = node;
                link.from_socket = socket;
            }
            InOut::In => {
                link.to_node = node;
                link.to_socket = socket;
            }
        }
        tag::tag_link_changed(self);
        Ok(())
    }

    /// Mute or unmute a link.
    pub fn set_link_muted(&mut self, id: LinkId, muted: bool) -> Result<()> {
        let link = self
            .links
            .get_mut(&id)
            .ok_or(NodeTreeError::LinkNotFound(id))?;
        if link.muted != muted {
            link.muted = muted;
            tag::tag_link_mute(self, id);
        }
        Ok(())
    }

    /// Set the order of a link among the links of a multi-input socket.
    pub fn set_link_sort_id(&mut self, id: LinkId, sort_id: i32) -> Result<()> {
        let link = self
            .links
            .get_mut(&id)
            .ok_or(NodeTreeError::LinkNotFound(id))?;
        link.multi_input_sort_id = sort_id;
        tag::tag_link_changed(self);
        Ok(())
    }

    // ---- Interface ----

    /// Add a tree input. Returns the new socket's identifier.
    pub fn interface_add_input(&mut self, name: impl Into<String>, socket_type: SocketType) -> String {
        let identifier = self.interface.add_input(name, socket_type);
        tag::tag_interface(self);
        identifier
    }

    /// Add a tree output. Returns the new socket's identifier.
    pub fn interface_add_output(&mut self, name: impl Into<String>, socket_type: SocketType) -> String {
        let identifier = self.interface.add_output(name, socket_type);
        tag::tag_interface(self);
        identifier
    }

    /// Remove a tree input. Returns false if it didn't exist.
    pub fn interface_remove_input(&mut self, identifier: &str) -> bool {
        let removed = self.interface.remove_input(identifier);
        if removed {
            tag::tag_interface(self);
        }
        removed
    }

    pub fn interface_remove_output(&mut self, identifier: &str) -> bool {
        let removed = self.interface.remove_output(identifier);
        if removed {
            tag::tag_interface(self);
        }
        removed
    }

    // ---- Drivers ----

    /// Animate a property of the tree with an expression.
    pub fn add_driver(&mut self, data_path: impl Into<String>, expression: impl Into<String>) {
        self.drivers.push(Driver {
            data_path: data_path.into(),
            expression: expression.into(),
        });
    }

    pub fn clear_drivers(&mut self) {
        self.drivers.clear();
    }

    // ---- Generic structural updates ----

    /// Make sure exactly one output node of every output type is active.
    ///
    /// An active node stays active; when there is none the first one in node
    /// order is activated.
    pub fn set_active_outputs(&mut self) {
        let mut first: HashMap<String, NodeId> = HashMap::new();
        let mut active: HashMap<String, NodeId> = HashMap::new();
        for node in self.nodes.values().filter(|node| node.is_output_node()) {
            first.entry(node.idname().to_string()).or_insert(node.id);
            if node.is_active_output {
                active.entry(node.idname().to_string()).or_insert(node.id);
            }
        }

        let mut changed = false;
        for node in self.nodes.values_mut().filter(|node| node.is_output_node()) {
            let chosen = active.get(node.idname()).or_else(|| first.get(node.idname()));
            let is_active = chosen == Some(&node.id);
            if node.is_active_output != is_active {
                node.is_active_output = is_active;
                changed = true;
            }
        }
        if changed {
            // The designated group output is part of the topology cache.
            self.runtime.topology.tag_dirty();
        }
    }

    /// Give reroutes the type of the socket they forward.
    ///
    /// A reroute takes the type of its origin, or of its first target when it
    /// has no origin. Chains of reroutes are resolved from left to right.
    pub fn update_reroute_types(&mut self) {
        let cache = self.ensure_topology_cache();
        let mut types: HashMap<usize, SocketType> = HashMap::new();
        for &node_index in cache.toposort_left_to_right() {
            let node = &cache.nodes()[node_index];
            if node.kind != NodeKind::Reroute || node.inputs.is_empty() || node.outputs.is_empty() {
                continue;
            }
            let from_type = cache
                .directly_linked_sockets(node.inputs.start)
                .first()
                .and_then(|&origin| {
                    let origin_node = cache.sockets()[origin].node;
                    match types.get(&origin_node) {
                        Some(socket_type) => Some(*socket_type),
                        None if cache.nodes()[origin_node].kind == NodeKind::Reroute => None,
                        None => Some(cache.sockets()[origin].socket_type),
                    }
                });
            let to_type = || {
                cache
                    .directly_linked_sockets(node.outputs.start)
                    .iter()
                    .find(|&&target| {
                        cache.nodes()[cache.sockets()[target].node].kind != NodeKind::Reroute
                    })
                    .map(|&target| cache.sockets()[target].socket_type)
            };
            if let Some(socket_type) = from_type.or_else(to_type) {
                types.insert(node_index, socket_type);
            }
        }

        for (node_index, socket_type) in types {
            let Some(node) = self.node_at(node_index) else {
                continue;
            };
            let sockets: Vec<SocketId> = node
                .inputs
                .iter()
                .chain(&node.outputs)
                .map(|socket| socket.id)
                .collect();
            for socket in sockets {
                self.set_socket_type(socket, socket_type);
            }
        }
    }
}
