//! Topology Cache
//!
//! Flat indices over a node tree, rebuilt from scratch whenever the tree was
//! tagged.
//!
//! # Layout
//!
//! - Nodes are indexed by their position in the tree's node order.
//! - Sockets are stored node by node, inputs before outputs, so the sockets
//!   of one node form two contiguous ranges.
//! - Links are indexed by their position in the tree's link order.
//!
//! # Rebuild
//!
//! 1. Node list, remembering whether any node type is undefined.
//! 2. Link list.
//! 3. Socket lists with their index in the node, direction and tree.
//! 4. The internal link source of every output.
//! 5. Direct adjacency. Links into multi-input sockets are ordered by their
//!    sort id, highest first.
//! 6. Logical origins, nodes by type, identifier lookup and both
//!    topological orders. These only read the results of steps 1 to 5 and run
//!    in parallel.
//! 7. The designated group output node.

use std::collections::HashMap;
use std::ops::Range;

use rayon::prelude::*;
use smallvec::SmallVec;

use super::origins::find_all_logical_origins;
use super::toposort::{toposort, ToposortDirection};
use crate::tree::{InOut, LinkId, NodeId, NodeTree, SocketId};
use crate::types::{NodeKind, SocketType};

/// Cached data of one node.
#[derive(Debug, Clone)]
pub struct CachedNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub idname: String,
    pub muted: bool,
    pub is_active_output: bool,
    /// Socket indices of the inputs.
    pub inputs: Range<usize>,
    /// Socket indices of the outputs.
    pub outputs: Range<usize>,
    pub has_available_linked_inputs: bool,
    pub has_available_linked_outputs: bool,
}

/// Cached data of one socket.
#[derive(Debug, Clone)]
pub struct CachedSocket {
    pub id: SocketId,
    pub identifier: String,
    /// Index of the owning node.
    pub node: usize,
    pub in_out: InOut,
    pub index_in_node: usize,
    /// Index in [`TopologyCache::input_sockets`] or
    /// [`TopologyCache::output_sockets`].
    pub index_in_direction: usize,
    pub socket_type: SocketType,
    pub available: bool,
    pub is_multi_input: bool,
    /// For outputs: the input passed through when the node is muted.
    pub internal_link_input: Option<usize>,
}

/// Cached data of one link.
#[derive(Debug, Clone)]
pub struct CachedLink {
    pub id: LinkId,
    pub from_node: usize,
    pub from_socket: usize,
    pub to_node: usize,
    pub to_socket: usize,
    pub muted: bool,
    /// Both sockets are available.
    pub available: bool,
    pub multi_input_sort_id: i32,
}

impl CachedLink {
    /// Whether the link passes a value at all.
    pub fn is_used(&self) -> bool {
        !self.muted && self.available
    }
}

/// Where the value of an input socket comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogicalOrigins {
    pub origins: SmallVec<[usize; 2]>,
    /// Reroute and muted-node sockets walked through on the way.
    pub skipped: SmallVec<[usize; 2]>,
}

#[derive(Debug, Clone, Default)]
struct IdentifierLookup {
    inputs: HashMap<String, usize>,
    outputs: HashMap<String, usize>,
}

/// Derived indices of a node tree.
#[derive(Debug, Default)]
pub struct TopologyCache {
    nodes: Vec<CachedNode>,
    node_index: HashMap<NodeId, usize>,
    links: Vec<CachedLink>,
    link_index: HashMap<LinkId, usize>,
    sockets: Vec<CachedSocket>,
    socket_index: HashMap<SocketId, usize>,
    input_sockets: Vec<usize>,
    output_sockets: Vec<usize>,
    directly_linked_links: Vec<SmallVec<[usize; 1]>>,
    directly_linked_sockets: Vec<SmallVec<[usize; 1]>>,
    logical_origins: Vec<LogicalOrigins>,
    nodes_by_type: HashMap<String, Vec<usize>>,
    identifier_lookup: Vec<IdentifierLookup>,
    toposort_left_to_right: Vec<usize>,
    toposort_right_to_left: Vec<usize>,
    has_link_cycle: bool,
    group_output_node: Option<usize>,
    has_undefined_nodes_or_sockets: bool,
}

impl TopologyCache {
    /// Build all indices of a tree.
    ///
    /// The parallel passes only fan out when the calling thread is not
    /// already a rayon worker, so a rebuild never picks up unrelated tasks
    /// of an enclosing parallel loop while it holds the cache lock.
    pub fn build(tree: &NodeTree, parallel: bool) -> Self {
        let mut cache = TopologyCache::default();
        cache.build_nodes(tree);
        let links: Vec<_> = tree.links().collect();
        cache.build_sockets(tree);
        cache.build_internal_links(tree);
        cache.build_links_and_adjacency(&links);

        let parallel = parallel && rayon::current_thread_index().is_none();
        let ((logical_origins, nodes_by_type), (identifier_lookup, (left_to_right, right_to_left))) =
            if parallel {
                rayon::join(
                    || {
                        rayon::join(
                            || find_all_logical_origins(&cache, true),
                            || cache.build_nodes_by_type(),
                        )
                    },
                    || {
                        rayon::join(
                            || cache.build_identifier_lookup(true),
                            || {
                                rayon::join(
                                    || toposort(&cache, ToposortDirection::LeftToRight),
                                    || toposort(&cache, ToposortDirection::RightToLeft),
                                )
                            },
                        )
                    },
                )
            } else {
                (
                    (
                        find_all_logical_origins(&cache, false),
                        cache.build_nodes_by_type(),
                    ),
                    (
                        cache.build_identifier_lookup(false),
                        (
                            toposort(&cache, ToposortDirection::LeftToRight),
                            toposort(&cache, ToposortDirection::RightToLeft),
                        ),
                    ),
                )
            };
        cache.logical_origins = logical_origins;
        cache.nodes_by_type = nodes_by_type;
        cache.identifier_lookup = identifier_lookup;
        cache.has_link_cycle = left_to_right.1 || right_to_left.1;
        cache.toposort_left_to_right = left_to_right.0;
        cache.toposort_right_to_left = right_to_left.0;

        cache.group_output_node = cache.find_group_output_node();

        tracing::debug!(
            tree = tree.name(),
            nodes = cache.nodes.len(),
            links = cache.links.len(),
            sockets = cache.sockets.len(),
            has_link_cycle = cache.has_link_cycle,
            "rebuilt topology cache"
        );
        cache
    }

    fn build_nodes(&mut self, tree: &NodeTree) {
        for (index, node) in tree.nodes().enumerate() {
            self.has_undefined_nodes_or_sockets |= node.is_undefined();
            self.node_index.insert(node.id(), index);
            self.nodes.push(CachedNode {
                id: node.id(),
                kind: node.kind(),
                idname: node.idname().to_string(),
                muted: node.is_muted(),
                is_active_output: node.is_active_output(),
                inputs: 0..0,
                outputs: 0..0,
                has_available_linked_inputs: false,
                has_available_linked_outputs: false,
            });
        }
    }

    fn build_sockets(&mut self, tree: &NodeTree) {
        for (node_index, node) in tree.nodes().enumerate() {
            for in_out in [InOut::In, InOut::Out] {
                let start = self.sockets.len();
                for (index_in_node, socket) in node.sockets(in_out).iter().enumerate() {
                    let index = self.sockets.len();
                    let by_direction = match in_out {
                        InOut::In => &mut self.input_sockets,
                        InOut::Out => &mut self.output_sockets,
                    };
                    let index_in_direction = by_direction.len();
                    by_direction.push(index);
                    self.has_undefined_nodes_or_sockets |= socket.socket_type().is_undefined();
                    self.socket_index.insert(socket.id(), index);
                    self.sockets.push(CachedSocket {
                        id: socket.id(),
                        identifier: socket.identifier().to_string(),
                        node: node_index,
                        in_out,
                        index_in_node,
                        index_in_direction,
                        socket_type: socket.socket_type(),
                        available: socket.is_available(),
                        is_multi_input: socket.is_multi_input(),
                        internal_link_input: None,
                    });
                }
                let range = start..self.sockets.len();
                match in_out {
                    InOut::In => self.nodes[node_index].inputs = range,
                    InOut::Out => self.nodes[node_index].outputs = range,
                }
            }
        }
    }

    fn build_internal_links(&mut self, tree: &NodeTree) {
        for node in tree.nodes() {
            for internal_link in node.internal_links() {
                let (Some(&from), Some(&to)) = (
                    self.socket_index.get(&internal_link.from),
                    self.socket_index.get(&internal_link.to),
                ) else {
                    continue;
                };
                self.sockets[to].internal_link_input = Some(from);
            }
        }
    }

    fn build_links_and_adjacency(&mut self, links: &[&crate::tree::Link]) {
        self.directly_linked_links = vec![SmallVec::new(); self.sockets.len()];
        self.directly_linked_sockets = vec![SmallVec::new(); self.sockets.len()];

        for link in links {
            let (Some(&from_socket), Some(&to_socket)) = (
                self.socket_index.get(&link.from_socket()),
                self.socket_index.get(&link.to_socket()),
            ) else {
                continue;
            };
            let from_node = self.sockets[from_socket].node;
            let to_node = self.sockets[to_socket].node;
            let available = self.sockets[from_socket].available && self.sockets[to_socket].available;
            let index = self.links.len();
            self.link_index.insert(link.id(), index);
            self.links.push(CachedLink {
                id: link.id(),
                from_node,
                from_socket,
                to_node,
                to_socket,
                muted: link.is_muted(),
                available,
                multi_input_sort_id: link.multi_input_sort_id(),
            });

            self.directly_linked_links[from_socket].push(index);
            self.directly_linked_links[to_socket].push(index);
            if available {
                self.nodes[from_node].has_available_linked_outputs = true;
                self.nodes[to_node].has_available_linked_inputs = true;
            }
        }

        for &input in &self.input_sockets {
            if self.sockets[input].is_multi_input {
                let links = &self.links;
                self.directly_linked_links[input].sort_by(|&a, &b| {
                    links[b].multi_input_sort_id.cmp(&links[a].multi_input_sort_id)
                });
            }
        }

        for (socket, links) in self.directly_linked_links.iter().enumerate() {
            let is_input = self.sockets[socket].in_out == InOut::In;
            self.directly_linked_sockets[socket] = links
                .iter()
                .map(|&link| {
                    let link = &self.links[link];
                    if is_input {
                        link.from_socket
                    } else {
                        link.to_socket
                    }
                })
                .collect();
        }
    }

    fn build_nodes_by_type(&self) -> HashMap<String, Vec<usize>> {
        let mut by_type: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, node) in self.nodes.iter().enumerate() {
            by_type.entry(node.idname.clone()).or_default().push(index);
        }
        by_type
    }

    fn build_identifier_lookup(&self, parallel: bool) -> Vec<IdentifierLookup> {
        let build = |node: &CachedNode| IdentifierLookup {
            inputs: node
                .inputs
                .clone()
                .map(|socket| (self.sockets[socket].identifier.clone(), socket))
                .collect(),
            outputs: node
                .outputs
                .clone()
                .map(|socket| (self.sockets[socket].identifier.clone(), socket))
                .collect(),
        };
        if parallel {
            self.nodes.par_iter().map(build).collect()
        } else {
            self.nodes.iter().map(build).collect()
        }
    }

    fn find_group_output_node(&self) -> Option<usize> {
        let mut group_outputs = self
            .nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.kind == NodeKind::GroupOutput);
        let first = group_outputs.next()?;
        let mut rest = group_outputs.peekable();
        if rest.peek().is_none() {
            return Some(first.0);
        }
        std::iter::once(first)
            .chain(rest)
            .find(|(_, node)| node.is_active_output)
            .map(|(index, _)| index)
    }

    // ---- Queries ----

    /// Nodes in tree order.
    pub fn nodes(&self) -> &[CachedNode] {
        &self.nodes
    }

    /// Cache index of a node.
    pub fn node_index(&self, id: NodeId) -> Option<usize> {
        self.node_index.get(&id).copied()
    }

    /// Links in tree order.
    pub fn links(&self) -> &[CachedLink] {
        &self.links
    }

    /// Cache index of a link.
    pub fn link_index(&self, id: LinkId) -> Option<usize> {
        self.link_index.get(&id).copied()
    }

    /// All sockets, node by node, inputs first.
    pub fn sockets(&self) -> &[CachedSocket] {
        &self.sockets
    }

    /// Cache index of a socket.
    pub fn socket_index(&self, id: SocketId) -> Option<usize> {
        self.socket_index.get(&id).copied()
    }

    /// Socket indices of all inputs.
    pub fn input_sockets(&self) -> &[usize] {
        &self.input_sockets
    }

    /// Socket indices of all outputs.
    pub fn output_sockets(&self) -> &[usize] {
        &self.output_sockets
    }

    /// Link indices attached to a socket. Multi-input links are sorted.
    pub fn directly_linked_links(&self, socket: usize) -> &[usize] {
        &self.directly_linked_links[socket]
    }

    /// Sockets on the other end of [`TopologyCache::directly_linked_links`].
    pub fn directly_linked_sockets(&self, socket: usize) -> &[usize] {
        &self.directly_linked_sockets[socket]
    }

    /// Whether any link, muted or not, is attached to the socket.
    pub fn is_directly_linked(&self, socket: usize) -> bool {
        !self.directly_linked_links[socket].is_empty()
    }

    fn origins_of(&self, socket: usize) -> Option<&LogicalOrigins> {
        let cached = &self.sockets[socket];
        match cached.in_out {
            InOut::In => self.logical_origins.get(cached.index_in_direction),
            InOut::Out => None,
        }
    }

    /// Sockets actually providing the value of an input.
    pub fn logically_linked_sockets(&self, socket: usize) -> &[usize] {
        self.origins_of(socket)
            .map(|origins| origins.origins.as_slice())
            .unwrap_or(&[])
    }

    /// Reroute and muted sockets between an input and its logical origins.
    pub fn logically_linked_skipped_sockets(&self, socket: usize) -> &[usize] {
        self.origins_of(socket)
            .map(|origins| origins.skipped.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the input receives a value from another node.
    pub fn is_logically_linked(&self, socket: usize) -> bool {
        !self.logically_linked_sockets(socket).is_empty()
    }

    /// Nodes with the given type idname, in tree order.
    pub fn nodes_by_type(&self, idname: &str) -> &[usize] {
        self.nodes_by_type
            .get(idname)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Input socket of a node by identifier.
    pub fn find_input(&self, node: usize, identifier: &str) -> Option<usize> {
        self.identifier_lookup.get(node)?.inputs.get(identifier).copied()
    }

    /// Output socket of a node by identifier.
    pub fn find_output(&self, node: usize, identifier: &str) -> Option<usize> {
        self.identifier_lookup.get(node)?.outputs.get(identifier).copied()
    }

    /// Nodes ordered so that every node comes after the nodes it depends on.
    pub fn toposort_left_to_right(&self) -> &[usize] {
        &self.toposort_left_to_right
    }

    /// Nodes ordered so that every node comes after its dependents.
    pub fn toposort_right_to_left(&self) -> &[usize] {
        &self.toposort_right_to_left
    }

    /// Whether the links form a cycle. Both toposorts are partial then.
    pub fn has_link_cycle(&self) -> bool {
        self.has_link_cycle
    }

    /// The group output node whose inputs define the tree's outputs.
    pub fn group_output_node(&self) -> Option<usize> {
        self.group_output_node
    }

    /// All group input nodes, in tree order.
    pub fn group_input_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.kind == NodeKind::GroupInput)
            .map(|(index, _)| index)
    }

    /// Whether a node or socket has a type that isn't registered.
    pub fn has_undefined_nodes_or_sockets(&self) -> bool {
        self.has_undefined_nodes_or_sockets
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::{GeometryNodeTree, NodeTypeRegistry};

    fn new_tree() -> NodeTree {
        NodeTree::new(
            "Tree",
            Arc::new(GeometryNodeTree),
            Arc::new(NodeTypeRegistry::with_builtins()),
        )
    }

    fn link(tree: &mut NodeTree, from: NodeId, output: &str, to: NodeId, input: &str) -> LinkId {
        let from = tree.find_output(from, output).unwrap();
        let to = tree.find_input(to, input).unwrap();
        tree.add_link(from, to).unwrap()
    }

    #[test]
    fn sockets_are_indexed_node_by_node() {
        let mut tree = new_tree();
        let a = tree.add_node("FunctionNodeMath");
        let b = tree.add_node("GeometryNodeSetPosition");
        let cache = tree.ensure_topology_cache();

        assert_eq!(cache.nodes().len(), 2);
        assert_eq!(cache.sockets().len(), 3 + 5);
        assert_eq!(cache.input_sockets().len(), 6);
        assert_eq!(cache.output_sockets().len(), 2);

        let b_index = cache.node_index(b).unwrap();
        let offset = cache.find_input(b_index, "Offset").unwrap();
        let socket = &cache.sockets()[offset];
        assert_eq!(socket.index_in_node, 3);
        assert_eq!(socket.index_in_direction, 2 + 3);
        assert_eq!(cache.input_sockets()[socket.index_in_direction], offset);
        assert_eq!(cache.nodes_by_type("FunctionNodeMath"), &[cache.node_index(a).unwrap()]);
        assert!(cache.nodes_by_type("NodeReroute").is_empty());
    }

    #[test]
    fn multi_input_links_are_sorted_by_sort_id() {
        let mut tree = new_tree();
        let join = tree.add_node("GeometryNodeJoinGeometry");
        let mut links = Vec::new();
        for sort_id in [2, 0, 1] {
            let grid = tree.add_node("GeometryNodeMeshGrid");
            let link = link(&mut tree, grid, "Mesh", join, "Geometry");
            tree.set_link_sort_id(link, sort_id).unwrap();
            links.push(link);
        }

        let cache = tree.ensure_topology_cache();
        let input = cache
            .find_input(cache.node_index(join).unwrap(), "Geometry")
            .unwrap();
        let sorted: Vec<i32> = cache
            .directly_linked_links(input)
            .iter()
            .map(|&link| cache.links()[link].multi_input_sort_id)
            .collect();
        assert_eq!(sorted, vec![2, 1, 0]);
        let ids: Vec<LinkId> = cache
            .directly_linked_links(input)
            .iter()
            .map(|&link| cache.links()[link].id)
            .collect();
        assert_eq!(ids, vec![links[0], links[2], links[1]]);
    }

    #[test]
    fn reroutes_are_transparent() {
        let mut tree = new_tree();
        let a = tree.add_node("FunctionNodeMath");
        let reroute = tree.add_node("NodeReroute");
        let b = tree.add_node("FunctionNodeMath");
        link(&mut tree, a, "Value", reroute, "Input");
        link(&mut tree, reroute, "Output", b, "A");

        let cache = tree.ensure_topology_cache();
        let b_input = cache.find_input(cache.node_index(b).unwrap(), "A").unwrap();
        let a_output = cache.find_output(cache.node_index(a).unwrap(), "Value").unwrap();
        let r = cache.node_index(reroute).unwrap();

        assert_eq!(cache.logically_linked_sockets(b_input), &[a_output]);
        let skipped = cache.logically_linked_skipped_sockets(b_input);
        assert!(skipped.contains(&cache.nodes()[r].inputs.start));
        assert!(skipped.contains(&cache.nodes()[r].outputs.start));
    }

    #[test]
    fn reroute_self_loop_has_no_origin() {
        let mut tree = new_tree();
        let reroute = tree.add_node("NodeReroute");
        let b = tree.add_node("FunctionNodeMath");
        link(&mut tree, reroute, "Output", reroute, "Input");
        link(&mut tree, reroute, "Output", b, "A");

        let cache = tree.ensure_topology_cache();
        let b_input = cache.find_input(cache.node_index(b).unwrap(), "A").unwrap();
        assert!(cache.logically_linked_sockets(b_input).is_empty());
        assert!(!cache.is_logically_linked(b_input));
        assert!(cache.has_link_cycle());
    }

    #[test]
    fn muted_nodes_pass_through_internal_links() {
        let mut tree = new_tree();
        let a = tree.add_node("FunctionNodeMath");
        let muted = tree.add_node("FunctionNodeMath");
        let b = tree.add_node("FunctionNodeMath");
        link(&mut tree, a, "Value", muted, "A");
        link(&mut tree, muted, "Value", b, "A");
        tree.set_node_muted(muted, true).unwrap();
        let from = tree.find_input(muted, "A").unwrap();
        let to = tree.find_output(muted, "Value").unwrap();
        tree.node_mut(muted)
            .unwrap()
            .internal_links
            .push(crate::tree::InternalLink { from, to });

        let cache = tree.ensure_topology_cache();
        let b_input = cache.find_input(cache.node_index(b).unwrap(), "A").unwrap();
        let a_output = cache.find_output(cache.node_index(a).unwrap(), "Value").unwrap();
        assert_eq!(cache.logically_linked_sockets(b_input), &[a_output]);
        assert_eq!(cache.logically_linked_skipped_sockets(b_input).len(), 2);
    }

    #[test]
    fn muted_links_and_unavailable_sockets_are_skipped() {
        let mut tree = new_tree();
        let a = tree.add_node("FunctionNodeMath");
        let b = tree.add_node("FunctionNodeMath");
        let muted = link(&mut tree, a, "Value", b, "A");
        link(&mut tree, a, "Value", b, "B");
        tree.set_link_muted(muted, true).unwrap();

        let cache = tree.ensure_topology_cache();
        let b_index = cache.node_index(b).unwrap();
        assert!(cache.logically_linked_sockets(cache.find_input(b_index, "A").unwrap()).is_empty());
        assert_eq!(cache.logically_linked_sockets(cache.find_input(b_index, "B").unwrap()).len(), 1);

        tree.set_socket_available(tree.find_output(a, "Value").unwrap(), false).unwrap();
        let cache = tree.ensure_topology_cache();
        let b_index = cache.node_index(b).unwrap();
        assert!(cache.logically_linked_sockets(cache.find_input(b_index, "B").unwrap()).is_empty());
        assert!(!cache.nodes()[b_index].has_available_linked_inputs);
    }

    #[test]
    fn toposort_follows_links() {
        let mut tree = new_tree();
        // Added in reverse so that tree order is not already sorted.
        let c = tree.add_node("FunctionNodeMath");
        let b = tree.add_node("FunctionNodeMath");
        let a = tree.add_node("FunctionNodeMath");
        link(&mut tree, a, "Value", b, "A");
        link(&mut tree, b, "Value", c, "A");
        link(&mut tree, a, "Value", c, "B");

        let cache = tree.ensure_topology_cache();
        let ids = |order: &[usize]| -> Vec<NodeId> { order.iter().map(|&i| cache.nodes()[i].id).collect() };
        assert_eq!(ids(cache.toposort_left_to_right()), vec![a, b, c]);
        assert_eq!(ids(cache.toposort_right_to_left()), vec![c, b, a]);
        assert!(!cache.has_link_cycle());
    }

    #[test]
    fn toposort_reports_cycles_and_keeps_every_node() {
        let mut tree = new_tree();
        let a = tree.add_node("FunctionNodeMath");
        let b = tree.add_node("FunctionNodeMath");
        let c = tree.add_node("FunctionNodeMath");
        link(&mut tree, a, "Value", b, "A");
        link(&mut tree, b, "Value", a, "A");
        link(&mut tree, b, "Value", c, "A");

        let cache = tree.ensure_topology_cache();
        assert!(cache.has_link_cycle());
        for order in [cache.toposort_left_to_right(), cache.toposort_right_to_left()] {
            let mut sorted = order.to_vec();
            sorted.sort_unstable();
            assert_eq!(sorted, vec![0, 1, 2]);
        }
    }

    #[test]
    fn group_output_prefers_active_node() {
        let mut tree = new_tree();
        let first = tree.add_node("NodeGroupOutput");
        let cache = tree.ensure_topology_cache();
        assert_eq!(cache.group_output_node(), cache.node_index(first));

        let second = tree.add_node("NodeGroupOutput");
        let cache = tree.ensure_topology_cache();
        assert_eq!(cache.group_output_node(), None);

        tree.set_active_output(second).unwrap();
        let cache = tree.ensure_topology_cache();
        assert_eq!(cache.group_output_node(), cache.node_index(second));
    }

    #[test]
    fn undefined_nodes_are_flagged() {
        let mut tree = new_tree();
        tree.add_node("FunctionNodeMath");
        assert!(!tree.ensure_topology_cache().has_undefined_nodes_or_sockets());
        let plugin = tree.add_node("PluginNodeMissing");
        tree.add_socket(plugin, InOut::In, "Value", SocketType::Float).unwrap();
        let cache = tree.ensure_topology_cache();
        assert!(cache.has_undefined_nodes_or_sockets());
        assert_eq!(cache.nodes().len(), 2);
    }

    #[test]
    fn sequential_and_parallel_builds_agree() {
        let mut tree = new_tree();
        let mut previous = tree.add_node("FunctionNodeMath");
        for _ in 0..20 {
            let next = tree.add_node("FunctionNodeMath");
            link(&mut tree, previous, "Value", next, "A");
            previous = next;
        }
        let sequential = TopologyCache::build(&tree, false);
        let parallel = TopologyCache::build(&tree, true);
        assert_eq!(sequential.toposort_left_to_right(), parallel.toposort_left_to_right());
        for &input in sequential.input_sockets() {
            assert_eq!(
                sequential.logically_linked_sockets(input),
                parallel.logically_linked_sockets(input)
            );
        }
    }
}
