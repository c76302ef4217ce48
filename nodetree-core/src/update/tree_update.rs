//! Per-Tree Update
//!
//! Brings one tree up to date with the edits recorded in its changed flags.
//! Trees referenced by group nodes are only seen through their snapshots, so
//! the caller decides in which order trees are updated.

use std::sync::Arc;

use super::internal_links::update_internal_links;
use super::output_changed::check_if_output_changed;
use super::ChangedFlag;
use crate::config::UpdateSettings;
use crate::field::update_field_inferencing;
use crate::tree::{GroupSnapshots, Node, NodeId, NodeTree};

/// What an update changed that other trees care about.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeUpdateResult {
    /// The sockets or the field behavior exposed to group nodes changed.
    pub interface_changed: bool,
    /// Something the tree's outputs depend on changed.
    pub output_changed: bool,
}

impl NodeTree {
    /// Clear the changed flags of the tree, its nodes and their sockets.
    pub fn reset_changed_flags(&mut self) {
        self.runtime.changed = ChangedFlag::NOTHING;
        for node in self.nodes.values_mut() {
            node.changed = ChangedFlag::NOTHING;
            for socket in node.inputs.iter_mut().chain(node.outputs.iter_mut()) {
                socket.changed = ChangedFlag::NOTHING;
            }
        }
    }
}

/// Update a single tree.
pub fn update_tree(tree: &mut NodeTree, groups: &GroupSnapshots, settings: &UpdateSettings) -> TreeUpdateResult {
    let mut result = TreeUpdateResult::default();

    update_socket_link_and_use(tree);
    update_individual_nodes(tree, groups);
    update_internal_links(tree);
    update_generic_callback(tree);
    remove_unused_previews_when_necessary(tree);
    update_contains_output(tree, groups);

    if tree.kind().uses_field_inferencing() {
        result.interface_changed |= update_field_inferencing(tree, groups);
    }

    result.output_changed = check_if_output_changed(tree, groups, &settings.driver_policy);

    // Node updates may have added sockets.
    update_socket_link_and_use(tree);
    update_link_validation(tree);

    if tree
        .changed_flag()
        .intersects(ChangedFlag::INTERFACE | ChangedFlag::ANY)
    {
        result.interface_changed = true;
    }
    if result.interface_changed {
        let tree_type = Arc::clone(tree.tree_type());
        tree_type.interface_update(tree);
    }
    result
}

/// Store the active link on every input and whether sockets are in use.
fn update_socket_link_and_use(tree: &mut NodeTree) {
    let cache = tree.ensure_topology_cache();
    let mut in_use = vec![false; cache.sockets().len()];
    for link in cache.links().iter().filter(|link| !link.muted) {
        in_use[link.from_socket] = true;
        in_use[link.to_socket] = true;
    }

    for (index, is_used) in in_use.into_iter().enumerate() {
        let link = cache
            .directly_linked_links(index)
            .first()
            .map(|&link| cache.links()[link].id);
        if let Some(socket) = tree.socket_at_mut(&cache, index) {
            socket.in_use = is_used;
            if socket.is_input() {
                socket.link = link;
            }
        }
    }
}

fn node_needs_update(tree_flag: ChangedFlag, node: &Node) -> bool {
    if tree_flag.intersects(ChangedFlag::ANY | ChangedFlag::LINK) {
        // A link change can affect any node.
        return true;
    }
    if node.changed.contains(ChangedFlag::NODE_PROPERTY) {
        return true;
    }
    tree_flag.contains(ChangedFlag::INTERFACE) && (node.is_group_input() || node.is_group_output())
}

fn update_node(tree: &mut NodeTree, id: NodeId, groups: &GroupSnapshots) {
    let Some(node) = tree.node(id) else {
        return;
    };
    let node_type = Arc::clone(node.node_type());
    // Keep the sockets of group nodes whose tree isn't available.
    let group_missing = node.is_group() && node.group().is_some_and(|group| groups.get(group).is_none());
    if !group_missing {
        let _ = tree.redeclare_node(id, groups);
    }
    node_type.update(tree, id, groups);
}

fn update_individual_nodes(tree: &mut NodeTree, groups: &GroupSnapshots) {
    let tree_flag = tree.changed_flag();
    let tagged: Vec<NodeId> = tree
        .nodes()
        .filter(|node| node_needs_update(tree_flag, node))
        .map(Node::id)
        .collect();
    for id in tagged {
        update_node(tree, id, groups);
    }

    if tree
        .changed_flag()
        .intersects(ChangedFlag::INTERFACE | ChangedFlag::ANY)
    {
        // The first pass may have grown the interface.
        let boundary: Vec<NodeId> = tree
            .nodes()
            .filter(|node| node.is_group_input() || node.is_group_output())
            .map(Node::id)
            .collect();
        for id in boundary {
            update_node(tree, id, groups);
        }
    }
}

fn update_generic_callback(tree: &mut NodeTree) {
    let tree_type = Arc::clone(tree.tree_type());
    tree_type.update(tree);
}

fn remove_unused_previews_when_necessary(tree: &mut NodeTree) {
    let allowed = ChangedFlag::LINK
        | ChangedFlag::SOCKET_PROPERTY
        | ChangedFlag::NODE_PROPERTY
        | ChangedFlag::NODE_OUTPUT
        | ChangedFlag::INTERFACE;
    if allowed.contains(tree.changed_flag()) {
        return;
    }
    tree.remove_unused_previews();
}

fn update_contains_output(tree: &mut NodeTree, groups: &GroupSnapshots) {
    let contains_output = tree.nodes().any(|node| {
        node.node_type().is_output()
            || node
                .group()
                .filter(|_| node.is_group())
                .and_then(|group| groups.get(group))
                .is_some_and(|snapshot| snapshot.contains_output)
    });
    tree.runtime.contains_output = contains_output;
}

/// Mark links that don't go strictly forward, or that the tree type
/// rejects, as invalid. Links touching unavailable sockets stay valid.
fn update_link_validation(tree: &mut NodeTree) {
    let cache = tree.ensure_topology_cache();
    let mut depth = vec![0usize; cache.nodes().len()];
    for &node_index in cache.toposort_left_to_right() {
        let node = &cache.nodes()[node_index];
        let node_depth = node
            .inputs
            .clone()
            .flat_map(|input| cache.directly_linked_links(input).iter())
            .map(|&link| &cache.links()[link])
            .filter(|link| link.available)
            .map(|link| depth[link.from_node] + 1)
            .max()
            .unwrap_or(0);
        depth[node_index] = node_depth;
    }

    let tree_type = Arc::clone(tree.tree_type());
    for link in cache.links() {
        if !link.available {
            if let Some(stored) = tree.links.get_mut(&link.id) {
                stored.valid = true;
            }
            continue;
        }
        let from_type = cache.sockets()[link.from_socket].socket_type;
        let to_type = cache.sockets()[link.to_socket].socket_type;
        let valid = depth[link.from_node] < depth[link.to_node]
            && tree_type.validate_link(from_type, to_type);
        if let Some(stored) = tree.links.get_mut(&link.id) {
            stored.valid = valid;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::InOut;
    use crate::types::{GeometryNodeTree, NodeTypeRegistry, OutputFieldDependency, SocketType};

    fn geometry_tree() -> NodeTree {
        NodeTree::new(
            "Geometry Nodes",
            Arc::new(GeometryNodeTree),
            Arc::new(NodeTypeRegistry::with_builtins()),
        )
    }

    fn update(tree: &mut NodeTree) -> TreeUpdateResult {
        let result = update_tree(tree, &GroupSnapshots::new(), &UpdateSettings::default());
        tree.reset_changed_flags();
        result
    }

    #[test]
    fn linking_the_extend_socket_grows_the_interface() {
        let mut tree = geometry_tree();
        let input = tree.add_node("NodeGroupInput");
        let math = tree.add_node("FunctionNodeMath");
        update(&mut tree);

        let extend = tree.node(input).unwrap().outputs()[0].id();
        let link = tree.add_link(extend, tree.find_input(math, "A").unwrap()).unwrap();
        let result = update(&mut tree);

        assert!(result.interface_changed);
        assert_eq!(tree.interface().inputs().len(), 1);
        assert_eq!(tree.interface().inputs()[0].socket_type(), SocketType::Float);
        let outputs = tree.node(input).unwrap().outputs();
        assert_eq!(outputs.len(), 2);
        assert!(outputs[1].is_virtual());
        assert_eq!(tree.link(link).unwrap().from_socket(), outputs[0].id());
    }

    #[test]
    fn second_update_without_edits_changes_nothing() {
        let mut tree = geometry_tree();
        let position = tree.add_node("GeometryNodeInputPosition");
        let viewer = tree.add_node("GeometryNodeViewer");
        tree.add_link(
            tree.find_output(position, "Position").unwrap(),
            tree.find_input(viewer, "Value").unwrap(),
        )
        .unwrap();

        let first = update(&mut tree);
        assert!(first.output_changed);
        assert_eq!(update(&mut tree), TreeUpdateResult::default());
    }

    #[test]
    fn sockets_know_their_links() {
        let mut tree = geometry_tree();
        let a = tree.add_node("FunctionNodeMath");
        let b = tree.add_node("FunctionNodeMath");
        let a_out = tree.find_output(a, "Value").unwrap();
        let b_in = tree.find_input(b, "A").unwrap();
        let link = tree.add_link(a_out, b_in).unwrap();
        update(&mut tree);

        assert!(tree.socket(a_out).unwrap().is_in_use());
        assert_eq!(tree.socket(b_in).unwrap().link(), Some(link));

        tree.set_link_muted(link, true).unwrap();
        update(&mut tree);
        assert!(!tree.socket(a_out).unwrap().is_in_use());
        assert_eq!(tree.socket(b_in).unwrap().link(), Some(link));
    }

    #[test]
    fn cyclic_and_rejected_links_are_invalid() {
        let mut tree = geometry_tree();
        let a = tree.add_node("FunctionNodeMath");
        let b = tree.add_node("FunctionNodeMath");
        let forward = tree
            .add_link(tree.find_output(a, "Value").unwrap(), tree.find_input(b, "A").unwrap())
            .unwrap();
        update(&mut tree);
        assert!(tree.link(forward).unwrap().is_valid());

        let back = tree
            .add_link(tree.find_output(b, "Value").unwrap(), tree.find_input(a, "A").unwrap())
            .unwrap();
        update(&mut tree);
        let valid = [forward, back].map(|link| tree.link(link).unwrap().is_valid());
        assert_eq!(valid.iter().filter(|valid| !**valid).count(), 1);

        let diffuse = tree.add_node("ShaderNodeBsdfDiffuse");
        let viewer = tree.add_node("GeometryNodeViewer");
        let shader = tree
            .add_link(
                tree.find_output(diffuse, "BSDF").unwrap(),
                tree.find_input(viewer, "Value").unwrap(),
            )
            .unwrap();
        update(&mut tree);
        assert!(!tree.link(shader).unwrap().is_valid());
    }

    #[test]
    fn links_to_unavailable_sockets_stay_valid() {
        let mut tree = geometry_tree();
        let a = tree.add_node("FunctionNodeMath");
        let b = tree.add_node("FunctionNodeMath");
        let target = tree.find_input(b, "A").unwrap();
        let link = tree
            .add_link(tree.find_output(a, "Value").unwrap(), target)
            .unwrap();
        tree.set_socket_available(target, false).unwrap();
        update(&mut tree);
        assert!(tree.link(link).unwrap().is_valid());
    }

    #[test]
    fn removing_nodes_drops_previews() {
        let mut tree = geometry_tree();
        let viewer = tree.add_node("GeometryNodeViewer");
        let other = tree.add_node("GeometryNodeViewer");
        tree.ensure_preview(viewer, 2, 2).unwrap();
        update(&mut tree);
        assert_eq!(tree.preview_count(), 0);

        tree.set_node_show_preview(viewer, true).unwrap();
        tree.ensure_preview(viewer, 2, 2).unwrap();
        let index = tree.add_node("GeometryNodeInputIndex");
        tree.add_link(
            tree.find_output(index, "Index").unwrap(),
            tree.find_input(viewer, "Value").unwrap(),
        )
        .unwrap();
        update(&mut tree);
        // Only link and property edits, previews are kept.
        assert_eq!(tree.preview_count(), 1);

        tree.remove_node(other).unwrap();
        tree.set_node_show_preview(viewer, false).unwrap();
        update(&mut tree);
        assert_eq!(tree.preview_count(), 0);
    }

    #[test]
    fn viewer_trees_contain_an_output() {
        let mut tree = geometry_tree();
        tree.add_node("FunctionNodeMath");
        update(&mut tree);
        assert!(!tree.contains_output());

        tree.add_node("GeometryNodeViewer");
        update(&mut tree);
        assert!(tree.contains_output());
    }

    #[test]
    fn group_outputs_grow_from_their_extend_socket() {
        let mut tree = geometry_tree();
        let output = tree.add_node("NodeGroupOutput");
        let index = tree.add_node("GeometryNodeInputIndex");
        update(&mut tree);

        let extend = tree.find_socket(output, InOut::In, "__extend__").unwrap();
        tree.add_link(tree.find_output(index, "Index").unwrap(), extend).unwrap();
        let result = update(&mut tree);
        assert!(result.interface_changed);
        assert_eq!(tree.interface().outputs()[0].name(), "Index");
        assert_eq!(
            tree.field_inferencing_interface().unwrap().outputs,
            vec![OutputFieldDependency::ForFieldSource]
        );
    }
}
