//! Internal Links
//!
//! Internal links say which input a muted node passes through to each of
//! its outputs. For every output the input with the best conversion priority
//! wins. A linked input beats an unlinked one of the same priority.

use smallvec::SmallVec;

use super::tag;
use crate::runtime::TopologyCache;
use crate::tree::{InternalLink, NodeId, NodeTree};
use crate::types::SocketType;

/// Input socket index passed through to `output`.
fn find_internally_linked_input(tree: &NodeTree, cache: &TopologyCache, output: usize) -> Option<usize> {
    let output_socket = &cache.sockets()[output];
    let node = &cache.nodes()[output_socket.node];

    let mut selected: Option<(usize, u8, bool)> = None;
    for input in node.inputs.clone() {
        let input_socket = &cache.sockets()[input];
        if !input_socket.available {
            continue;
        }
        if tree.socket_at(cache, input).is_some_and(|socket| socket.no_internal_link()) {
            continue;
        }
        let Some(priority) =
            SocketType::internal_link_priority(input_socket.socket_type, output_socket.socket_type)
        else {
            continue;
        };
        let is_linked = cache.is_directly_linked(input);
        let is_preferred = match selected {
            None => true,
            Some((_, selected_priority, selected_is_linked)) => {
                priority > selected_priority || (is_linked && !selected_is_linked)
            }
        };
        if is_preferred {
            selected = Some((input, priority, is_linked));
        }
    }
    selected.map(|(input, _, _)| input)
}

fn expected_internal_links(tree: &NodeTree, cache: &TopologyCache, node_index: usize) -> Vec<InternalLink> {
    let node = &cache.nodes()[node_index];
    let mut links = Vec::new();
    for output in node.outputs.clone() {
        if !cache.sockets()[output].available {
            continue;
        }
        if tree.socket_at(cache, output).is_some_and(|socket| socket.no_internal_link()) {
            continue;
        }
        if let Some(input) = find_internally_linked_input(tree, cache, output) {
            links.push(InternalLink {
                from: cache.sockets()[input].id,
                to: cache.sockets()[output].id,
            });
        }
    }
    links
}

/// Recompute the internal links of all nodes. Nodes whose links changed are
/// tagged with [`ChangedFlag::INTERNAL_LINK`](super::ChangedFlag::INTERNAL_LINK).
pub(crate) fn update_internal_links(tree: &mut NodeTree) {
    let cache = tree.ensure_topology_cache();
    let mut changed: SmallVec<[(NodeId, Vec<InternalLink>); 8]> = SmallVec::new();
    for (node_index, node) in cache.nodes().iter().enumerate() {
        let expected = expected_internal_links(tree, &cache, node_index);
        let current = tree
            .node_at(node_index)
            .map(|node| node.internal_links())
            .unwrap_or(&[]);
        if current != expected.as_slice() {
            changed.push((node.id, expected));
        }
    }

    for (node, links) in changed {
        if let Some(node_ref) = tree.node_mut(node) {
            node_ref.internal_links = links;
        }
        tag::tag_node_internal_link(tree, node);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::types::{NodeTypeRegistry, ShaderNodeTree};
    use crate::update::ChangedFlag;

    fn shader_tree() -> NodeTree {
        NodeTree::new(
            "Material",
            Arc::new(ShaderNodeTree),
            Arc::new(NodeTypeRegistry::with_builtins()),
        )
    }

    #[test]
    fn same_type_inputs_are_passed_through() {
        let mut tree = shader_tree();
        let normal = tree.add_node("ShaderNodeNormal");
        update_internal_links(&mut tree);

        let node = tree.node(normal).unwrap();
        let input = tree.find_input(normal, "Normal").unwrap();
        let output = tree.find_output(normal, "Normal").unwrap();
        assert!(node
            .internal_links()
            .contains(&InternalLink { from: input, to: output }));
        assert!(node.changed_flag().contains(ChangedFlag::INTERNAL_LINK));
    }

    #[test]
    fn linked_inputs_win_ties() {
        let mut tree = shader_tree();
        let math = tree.add_node("FunctionNodeMath");
        let a = tree.find_input(math, "A").unwrap();
        let b = tree.find_input(math, "B").unwrap();
        let value = tree.find_output(math, "Value").unwrap();
        update_internal_links(&mut tree);
        assert_eq!(tree.node(math).unwrap().internal_links(), &[InternalLink { from: a, to: value }]);

        let texture = tree.add_node("ShaderNodeTexImage");
        let alpha = tree.find_output(texture, "Alpha").unwrap();
        tree.add_link(alpha, b).unwrap();
        update_internal_links(&mut tree);
        assert_eq!(tree.node(math).unwrap().internal_links(), &[InternalLink { from: b, to: value }]);
    }

    #[test]
    fn shader_outputs_only_pass_shaders() {
        let mut tree = shader_tree();
        let diffuse = tree.add_node("ShaderNodeBsdfDiffuse");
        update_internal_links(&mut tree);
        assert!(tree.node(diffuse).unwrap().internal_links().is_empty());
    }

    #[test]
    fn unchanged_links_are_not_retagged() {
        let mut tree = shader_tree();
        let normal = tree.add_node("ShaderNodeNormal");
        update_internal_links(&mut tree);
        tree.reset_changed_flags();

        update_internal_links(&mut tree);
        assert!(tree.node(normal).unwrap().changed_flag().is_empty());
    }
}
