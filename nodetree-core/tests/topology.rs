//! Integration Tests for the Topology Cache
//!
//! These tests build trees through the public editing API and check the
//! derived indices.

use std::collections::HashMap;
use std::sync::Arc;

use nodetree_core::tag;
use nodetree_core::tree::{LinkId, NodeId, NodeTree};
use nodetree_core::types::{GeometryNodeTree, NodeTypeRegistry};
use proptest::prelude::*;

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

/// Position of every node id in a toposort.
fn positions(tree: &NodeTree, order: &[usize]) -> HashMap<NodeId, usize> {
    order
        .iter()
        .enumerate()
        .map(|(position, &node)| (tree.node_at(node).unwrap().id(), position))
        .collect()
}

#[test]
fn repeated_queries_share_one_cache() {
    let mut tree = new_tree();
    let a = tree.add_node("FunctionNodeMath");
    let b = tree.add_node("FunctionNodeMath");
    link(&mut tree, a, "Value", b, "A");

    let first = tree.ensure_topology_cache();
    let second = tree.ensure_topology_cache();
    assert!(Arc::ptr_eq(&first, &second));
    assert!(!tree.is_topology_cache_dirty());
    assert_eq!(first.toposort_left_to_right(), second.toposort_left_to_right());
}

#[test]
fn tags_invalidate_the_cache() {
    let mut tree = new_tree();
    let a = tree.add_node("FunctionNodeMath");
    let b = tree.add_node("FunctionNodeMath");
    link(&mut tree, a, "Value", b, "A");
    let before = tree.ensure_topology_cache();
    assert_eq!(before.nodes().len(), 2);

    tree.remove_node(a).unwrap();
    assert!(tree.is_topology_cache_dirty());
    let after = tree.ensure_topology_cache();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.nodes().len(), 1);
    assert_eq!(after.nodes()[0].id, b);
    assert!(after.links().is_empty());
    assert!(after.node_index(a).is_none());

    // Tags that don't touch the structure still force a rebuild.
    tag::tag_node_property(&mut tree, b);
    assert!(tree.is_topology_cache_dirty());
    let rebuilt = tree.ensure_topology_cache();
    assert!(!Arc::ptr_eq(&after, &rebuilt));
    assert_eq!(rebuilt.nodes().len(), 1);
}

#[test]
fn muting_a_link_is_visible_after_the_rebuild() {
    let mut tree = new_tree();
    let a = tree.add_node("FunctionNodeMath");
    let b = tree.add_node("FunctionNodeMath");
    let id = link(&mut tree, a, "Value", b, "A");
    let cache = tree.ensure_topology_cache();
    let input = cache.find_input(cache.node_index(b).unwrap(), "A").unwrap();
    assert!(cache.is_logically_linked(input));

    tree.set_link_muted(id, true).unwrap();
    let cache = tree.ensure_topology_cache();
    assert!(cache.is_directly_linked(input));
    assert!(!cache.is_logically_linked(input));
}

#[test]
fn multi_input_links_are_ordered_by_descending_sort_id() {
    let mut tree = new_tree();
    let join = tree.add_node("GeometryNodeJoinGeometry");
    let mut links = Vec::new();
    for sort_id in [2, 0, 1] {
        let grid = tree.add_node("GeometryNodeMeshGrid");
        let id = link(&mut tree, grid, "Mesh", join, "Geometry");
        tree.set_link_sort_id(id, sort_id).unwrap();
        links.push(id);
    }

    let cache = tree.ensure_topology_cache();
    let input = cache
        .find_input(cache.node_index(join).unwrap(), "Geometry")
        .unwrap();
    let order: Vec<LinkId> = cache
        .directly_linked_links(input)
        .iter()
        .map(|&index| cache.links()[index].id)
        .collect();
    assert_eq!(order, vec![links[0], links[2], links[1]]);
}

#[test]
fn reroute_chains_resolve_to_the_real_source() {
    let mut tree = new_tree();
    let a = tree.add_node("FunctionNodeMath");
    let first = tree.add_node("NodeReroute");
    let second = tree.add_node("NodeReroute");
    let b = tree.add_node("FunctionNodeMath");
    link(&mut tree, a, "Value", first, "Input");
    link(&mut tree, first, "Output", second, "Input");
    link(&mut tree, second, "Output", b, "B");

    let cache = tree.ensure_topology_cache();
    let input = cache.find_input(cache.node_index(b).unwrap(), "B").unwrap();
    let source = cache.find_output(cache.node_index(a).unwrap(), "Value").unwrap();
    assert_eq!(cache.logically_linked_sockets(input), &[source]);

    let skipped = cache.logically_linked_skipped_sockets(input);
    assert_eq!(skipped.len(), 4);
    for reroute in [first, second] {
        let node = &cache.nodes()[cache.node_index(reroute).unwrap()];
        assert!(skipped.contains(&node.inputs.start));
        assert!(skipped.contains(&node.outputs.start));
    }
}

#[test]
fn reroute_loops_terminate_without_origin() {
    let mut tree = new_tree();
    let reroute = tree.add_node("NodeReroute");
    let b = tree.add_node("FunctionNodeMath");
    link(&mut tree, reroute, "Output", reroute, "Input");
    link(&mut tree, reroute, "Output", b, "A");

    let cache = tree.ensure_topology_cache();
    let input = cache.find_input(cache.node_index(b).unwrap(), "A").unwrap();
    assert!(cache.logically_linked_sockets(input).is_empty());
}

#[test]
fn cycles_are_reported_and_every_node_is_sorted_once() {
    let mut tree = new_tree();
    let nodes: Vec<NodeId> = (0..4).map(|_| tree.add_node("FunctionNodeMath")).collect();
    link(&mut tree, nodes[0], "Value", nodes[1], "A");
    link(&mut tree, nodes[1], "Value", nodes[2], "A");
    link(&mut tree, nodes[2], "Value", nodes[1], "B");
    link(&mut tree, nodes[2], "Value", nodes[3], "A");

    let cache = tree.ensure_topology_cache();
    assert!(cache.has_link_cycle());
    for order in [cache.toposort_left_to_right(), cache.toposort_right_to_left()] {
        let mut sorted = order.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
    }
}

/// Node count, creation order and candidate links between ranks.
fn random_dag() -> impl Strategy<Value = (usize, Vec<usize>, Vec<(usize, usize, bool)>)> {
    (2usize..20).prop_flat_map(|n| {
        (
            Just(n),
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
            prop::collection::vec((0..n, 0..n, any::<bool>()), 0..n * 2),
        )
    })
}

proptest! {
    #[test]
    fn toposort_respects_every_link((n, creation_order, edges) in random_dag()) {
        let mut tree = new_tree();
        let mut by_rank = vec![NodeId::from(0); n];
        for &rank in &creation_order {
            by_rank[rank] = tree.add_node("FunctionNodeMath");
        }

        let mut used_inputs = std::collections::HashSet::new();
        for (a, b, second_input) in edges {
            if a == b {
                continue;
            }
            let (from, to) = (a.min(b), a.max(b));
            let input = if second_input { "B" } else { "A" };
            if used_inputs.insert((to, input)) {
                link(&mut tree, by_rank[from], "Value", by_rank[to], input);
            }
        }

        let cache = tree.ensure_topology_cache();
        prop_assert!(!cache.has_link_cycle());
        prop_assert_eq!(cache.toposort_left_to_right().len(), n);
        prop_assert_eq!(cache.toposort_right_to_left().len(), n);

        let forward = positions(&tree, cache.toposort_left_to_right());
        let backward = positions(&tree, cache.toposort_right_to_left());
        prop_assert_eq!(forward.len(), n);
        prop_assert_eq!(backward.len(), n);
        for link in tree.links() {
            prop_assert!(forward[&link.from_node()] < forward[&link.to_node()]);
            prop_assert!(backward[&link.to_node()] < backward[&link.from_node()]);
        }
    }

    #[test]
    fn parallel_and_sequential_rebuilds_agree((n, creation_order, edges) in random_dag()) {
        let mut tree = new_tree();
        let mut by_rank = vec![NodeId::from(0); n];
        for &rank in &creation_order {
            by_rank[rank] = tree.add_node("FunctionNodeMath");
        }
        for (a, b, second_input) in edges {
            if a != b {
                let input = if second_input { "B" } else { "A" };
                link(&mut tree, by_rank[a.min(b)], "Value", by_rank[a.max(b)], input);
            }
        }

        tree.set_parallel_topology(true);
        let parallel = tree.ensure_topology_cache();
        tree.set_parallel_topology(false);
        tag::tag_all(&mut tree);
        let sequential = tree.ensure_topology_cache();

        prop_assert_eq!(parallel.toposort_left_to_right(), sequential.toposort_left_to_right());
        prop_assert_eq!(parallel.toposort_right_to_left(), sequential.toposort_right_to_left());
        for &input in parallel.input_sockets() {
            prop_assert_eq!(
                parallel.logically_linked_sockets(input),
                sequential.logically_linked_sockets(input)
            );
        }
    }
}
