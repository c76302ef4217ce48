//! Output Change Detection
//!
//! Decides whether anything the tree's outputs depend on changed, so that
//! trees using it as a group (and evaluated results) only update when they
//! have to. Two independent signals are combined:
//!
//! - a hash over the topology feeding the output sockets, compared with the
//!   hash stored during the previous update
//! - a walk from the output sockets that stops at the first socket or node
//!   with a changed flag
//!
//! The hash is recomputed on every call, whichever signal decides.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::config::DriverPolicy;
use crate::runtime::TopologyCache;
use crate::tree::{GroupSnapshots, NodeTree};
use crate::types::{NodeKind, SocketType};
use crate::update::ChangedFlag;

fn hash_combine(a: u64, b: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    a.hash(&mut hasher);
    b.hash(&mut hasher);
    hasher.finish()
}

fn hash_single(a: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    a.hash(&mut hasher);
    hasher.finish()
}

/// Whether a node produces a result of the tree.
///
/// Group nodes count when the tree they reference contains an output.
fn is_output_node(tree: &NodeTree, node_index: usize, groups: &GroupSnapshots) -> bool {
    let Some(node) = tree.node_at(node_index) else {
        return false;
    };
    if node.is_output_node() {
        return true;
    }
    node.is_group()
        && node
            .group()
            .and_then(|group| groups.get(group))
            .is_some_and(|snapshot| snapshot.contains_output)
}

/// Input sockets of all output nodes, leaving out extend sockets.
fn find_output_sockets(tree: &NodeTree, cache: &TopologyCache, groups: &GroupSnapshots) -> Vec<usize> {
    let mut sockets = Vec::new();
    for (node_index, node) in cache.nodes().iter().enumerate() {
        if !is_output_node(tree, node_index, groups) {
            continue;
        }
        sockets.extend(
            node.inputs
                .clone()
                .filter(|&input| cache.sockets()[input].socket_type != SocketType::Virtual),
        );
    }
    sockets
}

/// Hash of the topology feeding `sockets`.
///
/// Sockets get the hash of their id, combined with the hashes of everything
/// they depend on. Links that don't convert anything, reroutes and muted
/// nodes forward hashes unchanged, so they don't affect the result.
fn combined_socket_topology_hash(tree: &NodeTree, cache: &TopologyCache, sockets: &[usize]) -> u64 {
    if cache.has_link_cycle() {
        return 0;
    }

    let socket_id_hash = |socket: usize| hash_single(u64::from(cache.sockets()[socket].id.raw()));
    let mut hashes: Vec<Option<u64>> = vec![None; cache.sockets().len()];
    let mut stack: Vec<usize> = sockets.to_vec();

    while let Some(&socket) = stack.last() {
        if hashes[socket].is_some() {
            stack.pop();
            continue;
        }
        let cached = &cache.sockets()[socket];
        let node = &cache.nodes()[cached.node];
        let mut socket_hash = 0;

        if cached.in_out.is_input() {
            let mut all_origins_computed = true;
            let mut value_from_origin = false;
            for &link_index in cache.directly_linked_links(socket) {
                let link = &cache.links()[link_index];
                if !link.is_used() {
                    continue;
                }
                match hashes[link.from_socket] {
                    Some(origin_hash) => {
                        let origin_type = cache.sockets()[link.from_socket].socket_type;
                        socket_hash = if value_from_origin || cached.socket_type != origin_type {
                            hash_combine(socket_hash, origin_hash)
                        } else {
                            origin_hash
                        };
                        value_from_origin = true;
                    }
                    None => {
                        stack.push(link.from_socket);
                        all_origins_computed = false;
                    }
                }
            }
            if !all_origins_computed {
                continue;
            }
            if !value_from_origin {
                socket_hash = socket_id_hash(socket);
            }
        } else {
            let mut all_inputs_computed = true;
            for input in node.inputs.clone() {
                if cache.sockets()[input].available && hashes[input].is_none() {
                    stack.push(input);
                    all_inputs_computed = false;
                }
            }
            if !all_inputs_computed {
                continue;
            }

            let input_hash = |input: usize| hashes[input].unwrap_or_default();
            if node.kind == NodeKind::Reroute {
                socket_hash = node.inputs.clone().next().map(input_hash).unwrap_or_default();
            } else if node.muted {
                socket_hash = match cached.internal_link_input {
                    Some(input) if cache.sockets()[input].socket_type == cached.socket_type => {
                        input_hash(input)
                    }
                    _ => socket_id_hash(socket),
                };
            } else {
                socket_hash = socket_id_hash(socket);
                for input in node.inputs.clone() {
                    if cache.sockets()[input].available {
                        socket_hash = hash_combine(socket_hash, input_hash(input));
                    }
                }
                // The node behaves differently depending on whether another
                // of its outputs is used.
                let depends_on = tree
                    .node_at(cached.node)
                    .and_then(|node| node.node_type().output_depends_on_output_link(cached.index_in_node));
                if let Some(other) = depends_on {
                    let other_is_linked = node
                        .outputs
                        .clone()
                        .nth(other)
                        .is_some_and(|other| cache.is_directly_linked(other));
                    if other_is_linked {
                        socket_hash = hash_single(socket_hash);
                    }
                }
            }
        }

        hashes[socket] = Some(socket_hash);
        stack.pop();
    }

    sockets
        .iter()
        .filter_map(|&socket| hashes[socket])
        .fold(0, hash_combine)
}

/// Walk from the output sockets and look for changed flags.
///
/// A node whose only change is its internal links doesn't count unless it
/// is muted, the internal links are not used otherwise.
fn outputs_changed_based_on_flags(tree: &NodeTree, cache: &TopologyCache, sockets: &[usize]) -> bool {
    let mut pushed = vec![false; cache.sockets().len()];
    let mut stack: Vec<usize> = Vec::with_capacity(sockets.len());
    for &socket in sockets {
        if !pushed[socket] {
            pushed[socket] = true;
            stack.push(socket);
        }
    }
    let mut push = |socket: usize, stack: &mut Vec<usize>| {
        if !pushed[socket] {
            pushed[socket] = true;
            stack.push(socket);
        }
    };

    while let Some(socket) = stack.pop() {
        let cached = &cache.sockets()[socket];
        if tree
            .socket_at(cache, socket)
            .is_some_and(|socket| !socket.changed_flag().is_empty())
        {
            return true;
        }
        if let Some(node) = tree.node_at(cached.node) {
            let flag = node.changed_flag();
            let only_unused_internal_link_changed =
                !node.is_muted() && flag == ChangedFlag::INTERNAL_LINK;
            if !flag.is_empty() && !only_unused_internal_link_changed {
                return true;
            }
        }

        let node = &cache.nodes()[cached.node];
        if cached.in_out.is_input() {
            for &origin in cache.logically_linked_sockets(socket) {
                push(origin, &mut stack);
            }
            for &skipped in cache.logically_linked_skipped_sockets(socket) {
                push(skipped, &mut stack);
            }
        } else {
            for input in node.inputs.clone() {
                if cache.sockets()[input].available {
                    push(input, &mut stack);
                }
            }
            // The value of another output is used as input by the node.
            let reads = tree
                .node_at(cached.node)
                .and_then(|node| node.node_type().output_reads_output(cached.index_in_node));
            if let Some(other) = reads.and_then(|other| node.outputs.clone().nth(other)) {
                push(other, &mut stack);
            }
        }
    }
    false
}

/// Whether all drivers of the tree only do arithmetic on allowed inputs.
fn drivers_are_safe(tree: &NodeTree, policy: &DriverPolicy) -> bool {
    tree.drivers()
        .iter()
        .all(|driver| policy.is_safe(&driver.expression))
}

/// Whether the output of the tree may have changed since the last update.
///
/// Stores the new output topology hash on the tree.
pub fn check_if_output_changed(tree: &mut NodeTree, groups: &GroupSnapshots, policy: &DriverPolicy) -> bool {
    let cache = tree.ensure_topology_cache();
    let output_sockets = find_output_sockets(tree, &cache, groups);
    let old_hash = tree.runtime.output_topology_hash;
    let new_hash = combined_socket_topology_hash(tree, &cache, &output_sockets);
    tree.runtime.output_topology_hash = new_hash;

    if !drivers_are_safe(tree, policy) {
        // Drivers can move values around arbitrarily.
        return true;
    }
    let changed = tree.changed_flag();
    if changed.contains(ChangedFlag::ANY) {
        return true;
    }
    if old_hash != new_hash {
        return true;
    }
    // The hash covers purely topological edits on its own.
    if (ChangedFlag::LINK | ChangedFlag::REMOVED_NODE).contains(changed) {
        return false;
    }
    outputs_changed_based_on_flags(tree, &cache, &output_sockets)
}
