//! Logical Origins
//!
//! The logical origin of an input is the socket that actually provides its
//! value. Reroutes and muted nodes are looked through: their sockets are
//! recorded as skipped and the walk continues on the other side.

use rayon::prelude::*;
use smallvec::SmallVec;

use super::topology::{LogicalOrigins, TopologyCache};
use crate::types::NodeKind;

/// Resolve the logical origins of every input socket, in input order.
pub(crate) fn find_all_logical_origins(cache: &TopologyCache, parallel: bool) -> Vec<LogicalOrigins> {
    if parallel {
        cache
            .input_sockets()
            .par_iter()
            .map(|&input| find_logical_origins(cache, input))
            .collect()
    } else {
        cache
            .input_sockets()
            .iter()
            .map(|&input| find_logical_origins(cache, input))
            .collect()
    }
}

pub(crate) fn find_logical_origins(cache: &TopologyCache, input: usize) -> LogicalOrigins {
    let mut result = LogicalOrigins::default();
    let mut chain: SmallVec<[usize; 16]> = SmallVec::new();
    visit(cache, input, false, &mut chain, &mut result);
    result
}

fn visit(
    cache: &TopologyCache,
    input: usize,
    only_follow_first_link: bool,
    chain: &mut SmallVec<[usize; 16]>,
    result: &mut LogicalOrigins,
) {
    if chain.contains(&input) {
        // Reroute or mute cycle.
        return;
    }
    chain.push(input);

    let links = cache.directly_linked_links(input);
    let links = if only_follow_first_link {
        &links[..links.len().min(1)]
    } else {
        links
    };
    for &link_index in links {
        let link = &cache.links()[link_index];
        if link.muted || !link.available {
            continue;
        }
        let origin = &cache.sockets()[link.from_socket];
        if !origin.available {
            continue;
        }
        let origin_node = &cache.nodes()[link.from_node];
        if origin_node.kind == NodeKind::Reroute {
            if origin_node.inputs.is_empty() || origin_node.outputs.is_empty() {
                continue;
            }
            let reroute_input = origin_node.inputs.start;
            result.skipped.push(reroute_input);
            result.skipped.push(origin_node.outputs.start);
            visit(cache, reroute_input, false, chain, result);
            continue;
        }
        if origin_node.muted {
            if let Some(mute_input) = origin.internal_link_input {
                result.skipped.push(link.from_socket);
                result.skipped.push(mute_input);
                visit(cache, mute_input, true, chain, result);
            }
            continue;
        }
        result.origins.push(link.from_socket);
    }

    chain.pop();
}
