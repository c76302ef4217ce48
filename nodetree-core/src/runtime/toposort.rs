//! Topological Sorting
//!
//! Iterative depth-first sort of the nodes of a tree in either direction.
//! An explicit stack of frames replaces recursion, so very deep trees can't
//! overflow the call stack.
//!
//! Cycles don't abort the sort. The link closing a cycle is skipped and the
//! cycle is reported, and nodes that are only reachable from within a cycle
//! are used as additional start nodes. Every node ends up in the result
//! exactly once.

use smallvec::SmallVec;

use super::topology::TopologyCache;

/// Direction of a topological sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToposortDirection {
    /// Nodes come after all nodes they depend on.
    LeftToRight,
    /// Nodes come after all nodes that depend on them.
    RightToLeft,
}

#[derive(Debug, Clone, Copy, Default)]
struct NodeState {
    is_done: bool,
    is_in_stack: bool,
}

struct Frame {
    node: usize,
    socket: usize,
    link: usize,
}

/// Sort all nodes. Returns node indices and whether a cycle was found.
pub(crate) fn toposort(cache: &TopologyCache, direction: ToposortDirection) -> (Vec<usize>, bool) {
    let nodes = cache.nodes();
    let mut states = vec![NodeState::default(); nodes.len()];
    let mut sorted = Vec::with_capacity(nodes.len());
    let mut cycle_detected = false;

    for (index, node) in nodes.iter().enumerate() {
        if states[index].is_done {
            continue;
        }
        let has_successors = match direction {
            ToposortDirection::LeftToRight => node.has_available_linked_outputs,
            ToposortDirection::RightToLeft => node.has_available_linked_inputs,
        };
        if has_successors {
            // Not a start node.
            continue;
        }
        sort_from_start_node(cache, direction, index, &mut states, &mut sorted, &mut cycle_detected);
    }

    if sorted.len() < nodes.len() {
        cycle_detected = true;
        for index in 0..nodes.len() {
            if states[index].is_done {
                continue;
            }
            // Start somewhere in the middle of a cycle.
            sort_from_start_node(cache, direction, index, &mut states, &mut sorted, &mut cycle_detected);
        }
    }

    (sorted, cycle_detected)
}

fn sort_from_start_node(
    cache: &TopologyCache,
    direction: ToposortDirection,
    start: usize,
    states: &mut [NodeState],
    sorted: &mut Vec<usize>,
    cycle_detected: &mut bool,
) {
    let mut stack: SmallVec<[Frame; 64]> = SmallVec::new();
    stack.push(Frame {
        node: start,
        socket: 0,
        link: 0,
    });
    states[start].is_in_stack = true;

    while let Some(frame) = stack.last_mut() {
        let node = &cache.nodes()[frame.node];
        let sockets = match direction {
            ToposortDirection::LeftToRight => node.inputs.clone(),
            ToposortDirection::RightToLeft => node.outputs.clone(),
        };

        let mut next = None;
        while frame.socket < sockets.len() {
            let socket = sockets.start + frame.socket;
            let links = cache.directly_linked_links(socket);
            if frame.link == links.len() {
                frame.socket += 1;
                frame.link = 0;
                continue;
            }
            if !cache.links()[links[frame.link]].available {
                frame.link += 1;
                continue;
            }
            let linked_socket = cache.directly_linked_sockets(socket)[frame.link];
            let linked_node = cache.sockets()[linked_socket].node;
            let state = &mut states[linked_node];
            if !state.is_done {
                if state.is_in_stack {
                    *cycle_detected = true;
                } else {
                    state.is_in_stack = true;
                    next = Some(linked_node);
                    break;
                }
            }
            frame.link += 1;
        }

        match next {
            Some(node) => stack.push(Frame {
                node,
                socket: 0,
                link: 0,
            }),
            None => {
                let node = frame.node;
                states[node] = NodeState {
                    is_done: true,
                    is_in_stack: false,
                };
                sorted.push(node);
                stack.pop();
            }
        }
    }
}
