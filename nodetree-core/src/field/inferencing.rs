//! Field Inferencing Passes
//!
//! # How It Works
//!
//! 1. Right to left: outputs that never carry a field, and inputs that don't
//!    support one, require single values. The requirement travels left
//!    through links and through the inputs an output depends on, unless an
//!    unlinked implicit-field input breaks the chain.
//!
//! 2. Group inputs: an interface input supports fields unless its type can't
//!    be a field or one of its group input sockets requires a single value.
//!    Every group input node then gets the same classification.
//!
//! 3. Left to right: an input is a field when a used link brings one in, or
//!    when it is unlinked and has an implicit field. Outputs follow their
//!    declared dependency.
//!
//! 4. Group outputs: a backward search from every input of the group output
//!    node finds the group inputs the output depends on, or proves that the
//!    output is a field source by itself.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::runtime::{CachedNode, TopologyCache};
use crate::tree::{GroupSnapshots, NodeTree, SocketShape};
use crate::types::{InputSocketFieldType, NodeKind, OutputFieldDependency, SocketType};

/// Field status of one socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketFieldState {
    /// The socket carries a single value, not a field.
    pub is_single: bool,
    /// The socket is where a field comes from.
    pub is_field_source: bool,
    /// Something downstream needs a single value.
    pub requires_single: bool,
    /// The socket can never be a field.
    pub is_always_single: bool,
}

impl Default for SocketFieldState {
    fn default() -> Self {
        Self {
            is_single: true,
            is_field_source: false,
            requires_single: false,
            is_always_single: false,
        }
    }
}

/// How the inputs and outputs of a node, or of a whole tree used as a
/// group, deal with fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInferencingInterface {
    pub inputs: Vec<InputSocketFieldType>,
    pub outputs: Vec<OutputFieldDependency>,
}

/// Output of [`infer_field_states`].
#[derive(Debug, Clone)]
pub struct FieldInferencingResult {
    /// Classification of the tree's own interface.
    pub interface: FieldInferencingInterface,
    /// State of every socket, indexed like [`TopologyCache::sockets`].
    pub states: Vec<SocketFieldState>,
}

static DATA_SOURCE: OutputFieldDependency = OutputFieldDependency::ForDataSource;

fn input_field_type(interface: &FieldInferencingInterface, index: usize) -> InputSocketFieldType {
    interface.inputs.get(index).copied().unwrap_or_default()
}

fn output_field_dependency(interface: &FieldInferencingInterface, index: usize) -> &OutputFieldDependency {
    interface.outputs.get(index).unwrap_or(&DATA_SOURCE)
}

/// Socket indices of the inputs an output depends on.
fn dependency_inputs(dependency: &OutputFieldDependency, node: &CachedNode) -> SmallVec<[usize; 8]> {
    match dependency {
        OutputFieldDependency::ForFieldSource | OutputFieldDependency::ForDataSource => SmallVec::new(),
        OutputFieldDependency::ForDependentField => node.inputs.clone().collect(),
        OutputFieldDependency::ForPartiallyDependentField(indices) => indices
            .iter()
            .filter(|&&index| index < node.inputs.len())
            .map(|&index| node.inputs.start + index)
            .collect(),
    }
}

/// Field behavior of a single node.
///
/// Group nodes take the interface inferred for the tree they reference. The
/// structural node kinds have fixed behavior, undefined nodes only produce
/// plain data and everything else follows its declaration.
fn node_field_interface(
    tree: &NodeTree,
    cache: &TopologyCache,
    node_index: usize,
    groups: &GroupSnapshots,
) -> FieldInferencingInterface {
    let cached = &cache.nodes()[node_index];
    let dummy = || FieldInferencingInterface {
        inputs: vec![InputSocketFieldType::None; cached.inputs.len()],
        outputs: vec![OutputFieldDependency::ForDataSource; cached.outputs.len()],
    };
    let Some(node) = tree.node_at(node_index) else {
        return dummy();
    };

    match node.kind() {
        NodeKind::Group => {
            // Missing while the referenced tree has not been inferred yet,
            // e.g. with recursive groups.
            return node
                .group()
                .and_then(|group| groups.get(group))
                .and_then(|snapshot| snapshot.field_interface.clone())
                .unwrap_or_else(dummy);
        }
        NodeKind::Undefined => return dummy(),
        _ => {}
    }

    let inputs = node
        .inputs()
        .iter()
        .map(|socket| {
            if !socket.socket_type().is_field_type() {
                return InputSocketFieldType::None;
            }
            match node.kind() {
                NodeKind::Reroute | NodeKind::GroupOutput => InputSocketFieldType::IsSupported,
                _ if socket.input_field_type() == InputSocketFieldType::Implicit => {
                    InputSocketFieldType::Implicit
                }
                _ if node.is_function_node() => InputSocketFieldType::IsSupported,
                _ => socket.input_field_type(),
            }
        })
        .collect();

    let outputs = node
        .outputs()
        .iter()
        .map(|socket| {
            if !socket.socket_type().is_field_type() {
                return OutputFieldDependency::ForDataSource;
            }
            match node.kind() {
                // Group inputs are handled by the group input pass.
                NodeKind::Reroute | NodeKind::GroupInput => OutputFieldDependency::ForDependentField,
                _ if node.is_function_node() => OutputFieldDependency::ForDependentField,
                _ => socket.output_field_dependency().clone(),
            }
        })
        .collect();

    FieldInferencingInterface { inputs, outputs }
}

fn propagate_data_requirements_from_right_to_left(
    cache: &TopologyCache,
    interfaces: &[FieldInferencingInterface],
    states: &mut [SocketFieldState],
) {
    for &node_index in cache.toposort_right_to_left() {
        let node = &cache.nodes()[node_index];
        let interface = &interfaces[node_index];

        for (index, output) in node.outputs.clone().enumerate() {
            let dependency = output_field_dependency(interface, index);
            match dependency {
                OutputFieldDependency::ForFieldSource => continue,
                OutputFieldDependency::ForDataSource => {
                    states[output].requires_single = true;
                    states[output].is_always_single = true;
                    continue;
                }
                _ => {}
            }

            // Linked to any input that does not support fields.
            let requires_single = states[output].requires_single
                || cache
                    .directly_linked_sockets(output)
                    .iter()
                    .any(|&target| cache.sockets()[target].available && states[target].requires_single);
            states[output].requires_single = requires_single;
            if !requires_single {
                continue;
            }

            let inputs = dependency_inputs(dependency, node);
            let any_input_is_field_implicitly = inputs.iter().any(|&input| {
                cache.sockets()[input].available
                    && input_field_type(interface, cache.sockets()[input].index_in_node)
                        == InputSocketFieldType::Implicit
                    && !cache.is_logically_linked(input)
            });
            if any_input_is_field_implicitly {
                // The output isn't a single value after all.
                states[output].requires_single = false;
            } else {
                for input in inputs {
                    states[input].requires_single = true;
                }
            }
        }

        for (index, input) in node.inputs.clone().enumerate() {
            if input_field_type(interface, index) == InputSocketFieldType::None {
                states[input].requires_single = true;
                states[input].is_always_single = true;
            }
        }
    }
}

fn determine_group_input_states(
    tree: &NodeTree,
    cache: &TopologyCache,
    interface: &mut FieldInferencingInterface,
    states: &mut [SocketFieldState],
) {
    for (index, socket) in tree.interface().inputs().iter().enumerate() {
        if !socket.socket_type().is_field_type() {
            interface.inputs[index] = InputSocketFieldType::None;
        }
    }

    let group_inputs: Vec<usize> = cache.group_input_nodes().collect();
    let is_extend = |socket: usize| cache.sockets()[socket].socket_type == SocketType::Virtual;

    // Inputs connected to something that needs a single value.
    for &node_index in &group_inputs {
        let node = &cache.nodes()[node_index];
        for (index, output) in node.outputs.clone().enumerate() {
            if is_extend(output) || !states[output].requires_single {
                continue;
            }
            if let Some(field_type) = interface.inputs.get_mut(index) {
                *field_type = InputSocketFieldType::None;
            }
        }
    }

    // Keep all group input nodes consistent with the result.
    for &node_index in &group_inputs {
        let node = &cache.nodes()[node_index];
        for (index, output) in node.outputs.clone().enumerate() {
            let state = &mut states[output];
            if is_extend(output) {
                state.requires_single = true;
                continue;
            }
            let supports_field = interface
                .inputs
                .get(index)
                .is_some_and(|field_type| *field_type != InputSocketFieldType::None);
            if supports_field {
                state.is_single = false;
                state.is_field_source = true;
            } else {
                state.requires_single = true;
            }
        }
    }
}

fn propagate_field_status_from_left_to_right(
    cache: &TopologyCache,
    interfaces: &[FieldInferencingInterface],
    states: &mut [SocketFieldState],
) {
    for &node_index in cache.toposort_left_to_right() {
        let node = &cache.nodes()[node_index];
        if node.kind == NodeKind::GroupInput {
            continue;
        }
        let interface = &interfaces[node_index];

        for (index, input) in node.inputs.clone().enumerate() {
            if states[input].is_always_single {
                states[input].is_single = true;
                continue;
            }
            let is_single = if cache.is_directly_linked(input) {
                !cache.directly_linked_links(input).iter().any(|&link| {
                    let link = &cache.links()[link];
                    link.is_used() && !states[link.from_socket].is_single
                })
            } else {
                input_field_type(interface, index) != InputSocketFieldType::Implicit
            };
            states[input].is_single = is_single;
        }

        for (index, output) in node.outputs.clone().enumerate() {
            match output_field_dependency(interface, index) {
                OutputFieldDependency::ForDataSource => states[output].is_single = true,
                OutputFieldDependency::ForFieldSource => {
                    states[output].is_single = false;
                    states[output].is_field_source = true;
                }
                dependency => {
                    let any_field_input = dependency_inputs(dependency, node).into_iter().any(|input| {
                        cache.sockets()[input].available && !states[input].is_single
                    });
                    if any_field_input {
                        states[output].is_single = false;
                    }
                }
            }
        }
    }
}

fn find_group_output_dependencies(
    cache: &TopologyCache,
    interfaces: &[FieldInferencingInterface],
    states: &[SocketFieldState],
    group_output_socket: usize,
) -> OutputFieldDependency {
    if !cache.sockets()[group_output_socket].socket_type.is_field_type() {
        return OutputFieldDependency::ForDataSource;
    }

    // A set instead of a flag per socket, only few sockets are usually visited.
    let mut handled = HashSet::from([group_output_socket]);
    let mut stack = vec![group_output_socket];
    let mut linked_input_indices: SmallVec<[usize; 4]> = SmallVec::new();

    while let Some(input) = stack.pop() {
        if !cache.is_directly_linked(input) && !states[input].is_single {
            // Implicit field input.
            return OutputFieldDependency::ForFieldSource;
        }
        for &origin in cache.directly_linked_sockets(input) {
            let origin_socket = &cache.sockets()[origin];
            let origin_node = &cache.nodes()[origin_socket.node];
            let origin_state = states[origin];

            if origin_state.is_field_source {
                if origin_node.kind != NodeKind::GroupInput {
                    return OutputFieldDependency::ForFieldSource;
                }
                if !linked_input_indices.contains(&origin_socket.index_in_node) {
                    linked_input_indices.push(origin_socket.index_in_node);
                }
            } else if !origin_state.is_single {
                let dependency = output_field_dependency(
                    &interfaces[origin_socket.node],
                    origin_socket.index_in_node,
                );
                for origin_input in dependency_inputs(dependency, origin_node) {
                    if cache.sockets()[origin_input].available
                        && !states[origin_input].is_single
                        && handled.insert(origin_input)
                    {
                        stack.push(origin_input);
                    }
                }
            }
        }
    }

    OutputFieldDependency::ForPartiallyDependentField(linked_input_indices)
}

fn determine_group_output_states(
    cache: &TopologyCache,
    interfaces: &[FieldInferencingInterface],
    states: &[SocketFieldState],
    interface: &mut FieldInferencingInterface,
) {
    let Some(group_output) = cache.group_output_node() else {
        return;
    };
    let node = &cache.nodes()[group_output];
    for (index, input) in node.inputs.clone().enumerate() {
        if cache.sockets()[input].socket_type == SocketType::Virtual {
            continue;
        }
        if let Some(slot) = interface.outputs.get_mut(index) {
            *slot = find_group_output_dependencies(cache, interfaces, states, input);
        }
    }
}

/// Display shape for a socket state.
pub fn socket_shape(state: &SocketFieldState) -> SocketShape {
    if state.is_always_single {
        SocketShape::Circle
    } else if !state.is_single {
        SocketShape::Diamond
    } else if state.requires_single {
        SocketShape::Circle
    } else {
        SocketShape::DiamondDot
    }
}

/// Run all inferencing passes over a tree without modifying it.
pub fn infer_field_states(tree: &NodeTree, groups: &GroupSnapshots) -> FieldInferencingResult {
    let cache = tree.ensure_topology_cache();
    let interfaces: Vec<FieldInferencingInterface> = (0..cache.nodes().len())
        .map(|node_index| node_field_interface(tree, &cache, node_index, groups))
        .collect();

    let mut interface = FieldInferencingInterface {
        inputs: vec![InputSocketFieldType::IsSupported; tree.interface().inputs().len()],
        outputs: vec![OutputFieldDependency::ForDataSource; tree.interface().outputs().len()],
    };
    let mut states = vec![SocketFieldState::default(); cache.sockets().len()];

    propagate_data_requirements_from_right_to_left(&cache, &interfaces, &mut states);
    determine_group_input_states(tree, &cache, &mut interface, &mut states);
    propagate_field_status_from_left_to_right(&cache, &interfaces, &mut states);
    determine_group_output_states(&cache, &interfaces, &states, &mut interface);

    FieldInferencingResult { interface, states }
}

/// Infer field states, store the interface and socket shapes on the tree.
///
/// Returns whether the tree's field interface differs from the previous
/// result, which means trees using it as a group have to be updated too.
pub fn update_field_inferencing(tree: &mut NodeTree, groups: &GroupSnapshots) -> bool {
    let result = infer_field_states(tree, groups);
    let cache = tree.ensure_topology_cache();
    for (index, state) in result.states.iter().enumerate() {
        if let Some(socket) = tree.socket_at_mut(&cache, index) {
            socket.display_shape = socket_shape(state);
        }
    }

    let changed = tree.runtime.field_inferencing_interface.as_ref() != Some(&result.interface);
    tree.runtime.field_inferencing_interface = Some(result.interface);
    changed
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::tree::{GroupSnapshot, NodeId, SocketId, TreeId, TreeInterface};
    use crate::types::{GeometryNodeTree, NodeTypeRegistry};

    fn new_tree() -> NodeTree {
        NodeTree::new(
            "Tree",
            Arc::new(GeometryNodeTree),
            Arc::new(NodeTypeRegistry::with_builtins()),
        )
    }

    fn link(tree: &mut NodeTree, from: NodeId, output: &str, to: NodeId, input: &str) {
        let from = tree.find_output(from, output).unwrap();
        let to = tree.find_input(to, input).unwrap();
        tree.add_link(from, to).unwrap();
    }

    fn state(tree: &NodeTree, result: &FieldInferencingResult, socket: SocketId) -> SocketFieldState {
        let cache = tree.ensure_topology_cache();
        result.states[cache.socket_index(socket).unwrap()]
    }

    #[test]
    fn single_value_inputs_always_require_single() {
        let mut tree = new_tree();
        let position = tree.add_node("GeometryNodeInputPosition");
        let grid = tree.add_node("GeometryNodeMeshGrid");
        link(&mut tree, position, "Position", grid, "Size X");

        let result = infer_field_states(&tree, &GroupSnapshots::new());
        let size_x = state(&tree, &result, tree.find_input(grid, "Size X").unwrap());
        assert!(size_x.requires_single);
        assert!(size_x.is_always_single);
        assert!(size_x.is_single);
        assert_eq!(socket_shape(&size_x), SocketShape::Circle);
    }

    #[test]
    fn field_sources_are_fields_regardless_of_inputs() {
        let mut tree = new_tree();
        let index = tree.add_node("GeometryNodeInputIndex");
        let grid = tree.add_node("GeometryNodeMeshGrid");
        link(&mut tree, index, "Index", grid, "Vertices X");

        let result = infer_field_states(&tree, &GroupSnapshots::new());
        let output = state(&tree, &result, tree.find_output(index, "Index").unwrap());
        assert!(!output.is_single);
        assert!(output.is_field_source);
        assert_eq!(socket_shape(&output), SocketShape::Diamond);
    }

    #[test]
    fn implicit_field_inputs_are_fields_when_unlinked() {
        let mut tree = new_tree();
        let set_position = tree.add_node("GeometryNodeSetPosition");

        let result = infer_field_states(&tree, &GroupSnapshots::new());
        let position = state(&tree, &result, tree.find_input(set_position, "Position").unwrap());
        let offset = state(&tree, &result, tree.find_input(set_position, "Offset").unwrap());
        assert!(!position.is_single);
        assert!(offset.is_single);
        assert_eq!(socket_shape(&offset), SocketShape::DiamondDot);
    }

    #[test]
    fn partially_dependent_outputs_only_follow_listed_inputs() {
        let mut tree = new_tree();
        let index = tree.add_node("GeometryNodeInputIndex");
        let position = tree.add_node("GeometryNodeInputPosition");
        let sample = tree.add_node("GeometryNodeSampleIndex");
        let viewer = tree.add_node("GeometryNodeViewer");
        link(&mut tree, position, "Position", sample, "Value");
        link(&mut tree, sample, "Value", viewer, "Value");

        let result = infer_field_states(&tree, &GroupSnapshots::new());
        assert!(state(&tree, &result, tree.find_output(sample, "Value").unwrap()).is_single);

        link(&mut tree, index, "Index", sample, "Index");
        let result = infer_field_states(&tree, &GroupSnapshots::new());
        assert!(!state(&tree, &result, tree.find_output(sample, "Value").unwrap()).is_single);
    }

    #[test]
    fn group_inputs_linked_to_single_values_do_not_support_fields() {
        let mut tree = new_tree();
        tree.interface_add_input("Size", SocketType::Float);
        tree.interface_add_input("Geometry", SocketType::Geometry);
        tree.interface_add_input("Offset", SocketType::Vector);
        let input = tree.add_node("NodeGroupInput");
        let grid = tree.add_node("GeometryNodeMeshGrid");
        let set_position = tree.add_node("GeometryNodeSetPosition");
        let sockets: Vec<_> = tree.node(input).unwrap().outputs().iter().map(|s| s.id()).collect();
        tree.add_link(sockets[0], tree.find_input(grid, "Size X").unwrap()).unwrap();
        tree.add_link(sockets[2], tree.find_input(set_position, "Offset").unwrap()).unwrap();

        let result = infer_field_states(&tree, &GroupSnapshots::new());
        assert_eq!(
            result.interface.inputs,
            vec![
                InputSocketFieldType::None,
                InputSocketFieldType::None,
                InputSocketFieldType::IsSupported,
            ]
        );
        assert!(state(&tree, &result, sockets[2]).is_field_source);
        assert!(state(&tree, &result, sockets[0]).requires_single);
    }

    #[test]
    fn outputs_depending_on_several_inputs_are_deduplicated() {
        let mut tree = new_tree();
        tree.interface_add_input("A", SocketType::Float);
        tree.interface_add_input("B", SocketType::Float);
        tree.interface_add_output("Result", SocketType::Float);
        let input = tree.add_node("NodeGroupInput");
        let output = tree.add_node("NodeGroupOutput");
        let first = tree.add_node("FunctionNodeMath");
        let second = tree.add_node("FunctionNodeMath");
        let combine = tree.add_node("FunctionNodeMath");

        let inputs: Vec<_> = tree.node(input).unwrap().outputs().iter().map(|s| s.id()).collect();
        for math in [first, second] {
            tree.add_link(inputs[0], tree.find_input(math, "A").unwrap()).unwrap();
            tree.add_link(inputs[1], tree.find_input(math, "B").unwrap()).unwrap();
        }
        link(&mut tree, first, "Value", combine, "A");
        link(&mut tree, second, "Value", combine, "B");
        let result_socket = tree.node(output).unwrap().inputs()[0].id();
        tree.add_link(tree.find_output(combine, "Value").unwrap(), result_socket).unwrap();

        let result = infer_field_states(&tree, &GroupSnapshots::new());
        match &result.interface.outputs[0] {
            OutputFieldDependency::ForPartiallyDependentField(indices) => {
                let mut indices = indices.to_vec();
                indices.sort_unstable();
                assert_eq!(indices, vec![0, 1]);
            }
            other => panic!("unexpected dependency {other:?}"),
        }
    }

    #[test]
    fn field_sources_inside_the_group_make_the_output_a_source() {
        let mut tree = new_tree();
        tree.interface_add_output("Position", SocketType::Vector);
        let output = tree.add_node("NodeGroupOutput");
        let position = tree.add_node("GeometryNodeInputPosition");
        let result_socket = tree.node(output).unwrap().inputs()[0].id();
        tree.add_link(tree.find_output(position, "Position").unwrap(), result_socket)
            .unwrap();

        assert!(update_field_inferencing(&mut tree, &GroupSnapshots::new()));
        assert_eq!(
            tree.field_inferencing_interface().unwrap().outputs,
            vec![OutputFieldDependency::ForFieldSource]
        );
        assert_eq!(tree.socket(result_socket).unwrap().display_shape(), SocketShape::Diamond);
        // Same result the second time.
        assert!(!update_field_inferencing(&mut tree, &GroupSnapshots::new()));
    }

    #[test]
    fn group_nodes_use_the_referenced_interface() {
        let mut child = TreeInterface::default();
        child.add_output("Field", SocketType::Float);
        let snapshot = GroupSnapshot {
            interface: child,
            field_interface: Some(FieldInferencingInterface {
                inputs: Vec::new(),
                outputs: vec![OutputFieldDependency::ForFieldSource],
            }),
            contains_output: false,
        };
        let groups = GroupSnapshots::single(TreeId::from(7), snapshot);

        let mut tree = new_tree();
        let group = tree.add_node("GeometryNodeGroup");
        tree.set_node_group(group, Some(TreeId::from(7)), &groups).unwrap();
        let output = tree.node(group).unwrap().outputs()[0].id();

        let result = infer_field_states(&tree, &groups);
        assert!(state(&tree, &result, output).is_field_source);

        // Without the snapshot the group is treated like plain data.
        let result = infer_field_states(&tree, &GroupSnapshots::new());
        let missing = state(&tree, &result, output);
        assert!(missing.is_single && missing.is_always_single);
    }

}
