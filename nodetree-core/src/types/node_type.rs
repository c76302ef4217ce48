//! Node Types
//!
//! A node type is a small capability interface: it declares the sockets of
//! its instances, optionally reacts to updates, and states how values flow
//! through it as far as fields are concerned. Instances hold an
//! `Arc<dyn NodeType>` resolved once when the node is created.

use std::fmt::Debug;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::socket_type::SocketType;
use crate::tree::{GroupSnapshot, GroupSnapshots, NodeId, NodeTree, TreeInterface};

/// Structural role of a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Regular,
    /// Forwards its single input to its single output.
    Reroute,
    /// Exposes the tree's interface inputs.
    GroupInput,
    /// Receives the tree's interface outputs.
    GroupOutput,
    /// Instance of another node tree.
    Group,
    /// Type that was not registered when the node was created.
    Undefined,
}

/// How an input socket deals with fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InputSocketFieldType {
    /// Only single values are supported.
    #[default]
    None,
    /// Unconnected, the input behaves like a field (e.g. the implicit position).
    Implicit,
    /// Fields and single values are both fine.
    IsSupported,
}

/// What an output socket's field status depends on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputFieldDependency {
    /// Always a field, independent of the inputs.
    ForFieldSource,
    /// Never a field.
    ForDataSource,
    /// A field when any input is a field.
    ForDependentField,
    /// A field when any of the listed inputs is a field.
    ForPartiallyDependentField(SmallVec<[usize; 4]>),
}

impl Default for OutputFieldDependency {
    fn default() -> Self {
        OutputFieldDependency::ForDataSource
    }
}

impl OutputFieldDependency {
    /// Field if any of the given inputs is a field.
    pub fn partially_dependent(indices: impl IntoIterator<Item = usize>) -> Self {
        OutputFieldDependency::ForPartiallyDependentField(indices.into_iter().collect())
    }

    /// Inputs the output depends on. Empty unless partially dependent.
    pub fn linked_input_indices(&self) -> &[usize] {
        match self {
            OutputFieldDependency::ForPartiallyDependentField(indices) => indices,
            _ => &[],
        }
    }
}

/// Static description of a single socket.
#[derive(Debug, Clone, PartialEq)]
pub struct SocketDeclaration {
    pub identifier: String,
    pub name: String,
    pub socket_type: SocketType,
    pub input_field_type: InputSocketFieldType,
    pub output_field_dependency: OutputFieldDependency,
    pub is_multi_input: bool,
    pub no_internal_link: bool,
}

impl SocketDeclaration {
    /// A socket whose identifier and display name are the same.
    pub fn new(name: impl Into<String>, socket_type: SocketType) -> Self {
        let name = name.into();
        Self {
            identifier: name.clone(),
            name,
            socket_type,
            input_field_type: InputSocketFieldType::None,
            output_field_dependency: OutputFieldDependency::ForDataSource,
            is_multi_input: false,
            no_internal_link: false,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = identifier.into();
        self
    }

    /// The input accepts fields.
    pub fn supports_field(mut self) -> Self {
        self.input_field_type = InputSocketFieldType::IsSupported;
        self
    }

    /// An unlinked input reads an implicit field, like the position.
    pub fn implicit_field(mut self) -> Self {
        self.input_field_type = InputSocketFieldType::Implicit;
        self
    }

    /// The output always produces a field.
    pub fn field_source(mut self) -> Self {
        self.output_field_dependency = OutputFieldDependency::ForFieldSource;
        self
    }

    /// The output is a field if any field-supporting input is.
    pub fn dependent_field(mut self) -> Self {
        self.output_field_dependency = OutputFieldDependency::ForDependentField;
        self
    }

    /// The output is a field if any of the listed inputs is.
    pub fn field_on(mut self, inputs: impl IntoIterator<Item = usize>) -> Self {
        self.output_field_dependency = OutputFieldDependency::partially_dependent(inputs);
        self
    }

    /// The input accepts several links.
    pub fn multi_input(mut self) -> Self {
        self.is_multi_input = true;
        self
    }

    /// Excluded from the internal links of a muted node.
    pub fn no_internal_link(mut self) -> Self {
        self.no_internal_link = true;
        self
    }
}

/// Socket layout of a node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeDeclaration {
    pub inputs: Vec<SocketDeclaration>,
    pub outputs: Vec<SocketDeclaration>,
    /// Every input supports fields and every output depends on all inputs.
    pub is_function_node: bool,
}

impl NodeDeclaration {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input(mut self, socket: SocketDeclaration) -> Self {
        self.inputs.push(socket);
        self
    }

    pub fn output(mut self, socket: SocketDeclaration) -> Self {
        self.outputs.push(socket);
        self
    }

    /// Declare the node as a function node.
    pub fn function_node(mut self) -> Self {
        self.is_function_node = true;
        self
    }
}

/// What a declaration may look at.
pub struct DeclareContext<'a> {
    /// Interface of the tree the node lives in.
    pub interface: &'a TreeInterface,
    /// Snapshot of the referenced tree, for group nodes.
    pub group: Option<&'a GroupSnapshot>,
}

/// Behavior shared by all nodes of one type.
pub trait NodeType: Send + Sync + Debug {
    /// Unique name the type is registered under.
    fn idname(&self) -> &str;

    fn kind(&self) -> NodeKind {
        NodeKind::Regular
    }

    /// Whether the node is a visible result of the tree (material output,
    /// viewer, ...). Used to find what the tree's output depends on.
    fn is_output(&self) -> bool {
        false
    }

    fn declare(&self, ctx: &DeclareContext<'_>) -> NodeDeclaration;

    /// Called when the node was tagged for an update, after its sockets were
    /// synchronized with [`NodeType::declare`].
    fn update(&self, _tree: &mut NodeTree, _node: NodeId, _groups: &GroupSnapshots) {}

    /// Output whose connection state changes the value of `output`.
    fn output_depends_on_output_link(&self, _output: usize) -> Option<usize> {
        None
    }

    /// Output whose value is read when computing `output`.
    fn output_reads_output(&self, _output: usize) -> Option<usize> {
        None
    }
}

/// Stand-in for node types that are not registered.
///
/// Such nodes keep whatever sockets they were given, never support fields
/// and always output plain data.
#[derive(Debug)]
pub struct UndefinedNodeType {
    idname: String,
}

impl UndefinedNodeType {
    /// Placeholder for a node whose type isn't registered.
    pub fn new(idname: impl Into<String>) -> Self {
        Self {
            idname: idname.into(),
        }
    }
}

impl NodeType for UndefinedNodeType {
    fn idname(&self) -> &str {
        &self.idname
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Undefined
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn declaration_builder() {
        let decl = NodeDeclaration::new()
            .input(SocketDeclaration::new("A", SocketType::Float).supports_field())
            .input(SocketDeclaration::new("Position", SocketType::Vector).implicit_field())
            .output(SocketDeclaration::new("Value", SocketType::Float).field_on([0]));

        assert_eq!(decl.inputs.len(), 2);
        assert_eq!(decl.inputs[0].input_field_type, InputSocketFieldType::IsSupported);
        assert_eq!(decl.inputs[1].input_field_type, InputSocketFieldType::Implicit);
        assert_eq!(
            decl.outputs[0].output_field_dependency.linked_input_indices(),
            &[0]
        );
        assert!(!decl.is_function_node);
    }

    #[test]
    fn undefined_type_declares_nothing() {
        let interface = TreeInterface::default();
        let ty = UndefinedNodeType::new("SomePluginNode");
        let decl = ty.declare(&DeclareContext {
            interface: &interface,
            group: None,
        });
        assert_eq!(ty.idname(), "SomePluginNode");
        assert_eq!(ty.kind(), NodeKind::Undefined);
        assert!(decl.inputs.is_empty() && decl.outputs.is_empty());
    }
}
