//! Nodes and Sockets
//!
//! A node owns its input and output sockets. Sockets are created from the
//! node type's declaration and keep their id for as long as their identifier
//! survives re-declaration, so links attached to them stay intact.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ids::{IdRef, NodeId, SocketId, TreeId};
use crate::types::{
    InputSocketFieldType, NodeKind, NodeType, OutputFieldDependency, SocketDeclaration, SocketType,
};
use crate::update::ChangedFlag;

/// Direction of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InOut {
    In,
    Out,
}

impl InOut {
    pub fn as_str(self) -> &'static str {
        match self {
            InOut::In => "input",
            InOut::Out => "output",
        }
    }

    pub fn is_input(self) -> bool {
        self == InOut::In
    }
}

/// Display hint derived from field inferencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SocketShape {
    /// Single value only.
    #[default]
    Circle,
    /// Carries a field.
    Diamond,
    /// Single value that could also be a field.
    DiamondDot,
}

/// A typed connection point on a node.
#[derive(Debug, Clone)]
pub struct Socket {
    pub(crate) id: SocketId,
    pub(crate) node: NodeId,
    pub(crate) in_out: InOut,
    pub(crate) identifier: String,
    pub(crate) name: String,
    pub(crate) socket_type: SocketType,
    pub(crate) input_field_type: InputSocketFieldType,
    pub(crate) output_field_dependency: OutputFieldDependency,
    pub(crate) is_multi_input: bool,
    pub(crate) no_internal_link: bool,
    pub(crate) available: bool,
    pub(crate) changed: ChangedFlag,

    // Refreshed by the updater.
    pub(crate) in_use: bool,
    pub(crate) link: Option<super::LinkId>,
    pub(crate) display_shape: SocketShape,
}

impl Socket {
    pub(crate) fn from_declaration(
        id: SocketId,
        node: NodeId,
        in_out: InOut,
        decl: &SocketDeclaration,
    ) -> Self {
        Self {
            id,
            node,
            in_out,
            identifier: decl.identifier.clone(),
            name: decl.name.clone(),
            socket_type: decl.socket_type,
            input_field_type: decl.input_field_type,
            output_field_dependency: decl.output_field_dependency.clone(),
            is_multi_input: decl.is_multi_input,
            no_internal_link: decl.no_internal_link,
            available: true,
            changed: ChangedFlag::NOTHING,
            in_use: false,
            link: None,
            display_shape: SocketShape::default(),
        }
    }

    /// Copy the declared properties over, returning whether anything changed.
    pub(crate) fn apply_declaration(&mut self, decl: &SocketDeclaration) -> bool {
        let changed = self.name != decl.name
            || self.socket_type != decl.socket_type
            || self.input_field_type != decl.input_field_type
            || self.output_field_dependency != decl.output_field_dependency
            || self.is_multi_input != decl.is_multi_input
            || self.no_internal_link != decl.no_internal_link;
        if changed {
            self.name = decl.name.clone();
            self.socket_type = decl.socket_type;
            self.input_field_type = decl.input_field_type;
            self.output_field_dependency = decl.output_field_dependency.clone();
            self.is_multi_input = decl.is_multi_input;
            self.no_internal_link = decl.no_internal_link;
        }
        changed
    }

    pub fn id(&self) -> SocketId {
        self.id
    }

    /// The node owning this socket.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn in_out(&self) -> InOut {
        self.in_out
    }

    pub fn is_input(&self) -> bool {
        self.in_out == InOut::In
    }

    pub fn is_output(&self) -> bool {
        self.in_out == InOut::Out
    }

    /// Stable name used to match sockets across re-declarations.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn socket_type(&self) -> SocketType {
        self.socket_type
    }

    pub fn input_field_type(&self) -> InputSocketFieldType {
        self.input_field_type
    }

    pub fn output_field_dependency(&self) -> &OutputFieldDependency {
        &self.output_field_dependency
    }

    pub fn is_multi_input(&self) -> bool {
        self.is_multi_input
    }

    pub fn no_internal_link(&self) -> bool {
        self.no_internal_link
    }

    /// Unavailable sockets are hidden and skipped by every traversal.
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// The extend placeholder of group input/output nodes.
    pub fn is_virtual(&self) -> bool {
        self.socket_type == SocketType::Virtual
    }

    pub fn changed_flag(&self) -> ChangedFlag {
        self.changed
    }

    /// Whether any unmuted link is attached.
    pub fn is_in_use(&self) -> bool {
        self.in_use
    }

    /// First link into this input, as of the last update.
    pub fn link(&self) -> Option<super::LinkId> {
        self.link
    }

    pub fn display_shape(&self) -> SocketShape {
        self.display_shape
    }
}

/// Pass-through used when the node is muted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InternalLink {
    /// Input socket providing the value.
    pub from: SocketId,
    /// Output socket receiving it.
    pub to: SocketId,
}

/// A node instance.
#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) node_type: Arc<dyn NodeType>,
    pub(crate) inputs: Vec<Socket>,
    pub(crate) outputs: Vec<Socket>,
    pub(crate) muted: bool,
    pub(crate) is_function_node: bool,
    pub(crate) group: Option<TreeId>,
    pub(crate) id_ref: Option<IdRef>,
    pub(crate) is_active_output: bool,
    pub(crate) show_preview: bool,
    pub(crate) internal_links: Vec<InternalLink>,
    pub(crate) changed: ChangedFlag,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, node_type: Arc<dyn NodeType>) -> Self {
        Self {
            id,
            name,
            node_type,
            inputs: Vec::new(),
            outputs: Vec::new(),
            muted: false,
            is_function_node: false,
            group: None,
            id_ref: None,
            is_active_output: false,
            show_preview: false,
            internal_links: Vec::new(),
            changed: ChangedFlag::NOTHING,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_type(&self) -> &Arc<dyn NodeType> {
        &self.node_type
    }

    pub fn idname(&self) -> &str {
        self.node_type.idname()
    }

    pub fn kind(&self) -> NodeKind {
        self.node_type.kind()
    }

    pub fn is_reroute(&self) -> bool {
        self.kind() == NodeKind::Reroute
    }

    pub fn is_group(&self) -> bool {
        self.kind() == NodeKind::Group
    }

    pub fn is_group_input(&self) -> bool {
        self.kind() == NodeKind::GroupInput
    }

    pub fn is_group_output(&self) -> bool {
        self.kind() == NodeKind::GroupOutput
    }

    pub fn is_undefined(&self) -> bool {
        self.kind() == NodeKind::Undefined
    }

    pub fn inputs(&self) -> &[Socket] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Socket] {
        &self.outputs
    }

    pub fn sockets(&self, in_out: InOut) -> &[Socket] {
        match in_out {
            InOut::In => &self.inputs,
            InOut::Out => &self.outputs,
        }
    }

    pub(crate) fn sockets_mut(&mut self, in_out: InOut) -> &mut Vec<Socket> {
        match in_out {
            InOut::In => &mut self.inputs,
            InOut::Out => &mut self.outputs,
        }
    }

    pub fn input_by_identifier(&self, identifier: &str) -> Option<&Socket> {
        self.inputs.iter().find(|s| s.identifier == identifier)
    }

    pub fn output_by_identifier(&self, identifier: &str) -> Option<&Socket> {
        self.outputs.iter().find(|s| s.identifier == identifier)
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Every input supports fields and every output depends on all inputs.
    pub fn is_function_node(&self) -> bool {
        self.is_function_node
    }

    /// Tree referenced by a group node.
    pub fn group(&self) -> Option<TreeId> {
        self.group
    }

    /// Data-block the node points at (image, object, ...).
    pub fn id_ref(&self) -> Option<IdRef> {
        self.id_ref
    }

    /// Whether this is the output node that is used when there are several.
    pub fn is_active_output(&self) -> bool {
        self.is_active_output
    }

    pub fn show_preview(&self) -> bool {
        self.show_preview
    }

    pub fn internal_links(&self) -> &[InternalLink] {
        &self.internal_links
    }

    pub fn changed_flag(&self) -> ChangedFlag {
        self.changed
    }

    /// Whether the node produces a visible result of the tree.
    pub fn is_output_node(&self) -> bool {
        self.node_type.is_output() || self.is_group_output()
    }

    pub(crate) fn find_socket(&self, socket: SocketId) -> Option<(InOut, usize)> {
        if let Some(index) = self.inputs.iter().position(|s| s.id == socket) {
            return Some((InOut::In, index));
        }
        self.outputs
            .iter()
            .position(|s| s.id == socket)
            .map(|index| (InOut::Out, index))
    }
}
