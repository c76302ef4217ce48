//! Built-in Node Types
//!
//! The structural node types every tree needs (reroutes, group nodes and the
//! group boundary nodes) plus a handful of geometry and shader nodes that
//! cover each field behavior.

use std::sync::Arc;

use super::node_type::{DeclareContext, NodeDeclaration, NodeKind, NodeType, SocketDeclaration};
use super::socket_type::SocketType;
use crate::tree::{GroupSnapshots, InOut, NodeId, NodeTree};

/// Identifier of the placeholder socket on group input/output nodes.
pub const EXTEND_SOCKET_IDENTIFIER: &str = "__extend__";

/// All built-in node types.
pub fn all() -> Vec<Arc<dyn NodeType>> {
    vec![
        Arc::new(NodeReroute),
        Arc::new(NodeGroupInput),
        Arc::new(NodeGroupOutput),
        Arc::new(NodeGroup::geometry()),
        Arc::new(NodeGroup::shader()),
        Arc::new(FunctionNodeMath),
        Arc::new(GeometryNodeInputPosition),
        Arc::new(GeometryNodeInputIndex),
        Arc::new(GeometryNodeSetPosition),
        Arc::new(GeometryNodeMeshGrid),
        Arc::new(GeometryNodeJoinGeometry),
        Arc::new(GeometryNodeSampleIndex),
        Arc::new(GeometryNodeObjectInfo),
        Arc::new(GeometryNodeViewer),
        Arc::new(ShaderNodeTexImage),
        Arc::new(ShaderNodeNormal),
        Arc::new(ShaderNodeBsdfDiffuse),
        Arc::new(ShaderNodeOutputMaterial),
    ]
}

fn extend_socket() -> SocketDeclaration {
    SocketDeclaration::new("", SocketType::Virtual).with_identifier(EXTEND_SOCKET_IDENTIFIER)
}

/// Turn a link into the extend socket into a new interface socket.
///
/// The new socket takes the type and name of the socket on the other end of
/// the first link, and every link into the extend socket is moved over.
fn grow_interface_from_extend_socket(
    tree: &mut NodeTree,
    node: NodeId,
    in_out: InOut,
    groups: &GroupSnapshots,
) {
    let Some(extend) = tree
        .node(node)
        .and_then(|node| node.sockets(in_out).last())
        .filter(|socket| socket.is_virtual())
    else {
        return;
    };
    let links = tree.links_on_socket(extend.id());
    let Some(first) = links.first().and_then(|id| tree.link(*id)) else {
        return;
    };
    let other = match in_out {
        InOut::Out => first.to_socket(),
        InOut::In => first.from_socket(),
    };
    let Some((name, socket_type)) = tree
        .socket(other)
        .map(|socket| (socket.name().to_string(), socket.socket_type()))
    else {
        return;
    };
    if socket_type == SocketType::Virtual {
        // Extend socket linked to another extend socket.
        for link in links {
            let _ = tree.remove_link(link);
        }
        return;
    }

    let identifier = match in_out {
        InOut::Out => tree.interface_add_input(name, socket_type),
        InOut::In => tree.interface_add_output(name, socket_type),
    };
    if tree.redeclare_node(node, groups).is_err() {
        return;
    }
    let Ok(new_socket) = tree.find_socket(node, in_out, &identifier) else {
        return;
    };
    for link in links {
        let _ = tree.relink(link, in_out, new_socket);
    }
}

#[derive(Debug)]
pub struct NodeReroute;

impl NodeType for NodeReroute {
    fn idname(&self) -> &str {
        "NodeReroute"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Reroute
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("Input", SocketType::Color))
            .output(SocketDeclaration::new("Output", SocketType::Color))
    }
}

#[derive(Debug)]
pub struct NodeGroupInput;

impl NodeType for NodeGroupInput {
    fn idname(&self) -> &str {
        "NodeGroupInput"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::GroupInput
    }

    fn declare(&self, ctx: &DeclareContext<'_>) -> NodeDeclaration {
        let mut decl = NodeDeclaration::new();
        for socket in ctx.interface.inputs() {
            decl = decl.output(
                SocketDeclaration::new(socket.name(), socket.socket_type())
                    .with_identifier(socket.identifier()),
            );
        }
        decl.output(extend_socket())
    }

    fn update(&self, tree: &mut NodeTree, node: NodeId, groups: &GroupSnapshots) {
        grow_interface_from_extend_socket(tree, node, InOut::Out, groups);
    }
}

#[derive(Debug)]
pub struct NodeGroupOutput;

impl NodeType for NodeGroupOutput {
    fn idname(&self) -> &str {
        "NodeGroupOutput"
    }

    fn kind(&self) -> NodeKind {
        NodeKind::GroupOutput
    }

    fn declare(&self, ctx: &DeclareContext<'_>) -> NodeDeclaration {
        let mut decl = NodeDeclaration::new();
        for socket in ctx.interface.outputs() {
            decl = decl.input(
                SocketDeclaration::new(socket.name(), socket.socket_type())
                    .with_identifier(socket.identifier()),
            );
        }
        decl.input(extend_socket())
    }

    fn update(&self, tree: &mut NodeTree, node: NodeId, groups: &GroupSnapshots) {
        grow_interface_from_extend_socket(tree, node, InOut::In, groups);
    }
}

/// Instance of another tree; its sockets mirror that tree's interface.
#[derive(Debug)]
pub struct NodeGroup {
    idname: &'static str,
}

impl NodeGroup {
    pub fn geometry() -> Self {
        Self {
            idname: "GeometryNodeGroup",
        }
    }

    pub fn shader() -> Self {
        Self {
            idname: "ShaderNodeGroup",
        }
    }
}

impl NodeType for NodeGroup {
    fn idname(&self) -> &str {
        self.idname
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Group
    }

    fn declare(&self, ctx: &DeclareContext<'_>) -> NodeDeclaration {
        let mut decl = NodeDeclaration::new();
        let Some(group) = ctx.group else {
            return decl;
        };
        for socket in group.interface.inputs() {
            decl = decl.input(
                SocketDeclaration::new(socket.name(), socket.socket_type())
                    .with_identifier(socket.identifier()),
            );
        }
        for socket in group.interface.outputs() {
            decl = decl.output(
                SocketDeclaration::new(socket.name(), socket.socket_type())
                    .with_identifier(socket.identifier()),
            );
        }
        decl
    }
}

#[derive(Debug)]
pub struct FunctionNodeMath;

impl NodeType for FunctionNodeMath {
    fn idname(&self) -> &str {
        "FunctionNodeMath"
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("A", SocketType::Float))
            .input(SocketDeclaration::new("B", SocketType::Float))
            .output(SocketDeclaration::new("Value", SocketType::Float))
            .function_node()
    }
}

#[derive(Debug)]
pub struct GeometryNodeInputPosition;

impl NodeType for GeometryNodeInputPosition {
    fn idname(&self) -> &str {
        "GeometryNodeInputPosition"
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .output(SocketDeclaration::new("Position", SocketType::Vector).field_source())
    }
}

#[derive(Debug)]
pub struct GeometryNodeInputIndex;

impl NodeType for GeometryNodeInputIndex {
    fn idname(&self) -> &str {
        "GeometryNodeInputIndex"
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new().output(SocketDeclaration::new("Index", SocketType::Int).field_source())
    }
}

#[derive(Debug)]
pub struct GeometryNodeSetPosition;

impl NodeType for GeometryNodeSetPosition {
    fn idname(&self) -> &str {
        "GeometryNodeSetPosition"
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("Geometry", SocketType::Geometry))
            .input(SocketDeclaration::new("Selection", SocketType::Bool).supports_field())
            .input(SocketDeclaration::new("Position", SocketType::Vector).implicit_field())
            .input(SocketDeclaration::new("Offset", SocketType::Vector).supports_field())
            .output(SocketDeclaration::new("Geometry", SocketType::Geometry))
    }
}

#[derive(Debug)]
pub struct GeometryNodeMeshGrid;

impl NodeType for GeometryNodeMeshGrid {
    fn idname(&self) -> &str {
        "GeometryNodeMeshGrid"
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("Size X", SocketType::Float))
            .input(SocketDeclaration::new("Size Y", SocketType::Float))
            .input(SocketDeclaration::new("Vertices X", SocketType::Int))
            .input(SocketDeclaration::new("Vertices Y", SocketType::Int))
            .output(SocketDeclaration::new("Mesh", SocketType::Geometry))
    }
}

#[derive(Debug)]
pub struct GeometryNodeJoinGeometry;

impl NodeType for GeometryNodeJoinGeometry {
    fn idname(&self) -> &str {
        "GeometryNodeJoinGeometry"
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("Geometry", SocketType::Geometry).multi_input())
            .output(SocketDeclaration::new("Geometry", SocketType::Geometry))
    }
}

#[derive(Debug)]
pub struct GeometryNodeSampleIndex;

impl NodeType for GeometryNodeSampleIndex {
    fn idname(&self) -> &str {
        "GeometryNodeSampleIndex"
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("Geometry", SocketType::Geometry))
            .input(SocketDeclaration::new("Value", SocketType::Float).supports_field())
            .input(SocketDeclaration::new("Index", SocketType::Int).supports_field())
            .output(SocketDeclaration::new("Value", SocketType::Float).field_on([2]))
    }
}

#[derive(Debug)]
pub struct GeometryNodeObjectInfo;

impl NodeType for GeometryNodeObjectInfo {
    fn idname(&self) -> &str {
        "GeometryNodeObjectInfo"
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("Object", SocketType::Object))
            .output(SocketDeclaration::new("Location", SocketType::Vector))
            .output(SocketDeclaration::new("Geometry", SocketType::Geometry))
    }
}

#[derive(Debug)]
pub struct GeometryNodeViewer;

impl NodeType for GeometryNodeViewer {
    fn idname(&self) -> &str {
        "GeometryNodeViewer"
    }

    fn is_output(&self) -> bool {
        true
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("Geometry", SocketType::Geometry))
            .input(SocketDeclaration::new("Value", SocketType::Float).supports_field())
    }
}

#[derive(Debug)]
pub struct ShaderNodeTexImage;

impl NodeType for ShaderNodeTexImage {
    fn idname(&self) -> &str {
        "ShaderNodeTexImage"
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("Vector", SocketType::Vector))
            .output(SocketDeclaration::new("Color", SocketType::Color))
            .output(SocketDeclaration::new("Alpha", SocketType::Float))
    }

    // The color is only premultiplied when the alpha output is used.
    fn output_depends_on_output_link(&self, output: usize) -> Option<usize> {
        (output == 0).then_some(1)
    }
}

#[derive(Debug)]
pub struct ShaderNodeNormal;

impl NodeType for ShaderNodeNormal {
    fn idname(&self) -> &str {
        "ShaderNodeNormal"
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("Normal", SocketType::Vector))
            .output(SocketDeclaration::new("Normal", SocketType::Vector))
            .output(SocketDeclaration::new("Dot", SocketType::Float))
    }

    // The value stored in the first output is used to compute the dot product.
    fn output_reads_output(&self, output: usize) -> Option<usize> {
        (output == 1).then_some(0)
    }
}

#[derive(Debug)]
pub struct ShaderNodeBsdfDiffuse;

impl NodeType for ShaderNodeBsdfDiffuse {
    fn idname(&self) -> &str {
        "ShaderNodeBsdfDiffuse"
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("Color", SocketType::Color))
            .input(SocketDeclaration::new("Roughness", SocketType::Float))
            .output(SocketDeclaration::new("BSDF", SocketType::Shader))
    }
}

#[derive(Debug)]
pub struct ShaderNodeOutputMaterial;

impl NodeType for ShaderNodeOutputMaterial {
    fn idname(&self) -> &str {
        "ShaderNodeOutputMaterial"
    }

    fn is_output(&self) -> bool {
        true
    }

    fn declare(&self, _ctx: &DeclareContext<'_>) -> NodeDeclaration {
        NodeDeclaration::new()
            .input(SocketDeclaration::new("Surface", SocketType::Shader))
            .input(SocketDeclaration::new("Displacement", SocketType::Vector))
    }
}
