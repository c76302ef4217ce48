//! Node and Tree Types
//!
//! Type descriptors shared by all instances: socket data types, the
//! `NodeType` capability interface, tree types and the registry that resolves
//! idnames to implementations.
//!
//! # Dispatch
//!
//! Every node stores the `Arc<dyn NodeType>` it was created with, so the
//! update passes never go back to the registry. A node whose idname is not
//! registered gets an [`UndefinedNodeType`], which declares no field support
//! and plain data outputs. The rest of the pipeline treats it like any other
//! node.

pub mod builtin;
mod node_type;
mod registry;
mod socket_type;
mod tree_type;

pub use node_type::{
    DeclareContext, InputSocketFieldType, NodeDeclaration, NodeKind, NodeType,
    OutputFieldDependency, SocketDeclaration, UndefinedNodeType,
};
pub use registry::NodeTypeRegistry;
pub use socket_type::SocketType;
pub use tree_type::{GeometryNodeTree, ShaderNodeTree, TreeKind, TreeType};
