//! Node Tree Data Model
//!
//! Arena-style storage for node trees: nodes and links live in
//! insertion-ordered maps keyed by small integer ids, sockets are owned by
//! their node, and every cross reference is an id instead of a pointer.
//!
//! # Ownership
//!
//! A tree exclusively owns its nodes, links and runtime caches. Group nodes
//! reference other trees by [`TreeId`] only, so trees can reference each
//! other in cycles without any ownership problem.

mod ids;
mod interface;
mod link;
mod node;
mod node_tree;

pub use ids::{DataId, IdRef, LinkId, NodeId, ObjectId, SocketId, TreeId};
pub use interface::{GroupSnapshot, GroupSnapshots, InterfaceSocket, TreeInterface};
pub use link::Link;
pub use node::{InOut, InternalLink, Node, Socket, SocketShape};
pub use node_tree::{Driver, NodePreview, NodeTree, TreeRuntime};
