//! Error Types
//!
//! The update engine itself never fails: cycles, missing types and disabled
//! sockets degrade into flags or skipped work. Errors only surface on the
//! editing side, where a caller hands us an id that does not resolve or asks
//! for a link that cannot exist.

use thiserror::Error;

use crate::tree::{LinkId, NodeId, ObjectId, SocketId, TreeId};

/// Errors returned by the editing API.
#[derive(Debug, Error)]
pub enum NodeTreeError {
    #[error("node {0:?} does not exist in this tree")]
    NodeNotFound(NodeId),

    #[error("socket {0:?} does not exist in this tree")]
    SocketNotFound(SocketId),

    #[error("node {node:?} has no {in_out} socket named {identifier:?}")]
    SocketIdentifierNotFound {
        node: NodeId,
        in_out: &'static str,
        identifier: String,
    },

    #[error("link {0:?} does not exist in this tree")]
    LinkNotFound(LinkId),

    #[error("node tree {0:?} is not part of this database")]
    TreeNotFound(TreeId),

    #[error("object {0:?} is not part of this database")]
    ObjectNotFound(ObjectId),

    #[error("object {object:?} has no modifier at index {index}")]
    ModifierNotFound { object: ObjectId, index: usize },

    #[error("links must go from an output socket to an input socket")]
    InvalidLinkDirection,

    #[error("a node type named {0:?} is already registered")]
    DuplicateNodeType(String),

    #[error("invalid update settings: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Result alias used throughout the editing API.
pub type Result<T> = std::result::Result<T, NodeTreeError>;
