//! Links

use super::ids::{LinkId, NodeId, SocketId};

/// Connection from an output socket to an input socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub(crate) id: LinkId,
    pub(crate) from_node: NodeId,
    pub(crate) from_socket: SocketId,
    pub(crate) to_node: NodeId,
    pub(crate) to_socket: SocketId,
    pub(crate) muted: bool,
    /// Position among the links of a multi-input socket. Higher comes first.
    pub(crate) multi_input_sort_id: i32,
    /// Cleared by the updater for links going backwards or between
    /// incompatible sockets.
    pub(crate) valid: bool,
}

impl Link {
    pub fn id(&self) -> LinkId {
        self.id
    }

    pub fn from_node(&self) -> NodeId {
        self.from_node
    }

    pub fn from_socket(&self) -> SocketId {
        self.from_socket
    }

    pub fn to_node(&self) -> NodeId {
        self.to_node
    }

    pub fn to_socket(&self) -> SocketId {
        self.to_socket
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn multi_input_sort_id(&self) -> i32 {
        self.multi_input_sort_id
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }
}
