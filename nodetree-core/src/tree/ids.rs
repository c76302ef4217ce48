//! Identifiers
//!
//! Everything inside a tree is addressed by small integer ids allocated by
//! the tree itself. Trees and objects get their ids from [`Main`](crate::Main).
//! Ids are never reused within their owner, so a stale id simply fails to
//! resolve.

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident($repr:ty)) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name($repr);

        impl $name {
            /// Get the raw id value.
            pub fn raw(self) -> $repr {
                self.0
            }
        }

        impl From<$repr> for $name {
            fn from(raw: $repr) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(
    /// Node tree inside a [`Main`](crate::Main) database.
    TreeId(u32)
);
define_id!(
    /// Node inside a tree.
    NodeId(u32)
);
define_id!(
    /// Socket inside a tree. Unique across all nodes of the tree.
    SocketId(u32)
);
define_id!(
    /// Link inside a tree.
    LinkId(u32)
);
define_id!(
    /// Object inside a [`Main`](crate::Main) database.
    ObjectId(u32)
);
define_id!(
    /// Opaque data-block owned by the host (images, materials, ...).
    DataId(u64)
);

/// Reference to any data-block a node can point at or a tree can be owned by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IdRef {
    Tree(TreeId),
    Object(ObjectId),
    Data(DataId),
}

impl From<TreeId> for IdRef {
    fn from(id: TreeId) -> Self {
        IdRef::Tree(id)
    }
}

impl From<ObjectId> for IdRef {
    fn from(id: ObjectId) -> Self {
        IdRef::Object(id)
    }
}

impl From<DataId> for IdRef {
    fn from(id: DataId) -> Self {
        IdRef::Data(id)
    }
}
