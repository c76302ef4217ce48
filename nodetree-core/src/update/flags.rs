//! Changed Flags

use bitflags::bitflags;

bitflags! {
    /// What changed on a tree, node or socket since the last update.
    ///
    /// Flags accumulate until the updater processed the tree, then they are
    /// reset to [`ChangedFlag::NOTHING`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChangedFlag: u32 {
        const NOTHING = 0;
        /// Something unspecific changed, everything has to be updated.
        const ANY = 1 << 0;
        const NODE_PROPERTY = 1 << 1;
        /// The output of a group node changed.
        const NODE_OUTPUT = 1 << 2;
        const INTERFACE = 1 << 3;
        const LINK = 1 << 4;
        const REMOVED_NODE = 1 << 5;
        const REMOVED_SOCKET = 1 << 6;
        const SOCKET_PROPERTY = 1 << 7;
        const INTERNAL_LINK = 1 << 8;
        const ALL = u32::MAX;
    }
}

impl Default for ChangedFlag {
    fn default() -> Self {
        Self::NOTHING
    }
}
