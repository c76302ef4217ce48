//! Tree Relations
//!
//! Reverse indices over a [`Main`] that the updater needs: which group nodes
//! use a tree, which modifiers use it and which data-block owns it. Each
//! index is built on first use only, most updates never need all of them.

use std::cell::OnceCell;
use std::collections::HashMap;

use crate::main_db::Main;
use crate::tree::{IdRef, NodeId, ObjectId, TreeId};

/// A group node: the tree containing it and the node.
pub type TreeNodePair = (TreeId, NodeId);

/// A nodes modifier: the object and the modifier's index in its stack.
pub type ObjectModifierPair = (ObjectId, usize);

#[derive(Debug, Default)]
pub struct NodeTreeRelations {
    group_node_users: OnceCell<HashMap<TreeId, Vec<TreeNodePair>>>,
    modifier_users: OnceCell<HashMap<TreeId, Vec<ObjectModifierPair>>>,
    owner_ids: OnceCell<HashMap<TreeId, IdRef>>,
}

impl NodeTreeRelations {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group nodes referencing `tree`, in any tree of `main`.
    pub fn group_node_users(&self, main: &Main, tree: TreeId) -> &[TreeNodePair] {
        self.group_node_users
            .get_or_init(|| {
                let mut users: HashMap<TreeId, Vec<TreeNodePair>> = HashMap::new();
                for user in main.trees() {
                    for node in user.nodes().filter(|node| node.is_group()) {
                        if let Some(group) = node.group() {
                            users.entry(group).or_default().push((user.id(), node.id()));
                        }
                    }
                }
                users
            })
            .get(&tree)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Nodes modifiers using `tree` as their node group.
    pub fn modifier_users(&self, main: &Main, tree: TreeId) -> &[ObjectModifierPair] {
        self.modifier_users
            .get_or_init(|| {
                let mut users: HashMap<TreeId, Vec<ObjectModifierPair>> = HashMap::new();
                for object in main.objects() {
                    for (index, modifier) in object.modifiers().iter().enumerate() {
                        if let Some(group) = modifier.node_group() {
                            users.entry(group).or_default().push((object.id(), index));
                        }
                    }
                }
                users
            })
            .get(&tree)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Data-block owning `tree`. Trees that aren't embedded own themselves.
    pub fn owner_id(&self, main: &Main, tree: TreeId) -> IdRef {
        self.owner_ids
            .get_or_init(|| {
                main.trees()
                    .map(|tree| (tree.id(), main.tree_owner(tree.id())))
                    .collect()
            })
            .get(&tree)
            .copied()
            .unwrap_or(IdRef::Tree(tree))
    }

    #[cfg(test)]
    pub(crate) fn has_group_node_users(&self) -> bool {
        self.group_node_users.get().is_some()
    }
}
