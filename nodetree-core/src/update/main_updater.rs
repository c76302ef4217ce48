//! Main Updater
//!
//! Updates a set of trees together with every tree that uses them as a
//! group, in dependency order.
//!
//! # How It Works
//!
//! 1. A single root whose update changes neither its interface nor its
//!    output is done after its own update.
//!
//! 2. Otherwise all trees reachable through group node users are collected
//!    and sorted so that groups come before the trees using them. Trees
//!    without changes are skipped. After a tree is updated, group nodes
//!    using it are tagged, which makes their trees update in turn.
//!
//! 3. Every updated tree gets its flags reset, modifiers using a tree with
//!    a new interface refresh their snapshot, and the callbacks run.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use tracing::{debug, debug_span, warn};

use super::relations::NodeTreeRelations;
use super::tree_update::{update_tree, TreeUpdateResult};
use super::ChangedFlag;
use crate::main_db::{InterfaceConsumer, Main};
use crate::tree::{IdRef, NodeTree, TreeId};

type TreeCallback<'a> = Box<dyn FnMut(IdRef, &NodeTree) + 'a>;

/// Notifications sent after trees were updated.
///
/// Both receive the data-block owning the tree (the tree itself unless it is
/// embedded) and the updated tree.
#[derive(Default)]
pub struct UpdateCallbacks<'a> {
    /// Called for every updated tree.
    pub tree_changed: Option<TreeCallback<'a>>,
    /// Called for updated trees whose output changed.
    pub tree_output_changed: Option<TreeCallback<'a>>,
}

impl<'a> UpdateCallbacks<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the callback for every updated tree.
    pub fn on_tree_changed(mut self, f: impl FnMut(IdRef, &NodeTree) + 'a) -> Self {
        self.tree_changed = Some(Box::new(f));
        self
    }

    /// Set the callback for trees whose output changed.
    pub fn on_tree_output_changed(mut self, f: impl FnMut(IdRef, &NodeTree) + 'a) -> Self {
        self.tree_output_changed = Some(Box::new(f));
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToposortMark {
    None,
    Temporary,
    Permanent,
}

pub(crate) struct NodeTreeMainUpdater<'m, 'c, 'a> {
    main: &'m mut Main,
    callbacks: &'c mut UpdateCallbacks<'a>,
    relations: NodeTreeRelations,
    update_results: IndexMap<TreeId, TreeUpdateResult>,
}

impl<'m, 'c, 'a> NodeTreeMainUpdater<'m, 'c, 'a> {
    pub(crate) fn new(main: &'m mut Main, callbacks: &'c mut UpdateCallbacks<'a>) -> Self {
        Self {
            main,
            callbacks,
            relations: NodeTreeRelations::new(),
            update_results: IndexMap::new(),
        }
    }

    pub(crate) fn update(&mut self) {
        let roots: Vec<TreeId> = self
            .main
            .trees()
            .filter(|tree| !tree.changed_flag().is_empty())
            .map(NodeTree::id)
            .collect();
        self.update_rooted(&roots);
    }

    pub(crate) fn update_rooted(&mut self, roots: &[TreeId]) {
        if roots.is_empty() {
            return;
        }

        let mut is_single_tree_update = false;
        if let [root] = roots {
            let Some(tree) = self.main.tree(*root) else {
                return;
            };
            if tree.changed_flag().is_empty() {
                return;
            }
            let result = self.update_tree(*root);
            self.update_results.insert(*root, result);
            is_single_tree_update = !result.interface_changed && !result.output_changed;
        }

        if !is_single_tree_update {
            for tree_id in self.tree_update_order(roots) {
                let is_tagged = self
                    .main
                    .tree(tree_id)
                    .is_some_and(|tree| !tree.changed_flag().is_empty());
                if !is_tagged {
                    continue;
                }
                let result = match self.update_results.get(&tree_id) {
                    Some(result) => *result,
                    None => {
                        let result = self.update_tree(tree_id);
                        self.update_results.insert(tree_id, result);
                        result
                    }
                };
                self.tag_group_node_users(tree_id, result);
            }
        }

        self.finish();
    }

    fn update_tree(&mut self, tree_id: TreeId) -> TreeUpdateResult {
        let groups = self.main.group_snapshots(tree_id);
        let settings = self.main.settings().clone();
        let Some(tree) = self.main.tree_mut(tree_id) else {
            return TreeUpdateResult::default();
        };
        let _span = debug_span!("update_tree", tree = tree.name()).entered();
        let result = update_tree(tree, &groups, &settings);
        debug!(
            interface_changed = result.interface_changed,
            output_changed = result.output_changed,
            "tree updated"
        );
        result
    }

    fn tag_group_node_users(&mut self, tree_id: TreeId, result: TreeUpdateResult) {
        let users = self.relations.group_node_users(&*self.main, tree_id).to_vec();
        for (user_tree, node) in users {
            let Some(tree) = self.main.tree_mut(user_tree) else {
                continue;
            };
            if result.output_changed {
                tree.add_node_tag(node, ChangedFlag::NODE_OUTPUT);
            }
            if result.interface_changed {
                tree.add_node_tag(node, ChangedFlag::NODE_PROPERTY);
            }
        }
    }

    /// Roots and every tree using them, directly or indirectly.
    fn trees_to_update(&self, roots: &[TreeId]) -> Vec<TreeId> {
        let mut seen: HashSet<TreeId> = roots.iter().copied().collect();
        let mut order: Vec<TreeId> = Vec::new();
        let mut queue: VecDeque<TreeId> = roots.iter().copied().collect();
        let mut queued = HashSet::new();
        while let Some(tree) = queue.pop_front() {
            if !queued.insert(tree) {
                continue;
            }
            order.push(tree);
            for &(user, _) in self.relations.group_node_users(&*self.main, tree) {
                if seen.insert(user) {
                    queue.push_back(user);
                }
            }
        }
        order
    }

    /// Trees to update, groups before the trees using them.
    fn tree_update_order(&self, roots: &[TreeId]) -> Vec<TreeId> {
        let trees = self.trees_to_update(roots);
        let mut marks: HashMap<TreeId, ToposortMark> =
            trees.iter().map(|&tree| (tree, ToposortMark::None)).collect();
        let mut sorted = Vec::with_capacity(trees.len());
        for &tree in &trees {
            if marks.get(&tree) == Some(&ToposortMark::None)
                && !self.visit_tree(tree, &mut marks, &mut sorted)
            {
                warn!(tree = tree.raw(), "cycle in node group dependencies");
            }
        }
        sorted.reverse();
        sorted
    }

    /// Depth first visit of the users of `tree`. Returns false if a cycle
    /// was found, the visit still completes.
    fn visit_tree(
        &self,
        tree: TreeId,
        marks: &mut HashMap<TreeId, ToposortMark>,
        sorted: &mut Vec<TreeId>,
    ) -> bool {
        let mut acyclic = true;
        marks.insert(tree, ToposortMark::Temporary);
        for &(user, _) in self.relations.group_node_users(&*self.main, tree) {
            match marks.get(&user) {
                None | Some(ToposortMark::Permanent) => {}
                Some(ToposortMark::Temporary) => acyclic = false,
                Some(ToposortMark::None) => acyclic &= self.visit_tree(user, marks, sorted),
            }
        }
        marks.insert(tree, ToposortMark::Permanent);
        sorted.push(tree);
        acyclic
    }

    fn finish(&mut self) {
        let results = std::mem::take(&mut self.update_results);
        for (tree_id, result) in results {
            if let Some(tree) = self.main.tree_mut(tree_id) {
                tree.reset_changed_flags();
            }
            let has_consumers = self
                .main
                .tree(tree_id)
                .is_some_and(|tree| tree.kind().has_interface_consumers());
            if result.interface_changed && has_consumers {
                let users = self.relations.modifier_users(&*self.main, tree_id).to_vec();
                let (trees, objects) = self.main.trees_and_objects_mut();
                if let Some(tree) = trees.get(&tree_id) {
                    for (object, index) in users {
                        if let Some(modifier) = objects
                            .get_mut(&object)
                            .and_then(|object| object.modifiers.get_mut(index))
                        {
                            modifier.on_interface_changed(tree);
                        }
                    }
                }
            }

            let Some(tree) = self.main.tree(tree_id) else {
                continue;
            };
            let owner = self.relations.owner_id(&*self.main, tree_id);
            if let Some(tree_changed) = self.callbacks.tree_changed.as_mut() {
                tree_changed(owner, tree);
            }
            if result.output_changed {
                if let Some(output_changed) = self.callbacks.tree_output_changed.as_mut() {
                    output_changed(owner, tree);
                }
            }
        }
    }
}
