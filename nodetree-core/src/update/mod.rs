//! Change Tracking and Incremental Updates
//!
//! Edits don't recompute anything on their own. They record what changed
//! as [`ChangedFlag`]s on the tree, node and socket (see [`tag`]), and an
//! update later does the minimal work the flags call for.
//!
//! # Overview
//!
//! - [`update_tree`] brings a single tree up to date: socket state, node
//!   declarations, internal links, field inferencing, output change
//!   detection and link validation.
//! - The main updater, reached through [`Main::update_all`] and friends,
//!   orders trees by their group dependencies and forwards changes from a
//!   group to the trees using it.
//!
//! [`Main::update_all`]: crate::main_db::Main::update_all

mod flags;
mod internal_links;
mod main_updater;
mod output_changed;
mod relations;
mod session;
pub mod tag;
mod tree_update;

pub use flags::ChangedFlag;
pub use main_updater::UpdateCallbacks;
pub(crate) use main_updater::NodeTreeMainUpdater;
pub use output_changed::check_if_output_changed;
pub use relations::{NodeTreeRelations, ObjectModifierPair, TreeNodePair};
pub use session::{SessionFlag, UpdateSession};
pub use tree_update::{update_tree, TreeUpdateResult};
