//! Nodetree Core
//!
//! Runtime data and update engine for node trees: graphs of nodes with typed
//! input and output sockets connected by links.
//!
//! It implements:
//!
//! - A lazily rebuilt topology cache with logical link resolution through
//!   reroutes and muted nodes, and topological orders in both directions
//! - Field inferencing for geometry trees
//! - Change tracking through tags and an incremental updater that only
//!   recomputes what the tags call for
//! - Propagation of changes through node groups, in dependency order
//!
//! # Architecture
//!
//! - `types`: socket types, node and tree type descriptors, the registry
//! - `tree`: the editable node tree data model
//! - `runtime`: the topology cache derived from a tree
//! - `field`: field inferencing
//! - `update`: change flags, tagging API and the updaters
//! - `main_db`: the database owning all trees and objects
//!
//! # Example
//!
//! ```rust
//! use nodetree_core::{Main, TreeKind, UpdateCallbacks};
//!
//! let mut main = Main::new();
//! let id = main.new_tree("Geometry Nodes", TreeKind::Geometry);
//! let tree = main.tree_mut(id).unwrap();
//! let position = tree.add_node("GeometryNodeInputPosition");
//! let set_position = tree.add_node("GeometryNodeSetPosition");
//! let from = tree.find_output(position, "Position").unwrap();
//! let to = tree.find_input(set_position, "Offset").unwrap();
//! tree.add_link(from, to).unwrap();
//!
//! let mut updated = 0;
//! main.update_all(&mut UpdateCallbacks::new().on_tree_changed(|_, _| updated += 1));
//! assert_eq!(updated, 1);
//! ```

pub mod config;
pub mod error;
pub mod field;
pub mod main_db;
pub mod runtime;
pub mod tree;
pub mod types;
pub mod update;

pub use config::{DriverPolicy, UpdateSettings};
pub use error::{NodeTreeError, Result};
pub use field::{FieldInferencingInterface, SocketFieldState};
pub use main_db::{InterfaceConsumer, Main, ModifierInput, NodesModifier, Object};
pub use runtime::{ToposortDirection, TopologyCache};
pub use tree::{IdRef, InOut, LinkId, NodeId, NodeTree, ObjectId, SocketId, TreeId};
pub use types::{NodeTypeRegistry, SocketType, TreeKind};
pub use update::{tag, update_tree, ChangedFlag, UpdateCallbacks, UpdateSession};
