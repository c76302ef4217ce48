//! Main Database
//!
//! Owns all node trees and the objects whose modifiers reference them, and
//! is the entry point for updates that span several trees.
//!
//! # Example
//!
//! ```rust
//! use nodetree_core::{Main, TreeKind, UpdateCallbacks};
//!
//! let mut main = Main::new();
//! let group = main.new_tree("Group", TreeKind::Geometry);
//! let tree = main.new_tree("Geometry Nodes", TreeKind::Geometry);
//! main.add_group_node(tree, group).unwrap();
//!
//! main.update_all(&mut UpdateCallbacks::new());
//! assert!(main.tree(tree).unwrap().changed_flag().is_empty());
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use crate::config::UpdateSettings;
use crate::error::{NodeTreeError, Result};
use crate::tree::{
    GroupSnapshot, GroupSnapshots, IdRef, InterfaceSocket, NodeId, NodeTree, ObjectId, TreeId,
};
use crate::types::{
    GeometryNodeTree, InputSocketFieldType, NodeTypeRegistry, ShaderNodeTree, SocketType, TreeKind,
    TreeType,
};
use crate::update::{tag, NodeTreeMainUpdater, SessionFlag, UpdateCallbacks, UpdateSession};

/// Something outside of node trees that caches a tree's interface.
pub trait InterfaceConsumer {
    /// The interface of `tree` changed during an update.
    fn on_interface_changed(&mut self, tree: &NodeTree);
}

/// Value a modifier passes into one interface input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifierInput {
    pub identifier: String,
    pub name: String,
    pub socket_type: SocketType,
    /// Read the input from a named attribute instead of a single value.
    pub use_attribute: bool,
    /// The input accepts fields, so reading an attribute is possible.
    pub supports_attribute: bool,
}

/// A modifier evaluating a geometry node tree.
#[derive(Debug, Clone, Default)]
pub struct NodesModifier {
    name: String,
    node_group: Option<TreeId>,
    inputs: Vec<ModifierInput>,
    outputs: Vec<InterfaceSocket>,
    interface_updates: usize,
}

impl NodesModifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn node_group(&self) -> Option<TreeId> {
        self.node_group
    }

    pub fn inputs(&self) -> &[ModifierInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[InterfaceSocket] {
        &self.outputs
    }

    /// How often the interface snapshot was refreshed.
    pub fn interface_updates(&self) -> usize {
        self.interface_updates
    }

    /// Toggle attribute input. Returns false for unknown inputs and inputs
    /// that don't accept fields.
    pub fn set_use_attribute(&mut self, identifier: &str, use_attribute: bool) -> bool {
        match self
            .inputs
            .iter_mut()
            .find(|input| input.identifier == identifier && input.supports_attribute)
        {
            Some(input) => {
                input.use_attribute = use_attribute;
                true
            }
            None => false,
        }
    }
}

impl InterfaceConsumer for NodesModifier {
    /// Rebuild the inputs from the tree interface. Inputs that survive keep
    /// their attribute toggle as long as they still accept fields.
    fn on_interface_changed(&mut self, tree: &NodeTree) {
        let field_inputs = tree
            .field_inferencing_interface()
            .map(|interface| interface.inputs.as_slice());
        let inputs = tree
            .interface()
            .inputs()
            .iter()
            .enumerate()
            .map(|(index, socket)| {
                let supports_attribute = match field_inputs {
                    Some(field_inputs) => field_inputs
                        .get(index)
                        .is_some_and(|field_type| *field_type != InputSocketFieldType::None),
                    None => socket.socket_type().is_field_type(),
                };
                let was_attribute = self
                    .inputs
                    .iter()
                    .any(|input| input.identifier == socket.identifier() && input.use_attribute);
                ModifierInput {
                    identifier: socket.identifier().to_string(),
                    name: socket.name().to_string(),
                    socket_type: socket.socket_type(),
                    use_attribute: supports_attribute && was_attribute,
                    supports_attribute,
                }
            })
            .collect();
        self.inputs = inputs;
        self.outputs = tree.interface().outputs().to_vec();
        self.interface_updates += 1;
    }
}

/// An object with a modifier stack.
#[derive(Debug, Clone)]
pub struct Object {
    id: ObjectId,
    name: String,
    pub(crate) modifiers: Vec<NodesModifier>,
}

impl Object {
    pub fn id(&self) -> ObjectId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn modifiers(&self) -> &[NodesModifier] {
        &self.modifiers
    }
}

/// All node trees and objects of a file.
#[derive(Debug)]
pub struct Main {
    trees: IndexMap<TreeId, NodeTree>,
    /// Owners of embedded trees.
    tree_owners: HashMap<TreeId, IdRef>,
    objects: IndexMap<ObjectId, Object>,
    registry: Arc<NodeTypeRegistry>,
    settings: UpdateSettings,
    session: SessionFlag,
    next_tree_id: u32,
    next_object_id: u32,
}

impl Default for Main {
    fn default() -> Self {
        Self::new()
    }
}

impl Main {
    /// Empty database with the built-in node types.
    pub fn new() -> Self {
        Self::with_registry(Arc::new(NodeTypeRegistry::with_builtins()))
    }

    /// An empty database using the given node types.
    pub fn with_registry(registry: Arc<NodeTypeRegistry>) -> Self {
        Self {
            trees: IndexMap::new(),
            tree_owners: HashMap::new(),
            objects: IndexMap::new(),
            registry,
            settings: UpdateSettings::default(),
            session: SessionFlag::new(),
            next_tree_id: 0,
            next_object_id: 0,
        }
    }

    pub fn registry(&self) -> &Arc<NodeTypeRegistry> {
        &self.registry
    }

    pub fn settings(&self) -> &UpdateSettings {
        &self.settings
    }

    /// Replace the update settings of every tree.
    pub fn set_settings(&mut self, settings: UpdateSettings) {
        for tree in self.trees.values_mut() {
            tree.set_parallel_topology(settings.parallel_topology);
        }
        self.settings = settings;
    }

    // ---- Trees ----

    /// Add a tree of a built-in type.
    pub fn new_tree(&mut self, name: impl Into<String>, kind: TreeKind) -> TreeId {
        let tree_type: Arc<dyn TreeType> = match kind {
            TreeKind::Geometry => Arc::new(GeometryNodeTree),
            TreeKind::Shader => Arc::new(ShaderNodeTree),
        };
        self.new_tree_with_type(name, tree_type)
    }

    /// Add a tree of a custom type.
    pub fn new_tree_with_type(&mut self, name: impl Into<String>, tree_type: Arc<dyn TreeType>) -> TreeId {
        let tree = NodeTree::new(name, tree_type, Arc::clone(&self.registry));
        self.insert_tree(tree)
    }

    /// Add a tree owned by another data-block, like the node tree of a
    /// material.
    pub fn new_embedded_tree(&mut self, name: impl Into<String>, kind: TreeKind, owner: IdRef) -> TreeId {
        let id = self.new_tree(name, kind);
        self.tree_owners.insert(id, owner);
        id
    }

    /// Take ownership of a tree built elsewhere. The tree gets a new id.
    pub fn insert_tree(&mut self, mut tree: NodeTree) -> TreeId {
        let id = TreeId::from(self.next_tree_id);
        self.next_tree_id += 1;
        tree.id = id;
        tree.set_parallel_topology(self.settings.parallel_topology);
        self.trees.insert(id, tree);
        id
    }

    /// Remove a tree. Group nodes using it keep their sockets and are tagged.
    pub fn remove_tree(&mut self, id: TreeId) -> Result<NodeTree> {
        let tree = self
            .trees
            .shift_remove(&id)
            .ok_or(NodeTreeError::TreeNotFound(id))?;
        self.tree_owners.remove(&id);
        self.tag_id_changed(IdRef::Tree(id));
        Ok(tree)
    }

    pub fn trees(&self) -> impl Iterator<Item = &NodeTree> {
        self.trees.values()
    }

    pub fn tree(&self, id: TreeId) -> Option<&NodeTree> {
        self.trees.get(&id)
    }

    pub fn tree_mut(&mut self, id: TreeId) -> Option<&mut NodeTree> {
        self.trees.get_mut(&id)
    }

    /// Data-block owning a tree: the tree itself unless it is embedded.
    pub fn tree_owner(&self, id: TreeId) -> IdRef {
        self.tree_owners.get(&id).copied().unwrap_or(IdRef::Tree(id))
    }

    /// Snapshots of every tree referenced by group nodes of `tree`.
    pub fn group_snapshots(&self, tree: TreeId) -> GroupSnapshots {
        let mut snapshots = GroupSnapshots::new();
        let Some(tree) = self.trees.get(&tree) else {
            return snapshots;
        };
        for node in tree.nodes().filter(|node| node.is_group()) {
            if let Some((group, group_tree)) = node
                .group()
                .and_then(|group| self.trees.get(&group).map(|tree| (group, tree)))
            {
                snapshots.insert(group, GroupSnapshot::of(group_tree));
            }
        }
        snapshots
    }

    /// Add a group node referencing `group` to `tree`.
    pub fn add_group_node(&mut self, tree: TreeId, group: TreeId) -> Result<NodeId> {
        let snapshot = GroupSnapshot::of(
            self.trees
                .get(&group)
                .ok_or(NodeTreeError::TreeNotFound(group))?,
        );
        let snapshots = GroupSnapshots::single(group, snapshot);
        let tree = self
            .trees
            .get_mut(&tree)
            .ok_or(NodeTreeError::TreeNotFound(tree))?;
        let idname = match tree.kind() {
            TreeKind::Geometry => "GeometryNodeGroup",
            TreeKind::Shader => "ShaderNodeGroup",
        };
        let node = tree.add_node(idname);
        tree.set_node_group(node, Some(group), &snapshots)?;
        Ok(node)
    }

    // ---- Objects ----

    /// Add an object without modifiers.
    pub fn add_object(&mut self, name: impl Into<String>) -> ObjectId {
        let id = ObjectId::from(self.next_object_id);
        self.next_object_id += 1;
        self.objects.insert(
            id,
            Object {
                id,
                name: name.into(),
                modifiers: Vec::new(),
            },
        );
        id
    }

    pub fn objects(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(&id)
    }

    /// Append a nodes modifier and snapshot the interface of its tree.
    /// Returns the index of the modifier in the object's stack.
    pub fn add_nodes_modifier(
        &mut self,
        object: ObjectId,
        name: impl Into<String>,
        group: Option<TreeId>,
    ) -> Result<usize> {
        let mut modifier = NodesModifier::new(name);
        if let Some(group) = group {
            let tree = self
                .trees
                .get(&group)
                .ok_or(NodeTreeError::TreeNotFound(group))?;
            modifier.node_group = Some(group);
            modifier.on_interface_changed(tree);
        }
        let object = self
            .objects
            .get_mut(&object)
            .ok_or(NodeTreeError::ObjectNotFound(object))?;
        object.modifiers.push(modifier);
        Ok(object.modifiers.len() - 1)
    }

    /// A modifier by its index in the object's stack.
    pub fn modifier_mut(&mut self, object: ObjectId, index: usize) -> Result<&mut NodesModifier> {
        self.objects
            .get_mut(&object)
            .ok_or(NodeTreeError::ObjectNotFound(object))?
            .modifiers
            .get_mut(index)
            .ok_or(NodeTreeError::ModifierNotFound { object, index })
    }

    pub(crate) fn trees_and_objects_mut(
        &mut self,
    ) -> (&IndexMap<TreeId, NodeTree>, &mut IndexMap<ObjectId, Object>) {
        (&self.trees, &mut self.objects)
    }

    // ---- Updates ----

    /// Tag every node referencing a data-block whose properties changed.
    pub fn tag_id_changed(&mut self, id: IdRef) {
        for tree in self.trees.values_mut() {
            let users: Vec<NodeId> = tree
                .nodes()
                .filter(|node| node.id_ref() == Some(id))
                .map(|node| node.id())
                .collect();
            for node in users {
                tag::tag_node_property(tree, node);
            }
        }
    }

    /// Start an update session by hand. Updates requested while it is alive
    /// are ignored.
    pub fn begin_update_session(&self) -> Option<UpdateSession> {
        self.session.try_begin()
    }

    /// The flag sessions of this database are acquired from.
    pub fn session_flag(&self) -> SessionFlag {
        self.session.clone()
    }

    /// Update every tree with pending changes.
    pub fn update_all(&mut self, callbacks: &mut UpdateCallbacks<'_>) {
        let Some(_session) = self.session.try_begin() else {
            debug!("update already running, ignoring update_all");
            return;
        };
        NodeTreeMainUpdater::new(self, callbacks).update();
    }

    /// Update one tree and every tree affected by its changes.
    pub fn update_one(&mut self, tree: TreeId, callbacks: &mut UpdateCallbacks<'_>) {
        self.update_rooted(&[tree], callbacks);
    }

    /// Update the given trees and every tree affected by their changes.
    pub fn update_rooted(&mut self, roots: &[TreeId], callbacks: &mut UpdateCallbacks<'_>) {
        let Some(_session) = self.session.try_begin() else {
            debug!(roots = roots.len(), "update already running, ignoring update_rooted");
            return;
        };
        NodeTreeMainUpdater::new(self, callbacks).update_rooted(roots);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::DataId;
    use crate::update::ChangedFlag;

    fn geometry_group(main: &mut Main) -> TreeId {
        let group = main.new_tree("Group", TreeKind::Geometry);
        let tree = main.tree_mut(group).unwrap();
        tree.interface_add_input("Offset", SocketType::Vector);
        tree.interface_add_input("Count", SocketType::Int);
        group
    }

    #[test]
    fn modifiers_follow_interface_changes() {
        let mut main = Main::new();
        let group = geometry_group(&mut main);
        let object = main.add_object("Cube");
        let index = main.add_nodes_modifier(object, "GeometryNodes", Some(group)).unwrap();

        let modifier = &main.object(object).unwrap().modifiers()[index];
        assert_eq!(modifier.inputs().len(), 2);
        assert_eq!(modifier.interface_updates(), 1);
        let offset = modifier.inputs()[0].identifier.clone();
        assert!(main.modifier_mut(object, index).unwrap().set_use_attribute(&offset, true));

        main.tree_mut(group)
            .unwrap()
            .interface_add_input("Scale", SocketType::Float);
        main.update_all(&mut UpdateCallbacks::new());

        let modifier = &main.object(object).unwrap().modifiers()[index];
        assert_eq!(modifier.interface_updates(), 2);
        assert_eq!(modifier.inputs().len(), 3);
        assert!(modifier.inputs()[0].use_attribute);
    }

    #[test]
    fn inputs_used_as_single_values_cannot_be_attributes() {
        let mut main = Main::new();
        let group = geometry_group(&mut main);
        {
            let tree = main.tree_mut(group).unwrap();
            let input = tree.add_node("NodeGroupInput");
            let grid = tree.add_node("GeometryNodeMeshGrid");
            let count = tree.node(input).unwrap().outputs()[1].id();
            tree.add_link(count, tree.find_input(grid, "Vertices X").unwrap())
                .unwrap();
        }
        main.update_all(&mut UpdateCallbacks::new());

        let object = main.add_object("Plane");
        let index = main.add_nodes_modifier(object, "GeometryNodes", Some(group)).unwrap();
        let modifier = main.modifier_mut(object, index).unwrap();
        assert!(modifier.inputs()[0].supports_attribute);
        assert!(!modifier.inputs()[1].supports_attribute);
        let count = modifier.inputs()[1].identifier.clone();
        assert!(!modifier.set_use_attribute(&count, true));
    }

    #[test]
    fn id_changes_tag_referencing_nodes() {
        let mut main = Main::new();
        let tree = main.new_tree("Geometry Nodes", TreeKind::Geometry);
        let object = main.add_object("Camera");
        let info = {
            let tree = main.tree_mut(tree).unwrap();
            let info = tree.add_node("GeometryNodeObjectInfo");
            tree.set_node_id_ref(info, Some(object.into())).unwrap();
            info
        };
        main.update_all(&mut UpdateCallbacks::new());

        main.tag_id_changed(IdRef::Object(object));
        let tree = main.tree(tree).unwrap();
        assert!(tree.changed_flag().contains(ChangedFlag::NODE_PROPERTY));
        assert!(tree.node(info).unwrap().changed_flag().contains(ChangedFlag::NODE_PROPERTY));
    }

    #[test]
    fn updates_are_ignored_during_a_session() {
        let mut main = Main::new();
        let tree = main.new_tree("Geometry Nodes", TreeKind::Geometry);

        let session = main.begin_update_session().unwrap();
        main.update_all(&mut UpdateCallbacks::new());
        assert!(!main.tree(tree).unwrap().changed_flag().is_empty());

        drop(session);
        main.update_all(&mut UpdateCallbacks::new());
        assert!(main.tree(tree).unwrap().changed_flag().is_empty());
    }

    #[test]
    fn callbacks_receive_the_owner() {
        let mut main = Main::new();
        let material = DataId::from(3);
        let tree = main.new_embedded_tree("Material", TreeKind::Shader, material.into());

        let mut changed = Vec::new();
        let mut output_changed = Vec::new();
        {
            let mut callbacks = UpdateCallbacks::new()
                .on_tree_changed(|owner, tree| changed.push((owner, tree.id())))
                .on_tree_output_changed(|owner, _| output_changed.push(owner));
            main.update_all(&mut callbacks);
        }
        assert_eq!(changed, vec![(IdRef::Data(material), tree)]);
        assert_eq!(output_changed, vec![IdRef::Data(material)]);
    }

    #[test]
    fn removed_groups_keep_group_node_sockets() {
        let mut main = Main::new();
        let group = geometry_group(&mut main);
        let tree = main.new_tree("Geometry Nodes", TreeKind::Geometry);
        let node = main.add_group_node(tree, group).unwrap();
        main.update_all(&mut UpdateCallbacks::new());

        main.remove_tree(group).unwrap();
        assert!(main.tree(tree).unwrap().changed_flag().contains(ChangedFlag::NODE_PROPERTY));
        main.update_all(&mut UpdateCallbacks::new());
        assert_eq!(main.tree(tree).unwrap().node(node).unwrap().inputs().len(), 2);
    }
}
