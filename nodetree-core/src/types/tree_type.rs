//! Tree Types
//!
//! The tree type decides which analyses run during an update and which
//! links are allowed at all.

use std::fmt::Debug;

use super::socket_type::SocketType;
use crate::tree::NodeTree;

/// Broad family of a node tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeKind {
    Geometry,
    Shader,
}

impl TreeKind {
    /// Only geometry trees pass fields around.
    pub fn uses_field_inferencing(self) -> bool {
        self == TreeKind::Geometry
    }

    /// Geometry trees can be referenced by modifiers, which cache a copy of
    /// the tree interface.
    pub fn has_interface_consumers(self) -> bool {
        self == TreeKind::Geometry
    }
}

/// Callbacks shared by all trees of one type.
pub trait TreeType: Send + Sync + Debug {
    fn idname(&self) -> &str;

    fn kind(&self) -> TreeKind;

    /// Generic structural update, run after the individual nodes updated.
    fn update(&self, _tree: &mut NodeTree) {}

    /// Called when the tree interface changed during an update.
    fn interface_update(&self, _tree: &mut NodeTree) {}

    /// Whether a link between the two socket types is meaningful.
    fn validate_link(&self, _from: SocketType, _to: SocketType) -> bool {
        true
    }
}

#[derive(Debug, Default)]
pub struct GeometryNodeTree;

impl TreeType for GeometryNodeTree {
    fn idname(&self) -> &str {
        "GeometryNodeTree"
    }

    fn kind(&self) -> TreeKind {
        TreeKind::Geometry
    }

    fn update(&self, tree: &mut NodeTree) {
        tree.set_active_outputs();
        // Reroutes need the type of whatever they forward.
        tree.update_reroute_types();
    }

    fn validate_link(&self, from: SocketType, to: SocketType) -> bool {
        from != SocketType::Shader && to != SocketType::Shader
    }
}

#[derive(Debug, Default)]
pub struct ShaderNodeTree;

impl TreeType for ShaderNodeTree {
    fn idname(&self) -> &str {
        "ShaderNodeTree"
    }

    fn kind(&self) -> TreeKind {
        TreeKind::Shader
    }

    fn update(&self, tree: &mut NodeTree) {
        tree.set_active_outputs();
        tree.update_reroute_types();
    }

    fn validate_link(&self, from: SocketType, to: SocketType) -> bool {
        // Closures can't be turned into plain values, the other way is fine.
        if from == SocketType::Shader {
            return to == SocketType::Shader;
        }
        to != SocketType::Geometry && from != SocketType::Geometry
    }
}
