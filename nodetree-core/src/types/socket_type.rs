//! Socket Data Types
//!
//! The data type carried by a socket decides whether it can be a field at
//! all and which conversions an internal (mute) link may perform.

use serde::{Deserialize, Serialize};

/// The data type of a socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SocketType {
    Float,
    Int,
    Bool,
    Vector,
    Rotation,
    Color,
    String,
    Geometry,
    Object,
    Image,
    Material,
    Shader,
    /// Placeholder used by group input/output nodes to grow the interface.
    Virtual,
    /// A socket whose type was not registered (missing plugin).
    Undefined,
}

impl SocketType {
    /// Types whose values can be computed per element.
    pub fn is_field_type(self) -> bool {
        matches!(
            self,
            SocketType::Float
                | SocketType::Int
                | SocketType::Bool
                | SocketType::Vector
                | SocketType::Rotation
                | SocketType::Color
        )
    }

    pub fn is_undefined(self) -> bool {
        self == SocketType::Undefined
    }

    /// Priority of passing a `from` value through to a `to` output when the
    /// owning node is muted. Higher is better, `None` means not allowed.
    pub fn internal_link_priority(from: SocketType, to: SocketType) -> Option<u8> {
        use SocketType::*;
        let priority = match to {
            Color => match from {
                Color => 4,
                Float => 3,
                Int => 2,
                Bool => 1,
                _ => return None,
            },
            Vector => match from {
                Vector => 4,
                Float => 3,
                Int => 2,
                Bool => 1,
                _ => return None,
            },
            Float => match from {
                Float => 5,
                Int => 4,
                Bool => 3,
                Color => 2,
                Vector => 1,
                _ => return None,
            },
            Int => match from {
                Int => 5,
                Float => 4,
                Bool => 3,
                Color => 2,
                Vector => 1,
                _ => return None,
            },
            Bool => match from {
                Bool => 5,
                Int => 4,
                Float => 3,
                Color => 2,
                Vector => 1,
                _ => return None,
            },
            // Everything else only passes through unchanged.
            Virtual | Undefined => return None,
            _ if from == to => 1,
            _ => return None,
        };
        Some(priority)
    }
}
