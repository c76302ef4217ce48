//! Field Inferencing
//!
//! Decides for every socket of a geometry tree whether it carries a single
//! value or a field that is evaluated per element, and what the tree's
//! interface looks like to group nodes using it.
//!
//! The result is stored on the tree: the interface in its runtime data and a
//! display shape on every socket. Trees whose interface changed make their
//! group users update as well.

mod inferencing;

pub use inferencing::{
    infer_field_states, socket_shape, update_field_inferencing, FieldInferencingInterface,
    FieldInferencingResult, SocketFieldState,
};
