//! Error type shared by every fallible server call.

use thiserror::Error;

use crate::arena::Handle;
use crate::shape::ShapeType;

/// Failures reported at the server boundary.
///
/// Numerical trouble inside a step (degenerate shapes, zero-length axes) is
/// never reported here; it degrades to "no contact" instead.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PhysicsError {
    /// A handle that was freed, never allocated, or belongs to another kind.
    #[error("invalid {kind} handle {handle:?}")]
    InvalidHandle { kind: &'static str, handle: Handle },

    /// Shape slot index past the end of an object's shape list.
    #[error("shape index {index} out of range (count={count})")]
    ShapeIndexOutOfRange { index: usize, count: usize },

    /// Geometry passed to `shape_set_data` does not fit the shape type.
    #[error("invalid data for {shape:?} shape: {reason}")]
    InvalidShapeData { shape: ShapeType, reason: String },

    /// Operation needs the object to be inside a space.
    #[error("object is not assigned to a space")]
    NotInSpace,

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
}

pub type Result<T> = core::result::Result<T, PhysicsError>;
