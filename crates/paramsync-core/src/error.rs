//! Core error types for paramsync-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering the
//! failure modes of the parameter and plug data model.

use thiserror::Error;

use crate::id::PlugId;
use crate::value::ValueType;

/// Core errors produced by the paramsync-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A compound parameter already has a child with this name.
    #[error("duplicate parameter: '{name}'")]
    DuplicateParameter { name: String },

    /// No parameter exists at the given path.
    #[error("parameter not found: '{path}'")]
    ParameterNotFound { path: String },

    /// A value of the wrong type was assigned to a parameter or plug.
    #[error("value type mismatch for '{name}': expected {expected:?}, got {actual:?}")]
    ValueTypeMismatch {
        name: String,
        expected: ValueType,
        actual: ValueType,
    },

    /// A numeric parameter value lies outside the parameter's range.
    #[error("value {value} out of range for '{name}'")]
    OutOfRange { name: String, value: f64 },

    /// A range was inverted or excluded the parameter's default.
    #[error("invalid range for '{name}': {reason}")]
    InvalidRange { name: String, reason: String },

    /// A compound-only operation was applied to a leaf parameter or plug.
    #[error("'{name}' is not a compound")]
    NotCompound { name: String },

    /// A value operation was applied to a compound parameter.
    #[error("'{name}' is a compound and has no value of its own")]
    NotLeaf { name: String },

    /// A plug id does not name a live plug.
    #[error("plug not found: PlugId({id})", id = id.0)]
    PlugNotFound { id: PlugId },

    /// A plug with this name already exists under the parent.
    #[error("duplicate plug: '{name}'")]
    DuplicatePlug { name: String },

    /// A value operation was applied to a compound plug, or vice versa.
    #[error("plug kind mismatch for '{name}': {reason}")]
    PlugKindMismatch { name: String, reason: String },

    /// The node component at the root of a plug tree cannot be removed.
    #[error("cannot remove the root of a plug tree")]
    CannotRemoveRoot,

    /// A parameter snapshot could not be turned into a live parameter.
    #[error("invalid snapshot for '{name}': {reason}")]
    InvalidSnapshot { name: String, reason: String },
}
