//! Error types for paramsync-holder.
//!
//! [`HolderError`] is returned by every holder, handler and context
//! operation. Class loading failures are [`LoadError`]s and operation
//! execution failures are [`OpError`]s; both convert into `HolderError`.

use std::path::PathBuf;

use paramsync_core::{CoreError, ParameterType};
use thiserror::Error;

/// Errors produced by holders and parameter handlers.
#[derive(Debug, Error)]
pub enum HolderError {
    /// The object bound to a holder does not expose a parameter set (or, for
    /// op holders, is not an op).
    #[error("'{type_name}' does not provide the required parameterised interface")]
    TypeMismatch { type_name: String },

    /// The holder has no way of performing the requested operation.
    #[error("unsupported operation: {reason}")]
    UnsupportedOperation { reason: String },

    /// The class loader could not produce the requested class.
    #[error("failed to load class: {0}")]
    LoadFailure(#[from] LoadError),

    /// Plugs and parameters disagree going into a value transfer.
    #[error("plug tree out of sync at '{path}': {reason}")]
    InconsistentShape { path: String, reason: String },

    /// No handler constructor is registered for a parameter type.
    #[error("no handler registered for parameter type '{parameter_type}'")]
    NoHandler { parameter_type: ParameterType },

    /// The root parameter is named like a plug the node itself owns.
    #[error("root parameter name '{name}' is reserved for a node plug")]
    ReservedName { name: String },

    /// The holder does not currently hold an operation.
    #[error("no operation is held")]
    NoOperation,

    /// The held operation failed while executing.
    #[error(transparent)]
    OperationFailed(#[from] OpError),

    /// A data model operation failed.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A holder state was restored into a holder of another node type.
    #[error("state was saved from a '{found}' node, expected '{expected}'")]
    StateMismatch { expected: String, found: String },

    /// Holder state could not be (de)serialized.
    #[error("state serialization error: {0}")]
    State(#[from] serde_json::Error),
}

/// Class loading failures.
#[derive(Debug, Error)]
pub enum LoadError {
    /// No class of this name exists on the search path.
    #[error("class '{class_name}' not found on search path '{search_path_env_var}'")]
    ClassNotFound {
        class_name: String,
        search_path_env_var: String,
    },

    /// The class exists but not in the requested version.
    #[error("class '{class_name}' has no version {version} (available: {available:?})")]
    VersionNotFound {
        class_name: String,
        version: i64,
        available: Vec<i64>,
    },

    /// The environment variable naming the search path is not set.
    #[error("search path variable '{name}' is not set")]
    EnvVarNotSet { name: String },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A class definition parsed but does not describe a valid operation.
    #[error("invalid definition for class '{class_name}': {reason}")]
    InvalidDefinition { class_name: String, reason: String },
}

/// An operation failed while executing.
#[derive(Debug, Error)]
#[error("operation '{operation}' failed: {message}")]
pub struct OpError {
    pub operation: String,
    pub message: String,
}

impl OpError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        OpError {
            operation: operation.into(),
            message: message.into(),
        }
    }
}
