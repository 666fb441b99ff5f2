//! Data model for the parameter-to-plug synchronization engine.
//!
//! # Modules
//!
//! - [`value`]: leaf value types shared by parameters and plugs
//! - [`parameter`]: hierarchical, typed parameter sets and their snapshots
//! - [`plug`]: the node attribute tree ([`PlugTree`]) parameters are mirrored into
//! - [`id`]: stable plug identifiers
//! - [`error`]: [`CoreError`]

pub mod error;
pub mod id;
pub mod parameter;
pub mod plug;
pub mod value;

// Re-export commonly used types
pub use error::CoreError;
pub use id::PlugId;
pub use parameter::{Parameter, ParameterBody, ParameterSnapshot, ParameterType};
pub use plug::{Direction, Plug, PlugKind, PlugTree};
pub use value::{NumericRange, Value, ValueType};
