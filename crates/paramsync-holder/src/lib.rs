//! Parameter holders: nodes that wrap a loadable, parameterised operation
//! and keep its parameters in sync with the node's plugs.
//!
//! # Architecture
//!
//! - A [`ParameterisedHolder`] owns at most one live operation together with
//!   the root [`CompoundParameterHandler`] bound to it. Both are replaced as
//!   a unit on every (re)load.
//! - Handlers ([`ParameterHandler`]) move values between one parameter
//!   subtree and one plug subtree. `setup_plug` is structural;
//!   `set_plug_value` / `set_parameter_value` only transfer values.
//! - Handlers are created through an explicit [`HandlerRegistry`] keyed by
//!   parameter type.
//! - Direct edits to an operation's parameters go through a
//!   [`ParameterModificationContext`], which resyncs the plugs on release.
//!
//! # Modules
//!
//! - [`error`]: HolderError, LoadError and OpError
//! - [`parameterised`]: capability traits (`Parameterised`, `Op`, `Loadable`)
//! - [`operation`]: operations described by data (`DescribedOperation`)
//! - [`handler`]: handler trait, value and compound handlers, registry
//! - [`node`]: node bases a holder can be layered on
//! - [`loader`]: class loading (`ClassLoader`, in-memory and search-path loaders)
//! - [`holder`]: `ParameterisedHolder` and the `OpHolder` specialization
//! - [`context`]: scoped parameter modification
//! - [`state`]: serializable holder state

pub mod context;
pub mod error;
pub mod handler;
pub mod holder;
pub mod loader;
pub mod node;
pub mod operation;
pub mod parameterised;
pub mod state;

// Re-export key types for ergonomic use.
pub use context::{with_modification, ParameterModificationContext};
pub use error::{HolderError, LoadError, OpError};
pub use handler::{
    CompoundParameterHandler, HandlerFactory, HandlerRegistry, ParameterHandler,
    ValueParameterHandler,
};
pub use holder::{
    ClassIdentity, OpHolder, ParameterisedHolder, ParameterisedHolderNode, LATEST_VERSION,
    OP_PATHS_ENV_VAR,
};
pub use loader::{ClassLoader, InMemoryClassLoader, SearchPathClassLoader};
pub use node::{ComputeNode, Node, NodeBase};
pub use operation::{DescribedOperation, OperationDefinition, OperationKind};
pub use parameterised::{Loadable, Op, Parameterised};
pub use state::HolderState;
