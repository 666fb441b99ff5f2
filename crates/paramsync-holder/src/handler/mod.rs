//! Parameter handlers.
//!
//! A [`ParameterHandler`] binds one parameter subtree to one plug subtree.
//! Structure and values are moved by separate calls:
//!
//! - [`setup_plug`](ParameterHandler::setup_plug) makes the plug tree mirror
//!   the parameter's current shape, creating, replacing and removing plugs
//!   as needed. It is idempotent.
//! - [`set_plug_value`](ParameterHandler::set_plug_value) and
//!   [`set_parameter_value`](ParameterHandler::set_parameter_value) only move
//!   values, and fail with [`HolderError::InconsistentShape`] when the two
//!   trees disagree.
//!
//! Handlers do not hold references into either tree. They remember the name
//! of the parameter they serve and the id of the plug they created, and the
//! caller passes both trees into every call.

mod compound;
mod registry;
mod value;

use std::fmt;

use paramsync_core::{Parameter, ParameterType, PlugId, PlugTree};

use crate::error::HolderError;

pub use compound::CompoundParameterHandler;
pub use registry::{HandlerFactory, HandlerRegistry};
pub use value::ValueParameterHandler;

pub trait ParameterHandler: fmt::Debug {
    /// Name of the parameter this handler is bound to.
    fn name(&self) -> &str;

    /// Type of parameter this handler serves.
    fn parameter_type(&self) -> ParameterType;

    /// Plug created by the last successful `setup_plug`.
    fn plug(&self) -> Option<PlugId>;

    /// Ensures a plug matching `parameter` exists under `parent`, returning
    /// its id.
    fn setup_plug(
        &mut self,
        parameter: &Parameter,
        plugs: &mut PlugTree,
        parent: PlugId,
        registry: &HandlerRegistry,
    ) -> Result<PlugId, HolderError>;

    /// Copies plug values into the parameter's current values.
    fn set_parameter_value(
        &self,
        parameter: &mut Parameter,
        plugs: &PlugTree,
    ) -> Result<(), HolderError>;

    /// Copies the parameter's current values into the plugs.
    fn set_plug_value(&self, parameter: &Parameter, plugs: &mut PlugTree) -> Result<(), HolderError>;
}

/// Checks that `parameter` is the one a handler was built for.
pub(crate) fn check_parameter(
    handler: &dyn ParameterHandler,
    parameter: &Parameter,
) -> Result<(), HolderError> {
    if parameter.name() != handler.name() {
        return Err(HolderError::InconsistentShape {
            path: handler.name().to_string(),
            reason: format!("handler was given parameter '{}'", parameter.name()),
        });
    }
    if parameter.parameter_type() != handler.parameter_type() {
        return Err(HolderError::InconsistentShape {
            path: handler.name().to_string(),
            reason: format!(
                "handler serves {} parameters, parameter is {}",
                handler.parameter_type(),
                parameter.parameter_type()
            ),
        });
    }
    Ok(())
}

/// Returns the handler's plug, checking that it still exists under the
/// handler's name.
pub(crate) fn bound_plug(handler: &dyn ParameterHandler, plugs: &PlugTree) -> Result<PlugId, HolderError> {
    let id = handler.plug().ok_or_else(|| HolderError::InconsistentShape {
        path: handler.name().to_string(),
        reason: "plug has not been set up".to_string(),
    })?;
    match plugs.get(id) {
        Some(plug) if plug.name() == handler.name() => Ok(id),
        _ => Err(HolderError::InconsistentShape {
            path: handler.name().to_string(),
            reason: format!("plug {} no longer exists", id),
        }),
    }
}
