use paramsync_core::{Direction, Parameter, ParameterType, PlugId, PlugTree, ValueType};
use tracing::debug;

use super::{bound_plug, check_parameter, HandlerRegistry, ParameterHandler};
use crate::error::HolderError;

/// Handler for leaf parameters of one [`ValueType`], mirrored into a leaf
/// plug of the same type.
#[derive(Debug, Clone)]
pub struct ValueParameterHandler {
    name: String,
    value_type: ValueType,
    plug: Option<PlugId>,
}

impl ValueParameterHandler {
    /// Creates an unbound handler for `parameter`. A compound parameter yields
    /// a handler whose every call fails with an inconsistent-shape error.
    pub fn new(parameter: &Parameter) -> Self {
        let value_type = match parameter.parameter_type() {
            ParameterType::Value(ty) => ty,
            ParameterType::Compound => ValueType::Bool,
        };
        ValueParameterHandler {
            name: parameter.name().to_string(),
            value_type,
            plug: None,
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

impl ParameterHandler for ValueParameterHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Value(self.value_type)
    }

    fn plug(&self) -> Option<PlugId> {
        self.plug
    }

    /// Reuses an existing plug of the right type, updating its default and
    /// range in place. A plug of another kind is replaced. A newly created
    /// plug starts at the parameter's current value, since there is no
    /// prior plug value to keep.
    fn setup_plug(
        &mut self,
        parameter: &Parameter,
        plugs: &mut PlugTree,
        parent: PlugId,
        _registry: &HandlerRegistry,
    ) -> Result<PlugId, HolderError> {
        check_parameter(self, parameter)?;
        let (Some(default), Some(value)) = (parameter.default_value(), parameter.value()) else {
            return Err(HolderError::InconsistentShape {
                path: self.name.clone(),
                reason: "leaf parameter has no value".to_string(),
            });
        };

        if let Some(existing) = plugs.child(parent, &self.name) {
            let plug = plugs.plug(existing)?;
            let same_type = plug.value_type() == Some(self.value_type);
            let same_default = plug.default_value() == Some(default);
            let same_range = plug.range() == parameter.range();
            if same_type {
                if !same_default {
                    plugs.set_default(existing, default.clone())?;
                }
                if !same_range {
                    plugs.set_range(existing, parameter.range())?;
                }
                self.plug = Some(existing);
                return Ok(existing);
            }
            debug!(
                plug = %self.name,
                value_type = %self.value_type,
                "replacing plug of mismatched kind"
            );
            plugs.remove_plug(existing)?;
        }

        let id = plugs.add_leaf_plug(
            parent,
            &self.name,
            Direction::In,
            default.clone(),
            parameter.range(),
        )?;
        plugs.set_value(id, value.clone())?;
        debug!(plug = %self.name, value_type = %self.value_type, "created plug");
        self.plug = Some(id);
        Ok(id)
    }

    fn set_parameter_value(
        &self,
        parameter: &mut Parameter,
        plugs: &PlugTree,
    ) -> Result<(), HolderError> {
        check_parameter(self, parameter)?;
        let plug = bound_plug(self, plugs)?;
        let value = plugs.value(plug)?.clone();
        parameter.set_value(value)?;
        Ok(())
    }

    fn set_plug_value(&self, parameter: &Parameter, plugs: &mut PlugTree) -> Result<(), HolderError> {
        check_parameter(self, parameter)?;
        let plug = bound_plug(self, plugs)?;
        let value = parameter
            .value()
            .ok_or_else(|| HolderError::InconsistentShape {
                path: self.name.clone(),
                reason: "leaf parameter has no value".to_string(),
            })?;
        plugs.set_value(plug, value.clone())?;
        Ok(())
    }
}
