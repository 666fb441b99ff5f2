use indexmap::IndexMap;
use paramsync_core::{Direction, Parameter, ParameterType, PlugId, PlugTree};
use tracing::debug;

use super::{bound_plug, check_parameter, HandlerRegistry, ParameterHandler};
use crate::error::HolderError;

/// Handler for compound parameters, mirrored into a compound plug.
///
/// Child handlers are created through the [`HandlerRegistry`] during
/// [`setup_plug`](ParameterHandler::setup_plug), one per child parameter,
/// in parameter order. This is the handler every holder binds to the root
/// parameter of its operation.
#[derive(Debug)]
pub struct CompoundParameterHandler {
    name: String,
    plug: Option<PlugId>,
    children: IndexMap<String, Box<dyn ParameterHandler>>,
}

impl CompoundParameterHandler {
    /// Creates an unbound handler for `parameter`. No child handlers exist
    /// until the first `setup_plug`.
    pub fn new(parameter: &Parameter) -> Self {
        CompoundParameterHandler {
            name: parameter.name().to_string(),
            plug: None,
            children: IndexMap::new(),
        }
    }

    pub fn child_handler(&self, name: &str) -> Option<&dyn ParameterHandler> {
        self.children.get(name).map(|h| h.as_ref())
    }

    /// Names of the child handlers, in parameter order.
    pub fn child_names(&self) -> Vec<&str> {
        self.children.keys().map(String::as_str).collect()
    }

    /// Fails unless the child handlers match `parameter`'s children exactly.
    fn check_children(&self, parameter: &Parameter) -> Result<(), HolderError> {
        let names = parameter.child_names();
        if names.len() != self.children.len()
            || names.iter().any(|name| !self.children.contains_key(*name))
        {
            return Err(HolderError::InconsistentShape {
                path: self.name.clone(),
                reason: format!(
                    "parameter children {:?} do not match handlers {:?}",
                    names,
                    self.child_names()
                ),
            });
        }
        Ok(())
    }
}

impl ParameterHandler for CompoundParameterHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_type(&self) -> ParameterType {
        ParameterType::Compound
    }

    fn plug(&self) -> Option<PlugId> {
        self.plug
    }

    fn setup_plug(
        &mut self,
        parameter: &Parameter,
        plugs: &mut PlugTree,
        parent: PlugId,
        registry: &HandlerRegistry,
    ) -> Result<PlugId, HolderError> {
        check_parameter(self, parameter)?;

        let plug = match plugs.child(parent, &self.name) {
            Some(existing) if plugs.plug(existing)?.is_compound() => existing,
            Some(existing) => {
                debug!(plug = %self.name, "replacing leaf plug with compound");
                plugs.remove_plug(existing)?;
                plugs.add_compound_plug(parent, &self.name, Direction::In)?
            }
            None => {
                debug!(plug = %self.name, "created compound plug");
                plugs.add_compound_plug(parent, &self.name, Direction::In)?
            }
        };

        let mut previous = std::mem::take(&mut self.children);
        let mut children: IndexMap<String, Box<dyn ParameterHandler>> = IndexMap::new();
        for child in parameter.children() {
            let mut handler = match previous.shift_remove(child.name()) {
                Some(handler) if handler.parameter_type() == child.parameter_type() => handler,
                _ => registry.create(child)?,
            };
            handler.setup_plug(child, plugs, plug, registry)?;
            children.insert(child.name().to_string(), handler);
        }

        // Plugs with no parameter behind them: those of discarded handlers
        // and any left over from a previous binding.
        let stale: Vec<PlugId> = plugs
            .children(plug)
            .filter(|id| {
                plugs
                    .get(*id)
                    .is_some_and(|p| parameter.child(p.name()).is_none())
            })
            .collect();
        for id in stale {
            let removed = plugs.remove_plug(id)?;
            debug!(plug = %removed.name(), parent = %self.name, "removed stale plug");
        }

        let order = parameter.child_names();
        plugs.reorder_children(plug, &order)?;

        self.children = children;
        self.plug = Some(plug);
        Ok(plug)
    }

    fn set_parameter_value(
        &self,
        parameter: &mut Parameter,
        plugs: &PlugTree,
    ) -> Result<(), HolderError> {
        check_parameter(self, parameter)?;
        bound_plug(self, plugs)?;
        self.check_children(parameter)?;
        for (name, handler) in &self.children {
            let child = parameter
                .child_mut(name)
                .ok_or_else(|| HolderError::InconsistentShape {
                    path: format!("{}.{}", self.name, name),
                    reason: "parameter no longer exists".to_string(),
                })?;
            handler.set_parameter_value(child, plugs)?;
        }
        Ok(())
    }

    fn set_plug_value(&self, parameter: &Parameter, plugs: &mut PlugTree) -> Result<(), HolderError> {
        check_parameter(self, parameter)?;
        bound_plug(self, plugs)?;
        self.check_children(parameter)?;
        for (name, handler) in &self.children {
            let child = parameter
                .child(name)
                .ok_or_else(|| HolderError::InconsistentShape {
                    path: format!("{}.{}", self.name, name),
                    reason: "parameter no longer exists".to_string(),
                })?;
            handler.set_plug_value(child, plugs)?;
        }
        Ok(())
    }
}
