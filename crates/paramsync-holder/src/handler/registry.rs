use std::collections::HashMap;

use paramsync_core::{Parameter, ParameterType, ValueType};

use super::{CompoundParameterHandler, ParameterHandler, ValueParameterHandler};
use crate::error::HolderError;

/// Constructor for the handler of one parameter type.
pub type HandlerFactory = fn(&Parameter) -> Box<dyn ParameterHandler>;

/// Maps parameter types to handler constructors.
///
/// Holders share a registry through an `Arc`; the compound handler looks up
/// a constructor for every child parameter it binds.
#[derive(Debug, Clone)]
pub struct HandlerRegistry {
    factories: HashMap<ParameterType, HandlerFactory>,
}

fn compound_handler(parameter: &Parameter) -> Box<dyn ParameterHandler> {
    Box::new(CompoundParameterHandler::new(parameter))
}

fn value_handler(parameter: &Parameter) -> Box<dyn ParameterHandler> {
    Box::new(ValueParameterHandler::new(parameter))
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        HandlerRegistry {
            factories: HashMap::new(),
        }
    }

    /// A registry with the compound handler and a value handler for every
    /// [`ValueType`].
    pub fn with_builtins() -> Self {
        let mut registry = HandlerRegistry::new();
        registry.register(ParameterType::Compound, compound_handler);
        for ty in ValueType::ALL {
            registry.register(ParameterType::Value(ty), value_handler);
        }
        registry
    }

    /// Registers `factory` for `parameter_type`, returning the constructor it
    /// replaces.
    pub fn register(
        &mut self,
        parameter_type: ParameterType,
        factory: HandlerFactory,
    ) -> Option<HandlerFactory> {
        self.factories.insert(parameter_type, factory)
    }

    /// Creates an unbound handler for `parameter`.
    pub fn create(&self, parameter: &Parameter) -> Result<Box<dyn ParameterHandler>, HolderError> {
        let parameter_type = parameter.parameter_type();
        let factory = self
            .factories
            .get(&parameter_type)
            .ok_or(HolderError::NoHandler { parameter_type })?;
        Ok(factory(parameter))
    }

    pub fn contains(&self, parameter_type: ParameterType) -> bool {
        self.factories.contains_key(&parameter_type)
    }

    /// Registered types, sorted by name.
    pub fn registered_types(&self) -> Vec<ParameterType> {
        let mut types: Vec<ParameterType> = self.factories.keys().copied().collect();
        types.sort_by_key(|ty| ty.to_string());
        types
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        HandlerRegistry::with_builtins()
    }
}
