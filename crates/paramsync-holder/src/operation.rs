//! Operations described by data.
//!
//! An [`OperationDefinition`] is the on-disk form of a loadable class: a
//! description, a kind, and the parameter set as [`ParameterSnapshot`]s.
//! [`DescribedOperation`] is the live object built from it. Ops return the
//! current value of their `result` parameter when operated.

use paramsync_core::{Parameter, ParameterSnapshot, Value};
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, OpError};
use crate::parameterised::{Loadable, Op, Parameterised};

/// Name of the root compound parameter of every described operation.
pub const ROOT_PARAMETER_NAME: &str = "parameters";

/// Whether a described class can be executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    #[default]
    Op,
    Procedure,
}

/// Serialized description of a loadable class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationDefinition {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub kind: OperationKind,
    /// Path of the leaf parameter an op returns. Required for ops.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    pub parameters: Vec<ParameterSnapshot>,
}

#[derive(Debug, Clone)]
pub struct DescribedOperation {
    type_name: String,
    version: i64,
    description: String,
    kind: OperationKind,
    result: Option<String>,
    parameters: Parameter,
}

impl DescribedOperation {
    /// A procedure: a parameter set with no execution.
    pub fn procedure(type_name: impl Into<String>, version: i64, parameters: Parameter) -> Self {
        DescribedOperation {
            type_name: type_name.into(),
            version,
            description: String::new(),
            kind: OperationKind::Procedure,
            result: None,
            parameters,
        }
    }

    /// An op returning the value of the leaf parameter at `result`.
    pub fn op(
        type_name: impl Into<String>,
        version: i64,
        parameters: Parameter,
        result: impl Into<String>,
    ) -> Self {
        DescribedOperation {
            type_name: type_name.into(),
            version,
            description: String::new(),
            kind: OperationKind::Op,
            result: Some(result.into()),
            parameters,
        }
    }

    /// Builds and validates an operation from its definition.
    pub fn from_definition(
        type_name: &str,
        version: i64,
        definition: &OperationDefinition,
    ) -> Result<Self, LoadError> {
        let invalid = |reason: String| LoadError::InvalidDefinition {
            class_name: type_name.to_string(),
            reason,
        };

        let mut parameters = Parameter::compound(ROOT_PARAMETER_NAME);
        for snapshot in &definition.parameters {
            let child = Parameter::from_snapshot(snapshot).map_err(|e| invalid(e.to_string()))?;
            parameters
                .add_child(child)
                .map_err(|e| invalid(e.to_string()))?;
        }

        if definition.kind == OperationKind::Op {
            let path = definition
                .result
                .as_deref()
                .ok_or_else(|| invalid("ops must name a result parameter".to_string()))?;
            let is_leaf = parameters
                .descendant(path)
                .is_some_and(|p| !p.is_compound());
            if !is_leaf {
                return Err(invalid(format!(
                    "result '{}' is not a leaf parameter",
                    path
                )));
            }
        }

        Ok(DescribedOperation {
            type_name: type_name.to_string(),
            version,
            description: definition.description.clone(),
            kind: definition.kind,
            result: definition.result.clone(),
            parameters,
        })
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }
}

impl Parameterised for DescribedOperation {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn parameters(&self) -> &Parameter {
        &self.parameters
    }

    fn parameters_mut(&mut self) -> &mut Parameter {
        &mut self.parameters
    }

    fn as_op(&self) -> Option<&dyn Op> {
        match self.kind {
            OperationKind::Op => Some(self),
            OperationKind::Procedure => None,
        }
    }
}

impl Op for DescribedOperation {
    fn operate(&self) -> Result<Value, OpError> {
        let path = self
            .result
            .as_deref()
            .ok_or_else(|| OpError::new(&self.type_name, "no result parameter"))?;
        self.parameters
            .descendant(path)
            .and_then(Parameter::value)
            .cloned()
            .ok_or_else(|| {
                OpError::new(
                    &self.type_name,
                    format!("result parameter '{}' is missing", path),
                )
            })
    }
}

impl Loadable for DescribedOperation {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn into_parameterised(self: Box<Self>) -> Option<Box<dyn Parameterised>> {
        Some(self)
    }
}
