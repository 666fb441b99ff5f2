//! Hierarchical, typed parameter sets.
//!
//! A [`Parameter`] is either a leaf carrying a default and a current
//! [`Value`], or a compound owning an insertion-ordered set of named
//! children. The root parameter of an operation is always a compound.
//!
//! [`ParameterSnapshot`] is the serializable description of a parameter
//! tree. It is what operation definitions are written in and what tools
//! print; [`Parameter::from_snapshot`] validates it into a live tree.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::value::{NumericRange, Value, ValueType};

/// Separator used in parameter and plug paths.
pub const PATH_SEPARATOR: char = '.';

/// Static type tag of a parameter. Handlers are registered per tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ParameterType {
    Value(ValueType),
    Compound,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterType::Value(ty) => write!(f, "{}", ty),
            ParameterType::Compound => f.write_str("compound"),
        }
    }
}

impl FromStr for ParameterType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "compound" {
            return Ok(ParameterType::Compound);
        }
        ValueType::ALL
            .into_iter()
            .find(|ty| ty.to_string() == s)
            .map(ParameterType::Value)
            .ok_or_else(|| format!("unknown parameter type '{}'", s))
    }
}

impl TryFrom<String> for ParameterType {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ParameterType> for String {
    fn from(ty: ParameterType) -> Self {
        ty.to_string()
    }
}

/// Body of a parameter: either a leaf value or a set of children.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterBody {
    Leaf {
        default: Value,
        value: Value,
        range: Option<NumericRange>,
    },
    Compound {
        children: IndexMap<String, Parameter>,
    },
}

/// A named parameter, owned by the operation that declares it.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    name: String,
    description: String,
    body: ParameterBody,
}

impl Parameter {
    /// Creates a leaf parameter whose current value starts at `default`.
    pub fn leaf(name: impl Into<String>, default: Value) -> Self {
        Parameter {
            name: name.into(),
            description: String::new(),
            body: ParameterBody::Leaf {
                value: default.clone(),
                default,
                range: None,
            },
        }
    }

    /// Creates an empty compound parameter.
    pub fn compound(name: impl Into<String>) -> Self {
        Parameter {
            name: name.into(),
            description: String::new(),
            body: ParameterBody::Compound {
                children: IndexMap::new(),
            },
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the numeric range of a leaf.
    ///
    /// Fails on compounds and non-numeric leaves, on inverted bounds, and
    /// when the default or current value lies outside the new range.
    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Result<Self, CoreError> {
        let new_range = NumericRange::new(min, max);
        let invalid = |reason: &str| CoreError::InvalidRange {
            name: self.name.clone(),
            reason: reason.to_string(),
        };
        let ParameterBody::Leaf {
            default, value, ..
        } = &self.body
        else {
            return Err(invalid("compound parameters take no range"));
        };
        if !default.value_type().is_numeric() {
            return Err(invalid("only numeric parameters take a range"));
        }
        if !new_range.is_ordered() {
            return Err(invalid("min is greater than max"));
        }
        for (what, v) in [("default", default), ("value", value)] {
            if !v.as_f64().is_some_and(|n| new_range.contains(n)) {
                return Err(invalid(&format!("{} {} lies outside the range", what, v)));
            }
        }
        if let ParameterBody::Leaf { range, .. } = &mut self.body {
            *range = Some(new_range);
        }
        Ok(self)
    }

    /// Appends a child, replacing any child of the same name in place.
    /// Has no effect on leaves.
    pub fn with_child(mut self, child: Parameter) -> Self {
        if let ParameterBody::Compound { children } = &mut self.body {
            children.insert(child.name.clone(), child);
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn body(&self) -> &ParameterBody {
        &self.body
    }

    pub fn parameter_type(&self) -> ParameterType {
        match &self.body {
            ParameterBody::Leaf { default, .. } => ParameterType::Value(default.value_type()),
            ParameterBody::Compound { .. } => ParameterType::Compound,
        }
    }

    pub fn is_compound(&self) -> bool {
        matches!(self.body, ParameterBody::Compound { .. })
    }

    /// Default value of a leaf; `None` for compounds.
    pub fn default_value(&self) -> Option<&Value> {
        match &self.body {
            ParameterBody::Leaf { default, .. } => Some(default),
            ParameterBody::Compound { .. } => None,
        }
    }

    /// Current value of a leaf; `None` for compounds.
    pub fn value(&self) -> Option<&Value> {
        match &self.body {
            ParameterBody::Leaf { value, .. } => Some(value),
            ParameterBody::Compound { .. } => None,
        }
    }

    pub fn range(&self) -> Option<NumericRange> {
        match &self.body {
            ParameterBody::Leaf { range, .. } => *range,
            ParameterBody::Compound { .. } => None,
        }
    }

    /// Validates and assigns the current value of a leaf.
    ///
    /// The value must have the leaf's type (an `Int` is accepted for a
    /// `Float` leaf) and lie inside its range. The default is never touched.
    pub fn set_value(&mut self, new_value: Value) -> Result<(), CoreError> {
        let name = &self.name;
        let ParameterBody::Leaf {
            default,
            value,
            range,
        } = &mut self.body
        else {
            return Err(CoreError::NotLeaf { name: name.clone() });
        };

        let expected = default.value_type();
        let actual = new_value.value_type();
        let new_value = new_value
            .coerce(expected)
            .ok_or_else(|| CoreError::ValueTypeMismatch {
                name: name.clone(),
                expected,
                actual,
            })?;

        if let (Some(range), Some(n)) = (range.as_ref(), new_value.as_f64()) {
            if !range.contains(n) {
                return Err(CoreError::OutOfRange {
                    name: name.clone(),
                    value: n,
                });
            }
        }

        *value = new_value;
        Ok(())
    }

    /// Restores the default value of this parameter and all descendants.
    pub fn reset_to_default(&mut self) {
        match &mut self.body {
            ParameterBody::Leaf { default, value, .. } => *value = default.clone(),
            ParameterBody::Compound { children } => {
                for child in children.values_mut() {
                    child.reset_to_default();
                }
            }
        }
    }

    pub fn child(&self, name: &str) -> Option<&Parameter> {
        match &self.body {
            ParameterBody::Compound { children } => children.get(name),
            ParameterBody::Leaf { .. } => None,
        }
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Parameter> {
        match &mut self.body {
            ParameterBody::Compound { children } => children.get_mut(name),
            ParameterBody::Leaf { .. } => None,
        }
    }

    /// Children in declaration order. Empty for leaves.
    pub fn children(&self) -> impl Iterator<Item = &Parameter> + '_ {
        let children = match &self.body {
            ParameterBody::Compound { children } => Some(children.values()),
            ParameterBody::Leaf { .. } => None,
        };
        children.into_iter().flatten()
    }

    pub fn child_names(&self) -> Vec<&str> {
        self.children().map(|c| c.name()).collect()
    }

    /// Appends a child to a compound. Fails on leaves and duplicate names.
    pub fn add_child(&mut self, child: Parameter) -> Result<(), CoreError> {
        let ParameterBody::Compound { children } = &mut self.body else {
            return Err(CoreError::NotCompound {
                name: self.name.clone(),
            });
        };
        if children.contains_key(&child.name) {
            return Err(CoreError::DuplicateParameter { name: child.name });
        }
        children.insert(child.name.clone(), child);
        Ok(())
    }

    /// Removes a child, preserving the order of the remaining children.
    pub fn remove_child(&mut self, name: &str) -> Result<Parameter, CoreError> {
        let ParameterBody::Compound { children } = &mut self.body else {
            return Err(CoreError::NotCompound {
                name: self.name.clone(),
            });
        };
        children
            .shift_remove(name)
            .ok_or_else(|| CoreError::ParameterNotFound {
                path: name.to_string(),
            })
    }

    /// Looks up a descendant by `.`-separated path. The empty path is `self`.
    pub fn descendant(&self, path: &str) -> Option<&Parameter> {
        if path.is_empty() {
            return Some(self);
        }
        path.split(PATH_SEPARATOR)
            .try_fold(self, |parameter, segment| parameter.child(segment))
    }

    pub fn descendant_mut(&mut self, path: &str) -> Option<&mut Parameter> {
        if path.is_empty() {
            return Some(self);
        }
        path.split(PATH_SEPARATOR)
            .try_fold(self, |parameter, segment| parameter.child_mut(segment))
    }

    /// Sets the value of the leaf at `path`.
    pub fn set_descendant_value(&mut self, path: &str, value: Value) -> Result<(), CoreError> {
        self.descendant_mut(path)
            .ok_or_else(|| CoreError::ParameterNotFound {
                path: path.to_string(),
            })?
            .set_value(value)
    }

    /// Paths and current values of every leaf below this parameter, in
    /// depth-first declaration order. Paths are relative to `self`.
    pub fn leaf_values(&self) -> Vec<(String, &Value)> {
        let mut out = Vec::new();
        collect_leaves(self, "", &mut out);
        out
    }

    /// Captures this parameter tree as a serializable snapshot.
    pub fn snapshot(&self) -> ParameterSnapshot {
        let (default, value, range, children) = match &self.body {
            ParameterBody::Leaf {
                default,
                value,
                range,
            } => (Some(default.clone()), Some(value.clone()), *range, Vec::new()),
            ParameterBody::Compound { children } => (
                None,
                None,
                None,
                children.values().map(Parameter::snapshot).collect(),
            ),
        };
        ParameterSnapshot {
            name: self.name.clone(),
            description: self.description.clone(),
            parameter_type: self.parameter_type(),
            default,
            value,
            range,
            children,
        }
    }

    /// Builds a live parameter tree from a snapshot.
    ///
    /// Leaves need a default (a missing `value` starts at the default);
    /// ranges are only accepted on numeric leaves; compounds take no values.
    pub fn from_snapshot(snapshot: &ParameterSnapshot) -> Result<Parameter, CoreError> {
        let invalid = |reason: &str| CoreError::InvalidSnapshot {
            name: snapshot.name.clone(),
            reason: reason.to_string(),
        };

        if snapshot.name.is_empty() || snapshot.name.contains(PATH_SEPARATOR) {
            return Err(invalid("names must be non-empty and contain no '.'"));
        }

        let mut parameter = match snapshot.parameter_type {
            ParameterType::Compound => {
                if snapshot.default.is_some() || snapshot.value.is_some() {
                    return Err(invalid("compound parameters have no value"));
                }
                let mut parameter = Parameter::compound(&snapshot.name);
                for child in &snapshot.children {
                    parameter.add_child(Parameter::from_snapshot(child)?)?;
                }
                parameter
            }
            ParameterType::Value(ty) => {
                if !snapshot.children.is_empty() {
                    return Err(invalid("leaf parameters have no children"));
                }
                let default = snapshot
                    .default
                    .clone()
                    .ok_or_else(|| invalid("leaf parameters need a default"))?
                    .coerce(ty)
                    .ok_or_else(|| invalid("default does not match the parameter type"))?;
                let mut parameter = Parameter::leaf(&snapshot.name, default);
                if let Some(range) = snapshot.range {
                    parameter = parameter
                        .with_range(range.min, range.max)
                        .map_err(|e| match e {
                            CoreError::InvalidRange { reason, .. } => invalid(&reason),
                            other => other,
                        })?;
                }
                if let Some(value) = &snapshot.value {
                    parameter.set_value(value.clone())?;
                }
                parameter
            }
        };
        parameter.description = snapshot.description.clone();
        Ok(parameter)
    }
}

fn collect_leaves<'a>(parameter: &'a Parameter, prefix: &str, out: &mut Vec<(String, &'a Value)>) {
    for child in parameter.children() {
        let path = if prefix.is_empty() {
            child.name.clone()
        } else {
            format!("{}{}{}", prefix, PATH_SEPARATOR, child.name)
        };
        match &child.body {
            ParameterBody::Leaf { value, .. } => out.push((path, value)),
            ParameterBody::Compound { .. } => collect_leaves(child, &path, out),
        }
    }
}

/// Serializable description of a parameter's identity, type, default and
/// current value, composed recursively for compounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range: Option<NumericRange>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ParameterSnapshot>,
}
