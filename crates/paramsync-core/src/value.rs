//! Leaf values shared by parameters and plugs.
//!
//! [`Value`] is the dynamic value carried by a leaf parameter or a leaf plug;
//! [`ValueType`] is its static tag. Both sides of the synchronization use the
//! same closed set of types, so a value transfer never needs conversion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Static type tag of a leaf value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValueType {
    Bool,
    Int,
    Float,
    String,
    V3f,
    StringVector,
}

impl ValueType {
    /// All value types, in declaration order.
    pub const ALL: [ValueType; 6] = [
        ValueType::Bool,
        ValueType::Int,
        ValueType::Float,
        ValueType::String,
        ValueType::V3f,
        ValueType::StringVector,
    ];

    /// Returns `true` for types that accept a [`NumericRange`].
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Float)
    }

    /// The zero value of this type.
    pub fn zero(self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::String => Value::String(String::new()),
            ValueType::V3f => Value::V3f([0.0; 3]),
            ValueType::StringVector => Value::StringVector(Vec::new()),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::String => "string",
            ValueType::V3f => "v3f",
            ValueType::StringVector => "string-vector",
        };
        f.write_str(name)
    }
}

/// A leaf value.
///
/// Serialized untagged so definitions read naturally (`5`, `0.5`, `"text"`,
/// `[1.0, 0.0, 0.0]`). Integral JSON numbers deserialize as `Int`; use
/// [`Value::coerce`] to widen them where a `Float` is expected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    V3f([f64; 3]),
    StringVector(Vec<String>),
}

impl Value {
    /// Returns the static type of this value.
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::String(_) => ValueType::String,
            Value::V3f(_) => ValueType::V3f,
            Value::StringVector(_) => ValueType::StringVector,
        }
    }

    /// Numeric view of `Int` and `Float` values, used for range checks.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Converts this value to `ty` where that is lossless (`Int` to `Float`),
    /// or returns it unchanged when it already has that type.
    pub fn coerce(self, ty: ValueType) -> Option<Value> {
        match (self, ty) {
            (v, ty) if v.value_type() == ty => Some(v),
            (Value::Int(v), ValueType::Float) => Some(Value::Float(v as f64)),
            _ => None,
        }
    }

    /// Parses a textual value of the given type.
    ///
    /// Vectors are comma separated: `1,2,3` for `V3f`, `a,b` for
    /// `StringVector`. Returns `None` when the text does not parse.
    pub fn parse(ty: ValueType, text: &str) -> Option<Value> {
        match ty {
            ValueType::Bool => match text {
                "true" | "1" | "on" => Some(Value::Bool(true)),
                "false" | "0" | "off" => Some(Value::Bool(false)),
                _ => None,
            },
            ValueType::Int => text.trim().parse().ok().map(Value::Int),
            ValueType::Float => text.trim().parse().ok().map(Value::Float),
            ValueType::String => Some(Value::String(text.to_string())),
            ValueType::V3f => {
                let parts: Vec<f64> = text
                    .split(',')
                    .map(|p| p.trim().parse::<f64>())
                    .collect::<Result<_, _>>()
                    .ok()?;
                let v: [f64; 3] = parts.try_into().ok()?;
                Some(Value::V3f(v))
            }
            ValueType::StringVector => {
                if text.is_empty() {
                    return Some(Value::StringVector(Vec::new()));
                }
                Some(Value::StringVector(
                    text.split(',').map(|s| s.to_string()).collect(),
                ))
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Float(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{:?}", v),
            Value::V3f([x, y, z]) => write!(f, "({}, {}, {})", x, y, z),
            Value::StringVector(v) => write!(f, "{:?}", v),
        }
    }
}

/// Inclusive bounds for `Int` and `Float` values. Either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NumericRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl NumericRange {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        NumericRange { min, max }
    }

    /// Returns `true` unless both bounds are set and `min` exceeds `max`.
    pub fn is_ordered(&self) -> bool {
        match (self.min, self.max) {
            (Some(min), Some(max)) => min <= max,
            _ => true,
        }
    }

    /// Returns `true` when `value` lies within the bounds.
    pub fn contains(&self, value: f64) -> bool {
        self.min.map_or(true, |min| value >= min) && self.max.map_or(true, |max| value <= max)
    }

    /// Clamps a numeric value into the range. Non-numeric values are returned
    /// unchanged.
    pub fn clamp(&self, value: Value) -> Value {
        match value {
            Value::Int(v) => {
                let mut v = v;
                if let Some(min) = self.min {
                    v = v.max(min.ceil() as i64);
                }
                if let Some(max) = self.max {
                    v = v.min(max.floor() as i64);
                }
                Value::Int(v)
            }
            Value::Float(v) => {
                let mut v = v;
                if let Some(min) = self.min {
                    v = v.max(min);
                }
                if let Some(max) = self.max {
                    v = v.min(max);
                }
                Value::Float(v)
            }
            other => other,
        }
    }
}
