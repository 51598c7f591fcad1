//! Dynamic state values with identity-based change detection.
//!
//! Aggregates are reference-counted. [`Value::same`] compares aggregates by
//! reference and scalars by value, which is the only comparison the runtime
//! uses to decide whether a realm changed. [`Value::with_child`] rebuilds a
//! single aggregate level, so untouched sibling slices keep their identity.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::core::error::StructuralError;
use crate::core::path::{Fragment, Path};

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<Vec<Value>>),
    Record(Rc<BTreeMap<String, Value>>),
}

impl Value {
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(Rc::new(items.into_iter().collect()))
    }

    pub fn record<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Value::Record(Rc::new(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Identity comparison: aggregates by reference, scalars by value.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Record(_) => "record",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }

    /// Number of items of a list; zero for anything else.
    pub fn len(&self) -> usize {
        match self {
            Value::List(items) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Slice at `fragment`; `Null` when the slice does not exist.
    pub fn child(&self, fragment: &Fragment) -> Value {
        match (self, fragment) {
            (Value::Record(fields), Fragment::Str(key)) => {
                fields.get(key).cloned().unwrap_or_default()
            }
            (Value::List(items), _) => fragment
                .as_index()
                .and_then(|index| items.get(index))
                .cloned()
                .unwrap_or_default(),
            _ => Value::Null,
        }
    }

    /// Slice reached by walking every fragment of `path`.
    pub fn get_path(&self, path: &Path) -> Value {
        path.iter()
            .fold(self.clone(), |current, fragment| current.child(fragment))
    }

    /// Copy of `self` with the slice at `fragment` replaced by `value`.
    ///
    /// Records accept any string key; lists accept an existing index or the
    /// index one past the end (append). `Null` is promoted to an empty record
    /// for string keys.
    pub fn with_child(&self, fragment: &Fragment, value: Value) -> Result<Value, StructuralError> {
        match (self, fragment) {
            (Value::Record(fields), Fragment::Str(key)) => {
                let mut next = (**fields).clone();
                next.insert(key.clone(), value);
                Ok(Value::Record(Rc::new(next)))
            }
            (Value::Null, Fragment::Str(key)) => Ok(Value::record([(key.clone(), value)])),
            (Value::List(items), _) => {
                let index = fragment
                    .as_index()
                    .filter(|index| *index <= items.len())
                    .ok_or_else(|| StructuralError::ShapeMismatch {
                        fragment: fragment.to_string(),
                        found: "list",
                    })?;
                let mut next = (**items).clone();
                if index == next.len() {
                    next.push(value);
                } else {
                    next[index] = value;
                }
                Ok(Value::List(Rc::new(next)))
            }
            (other, _) => Err(StructuralError::ShapeMismatch {
                fragment: fragment.to_string(),
                found: other.kind(),
            }),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Str(s) => serde_json::Value::String(s.to_string()),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Record(fields) => serde_json::Value::Object(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(Rc::from(s.as_str())),
            serde_json::Value::Array(items) => Value::list(items.iter().map(Value::from_json)),
            serde_json::Value::Object(fields) => Value::record(
                fields
                    .iter()
                    .map(|(k, v)| (k.clone(), Value::from_json(v))),
            ),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Rc::from(value))
    }
}
