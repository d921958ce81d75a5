//! ScriptValue - tagged union exchanged with script code
//!
//! Addon logic works with [`ScriptValue`] rather than stack positions; the
//! translation to and from the positional stack happens only in
//! [`Frame`](crate::Frame).

use crate::abi::ValueKind;

/// A script-visible value.
///
/// Objects keep their properties in insertion order, which is the order the
/// host sees them being assigned.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ScriptValue {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// String
    String(String),
    /// Array of values
    Array(Vec<ScriptValue>),
    /// Plain object as ordered `(name, value)` pairs
    Object(Vec<(String, ScriptValue)>),
}

impl ScriptValue {
    /// Kind tag matching what `type_at` would report for this value
    pub fn kind(&self) -> ValueKind {
        match self {
            ScriptValue::Undefined => ValueKind::Undefined,
            ScriptValue::Null => ValueKind::Null,
            ScriptValue::Bool(_) => ValueKind::Boolean,
            ScriptValue::Number(_) => ValueKind::Number,
            ScriptValue::String(_) => ValueKind::String,
            ScriptValue::Array(_) => ValueKind::Array,
            ScriptValue::Object(_) => ValueKind::Object,
        }
    }

    /// Build an object from `(name, value)` pairs
    pub fn object<K, I>(fields: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, ScriptValue)>,
    {
        ScriptValue::Object(fields.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// `true` for `undefined` and `null`
    pub fn is_nullish(&self) -> bool {
        matches!(self, ScriptValue::Undefined | ScriptValue::Null)
    }

    /// Extract a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            ScriptValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Look up an object property
    pub fn get(&self, name: &str) -> Option<&ScriptValue> {
        match self {
            ScriptValue::Object(fields) => fields.iter().find(|(k, _)| k == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl From<f64> for ScriptValue {
    fn from(n: f64) -> Self {
        ScriptValue::Number(n)
    }
}

impl From<i32> for ScriptValue {
    fn from(n: i32) -> Self {
        ScriptValue::Number(n as f64)
    }
}

impl From<bool> for ScriptValue {
    fn from(b: bool) -> Self {
        ScriptValue::Bool(b)
    }
}

impl From<&str> for ScriptValue {
    fn from(s: &str) -> Self {
        ScriptValue::String(s.to_string())
    }
}

impl From<String> for ScriptValue {
    fn from(s: String) -> Self {
        ScriptValue::String(s)
    }
}

impl<T: Into<ScriptValue>> From<Vec<T>> for ScriptValue {
    fn from(items: Vec<T>) -> Self {
        ScriptValue::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<ScriptValue>> From<Option<T>> for ScriptValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ScriptValue::Null, Into::into)
    }
}
