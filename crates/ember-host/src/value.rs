//! Host-side values
//!
//! Objects and arrays are shared, mutable and reference counted, like the
//! values of any dynamic script engine. Nothing here is `Send`: values never
//! leave the owning thread.

use std::cell::RefCell;
use std::fmt;
use std::os::raw::c_int;
use std::rc::Rc;

use ember_sdk::{NativeFn, ScriptValue, ValueKind};

use crate::context::Context;
use crate::error::ScriptError;

/// Host closure standing in for a script function
pub type ScriptFn = dyn Fn(&Context, &[Value]) -> Result<Value, ScriptError>;

/// Something that can be called
pub enum Callable {
    /// Native function registered by an addon
    Native {
        /// Registered name
        name: Rc<str>,
        /// Entry point
        entry: NativeFn,
        /// Declared argument count (`VARARGS` for all)
        nargs: c_int,
    },
    /// Host closure
    Script {
        /// Name used in diagnostics
        name: Rc<str>,
        /// Body
        body: Box<ScriptFn>,
    },
}

impl Callable {
    /// Name used in diagnostics
    pub fn name(&self) -> &str {
        match self {
            Callable::Native { name, .. } | Callable::Script { name, .. } => name,
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native { name, nargs, .. } => write!(f, "[native {name}/{nargs}]"),
            Callable::Script { name, .. } => write!(f, "[function {name}]"),
        }
    }
}

/// A value living in the engine
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// `undefined`
    #[default]
    Undefined,
    /// `null`
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Number(f64),
    /// Immutable string
    String(Rc<str>),
    /// Object with properties in insertion order
    Object(Rc<RefCell<Vec<(Rc<str>, Value)>>>),
    /// Array
    Array(Rc<RefCell<Vec<Value>>>),
    /// Function
    Function(Rc<Callable>),
}

impl Value {
    /// A new empty object
    pub fn object() -> Self {
        Value::Object(Rc::new(RefCell::new(Vec::new())))
    }

    /// A new empty array
    pub fn array() -> Self {
        Value::Array(Rc::new(RefCell::new(Vec::new())))
    }

    /// A string value
    pub fn string(s: &str) -> Self {
        Value::String(Rc::from(s))
    }

    /// Wrap a callable
    pub fn function(callable: Callable) -> Self {
        Value::Function(Rc::new(callable))
    }

    /// Kind tag reported by `type_at`
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Boolean,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Object(_) => ValueKind::Object,
            Value::Array(_) => ValueKind::Array,
            Value::Function(_) => ValueKind::Function,
        }
    }

    /// Extract a number
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Extract a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Check for a function
    pub fn is_function(&self) -> bool {
        matches!(self, Value::Function(_))
    }

    /// Read property `name` of an object
    pub fn get(&self, name: &str) -> Option<Value> {
        match self {
            Value::Object(props) => props
                .borrow()
                .iter()
                .find(|(k, _)| &**k == name)
                .map(|(_, v)| v.clone()),
            _ => None,
        }
    }

    /// Set property `name` of an object, replacing an existing binding.
    ///
    /// Returns `false` if this is not an object.
    pub fn set(&self, name: &str, value: Value) -> bool {
        let Value::Object(props) = self else {
            return false;
        };
        let mut props = props.borrow_mut();
        match props.iter_mut().find(|(k, _)| &**k == name) {
            Some((_, slot)) => *slot = value,
            None => props.push((Rc::from(name), value)),
        }
        true
    }

    /// Remove property `name` of an object
    pub fn remove(&self, name: &str) -> Option<Value> {
        let Value::Object(props) = self else {
            return None;
        };
        let mut props = props.borrow_mut();
        let pos = props.iter().position(|(k, _)| &**k == name)?;
        Some(props.remove(pos).1)
    }

    /// Property names of an object, in insertion order
    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Object(props) => props.borrow().iter().map(|(k, _)| k.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    /// Element `index` of an array
    pub fn at(&self, index: usize) -> Option<Value> {
        match self {
            Value::Array(items) => items.borrow().get(index).cloned(),
            _ => None,
        }
    }

    /// Store element `index` of an array, growing it with `undefined`.
    ///
    /// Returns `false` if this is not an array.
    pub fn set_at(&self, index: usize, value: Value) -> bool {
        let Value::Array(items) = self else {
            return false;
        };
        let mut items = items.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
        true
    }

    /// Element or property count
    pub fn len(&self) -> usize {
        match self {
            Value::Array(items) => items.borrow().len(),
            Value::Object(props) => props.borrow().len(),
            _ => 0,
        }
    }

    /// Check for an empty array or object
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deep copy into a [`ScriptValue`]; `None` if a function is reachable
    pub fn to_script_value(&self) -> Option<ScriptValue> {
        Some(match self {
            Value::Undefined => ScriptValue::Undefined,
            Value::Null => ScriptValue::Null,
            Value::Bool(b) => ScriptValue::Bool(*b),
            Value::Number(n) => ScriptValue::Number(*n),
            Value::String(s) => ScriptValue::String(s.to_string()),
            Value::Array(items) => ScriptValue::Array(
                items
                    .borrow()
                    .iter()
                    .map(Value::to_script_value)
                    .collect::<Option<_>>()?,
            ),
            Value::Object(props) => ScriptValue::Object(
                props
                    .borrow()
                    .iter()
                    .map(|(k, v)| Some((k.to_string(), v.to_script_value()?)))
                    .collect::<Option<_>>()?,
            ),
            Value::Function(_) => return None,
        })
    }
}

impl PartialEq for Value {
    /// Structural for data, identity for functions
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&ScriptValue> for Value {
    fn from(value: &ScriptValue) -> Self {
        match value {
            ScriptValue::Undefined => Value::Undefined,
            ScriptValue::Null => Value::Null,
            ScriptValue::Bool(b) => Value::Bool(*b),
            ScriptValue::Number(n) => Value::Number(*n),
            ScriptValue::String(s) => Value::string(s),
            ScriptValue::Array(items) => {
                Value::Array(Rc::new(RefCell::new(items.iter().map(Value::from).collect())))
            }
            ScriptValue::Object(fields) => {
                let obj = Value::object();
                for (k, v) in fields {
                    obj.set(k, Value::from(v));
                }
                obj
            }
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_set_replaces() {
        let obj = Value::object();
        assert!(obj.set("a", Value::from(1.0)));
        assert!(obj.set("b", Value::from(true)));
        assert!(obj.set("a", Value::from(2.0)));
        assert_eq!(obj.keys(), vec!["a", "b"]);
        assert_eq!(obj.get("a"), Some(Value::Number(2.0)));
        assert_eq!(obj.remove("a"), Some(Value::Number(2.0)));
        assert_eq!(obj.keys(), vec!["b"]);
    }

    #[test]
    fn test_array_grows_with_undefined() {
        let arr = Value::array();
        assert!(arr.set_at(2, Value::from("c")));
        assert_eq!(arr.len(), 3);
        assert_eq!(arr.at(0), Some(Value::Undefined));
        assert_eq!(arr.at(2), Some(Value::from("c")));
        assert!(!Value::Null.set_at(0, Value::Null));
    }

    #[test]
    fn test_script_value_conversion() {
        let source = ScriptValue::object([
            ("tags", ScriptValue::from(vec!["a", "b"])),
            ("n", ScriptValue::from(3.0)),
        ]);
        let value = Value::from(&source);
        assert_eq!(value.kind(), ValueKind::Object);
        assert_eq!(value.to_script_value(), Some(source));
    }
}
