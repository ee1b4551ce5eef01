//! Concrete values produced by constant evaluation.
//!
//! [`ConstantValues`] is the replaceable snapshot attached to a container
//! after a successful constant binding: a complete name-to-value mapping for
//! every constant in scope. Binding again builds a fresh snapshot from
//! scratch, so no residue from a previous binding can survive.

use crate::foundation::types::Type;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete value of one of the three property-language types.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Integer value
    Int(i64),
    /// Real value
    Double(f64),
    /// Boolean value
    Bool(bool),
}

impl Value {
    /// The type of this value.
    pub fn ty(self) -> Type {
        match self {
            Value::Int(_) => Type::Int,
            Value::Double(_) => Type::Double,
            Value::Bool(_) => Type::Bool,
        }
    }

    /// Numeric view of this value, widening Int to Double.
    ///
    /// Returns `None` for Bool.
    pub fn as_double(self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(i as f64),
            Value::Double(d) => Some(d),
            Value::Bool(_) => None,
        }
    }

    /// Integer view of this value.
    ///
    /// Returns `None` for Double and Bool; no narrowing is performed.
    pub fn as_int(self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    /// Boolean view of this value.
    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    /// Coerce this value to a declared type, widening Int to Double.
    ///
    /// Returns `None` if the value does not fit the declared type.
    pub fn coerce(self, declared: Type) -> Option<Value> {
        match (self, declared) {
            (v, t) if v.ty() == t => Some(v),
            (Value::Int(i), Type::Double) => Some(Value::Double(i as f64)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Double(d) => write!(f, "{}", d),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Ordered name-to-value mapping for evaluated constants.
///
/// Preserves insertion order so snapshots iterate deterministically and
/// display in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantValues {
    values: IndexMap<String, Value>,
}

impl ConstantValues {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a value.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.values.insert(name.into(), value);
    }

    /// Look up a value by constant name.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.values.get(name).copied()
    }

    /// Check if a name is present.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Number of values in the snapshot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the snapshot is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over (name, value) pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Value)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl fmt::Display for ConstantValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in self.iter() {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, value)?;
            first = false;
        }
        Ok(())
    }
}

impl FromIterator<(String, Value)> for ConstantValues {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_types() {
        assert_eq!(Value::Int(3).ty(), Type::Int);
        assert_eq!(Value::Double(0.5).ty(), Type::Double);
        assert_eq!(Value::Bool(true).ty(), Type::Bool);
    }

    #[test]
    fn test_numeric_views() {
        assert_eq!(Value::Int(3).as_double(), Some(3.0));
        assert_eq!(Value::Double(0.5).as_double(), Some(0.5));
        assert_eq!(Value::Bool(true).as_double(), None);
        assert_eq!(Value::Double(0.5).as_int(), None);
    }

    #[test]
    fn test_coerce() {
        assert_eq!(Value::Int(2).coerce(Type::Double), Some(Value::Double(2.0)));
        assert_eq!(Value::Int(2).coerce(Type::Int), Some(Value::Int(2)));
        assert_eq!(Value::Double(2.5).coerce(Type::Int), None);
        assert_eq!(Value::Bool(true).coerce(Type::Int), None);
    }

    #[test]
    fn test_snapshot_replaces() {
        let mut values = ConstantValues::new();
        values.set("n", Value::Int(3));
        values.set("n", Value::Int(5));
        assert_eq!(values.get("n"), Some(Value::Int(5)));
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_display() {
        let mut values = ConstantValues::new();
        values.set("n", Value::Int(3));
        values.set("p", Value::Double(0.5));
        assert_eq!(values.to_string(), "n=3, p=0.5");
    }
}
