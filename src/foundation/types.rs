//! Type system for property expressions.
//!
//! The property language has three value types:
//! - **Int** — mathematical integers (counters, bounds, undefined constants)
//! - **Double** — real-valued quantities (rates, probabilities)
//! - **Bool** — predicates over model state (labels, guards)
//!
//! Int widens to Double wherever a Double is expected; the reverse is a
//! type mismatch. Division always produces a Double, even between two Ints.
//!
//! # Examples
//!
//! ```
//! # use props_core::foundation::types::Type;
//! assert!(Type::Double.can_assign(Type::Int));
//! assert!(!Type::Int.can_assign(Type::Double));
//! assert_eq!(Type::Int.unify(Type::Double), Some(Type::Double));
//! assert_eq!(Type::Bool.unify(Type::Int), None);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// A type in the property-expression type system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Integer type
    Int,
    /// Real type
    Double,
    /// Boolean type
    Bool,
}

impl Type {
    /// Check if this is Int.
    pub fn is_int(self) -> bool {
        matches!(self, Type::Int)
    }

    /// Check if this is Double.
    pub fn is_double(self) -> bool {
        matches!(self, Type::Double)
    }

    /// Check if this is Bool.
    pub fn is_bool(self) -> bool {
        matches!(self, Type::Bool)
    }

    /// Check if this is a numeric type (Int or Double).
    pub fn is_numeric(self) -> bool {
        matches!(self, Type::Int | Type::Double)
    }

    /// Check whether a value of type `other` can be used where `self` is
    /// expected. Int widens to Double; everything else requires equality.
    pub fn can_assign(self, other: Type) -> bool {
        self == other || (self == Type::Double && other == Type::Int)
    }

    /// Least common type of two operand types, if one exists.
    ///
    /// Int and Double unify to Double; Bool only unifies with itself.
    pub fn unify(self, other: Type) -> Option<Type> {
        match (self, other) {
            (a, b) if a == b => Some(a),
            (Type::Int, Type::Double) | (Type::Double, Type::Int) => Some(Type::Double),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Double => write!(f, "double"),
            Type::Bool => write!(f, "bool"),
        }
    }
}
