//! Resolution pipeline for a properties container.
//!
//! [`PropertiesContainer::resolve`](crate::container::PropertiesContainer::resolve)
//! drives these passes in a fixed order, failing fast on the first error:
//!
//! 1. claim local formula names ([`registry`])
//! 2. tag formula references, detect formula cycles, record formula
//!    definitions without inlining them ([`tags`], [`graph`])
//! 3. check label name uniqueness and build the combined label view
//! 4. claim local constant names
//! 5. tag constant references
//! 6. detect constant cycles
//! 7. check property name uniqueness
//! 8. tag variable references
//! 9. resolve property references
//! 10. enforce placement restrictions ([`semantic`])
//! 11. type check every root ([`typecheck`])
//!
//! Constant binding is not a pass: a successful `resolve()` discards any
//! value snapshot and constants are (re)bound explicitly afterwards via
//! [`bind_constants`](crate::container::PropertiesContainer::bind_constants)
//! ([`constants`]).
//!
//! Every pass writes only side-tables (the registry, the binding table, the
//! type table). Expression trees are immutable once parsed, which is what
//! makes re-running the pipeline after `insert` safe.

pub mod constants;
pub mod graph;
pub mod registry;
pub mod semantic;
pub mod tags;
pub mod typecheck;

pub use constants::{eval_expr, evaluate_constants};
pub use graph::DependencyGraph;
pub use registry::IdentifierRegistry;
pub use tags::{Bindings, ScopeRef, Target};
pub use typecheck::{TypeChecker, TypeContext, TypeMap};
