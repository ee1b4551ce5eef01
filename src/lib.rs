//! Semantic analysis for property specifications checked against a
//! probabilistic model.
//!
//! A [`PropertiesContainer`] holds a parsed set of properties together with
//! the formulas, labels and constants declared alongside them, linked to
//! the [`ModelScope`] they will be checked against. The container walks a
//! fixed resolution pipeline (name claiming, reference tagging, cycle
//! detection, type checking, placement checks) and then supports repeated
//! constant binding: supply values for the undefined constants, get back a
//! complete value snapshot, rebind with different values at will.
//!
//! ```
//! use props_core::{ModelScope, PropertiesContainer, Property, Span, Type};
//! use std::rc::Rc;
//!
//! let mut model = ModelScope::new();
//! model.add_variable("x", Type::Int);
//! let model = Rc::new(model);
//!
//! let mut props = PropertiesContainer::new(Rc::clone(&model));
//! let span = Span::zero(0);
//! let x = props.arena_mut().ident("x", span);
//! let three = props.arena_mut().int_lit(3, span);
//! let expr = props.arena_mut().binary(props_core::BinaryOp::Lt, x, three, span);
//! props.add_property(Property::new(Some("low".into()), span, expr, None));
//!
//! props.resolve().unwrap();
//! assert!(props.lookup_property_by_name("low").is_some());
//! ```
//!
//! Expression trees are arena-allocated and immutable after parsing; every
//! analysis result lives in a side-table. That makes containers cheap to
//! [`deep_copy`](PropertiesContainer::deep_copy) and safe to re-resolve
//! after [`insert`](PropertiesContainer::insert)ing another container's
//! definitions.

pub mod ast;
pub mod container;
pub mod error;
pub mod foundation;
pub mod model;
pub mod resolve;

pub use ast::{
    BinaryOp, Constant, ConstantTable, Expr, ExprArena, ExprId, ExprKind, Formula, FormulaTable,
    LabelEntry, LabelTable, Property, UnaryOp,
};
pub use container::{PropertiesContainer, ResolveState};
pub use error::{CompileError, CompileResult, DiagnosticFormatter, ErrorKind, Severity};
pub use foundation::{ConstantValues, SourceFile, SourceMap, Span, Type, Value};
pub use model::ModelScope;
pub use resolve::{Bindings, ScopeRef, Target, TypeMap};
