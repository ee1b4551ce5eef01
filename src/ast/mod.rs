//! AST types produced by the external parser and consumed by resolution.

pub mod expr;
pub mod tables;

pub use expr::{BinaryOp, Expr, ExprArena, ExprDisplay, ExprId, ExprKind, UnaryOp};
pub use tables::{Constant, ConstantTable, Formula, FormulaTable, LabelEntry, LabelTable, Property};
