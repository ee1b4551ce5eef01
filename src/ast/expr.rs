//! Expression trees for the property language.
//!
//! Expressions are arena-allocated: an [`ExprArena`] owns every node and
//! hands out copyable [`ExprId`] indices. Nothing in the resolution pipeline
//! mutates a node after allocation; resolution metadata lives in side-tables
//! keyed by `ExprId` (see `resolve::tags`). This keeps shared definitions
//! cheap to reference and makes deep-copying a container a plain clone of
//! the arena plus its side-tables.
//!
//! # Expression Variants
//!
//! - Literals: [`ExprKind::IntLiteral`], [`ExprKind::DoubleLiteral`],
//!   [`ExprKind::BoolLiteral`]
//! - [`ExprKind::Ident`] - bare identifier; what it denotes (formula,
//!   constant, model variable) is decided during resolution
//! - [`ExprKind::LabelRef`] - quoted label reference, e.g. `"safe"`
//! - [`ExprKind::PropRef`] - quoted reference to another named property
//! - [`ExprKind::Unary`], [`ExprKind::Binary`], [`ExprKind::Ite`] -
//!   operators and if-then-else
//!
//! # Examples
//!
//! ```
//! # use props_core::ast::expr::*;
//! # use props_core::foundation::Span;
//! let span = Span::zero(0);
//! let mut arena = ExprArena::new();
//! let n = arena.ident("n", span);
//! let two = arena.int_lit(2, span);
//! let prod = arena.binary(BinaryOp::Mul, n, two, span);
//!
//! assert_eq!(arena.display(prod).to_string(), "n * 2");
//! ```

use crate::foundation::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of an expression node within an [`ExprArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(u32);

impl ExprId {
    /// Raw index value.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    /// Expression variant
    pub kind: ExprKind,
    /// Source location
    pub span: Span,
}

/// Expression variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    /// Integer literal
    IntLiteral(i64),
    /// Real literal
    DoubleLiteral(f64),
    /// Boolean literal
    BoolLiteral(bool),
    /// Bare identifier (formula, constant, or model variable)
    Ident(String),
    /// Quoted label reference: `"safe"`
    LabelRef(String),
    /// Quoted reference to a named property
    PropRef(String),
    /// Unary operation
    Unary { op: UnaryOp, operand: ExprId },
    /// Binary operation
    Binary {
        op: BinaryOp,
        lhs: ExprId,
        rhs: ExprId,
    },
    /// If-then-else
    Ite {
        condition: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
    },
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    /// Arithmetic negation
    Neg,
    /// Boolean negation
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Division always produces a double, even between two ints.
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    Implies,
    Iff,
}

impl BinaryOp {
    /// Arithmetic operators (numeric operands, numeric result).
    pub fn is_arith(self) -> bool {
        matches!(self, Self::Add | Self::Sub | Self::Mul | Self::Div)
    }

    /// Relational operators (numeric operands, boolean result).
    pub fn is_relational(self) -> bool {
        matches!(self, Self::Lt | Self::Le | Self::Gt | Self::Ge)
    }

    /// Equality operators (same-kind operands, boolean result).
    pub fn is_equality(self) -> bool {
        matches!(self, Self::Eq | Self::Ne)
    }

    /// Boolean connectives (boolean operands, boolean result).
    pub fn is_logical(self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Implies | Self::Iff)
    }

    /// Source-form symbol, used by the printer.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::And => "&",
            Self::Or => "|",
            Self::Implies => "=>",
            Self::Iff => "<=>",
        }
    }

    /// Binding strength for the printer (higher binds tighter).
    fn precedence(self) -> u8 {
        match self {
            Self::Mul | Self::Div => 7,
            Self::Add | Self::Sub => 6,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 5,
            Self::Eq | Self::Ne => 4,
            Self::And => 3,
            Self::Or => 2,
            Self::Implies | Self::Iff => 1,
        }
    }
}

/// Arena owning every expression node of one scope.
///
/// The external parser allocates into the arena; resolution only reads it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExprArena {
    nodes: Vec<Expr>,
}

impl ExprArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a node and return its id.
    pub fn alloc(&mut self, kind: ExprKind, span: Span) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(Expr { kind, span });
        id
    }

    /// Get a node by id.
    ///
    /// # Panics
    /// Panics if the id was allocated in a different arena.
    pub fn get(&self, id: ExprId) -> &Expr {
        &self.nodes[id.index()]
    }

    /// Get a node's kind.
    pub fn kind(&self, id: ExprId) -> &ExprKind {
        &self.get(id).kind
    }

    /// Get a node's span.
    pub fn span(&self, id: ExprId) -> Span {
        self.get(id).span
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Allocate an integer literal.
    pub fn int_lit(&mut self, value: i64, span: Span) -> ExprId {
        self.alloc(ExprKind::IntLiteral(value), span)
    }

    /// Allocate a real literal.
    pub fn double_lit(&mut self, value: f64, span: Span) -> ExprId {
        self.alloc(ExprKind::DoubleLiteral(value), span)
    }

    /// Allocate a boolean literal.
    pub fn bool_lit(&mut self, value: bool, span: Span) -> ExprId {
        self.alloc(ExprKind::BoolLiteral(value), span)
    }

    /// Allocate a bare identifier.
    pub fn ident(&mut self, name: impl Into<String>, span: Span) -> ExprId {
        self.alloc(ExprKind::Ident(name.into()), span)
    }

    /// Allocate a quoted label reference.
    pub fn label_ref(&mut self, name: impl Into<String>, span: Span) -> ExprId {
        self.alloc(ExprKind::LabelRef(name.into()), span)
    }

    /// Allocate a quoted property reference.
    pub fn prop_ref(&mut self, name: impl Into<String>, span: Span) -> ExprId {
        self.alloc(ExprKind::PropRef(name.into()), span)
    }

    /// Allocate a unary operation.
    pub fn unary(&mut self, op: UnaryOp, operand: ExprId, span: Span) -> ExprId {
        self.alloc(ExprKind::Unary { op, operand }, span)
    }

    /// Allocate a binary operation.
    pub fn binary(&mut self, op: BinaryOp, lhs: ExprId, rhs: ExprId, span: Span) -> ExprId {
        self.alloc(ExprKind::Binary { op, lhs, rhs }, span)
    }

    /// Allocate an if-then-else.
    pub fn ite(
        &mut self,
        condition: ExprId,
        then_branch: ExprId,
        else_branch: ExprId,
        span: Span,
    ) -> ExprId {
        self.alloc(
            ExprKind::Ite {
                condition,
                then_branch,
                else_branch,
            },
            span,
        )
    }

    /// Visit every node of a subtree in preorder.
    pub fn walk(&self, id: ExprId, visit: &mut impl FnMut(ExprId)) {
        visit(id);
        match self.kind(id) {
            ExprKind::Unary { operand, .. } => self.walk(*operand, visit),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.walk(*lhs, visit);
                self.walk(*rhs, visit);
            }
            ExprKind::Ite {
                condition,
                then_branch,
                else_branch,
            } => {
                self.walk(*condition, visit);
                self.walk(*then_branch, visit);
                self.walk(*else_branch, visit);
            }
            ExprKind::IntLiteral(_)
            | ExprKind::DoubleLiteral(_)
            | ExprKind::BoolLiteral(_)
            | ExprKind::Ident(_)
            | ExprKind::LabelRef(_)
            | ExprKind::PropRef(_) => {}
        }
    }

    /// Collect the node ids of every bare identifier in a subtree, in
    /// source order.
    pub fn idents(&self, id: ExprId) -> Vec<(ExprId, String)> {
        let mut out = Vec::new();
        self.walk(id, &mut |node| {
            if let ExprKind::Ident(name) = self.kind(node) {
                out.push((node, name.clone()));
            }
        });
        out
    }

    /// Structurally copy a subtree from another arena into this one.
    ///
    /// Returns the id of the copied root. Used when one container's tables
    /// are inserted into another: definitions keep their structure but get
    /// fresh ids in the destination arena.
    pub fn import(&mut self, source: &ExprArena, id: ExprId) -> ExprId {
        let span = source.span(id);
        match source.kind(id).clone() {
            ExprKind::Unary { op, operand } => {
                let operand = self.import(source, operand);
                self.alloc(ExprKind::Unary { op, operand }, span)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.import(source, lhs);
                let rhs = self.import(source, rhs);
                self.alloc(ExprKind::Binary { op, lhs, rhs }, span)
            }
            ExprKind::Ite {
                condition,
                then_branch,
                else_branch,
            } => {
                let condition = self.import(source, condition);
                let then_branch = self.import(source, then_branch);
                let else_branch = self.import(source, else_branch);
                self.alloc(
                    ExprKind::Ite {
                        condition,
                        then_branch,
                        else_branch,
                    },
                    span,
                )
            }
            leaf => self.alloc(leaf, span),
        }
    }

    /// Source-form display of a subtree.
    ///
    /// Formula uses print as their names, never as their expanded
    /// definitions, so re-displayed properties stay legible.
    pub fn display(&self, id: ExprId) -> ExprDisplay<'_> {
        ExprDisplay { arena: self, id }
    }

    fn fmt_expr(&self, f: &mut fmt::Formatter<'_>, id: ExprId, parent_prec: u8) -> fmt::Result {
        match self.kind(id) {
            ExprKind::IntLiteral(v) => write!(f, "{}", v),
            ExprKind::DoubleLiteral(v) => write!(f, "{}", v),
            ExprKind::BoolLiteral(v) => write!(f, "{}", v),
            ExprKind::Ident(name) => write!(f, "{}", name),
            ExprKind::LabelRef(name) | ExprKind::PropRef(name) => write!(f, "\"{}\"", name),
            ExprKind::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                write!(f, "{}", symbol)?;
                self.fmt_expr(f, *operand, 8)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let prec = op.precedence();
                if prec < parent_prec {
                    write!(f, "(")?;
                }
                self.fmt_expr(f, *lhs, prec)?;
                write!(f, " {} ", op.symbol())?;
                self.fmt_expr(f, *rhs, prec + 1)?;
                if prec < parent_prec {
                    write!(f, ")")?;
                }
                Ok(())
            }
            ExprKind::Ite {
                condition,
                then_branch,
                else_branch,
            } => {
                if parent_prec > 0 {
                    write!(f, "(")?;
                }
                self.fmt_expr(f, *condition, 1)?;
                write!(f, " ? ")?;
                self.fmt_expr(f, *then_branch, 1)?;
                write!(f, " : ")?;
                self.fmt_expr(f, *else_branch, 0)?;
                if parent_prec > 0 {
                    write!(f, ")")?;
                }
                Ok(())
            }
        }
    }
}

/// Display adapter returned by [`ExprArena::display`].
pub struct ExprDisplay<'a> {
    arena: &'a ExprArena,
    id: ExprId,
}

impl fmt::Display for ExprDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.arena.fmt_expr(f, self.id, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span() -> Span {
        Span::zero(0)
    }

    #[test]
    fn test_alloc_and_get() {
        let mut arena = ExprArena::new();
        let id = arena.int_lit(42, span());
        assert_eq!(arena.kind(id), &ExprKind::IntLiteral(42));
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_idents_in_source_order() {
        let mut arena = ExprArena::new();
        // a + b * a
        let a1 = arena.ident("a", span());
        let b = arena.ident("b", span());
        let a2 = arena.ident("a", span());
        let mul = arena.binary(BinaryOp::Mul, b, a2, span());
        let add = arena.binary(BinaryOp::Add, a1, mul, span());

        let names: Vec<_> = arena.idents(add).into_iter().map(|(_, n)| n).collect();
        assert_eq!(names, vec!["a", "b", "a"]);
    }

    #[test]
    fn test_walk_counts_all_nodes() {
        let mut arena = ExprArena::new();
        let c = arena.bool_lit(true, span());
        let t = arena.int_lit(1, span());
        let e = arena.int_lit(0, span());
        let ite = arena.ite(c, t, e, span());

        let mut count = 0;
        arena.walk(ite, &mut |_| count += 1);
        assert_eq!(count, 4);
    }

    #[test]
    fn test_import_copies_structure() {
        let mut src = ExprArena::new();
        let n = src.ident("n", span());
        let one = src.int_lit(1, span());
        let add = src.binary(BinaryOp::Add, n, one, span());

        let mut dst = ExprArena::new();
        dst.int_lit(99, span()); // offset the indices
        let copied = dst.import(&src, add);

        assert_eq!(dst.display(copied).to_string(), "n + 1");
        // Source is untouched
        assert_eq!(src.len(), 3);
    }

    #[test]
    fn test_display_precedence() {
        let mut arena = ExprArena::new();
        // (a + b) * c
        let a = arena.ident("a", span());
        let b = arena.ident("b", span());
        let c = arena.ident("c", span());
        let add = arena.binary(BinaryOp::Add, a, b, span());
        let mul = arena.binary(BinaryOp::Mul, add, c, span());
        assert_eq!(arena.display(mul).to_string(), "(a + b) * c");

        // a + b * c needs no parens
        let a = arena.ident("a", span());
        let b = arena.ident("b", span());
        let c = arena.ident("c", span());
        let mul = arena.binary(BinaryOp::Mul, b, c, span());
        let add = arena.binary(BinaryOp::Add, a, mul, span());
        assert_eq!(arena.display(add).to_string(), "a + b * c");
    }

    #[test]
    fn test_display_label_and_not() {
        let mut arena = ExprArena::new();
        let safe = arena.label_ref("safe", span());
        let not = arena.unary(UnaryOp::Not, safe, span());
        assert_eq!(arena.display(not).to_string(), "!\"safe\"");
    }

    #[test]
    fn test_display_implication() {
        let mut arena = ExprArena::new();
        let a = arena.ident("a", span());
        let b = arena.ident("b", span());
        let c = arena.ident("c", span());
        let and = arena.binary(BinaryOp::And, a, b, span());
        let imp = arena.binary(BinaryOp::Implies, and, c, span());
        assert_eq!(arena.display(imp).to_string(), "a & b => c");
    }
}
