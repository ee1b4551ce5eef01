//! Type checking over tagged expression trees.
//!
//! Runs after tagging, so every identifier either carries a binding or is
//! genuinely undeclared. Types are computed bottom-up and memoised per node
//! in a side-table keyed like the binding table, never written into the
//! trees themselves.
//!
//! The numeric types relate by widening only: an int fits wherever a double
//! is wanted, never the reverse. Division is the one arithmetic operator
//! with a fixed result type; `1 / 2` is typed double.
//!
//! Formula references type as their definition. Property references type as
//! the referenced property's expression, guarded against reference cycles
//! (a property may reference an earlier or later property, but the chain
//! must not close).

use crate::ast::expr::{BinaryOp, ExprArena, ExprId, ExprKind, UnaryOp};
use crate::ast::tables::{ConstantTable, LabelTable, Property};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::foundation::{Span, Type};
use crate::resolve::tags::{Bindings, ScopeRef, Target};
use indexmap::{IndexMap, IndexSet};

/// Node-to-type side-table produced by type checking.
pub type TypeMap = IndexMap<(ScopeRef, ExprId), Type>;

/// Everything the type checker reads; all borrowed from the container and
/// its linked model scope.
pub struct TypeContext<'a> {
    /// Arena holding model-scope expressions
    pub model_arena: &'a ExprArena,
    /// Arena holding the container's expressions
    pub local_arena: &'a ExprArena,
    /// Identifier bindings from the tagging passes
    pub bindings: &'a Bindings,
    /// Model-scope constant table
    pub model_constants: &'a ConstantTable,
    /// Local constant table
    pub local_constants: &'a ConstantTable,
    /// Model variables with their declared types
    pub variables: &'a [(String, Type)],
    /// Combined label view (local labels plus imported model labels)
    pub labels: &'a LabelTable,
    /// The container's properties, for typing property references
    pub properties: &'a [Property],
}

/// Bottom-up type checker with memoisation and a property-reference cycle
/// guard.
pub struct TypeChecker<'a> {
    ctx: TypeContext<'a>,
    types: TypeMap,
    visiting: IndexSet<(ScopeRef, ExprId)>,
}

impl<'a> TypeChecker<'a> {
    /// Create a checker over the given context.
    pub fn new(ctx: TypeContext<'a>) -> Self {
        Self {
            ctx,
            types: TypeMap::new(),
            visiting: IndexSet::new(),
        }
    }

    /// Computed types so far.
    pub fn types(&self) -> &TypeMap {
        &self.types
    }

    /// Consume the checker, keeping the computed type table.
    pub fn into_types(self) -> TypeMap {
        self.types
    }

    fn arena(&self, scope: ScopeRef) -> &'a ExprArena {
        match scope {
            ScopeRef::Model => self.ctx.model_arena,
            ScopeRef::Local => self.ctx.local_arena,
        }
    }

    /// Type a subtree, demanding an exact result type.
    ///
    /// Widening applies: asking for double accepts an int-typed tree.
    pub fn expect(
        &mut self,
        scope: ScopeRef,
        id: ExprId,
        expected: Type,
        what: &str,
    ) -> CompileResult<()> {
        let actual = self.check(scope, id)?;
        if expected.can_assign(actual) {
            Ok(())
        } else {
            Err(CompileError::new(
                ErrorKind::TypeMismatch,
                self.arena(scope).span(id),
                format!("{} must be {}, found {}", what, expected, actual),
            ))
        }
    }

    /// Type a subtree.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::TypeMismatch`] for ill-typed operator applications,
    /// [`ErrorKind::UnresolvedIdentifier`] for untagged identifiers and
    /// unknown labels, [`ErrorKind::CyclicDependency`] for a closed chain
    /// of property references.
    pub fn check(&mut self, scope: ScopeRef, id: ExprId) -> CompileResult<Type> {
        if let Some(ty) = self.types.get(&(scope, id)) {
            return Ok(*ty);
        }
        if !self.visiting.insert((scope, id)) {
            return Err(CompileError::new(
                ErrorKind::CyclicDependency,
                self.arena(scope).span(id),
                "cyclic dependency through property references".to_string(),
            ));
        }
        let result = self.check_uncached(scope, id);
        self.visiting.swap_remove(&(scope, id));
        let ty = result?;
        self.types.insert((scope, id), ty);
        Ok(ty)
    }

    fn check_uncached(&mut self, scope: ScopeRef, id: ExprId) -> CompileResult<Type> {
        let arena = self.arena(scope);
        let span = arena.span(id);
        match arena.kind(id) {
            ExprKind::IntLiteral(_) => Ok(Type::Int),
            ExprKind::DoubleLiteral(_) => Ok(Type::Double),
            ExprKind::BoolLiteral(_) => Ok(Type::Bool),
            ExprKind::Ident(name) => self.check_ident(scope, id, name, span),
            ExprKind::LabelRef(name) => {
                if self.ctx.labels.contains(name) {
                    Ok(Type::Bool)
                } else {
                    Err(CompileError::new(
                        ErrorKind::UnresolvedIdentifier,
                        span,
                        format!("undefined label \"{}\"", name),
                    ))
                }
            }
            ExprKind::PropRef(name) => match self.ctx.bindings.get(scope, id) {
                Some(Target::Property { index }) => {
                    let target = self.ctx.properties[*index].expr;
                    self.check(ScopeRef::Local, target)
                }
                _ => Err(CompileError::new(
                    ErrorKind::UnresolvedIdentifier,
                    span,
                    format!("could not resolve property reference \"{}\"", name),
                )),
            },
            ExprKind::Unary { op, operand } => {
                let (op, operand) = (*op, *operand);
                let ty = self.check(scope, operand)?;
                self.check_unary(op, ty, span)
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (op, lhs, rhs) = (*op, *lhs, *rhs);
                let left = self.check(scope, lhs)?;
                let right = self.check(scope, rhs)?;
                self.check_binary(op, left, right, span)
            }
            ExprKind::Ite {
                condition,
                then_branch,
                else_branch,
            } => {
                let (condition, then_branch, else_branch) = (*condition, *then_branch, *else_branch);
                self.expect(scope, condition, Type::Bool, "condition of ?:")?;
                let then_ty = self.check(scope, then_branch)?;
                let else_ty = self.check(scope, else_branch)?;
                then_ty.unify(else_ty).ok_or_else(|| {
                    CompileError::new(
                        ErrorKind::TypeMismatch,
                        span,
                        format!("branches of ?: have incompatible types {} and {}", then_ty, else_ty),
                    )
                })
            }
        }
    }

    fn check_ident(
        &mut self,
        scope: ScopeRef,
        id: ExprId,
        name: &str,
        span: Span,
    ) -> CompileResult<Type> {
        match self.ctx.bindings.get(scope, id) {
            Some(Target::Formula {
                scope: def_scope,
                definition: Some(def),
                ..
            }) => self.check(*def_scope, *def),
            Some(Target::Formula {
                definition: None, ..
            }) => Err(CompileError::new(
                ErrorKind::Internal,
                span,
                format!("formula \"{}\" was tagged but never expanded", name),
            )),
            Some(Target::Constant {
                scope: def_scope,
                index,
            }) => {
                let table = match def_scope {
                    ScopeRef::Model => self.ctx.model_constants,
                    ScopeRef::Local => self.ctx.local_constants,
                };
                Ok(table.get(*index).ty)
            }
            Some(Target::Variable { index }) => Ok(self.ctx.variables[*index].1),
            Some(Target::Property { .. }) => Err(CompileError::new(
                ErrorKind::Internal,
                span,
                format!("identifier \"{}\" tagged as a property", name),
            )),
            None => Err(CompileError::new(
                ErrorKind::UnresolvedIdentifier,
                span,
                format!("could not resolve identifier \"{}\"", name),
            )),
        }
    }

    fn check_unary(&self, op: UnaryOp, ty: Type, span: Span) -> CompileResult<Type> {
        match op {
            UnaryOp::Neg if ty.is_numeric() => Ok(ty),
            UnaryOp::Not if ty.is_bool() => Ok(Type::Bool),
            UnaryOp::Neg => Err(CompileError::new(
                ErrorKind::TypeMismatch,
                span,
                format!("operator - needs a numeric operand, found {}", ty),
            )),
            UnaryOp::Not => Err(CompileError::new(
                ErrorKind::TypeMismatch,
                span,
                format!("operator ! needs a boolean operand, found {}", ty),
            )),
        }
    }

    fn check_binary(&self, op: BinaryOp, left: Type, right: Type, span: Span) -> CompileResult<Type> {
        if op.is_arith() {
            if !left.is_numeric() || !right.is_numeric() {
                return Err(self.operand_error(op, left, right, span, "numeric"));
            }
            if op == BinaryOp::Div {
                return Ok(Type::Double);
            }
            return left.unify(right).ok_or_else(|| {
                self.operand_error(op, left, right, span, "numeric")
            });
        }
        if op.is_relational() {
            if left.is_numeric() && right.is_numeric() {
                return Ok(Type::Bool);
            }
            return Err(self.operand_error(op, left, right, span, "numeric"));
        }
        if op.is_equality() {
            let comparable =
                (left.is_numeric() && right.is_numeric()) || (left.is_bool() && right.is_bool());
            if comparable {
                return Ok(Type::Bool);
            }
            return Err(CompileError::new(
                ErrorKind::TypeMismatch,
                span,
                format!("operator {} cannot compare {} and {}", op.symbol(), left, right),
            ));
        }
        // Logical connectives
        if left.is_bool() && right.is_bool() {
            Ok(Type::Bool)
        } else {
            Err(self.operand_error(op, left, right, span, "boolean"))
        }
    }

    fn operand_error(
        &self,
        op: BinaryOp,
        left: Type,
        right: Type,
        span: Span,
        wanted: &str,
    ) -> CompileError {
        CompileError::new(
            ErrorKind::TypeMismatch,
            span,
            format!(
                "operator {} needs {} operands, found {} and {}",
                op.symbol(),
                wanted,
                left,
                right
            ),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::tags::{resolve_prop_refs, tag_constant_refs, tag_variable_refs};

    fn span() -> Span {
        Span::zero(0)
    }

    struct Fixture {
        model_arena: ExprArena,
        local_arena: ExprArena,
        bindings: Bindings,
        model_constants: ConstantTable,
        local_constants: ConstantTable,
        variables: Vec<(String, Type)>,
        labels: LabelTable,
        properties: Vec<Property>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                model_arena: ExprArena::new(),
                local_arena: ExprArena::new(),
                bindings: Bindings::new(),
                model_constants: ConstantTable::new(),
                local_constants: ConstantTable::new(),
                variables: Vec::new(),
                labels: LabelTable::new(),
                properties: Vec::new(),
            }
        }

        fn checker(&self) -> TypeChecker<'_> {
            TypeChecker::new(TypeContext {
                model_arena: &self.model_arena,
                local_arena: &self.local_arena,
                bindings: &self.bindings,
                model_constants: &self.model_constants,
                local_constants: &self.local_constants,
                variables: &self.variables,
                labels: &self.labels,
                properties: &self.properties,
            })
        }
    }

    #[test]
    fn test_literals_and_arith() {
        let mut fx = Fixture::new();
        let one = fx.local_arena.int_lit(1, span());
        let half = fx.local_arena.double_lit(0.5, span());
        let sum = fx.local_arena.binary(BinaryOp::Add, one, half, span());

        let mut checker = fx.checker();
        assert_eq!(checker.check(ScopeRef::Local, sum).unwrap(), Type::Double);
    }

    #[test]
    fn test_division_always_double() {
        let mut fx = Fixture::new();
        let one = fx.local_arena.int_lit(1, span());
        let two = fx.local_arena.int_lit(2, span());
        let div = fx.local_arena.binary(BinaryOp::Div, one, two, span());

        let mut checker = fx.checker();
        assert_eq!(checker.check(ScopeRef::Local, div).unwrap(), Type::Double);
    }

    #[test]
    fn test_constant_ref_types_as_declared() {
        let mut fx = Fixture::new();
        fx.local_constants.add_constant("p", span(), None, Type::Double);
        let p_ref = fx.local_arena.ident("p", span());
        tag_constant_refs(
            &mut fx.bindings,
            ScopeRef::Local,
            &fx.local_arena,
            p_ref,
            &fx.model_constants,
            &fx.local_constants,
        );

        let mut checker = fx.checker();
        assert_eq!(checker.check(ScopeRef::Local, p_ref).unwrap(), Type::Double);
    }

    #[test]
    fn test_variable_ref_types_as_declared() {
        let mut fx = Fixture::new();
        fx.variables.push(("x".to_string(), Type::Int));
        let x_ref = fx.local_arena.ident("x", span());
        tag_variable_refs(
            &mut fx.bindings,
            ScopeRef::Local,
            &fx.local_arena,
            x_ref,
            &fx.variables,
        );

        let mut checker = fx.checker();
        assert_eq!(checker.check(ScopeRef::Local, x_ref).unwrap(), Type::Int);
    }

    #[test]
    fn test_unresolved_ident() {
        let mut fx = Fixture::new();
        let ghost = fx.local_arena.ident("ghost", span());

        let mut checker = fx.checker();
        let err = checker.check(ScopeRef::Local, ghost).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedIdentifier);
        assert!(err.message.contains("ghost"));
    }

    #[test]
    fn test_label_ref_is_bool() {
        let mut fx = Fixture::new();
        let t = fx.local_arena.bool_lit(true, span());
        fx.labels.add_label("safe", span(), t);
        let safe = fx.local_arena.label_ref("safe", span());
        let missing = fx.local_arena.label_ref("missing", span());

        let mut checker = fx.checker();
        assert_eq!(checker.check(ScopeRef::Local, safe).unwrap(), Type::Bool);
        let err = checker.check(ScopeRef::Local, missing).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedIdentifier);
    }

    #[test]
    fn test_prop_ref_types_as_target() {
        let mut fx = Fixture::new();
        let goal_expr = fx.local_arena.bool_lit(true, span());
        fx.properties
            .push(Property::new(Some("goal".to_string()), span(), goal_expr, None));
        let reference = fx.local_arena.prop_ref("goal", span());
        resolve_prop_refs(&mut fx.bindings, &fx.local_arena, reference, &fx.properties).unwrap();

        let mut checker = fx.checker();
        assert_eq!(checker.check(ScopeRef::Local, reference).unwrap(), Type::Bool);
    }

    #[test]
    fn test_prop_ref_cycle_detected() {
        let mut fx = Fixture::new();
        // "a" is defined as a reference to itself
        let a_ref = fx.local_arena.prop_ref("a", span());
        fx.properties
            .push(Property::new(Some("a".to_string()), span(), a_ref, None));
        resolve_prop_refs(&mut fx.bindings, &fx.local_arena, a_ref, &fx.properties).unwrap();

        let mut checker = fx.checker();
        let err = checker.check(ScopeRef::Local, a_ref).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CyclicDependency);
    }

    #[test]
    fn test_logical_needs_bool() {
        let mut fx = Fixture::new();
        let one = fx.local_arena.int_lit(1, span());
        let t = fx.local_arena.bool_lit(true, span());
        let bad = fx.local_arena.binary(BinaryOp::And, one, t, span());

        let mut checker = fx.checker();
        let err = checker.check(ScopeRef::Local, bad).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_ite_unifies_branches() {
        let mut fx = Fixture::new();
        let cond = fx.local_arena.bool_lit(true, span());
        let one = fx.local_arena.int_lit(1, span());
        let half = fx.local_arena.double_lit(0.5, span());
        let ite = fx.local_arena.ite(cond, one, half, span());

        let mut checker = fx.checker();
        assert_eq!(checker.check(ScopeRef::Local, ite).unwrap(), Type::Double);
    }

    #[test]
    fn test_expect_widens_int_to_double() {
        let mut fx = Fixture::new();
        let one = fx.local_arena.int_lit(1, span());

        let mut checker = fx.checker();
        checker
            .expect(ScopeRef::Local, one, Type::Double, "probability bound")
            .unwrap();
        let err = checker
            .expect(ScopeRef::Local, one, Type::Bool, "label predicate")
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }
}
