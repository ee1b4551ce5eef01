//! Constant evaluation: turn a constant table plus supplied values into a
//! complete name-to-value snapshot.
//!
//! Evaluation order comes from the dependency graph's topological order, so
//! a defined constant may reference any other constant of the same table
//! regardless of declaration order. Values already known from an outer
//! scope (the model's bound constants, when evaluating a container's local
//! table) are passed in as the base map and may be referenced freely.
//!
//! Division always evaluates in floating point, even between two integer
//! operands. A defined constant's value is coerced to its declared type;
//! integer values widen to double, nothing narrows.

use crate::ast::expr::{BinaryOp, ExprArena, ExprId, ExprKind, UnaryOp};
use crate::ast::tables::ConstantTable;
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::foundation::{ConstantValues, Span, Value};
use crate::resolve::graph::DependencyGraph;
use tracing::debug;

/// Evaluate every constant in `table`, producing a complete snapshot.
///
/// `supplied` provides values for undefined constants; `base` provides
/// already-bound values from an outer scope that definitions may reference.
/// The returned map contains the base values plus one entry per table
/// entry.
///
/// # Errors
///
/// - [`ErrorKind::MissingConstantValue`] if an undefined constant has no
///   supplied value
/// - [`ErrorKind::TypeMismatch`] if a value does not fit the declared type
/// - [`ErrorKind::CyclicDependency`] if definitions reference each other
///   cyclically
pub fn evaluate_constants(
    arena: &ExprArena,
    table: &ConstantTable,
    supplied: &ConstantValues,
    base: &ConstantValues,
) -> CompileResult<ConstantValues> {
    let mut graph = DependencyGraph::new();
    for entry in table.iter() {
        graph.add_node(&entry.name, entry.name_span);
    }
    for entry in table.iter() {
        if let Some(def) = entry.definition {
            graph.add_edges_from_expr(&entry.name, arena, def);
        }
    }
    let order = graph.topological_order()?;
    debug!(constants = order.len(), "evaluating constants");

    let mut values = base.clone();
    for name in &order {
        let index = table
            .index_of(name)
            .ok_or_else(|| internal_error(format!("graph node \"{}\" missing from table", name)))?;
        let entry = table.get(index);
        let value = match entry.definition {
            Some(def) => eval_expr(arena, def, &values)?,
            None => supplied.get(name).ok_or_else(|| {
                CompileError::new(
                    ErrorKind::MissingConstantValue,
                    entry.name_span,
                    format!("no value provided for undefined constant \"{}\"", name),
                )
            })?,
        };
        let coerced = value.coerce(entry.ty).ok_or_else(|| {
            CompileError::new(
                ErrorKind::TypeMismatch,
                entry.name_span,
                format!(
                    "value of constant \"{}\" has type {} but was declared {}",
                    name,
                    value.ty(),
                    entry.ty
                ),
            )
        })?;
        values.set(name, coerced);
    }
    Ok(values)
}

/// Evaluate a closed constant expression against a value environment.
///
/// Only literals, known constant names, and the operator set are legal
/// here; anything else was already rejected by the semantic checks, so
/// hitting it means the pipeline is inconsistent.
pub fn eval_expr(arena: &ExprArena, id: ExprId, values: &ConstantValues) -> CompileResult<Value> {
    let span = arena.span(id);
    match arena.kind(id) {
        ExprKind::IntLiteral(v) => Ok(Value::Int(*v)),
        ExprKind::DoubleLiteral(v) => Ok(Value::Double(*v)),
        ExprKind::BoolLiteral(v) => Ok(Value::Bool(*v)),
        ExprKind::Ident(name) => values.get(name).ok_or_else(|| {
            CompileError::new(
                ErrorKind::UnresolvedIdentifier,
                span,
                format!("\"{}\" has no value in this constant environment", name),
            )
        }),
        ExprKind::LabelRef(name) => Err(CompileError::new(
            ErrorKind::Internal,
            span,
            format!("label reference \"{}\" survived into constant evaluation", name),
        )),
        ExprKind::PropRef(name) => Err(CompileError::new(
            ErrorKind::Internal,
            span,
            format!("property reference \"{}\" survived into constant evaluation", name),
        )),
        ExprKind::Unary { op, operand } => {
            let value = eval_expr(arena, *operand, values)?;
            eval_unary(*op, value, span)
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let left = eval_expr(arena, *lhs, values)?;
            let right = eval_expr(arena, *rhs, values)?;
            eval_binary(*op, left, right, span)
        }
        ExprKind::Ite {
            condition,
            then_branch,
            else_branch,
        } => {
            let cond = eval_expr(arena, *condition, values)?;
            let Value::Bool(cond) = cond else {
                return Err(type_error(span, "condition of ?: must be boolean"));
            };
            let then_val = eval_expr(arena, *then_branch, values)?;
            let else_val = eval_expr(arena, *else_branch, values)?;
            // Branch types were unified during type checking; mixed
            // numeric branches settle on double
            let chosen = if cond { then_val } else { else_val };
            match (then_val, else_val) {
                (Value::Int(_), Value::Double(_)) | (Value::Double(_), Value::Int(_)) => {
                    match numeric(chosen) {
                        Some(v) => Ok(Value::Double(v)),
                        None => Err(type_error(span, "branches of ?: must agree in type")),
                    }
                }
                _ => Ok(chosen),
            }
        }
    }
}

fn eval_unary(op: UnaryOp, value: Value, span: Span) -> CompileResult<Value> {
    match (op, value) {
        (UnaryOp::Neg, Value::Int(v)) => Ok(Value::Int(v.wrapping_neg())),
        (UnaryOp::Neg, Value::Double(v)) => Ok(Value::Double(-v)),
        (UnaryOp::Not, Value::Bool(v)) => Ok(Value::Bool(!v)),
        _ => Err(type_error(
            span,
            format!("operator {} not applicable to {}", op_name(op), value.ty()),
        )),
    }
}

fn eval_binary(op: BinaryOp, left: Value, right: Value, span: Span) -> CompileResult<Value> {
    if op.is_arith() {
        return eval_arith(op, left, right, span);
    }
    if op.is_relational() {
        let (Some(a), Some(b)) = (numeric(left), numeric(right)) else {
            return Err(type_error(
                span,
                format!("operator {} needs numeric operands", op.symbol()),
            ));
        };
        return Ok(Value::Bool(match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Le => a <= b,
            BinaryOp::Gt => a > b,
            BinaryOp::Ge => a >= b,
            _ => unreachable!(),
        }));
    }
    if op.is_equality() {
        let equal = match (left, right) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            _ => match (numeric(left), numeric(right)) {
                (Some(a), Some(b)) => a == b,
                _ => {
                    return Err(type_error(
                        span,
                        format!("operator {} cannot compare {} and {}", op.symbol(), left.ty(), right.ty()),
                    ))
                }
            },
        };
        return Ok(Value::Bool(if op == BinaryOp::Eq { equal } else { !equal }));
    }
    // Logical connectives
    let (Value::Bool(a), Value::Bool(b)) = (left, right) else {
        return Err(type_error(
            span,
            format!("operator {} needs boolean operands", op.symbol()),
        ));
    };
    Ok(Value::Bool(match op {
        BinaryOp::And => a && b,
        BinaryOp::Or => a || b,
        BinaryOp::Implies => !a || b,
        BinaryOp::Iff => a == b,
        _ => unreachable!(),
    }))
}

fn eval_arith(op: BinaryOp, left: Value, right: Value, span: Span) -> CompileResult<Value> {
    // Division is always real-valued; the other operators stay integral
    // when both operands are
    if op == BinaryOp::Div {
        let (Some(a), Some(b)) = (numeric(left), numeric(right)) else {
            return Err(type_error(span, "operator / needs numeric operands"));
        };
        return Ok(Value::Double(a / b));
    }
    match (left, right) {
        // Integer arithmetic wraps on overflow
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            _ => unreachable!(),
        })),
        _ => {
            let (Some(a), Some(b)) = (numeric(left), numeric(right)) else {
                return Err(type_error(
                    span,
                    format!("operator {} needs numeric operands", op.symbol()),
                ));
            };
            Ok(Value::Double(match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                _ => unreachable!(),
            }))
        }
    }
}

fn numeric(value: Value) -> Option<f64> {
    match value {
        Value::Int(v) => Some(v as f64),
        Value::Double(v) => Some(v),
        Value::Bool(_) => None,
    }
}

fn op_name(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Not => "!",
    }
}

fn type_error(span: Span, message: impl Into<String>) -> CompileError {
    CompileError::new(ErrorKind::TypeMismatch, span, message.into())
}

fn internal_error(message: String) -> CompileError {
    CompileError::new(ErrorKind::Internal, Span::zero(0), message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::Type;

    fn span() -> Span {
        Span::zero(0)
    }

    fn empty() -> ConstantValues {
        ConstantValues::new()
    }

    #[test]
    fn test_defined_constant_chain() {
        // const int n; const int m = n * 2; with n = 3
        let mut arena = ExprArena::new();
        let n_ref = arena.ident("n", span());
        let two = arena.int_lit(2, span());
        let m_def = arena.binary(BinaryOp::Mul, n_ref, two, span());

        let mut table = ConstantTable::new();
        table.add_constant("n", span(), None, Type::Int);
        table.add_constant("m", span(), Some(m_def), Type::Int);

        let supplied: ConstantValues = [("n".to_string(), Value::Int(3))].into_iter().collect();
        let values = evaluate_constants(&arena, &table, &supplied, &empty()).unwrap();

        assert_eq!(values.get("n"), Some(Value::Int(3)));
        assert_eq!(values.get("m"), Some(Value::Int(6)));
    }

    #[test]
    fn test_declaration_order_does_not_matter() {
        // const int a = b + 1; const int b = 2;
        let mut arena = ExprArena::new();
        let b_ref = arena.ident("b", span());
        let one = arena.int_lit(1, span());
        let a_def = arena.binary(BinaryOp::Add, b_ref, one, span());
        let b_def = arena.int_lit(2, span());

        let mut table = ConstantTable::new();
        table.add_constant("a", span(), Some(a_def), Type::Int);
        table.add_constant("b", span(), Some(b_def), Type::Int);

        let values = evaluate_constants(&arena, &table, &empty(), &empty()).unwrap();
        assert_eq!(values.get("a"), Some(Value::Int(3)));
    }

    #[test]
    fn test_missing_value_reported() {
        let mut table = ConstantTable::new();
        table.add_constant("n", span(), None, Type::Int);

        let arena = ExprArena::new();
        let err = evaluate_constants(&arena, &table, &empty(), &empty()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingConstantValue);
        assert!(err.message.contains("\"n\""));
    }

    #[test]
    fn test_int_widens_to_double() {
        // const double p = 1;
        let mut arena = ExprArena::new();
        let one = arena.int_lit(1, span());
        let mut table = ConstantTable::new();
        table.add_constant("p", span(), Some(one), Type::Double);

        let values = evaluate_constants(&arena, &table, &empty(), &empty()).unwrap();
        assert_eq!(values.get("p"), Some(Value::Double(1.0)));
    }

    #[test]
    fn test_double_does_not_narrow() {
        // const int n = 0.5; is a type error
        let mut arena = ExprArena::new();
        let half = arena.double_lit(0.5, span());
        let mut table = ConstantTable::new();
        table.add_constant("n", span(), Some(half), Type::Int);

        let err = evaluate_constants(&arena, &table, &empty(), &empty()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeMismatch);
    }

    #[test]
    fn test_division_is_real_valued() {
        let mut arena = ExprArena::new();
        let one = arena.int_lit(1, span());
        let two = arena.int_lit(2, span());
        let expr = arena.binary(BinaryOp::Div, one, two, span());

        let value = eval_expr(&arena, expr, &empty()).unwrap();
        assert_eq!(value, Value::Double(0.5));
    }

    #[test]
    fn test_base_values_visible() {
        // Local table references a model constant "k" from the base map
        let mut arena = ExprArena::new();
        let k_ref = arena.ident("k", span());
        let one = arena.int_lit(1, span());
        let c_def = arena.binary(BinaryOp::Add, k_ref, one, span());

        let mut table = ConstantTable::new();
        table.add_constant("c", span(), Some(c_def), Type::Int);

        let base: ConstantValues = [("k".to_string(), Value::Int(10))].into_iter().collect();
        let values = evaluate_constants(&arena, &table, &empty(), &base).unwrap();
        assert_eq!(values.get("c"), Some(Value::Int(11)));
        assert_eq!(values.get("k"), Some(Value::Int(10)));
    }

    #[test]
    fn test_cyclic_definitions_rejected() {
        let mut arena = ExprArena::new();
        let b_ref = arena.ident("b", span());
        let a_ref = arena.ident("a", span());

        let mut table = ConstantTable::new();
        table.add_constant("a", span(), Some(b_ref), Type::Int);
        table.add_constant("b", span(), Some(a_ref), Type::Int);

        let err = evaluate_constants(&arena, &table, &empty(), &empty()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CyclicDependency);
    }

    #[test]
    fn test_integer_arithmetic_wraps() {
        let mut arena = ExprArena::new();
        let max = arena.int_lit(i64::MAX, span());
        let one = arena.int_lit(1, span());
        let sum = arena.binary(BinaryOp::Add, max, one, span());

        assert_eq!(eval_expr(&arena, sum, &empty()).unwrap(), Value::Int(i64::MIN));

        let min = arena.int_lit(i64::MIN, span());
        let neg = arena.unary(UnaryOp::Neg, min, span());
        assert_eq!(eval_expr(&arena, neg, &empty()).unwrap(), Value::Int(i64::MIN));
    }

    #[test]
    fn test_logic_operators() {
        let mut arena = ExprArena::new();
        let t = arena.bool_lit(true, span());
        let f = arena.bool_lit(false, span());
        let implies = arena.binary(BinaryOp::Implies, t, f, span());
        let iff = arena.binary(BinaryOp::Iff, f, f, span());

        assert_eq!(eval_expr(&arena, implies, &empty()).unwrap(), Value::Bool(false));
        assert_eq!(eval_expr(&arena, iff, &empty()).unwrap(), Value::Bool(true));
    }

    #[test]
    fn test_ite_unifies_numeric_branches() {
        let mut arena = ExprArena::new();
        let cond = arena.bool_lit(true, span());
        let one = arena.int_lit(1, span());
        let half = arena.double_lit(0.5, span());
        let ite = arena.ite(cond, one, half, span());

        assert_eq!(eval_expr(&arena, ite, &empty()).unwrap(), Value::Double(1.0));
    }
}
