//! Placement restrictions that are not type errors.
//!
//! Some expression forms are well-typed but illegal in certain defining
//! positions. Constant definitions must be evaluable before any state
//! exists, so they may not mention variables, labels, or properties. Label
//! predicates describe single states, so they may not nest labels or
//! properties. Formula definitions may use anything state-dependent but may
//! not reach into the property namespace.
//!
//! These checks run after tagging (variable references are recognised by
//! their tags) and before constant evaluation relies on them.

use crate::ast::expr::{ExprArena, ExprId, ExprKind};
use crate::ast::tables::{ConstantTable, FormulaTable, LabelTable};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::resolve::tags::{Bindings, ScopeRef, Target};

/// Reject state-dependent references inside constant definitions.
///
/// # Errors
///
/// [`ErrorKind::Semantic`] naming the offending reference.
pub fn check_constant_defs(
    arena: &ExprArena,
    table: &ConstantTable,
    bindings: &Bindings,
    scope: ScopeRef,
) -> CompileResult<()> {
    for entry in table.iter() {
        let Some(def) = entry.definition else {
            continue;
        };
        let mut result = Ok(());
        arena.walk(def, &mut |node| {
            if result.is_err() {
                return;
            }
            match arena.kind(node) {
                ExprKind::Ident(name) => {
                    if let Some(Target::Variable { .. }) = bindings.get(scope, node) {
                        result = Err(CompileError::new(
                            ErrorKind::Semantic,
                            arena.span(node),
                            format!(
                                "definition of constant \"{}\" references variable \"{}\"",
                                entry.name, name
                            ),
                        ));
                    }
                }
                ExprKind::LabelRef(name) => {
                    result = Err(CompileError::new(
                        ErrorKind::Semantic,
                        arena.span(node),
                        format!(
                            "definition of constant \"{}\" references label \"{}\"",
                            entry.name, name
                        ),
                    ));
                }
                ExprKind::PropRef(name) => {
                    result = Err(CompileError::new(
                        ErrorKind::Semantic,
                        arena.span(node),
                        format!(
                            "definition of constant \"{}\" references property \"{}\"",
                            entry.name, name
                        ),
                    ));
                }
                _ => {}
            }
        });
        result?;
    }
    Ok(())
}

/// Reject label and property references inside label predicates.
///
/// # Errors
///
/// [`ErrorKind::Semantic`] naming the offending reference.
pub fn check_label_predicates(arena: &ExprArena, labels: &LabelTable) -> CompileResult<()> {
    for entry in labels.iter() {
        check_subtree(
            arena,
            entry.predicate,
            &format!("definition of label \"{}\"", entry.name),
            true,
        )?;
    }
    Ok(())
}

/// Reject property references inside formula definitions.
///
/// # Errors
///
/// [`ErrorKind::Semantic`] naming the offending reference.
pub fn check_formula_defs(arena: &ExprArena, formulas: &FormulaTable) -> CompileResult<()> {
    for entry in formulas.iter() {
        check_subtree(
            arena,
            entry.definition,
            &format!("definition of formula \"{}\"", entry.name),
            false,
        )?;
    }
    Ok(())
}

fn check_subtree(
    arena: &ExprArena,
    root: ExprId,
    position: &str,
    reject_labels: bool,
) -> CompileResult<()> {
    let mut result = Ok(());
    arena.walk(root, &mut |node| {
        if result.is_err() {
            return;
        }
        match arena.kind(node) {
            ExprKind::LabelRef(name) if reject_labels => {
                result = Err(CompileError::new(
                    ErrorKind::Semantic,
                    arena.span(node),
                    format!("{} references label \"{}\"", position, name),
                ));
            }
            ExprKind::PropRef(name) => {
                result = Err(CompileError::new(
                    ErrorKind::Semantic,
                    arena.span(node),
                    format!("{} references property \"{}\"", position, name),
                ));
            }
            _ => {}
        }
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::{Span, Type};
    use crate::resolve::tags::tag_variable_refs;

    fn span() -> Span {
        Span::zero(0)
    }

    #[test]
    fn test_constant_def_may_use_constants() {
        let mut arena = ExprArena::new();
        let def = arena.int_lit(4, span());
        let mut table = ConstantTable::new();
        table.add_constant("n", span(), Some(def), Type::Int);

        let bindings = Bindings::new();
        check_constant_defs(&arena, &table, &bindings, ScopeRef::Local).unwrap();
    }

    #[test]
    fn test_constant_def_rejects_variable() {
        let mut arena = ExprArena::new();
        let x_ref = arena.ident("x", span());
        let mut table = ConstantTable::new();
        table.add_constant("n", span(), Some(x_ref), Type::Int);

        let variables = vec![("x".to_string(), Type::Int)];
        let mut bindings = Bindings::new();
        tag_variable_refs(&mut bindings, ScopeRef::Local, &arena, x_ref, &variables);

        let err = check_constant_defs(&arena, &table, &bindings, ScopeRef::Local).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Semantic);
        assert!(err.message.contains("variable \"x\""));
    }

    #[test]
    fn test_constant_def_rejects_label() {
        let mut arena = ExprArena::new();
        let safe = arena.label_ref("safe", span());
        let mut table = ConstantTable::new();
        table.add_constant("n", span(), Some(safe), Type::Bool);

        let bindings = Bindings::new();
        let err = check_constant_defs(&arena, &table, &bindings, ScopeRef::Local).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Semantic);
    }

    #[test]
    fn test_label_predicate_rejects_label_ref() {
        let mut arena = ExprArena::new();
        let other = arena.label_ref("other", span());
        let mut labels = LabelTable::new();
        labels.add_label("outer", span(), other);

        let err = check_label_predicates(&arena, &labels).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Semantic);
        assert!(err.message.contains("label \"outer\""));
    }

    #[test]
    fn test_formula_def_may_use_labels_but_not_properties() {
        let mut arena = ExprArena::new();
        let safe = arena.label_ref("safe", span());
        let mut formulas = FormulaTable::new();
        formulas.add_formula("f", span(), safe);
        check_formula_defs(&arena, &formulas).unwrap();

        let goal = arena.prop_ref("goal", span());
        formulas.add_formula("g", span(), goal);
        let err = check_formula_defs(&arena, &formulas).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Semantic);
        assert!(err.message.contains("property \"goal\""));
    }
}
