//! Reference tagging: the side-table that records what each identifier
//! denotes.
//!
//! Resolution never rewrites expression trees. Instead, each tagging pass
//! walks the trees of both scopes and records, per identifier node, the
//! definition it resolves to. Later passes (cycle graphs, type checking,
//! constant evaluation, downstream evaluators) consult the table instead of
//! re-searching the scopes.
//!
//! Passes run in a fixed order and never overwrite an existing tag, so the
//! namespace priority is: formulas, then constants, then model variables.
//! Identifiers still untagged when type checking runs are unresolved.
//!
//! Formula uses are recorded, never inlined: `expand_uses` attaches the
//! defining expression's id to the tag and leaves the referencing tree
//! untouched, so re-displayed properties keep their original shape and
//! repeated references cannot blow up expression size. Downstream
//! evaluators are expected to follow the `definition` handle themselves.

use crate::ast::expr::{ExprArena, ExprId, ExprKind};
use crate::ast::tables::{ConstantTable, FormulaTable, Property};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::foundation::Type;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Which scope an expression node (or definition) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScopeRef {
    /// The external model-description scope
    Model,
    /// The properties container's own scope
    Local,
}

/// What a tagged identifier node resolves to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Target {
    /// A formula definition.
    Formula {
        /// Scope owning the formula table
        scope: ScopeRef,
        /// Position in that table
        index: usize,
        /// Defining expression, filled in by `expand_uses`; lives in the
        /// arena of `scope`
        definition: Option<ExprId>,
    },
    /// A constant declaration.
    Constant { scope: ScopeRef, index: usize },
    /// A model variable (position in the model's variable list).
    Variable { index: usize },
    /// A named property of this container.
    Property { index: usize },
}

/// Side-table mapping identifier nodes to their resolved targets.
///
/// Keys carry the scope because model-scope and local expressions live in
/// separate arenas with overlapping ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bindings {
    map: IndexMap<(ScopeRef, ExprId), Target>,
}

impl Bindings {
    /// Create an empty side-table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a tag unless the node is already tagged.
    pub fn tag(&mut self, scope: ScopeRef, node: ExprId, target: Target) {
        self.map.entry((scope, node)).or_insert(target);
    }

    /// Look up the tag for a node.
    pub fn get(&self, scope: ScopeRef, node: ExprId) -> Option<&Target> {
        self.map.get(&(scope, node))
    }

    /// Check if a node is tagged.
    pub fn is_tagged(&self, scope: ScopeRef, node: ExprId) -> bool {
        self.map.contains_key(&(scope, node))
    }

    /// Forget all tags, ready for a fresh pass.
    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Number of tagged nodes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Check if no nodes are tagged.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterate over all tags.
    pub fn iter(&self) -> impl Iterator<Item = (&(ScopeRef, ExprId), &Target)> {
        self.map.iter()
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (&(ScopeRef, ExprId), &mut Target)> {
        self.map.iter_mut()
    }
}

/// Tag every identifier in a subtree that names a formula from either
/// scope. The local table is consulted first; name claiming has already
/// ruled out a name existing in both.
pub fn tag_formula_refs(
    bindings: &mut Bindings,
    scope: ScopeRef,
    arena: &ExprArena,
    root: ExprId,
    model_formulas: &FormulaTable,
    local_formulas: &FormulaTable,
) {
    for (node, name) in arena.idents(root) {
        if let Some(index) = local_formulas.index_of(&name) {
            bindings.tag(
                scope,
                node,
                Target::Formula {
                    scope: ScopeRef::Local,
                    index,
                    definition: None,
                },
            );
        } else if let Some(index) = model_formulas.index_of(&name) {
            bindings.tag(
                scope,
                node,
                Target::Formula {
                    scope: ScopeRef::Model,
                    index,
                    definition: None,
                },
            );
        }
    }
}

/// Attach defining expressions to every formula tag pointing into `table`.
///
/// Runs once for the model-scope table and once for the local table. The
/// referencing trees are left untouched; only the tag is enriched.
pub fn expand_uses(bindings: &mut Bindings, table_scope: ScopeRef, table: &FormulaTable) {
    for (_, target) in bindings.iter_mut() {
        if let Target::Formula {
            scope, index, definition,
        } = target
        {
            if *scope == table_scope && definition.is_none() {
                *definition = Some(table.get(*index).definition);
            }
        }
    }
}

/// Tag every untagged identifier in a subtree that names a constant from
/// either scope.
pub fn tag_constant_refs(
    bindings: &mut Bindings,
    scope: ScopeRef,
    arena: &ExprArena,
    root: ExprId,
    model_constants: &ConstantTable,
    local_constants: &ConstantTable,
) {
    for (node, name) in arena.idents(root) {
        if bindings.is_tagged(scope, node) {
            continue;
        }
        if let Some(index) = local_constants.index_of(&name) {
            bindings.tag(
                scope,
                node,
                Target::Constant {
                    scope: ScopeRef::Local,
                    index,
                },
            );
        } else if let Some(index) = model_constants.index_of(&name) {
            bindings.tag(
                scope,
                node,
                Target::Constant {
                    scope: ScopeRef::Model,
                    index,
                },
            );
        }
    }
}

/// Tag every untagged identifier in a subtree that names a model variable.
pub fn tag_variable_refs(
    bindings: &mut Bindings,
    scope: ScopeRef,
    arena: &ExprArena,
    root: ExprId,
    variables: &[(String, Type)],
) {
    for (node, name) in arena.idents(root) {
        if bindings.is_tagged(scope, node) {
            continue;
        }
        if let Some(index) = variables.iter().position(|(v, _)| *v == name) {
            bindings.tag(scope, node, Target::Variable { index });
        }
    }
}

/// Resolve quoted property references in a subtree against the container's
/// property list.
///
/// # Errors
///
/// [`ErrorKind::UnresolvedIdentifier`] for a reference to a property name
/// that does not exist.
pub fn resolve_prop_refs(
    bindings: &mut Bindings,
    arena: &ExprArena,
    root: ExprId,
    properties: &[Property],
) -> CompileResult<()> {
    let mut result = Ok(());
    arena.walk(root, &mut |node| {
        if result.is_err() {
            return;
        }
        if let ExprKind::PropRef(name) = arena.kind(node) {
            match properties.iter().position(|p| p.name() == Some(name.as_str())) {
                Some(index) => {
                    bindings.tag(ScopeRef::Local, node, Target::Property { index });
                }
                None => {
                    result = Err(CompileError::new(
                        ErrorKind::UnresolvedIdentifier,
                        arena.span(node),
                        format!("could not resolve property reference \"{}\"", name),
                    ));
                }
            }
        }
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::BinaryOp;
    use crate::foundation::Span;

    fn span() -> Span {
        Span::zero(0)
    }

    #[test]
    fn test_formula_tagging_prefers_no_overwrite() {
        let mut arena = ExprArena::new();
        let def = arena.int_lit(1, span());
        let f_ref = arena.ident("f", span());

        let mut local = FormulaTable::new();
        local.add_formula("f", span(), def);
        let model = FormulaTable::new();

        let mut bindings = Bindings::new();
        tag_formula_refs(&mut bindings, ScopeRef::Local, &arena, f_ref, &model, &local);
        // Re-running must not duplicate or change anything
        tag_formula_refs(&mut bindings, ScopeRef::Local, &arena, f_ref, &model, &local);

        assert_eq!(bindings.len(), 1);
        assert_eq!(
            bindings.get(ScopeRef::Local, f_ref),
            Some(&Target::Formula {
                scope: ScopeRef::Local,
                index: 0,
                definition: None,
            })
        );
    }

    #[test]
    fn test_expand_uses_fills_definition() {
        let mut arena = ExprArena::new();
        let def = arena.int_lit(1, span());
        let f_ref = arena.ident("f", span());

        let mut local = FormulaTable::new();
        local.add_formula("f", span(), def);
        let model = FormulaTable::new();

        let mut bindings = Bindings::new();
        tag_formula_refs(&mut bindings, ScopeRef::Local, &arena, f_ref, &model, &local);
        expand_uses(&mut bindings, ScopeRef::Model, &model);
        expand_uses(&mut bindings, ScopeRef::Local, &local);

        assert_eq!(
            bindings.get(ScopeRef::Local, f_ref),
            Some(&Target::Formula {
                scope: ScopeRef::Local,
                index: 0,
                definition: Some(def),
            })
        );
    }

    #[test]
    fn test_constant_tagging_skips_formula_tags() {
        let mut arena = ExprArena::new();
        let def = arena.int_lit(1, span());
        let x_ref = arena.ident("x", span());

        // "x" is both a formula and a constant name; the formula tag wins.
        // (Cannot happen after registry checks, but tag priority is fixed.)
        let mut formulas = FormulaTable::new();
        formulas.add_formula("x", span(), def);
        let mut constants = ConstantTable::new();
        constants.add_constant("x", span(), None, Type::Int);

        let empty_formulas = FormulaTable::new();
        let empty_constants = ConstantTable::new();

        let mut bindings = Bindings::new();
        tag_formula_refs(
            &mut bindings,
            ScopeRef::Local,
            &arena,
            x_ref,
            &empty_formulas,
            &formulas,
        );
        tag_constant_refs(
            &mut bindings,
            ScopeRef::Local,
            &arena,
            x_ref,
            &empty_constants,
            &constants,
        );

        assert!(matches!(
            bindings.get(ScopeRef::Local, x_ref),
            Some(Target::Formula { .. })
        ));
    }

    #[test]
    fn test_variable_tagging() {
        let mut arena = ExprArena::new();
        let x = arena.ident("x", span());
        let y = arena.ident("y", span());
        let sum = arena.binary(BinaryOp::Add, x, y, span());

        let variables = vec![("x".to_string(), Type::Int), ("y".to_string(), Type::Int)];

        let mut bindings = Bindings::new();
        tag_variable_refs(&mut bindings, ScopeRef::Local, &arena, sum, &variables);

        assert_eq!(bindings.get(ScopeRef::Local, x), Some(&Target::Variable { index: 0 }));
        assert_eq!(bindings.get(ScopeRef::Local, y), Some(&Target::Variable { index: 1 }));
    }

    #[test]
    fn test_prop_ref_resolution() {
        let mut arena = ExprArena::new();
        let target_expr = arena.bool_lit(true, span());
        let reference = arena.prop_ref("goal", span());

        let properties = vec![Property::new(
            Some("goal".to_string()),
            span(),
            target_expr,
            None,
        )];

        let mut bindings = Bindings::new();
        resolve_prop_refs(&mut bindings, &arena, reference, &properties).unwrap();
        assert_eq!(
            bindings.get(ScopeRef::Local, reference),
            Some(&Target::Property { index: 0 })
        );
    }

    #[test]
    fn test_prop_ref_unresolved() {
        let mut arena = ExprArena::new();
        let reference = arena.prop_ref("missing", span());

        let mut bindings = Bindings::new();
        let err = resolve_prop_refs(&mut bindings, &arena, reference, &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnresolvedIdentifier);
        assert!(err.message.contains("missing"));
    }
}
