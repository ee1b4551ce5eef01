//! The model-description scope a properties container resolves against.
//!
//! A model scope owns its own expression arena and definition tables. It is
//! built once (by the model-side frontend, or by hand in tests) and then
//! shared read-only by any number of containers, so containers hold it
//! behind an [`Rc`](std::rc::Rc) and never mutate it.
//!
//! Model constants may be bound here, independently of any container.
//! Containers require the model's constants to be bound before binding
//! their own, since local definitions may reference model constants by
//! value.

use crate::ast::expr::{ExprArena, ExprId};
use crate::ast::tables::{ConstantTable, FormulaTable, LabelTable};
use crate::error::CompileResult;
use crate::foundation::{ConstantValues, Span, Type};
use crate::resolve::constants::evaluate_constants;
use std::fmt;
use tracing::debug;

/// Formulas, labels, constants and variables of a model description.
#[derive(Debug, Clone, Default)]
pub struct ModelScope {
    arena: ExprArena,
    formulas: FormulaTable,
    labels: LabelTable,
    constants: ConstantTable,
    variables: Vec<(String, Type)>,
    constant_values: Option<ConstantValues>,
}

impl ModelScope {
    /// Create an empty model scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// The arena holding this scope's expressions.
    pub fn arena(&self) -> &ExprArena {
        &self.arena
    }

    /// Mutable arena access, for building definitions.
    pub fn arena_mut(&mut self) -> &mut ExprArena {
        &mut self.arena
    }

    /// Add a formula definition.
    pub fn add_formula(&mut self, name: impl Into<String>, name_span: Span, definition: ExprId) {
        self.formulas.add_formula(name, name_span, definition);
    }

    /// Add a label definition.
    pub fn add_label(&mut self, name: impl Into<String>, name_span: Span, predicate: ExprId) {
        self.labels.add_label(name, name_span, predicate);
    }

    /// Add a constant declaration.
    pub fn add_constant(
        &mut self,
        name: impl Into<String>,
        name_span: Span,
        definition: Option<ExprId>,
        ty: Type,
    ) {
        self.constants.add_constant(name, name_span, definition, ty);
    }

    /// Add a state variable with its declared type.
    pub fn add_variable(&mut self, name: impl Into<String>, ty: Type) {
        self.variables.push((name.into(), ty));
    }

    /// Formula definitions.
    pub fn formulas(&self) -> &FormulaTable {
        &self.formulas
    }

    /// Label definitions.
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Constant declarations.
    pub fn constants(&self) -> &ConstantTable {
        &self.constants
    }

    /// State variables with their declared types.
    pub fn variables(&self) -> &[(String, Type)] {
        &self.variables
    }

    /// Check if a name is taken by a formula, constant, or variable of
    /// this scope.
    ///
    /// Labels live in their own namespace and are not consulted.
    pub fn is_ident_used(&self, name: &str) -> bool {
        self.formulas.index_of(name).is_some()
            || self.constants.index_of(name).is_some()
            || self.variables.iter().any(|(v, _)| v == name)
    }

    /// Names of constants still awaiting a supplied value.
    pub fn undefined_constants(&self) -> Vec<&str> {
        self.constants.undefined_constants()
    }

    /// Evaluate this scope's constants against supplied values and store
    /// the snapshot.
    ///
    /// Replaces any previous snapshot on success; a failed binding leaves
    /// the previous snapshot in place.
    pub fn bind_constants(&mut self, supplied: &ConstantValues) -> CompileResult<()> {
        let values =
            evaluate_constants(&self.arena, &self.constants, supplied, &ConstantValues::new())?;
        debug!(values = %values, "model constants bound");
        self.constant_values = Some(values);
        Ok(())
    }

    /// The current constant-value snapshot, if constants have been bound.
    pub fn constant_values(&self) -> Option<&ConstantValues> {
        self.constant_values.as_ref()
    }
}

impl fmt::Display for ModelScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formulas.display(&self.arena))?;
        write!(f, "{}", self.labels.display(&self.arena))?;
        write!(f, "{}", self.constants.display(&self.arena))?;
        for (name, ty) in &self.variables {
            writeln!(f, "{} {};", ty, name)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::BinaryOp;
    use crate::error::ErrorKind;
    use crate::foundation::Value;

    fn span() -> Span {
        Span::zero(0)
    }

    #[test]
    fn test_ident_usage_spans_all_namespaces_but_labels() {
        let mut model = ModelScope::new();
        let def = model.arena_mut().int_lit(1, span());
        model.add_formula("f", span(), def);
        model.add_constant("k", span(), None, Type::Int);
        model.add_variable("x", Type::Int);
        let t = model.arena_mut().bool_lit(true, span());
        model.add_label("safe", span(), t);

        assert!(model.is_ident_used("f"));
        assert!(model.is_ident_used("k"));
        assert!(model.is_ident_used("x"));
        assert!(!model.is_ident_used("safe"));
        assert!(!model.is_ident_used("g"));
    }

    #[test]
    fn test_bind_constants_stores_snapshot() {
        let mut model = ModelScope::new();
        model.add_constant("k", span(), None, Type::Int);
        let k_ref = model.arena_mut().ident("k", span());
        let two = model.arena_mut().int_lit(2, span());
        let def = model.arena_mut().binary(BinaryOp::Mul, k_ref, two, span());
        model.add_constant("k2", span(), Some(def), Type::Int);

        let supplied: ConstantValues = [("k".to_string(), Value::Int(5))].into_iter().collect();
        model.bind_constants(&supplied).unwrap();

        let values = model.constant_values().unwrap();
        assert_eq!(values.get("k"), Some(Value::Int(5)));
        assert_eq!(values.get("k2"), Some(Value::Int(10)));
    }

    #[test]
    fn test_failed_bind_keeps_previous_snapshot() {
        let mut model = ModelScope::new();
        model.add_constant("k", span(), None, Type::Int);

        let supplied: ConstantValues = [("k".to_string(), Value::Int(5))].into_iter().collect();
        model.bind_constants(&supplied).unwrap();

        let err = model.bind_constants(&ConstantValues::new()).unwrap_err();
        assert_eq!(err.kind, ErrorKind::MissingConstantValue);
        assert_eq!(model.constant_values().unwrap().get("k"), Some(Value::Int(5)));
    }
}
