//! The properties container: a set of properties with their supporting
//! definitions, resolved against a linked model scope.
//!
//! A container is built raw (tables filled straight from a parse), then
//! [`resolve`](PropertiesContainer::resolve)d. Resolution is a fixed
//! sequence of passes that only ever writes side-tables, so it can be
//! re-run from scratch at any time; [`insert`](PropertiesContainer::insert)
//! relies on this by importing another container's definitions and simply
//! resolving again.
//!
//! Constant binding is a separate, repeatable step layered on top of a
//! structurally resolved container. Each successful binding replaces the
//! value snapshot wholesale; a failed binding leaves the previous snapshot
//! untouched.

use crate::ast::expr::{ExprArena, ExprId};
use crate::ast::tables::{ConstantTable, FormulaTable, LabelTable, Property};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::foundation::{ConstantValues, Span, Type};
use crate::model::ModelScope;
use crate::resolve::constants::evaluate_constants;
use crate::resolve::graph::DependencyGraph;
use crate::resolve::registry::IdentifierRegistry;
use crate::resolve::semantic::{check_constant_defs, check_formula_defs, check_label_predicates};
use crate::resolve::tags::{
    expand_uses, resolve_prop_refs, tag_constant_refs, tag_formula_refs, tag_variable_refs,
    Bindings, ScopeRef,
};
use crate::resolve::typecheck::{TypeChecker, TypeContext, TypeMap};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Where a container stands in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveState {
    /// Definitions loaded, nothing checked yet
    Raw,
    /// Names, references and types check out; constants may be unbound
    StructurallyResolved,
    /// Structurally resolved with a complete constant-value snapshot
    ConstantsBound,
}

/// Properties plus their local formulas, labels and constants, linked to a
/// shared model scope.
#[derive(Debug, Clone)]
pub struct PropertiesContainer {
    model: Rc<ModelScope>,
    arena: ExprArena,
    formulas: FormulaTable,
    labels: LabelTable,
    /// Local labels plus model labels imported into the local arena;
    /// rebuilt on every `resolve()`
    combined_labels: LabelTable,
    constants: ConstantTable,
    properties: Vec<Property>,
    /// Local-arena copies of the model label predicates, made once; the
    /// model scope never changes under a container, so the copies are
    /// reused by every later `resolve()`
    model_label_imports: Option<Vec<ExprId>>,
    registry: IdentifierRegistry,
    bindings: Bindings,
    types: TypeMap,
    constant_values: Option<ConstantValues>,
    state: ResolveState,
}

impl PropertiesContainer {
    /// Create an empty container linked to a model scope.
    pub fn new(model: Rc<ModelScope>) -> Self {
        Self {
            model,
            arena: ExprArena::new(),
            formulas: FormulaTable::new(),
            labels: LabelTable::new(),
            combined_labels: LabelTable::new(),
            constants: ConstantTable::new(),
            properties: Vec::new(),
            model_label_imports: None,
            registry: IdentifierRegistry::new(),
            bindings: Bindings::new(),
            types: TypeMap::new(),
            constant_values: None,
            state: ResolveState::Raw,
        }
    }

    /// The linked model scope.
    pub fn model(&self) -> &ModelScope {
        &self.model
    }

    /// The arena holding this container's expressions.
    pub fn arena(&self) -> &ExprArena {
        &self.arena
    }

    /// Mutable arena access, for building definitions.
    ///
    /// Any mutation invalidates prior resolution; call
    /// [`resolve`](Self::resolve) again before querying side-tables.
    pub fn arena_mut(&mut self) -> &mut ExprArena {
        self.state = ResolveState::Raw;
        &mut self.arena
    }

    /// Add a formula definition.
    pub fn add_formula(&mut self, name: impl Into<String>, name_span: Span, definition: ExprId) {
        self.formulas.add_formula(name, name_span, definition);
        self.state = ResolveState::Raw;
    }

    /// Add a label definition.
    pub fn add_label(&mut self, name: impl Into<String>, name_span: Span, predicate: ExprId) {
        self.labels.add_label(name, name_span, predicate);
        self.state = ResolveState::Raw;
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
        self.state = ResolveState::Raw;
    }

    /// Append a property.
    pub fn add_property(&mut self, property: Property) {
        self.properties.push(property);
        self.state = ResolveState::Raw;
    }

    /// Local formula definitions.
    pub fn formulas(&self) -> &FormulaTable {
        &self.formulas
    }

    /// Local label definitions.
    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Local labels plus imported model labels, as of the last `resolve()`.
    pub fn combined_labels(&self) -> &LabelTable {
        &self.combined_labels
    }

    /// Local constant declarations.
    pub fn constants(&self) -> &ConstantTable {
        &self.constants
    }

    /// The properties, in declaration order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    /// Number of properties.
    pub fn len(&self) -> usize {
        self.properties.len()
    }

    /// Check if the container holds no properties.
    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    /// Identifier bindings from the last `resolve()`.
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    /// Node types from the last `resolve()`.
    pub fn types(&self) -> &TypeMap {
        &self.types
    }

    /// The current constant-value snapshot, if constants have been bound.
    pub fn constant_values(&self) -> Option<&ConstantValues> {
        self.constant_values.as_ref()
    }

    /// Lifecycle state.
    pub fn state(&self) -> ResolveState {
        self.state
    }

    /// Check if a name is taken by a formula or constant of this container
    /// or by the linked model scope.
    pub fn is_ident_used(&self, name: &str) -> bool {
        self.formulas.index_of(name).is_some()
            || self.constants.index_of(name).is_some()
            || self.model.is_ident_used(name)
    }

    /// Find a named property.
    pub fn lookup_property_by_name(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name() == Some(name))
    }

    /// Names of local constants still awaiting a supplied value.
    pub fn undefined_constants(&self) -> Vec<&str> {
        self.constants.undefined_constants()
    }

    /// An independent copy of this container.
    ///
    /// Expressions, tables and side-tables are copied; the model scope is
    /// shared. The copy can be mutated, resolved and bound without
    /// affecting the original.
    pub fn deep_copy(&self) -> Self {
        self.clone()
    }

    /// Run the full resolution pipeline.
    ///
    /// Fails fast on the first error. All pass state is rebuilt from
    /// scratch, so resolving an already-resolved container is harmless and
    /// resolving after mutation picks up every change. A successful pass
    /// discards any constant-value snapshot: structure may have changed
    /// under it (new constants via `insert`, say), so constants must be
    /// bound again explicitly.
    ///
    /// # Errors
    ///
    /// Any [`ErrorKind`] produced by the passes; see the
    /// [`resolve`](crate::resolve) module docs for the pass order.
    pub fn resolve(&mut self) -> CompileResult<()> {
        self.state = ResolveState::Raw;
        self.registry.clear();
        self.bindings.clear();
        self.types.clear();
        self.combined_labels = LabelTable::new();

        let model = Rc::clone(&self.model);
        let mut local_roots = self.local_roots();
        let model_roots = model_roots(&model);
        let no_formulas = FormulaTable::new();
        let no_constants = ConstantTable::new();

        // 1: claim local formula names
        for entry in self.formulas.iter() {
            self.registry.claim(&entry.name, entry.name_span, &model)?;
        }

        // 2: tag formula references, reject formula cycles, then record
        //    definitions without inlining
        for &root in &local_roots {
            tag_formula_refs(
                &mut self.bindings,
                ScopeRef::Local,
                &self.arena,
                root,
                model.formulas(),
                &self.formulas,
            );
        }
        for &root in &model_roots {
            tag_formula_refs(
                &mut self.bindings,
                ScopeRef::Model,
                model.arena(),
                root,
                model.formulas(),
                &no_formulas,
            );
        }
        self.check_formula_cycles(&model)?;
        expand_uses(&mut self.bindings, ScopeRef::Model, model.formulas());
        expand_uses(&mut self.bindings, ScopeRef::Local, &self.formulas);

        // 3: label uniqueness and the combined view; imported model
        //    predicates become local roots and get the same formula
        //    treatment as everything tagged in 2
        self.build_combined_labels(&model)?;
        if let Some(imports) = &self.model_label_imports {
            for &root in imports {
                tag_formula_refs(
                    &mut self.bindings,
                    ScopeRef::Local,
                    &self.arena,
                    root,
                    model.formulas(),
                    &self.formulas,
                );
            }
            local_roots.extend(imports.iter().copied());
        }
        expand_uses(&mut self.bindings, ScopeRef::Model, model.formulas());
        expand_uses(&mut self.bindings, ScopeRef::Local, &self.formulas);

        // 4: claim local constant names
        for entry in self.constants.iter() {
            self.registry.claim(&entry.name, entry.name_span, &model)?;
        }

        // 5: tag constant references
        for &root in &local_roots {
            tag_constant_refs(
                &mut self.bindings,
                ScopeRef::Local,
                &self.arena,
                root,
                model.constants(),
                &self.constants,
            );
        }
        for &root in &model_roots {
            tag_constant_refs(
                &mut self.bindings,
                ScopeRef::Model,
                model.arena(),
                root,
                model.constants(),
                &no_constants,
            );
        }

        // 6: reject constant cycles
        self.check_constant_cycles(&model)?;

        // 7: property name uniqueness
        self.check_property_names()?;

        // 8: tag variable references
        for &root in &local_roots {
            tag_variable_refs(
                &mut self.bindings,
                ScopeRef::Local,
                &self.arena,
                root,
                model.variables(),
            );
        }
        for &root in &model_roots {
            tag_variable_refs(
                &mut self.bindings,
                ScopeRef::Model,
                model.arena(),
                root,
                model.variables(),
            );
        }

        // 9: resolve property references
        for &root in &local_roots {
            resolve_prop_refs(&mut self.bindings, &self.arena, root, &self.properties)?;
        }

        // 10: placement restrictions
        check_constant_defs(&self.arena, &self.constants, &self.bindings, ScopeRef::Local)?;
        check_label_predicates(&self.arena, &self.combined_labels)?;
        check_formula_defs(&self.arena, &self.formulas)?;

        // 11: type check every root
        self.typecheck(&model)?;

        self.constant_values = None;
        self.state = ResolveState::StructurallyResolved;
        debug!(
            properties = self.properties.len(),
            claimed = self.registry.len(),
            "container resolved"
        );
        Ok(())
    }

    /// Evaluate local constants against supplied values and store the
    /// snapshot.
    ///
    /// The container must be resolved, and the model's own constants (if
    /// any) must be bound first since local definitions may reference them
    /// by value. On success the previous snapshot is replaced; on failure
    /// it is left untouched and the container keeps its previous state.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::Internal`] if called out of order, otherwise any error
    /// from constant evaluation.
    pub fn bind_constants(&mut self, supplied: &ConstantValues) -> CompileResult<()> {
        if self.state == ResolveState::Raw {
            return Err(CompileError::new(
                ErrorKind::Internal,
                Span::zero(0),
                "constants bound before resolution".to_string(),
            ));
        }
        if !self.model.constants().is_empty() && self.model.constant_values().is_none() {
            return Err(CompileError::new(
                ErrorKind::Internal,
                Span::zero(0),
                "model constants must be bound before container constants".to_string(),
            ));
        }
        let base = self.model.constant_values().cloned().unwrap_or_default();
        let values = evaluate_constants(&self.arena, &self.constants, supplied, &base)?;
        debug!(values = %values, "container constants bound");
        self.constant_values = Some(values);
        self.state = ResolveState::ConstantsBound;
        Ok(())
    }

    /// Import another container's definitions and properties, then resolve.
    ///
    /// Expressions are copied into this container's arena; the other
    /// container is not modified. Name collisions surface as the usual
    /// duplicate or clash errors from the resolution that follows.
    ///
    /// # Errors
    ///
    /// Any error from [`resolve`](Self::resolve). The definitions stay
    /// imported even on failure; the container is left unresolved.
    pub fn insert(&mut self, other: &PropertiesContainer) -> CompileResult<()> {
        for entry in other.formulas.iter() {
            let definition = self.arena.import(&other.arena, entry.definition);
            self.formulas
                .add_formula(&entry.name, entry.name_span, definition);
        }
        for entry in other.labels.iter() {
            let predicate = self.arena.import(&other.arena, entry.predicate);
            self.labels.add_label(&entry.name, entry.name_span, predicate);
        }
        for entry in other.constants.iter() {
            let definition = entry
                .definition
                .map(|def| self.arena.import(&other.arena, def));
            self.constants
                .add_constant(&entry.name, entry.name_span, definition, entry.ty);
        }
        for property in &other.properties {
            let expr = self.arena.import(&other.arena, property.expr);
            self.properties.push(Property::new(
                property.name.clone(),
                property.span,
                expr,
                property.comment.clone(),
            ));
        }
        debug!(
            formulas = other.formulas.len(),
            labels = other.labels.len(),
            constants = other.constants.len(),
            properties = other.properties.len(),
            "definitions imported"
        );
        self.resolve()
    }

    /// Model labels first (predicates imported into the local arena so
    /// later passes treat them like local roots), then local labels.
    fn build_combined_labels(&mut self, model: &ModelScope) -> CompileResult<()> {
        if self.model_label_imports.is_none() {
            let imports: Vec<ExprId> = model
                .labels()
                .iter()
                .map(|entry| self.arena.import(model.arena(), entry.predicate))
                .collect();
            self.model_label_imports = Some(imports);
        }

        let mut combined = LabelTable::new();
        if let Some(imports) = &self.model_label_imports {
            for (entry, &predicate) in model.labels().iter().zip(imports) {
                combined.add_label(&entry.name, entry.name_span, predicate);
            }
        }
        for entry in self.labels.iter() {
            if model.labels().contains(&entry.name) {
                return Err(CompileError::new(
                    ErrorKind::NameClash,
                    entry.name_span,
                    format!("label \"{}\" already defined in the model", entry.name),
                ));
            }
            // The model prefix was just ruled out, so a hit is a local dupe
            if combined.contains(&entry.name) {
                return Err(CompileError::new(
                    ErrorKind::DuplicateIdentifier,
                    entry.name_span,
                    format!("duplicated label \"{}\"", entry.name),
                ));
            }
            combined.add_label(&entry.name, entry.name_span, entry.predicate);
        }
        self.combined_labels = combined;
        Ok(())
    }

    /// Named properties must not collide with labels (either scope) or
    /// with each other. Anonymous properties are exempt.
    fn check_property_names(&self) -> CompileResult<()> {
        let mut seen: Vec<&str> = Vec::new();
        for property in &self.properties {
            let Some(name) = property.name() else {
                continue;
            };
            if self.combined_labels.contains(name) {
                return Err(CompileError::new(
                    ErrorKind::NameClash,
                    property.span,
                    format!("property name \"{}\" clashes with a label", name),
                ));
            }
            if seen.contains(&name) {
                return Err(CompileError::new(
                    ErrorKind::DuplicateIdentifier,
                    property.span,
                    format!("duplicated property name \"{}\"", name),
                ));
            }
            seen.push(name);
        }
        Ok(())
    }

    /// Every local expression root that tagging and type checking must
    /// cover. Imported model label predicates join the list once the
    /// combined view is built.
    fn local_roots(&self) -> Vec<ExprId> {
        let mut roots = Vec::new();
        roots.extend(self.formulas.iter().map(|e| e.definition));
        roots.extend(self.labels.iter().map(|e| e.predicate));
        roots.extend(self.constants.iter().filter_map(|e| e.definition));
        roots.extend(self.properties.iter().map(|p| p.expr));
        roots
    }

    /// Formula names of both scopes share one graph: a local definition
    /// may reference model formulas, so a cycle can span scopes.
    fn check_formula_cycles(&self, model: &ModelScope) -> CompileResult<()> {
        let mut graph = DependencyGraph::new();
        for entry in model.formulas().iter() {
            graph.add_node(&entry.name, entry.name_span);
        }
        for entry in self.formulas.iter() {
            graph.add_node(&entry.name, entry.name_span);
        }
        for entry in model.formulas().iter() {
            graph.add_edges_from_expr(&entry.name, model.arena(), entry.definition);
        }
        for entry in self.formulas.iter() {
            graph.add_edges_from_expr(&entry.name, &self.arena, entry.definition);
        }
        graph.find_cycles()
    }

    fn check_constant_cycles(&self, model: &ModelScope) -> CompileResult<()> {
        let mut graph = DependencyGraph::new();
        for entry in model.constants().iter() {
            graph.add_node(&entry.name, entry.name_span);
        }
        for entry in self.constants.iter() {
            graph.add_node(&entry.name, entry.name_span);
        }
        for entry in model.constants().iter() {
            if let Some(def) = entry.definition {
                graph.add_edges_from_expr(&entry.name, model.arena(), def);
            }
        }
        for entry in self.constants.iter() {
            if let Some(def) = entry.definition {
                graph.add_edges_from_expr(&entry.name, &self.arena, def);
            }
        }
        graph.find_cycles()
    }

    fn typecheck(&mut self, model: &ModelScope) -> CompileResult<()> {
        let mut checker = TypeChecker::new(TypeContext {
            model_arena: model.arena(),
            local_arena: &self.arena,
            bindings: &self.bindings,
            model_constants: model.constants(),
            local_constants: &self.constants,
            variables: model.variables(),
            labels: &self.combined_labels,
            properties: &self.properties,
        });

        for entry in model.formulas().iter() {
            checker.check(ScopeRef::Model, entry.definition)?;
        }
        for entry in model.constants().iter() {
            if let Some(def) = entry.definition {
                checker.expect(
                    ScopeRef::Model,
                    def,
                    entry.ty,
                    &format!("definition of constant \"{}\"", entry.name),
                )?;
            }
        }
        for entry in self.formulas.iter() {
            checker.check(ScopeRef::Local, entry.definition)?;
        }
        for entry in self.combined_labels.iter() {
            checker.expect(
                ScopeRef::Local,
                entry.predicate,
                Type::Bool,
                &format!("predicate of label \"{}\"", entry.name),
            )?;
        }
        for entry in self.constants.iter() {
            if let Some(def) = entry.definition {
                checker.expect(
                    ScopeRef::Local,
                    def,
                    entry.ty,
                    &format!("definition of constant \"{}\"", entry.name),
                )?;
            }
        }
        for property in &self.properties {
            checker.check(ScopeRef::Local, property.expr)?;
        }
        self.types = checker.into_types();
        Ok(())
    }
}

/// Model-scope roots that tagging must cover: formula and constant
/// definitions. Label predicates are covered via their imported copies in
/// the combined view.
fn model_roots(model: &ModelScope) -> Vec<ExprId> {
    let mut roots = Vec::new();
    roots.extend(model.formulas().iter().map(|e| e.definition));
    roots.extend(model.constants().iter().filter_map(|e| e.definition));
    roots
}

impl fmt::Display for PropertiesContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.formulas.display(&self.arena))?;
        write!(f, "{}", self.labels.display(&self.arena))?;
        write!(f, "{}", self.constants.display(&self.arena))?;
        for property in &self.properties {
            writeln!(f, "{}", property.display(&self.arena))?;
        }
        Ok(())
    }
}
