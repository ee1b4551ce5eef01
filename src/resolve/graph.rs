//! Dependency graphs over named definitions.
//!
//! Instantiated twice per `resolve()` pass: once over formula definitions
//! and once over constant definitions. Nodes are names (model-scope and
//! local definitions are indistinguishable — uniqueness was enforced before
//! the graph is built), edges point from a definition to the names its
//! expression references, restricted to names that are nodes of the same
//! graph. A formula graph never sees constant or variable references, and
//! vice versa.
//!
//! # Cycle Detection
//!
//! Depth-first traversal from every node in declaration order, keeping an
//! "on current path" marker set and a "fully processed" marker set. A back
//! edge to a node on the path is a cycle; the full chain is reported as one
//! error and the pass aborts. No attempt is made to recover or to report
//! further independent cycles.

use crate::ast::expr::{ExprArena, ExprId, ExprKind};
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::foundation::Span;
use indexmap::{IndexMap, IndexSet};

/// Name-keyed dependency graph with cycle detection and topological order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// node -> names it depends on, in first-reference order
    edges: IndexMap<String, Vec<String>>,
    /// node -> span of its name token, for error reporting
    spans: IndexMap<String, Span>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node. All nodes must be registered before edges are
    /// scanned, otherwise references to later definitions are dropped.
    pub fn add_node(&mut self, name: impl Into<String>, span: Span) {
        let name = name.into();
        self.edges.entry(name.clone()).or_default();
        self.spans.insert(name, span);
    }

    /// Scan a definition's expression for references to other nodes of this
    /// graph and record them as dependencies of `name`.
    ///
    /// Identifiers that do not name a node (constants seen by the formula
    /// graph, variables, and so on) are ignored.
    pub fn add_edges_from_expr(&mut self, name: &str, arena: &ExprArena, expr: ExprId) {
        let mut deps = Vec::new();
        arena.walk(expr, &mut |node| {
            if let ExprKind::Ident(referenced) = arena.kind(node) {
                if self.edges.contains_key(referenced) && !deps.contains(referenced) {
                    deps.push(referenced.clone());
                }
            }
        });
        if let Some(existing) = self.edges.get_mut(name) {
            existing.extend(deps);
        }
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Check if the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Detect reference cycles.
    ///
    /// Traverses from every node in declaration order, so the reported
    /// cycle starts at the first offending definition.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::CyclicDependency`] carrying the full cycle chain.
    pub fn find_cycles(&self) -> CompileResult<()> {
        let mut done: IndexSet<&str> = IndexSet::new();
        let mut on_path: IndexSet<&str> = IndexSet::new();
        let mut path: Vec<&str> = Vec::new();

        for name in self.edges.keys() {
            if !done.contains(name.as_str()) {
                self.visit(name, &mut done, &mut on_path, &mut path)?;
            }
        }
        Ok(())
    }

    fn visit<'a>(
        &'a self,
        name: &'a str,
        done: &mut IndexSet<&'a str>,
        on_path: &mut IndexSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) -> CompileResult<()> {
        on_path.insert(name);
        path.push(name);

        if let Some(deps) = self.edges.get(name) {
            for dep in deps {
                if on_path.contains(dep.as_str()) {
                    return Err(self.cycle_error(path, dep));
                }
                if !done.contains(dep.as_str()) {
                    self.visit(dep, done, on_path, path)?;
                }
            }
        }

        on_path.swap_remove(name);
        path.pop();
        done.insert(name);
        Ok(())
    }

    /// Build the cycle error from the current DFS path plus the closing
    /// back edge.
    fn cycle_error(&self, path: &[&str], back_to: &str) -> CompileError {
        let start = path.iter().position(|n| *n == back_to).unwrap_or(0);
        let mut chain: Vec<&str> = path[start..].to_vec();
        chain.push(back_to);

        let description = chain.join(" -> ");
        let span = self
            .spans
            .get(chain[0])
            .copied()
            .unwrap_or_else(|| Span::zero(0));

        let mut error = CompileError::new(
            ErrorKind::CyclicDependency,
            span,
            format!("cyclic dependency: {}", description),
        );
        for window in chain.windows(2) {
            if let Some(&dep_span) = self.spans.get(window[0]) {
                error = error.with_label(dep_span, format!("\"{}\" refers to \"{}\"", window[0], window[1]));
            }
        }
        error
    }

    /// Topological order of all nodes (dependencies before dependents).
    ///
    /// Repeatedly takes the first node in declaration order whose
    /// dependencies are all satisfied, so the result is deterministic and
    /// ties break by declaration order.
    ///
    /// # Errors
    ///
    /// [`ErrorKind::CyclicDependency`] if not all nodes can be ordered.
    pub fn topological_order(&self) -> CompileResult<Vec<String>> {
        let mut order = Vec::with_capacity(self.edges.len());
        let mut satisfied: IndexSet<&str> = IndexSet::new();

        while order.len() < self.edges.len() {
            // First node in declaration order whose dependencies are all met
            let next = self.edges.iter().find(|(name, deps)| {
                !satisfied.contains(name.as_str())
                    && deps.iter().all(|d| satisfied.contains(d.as_str()))
            });
            match next {
                Some((name, _)) => {
                    satisfied.insert(name);
                    order.push(name.clone());
                }
                None => {
                    // Remaining nodes form a cycle; report it via DFS
                    self.find_cycles()?;
                    // find_cycles must have failed; if it somehow did not,
                    // surface the inconsistency instead of looping forever
                    return Err(CompileError::new(
                        ErrorKind::Internal,
                        Span::zero(0),
                        "topological order stalled without a detectable cycle".to_string(),
                    ));
                }
            }
        }
        Ok(order)
    }
}
