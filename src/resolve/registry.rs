//! Identifier registry for the formula/constant namespace.
//!
//! Formulas and constants (local and model-scope) share one namespace. The
//! registry tracks names claimed during the current `resolve()` pass and
//! answers claim-or-fail atomically: a name already used by the linked model
//! scope is a name clash, a name already claimed locally is a duplicate.
//!
//! The registry is rebuilt (cleared and replayed) at the start of every
//! `resolve()` pass, so claims from a failed or stale pass never linger.

use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::foundation::Span;
use crate::model::ModelScope;
use indexmap::IndexSet;

/// Tracks identifiers claimed within one container during one pass.
#[derive(Debug, Clone, Default)]
pub struct IdentifierRegistry {
    claimed: IndexSet<String>,
}

impl IdentifierRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim an identifier, failing if it is already taken.
    ///
    /// # Errors
    ///
    /// - [`ErrorKind::NameClash`] if the model scope already uses the name
    /// - [`ErrorKind::DuplicateIdentifier`] if it was already claimed here
    pub fn claim(&mut self, name: &str, name_span: Span, model: &ModelScope) -> CompileResult<()> {
        if model.is_ident_used(name) {
            return Err(CompileError::new(
                ErrorKind::NameClash,
                name_span,
                format!("identifier \"{}\" already used in the model", name),
            ));
        }
        if !self.claimed.insert(name.to_string()) {
            return Err(CompileError::new(
                ErrorKind::DuplicateIdentifier,
                name_span,
                format!("duplicated identifier \"{}\"", name),
            ));
        }
        Ok(())
    }

    /// Check if an identifier was claimed in this pass.
    pub fn contains(&self, name: &str) -> bool {
        self.claimed.contains(name)
    }

    /// Forget all claims, ready for a fresh pass.
    pub fn clear(&mut self) {
        self.claimed.clear();
    }

    /// Number of claimed identifiers.
    pub fn len(&self) -> usize {
        self.claimed.len()
    }

    /// Check if no identifiers are claimed.
    pub fn is_empty(&self) -> bool {
        self.claimed.is_empty()
    }
}
