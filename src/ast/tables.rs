//! Ordered definition tables: formulas, labels, constants, properties.
//!
//! Each table is an append-only ordered sequence; declaration order is
//! semantic (it breaks ties in constant evaluation and drives which cycle is
//! reported first). Definitions are [`ExprId`]s into the arena of whichever
//! scope owns the table.
//!
//! Uniqueness is NOT enforced here. The container's identifier registry
//! claims names across both scopes before any table-level analysis runs, so
//! tables may transiently hold duplicates (e.g. right after `insert`) and
//! the next `resolve()` rejects them.

use crate::ast::expr::{ExprArena, ExprId};
use crate::foundation::{Span, Type};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A named, reusable expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    /// Formula name
    pub name: String,
    /// Location of the name token
    pub name_span: Span,
    /// Defining expression
    pub definition: ExprId,
}

/// Ordered sequence of formula definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormulaTable {
    entries: Vec<Formula>,
}

impl FormulaTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a formula definition.
    pub fn add_formula(&mut self, name: impl Into<String>, name_span: Span, definition: ExprId) {
        self.entries.push(Formula {
            name: name.into(),
            name_span,
            definition,
        });
    }

    /// Number of formulas.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by position.
    pub fn get(&self, index: usize) -> &Formula {
        &self.entries[index]
    }

    /// Iterate entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Formula> {
        self.entries.iter()
    }

    /// Position of the first entry with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Source-form display against the owning arena.
    pub fn display<'a>(&'a self, arena: &'a ExprArena) -> FormulaTableDisplay<'a> {
        FormulaTableDisplay { table: self, arena }
    }
}

/// Display adapter for [`FormulaTable`].
pub struct FormulaTableDisplay<'a> {
    table: &'a FormulaTable,
    arena: &'a ExprArena,
}

impl fmt::Display for FormulaTableDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in self.table.iter() {
            writeln!(
                f,
                "formula {} = {};",
                entry.name,
                self.arena.display(entry.definition)
            )?;
        }
        Ok(())
    }
}

/// A named boolean predicate over model state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEntry {
    /// Label name (without quotes)
    pub name: String,
    /// Location of the name token
    pub name_span: Span,
    /// Defining predicate; boolean-typed after type checking
    pub predicate: ExprId,
}

/// Ordered sequence of label definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelTable {
    entries: Vec<LabelEntry>,
}

impl LabelTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a label definition.
    pub fn add_label(&mut self, name: impl Into<String>, name_span: Span, predicate: ExprId) {
        self.entries.push(LabelEntry {
            name: name.into(),
            name_span,
            predicate,
        });
    }

    /// Number of labels.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by position.
    pub fn get(&self, index: usize) -> &LabelEntry {
        &self.entries[index]
    }

    /// Iterate entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &LabelEntry> {
        self.entries.iter()
    }

    /// Position of the first entry with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Check if a label with the given name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Source-form display against the owning arena.
    pub fn display<'a>(&'a self, arena: &'a ExprArena) -> LabelTableDisplay<'a> {
        LabelTableDisplay { table: self, arena }
    }
}

/// Display adapter for [`LabelTable`].
pub struct LabelTableDisplay<'a> {
    table: &'a LabelTable,
    arena: &'a ExprArena,
}

impl fmt::Display for LabelTableDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in self.table.iter() {
            writeln!(
                f,
                "label \"{}\" = {};",
                entry.name,
                self.arena.display(entry.predicate)
            )?;
        }
        Ok(())
    }
}

/// A named constant, defined by an expression or awaiting a supplied value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constant {
    /// Constant name
    pub name: String,
    /// Location of the name token
    pub name_span: Span,
    /// Defining expression; `None` marks an undefined constant
    pub definition: Option<ExprId>,
    /// Declared type
    pub ty: Type,
}

/// Ordered sequence of constant declarations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantTable {
    entries: Vec<Constant>,
}

impl ConstantTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a constant declaration.
    ///
    /// `definition = None` declares an undefined constant whose value must
    /// be supplied at binding time.
    pub fn add_constant(
        &mut self,
        name: impl Into<String>,
        name_span: Span,
        definition: Option<ExprId>,
        ty: Type,
    ) {
        self.entries.push(Constant {
            name: name.into(),
            name_span,
            definition,
            ty,
        });
    }

    /// Number of constants.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get an entry by position.
    pub fn get(&self, index: usize) -> &Constant {
        &self.entries[index]
    }

    /// Iterate entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Constant> {
        self.entries.iter()
    }

    /// Position of the first entry with the given name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Names of constants declared without a definition, in declaration
    /// order. These must appear in the supplied values at binding time.
    pub fn undefined_constants(&self) -> Vec<&str> {
        self.entries
            .iter()
            .filter(|e| e.definition.is_none())
            .map(|e| e.name.as_str())
            .collect()
    }

    /// Source-form display against the owning arena.
    pub fn display<'a>(&'a self, arena: &'a ExprArena) -> ConstantTableDisplay<'a> {
        ConstantTableDisplay { table: self, arena }
    }
}

/// Display adapter for [`ConstantTable`].
pub struct ConstantTableDisplay<'a> {
    table: &'a ConstantTable,
    arena: &'a ExprArena,
}

impl fmt::Display for ConstantTableDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in self.table.iter() {
            match entry.definition {
                Some(def) => writeln!(
                    f,
                    "const {} {} = {};",
                    entry.ty,
                    entry.name,
                    self.arena.display(def)
                )?,
                None => writeln!(f, "const {} {};", entry.ty, entry.name)?,
            }
        }
        Ok(())
    }
}

/// An optionally named, optionally commented checkable expression.
///
/// Identity is positional: two anonymous properties may be textually
/// identical and remain distinct entries. Name uniqueness is the
/// container's concern, not this type's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Property name; anonymous properties have none
    pub name: Option<String>,
    /// Location of the whole property
    pub span: Span,
    /// The checkable expression
    pub expr: ExprId,
    /// Comment preceding the property in the source, if any
    pub comment: Option<String>,
}

impl Property {
    /// Create a property entry.
    pub fn new(name: Option<String>, span: Span, expr: ExprId, comment: Option<String>) -> Self {
        Self {
            name,
            span,
            expr,
            comment,
        }
    }

    /// Property name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Comment, if any.
    pub fn comment(&self) -> Option<&str> {
        self.comment.as_deref()
    }

    /// Source-form display against the owning arena.
    pub fn display<'a>(&'a self, arena: &'a ExprArena) -> PropertyDisplay<'a> {
        PropertyDisplay {
            property: self,
            arena,
        }
    }
}

/// Display adapter for [`Property`].
pub struct PropertyDisplay<'a> {
    property: &'a Property,
    arena: &'a ExprArena,
}

impl fmt::Display for PropertyDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(comment) = self.property.comment() {
            writeln!(f, "// {}", comment)?;
        }
        if let Some(name) = self.property.name() {
            write!(f, "\"{}\": ", name)?;
        }
        write!(f, "{}", self.arena.display(self.property.expr))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::expr::BinaryOp;

    fn span() -> Span {
        Span::zero(0)
    }

    #[test]
    fn test_formula_table_order_and_lookup() {
        let mut arena = ExprArena::new();
        let one = arena.int_lit(1, span());
        let two = arena.int_lit(2, span());

        let mut table = FormulaTable::new();
        table.add_formula("f", span(), one);
        table.add_formula("g", span(), two);

        assert_eq!(table.len(), 2);
        assert_eq!(table.index_of("g"), Some(1));
        assert_eq!(table.index_of("h"), None);
        assert_eq!(table.get(0).name, "f");
    }

    #[test]
    fn test_undefined_constants() {
        let mut arena = ExprArena::new();
        let def = arena.int_lit(4, span());

        let mut table = ConstantTable::new();
        table.add_constant("n", span(), None, Type::Int);
        table.add_constant("m", span(), Some(def), Type::Int);
        table.add_constant("p", span(), None, Type::Double);

        assert_eq!(table.undefined_constants(), vec!["n", "p"]);
    }

    #[test]
    fn test_label_contains() {
        let mut arena = ExprArena::new();
        let t = arena.bool_lit(true, span());

        let mut table = LabelTable::new();
        table.add_label("safe", span(), t);
        assert!(table.contains("safe"));
        assert!(!table.contains("done"));
    }

    #[test]
    fn test_table_display() {
        let mut arena = ExprArena::new();
        let x = arena.ident("x", span());
        let three = arena.int_lit(3, span());
        let pred = arena.binary(BinaryOp::Lt, x, three, span());

        let mut labels = LabelTable::new();
        labels.add_label("safe", span(), pred);
        assert_eq!(labels.display(&arena).to_string(), "label \"safe\" = x < 3;\n");

        let mut constants = ConstantTable::new();
        constants.add_constant("n", span(), None, Type::Int);
        assert_eq!(constants.display(&arena).to_string(), "const int n;\n");
    }

    #[test]
    fn test_property_display() {
        let mut arena = ExprArena::new();
        let done = arena.label_ref("done", span());
        let prop = Property::new(
            Some("eventually".to_string()),
            span(),
            done,
            Some("reachability check".to_string()),
        );

        let text = prop.display(&arena).to_string();
        assert!(text.contains("// reachability check"));
        assert!(text.contains("\"eventually\": \"done\""));
    }
}
