//! Foundation types shared across the analysis passes.
//!
//! These are distinct from anything the downstream verification engine
//! defines; they describe compile-time constructs only.

pub mod span;
pub mod types;
pub mod value;

pub use span::{SourceFile, SourceMap, Span};
pub use types::Type;
pub use value::{ConstantValues, Value};
