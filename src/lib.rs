//! Consistency validation for SBML model documents.
//!
//! The crate takes an already-parsed [`Document`] and checks it against the
//! consistency rule catalogue: identifier namespaces, reference resolution,
//! math well-formedness, dimensional analysis of every expression, SBO term
//! placement, dependency cycles and over-determination. Validation never
//! mutates the document and never stops at the first problem; it returns an
//! ordered [`DiagnosticLog`].
//!
//! ```no_run
//! use sbml_consistency_core::{Document, Validator};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let document = Document::from_json_str(r#"{ "level": 3, "version": 2, "model": { "id": "m" } }"#)?;
//! let log = Validator::default().validate(&document);
//! for d in log.errors() {
//!     eprintln!("[{}] {}", d.rule_id, d.message);
//! }
//! # Ok(())
//! # }
//! ```
pub mod ids;
pub mod math;
pub mod model;
pub mod sbo;
pub mod units;
pub mod validation;

pub use model::{Document, DocumentError, Model};
pub use validation::{
    Category, CategorySet, ConfigError, Diagnostic, DiagnosticLog, RuleRegistry, Severity, Validator,
    ValidatorConfig,
};
