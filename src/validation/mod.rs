//! The consistency validation engine.
//!
//! A [`Validator`] walks every object of a model in a fixed order and runs
//! each applicable rule of its [`RuleRegistry`] against it. Whole-model
//! checks (containment and assignment cycles, over-determination) are
//! ordinary rules dispatched to the model target.
pub mod config;
pub mod context;
pub mod cycles;
pub mod error;
pub mod overdetermined;
pub mod registry;
pub mod rules;
pub mod target;
pub mod validator;

pub use config::{CategorySet, ConfigError, ValidatorConfig};
pub use context::ValidationContext;
pub use error::{Category, Diagnostic, DiagnosticLog, RegistryError, RuleFault, Severity};
pub use registry::{CheckFn, Findings, Precondition, RuleDescriptor, RuleRegistry};
pub use target::{KindMask, Target, TargetKind};
pub use validator::Validator;
