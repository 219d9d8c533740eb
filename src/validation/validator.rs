//! The entry point that runs the rule catalogue over a whole document.
use super::config::ValidatorConfig;
use super::context::ValidationContext;
use super::error::{Category, Diagnostic, DiagnosticLog, Severity};
use super::registry::RuleRegistry;
use super::target::Target;
use crate::model::Document;
use crate::sbo::{BuiltinTaxonomy, SboTaxonomy};
use rayon::prelude::*;
use std::time::Instant;
use tracing::debug;

/// Validates documents against a rule registry.
///
/// A validator is reusable: it holds no per-run state, so validating the
/// same document twice yields identical logs.
pub struct Validator {
    config: ValidatorConfig,
    registry: RuleRegistry,
    taxonomy: Box<dyn SboTaxonomy>,
}

impl Validator {
    /// A validator with every built-in rule and the built-in SBO taxonomy.
    pub fn new(config: ValidatorConfig) -> Self {
        Self::with_registry(config, RuleRegistry::builtin())
    }

    pub fn with_registry(config: ValidatorConfig, registry: RuleRegistry) -> Self {
        Self { config, registry, taxonomy: Box::new(BuiltinTaxonomy::new()) }
    }

    /// Replaces the SBO taxonomy, e.g. with one backed by the full ontology.
    pub fn with_taxonomy(mut self, taxonomy: impl SboTaxonomy + 'static) -> Self {
        self.taxonomy = Box::new(taxonomy);
        self
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &RuleRegistry {
        &self.registry
    }

    /// Runs every enabled rule and returns the findings in traversal order,
    /// then rule id.
    pub fn validate(&self, document: &Document) -> DiagnosticLog {
        let started = Instant::now();
        let mut log = DiagnosticLog::new();

        let Some(model) = document.model.as_ref() else {
            if self.config.enables(Category::General) {
                log.push(Diagnostic {
                    rule_id: 20201,
                    severity: Severity::Error,
                    category: Category::General,
                    message: "The document must contain a model.".to_string(),
                    entity_kind: "Document".to_string(),
                    entity_id: None,
                    location: None,
                });
            }
            return log;
        };

        let ctx = ValidationContext::new(document, model, &self.config, self.taxonomy.as_ref());
        let targets = Target::traversal(model);
        debug!(
            level = document.level,
            version = document.version,
            targets = targets.len(),
            rules = self.registry.len(),
            parallel = self.config.parallel,
            "Validation started"
        );

        if self.config.parallel {
            let per_target: Vec<Vec<Diagnostic>> =
                targets.par_iter().map(|target| self.registry.run_target(&ctx, target)).collect();
            log.extend(per_target.into_iter().flatten());
        } else {
            for target in &targets {
                log.extend(self.registry.run_target(&ctx, target));
            }
        }

        if let Some(limit) = self.config.max_diagnostics {
            log.truncate(limit);
        }
        debug!(
            diagnostics = log.len(),
            truncated = log.is_truncated(),
            elapsed_us = started.elapsed().as_micros() as u64,
            "Validation finished"
        );
        log
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(ValidatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::AstNode;
    use crate::model::*;
    use crate::sbo::MATERIAL_ENTITY;

    fn noisy_model() -> Model {
        let mut model = Model::new("m");
        model.compartments.push(Compartment::new("c").with_size(1.0).with_outside("nowhere"));
        model.parameters.push(Parameter::new("c"));
        model.rules.push(Rule::assignment("ghost", AstNode::name("missing").into_math()));
        model
    }

    #[test]
    fn test_missing_model_is_reported() {
        let document = Document { level: 2, version: 4, model: None };
        let log = Validator::default().validate(&document);
        assert_eq!(log.count(20201), 1);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_parallel_dispatch_matches_serial_order() {
        let document = Document::new(2, 4, noisy_model());
        let serial = Validator::default().validate(&document);
        let parallel =
            Validator::new(ValidatorConfig { parallel: true, ..Default::default() }).validate(&document);
        assert!(!serial.is_empty());
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_cap_truncates_and_marks_the_log() {
        let document = Document::new(2, 4, noisy_model());
        let config = ValidatorConfig { max_diagnostics: Some(1), ..Default::default() };
        let log = Validator::new(config).validate(&document);
        assert_eq!(log.len(), 1);
        assert!(log.is_truncated());
    }

    #[test]
    fn test_disabled_categories_do_not_run() {
        let document = Document::new(2, 4, noisy_model());
        let mut config = ValidatorConfig::default();
        config.categories.identifier = false;
        let log = Validator::new(config).validate(&document);
        assert_eq!(log.count(10301), 0);
        assert_eq!(log.count(20504), 1);
    }

    struct EverythingIsMaterial;

    impl SboTaxonomy for EverythingIsMaterial {
        fn knows(&self, _: u32) -> bool {
            true
        }

        fn is_a(&self, _: u32, ancestor: u32) -> bool {
            ancestor == MATERIAL_ENTITY
        }
    }

    #[test]
    fn test_custom_taxonomy_is_consulted() {
        let mut model = Model::new("m");
        let mut p = Parameter::new("k");
        p.base.sbo_term = Some(4242);
        model.parameters.push(p);
        let document = Document::new(2, 4, model);
        assert_eq!(Validator::default().validate(&document).count(10703), 0);
        let strict = Validator::default().with_taxonomy(EverythingIsMaterial);
        assert_eq!(strict.validate(&document).count(10703), 1);
    }
}
