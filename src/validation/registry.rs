//! The rule catalogue and per-target dispatch.
//!
//! Rules are plain data: an id, the kinds of object they apply to, a
//! precondition on the document, and a check function. Dispatch runs every
//! applicable rule against a target in ascending id order and turns whatever
//! each one reports into [`Diagnostic`]s. A rule that fails or panics is
//! recorded as an internal error and the run carries on.
use super::context::ValidationContext;
use super::error::{Category, Diagnostic, RegistryError, RuleFault, Severity};
use super::target::{KindMask, Target};
use crate::model::SourceLocation;
use smallvec::SmallVec;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use tracing::{trace, warn};

pub type CheckFn = for<'a> fn(&ValidationContext<'a>, &Target<'a>, &mut Findings) -> Result<(), RuleFault>;
pub type Precondition = fn(&ValidationContext<'_>) -> bool;

/// One problem a rule found. Unless overridden, it is about the dispatched target.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub message: String,
    pub entity_kind: Option<&'static str>,
    pub entity_id: Option<String>,
    pub location: Option<SourceLocation>,
}

/// Collects the findings of one rule invocation.
#[derive(Debug, Default)]
pub struct Findings {
    items: Vec<Finding>,
}

impl Findings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports a problem with the target being checked.
    pub fn report(&mut self, message: impl Into<String>) {
        self.items.push(Finding { message: message.into(), entity_kind: None, entity_id: None, location: None });
    }

    /// Reports a problem with some other object, for model-wide rules.
    pub fn report_on(
        &mut self,
        kind: &'static str,
        id: Option<&str>,
        location: Option<SourceLocation>,
        message: impl Into<String>,
    ) {
        self.items.push(Finding {
            message: message.into(),
            entity_kind: Some(kind),
            entity_id: id.map(str::to_string),
            location,
        });
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_vec(self) -> Vec<Finding> {
        self.items
    }
}

/// A registered consistency rule.
#[derive(Clone)]
pub struct RuleDescriptor {
    pub id: u32,
    pub category: Category,
    pub severity: Severity,
    pub applies_to: KindMask,
    /// All of these must hold for the rule to run.
    pub preconditions: SmallVec<[Precondition; 2]>,
    pub check: CheckFn,
    pub summary: &'static str,
}

impl RuleDescriptor {
    pub fn new(
        id: u32,
        category: Category,
        severity: Severity,
        applies_to: KindMask,
        summary: &'static str,
        check: CheckFn,
    ) -> Self {
        Self { id, category, severity, applies_to, preconditions: SmallVec::new(), check, summary }
    }

    pub fn error(id: u32, category: Category, applies_to: KindMask, summary: &'static str, check: CheckFn) -> Self {
        Self::new(id, category, Severity::Error, applies_to, summary, check)
    }

    pub fn warning(id: u32, category: Category, applies_to: KindMask, summary: &'static str, check: CheckFn) -> Self {
        Self::new(id, category, Severity::Warning, applies_to, summary, check)
    }

    /// Restricts the rule to documents satisfying `precondition`, on top of
    /// any earlier restriction.
    pub fn when(mut self, precondition: Precondition) -> Self {
        self.preconditions.push(precondition);
        self
    }

    pub fn applies(&self, ctx: &ValidationContext<'_>) -> bool {
        self.preconditions.iter().all(|precondition| precondition(ctx))
    }
}

impl std::fmt::Debug for RuleDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleDescriptor")
            .field("id", &self.id)
            .field("category", &self.category)
            .field("severity", &self.severity)
            .field("summary", &self.summary)
            .finish()
    }
}

/// The rule catalogue, kept sorted by id.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    rules: Vec<RuleDescriptor>,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in rule.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for descriptor in super::rules::builtin_descriptors() {
            if let Err(e) = registry.register(descriptor) {
                warn!(error = %e, "skipping built-in rule");
            }
        }
        registry
    }

    pub fn register(&mut self, descriptor: RuleDescriptor) -> Result<(), RegistryError> {
        match self.rules.binary_search_by_key(&descriptor.id, |r| r.id) {
            Ok(_) => Err(RegistryError::DuplicateRule(descriptor.id)),
            Err(pos) => {
                self.rules.insert(pos, descriptor);
                Ok(())
            }
        }
    }

    pub fn get(&self, id: u32) -> Option<&RuleDescriptor> {
        self.rules.binary_search_by_key(&id, |r| r.id).ok().map(|i| &self.rules[i])
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.rules.iter()
    }

    /// Runs every applicable rule against one target.
    pub fn run_target<'a>(&self, ctx: &ValidationContext<'a>, target: &Target<'a>) -> Vec<Diagnostic> {
        let kind = target.kind();
        let mut out = Vec::new();

        for rule in self.rules.iter().filter(|r| r.applies_to.contains(kind)) {
            if !ctx.config.enables(rule.category) || !rule.applies(ctx) {
                continue;
            }

            let mut findings = Findings::new();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (rule.check)(ctx, target, &mut findings)));
            if !findings.is_empty() {
                trace!(rule = rule.id, target = target.label(), count = findings.len(), "rule fired");
            }
            out.extend(findings.into_vec().into_iter().map(|f| Self::to_diagnostic(rule, target, f)));

            let fault = match outcome {
                Ok(Ok(())) => None,
                Ok(Err(fault)) => Some(fault.to_string()),
                Err(payload) => Some(format!("panicked: {}", panic_message(payload.as_ref()))),
            };
            if let Some(reason) = fault {
                warn!(rule = rule.id, target = target.label(), %reason, "rule aborted");
                out.push(Diagnostic {
                    rule_id: rule.id,
                    severity: Severity::InternalError,
                    category: rule.category,
                    message: format!("Internal error in rule {} while checking {}: {}", rule.id, target.label(), reason),
                    entity_kind: target.label().to_string(),
                    entity_id: target.entity_id().map(str::to_string),
                    location: target.location(),
                });
            }
        }
        out
    }

    fn to_diagnostic(rule: &RuleDescriptor, target: &Target<'_>, finding: Finding) -> Diagnostic {
        let own = finding.entity_kind.is_none();
        Diagnostic {
            rule_id: rule.id,
            severity: rule.severity,
            category: rule.category,
            message: finding.message,
            entity_kind: finding.entity_kind.unwrap_or_else(|| target.label()).to_string(),
            entity_id: if own { target.entity_id().map(str::to_string) } else { finding.entity_id },
            location: if own { target.location() } else { finding.location },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Document, Model};
    use crate::sbo::BuiltinTaxonomy;
    use crate::validation::config::ValidatorConfig;
    use crate::validation::target::TargetKind;

    const MODEL_ONLY: KindMask = KindMask::of(&[TargetKind::Model]);

    fn complains(_: &ValidationContext<'_>, _: &Target<'_>, out: &mut Findings) -> Result<(), RuleFault> {
        out.report("first");
        out.report("second");
        Ok(())
    }

    fn faults(_: &ValidationContext<'_>, _: &Target<'_>, _: &mut Findings) -> Result<(), RuleFault> {
        Err(RuleFault::Inconsistent("boom".into()))
    }

    fn panics(_: &ValidationContext<'_>, _: &Target<'_>, _: &mut Findings) -> Result<(), RuleFault> {
        panic!("rule body exploded")
    }

    fn never(_: &ValidationContext<'_>) -> bool {
        false
    }

    fn run(registry: &RuleRegistry) -> Vec<Diagnostic> {
        let document = Document::new(3, 1, Model::new("m"));
        let config = ValidatorConfig::default();
        let taxonomy = BuiltinTaxonomy::new();
        let model = document.model.as_ref().unwrap();
        let ctx = ValidationContext::new(&document, model, &config, &taxonomy);
        registry.run_target(&ctx, &Target::Model(model))
    }

    #[test]
    fn test_rules_run_in_id_order_and_faults_become_diagnostics() {
        let mut registry = RuleRegistry::new();
        registry.register(RuleDescriptor::error(30, Category::General, MODEL_ONLY, "panics", panics)).unwrap();
        registry.register(RuleDescriptor::error(20, Category::General, MODEL_ONLY, "faults", faults)).unwrap();
        registry.register(RuleDescriptor::error(10, Category::General, MODEL_ONLY, "complains", complains)).unwrap();

        let out = run(&registry);
        let ids: Vec<(u32, Severity)> = out.iter().map(|d| (d.rule_id, d.severity)).collect();
        assert_eq!(
            ids,
            vec![
                (10, Severity::Error),
                (10, Severity::Error),
                (20, Severity::InternalError),
                (30, Severity::InternalError),
            ]
        );
        assert!(out[3].message.contains("rule body exploded"));
        assert_eq!(out[0].entity_id.as_deref(), Some("m"));
    }

    #[test]
    fn test_duplicate_ids_and_preconditions() {
        let mut registry = RuleRegistry::new();
        registry.register(RuleDescriptor::error(10, Category::General, MODEL_ONLY, "c", complains).when(never)).unwrap();
        assert_eq!(
            registry.register(RuleDescriptor::error(10, Category::General, MODEL_ONLY, "c", complains)),
            Err(RegistryError::DuplicateRule(10))
        );
        assert!(run(&registry).is_empty());
    }

    fn modern(ctx: &ValidationContext<'_>) -> bool {
        ctx.level() >= 3
    }

    #[test]
    fn test_preconditions_accumulate() {
        let rule = |id| RuleDescriptor::error(id, Category::General, MODEL_ONLY, "c", complains);
        let mut registry = RuleRegistry::new();
        registry.register(rule(10).when(modern)).unwrap();
        registry.register(rule(20).when(modern).when(never)).unwrap();
        registry.register(rule(30).when(never).when(modern)).unwrap();
        let ids: Vec<u32> = run(&registry).iter().map(|d| d.rule_id).collect();
        assert_eq!(ids, vec![10, 10]);
    }

    #[test]
    fn test_builtin_catalogue_has_unique_ids() {
        let descriptors = crate::validation::rules::builtin_descriptors();
        let registry = RuleRegistry::builtin();
        assert_eq!(registry.len(), descriptors.len());
        assert!(registry.get(10601).is_some());
        assert!(registry.get(20906).is_some());
    }
}
