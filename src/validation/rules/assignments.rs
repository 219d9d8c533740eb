//! What initial assignments and rules may set.
use super::{assignable, assignable_kinds, expect_target, is_constant_symbol};
use crate::model::{Rule, RuleKind, SymbolRef};
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};

const INITIAL_ASSIGNMENT: KindMask = KindMask::of(&[TargetKind::InitialAssignment]);
const RULE: KindMask = KindMask::of(&[TargetKind::Rule]);

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::{General, Identifier};
    vec![
        RuleDescriptor::error(20216, General, KindMask::of(&[TargetKind::Model]), "The model's conversion factor is a constant parameter", model_conversion_factor)
            .when(super::level3_plus),
        RuleDescriptor::error(
            20701,
            General,
            KindMask::of(&[TargetKind::Parameter, TargetKind::LocalParameter]),
            "Parameter units must be defined",
            parameter_units_resolve,
        ),
        RuleDescriptor::error(20801, General, INITIAL_ASSIGNMENT, "Initial assignments set a compartment, species or parameter", initial_assignment_symbol),
        RuleDescriptor::error(20802, Identifier, INITIAL_ASSIGNMENT, "A symbol has at most one initial assignment", unique_initial_assignment),
        RuleDescriptor::error(20803, General, INITIAL_ASSIGNMENT, "Symbols set by assignment rules have no initial assignment", initial_assignment_vs_rule),
        RuleDescriptor::error(20901, General, RULE, "Assignment rules set a compartment, species or parameter", assignment_rule_variable),
        RuleDescriptor::error(20902, General, RULE, "Rate rules set a compartment, species or parameter", rate_rule_variable),
        RuleDescriptor::error(20903, General, RULE, "Assignment rules cannot set constants", assignment_rule_constant),
        RuleDescriptor::error(20904, General, RULE, "Rate rules cannot set constants", rate_rule_constant),
        RuleDescriptor::error(20905, General, RULE, "Rules cannot set zero-dimensional compartments", rule_point_compartment)
            .when(super::before_level3),
    ]
}

fn model_conversion_factor(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let model = expect_target!(*target, Target::Model(m) => m);
    let owner = model.id.as_deref().unwrap_or("model");
    if let Some(message) =
        model.conversion_factor.as_deref().and_then(|f| super::species::check_conversion_factor(ctx, owner, f))
    {
        out.report(message);
    }
    Ok(())
}

fn parameter_units_resolve(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let p = expect_target!(*target, Target::Parameter(p) | Target::LocalParameter { parameter: p, .. } => p);
    let Some(units) = p.units.as_deref() else { return Ok(()) };
    if ctx.deriver().resolve(units).is_none() {
        out.report(format!(
            "The units '{}' of parameter '{}' are neither a base unit, a built-in unit nor a UnitDefinition.",
            units, p.id
        ));
    }
    Ok(())
}

// --- Initial assignments ---

fn initial_assignment_symbol(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let ia = expect_target!(*target, Target::InitialAssignment(ia) => ia);
    if assignable(ctx, &ia.symbol).is_none() {
        out.report(format!(
            "The symbol '{}' of an InitialAssignment is not the identifier of a {}.",
            ia.symbol,
            assignable_kinds(ctx)
        ));
    }
    Ok(())
}

fn unique_initial_assignment(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let ia = expect_target!(*target, Target::InitialAssignment(ia) => ia);
    let duplicate = ctx
        .model
        .initial_assignments
        .iter()
        .take_while(|other| !std::ptr::eq(*other, ia))
        .any(|other| other.symbol == ia.symbol);
    if duplicate {
        out.report(format!("'{}' already has an InitialAssignment.", ia.symbol));
    }
    Ok(())
}

fn initial_assignment_vs_rule(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let ia = expect_target!(*target, Target::InitialAssignment(ia) => ia);
    let ruled = ctx
        .model
        .rules
        .iter()
        .any(|r| r.kind == RuleKind::Assignment && r.target() == Some(ia.symbol.as_str()));
    if ruled {
        out.report(format!(
            "'{}' is set by an AssignmentRule and cannot also have an InitialAssignment.",
            ia.symbol
        ));
    }
    Ok(())
}

// --- Rules ---

/// The rule's variable when the rule is of `kind`.
fn variable_of(rule: &Rule, kind: RuleKind) -> Option<&str> {
    (rule.kind == kind).then(|| rule.target()).flatten()
}

fn check_rule_variable(ctx: &ValidationContext, target: &Target, out: &mut Findings, kind: RuleKind) -> Result<(), RuleFault> {
    let rule = expect_target!(*target, Target::Rule { rule, .. } => rule);
    let Some(variable) = variable_of(rule, kind) else { return Ok(()) };
    if assignable(ctx, variable).is_none() {
        out.report(format!(
            "The variable '{}' of this {} is not the identifier of a {}.",
            variable,
            kind.label(),
            assignable_kinds(ctx)
        ));
    }
    Ok(())
}

fn assignment_rule_variable(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_rule_variable(ctx, target, out, RuleKind::Assignment)
}

fn rate_rule_variable(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_rule_variable(ctx, target, out, RuleKind::Rate)
}

fn check_rule_constant(ctx: &ValidationContext, target: &Target, out: &mut Findings, kind: RuleKind) -> Result<(), RuleFault> {
    let rule = expect_target!(*target, Target::Rule { rule, .. } => rule);
    let Some(variable) = variable_of(rule, kind) else { return Ok(()) };
    let Some(symbol) = assignable(ctx, variable) else { return Ok(()) };
    if is_constant_symbol(ctx, &symbol) {
        out.report(format!(
            "{} '{}' is constant and cannot be the variable of a {}.",
            symbol.kind_label(),
            variable,
            kind.label()
        ));
    }
    Ok(())
}

fn assignment_rule_constant(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_rule_constant(ctx, target, out, RuleKind::Assignment)
}

fn rate_rule_constant(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_rule_constant(ctx, target, out, RuleKind::Rate)
}

fn rule_point_compartment(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let rule = expect_target!(*target, Target::Rule { rule, .. } => rule);
    let Some(variable) = rule.target() else { return Ok(()) };
    if let Some(SymbolRef::Compartment(c)) = ctx.index.symbol(variable) {
        if c.dimensions(ctx.level()) == Some(0.0) {
            out.report(format!(
                "Compartment '{}' has spatialDimensions 0 and cannot be the variable of a {}.",
                c.id,
                rule.kind.label()
            ));
        }
    }
    Ok(())
}
