//! Opt-in modeling-practice advice: values and units a simulator would have
//! to guess.
use super::expect_target;
use crate::model::{Model, RuleKind};
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::ModelingPractice;
    vec![
        RuleDescriptor::warning(80501, ModelingPractice, KindMask::of(&[TargetKind::Compartment]), "Compartments have a size", compartment_size),
        RuleDescriptor::warning(80601, ModelingPractice, KindMask::of(&[TargetKind::Species]), "Species have an initial value", species_initial_value),
        RuleDescriptor::warning(
            80701,
            ModelingPractice,
            KindMask::of(&[TargetKind::Parameter, TargetKind::LocalParameter]),
            "Parameters declare their units",
            parameter_units,
        ),
    ]
}

/// Whether an initial assignment or assignment rule supplies a value for `id`.
fn is_computed(model: &Model, id: &str) -> bool {
    model.initial_assignments.iter().any(|ia| ia.symbol == id)
        || model.rules.iter().any(|r| r.kind == RuleKind::Assignment && r.target() == Some(id))
}

fn compartment_size(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let c = expect_target!(*target, Target::Compartment(c) => c);
    if c.size.is_some() || c.dimensions(ctx.level()) == Some(0.0) || is_computed(ctx.model, &c.id) {
        return Ok(());
    }
    out.report(format!(
        "Compartment '{}' has no size and nothing computes one; a simulator will have to assume a value.",
        c.id
    ));
    Ok(())
}

fn species_initial_value(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if s.initial_amount.is_some() || s.initial_concentration.is_some() || is_computed(ctx.model, &s.id) {
        return Ok(());
    }
    out.report(format!("Species '{}' has no initial amount or concentration and nothing computes one.", s.id));
    Ok(())
}

fn parameter_units(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let p = expect_target!(*target, Target::Parameter(p) | Target::LocalParameter { parameter: p, .. } => p);
    if p.units.is_none() {
        out.report(format!("Parameter '{}' does not declare its units.", p.id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{fired, validate};
    use crate::math::AstNode;
    use crate::model::*;

    #[test]
    fn test_missing_values_are_advised() {
        let mut model = Model::new("m");
        model.compartments.push(Compartment::new("sized").with_size(1.0));
        model.compartments.push(Compartment::new("unsized"));
        model.compartments.push(Compartment::new("computed"));
        model.compartments.push(Compartment::new("point").with_dimensions(0.0));
        model.initial_assignments.push(InitialAssignment::new("computed", AstNode::int(2).into_math()));
        model.species.push(Species::new("A", "sized").with_amount(1.0));
        model.species.push(Species::new("B", "sized"));
        let diagnostics = validate(2, 4, model);
        assert_eq!(fired(&diagnostics, 80501), vec![Some("unsized".to_string())]);
        assert_eq!(fired(&diagnostics, 80601), vec![Some("B".to_string())]);
    }

    #[test]
    fn test_unitless_parameters_are_advised() {
        let mut model = Model::new("m");
        model.parameters.push(Parameter::new("k"));
        model.parameters.push(Parameter::new("v").with_units("second"));
        let law = KineticLaw::new(AstNode::name("kl").into_math()).with_parameter(Parameter::new("kl"));
        model.reactions.push(Reaction::new("r").with_kinetic_law(law));
        let diagnostics = validate(2, 4, model);
        assert_eq!(fired(&diagnostics, 80701), vec![Some("k".to_string()), Some("kl".to_string())]);
    }
}
