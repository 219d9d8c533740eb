//! Reaction structure: participants, modifiers and kinetic laws.
use super::{expect_target, require_math};
use crate::math::referenced_names;
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::General;
    vec![
        RuleDescriptor::error(21101, General, KindMask::of(&[TargetKind::Reaction]), "Reactions have at least one reactant or product", has_participants)
            .when(super::before_l3v2),
        RuleDescriptor::error(21111, General, KindMask::of(&[TargetKind::SpeciesReference]), "Species references name a species", reference_resolves),
        RuleDescriptor::error(21113, General, KindMask::of(&[TargetKind::SpeciesReference]), "stoichiometry and stoichiometryMath are exclusive", single_stoichiometry)
            .when(super::level2_plus),
        RuleDescriptor::error(21117, General, KindMask::of(&[TargetKind::Modifier]), "Modifiers name a species", modifier_resolves),
        RuleDescriptor::error(21121, General, KindMask::of(&[TargetKind::KineticLaw]), "Species in a rate law are listed in its reaction", kinetic_law_species)
            .when(super::level2_plus),
    ]
}

fn has_participants(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let r = expect_target!(*target, Target::Reaction(r) => r);
    if r.reactants.is_empty() && r.products.is_empty() {
        out.report(format!("Reaction '{}' has no reactants and no products.", r.id));
    }
    Ok(())
}

fn reference_resolves(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let (reaction, reference) =
        expect_target!(*target, Target::SpeciesReference { reaction, reference, .. } => (reaction, reference));
    if ctx.index.species(&reference.species).is_none() {
        out.report(format!(
            "Reaction '{}' refers to '{}', which is not a species.",
            reaction.id, reference.species
        ));
    }
    Ok(())
}

fn single_stoichiometry(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let reference = expect_target!(*target, Target::SpeciesReference { reference, .. } => reference);
    if reference.stoichiometry.is_some() && reference.stoichiometry_math.is_some() {
        out.report(format!(
            "The reference to '{}' sets both stoichiometry and stoichiometryMath.",
            reference.species
        ));
    }
    Ok(())
}

fn modifier_resolves(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let (reaction, reference) = expect_target!(*target, Target::Modifier { reaction, reference } => (reaction, reference));
    if ctx.index.species(&reference.species).is_none() {
        out.report(format!(
            "Reaction '{}' lists modifier '{}', which is not a species.",
            reaction.id, reference.species
        ));
    }
    Ok(())
}

fn kinetic_law_species(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let (reaction, law) = expect_target!(*target, Target::KineticLaw { reaction, law } => (reaction, law));
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    let names = referenced_names(&math);
    let unlisted = names.iter().find(|id| {
        law.local_parameter(id).is_none()
            && ctx.index.species(id).is_some()
            && !reaction.involves_species(id)
            && !reaction.modifiers.iter().any(|m| m.species == *id)
    });
    if let Some(id) = unlisted {
        out.report(format!(
            "The kinetic law of reaction '{}' uses species '{}', which is not a reactant, product or modifier of it.",
            reaction.id, id
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{count, fired, validate};
    use crate::math::{AstNode, Operator};
    use crate::model::*;

    fn model() -> Model {
        let mut model = Model::new("m");
        model.compartments.push(Compartment::new("c").with_size(1.0));
        for id in ["A", "B", "E"] {
            model.species.push(Species::new(id, "c").with_amount(1.0));
        }
        model
    }

    #[test]
    fn test_participants_must_exist() {
        let mut model = model();
        model.reactions.push(Reaction::new("empty"));
        model.reactions.push(Reaction::new("r").with_reactant("A").with_product("Z").with_modifier("Q"));
        let diagnostics = validate(2, 4, model);
        assert_eq!(fired(&diagnostics, 21101), vec![Some("empty".to_string())]);
        assert_eq!(fired(&diagnostics, 21111), vec![Some("Z".to_string())]);
        assert_eq!(fired(&diagnostics, 21117), vec![Some("Q".to_string())]);
    }

    #[test]
    fn test_stoichiometry_forms_are_exclusive() {
        let mut model = model();
        let mut sr = SpeciesReference::new("A");
        sr.stoichiometry = Some(2.0);
        sr.stoichiometry_math = Some(AstNode::int(2).into_math());
        let mut r = Reaction::new("r");
        r.reactants.push(sr);
        model.reactions.push(r);
        assert_eq!(count(&validate(2, 4, model), 21113), 1);
    }

    #[test]
    fn test_rate_law_species_must_be_listed() {
        let mut model = model();
        let rate = AstNode::apply(
            Operator::Times,
            vec![AstNode::name("k"), AstNode::name("A"), AstNode::name("E"), AstNode::name("B")],
        );
        let law = KineticLaw::new(rate.into_math()).with_parameter(Parameter::new("k").with_value(1.0));
        model
            .reactions
            .push(Reaction::new("r").with_reactant("A").with_modifier("E").with_kinetic_law(law));
        let diagnostics = validate(2, 4, model);
        assert_eq!(fired(&diagnostics, 21121), vec![Some("r".to_string())]);
    }
}
