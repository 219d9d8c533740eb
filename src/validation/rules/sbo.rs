//! SBO term syntax and placement.
//!
//! Placement rules only judge terms the taxonomy knows about. An unknown
//! term may be valid in an ontology release newer than the taxonomy.
use super::expect_target;
use crate::sbo::{
    format_term, MATERIAL_ENTITY, MATHEMATICAL_EXPRESSION, MAX_TERM, MODELLING_FRAMEWORK, OCCURRING_ENTITY,
    PARTICIPANT_ROLE, QUANTITATIVE_PARAMETER, RATE_LAW,
};
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::Sbo;
    use TargetKind::*;
    let placement = |id, kinds: &[TargetKind], summary| {
        RuleDescriptor::warning(id, Sbo, KindMask::of(kinds), summary, check_placement).when(super::from_l2v2)
    };
    vec![
        RuleDescriptor::error(10308, Sbo, KindMask::of(&[Model]), "SBO terms are well-formed", term_syntax)
            .when(super::from_l2v2),
        placement(10701, &[Model], "Model SBO terms are occurring entities or modelling frameworks"),
        placement(10702, &[FunctionDefinition], "FunctionDefinition SBO terms are mathematical expressions"),
        placement(10703, &[Parameter, LocalParameter], "Parameter SBO terms are quantitative parameters"),
        placement(10704, &[InitialAssignment], "InitialAssignment SBO terms are mathematical expressions"),
        placement(10705, &[Rule], "Rule SBO terms are mathematical expressions"),
        placement(10706, &[Constraint], "Constraint SBO terms are mathematical expressions"),
        placement(10707, &[Reaction], "Reaction SBO terms are occurring entities"),
        placement(10708, &[SpeciesReference, Modifier], "SpeciesReference SBO terms are participant roles"),
        placement(10709, &[KineticLaw], "KineticLaw SBO terms are rate laws"),
        placement(10710, &[Event], "Event SBO terms are occurring entities"),
        placement(10711, &[EventAssignment], "EventAssignment SBO terms are mathematical expressions"),
        placement(10712, &[Compartment], "Compartment SBO terms are material entities"),
        placement(10713, &[Species], "Species SBO terms are material entities"),
        placement(10714, &[CompartmentType], "CompartmentType SBO terms are material entities"),
        placement(10715, &[SpeciesType], "SpeciesType SBO terms are material entities"),
        placement(10716, &[Trigger], "Trigger SBO terms are mathematical expressions"),
        placement(10717, &[Delay], "Delay SBO terms are mathematical expressions"),
    ]
}

fn term_syntax(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let model = expect_target!(*target, Target::Model(m) => m);
    for object in model.objects() {
        if let Some(term) = object.base.sbo_term.filter(|t| *t > MAX_TERM) {
            out.report_on(
                object.kind,
                object.id,
                object.base.location,
                format!("The sboTerm {} of this {} is not of the form SBO:nnnnnnn.", term, object.kind),
            );
        }
    }
    Ok(())
}

/// The SBO branches a term on this kind of object must fall under.
fn branches_for(kind: TargetKind) -> &'static [(u32, &'static str)] {
    match kind {
        TargetKind::Model => &[(OCCURRING_ENTITY, "occurring entity"), (MODELLING_FRAMEWORK, "modelling framework")],
        TargetKind::Parameter | TargetKind::LocalParameter => &[(QUANTITATIVE_PARAMETER, "quantitative parameter")],
        TargetKind::Reaction | TargetKind::Event => &[(OCCURRING_ENTITY, "occurring entity")],
        TargetKind::SpeciesReference | TargetKind::Modifier => &[(PARTICIPANT_ROLE, "participant role")],
        TargetKind::KineticLaw => &[(RATE_LAW, "rate law")],
        TargetKind::Compartment
        | TargetKind::Species
        | TargetKind::CompartmentType
        | TargetKind::SpeciesType => &[(MATERIAL_ENTITY, "material entity")],
        TargetKind::FunctionDefinition
        | TargetKind::InitialAssignment
        | TargetKind::Rule
        | TargetKind::Constraint
        | TargetKind::EventAssignment
        | TargetKind::Trigger
        | TargetKind::Delay => &[(MATHEMATICAL_EXPRESSION, "mathematical expression")],
        TargetKind::UnitDefinition | TargetKind::Priority => &[],
    }
}

fn check_placement(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let branches = branches_for(target.kind());
    let Some(term) = target.base().sbo_term else { return Ok(()) };
    if branches.is_empty() || term > MAX_TERM || !ctx.taxonomy.knows(term) {
        return Ok(());
    }
    if branches.iter().any(|(branch, _)| ctx.taxonomy.is_a(term, *branch)) {
        return Ok(());
    }
    let wanted: Vec<&str> = branches.iter().map(|(_, name)| *name).collect();
    out.report(format!(
        "The sboTerm {} of this {} is not a {}.",
        format_term(term),
        target.label(),
        wanted.join(" or ")
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{count, fired, validate};
    use crate::model::*;
    use rstest::rstest;

    fn tagged(term: u32) -> Base {
        Base { sbo_term: Some(term), ..Default::default() }
    }

    #[rstest]
    #[case(2, 0)]
    #[case(9, 0)]
    #[case(247, 1)]
    #[case(1_234_567, 0)]
    fn test_parameter_terms(#[case] term: u32, #[case] expected: usize) {
        let mut model = Model::new("m");
        let mut p = Parameter::new("k");
        p.base = tagged(term);
        model.parameters.push(p);
        assert_eq!(count(&validate(2, 4, model), 10703), expected);
    }

    #[test]
    fn test_placement_needs_l2v2() {
        let mut model = Model::new("m");
        let mut c = Compartment::new("c").with_size(1.0);
        c.base = tagged(crate::sbo::QUANTITATIVE_PARAMETER);
        model.compartments.push(c);
        assert_eq!(count(&validate(2, 1, model.clone()), 10712), 0);
        assert_eq!(fired(&validate(2, 4, model), 10712), vec![Some("c".to_string())]);
    }

    #[test]
    fn test_model_accepts_either_branch() {
        for (term, expected) in [(62, 0), (375, 0), (247, 1)] {
            let mut model = Model::new("m");
            model.base = tagged(term);
            assert_eq!(count(&validate(2, 4, model), 10701), expected, "term {}", term);
        }
    }

    #[test]
    fn test_malformed_terms() {
        let mut model = Model::new("m");
        let mut p = Parameter::new("k");
        p.base = tagged(12_345_678);
        model.parameters.push(p);
        let diagnostics = validate(2, 4, model);
        assert_eq!(fired(&diagnostics, 10308), vec![Some("k".to_string())]);
        assert_eq!(count(&diagnostics, 10703), 0);
    }
}
