//! Compartment attributes: dimensionality, nesting and units.
use super::expect_target;
use crate::model::Compartment;
use crate::units::{CompositeUnit, UnitKind};
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};

const COMPARTMENT: KindMask = KindMask::of(&[TargetKind::Compartment]);

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::General;
    vec![
        RuleDescriptor::error(20501, General, COMPARTMENT, "Zero-dimensional compartments have no size", dimensionless_size)
            .when(super::before_level3),
        RuleDescriptor::error(20502, General, COMPARTMENT, "Zero-dimensional compartments have no units", dimensionless_units)
            .when(super::before_level3),
        RuleDescriptor::error(20503, General, COMPARTMENT, "Zero-dimensional compartments are constant", dimensionless_constant)
            .when(super::before_level3),
        RuleDescriptor::error(20504, General, COMPARTMENT, "outside must name a compartment", outside_resolves),
        RuleDescriptor::error(20505, General, COMPARTMENT, "A zero-dimensional compartment sits inside another", outside_dimensionality)
            .when(super::before_level3),
        RuleDescriptor::error(20507, General, COMPARTMENT, "One-dimensional compartments use length units", one_dimensional_units),
        RuleDescriptor::error(20508, General, COMPARTMENT, "Two-dimensional compartments use area units", two_dimensional_units),
        RuleDescriptor::error(20509, General, COMPARTMENT, "Three-dimensional compartments use volume units", three_dimensional_units),
        RuleDescriptor::error(20510, General, COMPARTMENT, "compartmentType must name a compartment type", compartment_type_resolves)
            .when(super::from_l2v2),
    ]
}

fn is_zero_dimensional(ctx: &ValidationContext, c: &Compartment) -> bool {
    c.dimensions(ctx.level()) == Some(0.0)
}

fn dimensionless_size(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let c = expect_target!(*target, Target::Compartment(c) => c);
    if is_zero_dimensional(ctx, c) && c.size.is_some() {
        out.report(format!("Compartment '{}' has spatialDimensions 0 and must not set a size.", c.id));
    }
    Ok(())
}

fn dimensionless_units(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let c = expect_target!(*target, Target::Compartment(c) => c);
    if is_zero_dimensional(ctx, c) && c.units.is_some() {
        out.report(format!("Compartment '{}' has spatialDimensions 0 and must not set units.", c.id));
    }
    Ok(())
}

fn dimensionless_constant(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let c = expect_target!(*target, Target::Compartment(c) => c);
    if is_zero_dimensional(ctx, c) && !c.is_constant(ctx.level()) {
        out.report(format!("Compartment '{}' has spatialDimensions 0 and must be constant.", c.id));
    }
    Ok(())
}

fn outside_resolves(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let c = expect_target!(*target, Target::Compartment(c) => c);
    if let Some(outside) = c.outside.as_deref() {
        if ctx.index.compartment(outside).is_none() {
            out.report(format!("The outside attribute of compartment '{}' refers to '{}', which is not a compartment.", c.id, outside));
        }
    }
    Ok(())
}

fn outside_dimensionality(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let c = expect_target!(*target, Target::Compartment(c) => c);
    if !is_zero_dimensional(ctx, c) {
        return Ok(());
    }
    let Some(outer) = c.outside.as_deref().and_then(|o| ctx.index.compartment(o)) else { return Ok(()) };
    if !is_zero_dimensional(ctx, outer) {
        out.report(format!(
            "Compartment '{}' has spatialDimensions 0 but is inside '{}', which does not.",
            c.id, outer.id
        ));
    }
    Ok(())
}

// --- Units by dimensionality ---

fn check_size_units(
    ctx: &ValidationContext,
    target: &Target,
    out: &mut Findings,
    dims: f64,
    expected: CompositeUnit,
    described: &str,
) -> Result<(), RuleFault> {
    let c = expect_target!(*target, Target::Compartment(c) => c);
    if c.dimensions(ctx.level()) != Some(dims) {
        return Ok(());
    }
    let Some(units) = c.units.as_deref() else { return Ok(()) };
    let acceptable = ctx
        .deriver()
        .resolve(units)
        .map_or(false, |u| u.is_dimensionless() || u.equivalent(&expected));
    if !acceptable {
        out.report(format!(
            "Compartment '{}' has spatialDimensions {} so its units must be {} or dimensionless, not '{}'.",
            c.id, dims, described, units
        ));
    }
    Ok(())
}

fn one_dimensional_units(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_size_units(ctx, target, out, 1.0, CompositeUnit::from_kind(UnitKind::Metre), "a length")
}

fn two_dimensional_units(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_size_units(ctx, target, out, 2.0, CompositeUnit::from_kind(UnitKind::Metre).pow(2.0), "an area")
}

fn three_dimensional_units(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_size_units(ctx, target, out, 3.0, CompositeUnit::from_kind(UnitKind::Litre), "a volume")
}

fn compartment_type_resolves(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let c = expect_target!(*target, Target::Compartment(c) => c);
    if let Some(ct) = c.compartment_type.as_deref() {
        if !ctx.index.is_compartment_type(ct) {
            out.report(format!("Compartment '{}' refers to '{}', which is not a compartment type.", c.id, ct));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{count, fired, validate};
    use crate::model::*;
    use rstest::rstest;

    #[test]
    fn test_zero_dimensional_restrictions() {
        let mut model = Model::new("m");
        model.compartments.push(Compartment::new("outer").with_size(1.0));
        model.compartments.push(
            Compartment::new("point")
                .with_dimensions(0.0)
                .with_size(1.0)
                .with_units("litre")
                .with_constant(false)
                .with_outside("outer"),
        );
        let diagnostics = validate(2, 4, model);
        for id in [20501, 20502, 20503, 20505] {
            assert_eq!(fired(&diagnostics, id), vec![Some("point".to_string())], "rule {}", id);
        }
    }

    #[test]
    fn test_outside_must_exist() {
        let mut model = Model::new("m");
        model.compartments.push(Compartment::new("c").with_size(1.0).with_outside("ghost"));
        assert_eq!(count(&validate(2, 4, model), 20504), 1);
    }

    #[rstest]
    #[case(1.0, "metre", 20507, 0)]
    #[case(1.0, "second", 20507, 1)]
    #[case(2.0, "dimensionless", 20508, 0)]
    #[case(2.0, "litre", 20508, 1)]
    #[case(3.0, "volume", 20509, 0)]
    #[case(3.0, "cubic", 20509, 0)]
    #[case(3.0, "area", 20509, 1)]
    #[case(3.0, "undefined_units", 20509, 1)]
    fn test_units_match_dimensionality(
        #[case] dims: f64,
        #[case] units: &str,
        #[case] rule_id: u32,
        #[case] expected: usize,
    ) {
        let mut model = Model::new("m");
        model.unit_definitions.push(UnitDefinition::new("cubic", vec![Unit::new("metre", 3.0)]));
        model.compartments.push(Compartment::new("c").with_size(1.0).with_dimensions(dims).with_units(units));
        assert_eq!(count(&validate(2, 4, model), rule_id), expected);
    }

    #[test]
    fn test_compartment_type_reference() {
        let mut model = Model::new("m");
        let mut c = Compartment::new("c").with_size(1.0);
        c.compartment_type = Some("membrane".into());
        model.compartments.push(c);
        assert_eq!(count(&validate(2, 4, model.clone()), 20510), 1);
        model.compartment_types.push(CompartmentType { id: "membrane".into(), ..Default::default() });
        assert_eq!(count(&validate(2, 4, model), 20510), 0);
    }
}
