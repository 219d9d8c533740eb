//! Unit definitions: reserved names, redefinitions of the built-in units,
//! and the validity of each unit term.
use super::expect_target;
use crate::model::UnitDefinition;
use crate::units::{is_reserved_unit_id, CompositeUnit, UnitKind, UnitTerm};
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};

const UNIT_DEFINITION: KindMask = KindMask::of(&[TargetKind::UnitDefinition]);

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::General;
    vec![
        RuleDescriptor::error(20401, General, UNIT_DEFINITION, "Unit definitions may not redefine base unit kinds", not_a_base_kind),
        RuleDescriptor::error(20402, General, UNIT_DEFINITION, "'substance' may only be redefined as an amount", redefined_substance)
            .when(super::before_level3),
        RuleDescriptor::error(20403, General, UNIT_DEFINITION, "'length' may only be redefined as a length", redefined_length)
            .when(super::before_level3),
        RuleDescriptor::error(20404, General, UNIT_DEFINITION, "'area' may only be redefined as an area", redefined_area)
            .when(super::before_level3),
        RuleDescriptor::error(20405, General, UNIT_DEFINITION, "'time' may only be redefined as a time", redefined_time)
            .when(super::before_level3),
        RuleDescriptor::error(20406, General, UNIT_DEFINITION, "'volume' may only be redefined as a volume", redefined_volume)
            .when(super::before_level3),
        RuleDescriptor::error(20409, General, UNIT_DEFINITION, "Unit definitions list at least one unit", has_units)
            .when(super::before_l3v2),
        RuleDescriptor::error(20410, General, UNIT_DEFINITION, "Unit kinds must be valid for the level", valid_kinds),
        RuleDescriptor::error(20411, General, UNIT_DEFINITION, "The offset attribute is no longer allowed", no_offset)
            .when(super::from_l2v2),
        RuleDescriptor::error(20412, General, UNIT_DEFINITION, "celsius is no longer a unit kind", no_celsius)
            .when(super::from_l2v2),
    ]
}

fn not_a_base_kind(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let ud = expect_target!(*target, Target::UnitDefinition(u) => u);
    if is_reserved_unit_id(&ud.id) {
        out.report(format!("'{}' is a base unit kind and cannot be used as a UnitDefinition identifier.", ud.id));
    }
    Ok(())
}

// --- Built-in redefinitions ---

const EXPONENT_EPSILON: f64 = 1e-9;

/// Whether the definition simplifies to dimensionless or to a single kind
/// and exponent among `accepted`. Unknown kinds never match.
fn simplifies_to(ud: &UnitDefinition, accepted: &[(&[UnitKind], f64)]) -> bool {
    if ud.units.is_empty() || ud.units.iter().any(|u| UnitKind::parse(&u.kind).is_none()) {
        return false;
    }
    let simplified = CompositeUnit::from_declared(&ud.units).simplify();
    let dimensional: Vec<&UnitTerm> =
        simplified.terms().iter().filter(|t| t.kind != UnitKind::Dimensionless).collect();
    match dimensional.as_slice() {
        [] => true,
        [term] => accepted.iter().any(|(kinds, exponent)| {
            kinds.contains(&term.kind) && (term.exponent - exponent).abs() < EXPONENT_EPSILON
        }),
        _ => false,
    }
}

/// Checks a redefinition of built-in unit `id` against the accepted forms.
fn check_redefinition(
    target: &Target,
    out: &mut Findings,
    id: &str,
    accepted: &[(&[UnitKind], f64)],
    described: &str,
) -> Result<(), RuleFault> {
    let ud = expect_target!(*target, Target::UnitDefinition(u) => u);
    if ud.id != id {
        return Ok(());
    }
    if !simplifies_to(ud, accepted) {
        out.report(format!("The built-in unit '{}' may only be redefined as {} or dimensionless.", id, described));
    }
    Ok(())
}

fn redefined_substance(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let kinds = [UnitKind::Mole, UnitKind::Item, UnitKind::Gram, UnitKind::Kilogram];
    check_redefinition(target, out, "substance", &[(&kinds[..], 1.0)], "mole, item, gram or kilogram")
}

fn redefined_length(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_redefinition(target, out, "length", &[(&[UnitKind::Metre][..], 1.0)], "metre")
}

fn redefined_area(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_redefinition(target, out, "area", &[(&[UnitKind::Metre][..], 2.0)], "metre^2")
}

fn redefined_time(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_redefinition(target, out, "time", &[(&[UnitKind::Second][..], 1.0)], "second")
}

fn redefined_volume(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_redefinition(
        target,
        out,
        "volume",
        &[(&[UnitKind::Litre][..], 1.0), (&[UnitKind::Metre][..], 3.0)],
        "litre or metre^3",
    )
}

// --- Unit terms ---

fn has_units(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let ud = expect_target!(*target, Target::UnitDefinition(u) => u);
    if ud.units.is_empty() {
        out.report(format!("UnitDefinition '{}' does not list any units.", ud.id));
    }
    Ok(())
}

fn valid_kinds(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let ud = expect_target!(*target, Target::UnitDefinition(u) => u);
    for unit in &ud.units {
        // celsius has a rule of its own
        if unit.kind == "celsius" {
            continue;
        }
        if !UnitKind::is_valid_name(&unit.kind, ctx.level(), ctx.version()) {
            out.report_on(
                "Unit",
                Some(ud.id.as_str()),
                unit.base.location.or(ud.base.location),
                format!(
                    "'{}' in UnitDefinition '{}' is not a unit kind of level {} version {}.",
                    unit.kind,
                    ud.id,
                    ctx.level(),
                    ctx.version()
                ),
            );
        }
    }
    Ok(())
}

fn no_offset(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let ud = expect_target!(*target, Target::UnitDefinition(u) => u);
    for unit in ud.units.iter().filter(|u| u.offset != 0.0) {
        out.report_on(
            "Unit",
            Some(ud.id.as_str()),
            unit.base.location.or(ud.base.location),
            format!(
                "The unit '{}' in UnitDefinition '{}' sets an offset of {}, which this level does not support.",
                unit.kind, ud.id, unit.offset
            ),
        );
    }
    Ok(())
}

fn no_celsius(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let ud = expect_target!(*target, Target::UnitDefinition(u) => u);
    if ud.units.iter().any(|u| u.kind == "celsius") {
        out.report(format!("UnitDefinition '{}' uses celsius; use kelvin instead.", ud.id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{count, fired, validate};
    use crate::model::*;
    use rstest::rstest;

    fn model_with(ud: UnitDefinition) -> Model {
        let mut model = Model::new("m");
        model.unit_definitions.push(ud);
        model
    }

    #[rstest]
    #[case("substance", vec![Unit::new("mole", 1.0)], 20402, 0)]
    #[case("substance", vec![Unit::new("gram", 1.0)], 20402, 0)]
    #[case("substance", vec![Unit::new("second", 1.0)], 20402, 1)]
    #[case("length", vec![Unit::new("metre", 2.0)], 20403, 1)]
    #[case("area", vec![Unit::new("metre", 2.0)], 20404, 0)]
    #[case("time", vec![Unit::new("dimensionless", 1.0)], 20405, 0)]
    #[case("time", vec![Unit::new("second", 1.0), Unit::new("metre", 1.0)], 20405, 1)]
    #[case("volume", vec![Unit::new("metre", 3.0)], 20406, 0)]
    #[case("volume", vec![Unit::new("metre", 2.0)], 20406, 1)]
    #[case("volume", vec![Unit::new("metre", 1.0), Unit::new("metre", 2.0)], 20406, 0)]
    #[case("volume", vec![Unit::new("litre", 1.0), Unit::scaled("dimensionless", 1.0, 3)], 20406, 0)]
    #[case("area", vec![Unit::new("metre", 3.0), Unit::new("metre", -1.0)], 20404, 0)]
    #[case("time", vec![Unit::new("second", 2.0), Unit::new("second", -1.0), Unit::new("metre", 1.0)], 20405, 1)]
    fn test_builtin_redefinitions(
        #[case] id: &str,
        #[case] units: Vec<Unit>,
        #[case] rule_id: u32,
        #[case] expected: usize,
    ) {
        let diagnostics = validate(2, 4, model_with(UnitDefinition::new(id, units)));
        assert_eq!(count(&diagnostics, rule_id), expected, "{:?}", diagnostics);
    }

    #[test]
    fn test_redefinitions_are_unrestricted_in_level3() {
        let diagnostics = validate(3, 1, model_with(UnitDefinition::new("time", vec![Unit::new("metre", 1.0)])));
        assert_eq!(count(&diagnostics, 20405), 0);
    }

    #[test]
    fn test_reserved_and_empty_definitions() {
        let mut model = model_with(UnitDefinition::new("mole", vec![Unit::new("item", 1.0)]));
        model.unit_definitions.push(UnitDefinition::new("nothing", vec![]));
        let diagnostics = validate(2, 4, model);
        assert_eq!(fired(&diagnostics, 20401), vec![Some("mole".to_string())]);
        assert_eq!(fired(&diagnostics, 20409), vec![Some("nothing".to_string())]);
    }

    #[test]
    fn test_each_invalid_kind_is_reported() {
        let ud = UnitDefinition::new(
            "odd",
            vec![Unit::new("furlong", 1.0), Unit::new("meter", 1.0), Unit::new("celsius", 1.0)],
        );
        let diagnostics = validate(2, 4, model_with(ud));
        assert_eq!(count(&diagnostics, 20410), 2);
        assert_eq!(count(&diagnostics, 20412), 1);
    }

    #[test]
    fn test_offset_only_rejected_from_l2v2() {
        let mut unit = Unit::new("kelvin", 1.0);
        unit.offset = 273.15;
        let model = model_with(UnitDefinition::new("warm", vec![unit]));
        assert_eq!(count(&validate(2, 1, model.clone()), 20411), 0);
        assert_eq!(count(&validate(2, 4, model), 20411), 1);
    }

    #[test]
    fn test_each_offset_unit_is_reported() {
        let mut metre = Unit::new("metre", 1.0);
        metre.offset = 1.0;
        let mut second = Unit::new("second", 1.0);
        second.offset = 2.0;
        let ud = UnitDefinition::new("odd", vec![metre, second, Unit::new("mole", 1.0)]);
        let diagnostics = validate(2, 4, model_with(ud));
        assert_eq!(fired(&diagnostics, 20411), vec![Some("odd".to_string()), Some("odd".to_string())]);
    }
}
