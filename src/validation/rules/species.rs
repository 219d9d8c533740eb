//! Species attributes and how species may take part in reactions and rules.
use super::expect_target;
use crate::model::{RuleKind, Species, SymbolRef};
use crate::units::{CompositeUnit, UnitKind};
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};

const SPECIES: KindMask = KindMask::of(&[TargetKind::Species]);

fn l2_before_v3(ctx: &ValidationContext<'_>) -> bool {
    ctx.level() == 2 && ctx.version() < 3
}

fn from_l2v3(ctx: &ValidationContext<'_>) -> bool {
    ctx.is_at_least(2, 3)
}

fn has_species_types(ctx: &ValidationContext<'_>) -> bool {
    ctx.level() == 2 && ctx.version() >= 2
}

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::General;
    vec![
        RuleDescriptor::error(20601, General, SPECIES, "A species' compartment must exist", compartment_resolves),
        RuleDescriptor::error(20602, General, SPECIES, "Amount-only species have no spatial size units", only_substance_with_size_units)
            .when(l2_before_v3),
        RuleDescriptor::error(20603, General, SPECIES, "Species in zero-dimensional compartments have no spatial size units", point_size_units)
            .when(l2_before_v3),
        RuleDescriptor::error(20604, General, SPECIES, "Species in zero-dimensional compartments have no concentration", point_concentration)
            .when(super::before_level3),
        RuleDescriptor::error(20605, General, SPECIES, "Spatial size units in one dimension are lengths", size_units_length)
            .when(l2_before_v3),
        RuleDescriptor::error(20606, General, SPECIES, "Spatial size units in two dimensions are areas", size_units_area)
            .when(l2_before_v3),
        RuleDescriptor::error(20607, General, SPECIES, "Spatial size units in three dimensions are volumes", size_units_volume)
            .when(l2_before_v3),
        RuleDescriptor::error(20608, General, SPECIES, "Substance units are amounts", substance_units_kind),
        RuleDescriptor::error(20609, General, SPECIES, "A species has an initial amount or concentration, not both", single_initial_value),
        RuleDescriptor::error(20610, General, SPECIES, "Reacting species set by rules must be boundary species", reacting_rule_target),
        RuleDescriptor::error(20611, General, SPECIES, "Constant non-boundary species cannot react", constant_reactant)
            .when(super::level2_plus),
        RuleDescriptor::error(20612, General, SPECIES, "speciesType must name a species type", species_type_resolves)
            .when(has_species_types),
        RuleDescriptor::error(20613, General, SPECIES, "One species of each type per compartment", unique_type_per_compartment)
            .when(has_species_types),
        RuleDescriptor::error(20614, General, SPECIES, "A species must name its compartment", compartment_required)
            .when(super::level3_plus),
        RuleDescriptor::error(20615, General, SPECIES, "spatialSizeUnits is no longer supported", no_spatial_size_units)
            .when(from_l2v3),
        RuleDescriptor::error(20616, General, SPECIES, "Species substance units must be known", substance_units_known)
            .when(super::level3_plus),
        RuleDescriptor::error(20617, General, SPECIES, "A species' conversion factor is a constant parameter", conversion_factor)
            .when(super::level3_plus),
    ]
}

fn compartment_dimensions(ctx: &ValidationContext, s: &Species) -> Option<f64> {
    let c = ctx.index.compartment(s.compartment.as_deref()?)?;
    c.dimensions(ctx.level())
}

fn compartment_resolves(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if let Some(c) = s.compartment.as_deref() {
        if ctx.index.compartment(c).is_none() {
            out.report(format!("Species '{}' is placed in '{}', which is not a compartment.", s.id, c));
        }
    }
    Ok(())
}

fn only_substance_with_size_units(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if s.only_substance_units() && s.spatial_size_units.is_some() {
        out.report(format!("Species '{}' has only substance units and must not set spatialSizeUnits.", s.id));
    }
    Ok(())
}

fn point_size_units(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if compartment_dimensions(ctx, s) == Some(0.0) && s.spatial_size_units.is_some() {
        out.report(format!("Species '{}' is in a zero-dimensional compartment and must not set spatialSizeUnits.", s.id));
    }
    Ok(())
}

fn point_concentration(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if compartment_dimensions(ctx, s) == Some(0.0) && s.initial_concentration.is_some() {
        out.report(format!(
            "Species '{}' is in a zero-dimensional compartment and cannot have an initial concentration.",
            s.id
        ));
    }
    Ok(())
}

fn check_size_units(
    ctx: &ValidationContext,
    target: &Target,
    out: &mut Findings,
    dims: f64,
    expected: CompositeUnit,
    described: &str,
) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    let Some(units) = s.spatial_size_units.as_deref() else { return Ok(()) };
    if compartment_dimensions(ctx, s) != Some(dims) {
        return Ok(());
    }
    let acceptable = ctx
        .deriver()
        .resolve(units)
        .map_or(false, |u| u.is_dimensionless() || u.equivalent(&expected));
    if !acceptable {
        out.report(format!(
            "The spatialSizeUnits '{}' of species '{}' must be {} or dimensionless to match its compartment.",
            units, s.id, described
        ));
    }
    Ok(())
}

fn size_units_length(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_size_units(ctx, target, out, 1.0, CompositeUnit::from_kind(UnitKind::Metre), "a length")
}

fn size_units_area(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_size_units(ctx, target, out, 2.0, CompositeUnit::from_kind(UnitKind::Metre).pow(2.0), "an area")
}

fn size_units_volume(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    check_size_units(ctx, target, out, 3.0, CompositeUnit::from_kind(UnitKind::Litre), "a volume")
}

fn is_amount(unit: &CompositeUnit) -> bool {
    unit.is_dimensionless()
        || [UnitKind::Mole, UnitKind::Item, UnitKind::Kilogram]
            .into_iter()
            .any(|k| unit.equivalent(&CompositeUnit::from_kind(k)))
}

fn substance_units_kind(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    let Some(units) = s.substance_units.as_deref() else { return Ok(()) };
    // In level 3 any units may stand for an amount.
    if ctx.level() >= 3 && ctx.deriver().resolve(units).is_some() {
        return Ok(());
    }
    if !ctx.deriver().resolve(units).map_or(false, |u| is_amount(&u)) {
        out.report(format!(
            "The substanceUnits '{}' of species '{}' must be an amount: mole, item, gram, kilogram or dimensionless.",
            units, s.id
        ));
    }
    Ok(())
}

fn single_initial_value(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if s.initial_amount.is_some() && s.initial_concentration.is_some() {
        out.report(format!("Species '{}' sets both initialAmount and initialConcentration.", s.id));
    }
    Ok(())
}

fn reacts(ctx: &ValidationContext, s: &Species) -> bool {
    ctx.model.reactions.iter().any(|r| r.involves_species(&s.id))
}

fn reacting_rule_target(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if s.is_boundary() || s.is_constant() || !reacts(ctx, s) {
        return Ok(());
    }
    let rule = ctx
        .model
        .rules
        .iter()
        .find(|r| r.kind != RuleKind::Algebraic && r.target() == Some(s.id.as_str()));
    if let Some(rule) = rule {
        out.report(format!(
            "Species '{}' takes part in a reaction and is also set by an {}; it must be a boundary species.",
            s.id,
            rule.kind.label()
        ));
    }
    Ok(())
}

fn constant_reactant(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if s.is_constant() && !s.is_boundary() && reacts(ctx, s) {
        out.report(format!(
            "Species '{}' is constant and not a boundary species, so it cannot be a reactant or product.",
            s.id
        ));
    }
    Ok(())
}

fn species_type_resolves(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if let Some(st) = s.species_type.as_deref() {
        if !ctx.index.is_species_type(st) {
            out.report(format!("Species '{}' refers to '{}', which is not a species type.", s.id, st));
        }
    }
    Ok(())
}

fn unique_type_per_compartment(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    let Some(st) = s.species_type.as_deref() else { return Ok(()) };
    let earlier = ctx
        .model
        .species
        .iter()
        .take_while(|other| !std::ptr::eq(*other, s))
        .find(|other| other.species_type.as_deref() == Some(st) && other.compartment == s.compartment);
    if let Some(other) = earlier {
        out.report(format!(
            "Species '{}' and '{}' share species type '{}' in the same compartment.",
            other.id, s.id, st
        ));
    }
    Ok(())
}

fn compartment_required(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if s.compartment.is_none() {
        out.report(format!("Species '{}' does not name a compartment.", s.id));
    }
    Ok(())
}

fn no_spatial_size_units(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if s.spatial_size_units.is_some() {
        out.report(format!("Species '{}' sets spatialSizeUnits, which this level does not support.", s.id));
    }
    Ok(())
}

fn substance_units_known(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if s.substance_units.is_none() && ctx.model.substance_units.is_none() {
        out.report(format!(
            "Species '{}' has no substanceUnits and the model declares no default substance units.",
            s.id
        ));
    }
    Ok(())
}

/// Level 3 conversion factors name a constant parameter.
pub(crate) fn check_conversion_factor(ctx: &ValidationContext, owner: &str, factor: &str) -> Option<String> {
    match ctx.index.symbol(factor) {
        Some(SymbolRef::Parameter(p)) if p.is_constant(ctx.level()) => None,
        Some(SymbolRef::Parameter(_)) => Some(format!(
            "The conversionFactor '{}' of '{}' must be a constant parameter.",
            factor, owner
        )),
        _ => Some(format!("The conversionFactor '{}' of '{}' is not a parameter.", factor, owner)),
    }
}

fn conversion_factor(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let s = expect_target!(*target, Target::Species(s) => s);
    if let Some(message) = s.conversion_factor.as_deref().and_then(|f| check_conversion_factor(ctx, &s.id, f)) {
        out.report(message);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{count, fired, validate};
    use crate::math::AstNode;
    use crate::model::*;
    use rstest::rstest;

    fn base_model() -> Model {
        let mut model = Model::new("m");
        model.compartments.push(Compartment::new("cell").with_size(1.0));
        model.compartments.push(Compartment::new("line").with_size(1.0).with_dimensions(1.0));
        model.compartments.push(Compartment::new("point").with_dimensions(0.0));
        model
    }

    #[test]
    fn test_compartment_references() {
        let mut model = base_model();
        model.species.push(Species::new("s", "nowhere").with_amount(1.0));
        let mut floating = Species::new("f", "cell");
        floating.compartment = None;
        model.species.push(floating);
        assert_eq!(fired(&validate(2, 4, model.clone()), 20601), vec![Some("s".to_string())]);
        assert_eq!(fired(&validate(3, 1, model), 20614), vec![Some("f".to_string())]);
    }

    #[test]
    fn test_zero_dimensional_compartment_restrictions() {
        let mut model = base_model();
        let mut s = Species::new("s", "point");
        s.initial_concentration = Some(1.0);
        s.spatial_size_units = Some("litre".into());
        model.species.push(s);
        let diagnostics = validate(2, 2, model);
        assert_eq!(count(&diagnostics, 20603), 1);
        assert_eq!(count(&diagnostics, 20604), 1);
    }

    #[rstest]
    #[case("cell", "litre", 20607, 0)]
    #[case("cell", "metre", 20607, 1)]
    #[case("line", "metre", 20605, 0)]
    #[case("line", "second", 20605, 1)]
    fn test_spatial_size_units(
        #[case] compartment: &str,
        #[case] units: &str,
        #[case] rule_id: u32,
        #[case] expected: usize,
    ) {
        let mut model = base_model();
        let mut s = Species::new("s", compartment).with_amount(1.0);
        s.spatial_size_units = Some(units.into());
        model.species.push(s);
        assert_eq!(count(&validate(2, 2, model.clone()), rule_id), expected);
        assert_eq!(count(&validate(2, 4, model), 20615), 1);
    }

    #[rstest]
    #[case("mole", 0)]
    #[case("gram", 0)]
    #[case("item", 0)]
    #[case("substance", 0)]
    #[case("second", 1)]
    fn test_substance_units_are_amounts(#[case] units: &str, #[case] expected: usize) {
        let mut model = base_model();
        model.species.push(Species::new("s", "cell").with_amount(1.0).with_substance_units(units));
        assert_eq!(count(&validate(2, 4, model), 20608), expected);
    }

    #[test]
    fn test_initial_values_and_reaction_roles() {
        let mut model = base_model();
        let mut both = Species::new("both", "cell").with_amount(1.0);
        both.initial_concentration = Some(1.0);
        model.species.push(both);
        model.species.push(Species::new("ruled", "cell").with_amount(1.0));
        model.species.push(Species::new("fixed", "cell").with_amount(1.0).with_constant(true));
        model.species.push(Species::new("edge", "cell").with_amount(1.0).with_constant(true).with_boundary(true));
        model.rules.push(Rule::assignment("ruled", AstNode::int(1).into_math()));
        model
            .reactions
            .push(Reaction::new("r").with_reactant("ruled").with_reactant("fixed").with_product("edge"));
        let diagnostics = validate(2, 4, model);
        assert_eq!(fired(&diagnostics, 20609), vec![Some("both".to_string())]);
        assert_eq!(fired(&diagnostics, 20610), vec![Some("ruled".to_string())]);
        assert_eq!(fired(&diagnostics, 20611), vec![Some("fixed".to_string())]);
    }

    #[test]
    fn test_species_types() {
        let mut model = base_model();
        model.species_types.push(SpeciesType { id: "protein".into(), ..Default::default() });
        for (id, st) in [("a", "protein"), ("b", "protein"), ("c", "lipid")] {
            let mut s = Species::new(id, "cell").with_amount(1.0);
            s.species_type = Some(st.into());
            model.species.push(s);
        }
        let diagnostics = validate(2, 4, model);
        assert_eq!(fired(&diagnostics, 20612), vec![Some("c".to_string())]);
        assert_eq!(fired(&diagnostics, 20613), vec![Some("b".to_string())]);
    }

    #[test]
    fn test_level3_units_and_conversion_factor() {
        let mut model = base_model();
        model.parameters.push(Parameter::new("varying").with_constant(false));
        let mut s = Species::new("s", "cell").with_amount(1.0);
        s.conversion_factor = Some("varying".into());
        model.species.push(s);
        let diagnostics = validate(3, 1, model.clone());
        assert_eq!(count(&diagnostics, 20616), 1);
        assert_eq!(count(&diagnostics, 20617), 1);

        model.substance_units = Some("mole".into());
        model.parameters[0].constant = Some(true);
        let diagnostics = validate(3, 1, model);
        assert_eq!(count(&diagnostics, 20616), 0);
        assert_eq!(count(&diagnostics, 20617), 0);
    }
}
