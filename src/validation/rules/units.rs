//! Dimensional consistency of math.
//!
//! Every comparison here is skipped when either side has undeclared parts:
//! those cases are left to the advisory tier in `unit_warnings`.
use super::{assignable, report_first, require_math};
use crate::math::{inline_calls, AstNode, CsymbolKind, Operator};
use crate::model::{RuleKind, SymbolRef};
use crate::units::{CompositeUnit, DerivedUnit, UnitDeriver, UnitKind};
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};

/// Largest denominator tried when reading a fractional exponent as `n/m`.
const MAX_DENOMINATOR: i64 = 1000;
const FRACTION_EPSILON: f64 = 1e-9;

const RULE: KindMask = KindMask::of(&[TargetKind::Rule]);
const INITIAL_ASSIGNMENT: KindMask = KindMask::of(&[TargetKind::InitialAssignment]);
const EVENT_ASSIGNMENT: KindMask = KindMask::of(&[TargetKind::EventAssignment]);

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::Units;
    vec![
        RuleDescriptor::error(10501, Units, KindMask::EVALUATED_MATH, "Arguments of an operator have consistent units", argument_units),
        RuleDescriptor::error(10511, Units, RULE, "Assignment rules for compartments match its units", ar_compartment),
        RuleDescriptor::error(10512, Units, RULE, "Assignment rules for species match its units", ar_species),
        RuleDescriptor::error(10513, Units, RULE, "Assignment rules for parameters match its units", ar_parameter),
        RuleDescriptor::error(10514, Units, RULE, "Assignment rules for stoichiometries are dimensionless", ar_species_reference)
            .when(super::level3_plus),
        RuleDescriptor::error(10521, Units, INITIAL_ASSIGNMENT, "Initial assignments to compartments match its units", ia_compartment),
        RuleDescriptor::error(10522, Units, INITIAL_ASSIGNMENT, "Initial assignments to species match its units", ia_species),
        RuleDescriptor::error(10523, Units, INITIAL_ASSIGNMENT, "Initial assignments to parameters match its units", ia_parameter),
        RuleDescriptor::error(10524, Units, INITIAL_ASSIGNMENT, "Initial assignments to stoichiometries are dimensionless", ia_species_reference)
            .when(super::level3_plus),
        RuleDescriptor::error(10531, Units, RULE, "Rate rules for compartments are in compartment units per time", rr_compartment),
        RuleDescriptor::error(10532, Units, RULE, "Rate rules for species are in species units per time", rr_species),
        RuleDescriptor::error(10533, Units, RULE, "Rate rules for parameters are in parameter units per time", rr_parameter),
        RuleDescriptor::error(10541, Units, KindMask::of(&[TargetKind::KineticLaw]), "Kinetic laws are in substance per time", kinetic_law_units),
        RuleDescriptor::error(10551, Units, KindMask::of(&[TargetKind::Delay]), "Event delays are in time units", delay_units),
        RuleDescriptor::error(10561, Units, EVENT_ASSIGNMENT, "Event assignments to compartments match its units", ea_compartment),
        RuleDescriptor::error(10562, Units, EVENT_ASSIGNMENT, "Event assignments to species match its units", ea_species),
        RuleDescriptor::error(10563, Units, EVENT_ASSIGNMENT, "Event assignments to parameters match its units", ea_parameter),
    ]
}

// --- Argument consistency ---

/// The outcome of checking a `power` or `root` node.
pub(super) enum PowerCheck {
    Consistent,
    Inconsistent(String),
    /// The exponent is not a fixed number, so the result cannot be checked.
    Unchecked,
}

/// The smallest `m` such that `x * m` is an integer, if one exists up to
/// [`MAX_DENOMINATOR`].
fn denominator(x: f64) -> Option<i64> {
    (1..=MAX_DENOMINATOR).find(|&m| {
        let scaled = x * m as f64;
        (scaled - scaled.round()).abs() < FRACTION_EPSILON
    })
}

pub(super) fn check_power(deriver: &UnitDeriver, node: &AstNode) -> PowerCheck {
    let (base, exponent, is_root) = match (node.operator(), node.children.as_slice()) {
        (Some(Operator::Power), [base, exponent]) => (base, Some(exponent), false),
        (Some(Operator::Root), [radicand]) => (radicand, None, true),
        (Some(Operator::Root), [degree, radicand]) => (radicand, Some(degree), true),
        _ => return PowerCheck::Consistent,
    };

    if let Some(exponent) = exponent {
        let derived = deriver.derive(exponent);
        if !derived.undeclared && !derived.unit.is_dimensionless() {
            return PowerCheck::Inconsistent(format!(
                "The exponent '{}' in '{}' has units '{}' but must be dimensionless.",
                exponent, node, derived.unit
            ));
        }
    }

    let base_units = deriver.derive(base);
    if base_units.undeclared || base_units.unit.is_dimensionless() {
        return PowerCheck::Consistent;
    }
    let value = match exponent {
        Some(e) => deriver.static_value(e),
        None => Some(2.0),
    };
    let Some(value) = value else { return PowerCheck::Unchecked };
    let power = match (is_root, value) {
        (true, v) if v == 0.0 => return PowerCheck::Consistent,
        (true, v) => 1.0 / v,
        (false, v) => v,
    };
    match denominator(power) {
        Some(1) => PowerCheck::Consistent,
        Some(m) if base_units.unit.exponents_divisible_by(m) => PowerCheck::Consistent,
        _ => PowerCheck::Inconsistent(format!(
            "'{}' raises '{}' (units '{}') to a power that leaves a fractional unit exponent.",
            node, base, base_units.unit
        )),
    }
}

/// Units of a piecewise value. A bare number standing alone as a piece is a
/// dimensionless value rather than a placeholder for any unit.
fn piece_units(deriver: &UnitDeriver, piece: &AstNode) -> DerivedUnit {
    if piece.is_number() && piece.units.is_none() {
        return DerivedUnit::declared(CompositeUnit::dimensionless());
    }
    deriver.derive(piece)
}

/// The first declared argument whose units differ from the first declared one.
fn first_mismatch<'n>(
    args: impl Iterator<Item = &'n AstNode>,
    units_of: impl Fn(&AstNode) -> DerivedUnit,
) -> Option<(&'n AstNode, CompositeUnit, CompositeUnit)> {
    let mut reference: Option<CompositeUnit> = None;
    for arg in args {
        let derived = units_of(arg);
        if derived.undeclared {
            continue;
        }
        match &reference {
            None => reference = Some(derived.unit),
            Some(expected) if !derived.unit.equivalent(expected) => {
                return Some((arg, derived.unit, expected.clone()));
            }
            Some(_) => {}
        }
    }
    None
}

fn argument_problem(deriver: &UnitDeriver, node: &AstNode) -> Option<String> {
    if node.csymbol_kind() == Some(CsymbolKind::Delay) {
        let delay = node.children.get(1)?;
        let derived = deriver.derive(delay);
        let time = deriver.time_units().unwrap_or_else(|| CompositeUnit::from_kind(UnitKind::Second));
        if derived.undeclared || derived.unit.equivalent(&time) {
            return None;
        }
        return Some(format!(
            "The delay '{}' in '{}' has units '{}' but must be in units of time.",
            delay, node, derived.unit
        ));
    }

    let op = node.operator()?;
    match op {
        Operator::Plus | Operator::Minus | Operator::Eq | Operator::Neq | Operator::Gt | Operator::Lt
        | Operator::Geq | Operator::Leq => {
            let (arg, found, expected) = first_mismatch(node.children.iter(), |arg| deriver.derive(arg))?;
            Some(format!(
                "The arguments of '{}' in '{}' must have the same units, but '{}' has units '{}' where '{}' was expected.",
                op.name(),
                node,
                arg,
                found,
                expected
            ))
        }
        Operator::Piecewise => {
            let pieces = node.children.iter().step_by(2);
            if let Some((piece, found, expected)) = first_mismatch(pieces, |piece| piece_units(deriver, piece)) {
                return Some(format!(
                    "The pieces of '{}' must have the same units, but '{}' has units '{}' where '{}' was expected.",
                    node, piece, found, expected
                ));
            }
            let conditions = node.children.iter().skip(1).step_by(2).take(node.children.len() / 2);
            for condition in conditions {
                let derived = deriver.derive(condition);
                if !derived.undeclared && !derived.unit.is_dimensionless() {
                    return Some(format!(
                        "The condition '{}' in '{}' has units '{}' but must be dimensionless.",
                        condition, node, derived.unit
                    ));
                }
            }
            None
        }
        Operator::Power | Operator::Root => match check_power(deriver, node) {
            PowerCheck::Inconsistent(message) => Some(message),
            PowerCheck::Consistent | PowerCheck::Unchecked => None,
        },
        _ => None,
    }
}

fn argument_units<'a>(ctx: &ValidationContext<'a>, target: &Target<'a>, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    let deriver = ctx.deriver_for(target);
    let inlined = inline_calls(&math, &ctx.index);
    report_first(&inlined, out, |node| argument_problem(&deriver, node));
    Ok(())
}

// --- Assigned variables ---

/// What sets the variable whose units are being compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Setter {
    AssignmentRule,
    RateRule,
    InitialAssignment,
    EventAssignment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Variable {
    Compartment,
    Species,
    Parameter,
    SpeciesReference,
}

fn assigned_variable<'a>(target: &Target<'a>, setter: Setter) -> Option<&'a str> {
    match (setter, *target) {
        (Setter::AssignmentRule, Target::Rule { rule, .. }) if rule.kind == RuleKind::Assignment => rule.target(),
        (Setter::RateRule, Target::Rule { rule, .. }) if rule.kind == RuleKind::Rate => rule.target(),
        (Setter::InitialAssignment, Target::InitialAssignment(ia)) => Some(ia.symbol.as_str()),
        (Setter::EventAssignment, Target::EventAssignment { assignment, .. }) => Some(assignment.variable.as_str()),
        _ => None,
    }
}

fn check_variable_units<'a>(
    ctx: &ValidationContext<'a>,
    target: &Target<'a>,
    out: &mut Findings,
    setter: Setter,
    wanted: Variable,
) -> Result<(), RuleFault> {
    let Some(id) = assigned_variable(target, setter) else { return Ok(()) };
    let Some(symbol) = assignable(ctx, id) else { return Ok(()) };
    let deriver = ctx.deriver_for(target);
    let (variable, units) = match symbol {
        SymbolRef::Compartment(c) => (Variable::Compartment, deriver.compartment_units(c)),
        SymbolRef::Species(s) => (Variable::Species, deriver.species_units(s)),
        SymbolRef::Parameter(p) => (Variable::Parameter, deriver.parameter_units(p)),
        SymbolRef::SpeciesReference { .. } => (Variable::SpeciesReference, Some(CompositeUnit::dimensionless())),
        _ => return Ok(()),
    };
    if variable != wanted {
        return Ok(());
    }
    let Some(mut expected) = units else { return Ok(()) };
    if setter == Setter::RateRule {
        let Some(time) = deriver.time_units() else { return Ok(()) };
        expected = expected.divide(&time);
    }

    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    let derived = deriver.derive(&math);
    if derived.undeclared || derived.unit.equivalent(&expected) {
        return Ok(());
    }
    out.report(format!(
        "The {} for {} '{}' has units '{}', but '{}' are expected.",
        target.label(),
        symbol.kind_label(),
        id,
        derived.unit,
        expected
    ));
    Ok(())
}

macro_rules! variable_checks {
    ($($name:ident => $setter:ident, $variable:ident;)*) => {
        $(
            fn $name<'a>(ctx: &ValidationContext<'a>, target: &Target<'a>, out: &mut Findings) -> Result<(), RuleFault> {
                check_variable_units(ctx, target, out, Setter::$setter, Variable::$variable)
            }
        )*
    };
}

variable_checks! {
    ar_compartment => AssignmentRule, Compartment;
    ar_species => AssignmentRule, Species;
    ar_parameter => AssignmentRule, Parameter;
    ar_species_reference => AssignmentRule, SpeciesReference;
    ia_compartment => InitialAssignment, Compartment;
    ia_species => InitialAssignment, Species;
    ia_parameter => InitialAssignment, Parameter;
    ia_species_reference => InitialAssignment, SpeciesReference;
    rr_compartment => RateRule, Compartment;
    rr_species => RateRule, Species;
    rr_parameter => RateRule, Parameter;
    ea_compartment => EventAssignment, Compartment;
    ea_species => EventAssignment, Species;
    ea_parameter => EventAssignment, Parameter;
}

// --- Kinetic laws and delays ---

fn kinetic_law_units<'a>(ctx: &ValidationContext<'a>, target: &Target<'a>, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    let deriver = ctx.deriver_for(target);
    let Some(expected) = deriver.reaction_rate_units() else { return Ok(()) };
    let derived = deriver.derive(&math);
    if derived.undeclared || derived.unit.identical(&expected) {
        return Ok(());
    }
    out.report(format!(
        "The kinetic law of reaction '{}' has units '{}', but '{}' are expected.",
        target.entity_id().unwrap_or_default(),
        derived.unit,
        expected
    ));
    Ok(())
}

fn delay_units<'a>(ctx: &ValidationContext<'a>, target: &Target<'a>, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    let deriver = ctx.deriver();
    let Some(time) = deriver.time_units() else { return Ok(()) };
    let derived = deriver.derive(&math);
    if derived.undeclared || derived.unit.equivalent(&time) {
        return Ok(());
    }
    out.report(format!("The delay '{}' has units '{}' but must be in units of time.", *math, derived.unit));
    Ok(())
}
