//! Event structure and what event assignments may set.
use super::{assignable, assignable_kinds, expect_target, is_constant_symbol};
use crate::units::{CompositeUnit, UnitKind};
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};

const EVENT: KindMask = KindMask::of(&[TargetKind::Event]);
const EVENT_ASSIGNMENT: KindMask = KindMask::of(&[TargetKind::EventAssignment]);

fn has_time_units_attribute(ctx: &ValidationContext<'_>) -> bool {
    ctx.level() == 2 && ctx.version() <= 2
}

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::General;
    vec![
        RuleDescriptor::error(21201, General, EVENT, "Events have a trigger", has_trigger),
        RuleDescriptor::error(21203, General, EVENT, "Events have at least one assignment", has_assignments)
            .when(super::before_level3),
        RuleDescriptor::error(21204, General, EVENT, "Event time units are units of time", time_units)
            .when(has_time_units_attribute),
        RuleDescriptor::error(21211, General, EVENT_ASSIGNMENT, "Event assignments set a compartment, species or parameter", assignment_variable),
        RuleDescriptor::error(21212, General, EVENT_ASSIGNMENT, "Event assignments cannot set constants", assignment_constant),
    ]
}

fn describe(id: Option<&str>) -> String {
    match id {
        Some(id) => format!("Event '{}'", id),
        None => "An unnamed event".to_string(),
    }
}

fn has_trigger(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let event = expect_target!(*target, Target::Event(e) => e);
    if event.trigger.as_ref().and_then(|t| t.math.as_ref()).is_none() {
        out.report(format!("{} has no trigger.", describe(event.id.as_deref())));
    }
    Ok(())
}

fn has_assignments(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let event = expect_target!(*target, Target::Event(e) => e);
    if event.assignments.is_empty() {
        out.report(format!("{} has no event assignments.", describe(event.id.as_deref())));
    }
    Ok(())
}

fn time_units(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let event = expect_target!(*target, Target::Event(e) => e);
    let Some(units) = event.time_units.as_deref() else { return Ok(()) };
    let second = CompositeUnit::from_kind(UnitKind::Second);
    let ok = ctx.deriver().resolve(units).map_or(false, |u| u.is_dimensionless() || u.equivalent(&second));
    if !ok {
        out.report(format!(
            "{} uses timeUnits '{}', which are not units of time.",
            describe(event.id.as_deref()),
            units
        ));
    }
    Ok(())
}

fn assignment_variable(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let assignment = expect_target!(*target, Target::EventAssignment { assignment, .. } => assignment);
    if assignable(ctx, &assignment.variable).is_none() {
        out.report(format!(
            "The event assignment variable '{}' is not the identifier of a {}.",
            assignment.variable,
            assignable_kinds(ctx)
        ));
    }
    Ok(())
}

fn assignment_constant(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let assignment = expect_target!(*target, Target::EventAssignment { assignment, .. } => assignment);
    let Some(symbol) = assignable(ctx, &assignment.variable) else { return Ok(()) };
    if is_constant_symbol(ctx, &symbol) {
        out.report(format!(
            "{} '{}' is constant and cannot be changed by an event.",
            symbol.kind_label(),
            assignment.variable
        ));
    }
    Ok(())
}
