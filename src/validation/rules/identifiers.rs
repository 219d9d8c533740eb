//! Identifier syntax and uniqueness across the model's namespaces.
use super::{expect_target, is_valid_metaid, is_valid_sid};
use crate::model::RuleKind;
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};
use std::collections::HashMap;

const MODEL: KindMask = KindMask::of(&[TargetKind::Model]);

/// Kinds whose ids share the main SId namespace.
const SHARED_NAMESPACE: [&str; 10] = [
    "FunctionDefinition",
    "CompartmentType",
    "SpeciesType",
    "Compartment",
    "Species",
    "Parameter",
    "Reaction",
    "SpeciesReference",
    "ModifierSpeciesReference",
    "Event",
];

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::Identifier;
    vec![
        RuleDescriptor::error(10301, Identifier, MODEL, "Identifiers in the shared namespace must be unique", unique_sids),
        RuleDescriptor::error(10302, Identifier, MODEL, "Unit definition identifiers must be unique", unique_unit_ids),
        RuleDescriptor::error(
            10303,
            Identifier,
            KindMask::of(&[TargetKind::KineticLaw]),
            "Local parameter identifiers must be unique within a kinetic law",
            unique_local_parameters,
        ),
        RuleDescriptor::error(10304, Identifier, MODEL, "A variable may be the target of at most one rule", unique_rule_variables),
        RuleDescriptor::error(
            10305,
            Identifier,
            KindMask::of(&[TargetKind::Event]),
            "Event assignment variables must be unique within an event",
            unique_event_assignments,
        ),
        RuleDescriptor::error(
            10306,
            Identifier,
            KindMask::of(&[TargetKind::Event]),
            "An event may not assign a variable set by an assignment rule",
            event_vs_assignment_rule,
        )
        .when(super::level2_plus),
        RuleDescriptor::error(10307, Identifier, MODEL, "Metaids must be unique", unique_metaids).when(super::level2_plus),
        RuleDescriptor::error(10309, Identifier, MODEL, "Metaids must be XML names", metaid_syntax).when(super::level2_plus),
        RuleDescriptor::error(10310, Identifier, MODEL, "Identifiers must follow the SId syntax", sid_syntax),
        RuleDescriptor::error(
            10311,
            Identifier,
            KindMask::of(&[TargetKind::UnitDefinition]),
            "Unit definition identifiers must follow the UnitSId syntax",
            unit_sid_syntax,
        ),
    ]
}

fn unique_sids(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let model = expect_target!(*target, Target::Model(m) => m);
    let mut owners: HashMap<&str, &'static str> = HashMap::new();
    for object in model.objects() {
        if !SHARED_NAMESPACE.contains(&object.kind) {
            continue;
        }
        // Species references only joined the namespace in level 2 version 2.
        if object.kind.ends_with("SpeciesReference") && !ctx.is_at_least(2, 2) {
            continue;
        }
        let Some(id) = object.id else { continue };
        match owners.get(id) {
            Some(first) => out.report_on(
                object.kind,
                Some(id),
                object.base.location,
                format!("The identifier '{}' of this {} is already used by a {} declared earlier.", id, object.kind, first),
            ),
            None => {
                owners.insert(id, object.kind);
            }
        }
    }
    Ok(())
}

fn unique_unit_ids(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let model = expect_target!(*target, Target::Model(m) => m);
    let mut seen = Vec::new();
    for ud in &model.unit_definitions {
        if seen.contains(&ud.id.as_str()) {
            out.report_on(
                "UnitDefinition",
                Some(ud.id.as_str()),
                ud.base.location,
                format!("The UnitDefinition identifier '{}' is already used.", ud.id),
            );
        } else {
            seen.push(ud.id.as_str());
        }
    }
    Ok(())
}

fn unique_local_parameters(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let (reaction, law) = expect_target!(*target, Target::KineticLaw { reaction, law } => (reaction, law));
    for (i, p) in law.parameters.iter().enumerate() {
        if law.parameters[..i].iter().any(|q| q.id == p.id) {
            out.report_on(
                "LocalParameter",
                Some(p.id.as_str()),
                p.base.location,
                format!("The kinetic law of reaction '{}' declares local parameter '{}' more than once.", reaction.id, p.id),
            );
        }
    }
    Ok(())
}

fn unique_rule_variables(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let model = expect_target!(*target, Target::Model(m) => m);
    let mut seen: Vec<&str> = Vec::new();
    for rule in model.rules.iter().filter(|r| r.kind != RuleKind::Algebraic) {
        let Some(variable) = rule.target() else { continue };
        if seen.contains(&variable) {
            out.report_on(
                rule.kind.label(),
                Some(variable),
                rule.base.location,
                format!("Variable '{}' is already the target of another rule.", variable),
            );
        } else {
            seen.push(variable);
        }
    }
    Ok(())
}

fn unique_event_assignments(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let event = expect_target!(*target, Target::Event(e) => e);
    for (i, ea) in event.assignments.iter().enumerate() {
        if event.assignments[..i].iter().any(|other| other.variable == ea.variable) {
            out.report_on(
                "EventAssignment",
                Some(ea.variable.as_str()),
                ea.base.location,
                format!("Variable '{}' is assigned more than once by the same event.", ea.variable),
            );
        }
    }
    Ok(())
}

fn event_vs_assignment_rule(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let event = expect_target!(*target, Target::Event(e) => e);
    for ea in &event.assignments {
        let ruled = ctx
            .model
            .rules
            .iter()
            .any(|r| r.kind == RuleKind::Assignment && r.target() == Some(ea.variable.as_str()));
        if ruled {
            out.report_on(
                "EventAssignment",
                Some(ea.variable.as_str()),
                ea.base.location,
                format!("Variable '{}' is set by an assignment rule and cannot also be changed by an event.", ea.variable),
            );
        }
    }
    Ok(())
}

fn unique_metaids(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let model = expect_target!(*target, Target::Model(m) => m);
    let mut seen: Vec<&str> = Vec::new();
    for object in model.objects() {
        let Some(metaid) = object.base.metaid.as_deref() else { continue };
        if seen.contains(&metaid) {
            out.report_on(
                object.kind,
                object.id,
                object.base.location,
                format!("The metaid '{}' of this {} is already used elsewhere in the model.", metaid, object.kind),
            );
        } else {
            seen.push(metaid);
        }
    }
    Ok(())
}

fn metaid_syntax(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let model = expect_target!(*target, Target::Model(m) => m);
    for object in model.objects() {
        if let Some(metaid) = object.base.metaid.as_deref().filter(|m| !is_valid_metaid(m)) {
            out.report_on(
                object.kind,
                object.id,
                object.base.location,
                format!("The metaid '{}' is not a valid XML name.", metaid),
            );
        }
    }
    Ok(())
}

fn sid_syntax(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let model = expect_target!(*target, Target::Model(m) => m);
    for object in model.objects() {
        if object.kind == "UnitDefinition" {
            continue;
        }
        if let Some(id) = object.id.filter(|id| !is_valid_sid(id)) {
            out.report_on(
                object.kind,
                Some(id),
                object.base.location,
                format!("The identifier '{}' of this {} is not a valid SId.", id, object.kind),
            );
        }
    }
    Ok(())
}

fn unit_sid_syntax(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let ud = expect_target!(*target, Target::UnitDefinition(u) => u);
    if !is_valid_sid(&ud.id) {
        out.report(format!("The identifier '{}' is not a valid UnitSId.", ud.id));
    }
    Ok(())
}
