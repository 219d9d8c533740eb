//! Whole-model dependency checks: compartment nesting loops, circular
//! assignments and assignment-rule ordering.
//!
//! These rules run once per model. Each cycle is reported once, on one of
//! the objects taking part in it.
use crate::ids::{IdGraph, IdList};
use crate::math::referenced_names;
use crate::model::{Model, RuleKind, SourceLocation, SymbolRef};
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::rules::expect_target;
use crate::validation::target::{KindMask, Target, TargetKind};
use std::collections::HashMap;

const MODEL: KindMask = KindMask::of(&[TargetKind::Model]);

fn before_l2v2(ctx: &ValidationContext<'_>) -> bool {
    !ctx.is_at_least(2, 2)
}

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    vec![
        RuleDescriptor::error(20506, Category::General, MODEL, "Compartments cannot contain themselves", compartment_cycles),
        RuleDescriptor::error(20906, Category::General, MODEL, "Assignments cannot depend on themselves", assignment_cycles)
            .when(crate::validation::rules::from_l2v2),
        RuleDescriptor::error(
            99106,
            Category::Math,
            KindMask::of(&[TargetKind::Rule]),
            "Assignment rules only use variables set by earlier rules",
            forward_references,
        )
        .when(before_l2v2),
    ]
}

// --- 20506 ---

fn compartment_cycles(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let model = expect_target!(*target, Target::Model(m) => m);
    let mut known_cycles: Vec<Vec<String>> = Vec::new();

    for start in &model.compartments {
        let mut chain = IdList::new();
        let mut current = Some(start);
        while let Some(c) = current {
            if chain.append(c.id.as_str()) {
                current = c.outside.as_deref().and_then(|o| ctx.index.compartment(o));
                continue;
            }
            let cycle = chain.tail_from(chain.position(&c.id).unwrap_or_default());
            let mut key = cycle.to_vec();
            key.sort();
            if !known_cycles.contains(&key) {
                known_cycles.push(key);
                let path: Vec<&str> = cycle.iter().map(String::as_str).chain(std::iter::once(c.id.as_str())).collect();
                out.report_on(
                    "Compartment",
                    Some(c.id.as_str()),
                    c.base.location,
                    format!("Compartment '{}' ends up outside itself: {}.", c.id, path.join(" -> ")),
                );
            }
            break;
        }
    }
    Ok(())
}

// --- 20906 ---

/// What defines a node of the assignment graph, for reporting.
struct Definer {
    kind: &'static str,
    location: Option<SourceLocation>,
}

/// Edges from each value defined by math to the symbols that math reads.
/// Initial assignments, assignment rules and kinetic laws (through their
/// reaction's id) define values.
fn assignment_graph(ctx: &ValidationContext, model: &Model) -> (IdGraph, Vec<(String, Definer)>) {
    let mut graph = IdGraph::new();
    let mut definers: Vec<(String, Definer)> = Vec::new();
    let is_symbol = |id: &str| {
        ctx.index.symbol(id).map_or(false, |s| !matches!(s, SymbolRef::FunctionDefinition(_)))
    };

    let mut add = |defined: &str, kind: &'static str, location, math: Option<&crate::math::Math>, locals: &[&str]| {
        definers.push((defined.to_string(), Definer { kind, location }));
        let Some(math) = math else { return };
        let names = referenced_names(math);
        for name in names.iter().filter(|n| !locals.contains(n) && is_symbol(n)) {
            graph.insert(defined, name);
        }
    };

    for ia in &model.initial_assignments {
        add(&ia.symbol, "InitialAssignment", ia.base.location, ia.math.as_ref(), &[]);
    }
    for rule in model.rules.iter().filter(|r| r.kind == RuleKind::Assignment) {
        if let Some(variable) = rule.target() {
            add(variable, "AssignmentRule", rule.base.location, rule.math.as_ref(), &[]);
        }
    }
    for reaction in &model.reactions {
        let Some(law) = &reaction.kinetic_law else { continue };
        let locals: Vec<&str> = law.parameters.iter().map(|p| p.id.as_str()).collect();
        add(&reaction.id, "KineticLaw", law.base.location, law.math.as_ref(), &locals);
    }
    (graph, definers)
}

fn assignment_cycles(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let model = expect_target!(*target, Target::Model(m) => m);
    let (mut graph, definers) = assignment_graph(ctx, model);
    let definers: HashMap<&str, &Definer> = definers.iter().rev().map(|(id, d)| (id.as_str(), d)).collect();
    let report = |out: &mut Findings, id: &str, message: String| {
        let (kind, location) = definers.get(id).map_or(("Model", None), |d| (d.kind, d.location));
        out.report_on(kind, Some(id), location, message);
    };

    let self_references: Vec<String> = graph.edges().filter(|(a, b)| a == b).map(|(a, _)| a.to_string()).collect();
    for id in &self_references {
        report(out, id, format!("The math defining '{}' refers to '{}' itself.", id, id));
    }

    graph.close_transitively();
    let mut reported: Vec<(String, String)> = Vec::new();
    for (a, b) in graph.edges() {
        if a == b || !graph.contains(b, a) {
            continue;
        }
        let pair = if a < b { (a.to_string(), b.to_string()) } else { (b.to_string(), a.to_string()) };
        if reported.contains(&pair) {
            continue;
        }
        report(out, a, format!("The values of '{}' and '{}' are defined in terms of each other.", a, b));
        reported.push(pair);
    }
    Ok(())
}

// --- 99106 ---

fn forward_references(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let (rule, position) = expect_target!(*target, Target::Rule { rule, position } => (rule, position));
    if rule.kind != RuleKind::Assignment {
        return Ok(());
    }
    let Some(math) = rule.math.as_ref() else { return Ok(()) };
    let later: Vec<&str> = ctx.model.rules[position + 1..]
        .iter()
        .filter(|r| r.kind == RuleKind::Assignment)
        .filter_map(|r| r.target())
        .filter(|v| Some(*v) != rule.target())
        .collect();
    let names = referenced_names(math);
    if let Some(name) = names.iter().find(|n| later.contains(n)) {
        out.report(format!(
            "This assignment rule uses '{}', which is set by a later assignment rule.",
            name
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::math::{AstNode, Operator};
    use crate::model::*;
    use crate::validation::rules::testing::{count, fired, validate};

    #[test]
    fn test_two_compartment_loop_is_reported_once() {
        let mut model = Model::new("m");
        model.compartments.push(Compartment::new("a").with_size(1.0).with_outside("b"));
        model.compartments.push(Compartment::new("b").with_size(1.0).with_outside("a"));
        model.compartments.push(Compartment::new("inner").with_size(1.0).with_outside("a"));
        assert_eq!(fired(&validate(2, 4, model), 20506), vec![Some("a".to_string())]);
    }

    #[test]
    fn test_self_containment() {
        let mut model = Model::new("m");
        model.compartments.push(Compartment::new("c").with_size(1.0).with_outside("c"));
        assert_eq!(count(&validate(2, 4, model), 20506), 1);
    }

    #[test]
    fn test_assignment_cycles() {
        let mut model = Model::new("m");
        for id in ["x", "y", "z", "w"] {
            model.parameters.push(Parameter::new(id).with_constant(false));
        }
        model.rules.push(Rule::assignment("x", AstNode::name("y").into_math()));
        model.rules.push(Rule::assignment("y", AstNode::name("x").into_math()));
        model.rules.push(Rule::assignment(
            "z",
            AstNode::apply(Operator::Plus, vec![AstNode::name("z"), AstNode::name("w")]).into_math(),
        ));
        let diagnostics = validate(2, 4, model);
        assert_eq!(fired(&diagnostics, 20906), vec![Some("z".to_string()), Some("x".to_string())]);
    }

    #[test]
    fn test_kinetic_law_joins_the_graph() {
        let mut model = Model::new("m");
        model.compartments.push(Compartment::new("c").with_size(1.0));
        model.species.push(Species::new("S", "c").with_amount(1.0));
        model.parameters.push(Parameter::new("v").with_constant(false));
        model.rules.push(Rule::assignment("v", AstNode::name("r").into_math()));
        let law = KineticLaw::new(AstNode::name("v").into_math());
        model.reactions.push(Reaction::new("r").with_reactant("S").with_kinetic_law(law));
        assert_eq!(count(&validate(2, 4, model), 20906), 1);
    }

    #[test]
    fn test_forward_references_only_in_early_levels() {
        let mut model = Model::new("m");
        model.parameters.push(Parameter::new("a").with_constant(false));
        model.parameters.push(Parameter::new("b").with_constant(false));
        model.rules.push(Rule::assignment("a", AstNode::name("b").into_math()));
        model.rules.push(Rule::assignment("b", AstNode::int(1).into_math()));
        assert_eq!(fired(&validate(2, 1, model.clone()), 99106), vec![Some("a".to_string())]);
        assert_eq!(count(&validate(2, 4, model), 99106), 0);
    }
}
