//! Well-formedness of math: symbols, operators, argument types and
//! function definitions.
use super::{expect_target, report_first, require_math};
use crate::math::{referenced_names, value_type, AstNode, CsymbolKind, MathType, NodeKind, Operator};
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};
use petgraph::algo::tarjan_scc;
use petgraph::graph::DiGraph;
use std::collections::HashMap;

const FUNCTION_DEFINITION: KindMask = KindMask::of(&[TargetKind::FunctionDefinition]);

/// Math whose value is used as a number.
const NUMERIC_MATH: KindMask = KindMask::of(&[
    TargetKind::Rule,
    TargetKind::SpeciesReference,
    TargetKind::KineticLaw,
    TargetKind::Delay,
    TargetKind::Priority,
    TargetKind::EventAssignment,
    TargetKind::InitialAssignment,
]);

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::Math;
    vec![
        RuleDescriptor::error(10205, Math, KindMask::MATH, "csymbols must use a recognised definitionURL", csymbol_urls),
        RuleDescriptor::error(10208, Math, KindMask::MATH, "lambda may only appear as a function definition body", lambda_placement),
        RuleDescriptor::error(10209, Math, KindMask::EVALUATED_MATH, "Logical operators take boolean arguments", logical_arguments),
        RuleDescriptor::error(10210, Math, KindMask::EVALUATED_MATH, "Arithmetic operators take numeric arguments", numeric_arguments),
        RuleDescriptor::error(10211, Math, KindMask::EVALUATED_MATH, "eq and neq compare arguments of one type", equality_arguments),
        RuleDescriptor::error(10212, Math, KindMask::EVALUATED_MATH, "piecewise pieces share one type", piecewise_pieces),
        RuleDescriptor::error(10213, Math, KindMask::EVALUATED_MATH, "piecewise conditions are boolean", piecewise_conditions),
        RuleDescriptor::error(10214, Math, KindMask::MATH, "Called functions must be defined", calls_resolve),
        RuleDescriptor::error(10215, Math, KindMask::EVALUATED_MATH, "Names in math must resolve", names_resolve),
        RuleDescriptor::error(10216, Math, KindMask::EVALUATED_MATH, "Local parameters are visible only in their kinetic law", local_parameter_scope),
        RuleDescriptor::error(10217, Math, NUMERIC_MATH, "Math used as a value must be numeric", numeric_result).when(super::before_l3v2),
        RuleDescriptor::error(10218, Math, KindMask::MATH, "Operators take the right number of arguments", operator_arity),
        RuleDescriptor::error(10219, Math, KindMask::MATH, "Function calls pass one argument per bound variable", call_arity),
        RuleDescriptor::error(10220, Math, KindMask::MATH, "Only numbers may carry units", units_on_literals_only).when(super::level3_plus),
        RuleDescriptor::error(10221, Math, KindMask::MATH, "Units on numbers must be defined", literal_units_resolve).when(super::level3_plus),
        RuleDescriptor::error(20301, Math, FUNCTION_DEFINITION, "Function definitions contain a lambda", function_is_lambda).when(super::level2_plus),
        RuleDescriptor::error(20302, Math, FUNCTION_DEFINITION, "Functions may only use functions defined before them", function_order).when(super::level2_plus),
        RuleDescriptor::error(20304, Math, FUNCTION_DEFINITION, "Function bodies refer only to their bound variables", function_body_scope)
            .when(super::level2_plus)
            .when(super::before_l3v2),
        RuleDescriptor::error(21001, Math, KindMask::of(&[TargetKind::Constraint]), "Constraints are boolean", boolean_result),
        RuleDescriptor::error(21202, Math, KindMask::of(&[TargetKind::Trigger]), "Triggers are boolean", boolean_result),
    ]
}

fn type_name(t: MathType) -> &'static str {
    match t {
        MathType::Numeric => "numeric",
        MathType::Boolean => "boolean",
        MathType::Unknown => "of unknown type",
    }
}

fn csymbol_urls(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    report_first(&math, out, |node| match &node.kind {
        NodeKind::Csymbol { url, name } if CsymbolKind::from_url(url) == CsymbolKind::Unknown => {
            Some(format!("The csymbol '{}' uses the unrecognised definitionURL '{}'.", name, url))
        }
        _ => None,
    });
    Ok(())
}

fn lambda_placement(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    let root: &AstNode = &math;
    let root_allowed = target.kind() == TargetKind::FunctionDefinition;
    report_first(root, out, |node| {
        let is_root = std::ptr::eq(node, root);
        match node.kind {
            NodeKind::Lambda { .. } if !(is_root && root_allowed) => {
                Some(format!("'{}' uses lambda outside a function definition body.", node))
            }
            _ => None,
        }
    });
    Ok(())
}

fn logical_arguments(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    report_first(&math, out, |node| {
        let op = node.operator().filter(Operator::is_logical)?;
        let bad = node.children.iter().find(|c| value_type(c, &ctx.index) == MathType::Numeric)?;
        Some(format!("The arguments of '{}' must be boolean, but '{}' is numeric.", op.name(), bad))
    });
    Ok(())
}

fn numeric_arguments(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    report_first(&math, out, |node| {
        let name = match &node.kind {
            NodeKind::Operator(op)
                if !op.is_logical() && !matches!(op, Operator::Eq | Operator::Neq | Operator::Piecewise) =>
            {
                op.name()
            }
            NodeKind::Csymbol { name, .. } if !node.children.is_empty() => name.as_str(),
            _ => return None,
        };
        let bad = node.children.iter().find(|c| value_type(c, &ctx.index) == MathType::Boolean)?;
        Some(format!("The arguments of '{}' must be numeric, but '{}' is boolean.", name, bad))
    });
    Ok(())
}

/// The first argument whose known type differs from the first known type.
fn mixed_types<'n>(ctx: &ValidationContext, args: impl Iterator<Item = &'n AstNode>) -> Option<(&'n AstNode, MathType)> {
    let mut first: Option<MathType> = None;
    for arg in args {
        let t = value_type(arg, &ctx.index);
        if t == MathType::Unknown {
            continue;
        }
        match first {
            None => first = Some(t),
            Some(expected) if expected != t => return Some((arg, expected)),
            _ => {}
        }
    }
    None
}

fn equality_arguments(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    report_first(&math, out, |node| {
        let op = node.operator().filter(|op| matches!(op, Operator::Eq | Operator::Neq))?;
        let (bad, expected) = mixed_types(ctx, node.children.iter())?;
        Some(format!(
            "The arguments of '{}' must all be of one type; '{}' is not {}.",
            op.name(),
            bad,
            type_name(expected)
        ))
    });
    Ok(())
}

fn piecewise_pieces(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    report_first(&math, out, |node| {
        node.operator().filter(|op| *op == Operator::Piecewise)?;
        let (bad, expected) = mixed_types(ctx, node.children.iter().step_by(2))?;
        Some(format!("The pieces of '{}' must share one type; '{}' is not {}.", node, bad, type_name(expected)))
    });
    Ok(())
}

fn piecewise_conditions(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    report_first(&math, out, |node| {
        node.operator().filter(|op| *op == Operator::Piecewise)?;
        let bad = node
            .children
            .iter()
            .skip(1)
            .step_by(2)
            .take(node.children.len() / 2)
            .find(|c| value_type(c, &ctx.index) == MathType::Numeric)?;
        Some(format!("The condition '{}' in a piecewise expression must be boolean.", bad))
    });
    Ok(())
}

fn calls_resolve(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    report_first(&math, out, |node| match &node.kind {
        NodeKind::FunctionCall(name) if ctx.index.function(name).is_none() => {
            Some(format!("'{}' calls '{}', which is not a FunctionDefinition in this model.", node, name))
        }
        _ => None,
    });
    Ok(())
}

/// How a bare name in evaluated math resolves.
enum NameScope {
    Resolved,
    /// Only a local parameter of some other kinetic law carries this id.
    ForeignLocal(String),
    Unresolved,
}

fn resolve_name(ctx: &ValidationContext, target: &Target, id: &str) -> NameScope {
    if target.kinetic_law().and_then(|law| law.local_parameter(id)).is_some() {
        return NameScope::Resolved;
    }
    if ctx.index.symbol(id).map_or(false, |s| s.has_value()) {
        return NameScope::Resolved;
    }
    match ctx.index.local_parameter_owners(id).first() {
        Some(owner) => NameScope::ForeignLocal(owner.id.clone()),
        None => NameScope::Unresolved,
    }
}

fn names_resolve(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    let names = referenced_names(&math);
    if let Some(id) = names.iter().find(|id| matches!(resolve_name(ctx, target, id), NameScope::Unresolved)) {
        out.report(format!(
            "'{}' refers to '{}', which is not a Compartment, Species, Parameter, Reaction or SpeciesReference.",
            *math, id
        ));
    }
    Ok(())
}

fn local_parameter_scope(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    for id in referenced_names(&math).iter() {
        if let NameScope::ForeignLocal(owner) = resolve_name(ctx, target, id) {
            out.report(format!(
                "'{}' is a local parameter of reaction '{}' and cannot be used outside that reaction's kinetic law.",
                id, owner
            ));
            break;
        }
    }
    Ok(())
}

fn numeric_result(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    if value_type(&math, &ctx.index) == MathType::Boolean {
        out.report(format!("The math '{}' of this {} must be numeric, not boolean.", *math, target.label()));
    }
    Ok(())
}

fn boolean_result(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    if value_type(&math, &ctx.index) == MathType::Numeric {
        out.report(format!("The math '{}' of this {} must be boolean, not numeric.", *math, target.label()));
    }
    Ok(())
}

fn operator_arity(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    report_first(&math, out, |node| {
        let op = node.operator()?;
        let arity = op.arity();
        if arity.accepts(node.children.len()) {
            return None;
        }
        Some(format!(
            "'{}' takes {} arguments but is given {}.",
            op.name(),
            arity,
            node.children.len()
        ))
    });
    Ok(())
}

fn call_arity(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    report_first(&math, out, |node| {
        let NodeKind::FunctionCall(name) = &node.kind else { return None };
        let lambda = ctx.index.function(name)?.math.as_deref()?;
        let NodeKind::Lambda { bvars } = &lambda.kind else { return None };
        if bvars.len() == node.children.len() {
            return None;
        }
        Some(format!(
            "'{}' passes {} arguments to '{}', which declares {} bound variables.",
            node,
            node.children.len(),
            name,
            bvars.len()
        ))
    });
    Ok(())
}

fn units_on_literals_only(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    report_first(&math, out, |node| match &node.units {
        Some(units) if !node.is_number() => {
            Some(format!("Units '{}' are attached to '{}', which is not a number.", units, node))
        }
        _ => None,
    });
    Ok(())
}

fn literal_units_resolve(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    let deriver = ctx.deriver();
    report_first(&math, out, |node| match &node.units {
        Some(units) if node.is_number() && deriver.resolve(units).is_none() => {
            Some(format!("The number '{}' carries units '{}', which are not defined.", node, units))
        }
        _ => None,
    });
    Ok(())
}

fn function_is_lambda(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let fd = expect_target!(*target, Target::FunctionDefinition(f) => f);
    match fd.math.as_deref() {
        None => out.report(format!("FunctionDefinition '{}' has no math.", fd.id)),
        Some(AstNode { kind: NodeKind::Lambda { .. }, children, .. }) if children.len() == 1 => {}
        Some(AstNode { kind: NodeKind::Lambda { .. }, .. }) => {
            out.report(format!("The lambda of FunctionDefinition '{}' has no body.", fd.id))
        }
        Some(other) => out.report(format!(
            "The math '{}' of FunctionDefinition '{}' must be a lambda expression.",
            other, fd.id
        )),
    }
    Ok(())
}

fn called_functions(math: &AstNode) -> Vec<String> {
    let mut calls = Vec::new();
    crate::math::walk(math, &mut |node: &AstNode| {
        if let NodeKind::FunctionCall(name) = &node.kind {
            if !calls.contains(name) {
                calls.push(name.clone());
            }
        }
        crate::math::Descend::Children
    });
    calls
}

fn function_order(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let fd = expect_target!(*target, Target::FunctionDefinition(f) => f);
    let Some(math) = fd.math.as_deref() else { return Ok(()) };

    if ctx.level() < 3 {
        let Some(own) = ctx.index.function_position(&fd.id) else { return Ok(()) };
        let late = called_functions(math)
            .into_iter()
            .find(|name| ctx.index.function_position(name).map_or(false, |pos| pos >= own));
        if let Some(name) = late {
            out.report(format!(
                "FunctionDefinition '{}' uses '{}', which is not defined before it.",
                fd.id, name
            ));
        }
        return Ok(());
    }

    // Level 3 drops the ordering requirement but still forbids recursion.
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let mut nodes = HashMap::new();
    for f in &ctx.model.function_definitions {
        nodes.entry(f.id.as_str()).or_insert_with(|| graph.add_node(f.id.as_str()));
    }
    for f in &ctx.model.function_definitions {
        let Some(from) = nodes.get(f.id.as_str()).copied() else { continue };
        for callee in f.math.as_deref().map(called_functions).unwrap_or_default() {
            if let Some(&to) = nodes.get(callee.as_str()) {
                graph.update_edge(from, to, ());
            }
        }
    }
    let Some(&me) = nodes.get(fd.id.as_str()) else { return Ok(()) };
    let recursive = graph.contains_edge(me, me)
        || tarjan_scc(&graph).iter().any(|scc| scc.len() > 1 && scc.contains(&me));
    if recursive {
        out.report(format!("FunctionDefinition '{}' is recursive.", fd.id));
    }
    Ok(())
}

fn function_body_scope(_: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let fd = expect_target!(*target, Target::FunctionDefinition(f) => f);
    let Some(lambda) = fd.math.as_deref() else { return Ok(()) };
    if !matches!(lambda.kind, NodeKind::Lambda { .. }) {
        return Ok(());
    }
    let free = referenced_names(lambda);
    if let Some(id) = free.iter().next() {
        out.report(format!(
            "The body of FunctionDefinition '{}' refers to '{}', which is not one of its bound variables.",
            fd.id, id
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{count, validate};
    use crate::math::{AstNode, Constant, Operator};
    use crate::model::*;
    use rstest::rstest;

    fn model_with_rule(math: AstNode) -> Model {
        let mut model = Model::new("m");
        model.parameters.push(Parameter::new("x").with_value(1.0).with_units("second"));
        model.parameters.push(Parameter::new("y").with_constant(false).with_units("second"));
        model.rules.push(Rule::assignment("y", math.into_math()));
        model
    }

    #[rstest]
    #[case(AstNode::apply(Operator::And, vec![AstNode::name("x"), AstNode::constant(Constant::True)]), 10209)]
    #[case(AstNode::apply(Operator::Plus, vec![AstNode::name("x"), AstNode::constant(Constant::True)]), 10210)]
    #[case(AstNode::apply(Operator::Eq, vec![AstNode::name("x"), AstNode::constant(Constant::True)]), 10211)]
    #[case(AstNode::piecewise(vec![AstNode::name("x"), AstNode::name("x"), AstNode::int(0)]), 10213)]
    #[case(AstNode::call("f", vec![]), 10214)]
    #[case(AstNode::name("nowhere"), 10215)]
    #[case(AstNode::apply(Operator::Divide, vec![AstNode::name("x")]), 10218)]
    #[case(AstNode::apply(Operator::Gt, vec![AstNode::name("x"), AstNode::int(0)]), 10217)]
    fn test_malformed_math_is_reported(#[case] math: AstNode, #[case] rule_id: u32) {
        let diagnostics = validate(2, 4, model_with_rule(math));
        assert_eq!(count(&diagnostics, rule_id), 1, "{:?}", diagnostics);
    }

    #[test]
    fn test_well_formed_rule_is_quiet() {
        let math = AstNode::piecewise(vec![
            AstNode::name("x"),
            AstNode::apply(Operator::Gt, vec![AstNode::name("x"), AstNode::int(0)]),
            AstNode::int(0),
        ]);
        let diagnostics = validate(2, 4, model_with_rule(math));
        for id in [10209, 10210, 10211, 10212, 10213, 10214, 10215, 10217, 10218] {
            assert_eq!(count(&diagnostics, id), 0, "rule {} fired: {:?}", id, diagnostics);
        }
    }

    #[test]
    fn test_local_parameter_leak_is_its_own_rule() {
        let mut model = model_with_rule(AstNode::name("k"));
        let law = KineticLaw::new(AstNode::name("k").into_math()).with_parameter(Parameter::new("k"));
        model.reactions.push(Reaction::new("r").with_kinetic_law(law));
        let diagnostics = validate(2, 4, model);
        assert_eq!(count(&diagnostics, 10216), 1);
        assert_eq!(count(&diagnostics, 10215), 0);
    }

    #[test]
    fn test_function_definitions() {
        let mut model = Model::new("m");
        let calls_later = AstNode::lambda(&["x"], AstNode::call("g", vec![AstNode::name("x")]));
        let uses_global = AstNode::lambda(&["x"], AstNode::apply(Operator::Times, vec![AstNode::name("x"), AstNode::name("k")]));
        model.function_definitions.push(FunctionDefinition::new("f", calls_later.into_math()));
        model.function_definitions.push(FunctionDefinition::new("g", uses_global.into_math()));
        model.function_definitions.push(FunctionDefinition::new("h", AstNode::int(1).into_math()));
        let diagnostics = validate(2, 4, model);
        assert_eq!(count(&diagnostics, 20302), 1);
        assert_eq!(count(&diagnostics, 20304), 1);
        assert_eq!(count(&diagnostics, 20301), 1);
    }

    #[rstest]
    #[case(1, 2, 0)]
    #[case(2, 4, 1)]
    #[case(3, 1, 1)]
    #[case(3, 2, 0)]
    fn test_body_scope_is_level2_to_l3v1(#[case] level: u32, #[case] version: u32, #[case] expected: usize) {
        let mut model = Model::new("m");
        let body = AstNode::apply(Operator::Times, vec![AstNode::name("x"), AstNode::name("k")]);
        model.function_definitions.push(FunctionDefinition::new("f", AstNode::lambda(&["x"], body).into_math()));
        assert_eq!(count(&validate(level, version, model), 20304), expected);
    }

    #[test]
    fn test_level3_recursion() {
        let mut model = Model::new("m");
        let f = AstNode::lambda(&["x"], AstNode::call("g", vec![AstNode::name("x")]));
        let g = AstNode::lambda(&["x"], AstNode::call("f", vec![AstNode::name("x")]));
        let h = AstNode::lambda(&["x"], AstNode::call("f", vec![AstNode::name("x")]));
        model.function_definitions.push(FunctionDefinition::new("f", f.into_math()));
        model.function_definitions.push(FunctionDefinition::new("g", g.into_math()));
        model.function_definitions.push(FunctionDefinition::new("h", h.into_math()));
        let diagnostics = validate(3, 1, model);
        assert_eq!(count(&diagnostics, 20302), 2);
    }

    #[test]
    fn test_trigger_must_be_boolean() {
        let mut model = Model::new("m");
        model.events.push(Event::new("e", AstNode::int(1).into_math()));
        assert_eq!(count(&validate(2, 4, model), 21202), 1);
    }
}
