//! Advisory unit checks: places where units could not be fully checked, or
//! where a function expects a dimensionless argument.
use super::units::{check_power, PowerCheck};
use super::{report_first, require_math};
use crate::math::{inline_calls, AstNode, Operator};
use crate::model::RuleKind;
use crate::units::UnitDeriver;
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::target::{KindMask, Target, TargetKind};

/// Targets whose math is compared against an expected unit.
const COMPARED_MATH: KindMask = KindMask::of(&[
    TargetKind::Rule,
    TargetKind::InitialAssignment,
    TargetKind::EventAssignment,
    TargetKind::KineticLaw,
    TargetKind::Delay,
]);

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    use Category::UnitAdvisory;
    vec![
        RuleDescriptor::warning(99502, UnitAdvisory, KindMask::EVALUATED_MATH, "Arguments of transcendental functions are dimensionless", dimensionless_arguments),
        RuleDescriptor::warning(99503, UnitAdvisory, KindMask::EVALUATED_MATH, "Exponents of unit-bearing bases are fixed numbers", variable_exponents),
        RuleDescriptor::warning(99505, UnitAdvisory, COMPARED_MATH, "Math units can be fully determined", undeclared_units),
    ]
}

fn transcendental_problem(deriver: &UnitDeriver, node: &AstNode) -> Option<String> {
    let op = node.operator().filter(Operator::wants_dimensionless_argument)?;
    node.children.iter().find_map(|arg| {
        let derived = deriver.derive(arg);
        (!derived.undeclared && !derived.unit.is_dimensionless()).then(|| {
            format!(
                "The argument '{}' of '{}' has units '{}'; '{}' expects a dimensionless argument.",
                arg,
                node,
                derived.unit,
                op.name()
            )
        })
    })
}

fn dimensionless_arguments<'a>(ctx: &ValidationContext<'a>, target: &Target<'a>, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    let deriver = ctx.deriver_for(target);
    let inlined = inline_calls(&math, &ctx.index);
    report_first(&inlined, out, |node| transcendental_problem(&deriver, node));
    Ok(())
}

fn variable_exponents<'a>(ctx: &ValidationContext<'a>, target: &Target<'a>, out: &mut Findings) -> Result<(), RuleFault> {
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    let deriver = ctx.deriver_for(target);
    let inlined = inline_calls(&math, &ctx.index);
    report_first(&inlined, out, |node| match check_power(&deriver, node) {
        PowerCheck::Unchecked => Some(format!(
            "The units of '{}' cannot be checked because its exponent is not a fixed number.",
            node
        )),
        PowerCheck::Consistent | PowerCheck::Inconsistent(_) => None,
    });
    Ok(())
}

fn undeclared_units<'a>(ctx: &ValidationContext<'a>, target: &Target<'a>, out: &mut Findings) -> Result<(), RuleFault> {
    if let Target::Rule { rule, .. } = *target {
        if rule.kind == RuleKind::Algebraic {
            return Ok(());
        }
    }
    let Some(math) = require_math(ctx, target)? else { return Ok(()) };
    if ctx.deriver_for(target).derive(&math).undeclared {
        out.report(format!(
            "The units of the {} math '{}' cannot be fully checked because some of its parts have undeclared units.",
            target.label(),
            *math
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::testing::{count, validate};
    use crate::math::{AstNode, Operator};
    use crate::model::*;
    use rstest::rstest;

    fn model() -> Model {
        let mut model = Model::new("m");
        model.parameters.push(Parameter::new("t1").with_value(1.0).with_units("second"));
        model.parameters.push(Parameter::new("ratio").with_value(1.0).with_units("dimensionless"));
        model.parameters.push(Parameter::new("n").with_value(2.0).with_constant(false).with_units("dimensionless"));
        model.parameters.push(Parameter::new("target").with_constant(false).with_units("second"));
        model
    }

    fn rule_diagnostics(math: AstNode) -> Vec<crate::validation::Diagnostic> {
        let mut model = model();
        model.rules.push(Rule::assignment("target", math.into_math()));
        validate(2, 4, model)
    }

    #[rstest]
    #[case(AstNode::apply(Operator::Exp, vec![AstNode::name("t1")]), 1)]
    #[case(AstNode::apply(Operator::Sin, vec![AstNode::name("ratio")]), 0)]
    #[case(AstNode::apply(Operator::Ln, vec![AstNode::int(3)]), 0)]
    fn test_transcendental_arguments(#[case] math: AstNode, #[case] expected: usize) {
        let diagnostics = rule_diagnostics(math);
        assert_eq!(count(&diagnostics, 99502), expected);
        assert_eq!(count(&diagnostics, 10501), 0);
    }

    #[test]
    fn test_variable_exponent_is_advisory() {
        let math = AstNode::apply(Operator::Power, vec![AstNode::name("t1"), AstNode::name("n")]);
        let diagnostics = rule_diagnostics(math);
        assert_eq!(count(&diagnostics, 99503), 1);
        assert_eq!(count(&diagnostics, 10501), 0);
    }

    #[test]
    fn test_unit_bearing_exponent_is_not_also_advisory() {
        let math = AstNode::apply(Operator::Power, vec![AstNode::name("t1"), AstNode::name("t1")]);
        let diagnostics = rule_diagnostics(math);
        assert_eq!(count(&diagnostics, 10501), 1);
        assert_eq!(count(&diagnostics, 99503), 0);
    }

    #[rstest]
    #[case(AstNode::apply(Operator::Times, vec![AstNode::int(2), AstNode::name("t1")]), 1)]
    #[case(AstNode::name("t1"), 0)]
    fn test_undeclared_parts(#[case] math: AstNode, #[case] expected: usize) {
        assert_eq!(count(&rule_diagnostics(math), 99505), expected);
    }

    #[test]
    fn test_advisories_can_be_disabled() {
        let mut model = model();
        model.rules.push(Rule::assignment("target", AstNode::int(2).into_math()));
        let config = crate::validation::ValidatorConfig { unit_warnings: false, ..Default::default() };
        let log = crate::validation::Validator::new(config).validate(&Document::new(2, 4, model));
        assert_eq!(log.count(99505), 0);
    }
}
