//! Tree walking and the small static analyses every rule family leans on:
//! function-call inlining, result-type inference, constant folding, and
//! name collection.
use super::{AstNode, Constant, NodeKind, Operator};
use crate::ids::IdList;
use crate::model::ModelIndex;

/// Whether the walk should continue into a node's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Descend {
    Children,
    Skip,
}

pub trait MathVisitor {
    fn visit(&mut self, node: &AstNode) -> Descend;
}

impl<F: FnMut(&AstNode) -> Descend> MathVisitor for F {
    fn visit(&mut self, node: &AstNode) -> Descend {
        self(node)
    }
}

/// Pre-order walk. Children are visited left to right.
pub fn walk<V: MathVisitor + ?Sized>(node: &AstNode, visitor: &mut V) {
    if visitor.visit(node) == Descend::Children {
        for child in &node.children {
            walk(child, visitor);
        }
    }
}

// --- Function-call inlining ---

const MAX_EXPANSION_DEPTH: usize = 32;

fn substitute(body: &AstNode, bvars: &[String], args: &[AstNode]) -> AstNode {
    if let NodeKind::Name(id) = &body.kind {
        if let Some(pos) = bvars.iter().position(|b| b == id) {
            if let Some(arg) = args.get(pos) {
                return arg.clone();
            }
        }
    }
    AstNode {
        kind: body.kind.clone(),
        children: body.children.iter().map(|c| substitute(c, bvars, args)).collect(),
        units: body.units.clone(),
    }
}

/// Replaces one call to a user-defined function with the function body,
/// bound variables substituted by the call's arguments. Calls nested in the
/// body are left as they are. Returns `None` when `node` is not a call, the
/// function is undefined, or the definition has no lambda.
pub fn expand_function_call(node: &AstNode, index: &ModelIndex<'_>) -> Option<AstNode> {
    let NodeKind::FunctionCall(name) = &node.kind else {
        return None;
    };
    let def = index.function(name)?;
    let lambda = def.math.as_deref()?;
    let NodeKind::Lambda { bvars } = &lambda.kind else {
        return None;
    };
    let body = lambda.children.last()?;
    Some(substitute(body, bvars, &node.children))
}

fn inline_into(node: &AstNode, index: &ModelIndex<'_>, active: &mut Vec<String>) -> AstNode {
    if let NodeKind::FunctionCall(name) = &node.kind {
        if !active.contains(name) && active.len() < MAX_EXPANSION_DEPTH {
            if let Some(expanded) = expand_function_call(node, index) {
                active.push(name.clone());
                let out = inline_into(&expanded, index, active);
                active.pop();
                return out;
            }
        }
    }
    AstNode {
        kind: node.kind.clone(),
        children: node.children.iter().map(|c| inline_into(c, index, active)).collect(),
        units: node.units.clone(),
    }
}

/// A copy of `node` with every resolvable function call inlined. Recursive
/// calls stop at the first repetition and stay as calls.
pub fn inline_calls(node: &AstNode, index: &ModelIndex<'_>) -> AstNode {
    inline_into(node, index, &mut Vec::new())
}

// --- Result type inference ---

/// What an expression evaluates to, as far as can be told statically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathType {
    Numeric,
    Boolean,
    Unknown,
}

fn value_type_at(node: &AstNode, index: &ModelIndex<'_>, depth: usize) -> MathType {
    if depth > MAX_EXPANSION_DEPTH {
        return MathType::Unknown;
    }
    match &node.kind {
        NodeKind::Integer(_) | NodeKind::Real(_) | NodeKind::Rational { .. } | NodeKind::ENotation { .. } => {
            MathType::Numeric
        }
        NodeKind::Constant(Constant::True | Constant::False) => MathType::Boolean,
        NodeKind::Constant(_) => MathType::Numeric,
        NodeKind::Name(_) | NodeKind::Csymbol { .. } => MathType::Numeric,
        NodeKind::Operator(op) if op.is_relational() || op.is_logical() => MathType::Boolean,
        NodeKind::Operator(Operator::Piecewise) => {
            let mut found: Option<MathType> = None;
            for piece in node.children.iter().step_by(2) {
                let t = value_type_at(piece, index, depth + 1);
                match found {
                    None => found = Some(t),
                    Some(prev) if prev != t => return MathType::Unknown,
                    _ => {}
                }
            }
            found.unwrap_or(MathType::Unknown)
        }
        NodeKind::Operator(_) => MathType::Numeric,
        NodeKind::FunctionCall(_) => match expand_function_call(node, index) {
            Some(body) => value_type_at(&body, index, depth + 1),
            None => MathType::Unknown,
        },
        NodeKind::Lambda { .. } => MathType::Unknown,
    }
}

pub fn value_type(node: &AstNode, index: &ModelIndex<'_>) -> MathType {
    value_type_at(node, index, 0)
}

pub fn returns_boolean(node: &AstNode, index: &ModelIndex<'_>) -> bool {
    value_type(node, index) == MathType::Boolean
}

pub fn returns_numeric(node: &AstNode, index: &ModelIndex<'_>) -> bool {
    value_type(node, index) == MathType::Numeric
}

// --- Constant folding ---

/// Folds `node` to a number when it is built only from literals, `pi`,
/// `exponentiale`, and names `lookup` can resolve to fixed values.
pub fn static_value(node: &AstNode, lookup: &dyn Fn(&str) -> Option<f64>) -> Option<f64> {
    let args = || node.children.iter().map(|c| static_value(c, lookup));
    match &node.kind {
        NodeKind::Constant(Constant::Pi) => Some(std::f64::consts::PI),
        NodeKind::Constant(Constant::ExponentialE) => Some(std::f64::consts::E),
        NodeKind::Name(id) => lookup(id),
        NodeKind::Operator(op) => match (op, node.children.len()) {
            (Operator::Plus, _) => args().sum(),
            (Operator::Times, _) => args().product(),
            (Operator::Minus, 1) => static_value(&node.children[0], lookup).map(|v| -v),
            (Operator::Minus, 2) => {
                Some(static_value(&node.children[0], lookup)? - static_value(&node.children[1], lookup)?)
            }
            (Operator::Divide, 2) => {
                let d = static_value(&node.children[1], lookup)?;
                if d == 0.0 {
                    return None;
                }
                Some(static_value(&node.children[0], lookup)? / d)
            }
            (Operator::Power, 2) => {
                Some(static_value(&node.children[0], lookup)?.powf(static_value(&node.children[1], lookup)?))
            }
            _ => None,
        },
        _ => node.number_value(),
    }
}

// --- Name collection ---

fn collect_names(node: &AstNode, bound: &mut Vec<String>, out: &mut IdList) {
    match &node.kind {
        NodeKind::Name(id) if !bound.contains(id) => {
            out.append(id.as_str());
        }
        NodeKind::Lambda { bvars } => {
            let mark = bound.len();
            bound.extend(bvars.iter().cloned());
            for c in &node.children {
                collect_names(c, bound, out);
            }
            bound.truncate(mark);
            return;
        }
        _ => {}
    }
    for c in &node.children {
        collect_names(c, bound, out);
    }
}

/// Every free `Name` in the tree, in first-occurrence order.
pub fn referenced_names(node: &AstNode) -> IdList {
    let mut out = IdList::new();
    collect_names(node, &mut Vec::new(), &mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FunctionDefinition, Model};
    use rstest::rstest;

    fn model_with_square() -> Model {
        let mut model = Model::new("m");
        let body = AstNode::apply(Operator::Times, vec![AstNode::name("x"), AstNode::name("x")]);
        model
            .function_definitions
            .push(FunctionDefinition::new("sq", AstNode::lambda(&["x"], body).into_math()));
        model
    }

    #[test]
    fn test_walk_skips_pruned_subtrees() {
        let expr = AstNode::apply(
            Operator::Plus,
            vec![AstNode::name("a"), AstNode::call("f", vec![AstNode::name("b")])],
        );
        let mut seen = Vec::new();
        walk(&expr, &mut |n: &AstNode| {
            seen.push(n.to_string());
            if matches!(n.kind, NodeKind::FunctionCall(_)) {
                Descend::Skip
            } else {
                Descend::Children
            }
        });
        assert_eq!(seen, vec!["a + f(b)", "a", "f(b)"]);
    }

    #[test]
    fn test_expand_substitutes_arguments() {
        let model = model_with_square();
        let index = ModelIndex::new(&model);
        let call = AstNode::call("sq", vec![AstNode::name("y")]);
        let expanded = expand_function_call(&call, &index).unwrap();
        assert_eq!(expanded.to_string(), "y * y");
        assert!(expand_function_call(&AstNode::call("nope", vec![]), &index).is_none());
    }

    #[test]
    fn test_inline_stops_on_recursion() {
        let mut model = Model::new("m");
        let body = AstNode::call("f", vec![AstNode::name("x")]);
        model
            .function_definitions
            .push(FunctionDefinition::new("f", AstNode::lambda(&["x"], body).into_math()));
        let index = ModelIndex::new(&model);
        let out = inline_calls(&AstNode::call("f", vec![AstNode::int(1)]), &index);
        assert_eq!(out.to_string(), "f(1)");
    }

    #[rstest]
    #[case(AstNode::apply(Operator::Gt, vec![AstNode::name("x"), AstNode::int(1)]), MathType::Boolean)]
    #[case(AstNode::apply(Operator::Plus, vec![AstNode::name("x"), AstNode::int(1)]), MathType::Numeric)]
    #[case(AstNode::call("sq", vec![AstNode::int(2)]), MathType::Numeric)]
    #[case(AstNode::call("undefined", vec![]), MathType::Unknown)]
    #[case(
        AstNode::piecewise(vec![AstNode::int(1), AstNode::constant(Constant::True), AstNode::constant(Constant::False)]),
        MathType::Unknown
    )]
    fn test_value_type(#[case] expr: AstNode, #[case] expected: MathType) {
        let model = model_with_square();
        let index = ModelIndex::new(&model);
        assert_eq!(value_type(&expr, &index), expected);
    }

    #[test]
    fn test_static_value_folds_known_names() {
        let expr = AstNode::apply(
            Operator::Divide,
            vec![AstNode::int(1), AstNode::apply(Operator::Plus, vec![AstNode::name("n"), AstNode::int(1)])],
        );
        let lookup = |id: &str| if id == "n" { Some(1.0) } else { None };
        assert_eq!(static_value(&expr, &lookup), Some(0.5));
        assert_eq!(static_value(&AstNode::name("m"), &lookup), None);
    }

    #[test]
    fn test_referenced_names_excludes_bound_variables() {
        let expr = AstNode::lambda(
            &["x"],
            AstNode::apply(Operator::Times, vec![AstNode::name("x"), AstNode::name("k"), AstNode::name("k")]),
        );
        assert_eq!(referenced_names(&expr).as_slice(), &["k".to_string()]);
    }
}
