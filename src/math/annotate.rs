//! Symbol annotation pre-pass.
//!
//! Some host parsers hand over `time`, `delay` and `avogadro` as plain names.
//! When the host says which names stand for those symbols, the validator
//! rewrites a private copy of each tree into proper csymbol nodes before any
//! rule looks at it. Shared trees are never touched.
use super::{AstNode, NodeKind, AVOGADRO_URL, DELAY_URL, TIME_URL};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// Host-declared names for the special symbols.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SymbolBindings {
    pub time: Option<String>,
    pub delay: Option<String>,
    pub avogadro: Option<String>,
}

impl SymbolBindings {
    pub fn is_empty(&self) -> bool {
        self.time.is_none() && self.delay.is_none() && self.avogadro.is_none()
    }

    fn matches(binding: &Option<String>, name: &str, bound: &[String]) -> bool {
        binding.as_deref() == Some(name) && !bound.iter().any(|b| b == name)
    }
}

fn annotate_in(node: &AstNode, bindings: &SymbolBindings, bound: &mut Vec<String>) -> AstNode {
    let kind = match &node.kind {
        NodeKind::Name(id) if SymbolBindings::matches(&bindings.time, id, bound) => {
            NodeKind::Csymbol { url: TIME_URL.into(), name: id.clone() }
        }
        NodeKind::Name(id) if SymbolBindings::matches(&bindings.avogadro, id, bound) => {
            NodeKind::Csymbol { url: AVOGADRO_URL.into(), name: id.clone() }
        }
        NodeKind::FunctionCall(id) if SymbolBindings::matches(&bindings.delay, id, bound) => {
            NodeKind::Csymbol { url: DELAY_URL.into(), name: id.clone() }
        }
        other => other.clone(),
    };

    // Lambda-bound variables shadow the host bindings inside their body.
    let mark = bound.len();
    if let NodeKind::Lambda { bvars } = &node.kind {
        bound.extend(bvars.iter().cloned());
    }
    let children = node.children.iter().map(|c| annotate_in(c, bindings, bound)).collect();
    bound.truncate(mark);

    AstNode { kind, children, units: node.units.clone() }
}

/// Returns an annotated copy of `node`.
pub fn annotate(node: &AstNode, bindings: &SymbolBindings) -> AstNode {
    annotate_in(node, bindings, &mut Vec::new())
}

/// Borrows `node` unchanged when there is nothing to annotate.
pub fn annotate_math<'m>(node: &'m AstNode, bindings: &SymbolBindings) -> Cow<'m, AstNode> {
    if bindings.is_empty() {
        Cow::Borrowed(node)
    } else {
        Cow::Owned(annotate(node, bindings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{CsymbolKind, Operator};

    #[test]
    fn test_names_become_csymbols() {
        let bindings = SymbolBindings { time: Some("t".into()), delay: Some("d".into()), ..Default::default() };
        let expr = AstNode::apply(
            Operator::Plus,
            vec![AstNode::name("t"), AstNode::call("d", vec![AstNode::name("x"), AstNode::int(1)])],
        );
        let out = annotate(&expr, &bindings);
        assert_eq!(out.children[0].csymbol_kind(), Some(CsymbolKind::Time));
        assert_eq!(out.children[1].csymbol_kind(), Some(CsymbolKind::Delay));
        assert_eq!(out.children[1].children.len(), 2);
        // The input is untouched.
        assert!(matches!(expr.children[0].kind, NodeKind::Name(_)));
    }

    #[test]
    fn test_bound_variables_shadow_bindings() {
        let bindings = SymbolBindings { time: Some("t".into()), ..Default::default() };
        let out = annotate(&AstNode::lambda(&["t"], AstNode::name("t")), &bindings);
        assert!(matches!(out.children[0].kind, NodeKind::Name(_)));
    }

    #[test]
    fn test_empty_bindings_borrow() {
        let expr = AstNode::name("t");
        assert!(matches!(annotate_math(&expr, &SymbolBindings::default()), Cow::Borrowed(_)));
    }
}
