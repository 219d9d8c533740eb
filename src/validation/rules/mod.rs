//! Built-in rule bodies, grouped by the part of the document they police.
//!
//! Every module exposes `descriptors()`; [`builtin_descriptors`] gathers them
//! for [`RuleRegistry::builtin`](super::registry::RuleRegistry::builtin).
pub(crate) mod assignments;
pub(crate) mod compartments;
pub(crate) mod events;
pub(crate) mod identifiers;
pub(crate) mod math;
pub(crate) mod modeling;
pub(crate) mod reactions;
pub(crate) mod sbo;
pub(crate) mod species;
pub(crate) mod unit_definitions;
pub(crate) mod unit_warnings;
pub(crate) mod units;

use super::context::ValidationContext;
use super::cycles;
use super::error::RuleFault;
use super::overdetermined;
use super::registry::RuleDescriptor;
use super::target::Target;
use crate::model::SymbolRef;

pub fn builtin_descriptors() -> Vec<RuleDescriptor> {
    let mut all = Vec::new();
    all.extend(identifiers::descriptors());
    all.extend(math::descriptors());
    all.extend(unit_definitions::descriptors());
    all.extend(compartments::descriptors());
    all.extend(species::descriptors());
    all.extend(assignments::descriptors());
    all.extend(reactions::descriptors());
    all.extend(events::descriptors());
    all.extend(units::descriptors());
    all.extend(unit_warnings::descriptors());
    all.extend(sbo::descriptors());
    all.extend(modeling::descriptors());
    all.extend(cycles::descriptors());
    all.extend(overdetermined::descriptors());
    all
}

// --- Preconditions ---

pub(crate) fn level2_plus(ctx: &ValidationContext<'_>) -> bool {
    ctx.level() >= 2
}

pub(crate) fn level3_plus(ctx: &ValidationContext<'_>) -> bool {
    ctx.level() >= 3
}

pub(crate) fn before_level3(ctx: &ValidationContext<'_>) -> bool {
    ctx.level() < 3
}

pub(crate) fn from_l2v2(ctx: &ValidationContext<'_>) -> bool {
    ctx.is_at_least(2, 2)
}

pub(crate) fn before_l3v2(ctx: &ValidationContext<'_>) -> bool {
    !ctx.is_at_least(3, 2)
}

// --- Shared helpers ---

/// Destructures a target, or faults when dispatch handed over the wrong kind.
macro_rules! expect_target {
    ($target:expr, $pattern:pat => $out:expr) => {
        match $target {
            $pattern => $out,
            other => return Err($crate::validation::error::RuleFault::UnexpectedTarget(other.label())),
        }
    };
}
pub(crate) use expect_target;

/// The target's math, or a fault if a math rule was dispatched to an object without any.
pub(crate) fn require_math<'m>(
    ctx: &ValidationContext<'_>,
    target: &Target<'m>,
) -> Result<Option<std::borrow::Cow<'m, crate::math::AstNode>>, RuleFault> {
    if !super::target::KindMask::MATH.contains(target.kind()) {
        return Err(RuleFault::UnexpectedTarget(target.label()));
    }
    Ok(ctx.math_of(target))
}

/// Walks `math` until `probe` returns a message and reports that first one.
/// Math rules file at most one diagnostic per object.
pub(crate) fn report_first(
    math: &crate::math::AstNode,
    out: &mut super::registry::Findings,
    mut probe: impl FnMut(&crate::math::AstNode) -> Option<String>,
) {
    use crate::math::{walk, AstNode, Descend};
    let mut found: Option<String> = None;
    walk(math, &mut |node: &AstNode| {
        if found.is_some() {
            return Descend::Skip;
        }
        found = probe(node);
        Descend::Children
    });
    if let Some(message) = found {
        out.report(message);
    }
}

/// An identifier as the SId production defines it: a letter or underscore
/// followed by letters, digits and underscores.
pub(crate) fn is_valid_sid(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// An XML NCName, the syntax of metaids.
pub(crate) fn is_valid_metaid(id: &str) -> bool {
    let mut chars = id.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Resolves a name that an assignment, rule or event may set.
pub(crate) fn assignable<'a>(ctx: &ValidationContext<'a>, id: &str) -> Option<SymbolRef<'a>> {
    match ctx.index.symbol(id)? {
        s @ (SymbolRef::Compartment(_) | SymbolRef::Species(_) | SymbolRef::Parameter(_)) => Some(s),
        s @ SymbolRef::SpeciesReference { .. } if ctx.level() >= 3 => Some(s),
        _ => None,
    }
}

/// Whether an assignable symbol is declared constant.
pub(crate) fn is_constant_symbol(ctx: &ValidationContext<'_>, symbol: &SymbolRef<'_>) -> bool {
    let level = ctx.level();
    match symbol {
        SymbolRef::Compartment(c) => c.is_constant(level),
        SymbolRef::Species(s) => s.is_constant(),
        SymbolRef::Parameter(p) => p.is_constant(level),
        SymbolRef::SpeciesReference { reference, .. } => reference.constant.unwrap_or(false),
        _ => false,
    }
}

pub(crate) fn assignable_kinds(ctx: &ValidationContext<'_>) -> &'static str {
    if ctx.level() >= 3 {
        "Compartment, Species, Parameter or SpeciesReference"
    } else {
        "Compartment, Species or Parameter"
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Helpers for running a single rule against a document in tests.
    use crate::model::{Document, Model};
    use crate::validation::{Diagnostic, ValidatorConfig, Validator};

    pub fn validate(level: u32, version: u32, model: Model) -> Vec<Diagnostic> {
        let config = ValidatorConfig {
            categories: crate::validation::CategorySet { modeling_practice: true, ..Default::default() },
            ..Default::default()
        };
        Validator::new(config).validate(&Document::new(level, version, model)).into_iter().collect()
    }

    /// The entity ids a given rule reported, in order.
    pub fn fired(diagnostics: &[Diagnostic], rule_id: u32) -> Vec<Option<String>> {
        diagnostics.iter().filter(|d| d.rule_id == rule_id).map(|d| d.entity_id.clone()).collect()
    }

    pub fn count(diagnostics: &[Diagnostic], rule_id: u32) -> usize {
        diagnostics.iter().filter(|d| d.rule_id == rule_id).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("k1", true)]
    #[case("_x", true)]
    #[case("1k", false)]
    #[case("a-b", false)]
    #[case("", false)]
    fn test_sid_syntax(#[case] id: &str, #[case] expected: bool) {
        assert_eq!(is_valid_sid(id), expected);
    }

    #[rstest]
    #[case("meta_1", true)]
    #[case("m.1-x", true)]
    #[case("1meta", false)]
    #[case("a:b", false)]
    fn test_metaid_syntax(#[case] id: &str, #[case] expected: bool) {
        assert_eq!(is_valid_metaid(id), expected);
    }
}
