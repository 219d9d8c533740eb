//! Unit arithmetic for dimensional analysis.
//!
//! A [`CompositeUnit`] is a product of [`UnitTerm`]s, each one a base kind
//! raised to an exponent and scaled by `(multiplier * 10^scale)`. Two
//! comparisons are offered:
//!
//! - **equivalent**: same dimensions once everything is expanded to SI base
//!   kinds. `litre` is equivalent to `metre^3`, `gram` to `kilogram`.
//! - **identical**: same kinds and exponents after merging repeated kinds,
//!   and the same overall magnitude. `millimole` is identical to
//!   `mole * 10^-3` but not to `mole`.
pub mod derive;
pub mod kind;

pub use derive::{DerivedUnit, UnitDeriver};
pub use kind::{is_reserved_unit_id, UnitKind, BUILTIN_UNIT_IDS};

use crate::model::Unit;
use smallvec::SmallVec;
use std::fmt;

const EXPONENT_EPSILON: f64 = 1e-9;
const FACTOR_RELATIVE_EPSILON: f64 = 1e-9;

/// One factor of a composite unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitTerm {
    pub kind: UnitKind,
    pub exponent: f64,
    pub scale: i32,
    pub multiplier: f64,
    pub offset: f64,
}

impl UnitTerm {
    pub fn new(kind: UnitKind, exponent: f64) -> Self {
        Self { kind, exponent, scale: 0, multiplier: 1.0, offset: 0.0 }
    }

    /// `(multiplier * 10^scale)^exponent`.
    pub fn factor(&self) -> f64 {
        (self.multiplier * 10f64.powi(self.scale)).powf(self.exponent)
    }

    /// Converts a document unit. Returns `None` for unknown kind names.
    pub fn from_declared(unit: &Unit) -> Option<Self> {
        Some(Self {
            kind: UnitKind::parse(&unit.kind)?,
            exponent: unit.exponent,
            scale: unit.scale,
            multiplier: unit.multiplier,
            offset: unit.offset,
        })
    }
}

/// A product of unit terms. An empty term list means dimensionless.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompositeUnit {
    terms: SmallVec<[UnitTerm; 4]>,
}

fn exponents_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < EXPONENT_EPSILON
}

fn factors_equal(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    (a - b).abs() <= FACTOR_RELATIVE_EPSILON * a.abs().max(b.abs())
}

impl CompositeUnit {
    pub fn dimensionless() -> Self {
        Self::default()
    }

    pub fn from_kind(kind: UnitKind) -> Self {
        Self::from_terms([UnitTerm::new(kind, 1.0)])
    }

    pub fn from_terms(terms: impl IntoIterator<Item = UnitTerm>) -> Self {
        Self { terms: terms.into_iter().collect() }
    }

    /// Builds a composite from a document unit list. Unknown kinds are
    /// skipped; their syntax is reported by the unit-definition rules.
    pub fn from_declared(units: &[Unit]) -> Self {
        Self::from_terms(units.iter().filter_map(UnitTerm::from_declared))
    }

    pub fn terms(&self) -> &[UnitTerm] {
        &self.terms
    }

    /// The product of every term's magnitude.
    pub fn factor(&self) -> f64 {
        self.terms.iter().map(UnitTerm::factor).product()
    }

    /// Merges repeated kinds, drops zero exponents and dimensionless terms,
    /// and sorts by kind. The overall magnitude is preserved: merged terms
    /// carry it in their multiplier, and a leftover magnitude with no kind
    /// to hold it becomes a `dimensionless` term.
    pub fn simplify(&self) -> Self {
        let mut merged: Vec<(UnitKind, f64, f64)> = Vec::new(); // (kind, exponent, factor)
        let mut loose_factor = 1.0;
        for t in &self.terms {
            if t.kind == UnitKind::Dimensionless {
                loose_factor *= t.factor();
                continue;
            }
            match merged.iter_mut().find(|(k, _, _)| *k == t.kind) {
                Some(entry) => {
                    entry.1 += t.exponent;
                    entry.2 *= t.factor();
                }
                None => merged.push((t.kind, t.exponent, t.factor())),
            }
        }
        merged.sort_by(|a, b| a.0.cmp(&b.0));

        let mut terms: SmallVec<[UnitTerm; 4]> = SmallVec::new();
        for (kind, exponent, factor) in merged {
            if exponents_equal(exponent, 0.0) {
                loose_factor *= factor;
                continue;
            }
            terms.push(UnitTerm {
                kind,
                exponent,
                scale: 0,
                multiplier: factor.powf(1.0 / exponent),
                offset: 0.0,
            });
        }
        if !factors_equal(loose_factor, 1.0) {
            terms.push(UnitTerm { multiplier: loose_factor, ..UnitTerm::new(UnitKind::Dimensionless, 1.0) });
        }
        Self { terms }
    }

    /// Expands every term into SI base kinds and merges the result.
    /// Magnitudes are discarded.
    pub fn to_si(&self) -> Self {
        let expanded = self.terms.iter().flat_map(|t| {
            t.kind
                .si_expansion()
                .iter()
                .map(move |&(kind, e)| UnitTerm::new(kind, t.exponent * e as f64))
        });
        let simplified = Self::from_terms(expanded).simplify();
        Self::from_terms(
            simplified
                .terms
                .into_iter()
                .filter(|t| t.kind != UnitKind::Dimensionless)
                .map(|t| UnitTerm::new(t.kind, t.exponent)),
        )
    }

    /// Sorted `(kind, exponent)` pairs with dimensionless terms removed.
    fn signature(&self) -> Vec<(UnitKind, f64)> {
        self.terms
            .iter()
            .filter(|t| t.kind != UnitKind::Dimensionless)
            .map(|t| (t.kind, t.exponent))
            .collect()
    }

    fn signatures_match(a: &[(UnitKind, f64)], b: &[(UnitKind, f64)]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.0 == y.0 && exponents_equal(x.1, y.1))
    }

    pub fn equivalent(&self, other: &Self) -> bool {
        Self::signatures_match(&self.to_si().signature(), &other.to_si().signature())
    }

    pub fn identical(&self, other: &Self) -> bool {
        let a = self.simplify();
        let b = other.simplify();
        Self::signatures_match(&a.signature(), &b.signature()) && factors_equal(a.factor(), b.factor())
    }

    pub fn is_dimensionless(&self) -> bool {
        self.to_si().terms.is_empty()
    }

    pub fn multiply(&self, other: &Self) -> Self {
        Self::from_terms(self.terms.iter().chain(&other.terms).copied()).simplify()
    }

    pub fn divide(&self, other: &Self) -> Self {
        self.multiply(&other.pow(-1.0))
    }

    pub fn pow(&self, n: f64) -> Self {
        Self::from_terms(self.terms.iter().map(|t| UnitTerm { exponent: t.exponent * n, ..*t })).simplify()
    }

    /// True when every exponent, once simplified, is a multiple of `m`.
    /// Used to decide whether `root(m, x)` has expressible units.
    pub fn exponents_divisible_by(&self, m: i64) -> bool {
        if m == 0 {
            return false;
        }
        self.simplify().terms.iter().filter(|t| t.kind != UnitKind::Dimensionless).all(|t| {
            let q = t.exponent / m as f64;
            exponents_equal(q, q.round())
        })
    }
}

impl fmt::Display for CompositeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.terms.is_empty() {
            return write!(f, "dimensionless");
        }
        for (i, t) in self.terms.iter().enumerate() {
            if i > 0 {
                write!(f, " * ")?;
            }
            let magnitude = t.multiplier * 10f64.powi(t.scale);
            if factors_equal(magnitude, 1.0) {
                write!(f, "{}", t.kind)?;
            } else {
                write!(f, "({} {})", magnitude, t.kind)?;
            }
            if !exponents_equal(t.exponent, 1.0) {
                write!(f, "^{}", t.exponent)?;
            }
        }
        Ok(())
    }
}

// --- Unit Arithmetic Test Suite ---
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    fn unit(terms: &[(UnitKind, f64)]) -> CompositeUnit {
        CompositeUnit::from_terms(terms.iter().map(|&(k, e)| UnitTerm::new(k, e)))
    }

    #[rstest]
    #[case(unit(&[(UnitKind::Litre, 1.0)]), unit(&[(UnitKind::Metre, 3.0)]))]
    #[case(unit(&[(UnitKind::Gram, 1.0)]), unit(&[(UnitKind::Kilogram, 1.0)]))]
    #[case(unit(&[(UnitKind::Newton, 1.0)]), unit(&[(UnitKind::Kilogram, 1.0), (UnitKind::Metre, 1.0), (UnitKind::Second, -2.0)]))]
    #[case(unit(&[(UnitKind::Hertz, 1.0)]), unit(&[(UnitKind::Becquerel, 1.0)]))]
    #[case(unit(&[(UnitKind::Mole, 1.0), (UnitKind::Litre, -1.0)]), unit(&[(UnitKind::Metre, -3.0), (UnitKind::Mole, 1.0)]))]
    fn test_equivalent_through_si(#[case] a: CompositeUnit, #[case] b: CompositeUnit) {
        assert!(a.equivalent(&b), "{} should be equivalent to {}", a, b);
    }

    #[test]
    fn test_identical_requires_matching_magnitude() {
        let millimole = CompositeUnit::from_terms([UnitTerm { scale: -3, ..UnitTerm::new(UnitKind::Mole, 1.0) }]);
        let mole = CompositeUnit::from_kind(UnitKind::Mole);
        let thousandth = CompositeUnit::from_terms([
            UnitTerm::new(UnitKind::Mole, 1.0),
            UnitTerm { multiplier: 0.001, ..UnitTerm::new(UnitKind::Dimensionless, 1.0) },
        ]);
        assert!(millimole.equivalent(&mole));
        assert!(!millimole.identical(&mole));
        assert!(millimole.identical(&thousandth));
    }

    #[test]
    fn test_power_and_division() {
        let metre = CompositeUnit::from_kind(UnitKind::Metre);
        let area = metre.pow(2.0);
        assert_eq!(area.to_string(), "metre^2");
        assert!(area.divide(&metre).identical(&metre));
        assert!(area.divide(&area).is_dimensionless());
        assert!(area.exponents_divisible_by(2));
        assert!(!metre.exponents_divisible_by(2));
    }

    #[test]
    fn test_dimensionless_like_kinds() {
        assert!(CompositeUnit::from_kind(UnitKind::Radian).is_dimensionless());
        assert!(CompositeUnit::dimensionless().is_dimensionless());
        assert!(!CompositeUnit::from_kind(UnitKind::Item).is_dimensionless());
    }

    fn any_kind() -> impl Strategy<Value = UnitKind> {
        prop::sample::select(vec![
            UnitKind::Metre,
            UnitKind::Second,
            UnitKind::Mole,
            UnitKind::Litre,
            UnitKind::Gram,
            UnitKind::Joule,
            UnitKind::Item,
        ])
    }

    fn any_unit() -> impl Strategy<Value = CompositeUnit> {
        prop::collection::vec((any_kind(), -3i32..=3), 0..5)
            .prop_map(|ts| CompositeUnit::from_terms(ts.into_iter().map(|(k, e)| UnitTerm::new(k, e as f64))))
    }

    proptest! {
        #[test]
        fn prop_comparisons_are_symmetric(a in any_unit(), b in any_unit()) {
            prop_assert_eq!(a.equivalent(&b), b.equivalent(&a));
            prop_assert_eq!(a.identical(&b), b.identical(&a));
        }

        #[test]
        fn prop_term_order_does_not_matter(terms in prop::collection::vec((any_kind(), -3i32..=3), 0..5)) {
            let forward = CompositeUnit::from_terms(terms.iter().map(|&(k, e)| UnitTerm::new(k, e as f64)));
            let backward = CompositeUnit::from_terms(terms.iter().rev().map(|&(k, e)| UnitTerm::new(k, e as f64)));
            prop_assert!(forward.identical(&backward));
            prop_assert!(forward.equivalent(&backward));
        }

        #[test]
        fn prop_identical_implies_equivalent(a in any_unit(), b in any_unit()) {
            if a.identical(&b) {
                prop_assert!(a.equivalent(&b));
            }
        }
    }
}
