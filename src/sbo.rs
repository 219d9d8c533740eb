//! Systems Biology Ontology lookups.
//!
//! The SBO-placement rules only need "is term X a descendant of branch Y".
//! [`SboTaxonomy`] is that question; [`BuiltinTaxonomy`] answers it from a
//! compact parent table covering the branch roots and the terms models use
//! most. A host with the full ontology can supply its own implementation.
use std::collections::HashMap;

pub const MATHEMATICAL_EXPRESSION: u32 = 64;
pub const RATE_LAW: u32 = 1;
pub const QUANTITATIVE_PARAMETER: u32 = 2;
pub const PARTICIPANT_ROLE: u32 = 3;
pub const MODELLING_FRAMEWORK: u32 = 4;
pub const OCCURRING_ENTITY: u32 = 231;
pub const PHYSICAL_ENTITY: u32 = 236;
pub const MATERIAL_ENTITY: u32 = 240;

/// The largest value an `SBO:nnnnnnn` identifier can carry.
pub const MAX_TERM: u32 = 9_999_999;

/// Formats a term number the way documents spell it.
pub fn format_term(term: u32) -> String {
    format!("SBO:{:07}", term)
}

pub trait SboTaxonomy: Send + Sync {
    /// Whether the taxonomy has any information about `term`.
    fn knows(&self, term: u32) -> bool;

    /// Whether `term` equals `ancestor` or descends from it.
    fn is_a(&self, term: u32, ancestor: u32) -> bool;
}

/// (child, parent) pairs.
const PARENTS: &[(u32, u32)] = &[
    // Branch roots
    (MATHEMATICAL_EXPRESSION, 0),
    (545, 0),
    (PARTICIPANT_ROLE, 0),
    (MODELLING_FRAMEWORK, 0),
    (OCCURRING_ENTITY, 0),
    (PHYSICAL_ENTITY, 0),
    // Mathematical expressions and rate laws
    (RATE_LAW, MATHEMATICAL_EXPRESSION),
    (12, RATE_LAW),
    (41, 12),
    (42, 12),
    (28, RATE_LAW),
    (29, 28),
    (269, RATE_LAW),
    // Systems description parameters
    (QUANTITATIVE_PARAMETER, 545),
    (9, QUANTITATIVE_PARAMETER),
    (35, 9),
    (38, 9),
    (27, QUANTITATIVE_PARAMETER),
    (186, QUANTITATIVE_PARAMETER),
    (196, QUANTITATIVE_PARAMETER),
    (256, QUANTITATIVE_PARAMETER),
    // Participant roles
    (10, PARTICIPANT_ROLE),
    (11, PARTICIPANT_ROLE),
    (19, PARTICIPANT_ROLE),
    (13, 19),
    (20, 19),
    (459, 19),
    (336, PARTICIPANT_ROLE),
    // Modelling frameworks
    (62, MODELLING_FRAMEWORK),
    (63, MODELLING_FRAMEWORK),
    (624, MODELLING_FRAMEWORK),
    (293, 62),
    (292, 62),
    // Occurring entities
    (375, OCCURRING_ENTITY),
    (167, 375),
    (176, 167),
    (185, 167),
    (393, 375),
    (394, 375),
    (342, OCCURRING_ENTITY),
    // Physical entities
    (MATERIAL_ENTITY, PHYSICAL_ENTITY),
    (247, MATERIAL_ENTITY),
    (245, MATERIAL_ENTITY),
    (252, 245),
    (250, 245),
    (290, MATERIAL_ENTITY),
];

pub struct BuiltinTaxonomy {
    parent: HashMap<u32, u32>,
}

impl BuiltinTaxonomy {
    pub fn new() -> Self {
        Self { parent: PARENTS.iter().copied().collect() }
    }
}

impl Default for BuiltinTaxonomy {
    fn default() -> Self {
        Self::new()
    }
}

impl SboTaxonomy for BuiltinTaxonomy {
    fn knows(&self, term: u32) -> bool {
        self.parent.contains_key(&term)
    }

    fn is_a(&self, term: u32, ancestor: u32) -> bool {
        let mut current = term;
        // The table is a tree, so the walk is bounded by its depth.
        for _ in 0..=self.parent.len() {
            if current == ancestor {
                return true;
            }
            match self.parent.get(&current) {
                Some(&p) if p != current => current = p,
                _ => return false,
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(41, RATE_LAW, true)]
    #[case(41, MATHEMATICAL_EXPRESSION, true)]
    #[case(11, PARTICIPANT_ROLE, true)]
    #[case(11, MATERIAL_ENTITY, false)]
    #[case(252, MATERIAL_ENTITY, true)]
    #[case(176, OCCURRING_ENTITY, true)]
    fn test_ancestry(#[case] term: u32, #[case] ancestor: u32, #[case] expected: bool) {
        assert_eq!(BuiltinTaxonomy::new().is_a(term, ancestor), expected);
    }

    #[test]
    fn test_unknown_terms_are_not_known() {
        let t = BuiltinTaxonomy::new();
        assert!(!t.knows(1_234_567));
        assert!(t.knows(247));
        assert_eq!(format_term(247), "SBO:0000247");
    }
}
