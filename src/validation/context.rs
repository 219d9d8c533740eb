//! Everything a rule body may consult while it runs.
use super::config::ValidatorConfig;
use super::target::Target;
use crate::math::{annotate_math, AstNode};
use crate::model::{Document, Model, ModelIndex};
use crate::sbo::SboTaxonomy;
use crate::units::UnitDeriver;
use std::borrow::Cow;

/// Read-only state shared by every rule of one validation run.
pub struct ValidationContext<'a> {
    pub document: &'a Document,
    pub model: &'a Model,
    pub index: ModelIndex<'a>,
    pub config: &'a ValidatorConfig,
    pub taxonomy: &'a dyn SboTaxonomy,
}

impl<'a> ValidationContext<'a> {
    pub fn new(
        document: &'a Document,
        model: &'a Model,
        config: &'a ValidatorConfig,
        taxonomy: &'a dyn SboTaxonomy,
    ) -> Self {
        Self { document, model, index: ModelIndex::new(model), config, taxonomy }
    }

    pub fn level(&self) -> u32 {
        self.document.level
    }

    pub fn version(&self) -> u32 {
        self.document.version
    }

    pub fn is_at_least(&self, level: u32, version: u32) -> bool {
        self.document.is_at_least(level, version)
    }

    /// A unit deriver resolving names at model scope.
    pub fn deriver(&self) -> UnitDeriver<'_> {
        UnitDeriver::new(&self.index, self.level(), self.version())
    }

    /// A unit deriver that also sees the target's kinetic-law locals.
    pub fn deriver_for(&self, target: &Target<'a>) -> UnitDeriver<'_> {
        self.deriver().with_scope(target.kinetic_law())
    }

    /// The math a rule should inspect: the target's own tree, or an annotated
    /// copy when the run declares symbol bindings.
    pub fn math_of<'m>(&self, target: &Target<'m>) -> Option<Cow<'m, AstNode>> {
        target.math().map(|m| annotate_math(m, &self.config.symbols))
    }
}
