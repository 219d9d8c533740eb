//! The read-only document object model consumed by the validator.
//!
//! These types are built by an external parser or host adapter. The engine
//! never mutates them: every check takes `&Model` and works through accessors
//! and the [`ModelIndex`] lookup tables.
pub mod entities;
pub mod index;

pub use entities::*;
pub use index::{ModelIndex, SymbolRef};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where the parser found an object in the source document, if recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceLocation {
    pub line: u32,
    pub column: u32,
}

/// Attributes every model object may carry regardless of its kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Base {
    pub metaid: Option<String>,
    pub sbo_term: Option<u32>,
    pub location: Option<SourceLocation>,
}

impl Base {
    pub fn at(line: u32, column: u32) -> Self {
        Self {
            location: Some(SourceLocation { line, column }),
            ..Default::default()
        }
    }
}

#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Malformed document structure: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The top-level container: a language level/version pair and at most one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub level: u32,
    pub version: u32,
    pub model: Option<Model>,
}

impl Document {
    pub fn new(level: u32, version: u32, model: Model) -> Self {
        Self { level, version, model: Some(model) }
    }

    /// Builds a document from a host-side JSON structure.
    pub fn from_json_str(s: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(s)?)
    }

    /// True when this document's (level, version) is at least `(level, version)`.
    pub fn is_at_least(&self, level: u32, version: u32) -> bool {
        (self.level, self.version) >= (level, version)
    }
}

/// A lightweight view of one object for checks that apply to every kind
/// (metaid uniqueness, identifier syntax, SBO term syntax).
#[derive(Debug, Clone, Copy)]
pub struct ObjectView<'a> {
    pub kind: &'static str,
    pub id: Option<&'a str>,
    pub base: &'a Base,
}

impl<'a> ObjectView<'a> {
    pub fn new(kind: &'static str, id: Option<&'a str>, base: &'a Base) -> Self {
        Self { kind, id, base }
    }
}

/// The model: ordered, identifier-keyed collections of every entity kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Model {
    pub id: Option<String>,
    pub name: Option<String>,
    pub base: Base,

    // Model-wide default units (level 3).
    pub substance_units: Option<String>,
    pub time_units: Option<String>,
    pub volume_units: Option<String>,
    pub area_units: Option<String>,
    pub length_units: Option<String>,
    pub extent_units: Option<String>,
    pub conversion_factor: Option<String>,

    pub function_definitions: Vec<FunctionDefinition>,
    pub unit_definitions: Vec<UnitDefinition>,
    pub compartment_types: Vec<CompartmentType>,
    pub species_types: Vec<SpeciesType>,
    pub compartments: Vec<Compartment>,
    pub species: Vec<Species>,
    pub parameters: Vec<Parameter>,
    pub initial_assignments: Vec<InitialAssignment>,
    pub rules: Vec<Rule>,
    pub constraints: Vec<Constraint>,
    pub reactions: Vec<Reaction>,
    pub events: Vec<Event>,
}

impl Model {
    pub fn new(id: &str) -> Self {
        Self { id: Some(id.to_string()), ..Default::default() }
    }

    /// Every object in document order, with its kind label.
    pub fn objects(&self) -> Vec<ObjectView<'_>> {
        let view = ObjectView::new;
        let mut out = vec![view("Model", self.id.as_deref(), &self.base)];

        out.extend(self.function_definitions.iter().map(|f| view("FunctionDefinition", Some(f.id.as_str()), &f.base)));
        for ud in &self.unit_definitions {
            out.push(view("UnitDefinition", Some(ud.id.as_str()), &ud.base));
            out.extend(ud.units.iter().map(|u| view("Unit", None, &u.base)));
        }
        out.extend(self.compartment_types.iter().map(|c| view("CompartmentType", Some(c.id.as_str()), &c.base)));
        out.extend(self.species_types.iter().map(|s| view("SpeciesType", Some(s.id.as_str()), &s.base)));
        out.extend(self.compartments.iter().map(|c| view("Compartment", Some(c.id.as_str()), &c.base)));
        out.extend(self.species.iter().map(|s| view("Species", Some(s.id.as_str()), &s.base)));
        out.extend(self.parameters.iter().map(|p| view("Parameter", Some(p.id.as_str()), &p.base)));
        out.extend(self.initial_assignments.iter().map(|ia| view("InitialAssignment", None, &ia.base)));
        out.extend(self.rules.iter().map(|r| view(r.kind.label(), None, &r.base)));
        out.extend(self.constraints.iter().map(|c| view("Constraint", None, &c.base)));
        for r in &self.reactions {
            out.push(view("Reaction", Some(r.id.as_str()), &r.base));
            for sr in r.reactants.iter().chain(&r.products) {
                out.push(view("SpeciesReference", sr.id.as_deref(), &sr.base));
            }
            for m in &r.modifiers {
                out.push(view("ModifierSpeciesReference", m.id.as_deref(), &m.base));
            }
            if let Some(kl) = &r.kinetic_law {
                out.push(view("KineticLaw", None, &kl.base));
                out.extend(kl.parameters.iter().map(|p| view("LocalParameter", Some(p.id.as_str()), &p.base)));
            }
        }
        for e in &self.events {
            out.push(view("Event", e.id.as_deref(), &e.base));
            if let Some(t) = &e.trigger {
                out.push(view("Trigger", None, &t.base));
            }
            if let Some(d) = &e.delay {
                out.push(view("Delay", None, &d.base));
            }
            if let Some(p) = &e.priority {
                out.push(view("Priority", None, &p.base));
            }
            out.extend(e.assignments.iter().map(|ea| view("EventAssignment", None, &ea.base)));
        }
        out
    }
}
