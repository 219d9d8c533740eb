//! Entity types owned by a [`Model`](super::Model).
//!
//! Optional attributes are `Option<T>`: `None` means "not set in the
//! document". Level-dependent defaults are only applied through the accessor
//! methods, so checks can always tell "absent" from "equal to the default".
use super::Base;
use crate::math::Math;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FunctionDefinition {
    pub id: String,
    pub name: Option<String>,
    pub math: Option<Math>,
    pub base: Base,
}

impl FunctionDefinition {
    pub fn new(id: &str, math: Math) -> Self {
        Self { id: id.into(), math: Some(math), ..Default::default() }
    }
}

/// One term of a unit definition as written in the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Unit {
    /// The base-unit name, kept verbatim so invalid kinds can be reported.
    pub kind: String,
    pub exponent: f64,
    pub scale: i32,
    pub multiplier: f64,
    pub offset: f64,
    pub base: Base,
}

impl Default for Unit {
    fn default() -> Self {
        Self {
            kind: String::new(),
            exponent: 1.0,
            scale: 0,
            multiplier: 1.0,
            offset: 0.0,
            base: Base::default(),
        }
    }
}

impl Unit {
    pub fn new(kind: &str, exponent: f64) -> Self {
        Self { kind: kind.into(), exponent, ..Default::default() }
    }

    pub fn scaled(kind: &str, exponent: f64, scale: i32) -> Self {
        Self { kind: kind.into(), exponent, scale, ..Default::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitDefinition {
    pub id: String,
    pub name: Option<String>,
    pub units: Vec<Unit>,
    pub base: Base,
}

impl UnitDefinition {
    pub fn new(id: &str, units: Vec<Unit>) -> Self {
        Self { id: id.into(), units, ..Default::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompartmentType {
    pub id: String,
    pub base: Base,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesType {
    pub id: String,
    pub base: Base,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Compartment {
    pub id: String,
    pub name: Option<String>,
    pub compartment_type: Option<String>,
    pub spatial_dimensions: Option<f64>,
    pub size: Option<f64>,
    pub units: Option<String>,
    pub outside: Option<String>,
    pub constant: Option<bool>,
    pub base: Base,
}

impl Compartment {
    pub fn new(id: &str) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    pub fn with_outside(mut self, outside: &str) -> Self {
        self.outside = Some(outside.into());
        self
    }

    pub fn with_size(mut self, size: f64) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_dimensions(mut self, dims: f64) -> Self {
        self.spatial_dimensions = Some(dims);
        self
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_constant(mut self, constant: bool) -> Self {
        self.constant = Some(constant);
        self
    }

    /// Spatial dimensions, defaulting to 3 before level 3 (where it has no default).
    pub fn dimensions(&self, level: u32) -> Option<f64> {
        self.spatial_dimensions.or(if level < 3 { Some(3.0) } else { None })
    }

    pub fn is_constant(&self, level: u32) -> bool {
        self.constant.unwrap_or(level < 3)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Species {
    pub id: String,
    pub name: Option<String>,
    pub compartment: Option<String>,
    pub species_type: Option<String>,
    pub initial_amount: Option<f64>,
    pub initial_concentration: Option<f64>,
    pub substance_units: Option<String>,
    pub spatial_size_units: Option<String>,
    pub has_only_substance_units: Option<bool>,
    pub boundary_condition: Option<bool>,
    pub constant: Option<bool>,
    pub conversion_factor: Option<String>,
    pub base: Base,
}

impl Species {
    pub fn new(id: &str, compartment: &str) -> Self {
        Self {
            id: id.into(),
            compartment: Some(compartment.into()),
            ..Default::default()
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.initial_amount = Some(amount);
        self
    }

    pub fn with_boundary(mut self, boundary: bool) -> Self {
        self.boundary_condition = Some(boundary);
        self
    }

    pub fn with_constant(mut self, constant: bool) -> Self {
        self.constant = Some(constant);
        self
    }

    pub fn with_substance_units(mut self, units: &str) -> Self {
        self.substance_units = Some(units.into());
        self
    }

    pub fn with_only_substance_units(mut self, only: bool) -> Self {
        self.has_only_substance_units = Some(only);
        self
    }

    pub fn is_constant(&self) -> bool {
        self.constant.unwrap_or(false)
    }

    pub fn is_boundary(&self) -> bool {
        self.boundary_condition.unwrap_or(false)
    }

    pub fn only_substance_units(&self) -> bool {
        self.has_only_substance_units.unwrap_or(false)
    }
}

/// A global parameter, or a local parameter when owned by a [`KineticLaw`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameter {
    pub id: String,
    pub name: Option<String>,
    pub value: Option<f64>,
    pub units: Option<String>,
    pub constant: Option<bool>,
    pub base: Base,
}

impl Parameter {
    pub fn new(id: &str) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.into());
        self
    }

    pub fn with_constant(mut self, constant: bool) -> Self {
        self.constant = Some(constant);
        self
    }

    /// Level 2 defaults `constant` to true; level 1 has no such attribute.
    pub fn is_constant(&self, level: u32) -> bool {
        self.constant.unwrap_or(level == 2)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialAssignment {
    pub symbol: String,
    pub math: Option<Math>,
    pub base: Base,
}

impl InitialAssignment {
    pub fn new(symbol: &str, math: Math) -> Self {
        Self { symbol: symbol.into(), math: Some(math), ..Default::default() }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleKind {
    #[default]
    Algebraic,
    Assignment,
    Rate,
}

impl RuleKind {
    pub fn label(&self) -> &'static str {
        match self {
            RuleKind::Algebraic => "AlgebraicRule",
            RuleKind::Assignment => "AssignmentRule",
            RuleKind::Rate => "RateRule",
        }
    }
}

/// A model-level mathematical rule. Algebraic rules carry no variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rule {
    pub kind: RuleKind,
    pub variable: Option<String>,
    pub math: Option<Math>,
    pub base: Base,
}

impl Rule {
    pub fn assignment(variable: &str, math: Math) -> Self {
        Self {
            kind: RuleKind::Assignment,
            variable: Some(variable.into()),
            math: Some(math),
            base: Base::default(),
        }
    }

    pub fn rate(variable: &str, math: Math) -> Self {
        Self {
            kind: RuleKind::Rate,
            variable: Some(variable.into()),
            math: Some(math),
            base: Base::default(),
        }
    }

    pub fn algebraic(math: Math) -> Self {
        Self { kind: RuleKind::Algebraic, variable: None, math: Some(math), base: Base::default() }
    }

    /// The assigned variable of an assignment or rate rule.
    pub fn target(&self) -> Option<&str> {
        match self.kind {
            RuleKind::Algebraic => None,
            _ => self.variable.as_deref(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraint {
    pub math: Option<Math>,
    pub message: Option<String>,
    pub base: Base,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeciesReference {
    pub id: Option<String>,
    pub species: String,
    pub stoichiometry: Option<f64>,
    /// Level 2 only: stoichiometry given by an expression.
    pub stoichiometry_math: Option<Math>,
    /// Level 3 only.
    pub constant: Option<bool>,
    pub base: Base,
}

impl SpeciesReference {
    pub fn new(species: &str) -> Self {
        Self { species: species.into(), ..Default::default() }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.into());
        self
    }

    /// True when the stoichiometry may change during a simulation.
    pub fn has_variable_stoichiometry(&self, level: u32) -> bool {
        if level >= 3 {
            self.constant == Some(false)
        } else {
            self.stoichiometry_math.is_some()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModifierSpeciesReference {
    pub id: Option<String>,
    pub species: String,
    pub base: Base,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KineticLaw {
    pub math: Option<Math>,
    /// Local parameters, visible only inside this law's math.
    pub parameters: Vec<Parameter>,
    pub base: Base,
}

impl KineticLaw {
    pub fn new(math: Math) -> Self {
        Self { math: Some(math), ..Default::default() }
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn local_parameter(&self, id: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.id == id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Reaction {
    pub id: String,
    pub name: Option<String>,
    pub reversible: Option<bool>,
    pub fast: Option<bool>,
    pub compartment: Option<String>,
    pub reactants: Vec<SpeciesReference>,
    pub products: Vec<SpeciesReference>,
    pub modifiers: Vec<ModifierSpeciesReference>,
    pub kinetic_law: Option<KineticLaw>,
    pub base: Base,
}

impl Reaction {
    pub fn new(id: &str) -> Self {
        Self { id: id.into(), ..Default::default() }
    }

    pub fn with_reactant(mut self, species: &str) -> Self {
        self.reactants.push(SpeciesReference::new(species));
        self
    }

    pub fn with_product(mut self, species: &str) -> Self {
        self.products.push(SpeciesReference::new(species));
        self
    }

    pub fn with_modifier(mut self, species: &str) -> Self {
        self.modifiers.push(ModifierSpeciesReference { species: species.into(), ..Default::default() });
        self
    }

    pub fn with_kinetic_law(mut self, law: KineticLaw) -> Self {
        self.kinetic_law = Some(law);
        self
    }

    /// Reactants followed by products.
    pub fn participants(&self) -> impl Iterator<Item = &SpeciesReference> {
        self.reactants.iter().chain(&self.products)
    }

    pub fn involves_species(&self, species: &str) -> bool {
        self.participants().any(|sr| sr.species == species)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Trigger {
    pub math: Option<Math>,
    pub initial_value: Option<bool>,
    pub persistent: Option<bool>,
    pub base: Base,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Delay {
    pub math: Option<Math>,
    pub base: Base,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Priority {
    pub math: Option<Math>,
    pub base: Base,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventAssignment {
    pub variable: String,
    pub math: Option<Math>,
    pub base: Base,
}

impl EventAssignment {
    pub fn new(variable: &str, math: Math) -> Self {
        Self { variable: variable.into(), math: Some(math), ..Default::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Event {
    pub id: Option<String>,
    pub name: Option<String>,
    pub use_values_from_trigger_time: Option<bool>,
    /// Levels 2.1 and 2.2 only.
    pub time_units: Option<String>,
    pub trigger: Option<Trigger>,
    pub delay: Option<Delay>,
    pub priority: Option<Priority>,
    pub assignments: Vec<EventAssignment>,
    pub base: Base,
}

impl Event {
    pub fn new(id: &str, trigger: Math) -> Self {
        Self {
            id: Some(id.into()),
            trigger: Some(Trigger { math: Some(trigger), ..Default::default() }),
            ..Default::default()
        }
    }

    pub fn with_assignment(mut self, assignment: EventAssignment) -> Self {
        self.assignments.push(assignment);
        self
    }

    pub fn with_delay(mut self, math: Math) -> Self {
        self.delay = Some(Delay { math: Some(math), base: Base::default() });
        self
    }
}
