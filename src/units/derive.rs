//! Derives the units of an expression from the units of the symbols it uses.
//!
//! The deriver tracks an "undeclared" taint: a bare number, a parameter with
//! no units, or a call that cannot be resolved all make the result only
//! partially known. Consistency rules skip comparisons against tainted units
//! and leave them to the advisory tier.
use super::{CompositeUnit, UnitKind};
use crate::math::{expand_function_call, static_value, AstNode, CsymbolKind, NodeKind, Operator};
use crate::model::{Compartment, KineticLaw, ModelIndex, Parameter, Species, SymbolRef};

const MAX_CALL_DEPTH: usize = 32;

/// The units of an expression plus whether any part of it was undeclared.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedUnit {
    pub unit: CompositeUnit,
    pub undeclared: bool,
}

impl DerivedUnit {
    pub fn declared(unit: CompositeUnit) -> Self {
        Self { unit, undeclared: false }
    }

    pub fn undeclared() -> Self {
        Self { unit: CompositeUnit::dimensionless(), undeclared: true }
    }

    fn from_option(unit: Option<CompositeUnit>) -> Self {
        unit.map(Self::declared).unwrap_or_else(Self::undeclared)
    }
}

pub struct UnitDeriver<'a> {
    index: &'a ModelIndex<'a>,
    level: u32,
    version: u32,
    scope: Option<&'a KineticLaw>,
}

impl<'a> UnitDeriver<'a> {
    pub fn new(index: &'a ModelIndex<'a>, level: u32, version: u32) -> Self {
        Self { index, level, version, scope: None }
    }

    /// Resolves names against this kinetic law's local parameters first.
    pub fn with_scope(mut self, law: Option<&'a KineticLaw>) -> Self {
        self.scope = law;
        self
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    // --- Unit references ---

    fn builtin(&self, name: &str) -> Option<CompositeUnit> {
        if self.level >= 3 {
            return None;
        }
        Some(match name {
            "substance" => CompositeUnit::from_kind(UnitKind::Mole),
            "volume" => CompositeUnit::from_kind(UnitKind::Litre),
            "area" => CompositeUnit::from_kind(UnitKind::Metre).pow(2.0),
            "length" => CompositeUnit::from_kind(UnitKind::Metre),
            "time" => CompositeUnit::from_kind(UnitKind::Second),
            _ => return None,
        })
    }

    /// Resolves a units attribute: a unit definition, a base kind, or (before
    /// level 3) a built-in name.
    pub fn resolve(&self, name: &str) -> Option<CompositeUnit> {
        if let Some(ud) = self.index.unit_definition(name) {
            return Some(CompositeUnit::from_declared(&ud.units));
        }
        if let Some(kind) = UnitKind::parse(name) {
            return Some(CompositeUnit::from_kind(kind));
        }
        self.builtin(name)
    }

    /// A model-wide default: the level 3 model attribute, or the built-in
    /// (possibly redefined) unit of the same name before level 3.
    fn model_default(&self, builtin: &str, attribute: Option<&str>) -> Option<CompositeUnit> {
        if self.level >= 3 {
            attribute.and_then(|a| self.resolve(a))
        } else {
            self.resolve(builtin)
        }
    }

    pub fn time_units(&self) -> Option<CompositeUnit> {
        self.model_default("time", self.index.model().time_units.as_deref())
    }

    pub fn substance_units(&self) -> Option<CompositeUnit> {
        self.model_default("substance", self.index.model().substance_units.as_deref())
    }

    /// Units of a reaction rate: extent per time in level 3, substance per time before.
    pub fn reaction_rate_units(&self) -> Option<CompositeUnit> {
        let extent = if self.level >= 3 {
            self.index.model().extent_units.as_deref().and_then(|e| self.resolve(e))
        } else {
            self.substance_units()
        };
        Some(extent?.divide(&self.time_units()?))
    }

    pub fn compartment_units(&self, c: &Compartment) -> Option<CompositeUnit> {
        if let Some(u) = &c.units {
            return self.resolve(u);
        }
        let model = self.index.model();
        match c.dimensions(self.level)? {
            d if d == 3.0 => self.model_default("volume", model.volume_units.as_deref()),
            d if d == 2.0 => self.model_default("area", model.area_units.as_deref()),
            d if d == 1.0 => self.model_default("length", model.length_units.as_deref()),
            d if d == 0.0 => Some(CompositeUnit::dimensionless()),
            _ => None,
        }
    }

    pub fn species_substance_units(&self, s: &Species) -> Option<CompositeUnit> {
        match &s.substance_units {
            Some(u) => self.resolve(u),
            None => self.substance_units(),
        }
    }

    /// Amount units when the species is amount-valued, otherwise concentration.
    pub fn species_units(&self, s: &Species) -> Option<CompositeUnit> {
        let substance = self.species_substance_units(s)?;
        if s.only_substance_units() {
            return Some(substance);
        }
        let compartment = s.compartment.as_deref().and_then(|c| self.index.compartment(c));
        if compartment.and_then(|c| c.dimensions(self.level)) == Some(0.0) {
            return Some(substance);
        }
        let size = match (&s.spatial_size_units, compartment) {
            (Some(u), _) => self.resolve(u)?,
            (None, Some(c)) => self.compartment_units(c)?,
            (None, None) => return None,
        };
        Some(substance.divide(&size))
    }

    pub fn parameter_units(&self, p: &Parameter) -> Option<CompositeUnit> {
        p.units.as_deref().and_then(|u| self.resolve(u))
    }

    /// Units of a named symbol as it would appear inside math.
    pub fn symbol_units(&self, id: &str) -> Option<CompositeUnit> {
        if let Some(p) = self.scope.and_then(|law| law.local_parameter(id)) {
            return self.parameter_units(p);
        }
        match self.index.symbol(id)? {
            SymbolRef::Compartment(c) => self.compartment_units(c),
            SymbolRef::Species(s) => self.species_units(s),
            SymbolRef::Parameter(p) => self.parameter_units(p),
            SymbolRef::Reaction(_) => self.reaction_rate_units(),
            SymbolRef::SpeciesReference { .. } => Some(CompositeUnit::dimensionless()),
            _ => None,
        }
    }

    /// The fixed numeric value of a name, if it has one: a constant local or
    /// global parameter with a value.
    pub fn fixed_value(&self, id: &str) -> Option<f64> {
        if let Some(p) = self.scope.and_then(|law| law.local_parameter(id)) {
            return p.value;
        }
        match self.index.symbol(id)? {
            SymbolRef::Parameter(p) if p.is_constant(self.level) => p.value,
            _ => None,
        }
    }

    pub fn static_value(&self, node: &AstNode) -> Option<f64> {
        static_value(node, &|id| self.fixed_value(id))
    }

    // --- Derivation ---

    pub fn derive(&self, node: &AstNode) -> DerivedUnit {
        self.derive_at(node, 0)
    }

    fn pick_reference(derived: Vec<DerivedUnit>) -> DerivedUnit {
        let declared = derived.iter().position(|d| !d.undeclared);
        match declared {
            Some(i) => derived.into_iter().nth(i).unwrap_or_else(DerivedUnit::undeclared),
            None => derived.into_iter().next().map(|d| DerivedUnit { undeclared: true, ..d }).unwrap_or_else(
                || DerivedUnit::declared(CompositeUnit::dimensionless()),
            ),
        }
    }

    fn derive_at(&self, node: &AstNode, depth: usize) -> DerivedUnit {
        if depth > MAX_CALL_DEPTH {
            return DerivedUnit::undeclared();
        }
        let child = |i: usize| node.children.get(i).map(|c| self.derive_at(c, depth)).unwrap_or_else(DerivedUnit::undeclared);

        match &node.kind {
            NodeKind::Integer(_) | NodeKind::Real(_) | NodeKind::Rational { .. } | NodeKind::ENotation { .. } => {
                match &node.units {
                    Some(u) => DerivedUnit::from_option(self.resolve(u)),
                    None => DerivedUnit::undeclared(),
                }
            }
            NodeKind::Constant(_) => DerivedUnit::declared(CompositeUnit::dimensionless()),
            NodeKind::Name(id) => DerivedUnit::from_option(self.symbol_units(id)),
            NodeKind::Csymbol { url, .. } => match CsymbolKind::from_url(url) {
                CsymbolKind::Time => DerivedUnit::from_option(self.time_units()),
                CsymbolKind::Avogadro => {
                    DerivedUnit::declared(CompositeUnit::from_kind(UnitKind::Mole).pow(-1.0))
                }
                CsymbolKind::Delay => child(0),
                CsymbolKind::Unknown => DerivedUnit::undeclared(),
            },
            NodeKind::FunctionCall(_) => match expand_function_call(node, self.index) {
                Some(body) => self.derive_at(&body, depth + 1),
                None => DerivedUnit::undeclared(),
            },
            NodeKind::Lambda { .. } => DerivedUnit::undeclared(),
            NodeKind::Operator(op) => self.derive_operator(*op, node, depth),
        }
    }

    fn derive_operator(&self, op: Operator, node: &AstNode, depth: usize) -> DerivedUnit {
        let args: Vec<DerivedUnit> = node.children.iter().map(|c| self.derive_at(c, depth)).collect();
        let any_undeclared = args.iter().any(|d| d.undeclared);

        match op {
            Operator::Plus | Operator::Minus | Operator::Abs | Operator::Floor | Operator::Ceiling => {
                Self::pick_reference(args)
            }
            Operator::Times => DerivedUnit {
                unit: args.iter().fold(CompositeUnit::dimensionless(), |acc, d| acc.multiply(&d.unit)),
                undeclared: any_undeclared,
            },
            Operator::Divide => match args.as_slice() {
                [a, b] => DerivedUnit { unit: a.unit.divide(&b.unit), undeclared: any_undeclared },
                _ => DerivedUnit::undeclared(),
            },
            Operator::Power => match (args.first(), node.children.get(1)) {
                (Some(base), Some(exp)) => self.raise(base, self.static_value(exp)),
                _ => DerivedUnit::undeclared(),
            },
            Operator::Root => {
                let (radicand, degree) = match node.children.len() {
                    1 => (args.first(), Some(2.0)),
                    2 => (args.get(1), self.static_value(&node.children[0])),
                    _ => (None, None),
                };
                match radicand {
                    Some(r) => self.raise(r, degree.filter(|d| *d != 0.0).map(|d| 1.0 / d)),
                    None => DerivedUnit::undeclared(),
                }
            }
            Operator::Piecewise => {
                let values: Vec<DerivedUnit> = args.into_iter().step_by(2).collect();
                Self::pick_reference(values)
            }
            _ => DerivedUnit::declared(CompositeUnit::dimensionless()),
        }
    }

    fn raise(&self, base: &DerivedUnit, exponent: Option<f64>) -> DerivedUnit {
        match exponent {
            Some(n) => DerivedUnit { unit: base.unit.pow(n), undeclared: base.undeclared },
            None if base.unit.is_dimensionless() => base.clone(),
            None => DerivedUnit { unit: base.unit.clone(), undeclared: true },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Model, Unit, UnitDefinition};
    use rstest::rstest;

    fn sample_model() -> Model {
        let mut model = Model::new("m");
        model.unit_definitions.push(UnitDefinition::new("per_second", vec![Unit::new("second", -1.0)]));
        model.compartments.push(Compartment::new("cell").with_units("litre"));
        model.species.push(Species::new("S", "cell").with_substance_units("mole"));
        model.parameters.push(Parameter::new("len").with_units("metre"));
        model.parameters.push(Parameter::new("k").with_units("per_second"));
        model.parameters.push(Parameter::new("two").with_value(2.0).with_constant(true));
        model.parameters.push(Parameter::new("free"));
        model
    }

    fn derive(model: &Model, level: u32, expr: &AstNode) -> DerivedUnit {
        let index = ModelIndex::new(model);
        UnitDeriver::new(&index, level, 4).derive(expr)
    }

    fn metre() -> CompositeUnit {
        CompositeUnit::from_kind(UnitKind::Metre)
    }

    #[rstest]
    #[case(AstNode::apply(Operator::Power, vec![AstNode::name("len"), AstNode::int(2)]), metre().pow(2.0))]
    #[case(AstNode::apply(Operator::Power, vec![AstNode::name("len"), AstNode::name("two")]), metre().pow(2.0))]
    #[case(AstNode::apply(Operator::Root, vec![AstNode::apply(Operator::Times, vec![AstNode::name("len"), AstNode::name("len")])]), metre())]
    #[case(AstNode::apply(Operator::Times, vec![AstNode::name("k"), AstNode::name("len")]), metre().divide(&CompositeUnit::from_kind(UnitKind::Second)))]
    fn test_derived_units(#[case] expr: AstNode, #[case] expected: CompositeUnit) {
        let model = sample_model();
        let derived = derive(&model, 2, &expr);
        assert!(derived.unit.identical(&expected), "got {}, expected {}", derived.unit, expected);
    }

    #[test]
    fn test_species_concentration_units() {
        let model = sample_model();
        let derived = derive(&model, 2, &AstNode::name("S"));
        let expected = CompositeUnit::from_kind(UnitKind::Mole).divide(&CompositeUnit::from_kind(UnitKind::Litre));
        assert!(derived.unit.identical(&expected));
        assert!(!derived.undeclared);
    }

    #[test]
    fn test_undeclared_taint_propagates_through_products() {
        let model = sample_model();
        let expr = AstNode::apply(Operator::Times, vec![AstNode::name("free"), AstNode::name("len")]);
        assert!(derive(&model, 2, &expr).undeclared);
        assert!(derive(&model, 2, &AstNode::int(3)).undeclared);
        assert!(!derive(&model, 2, &AstNode::int(3).with_units("metre")).undeclared);
    }

    #[test]
    fn test_sum_takes_first_declared_argument() {
        let model = sample_model();
        let expr = AstNode::apply(Operator::Plus, vec![AstNode::int(1), AstNode::name("len")]);
        let derived = derive(&model, 2, &expr);
        assert!(derived.unit.identical(&metre()));
        assert!(!derived.undeclared);
    }

    #[test]
    fn test_level3_time_needs_model_attribute() {
        let mut model = sample_model();
        assert!(derive(&model, 3, &AstNode::time()).undeclared);
        model.time_units = Some("second".into());
        let derived = derive(&model, 3, &AstNode::time());
        assert!(derived.unit.identical(&CompositeUnit::from_kind(UnitKind::Second)));
    }

    #[test]
    fn test_local_parameter_shadows_global() {
        let model = sample_model();
        let index = ModelIndex::new(&model);
        let law = KineticLaw::new(AstNode::name("len").into_math())
            .with_parameter(Parameter::new("len").with_units("second"));
        let deriver = UnitDeriver::new(&index, 2, 4).with_scope(Some(&law));
        let derived = deriver.derive(&AstNode::name("len"));
        assert!(derived.unit.identical(&CompositeUnit::from_kind(UnitKind::Second)));
    }
}
