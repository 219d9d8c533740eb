//! O(1) identifier lookup over a borrowed [`Model`].
//!
//! Built once per validation run. When an identifier is declared twice the
//! first declaration owns it; the duplicate is reported by the uniqueness
//! rules, not here.
use super::entities::*;
use super::Model;
use std::collections::HashMap;

/// What a name in the shared identifier namespace resolves to.
#[derive(Debug, Clone, Copy)]
pub enum SymbolRef<'a> {
    FunctionDefinition(&'a FunctionDefinition),
    CompartmentType(&'a CompartmentType),
    SpeciesType(&'a SpeciesType),
    Compartment(&'a Compartment),
    Species(&'a Species),
    Parameter(&'a Parameter),
    Reaction(&'a Reaction),
    SpeciesReference { reaction: &'a Reaction, reference: &'a SpeciesReference },
    Event(&'a Event),
}

impl<'a> SymbolRef<'a> {
    pub fn kind_label(&self) -> &'static str {
        match self {
            SymbolRef::FunctionDefinition(_) => "FunctionDefinition",
            SymbolRef::CompartmentType(_) => "CompartmentType",
            SymbolRef::SpeciesType(_) => "SpeciesType",
            SymbolRef::Compartment(_) => "Compartment",
            SymbolRef::Species(_) => "Species",
            SymbolRef::Parameter(_) => "Parameter",
            SymbolRef::Reaction(_) => "Reaction",
            SymbolRef::SpeciesReference { .. } => "SpeciesReference",
            SymbolRef::Event(_) => "Event",
        }
    }

    /// Can this symbol appear as a value inside math (outside a function body)?
    pub fn has_value(&self) -> bool {
        matches!(
            self,
            SymbolRef::Compartment(_)
                | SymbolRef::Species(_)
                | SymbolRef::Parameter(_)
                | SymbolRef::Reaction(_)
                | SymbolRef::SpeciesReference { .. }
        )
    }
}

pub struct ModelIndex<'a> {
    model: &'a Model,
    symbols: HashMap<&'a str, SymbolRef<'a>>,
    unit_definitions: HashMap<&'a str, &'a UnitDefinition>,
    function_positions: HashMap<&'a str, usize>,
    /// Local parameter id -> reactions whose kinetic law declares it.
    local_owners: HashMap<&'a str, Vec<&'a Reaction>>,
}

impl<'a> ModelIndex<'a> {
    pub fn new(model: &'a Model) -> Self {
        let mut symbols = HashMap::new();
        let mut add = |id: &'a str, sym: SymbolRef<'a>| {
            symbols.entry(id).or_insert(sym);
        };

        for f in &model.function_definitions {
            add(f.id.as_str(), SymbolRef::FunctionDefinition(f));
        }
        for c in &model.compartment_types {
            add(c.id.as_str(), SymbolRef::CompartmentType(c));
        }
        for s in &model.species_types {
            add(s.id.as_str(), SymbolRef::SpeciesType(s));
        }
        for c in &model.compartments {
            add(c.id.as_str(), SymbolRef::Compartment(c));
        }
        for s in &model.species {
            add(s.id.as_str(), SymbolRef::Species(s));
        }
        for p in &model.parameters {
            add(p.id.as_str(), SymbolRef::Parameter(p));
        }
        for r in &model.reactions {
            add(r.id.as_str(), SymbolRef::Reaction(r));
        }
        for r in &model.reactions {
            for sr in r.participants() {
                if let Some(id) = sr.id.as_deref() {
                    add(id, SymbolRef::SpeciesReference { reaction: r, reference: sr });
                }
            }
        }
        for e in &model.events {
            if let Some(id) = e.id.as_deref() {
                add(id, SymbolRef::Event(e));
            }
        }

        let mut unit_definitions = HashMap::new();
        for ud in &model.unit_definitions {
            unit_definitions.entry(ud.id.as_str()).or_insert(ud);
        }

        let mut function_positions = HashMap::new();
        for (i, f) in model.function_definitions.iter().enumerate() {
            function_positions.entry(f.id.as_str()).or_insert(i);
        }

        let mut local_owners: HashMap<&str, Vec<&Reaction>> = HashMap::new();
        for r in &model.reactions {
            if let Some(kl) = &r.kinetic_law {
                for p in &kl.parameters {
                    local_owners.entry(p.id.as_str()).or_default().push(r);
                }
            }
        }

        Self { model, symbols, unit_definitions, function_positions, local_owners }
    }

    pub fn model(&self) -> &'a Model {
        self.model
    }

    pub fn symbol(&self, id: &str) -> Option<SymbolRef<'a>> {
        self.symbols.get(id).copied()
    }

    pub fn compartment(&self, id: &str) -> Option<&'a Compartment> {
        match self.symbol(id)? {
            SymbolRef::Compartment(c) => Some(c),
            _ => None,
        }
    }

    pub fn species(&self, id: &str) -> Option<&'a Species> {
        match self.symbol(id)? {
            SymbolRef::Species(s) => Some(s),
            _ => None,
        }
    }

    pub fn parameter(&self, id: &str) -> Option<&'a Parameter> {
        match self.symbol(id)? {
            SymbolRef::Parameter(p) => Some(p),
            _ => None,
        }
    }

    pub fn reaction(&self, id: &str) -> Option<&'a Reaction> {
        match self.symbol(id)? {
            SymbolRef::Reaction(r) => Some(r),
            _ => None,
        }
    }

    pub fn function(&self, id: &str) -> Option<&'a FunctionDefinition> {
        match self.symbol(id)? {
            SymbolRef::FunctionDefinition(f) => Some(f),
            _ => None,
        }
    }

    /// Declaration position of a function definition, for ordering checks.
    pub fn function_position(&self, id: &str) -> Option<usize> {
        self.function_positions.get(id).copied()
    }

    pub fn unit_definition(&self, id: &str) -> Option<&'a UnitDefinition> {
        self.unit_definitions.get(id).copied()
    }

    pub fn is_compartment_type(&self, id: &str) -> bool {
        matches!(self.symbol(id), Some(SymbolRef::CompartmentType(_)))
    }

    pub fn is_species_type(&self, id: &str) -> bool {
        matches!(self.symbol(id), Some(SymbolRef::SpeciesType(_)))
    }

    /// Reactions whose kinetic law declares a local parameter named `id`.
    pub fn local_parameter_owners(&self, id: &str) -> &[&'a Reaction] {
        self.local_owners.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_declaration_owns_identifier() {
        let mut model = Model::new("m");
        model.compartments.push(Compartment::new("x"));
        model.parameters.push(Parameter::new("x"));
        let index = ModelIndex::new(&model);
        assert!(index.compartment("x").is_some());
        assert!(index.parameter("x").is_none());
    }

    #[test]
    fn test_species_reference_ids_are_indexed() {
        let mut model = Model::new("m");
        let mut r = Reaction::new("r");
        r.reactants.push(SpeciesReference::new("s").with_id("sr1"));
        model.reactions.push(r);
        let index = ModelIndex::new(&model);
        assert!(matches!(index.symbol("sr1"), Some(SymbolRef::SpeciesReference { .. })));
    }
}
