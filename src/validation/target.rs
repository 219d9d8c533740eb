//! The objects rules are dispatched to, and the fixed order they are visited in.
use crate::math::AstNode;
use crate::model::*;

/// Every kind of object a rule can be registered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TargetKind {
    Model,
    FunctionDefinition,
    UnitDefinition,
    CompartmentType,
    SpeciesType,
    Compartment,
    Species,
    Parameter,
    Rule,
    Reaction,
    SpeciesReference,
    Modifier,
    KineticLaw,
    LocalParameter,
    Event,
    Trigger,
    Delay,
    Priority,
    EventAssignment,
    InitialAssignment,
    Constraint,
}

/// A set of [`TargetKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KindMask(u32);

impl KindMask {
    pub const fn of(kinds: &[TargetKind]) -> Self {
        let mut bits = 0u32;
        let mut i = 0;
        while i < kinds.len() {
            bits |= 1 << kinds[i] as u32;
            i += 1;
        }
        Self(bits)
    }

    pub const fn contains(self, kind: TargetKind) -> bool {
        self.0 & (1 << kind as u32) != 0
    }

    /// Every target that carries a math expression.
    pub const MATH: KindMask = KindMask::of(&[
        TargetKind::FunctionDefinition,
        TargetKind::Rule,
        TargetKind::SpeciesReference,
        TargetKind::KineticLaw,
        TargetKind::Trigger,
        TargetKind::Delay,
        TargetKind::Priority,
        TargetKind::EventAssignment,
        TargetKind::InitialAssignment,
        TargetKind::Constraint,
    ]);

    /// Math-bearing targets whose math is evaluated directly (not a function body).
    pub const EVALUATED_MATH: KindMask = KindMask::of(&[
        TargetKind::Rule,
        TargetKind::SpeciesReference,
        TargetKind::KineticLaw,
        TargetKind::Trigger,
        TargetKind::Delay,
        TargetKind::Priority,
        TargetKind::EventAssignment,
        TargetKind::InitialAssignment,
        TargetKind::Constraint,
    ]);
}

/// Whether a species reference is a reactant or a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Reactant,
    Product,
}

/// A borrowed view of one object in the model, as handed to rule bodies.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    Model(&'a Model),
    FunctionDefinition(&'a FunctionDefinition),
    UnitDefinition(&'a UnitDefinition),
    CompartmentType(&'a CompartmentType),
    SpeciesType(&'a SpeciesType),
    Compartment(&'a Compartment),
    Species(&'a Species),
    Parameter(&'a Parameter),
    /// `position` is the rule's index in the model's rule list.
    Rule { rule: &'a Rule, position: usize },
    Reaction(&'a Reaction),
    SpeciesReference { reaction: &'a Reaction, reference: &'a SpeciesReference, role: Role },
    Modifier { reaction: &'a Reaction, reference: &'a ModifierSpeciesReference },
    KineticLaw { reaction: &'a Reaction, law: &'a KineticLaw },
    LocalParameter { reaction: &'a Reaction, parameter: &'a Parameter },
    Event(&'a Event),
    Trigger { event: &'a Event, trigger: &'a Trigger },
    Delay { event: &'a Event, delay: &'a Delay },
    Priority { event: &'a Event, priority: &'a Priority },
    EventAssignment { event: &'a Event, assignment: &'a EventAssignment },
    InitialAssignment(&'a InitialAssignment),
    Constraint(&'a Constraint),
}

impl<'a> Target<'a> {
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Model(_) => TargetKind::Model,
            Target::FunctionDefinition(_) => TargetKind::FunctionDefinition,
            Target::UnitDefinition(_) => TargetKind::UnitDefinition,
            Target::CompartmentType(_) => TargetKind::CompartmentType,
            Target::SpeciesType(_) => TargetKind::SpeciesType,
            Target::Compartment(_) => TargetKind::Compartment,
            Target::Species(_) => TargetKind::Species,
            Target::Parameter(_) => TargetKind::Parameter,
            Target::Rule { .. } => TargetKind::Rule,
            Target::Reaction(_) => TargetKind::Reaction,
            Target::SpeciesReference { .. } => TargetKind::SpeciesReference,
            Target::Modifier { .. } => TargetKind::Modifier,
            Target::KineticLaw { .. } => TargetKind::KineticLaw,
            Target::LocalParameter { .. } => TargetKind::LocalParameter,
            Target::Event(_) => TargetKind::Event,
            Target::Trigger { .. } => TargetKind::Trigger,
            Target::Delay { .. } => TargetKind::Delay,
            Target::Priority { .. } => TargetKind::Priority,
            Target::EventAssignment { .. } => TargetKind::EventAssignment,
            Target::InitialAssignment(_) => TargetKind::InitialAssignment,
            Target::Constraint(_) => TargetKind::Constraint,
        }
    }

    /// The element name used in messages.
    pub fn label(&self) -> &'static str {
        match self {
            Target::Rule { rule, .. } => rule.kind.label(),
            Target::Modifier { .. } => "ModifierSpeciesReference",
            other => match other.kind() {
                TargetKind::Model => "Model",
                TargetKind::FunctionDefinition => "FunctionDefinition",
                TargetKind::UnitDefinition => "UnitDefinition",
                TargetKind::CompartmentType => "CompartmentType",
                TargetKind::SpeciesType => "SpeciesType",
                TargetKind::Compartment => "Compartment",
                TargetKind::Species => "Species",
                TargetKind::Parameter => "Parameter",
                TargetKind::Reaction => "Reaction",
                TargetKind::SpeciesReference => "SpeciesReference",
                TargetKind::KineticLaw => "KineticLaw",
                TargetKind::LocalParameter => "LocalParameter",
                TargetKind::Event => "Event",
                TargetKind::Trigger => "Trigger",
                TargetKind::Delay => "Delay",
                TargetKind::Priority => "Priority",
                TargetKind::EventAssignment => "EventAssignment",
                TargetKind::InitialAssignment => "InitialAssignment",
                TargetKind::Constraint => "Constraint",
                TargetKind::Rule | TargetKind::Modifier => "",
            },
        }
    }

    /// The identifier a diagnostic about this object is filed under. Objects
    /// without their own id use the id they point at or belong to.
    pub fn entity_id(&self) -> Option<&'a str> {
        match *self {
            Target::Model(m) => m.id.as_deref(),
            Target::FunctionDefinition(f) => Some(f.id.as_str()),
            Target::UnitDefinition(u) => Some(u.id.as_str()),
            Target::CompartmentType(c) => Some(c.id.as_str()),
            Target::SpeciesType(s) => Some(s.id.as_str()),
            Target::Compartment(c) => Some(c.id.as_str()),
            Target::Species(s) => Some(s.id.as_str()),
            Target::Parameter(p) => Some(p.id.as_str()),
            Target::Rule { rule, .. } => rule.variable.as_deref(),
            Target::Reaction(r) => Some(r.id.as_str()),
            Target::SpeciesReference { reference, .. } => {
                reference.id.as_deref().or(Some(reference.species.as_str()))
            }
            Target::Modifier { reference, .. } => reference.id.as_deref().or(Some(reference.species.as_str())),
            Target::KineticLaw { reaction, .. } => Some(reaction.id.as_str()),
            Target::LocalParameter { parameter, .. } => Some(parameter.id.as_str()),
            Target::Event(e) => e.id.as_deref(),
            Target::Trigger { event, .. } | Target::Delay { event, .. } | Target::Priority { event, .. } => {
                event.id.as_deref()
            }
            Target::EventAssignment { assignment, .. } => Some(assignment.variable.as_str()),
            Target::InitialAssignment(ia) => Some(ia.symbol.as_str()),
            Target::Constraint(_) => None,
        }
    }

    pub fn base(&self) -> &'a Base {
        match *self {
            Target::Model(m) => &m.base,
            Target::FunctionDefinition(f) => &f.base,
            Target::UnitDefinition(u) => &u.base,
            Target::CompartmentType(c) => &c.base,
            Target::SpeciesType(s) => &s.base,
            Target::Compartment(c) => &c.base,
            Target::Species(s) => &s.base,
            Target::Parameter(p) => &p.base,
            Target::Rule { rule, .. } => &rule.base,
            Target::Reaction(r) => &r.base,
            Target::SpeciesReference { reference, .. } => &reference.base,
            Target::Modifier { reference, .. } => &reference.base,
            Target::KineticLaw { law, .. } => &law.base,
            Target::LocalParameter { parameter, .. } => &parameter.base,
            Target::Event(e) => &e.base,
            Target::Trigger { trigger, .. } => &trigger.base,
            Target::Delay { delay, .. } => &delay.base,
            Target::Priority { priority, .. } => &priority.base,
            Target::EventAssignment { assignment, .. } => &assignment.base,
            Target::InitialAssignment(ia) => &ia.base,
            Target::Constraint(c) => &c.base,
        }
    }

    pub fn location(&self) -> Option<SourceLocation> {
        self.base().location
    }

    /// The math this object carries, if any.
    pub fn math(&self) -> Option<&'a AstNode> {
        let math = match *self {
            Target::FunctionDefinition(f) => f.math.as_ref(),
            Target::Rule { rule, .. } => rule.math.as_ref(),
            Target::SpeciesReference { reference, .. } => reference.stoichiometry_math.as_ref(),
            Target::KineticLaw { law, .. } => law.math.as_ref(),
            Target::Trigger { trigger, .. } => trigger.math.as_ref(),
            Target::Delay { delay, .. } => delay.math.as_ref(),
            Target::Priority { priority, .. } => priority.math.as_ref(),
            Target::EventAssignment { assignment, .. } => assignment.math.as_ref(),
            Target::InitialAssignment(ia) => ia.math.as_ref(),
            Target::Constraint(c) => c.math.as_ref(),
            _ => None,
        };
        math.map(|m| &**m)
    }

    /// The kinetic law whose local parameters are in scope for this object's math.
    pub fn kinetic_law(&self) -> Option<&'a KineticLaw> {
        match *self {
            Target::KineticLaw { law, .. } => Some(law),
            _ => None,
        }
    }

    /// Every object of `model` in dispatch order.
    pub fn traversal(model: &'a Model) -> Vec<Target<'a>> {
        let mut out = vec![Target::Model(model)];
        out.extend(model.function_definitions.iter().map(Target::FunctionDefinition));
        out.extend(model.unit_definitions.iter().map(Target::UnitDefinition));
        out.extend(model.compartment_types.iter().map(Target::CompartmentType));
        out.extend(model.species_types.iter().map(Target::SpeciesType));
        out.extend(model.compartments.iter().map(Target::Compartment));
        out.extend(model.species.iter().map(Target::Species));
        out.extend(model.parameters.iter().map(Target::Parameter));
        out.extend(model.rules.iter().enumerate().map(|(position, rule)| Target::Rule { rule, position }));

        for reaction in &model.reactions {
            out.push(Target::Reaction(reaction));
            for reference in &reaction.reactants {
                out.push(Target::SpeciesReference { reaction, reference, role: Role::Reactant });
            }
            for reference in &reaction.products {
                out.push(Target::SpeciesReference { reaction, reference, role: Role::Product });
            }
            for reference in &reaction.modifiers {
                out.push(Target::Modifier { reaction, reference });
            }
            if let Some(law) = &reaction.kinetic_law {
                out.push(Target::KineticLaw { reaction, law });
                out.extend(law.parameters.iter().map(|parameter| Target::LocalParameter { reaction, parameter }));
            }
        }

        for event in &model.events {
            out.push(Target::Event(event));
            if let Some(trigger) = &event.trigger {
                out.push(Target::Trigger { event, trigger });
            }
            if let Some(delay) = &event.delay {
                out.push(Target::Delay { event, delay });
            }
            if let Some(priority) = &event.priority {
                out.push(Target::Priority { event, priority });
            }
            out.extend(event.assignments.iter().map(|assignment| Target::EventAssignment { event, assignment }));
        }

        out.extend(model.initial_assignments.iter().map(Target::InitialAssignment));
        out.extend(model.constraints.iter().map(Target::Constraint));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_traversal_follows_document_order() {
        let mut model = Model::new("m");
        model.parameters.push(Parameter::new("p"));
        model.compartments.push(Compartment::new("c"));
        let law = KineticLaw::new(AstNode::name("p").into_math()).with_parameter(Parameter::new("k"));
        model.reactions.push(Reaction::new("r").with_reactant("s").with_kinetic_law(law));
        model.events.push(Event::new("e", AstNode::name("p").into_math()));

        let kinds: Vec<TargetKind> = Target::traversal(&model).iter().map(Target::kind).collect();
        assert_eq!(
            kinds,
            vec![
                TargetKind::Model,
                TargetKind::Compartment,
                TargetKind::Parameter,
                TargetKind::Reaction,
                TargetKind::SpeciesReference,
                TargetKind::KineticLaw,
                TargetKind::LocalParameter,
                TargetKind::Event,
                TargetKind::Trigger,
            ]
        );
    }

    #[test]
    fn test_kind_mask_membership() {
        assert!(KindMask::MATH.contains(TargetKind::FunctionDefinition));
        assert!(!KindMask::EVALUATED_MATH.contains(TargetKind::FunctionDefinition));
        assert!(!KindMask::MATH.contains(TargetKind::Species));
    }
}
