//! Over-determination: does the model have more equations than unknowns?
//!
//! Equations and the variables they constrain form a bipartite graph. A
//! model is over-determined when some equation cannot be matched to a
//! variable of its own. Matching starts greedy and is completed with
//! Hopcroft-Karp layered augmenting paths.
use crate::math::referenced_names;
use crate::model::{Model, RuleKind};
use crate::validation::context::ValidationContext;
use crate::validation::error::{Category, RuleFault};
use crate::validation::registry::{Findings, RuleDescriptor};
use crate::validation::rules::expect_target;
use crate::validation::target::{KindMask, Target, TargetKind};
use petgraph::graph::{NodeIndex, UnGraph};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

pub(crate) fn descriptors() -> Vec<RuleDescriptor> {
    vec![RuleDescriptor::error(
        10601,
        Category::Overdetermined,
        KindMask::of(&[TargetKind::Model]),
        "The model is not over-determined",
        check_overdetermination,
    )]
}

/// One side of the equation graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Vertex {
    Equation(String),
    Variable(String),
}

/// The bipartite graph of equations and the variables they mention.
///
/// Variables are added before any equation, so a variable's node index is
/// also its position among the variables.
#[derive(Debug, Default)]
pub struct EquationGraph {
    graph: UnGraph<Vertex, ()>,
    variables: HashMap<String, NodeIndex>,
    equations: Vec<NodeIndex>,
}

impl EquationGraph {
    pub fn build(model: &Model, level: u32) -> Self {
        let mut eg = Self::default();

        // --- Variables ---
        for c in model.compartments.iter().filter(|c| !c.is_constant(level)) {
            eg.add_variable(&c.id);
        }
        for s in model.species.iter().filter(|s| !s.is_constant()) {
            eg.add_variable(&s.id);
        }
        for p in model.parameters.iter().filter(|p| !p.is_constant(level)) {
            eg.add_variable(&p.id);
        }
        for r in model.reactions.iter().filter(|r| r.kinetic_law.is_some()) {
            eg.add_variable(&r.id);
        }
        for r in &model.reactions {
            for sr in r.participants().filter(|sr| sr.has_variable_stoichiometry(level)) {
                if let Some(id) = sr.id.as_deref() {
                    eg.add_variable(id);
                }
            }
        }

        // --- Equations ---
        for s in model.species.iter().filter(|s| !s.is_boundary() && !s.is_constant()) {
            let reactions: Vec<&str> = model
                .reactions
                .iter()
                .filter(|r| r.kinetic_law.is_some() && r.involves_species(&s.id))
                .map(|r| r.id.as_str())
                .collect();
            if reactions.is_empty() {
                continue;
            }
            let mentioned = std::iter::once(s.id.as_str()).chain(reactions);
            eg.add_equation(format!("rate of change of species '{}'", s.id), mentioned);
        }

        for (position, rule) in model.rules.iter().enumerate() {
            let label = match rule.target() {
                Some(v) => format!("{} for '{}'", rule.kind.label(), v),
                None => format!("{} #{}", rule.kind.label(), position + 1),
            };
            let names = rule.math.as_deref().map(referenced_names).unwrap_or_default();
            let own = if rule.kind == RuleKind::Algebraic { None } else { rule.target() };
            eg.add_equation(label, own.into_iter().chain(names.iter()));
        }

        for r in &model.reactions {
            let Some(law) = &r.kinetic_law else { continue };
            let names = law.math.as_deref().map(referenced_names).unwrap_or_default();
            let mentioned = std::iter::once(r.id.as_str())
                .chain(names.iter().filter(|n| law.local_parameter(n).is_none()));
            eg.add_equation(format!("kinetic law of reaction '{}'", r.id), mentioned);
        }
        eg
    }

    fn add_variable(&mut self, id: &str) {
        if !self.variables.contains_key(id) {
            let node = self.graph.add_node(Vertex::Variable(id.to_string()));
            self.variables.insert(id.to_string(), node);
        }
    }

    /// Adds an equation linked to every variable among `mentioned`.
    fn add_equation<'n>(&mut self, label: String, mentioned: impl IntoIterator<Item = &'n str>) {
        let node = self.graph.add_node(Vertex::Equation(label));
        for id in mentioned {
            if let Some(&variable) = self.variables.get(id) {
                self.graph.update_edge(node, variable, ());
            }
        }
        self.equations.push(node);
    }

    pub fn graph(&self) -> &UnGraph<Vertex, ()> {
        &self.graph
    }

    pub fn equation_count(&self) -> usize {
        self.equations.len()
    }

    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// For each equation, the positions of the variables it mentions, ascending.
    fn adjacency(&self) -> Vec<Vec<usize>> {
        self.equations
            .iter()
            .map(|&e| {
                let mut vars: Vec<usize> = self.graph.neighbors(e).map(|v| v.index()).collect();
                vars.sort_unstable();
                vars
            })
            .collect()
    }

    fn label(&self, equation: usize) -> &str {
        match &self.graph[self.equations[equation]] {
            Vertex::Equation(label) | Vertex::Variable(label) => label,
        }
    }
}

// --- Matching ---

const UNLAYERED: usize = usize::MAX;

struct HopcroftKarp<'g> {
    adjacency: &'g [Vec<usize>],
    equation_match: Vec<Option<usize>>,
    variable_match: Vec<Option<usize>>,
    layer: Vec<usize>,
}

impl<'g> HopcroftKarp<'g> {
    fn new(adjacency: &'g [Vec<usize>], variables: usize) -> Self {
        Self {
            adjacency,
            equation_match: vec![None; adjacency.len()],
            variable_match: vec![None; variables],
            layer: vec![UNLAYERED; adjacency.len()],
        }
    }

    fn pair(&mut self, equation: usize, variable: usize) {
        self.equation_match[equation] = Some(variable);
        self.variable_match[variable] = Some(equation);
    }

    /// Matches each equation, in order, to its first free variable.
    fn greedy(&mut self) {
        for equation in 0..self.adjacency.len() {
            let free = self.adjacency[equation].iter().copied().find(|&v| self.variable_match[v].is_none());
            if let Some(variable) = free {
                self.pair(equation, variable);
            }
        }
    }

    /// Layers equations by alternating-path distance from the free ones.
    /// Returns whether any free variable is reachable.
    fn build_layers(&mut self) -> bool {
        let mut queue = VecDeque::new();
        for equation in 0..self.adjacency.len() {
            if self.equation_match[equation].is_none() {
                self.layer[equation] = 0;
                queue.push_back(equation);
            } else {
                self.layer[equation] = UNLAYERED;
            }
        }

        let mut reachable = false;
        while let Some(equation) = queue.pop_front() {
            for &variable in &self.adjacency[equation] {
                match self.variable_match[variable] {
                    None => reachable = true,
                    Some(next) if self.layer[next] == UNLAYERED => {
                        self.layer[next] = self.layer[equation] + 1;
                        queue.push_back(next);
                    }
                    Some(_) => {}
                }
            }
        }
        reachable
    }

    /// Looks for an augmenting path from `equation` along the layers and flips it.
    fn augment(&mut self, equation: usize) -> bool {
        let depth = self.layer[equation];
        if depth == UNLAYERED {
            return false;
        }
        for i in 0..self.adjacency[equation].len() {
            let variable = self.adjacency[equation][i];
            let extends = match self.variable_match[variable] {
                None => true,
                Some(next) => self.layer[next] == depth + 1 && self.augment(next),
            };
            if extends {
                self.pair(equation, variable);
                return true;
            }
        }
        self.layer[equation] = UNLAYERED;
        false
    }

    fn run(mut self) -> Vec<Option<usize>> {
        self.greedy();
        while self.equation_match.iter().any(Option::is_none) && self.build_layers() {
            let mut progressed = false;
            for equation in 0..self.adjacency.len() {
                if self.equation_match[equation].is_none() && self.augment(equation) {
                    progressed = true;
                }
            }
            if !progressed {
                break;
            }
        }
        self.equation_match
    }
}

/// A maximum matching of equations to variables: for each equation, the
/// variable it is matched with.
pub fn match_equations(adjacency: &[Vec<usize>], variables: usize) -> Vec<Option<usize>> {
    HopcroftKarp::new(adjacency, variables).run()
}

/// The outcome of the over-determination analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverdeterminationReport {
    pub equations: usize,
    pub variables: usize,
    /// Labels of equations left without a variable.
    pub unmatched: Vec<String>,
    /// True when the equation count alone decided the outcome.
    pub short_circuited: bool,
}

impl OverdeterminationReport {
    pub fn is_overdetermined(&self) -> bool {
        self.short_circuited || !self.unmatched.is_empty()
    }
}

pub fn analyze(model: &Model, level: u32) -> OverdeterminationReport {
    let eg = EquationGraph::build(model, level);
    let (equations, variables) = (eg.equation_count(), eg.variable_count());
    if equations > variables {
        debug!(equations, variables, "More equations than variables, skipping matching");
        return OverdeterminationReport { equations, variables, unmatched: Vec::new(), short_circuited: true };
    }

    let adjacency = eg.adjacency();
    let matching = match_equations(&adjacency, variables);
    let unmatched = matching
        .iter()
        .enumerate()
        .filter(|(_, m)| m.is_none())
        .map(|(e, _)| eg.label(e).to_string())
        .collect();
    OverdeterminationReport { equations, variables, unmatched, short_circuited: false }
}

fn check_overdetermination(ctx: &ValidationContext, target: &Target, out: &mut Findings) -> Result<(), RuleFault> {
    let model = expect_target!(*target, Target::Model(m) => m);
    let report = analyze(model, ctx.level());
    if report.short_circuited {
        out.report(format!(
            "The model is over-determined: it has {} equations but only {} variables.",
            report.equations, report.variables
        ));
    } else if !report.unmatched.is_empty() {
        out.report(format!(
            "The model is over-determined: no variable is left for the {}.",
            report.unmatched.join(", ")
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::AstNode;
    use crate::model::*;
    use proptest::prelude::*;

    /// A reaction whose only species is a constant boundary species, so
    /// it contributes a reaction variable and a kinetic-law equation only.
    fn model_with_reaction() -> Model {
        let mut model = Model::new("m");
        model.compartments.push(Compartment::new("c").with_size(1.0));
        model.species.push(Species::new("S", "c").with_amount(1.0).with_boundary(true).with_constant(true));
        model.parameters.push(Parameter::new("x").with_constant(false));
        let law = KineticLaw::new(AstNode::name("x").into_math());
        model.reactions.push(Reaction::new("r").with_reactant("S").with_kinetic_law(law));
        model
    }

    #[test]
    fn test_perfect_matching_is_not_flagged() {
        let mut model = model_with_reaction();
        model.rules.push(Rule::assignment("x", AstNode::int(1).into_math()));
        let report = analyze(&model, 2);
        assert_eq!((report.equations, report.variables), (2, 2));
        assert!(!report.is_overdetermined());
    }

    #[test]
    fn test_pigeonhole_short_circuits() {
        let mut model = model_with_reaction();
        model.rules.push(Rule::assignment("x", AstNode::int(1).into_math()));
        model.rules.push(Rule::algebraic(AstNode::name("x").into_math()));
        let report = analyze(&model, 2);
        assert_eq!((report.equations, report.variables), (3, 2));
        assert!(report.short_circuited);
        assert!(report.unmatched.is_empty());
    }

    #[test]
    fn test_unmatched_equations_are_named() {
        let mut model = Model::new("m");
        model.parameters.push(Parameter::new("x").with_constant(false));
        model.parameters.push(Parameter::new("y").with_constant(false));
        model.rules.push(Rule::assignment("x", AstNode::int(1).into_math()));
        model.rules.push(Rule::algebraic(AstNode::name("x").into_math()));
        let report = analyze(&model, 2);
        assert!(!report.short_circuited);
        assert_eq!(report.unmatched, vec!["AlgebraicRule #2".to_string()]);
    }

    #[test]
    fn test_augmenting_path_reassigns_greedy_choice() {
        // Greedy pairs 0-0 and leaves 1 stranded until 0 moves to 1.
        let adjacency = vec![vec![0, 1], vec![0]];
        assert_eq!(match_equations(&adjacency, 2), vec![Some(1), Some(0)]);
    }

    fn bipartite(edges: &[(usize, usize)], equations: usize, variables: usize) -> (Vec<Vec<usize>>, UnGraph<(), ()>) {
        let mut adjacency = vec![Vec::new(); equations];
        let mut graph = UnGraph::<(), ()>::default();
        let nodes: Vec<NodeIndex> = (0..variables + equations).map(|_| graph.add_node(())).collect();
        for &(e, v) in edges {
            if !adjacency[e].contains(&v) {
                adjacency[e].push(v);
                graph.add_edge(nodes[variables + e], nodes[v], ());
            }
        }
        (adjacency, graph)
    }

    proptest! {
        #[test]
        fn prop_matching_is_maximum(
            (equations, variables, edges) in (1usize..8, 1usize..8).prop_flat_map(|(e, v)| {
                (Just(e), Just(v), proptest::collection::vec((0..e, 0..v), 0..20))
            })
        ) {
            let (adjacency, graph) = bipartite(&edges, equations, variables);
            let matching = match_equations(&adjacency, variables);

            let matched = matching.iter().flatten().count();
            prop_assert_eq!(matched, petgraph::algo::maximum_matching(&graph).edges().count());

            let mut used: Vec<usize> = matching.iter().flatten().copied().collect();
            used.sort_unstable();
            used.dedup();
            prop_assert_eq!(used.len(), matched);
            for (e, m) in matching.iter().enumerate() {
                if let Some(v) = m {
                    prop_assert!(adjacency[e].contains(v));
                }
            }
        }
    }
}
