//! Expression trees attached to model entities.
//!
//! Trees are immutable once built and shared by reference (`Math` is an
//! `Arc`). Any working copy the validator needs (function-call inlining,
//! symbol annotation) is a fresh owned `AstNode` scoped to one check.
pub mod annotate;
pub mod walker;

pub use annotate::{annotate, annotate_math, SymbolBindings};
pub use walker::{
    expand_function_call, inline_calls, referenced_names, returns_boolean, returns_numeric, static_value,
    value_type, walk, Descend, MathType, MathVisitor,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shared, read-only math attached to an entity.
pub type Math = Arc<AstNode>;

pub const TIME_URL: &str = "http://www.sbml.org/sbml/symbols/time";
pub const DELAY_URL: &str = "http://www.sbml.org/sbml/symbols/delay";
pub const AVOGADRO_URL: &str = "http://www.sbml.org/sbml/symbols/avogadro";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CsymbolKind {
    Time,
    Delay,
    Avogadro,
    Unknown,
}

impl CsymbolKind {
    pub fn from_url(url: &str) -> Self {
        match url {
            TIME_URL => CsymbolKind::Time,
            DELAY_URL => CsymbolKind::Delay,
            AVOGADRO_URL => CsymbolKind::Avogadro,
            _ => CsymbolKind::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    Pi,
    ExponentialE,
    True,
    False,
    Infinity,
    NotANumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Plus,
    Minus,
    Times,
    Divide,
    Power,
    Root,
    Abs,
    Exp,
    Ln,
    Log,
    Floor,
    Ceiling,
    Factorial,
    Sin,
    Cos,
    Tan,
    Sec,
    Csc,
    Cot,
    Sinh,
    Cosh,
    Tanh,
    Sech,
    Csch,
    Coth,
    Arcsin,
    Arccos,
    Arctan,
    Arcsec,
    Arccsc,
    Arccot,
    Arcsinh,
    Arccosh,
    Arctanh,
    Arcsech,
    Arccsch,
    Arccoth,
    Eq,
    Neq,
    Gt,
    Lt,
    Geq,
    Leq,
    And,
    Or,
    Xor,
    Not,
    Piecewise,
}

/// How many arguments an operator accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    Between(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, n: usize) -> bool {
        match *self {
            Arity::Exactly(k) => n == k,
            Arity::Between(lo, hi) => (lo..=hi).contains(&n),
            Arity::AtLeast(lo) => n >= lo,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Exactly(k) => write!(f, "exactly {}", k),
            Arity::Between(lo, hi) => write!(f, "between {} and {}", lo, hi),
            Arity::AtLeast(lo) => write!(f, "at least {}", lo),
        }
    }
}

impl Operator {
    pub fn name(&self) -> &'static str {
        use Operator::*;
        match self {
            Plus => "plus",
            Minus => "minus",
            Times => "times",
            Divide => "divide",
            Power => "pow",
            Root => "root",
            Abs => "abs",
            Exp => "exp",
            Ln => "ln",
            Log => "log",
            Floor => "floor",
            Ceiling => "ceiling",
            Factorial => "factorial",
            Sin => "sin",
            Cos => "cos",
            Tan => "tan",
            Sec => "sec",
            Csc => "csc",
            Cot => "cot",
            Sinh => "sinh",
            Cosh => "cosh",
            Tanh => "tanh",
            Sech => "sech",
            Csch => "csch",
            Coth => "coth",
            Arcsin => "arcsin",
            Arccos => "arccos",
            Arctan => "arctan",
            Arcsec => "arcsec",
            Arccsc => "arccsc",
            Arccot => "arccot",
            Arcsinh => "arcsinh",
            Arccosh => "arccosh",
            Arctanh => "arctanh",
            Arcsech => "arcsech",
            Arccsch => "arccsch",
            Arccoth => "arccoth",
            Eq => "eq",
            Neq => "neq",
            Gt => "gt",
            Lt => "lt",
            Geq => "geq",
            Leq => "leq",
            And => "and",
            Or => "or",
            Xor => "xor",
            Not => "not",
            Piecewise => "piecewise",
        }
    }

    pub fn is_relational(&self) -> bool {
        matches!(self, Operator::Eq | Operator::Neq | Operator::Gt | Operator::Lt | Operator::Geq | Operator::Leq)
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::And | Operator::Or | Operator::Xor | Operator::Not)
    }

    /// Single-argument functions whose argument is expected to be dimensionless.
    pub fn wants_dimensionless_argument(&self) -> bool {
        use Operator::*;
        matches!(
            self,
            Exp | Ln | Log | Factorial | Sin | Cos | Tan | Sec | Csc | Cot | Sinh | Cosh | Tanh | Sech | Csch
                | Coth | Arcsin | Arccos | Arctan | Arcsec | Arccsc | Arccot | Arcsinh | Arccosh | Arctanh
                | Arcsech | Arccsch | Arccoth
        )
    }

    pub fn arity(&self) -> Arity {
        use Operator::*;
        match self {
            Plus | Times | And | Or | Xor => Arity::AtLeast(0),
            Minus => Arity::Between(1, 2),
            Divide | Power | Neq => Arity::Exactly(2),
            Root | Log => Arity::Between(1, 2),
            Eq | Gt | Lt | Geq | Leq => Arity::AtLeast(2),
            Piecewise => Arity::AtLeast(1),
            _ => Arity::Exactly(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    Integer(i64),
    Real(f64),
    Rational { numerator: i64, denominator: i64 },
    ENotation { mantissa: f64, exponent: i32 },
    /// A reference to a model symbol or a bound variable.
    Name(String),
    /// A definitionURL-tagged symbol; `delay` carries its two arguments as children.
    Csymbol { url: String, name: String },
    Constant(Constant),
    Operator(Operator),
    /// A call to a user-defined function; arguments are the children.
    FunctionCall(String),
    /// A function body: the single child is the body expression.
    Lambda { bvars: Vec<String> },
}

/// One node of an expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AstNode {
    pub kind: NodeKind,
    #[serde(default)]
    pub children: Vec<AstNode>,
    /// Unit annotation, meaningful only on numeric literals.
    #[serde(default)]
    pub units: Option<String>,
}

impl AstNode {
    pub fn new(kind: NodeKind, children: Vec<AstNode>) -> Self {
        Self { kind, children, units: None }
    }

    pub fn int(v: i64) -> Self {
        Self::new(NodeKind::Integer(v), vec![])
    }

    pub fn real(v: f64) -> Self {
        Self::new(NodeKind::Real(v), vec![])
    }

    pub fn rational(numerator: i64, denominator: i64) -> Self {
        Self::new(NodeKind::Rational { numerator, denominator }, vec![])
    }

    pub fn name(id: &str) -> Self {
        Self::new(NodeKind::Name(id.to_string()), vec![])
    }

    pub fn constant(c: Constant) -> Self {
        Self::new(NodeKind::Constant(c), vec![])
    }

    pub fn apply(op: Operator, args: Vec<AstNode>) -> Self {
        Self::new(NodeKind::Operator(op), args)
    }

    pub fn call(function: &str, args: Vec<AstNode>) -> Self {
        Self::new(NodeKind::FunctionCall(function.to_string()), args)
    }

    pub fn lambda(bvars: &[&str], body: AstNode) -> Self {
        Self::new(
            NodeKind::Lambda { bvars: bvars.iter().map(|s| s.to_string()).collect() },
            vec![body],
        )
    }

    pub fn time() -> Self {
        Self::new(NodeKind::Csymbol { url: TIME_URL.into(), name: "time".into() }, vec![])
    }

    pub fn avogadro() -> Self {
        Self::new(NodeKind::Csymbol { url: AVOGADRO_URL.into(), name: "avogadro".into() }, vec![])
    }

    pub fn delay(x: AstNode, t: AstNode) -> Self {
        Self::new(NodeKind::Csymbol { url: DELAY_URL.into(), name: "delay".into() }, vec![x, t])
    }

    pub fn piecewise(pieces: Vec<AstNode>) -> Self {
        Self::apply(Operator::Piecewise, pieces)
    }

    pub fn with_units(mut self, units: &str) -> Self {
        self.units = Some(units.to_string());
        self
    }

    pub fn into_math(self) -> Math {
        Arc::new(self)
    }

    pub fn operator(&self) -> Option<Operator> {
        match self.kind {
            NodeKind::Operator(op) => Some(op),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Integer(_) | NodeKind::Real(_) | NodeKind::Rational { .. } | NodeKind::ENotation { .. }
        )
    }

    pub fn csymbol_kind(&self) -> Option<CsymbolKind> {
        match &self.kind {
            NodeKind::Csymbol { url, .. } => Some(CsymbolKind::from_url(url)),
            _ => None,
        }
    }

    /// The literal value of a numeric node.
    pub fn number_value(&self) -> Option<f64> {
        match self.kind {
            NodeKind::Integer(v) => Some(v as f64),
            NodeKind::Real(v) => Some(v),
            NodeKind::Rational { numerator, denominator } if denominator != 0 => {
                Some(numerator as f64 / denominator as f64)
            }
            NodeKind::ENotation { mantissa, exponent } => Some(mantissa * 10f64.powi(exponent)),
            _ => None,
        }
    }
}

// --- Infix rendering used in diagnostic messages ---

fn is_atomic(node: &AstNode) -> bool {
    !matches!(
        node.kind,
        NodeKind::Operator(Operator::Plus | Operator::Minus | Operator::Times | Operator::Divide | Operator::Power)
    ) || node.children.len() < 2
}

fn write_operand(f: &mut fmt::Formatter<'_>, node: &AstNode) -> fmt::Result {
    if is_atomic(node) {
        write!(f, "{}", node)
    } else {
        write!(f, "({})", node)
    }
}

fn write_args(f: &mut fmt::Formatter<'_>, name: &str, args: &[AstNode]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, a) in args.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", a)?;
    }
    write!(f, ")")
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Integer(v) => write!(f, "{}", v),
            NodeKind::Real(v) => write!(f, "{}", v),
            NodeKind::Rational { numerator, denominator } => write!(f, "({}/{})", numerator, denominator),
            NodeKind::ENotation { mantissa, exponent } => write!(f, "{}e{}", mantissa, exponent),
            NodeKind::Name(id) => write!(f, "{}", id),
            NodeKind::Csymbol { name, .. } if self.children.is_empty() => write!(f, "{}", name),
            NodeKind::Csymbol { name, .. } => write_args(f, name, &self.children),
            NodeKind::Constant(c) => write!(
                f,
                "{}",
                match c {
                    Constant::Pi => "pi",
                    Constant::ExponentialE => "exponentiale",
                    Constant::True => "true",
                    Constant::False => "false",
                    Constant::Infinity => "INF",
                    Constant::NotANumber => "NaN",
                }
            ),
            NodeKind::FunctionCall(name) => write_args(f, name, &self.children),
            NodeKind::Lambda { bvars } => {
                write!(f, "lambda(")?;
                for b in bvars {
                    write!(f, "{}, ", b)?;
                }
                match self.children.first() {
                    Some(body) => write!(f, "{})", body),
                    None => write!(f, ")"),
                }
            }
            NodeKind::Operator(op) => {
                let symbol = match op {
                    Operator::Plus => Some(" + "),
                    Operator::Minus => Some(" - "),
                    Operator::Times => Some(" * "),
                    Operator::Divide => Some(" / "),
                    Operator::Power => Some("^"),
                    _ => None,
                };
                match (symbol, self.children.as_slice()) {
                    (Some(_), [only]) if *op == Operator::Minus => {
                        write!(f, "-")?;
                        write_operand(f, only)
                    }
                    (Some(sym), args) if args.len() >= 2 => {
                        for (i, a) in args.iter().enumerate() {
                            if i > 0 {
                                write!(f, "{}", sym)?;
                            }
                            write_operand(f, a)?;
                        }
                        Ok(())
                    }
                    _ => write_args(f, op.name(), &self.children),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formula_rendering() {
        let expr = AstNode::apply(
            Operator::Times,
            vec![
                AstNode::name("k"),
                AstNode::apply(Operator::Plus, vec![AstNode::name("S"), AstNode::int(1)]),
            ],
        );
        assert_eq!(expr.to_string(), "k * (S + 1)");

        let pw = AstNode::piecewise(vec![
            AstNode::int(1),
            AstNode::apply(Operator::Gt, vec![AstNode::name("x"), AstNode::int(0)]),
            AstNode::int(0),
        ]);
        assert_eq!(pw.to_string(), "piecewise(1, gt(x, 0), 0)");
        assert_eq!(AstNode::apply(Operator::Minus, vec![AstNode::name("x")]).to_string(), "-x");
    }

    #[test]
    fn test_arity_table() {
        assert!(Operator::Minus.arity().accepts(1));
        assert!(Operator::Minus.arity().accepts(2));
        assert!(!Operator::Divide.arity().accepts(3));
        assert!(Operator::Plus.arity().accepts(0));
    }
}
