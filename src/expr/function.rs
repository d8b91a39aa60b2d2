//! # Operators and scalar function kinds

use std::fmt;

/// A binary operator.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum Operator {
    Multiply,
    Divide,
    Plus,
    Minus,
    Modulo,
    And,
    Or,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Multiply => write!(f, "*"),
            Operator::Divide => write!(f, "/"),
            Operator::Plus => write!(f, "+"),
            Operator::Minus => write!(f, "-"),
            Operator::Modulo => write!(f, "%"),
            Operator::And => write!(f, "AND"),
            Operator::Or => write!(f, "OR"),
            Operator::Eq => write!(f, "="),
            Operator::NotEq => write!(f, "<>"),
            Operator::Lt => write!(f, "<"),
            Operator::LtEq => write!(f, "<="),
            Operator::Gt => write!(f, ">"),
            Operator::GtEq => write!(f, ">="),
        }
    }
}

/// A scalar function kind.
///
/// `CAST` is the one function the splitter synthesizes itself, so it is a
/// first-class kind carrying its target type; everything else passes
/// through by name.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum FunctionKind {
    Cast { to: String },
    Named(String),
}
