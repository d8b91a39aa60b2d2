//! # Aggregate function kinds
//!
//! The set of aggregate functions the planner can name. Only the algebraic
//! ones (`AVG`, `SUM`, `MIN`, `MAX`, `COUNT`, `COUNT(*)`) can be decomposed
//! into per-node partials plus a merge step; the remaining kinds exist so
//! the frontend can report them precisely.

use std::fmt;

/// An aggregate function kind.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum AggregateKind {
    Avg,
    Sum,
    Min,
    Max,
    Count,
    /// `COUNT(*)`, the only aggregate without an argument.
    CountAll,
    GroupConcat,
    StdDev,
}

impl AggregateKind {
    /// Look an aggregate up by its (upper-cased) SQL name.
    ///
    /// `COUNT(*)` is not name-addressable: the frontend selects [`AggregateKind::CountAll`]
    /// from the wildcard argument instead.
    pub fn from_name(name: &str) -> Option<AggregateKind> {
        match name {
            "AVG" => Some(AggregateKind::Avg),
            "SUM" => Some(AggregateKind::Sum),
            "MIN" => Some(AggregateKind::Min),
            "MAX" => Some(AggregateKind::Max),
            "COUNT" => Some(AggregateKind::Count),
            "GROUP_CONCAT" => Some(AggregateKind::GroupConcat),
            "STDDEV" | "STDDEV_POP" => Some(AggregateKind::StdDev),
            _ => None,
        }
    }
}

impl fmt::Display for AggregateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateKind::Avg => write!(f, "AVG"),
            AggregateKind::Sum => write!(f, "SUM"),
            AggregateKind::Min => write!(f, "MIN"),
            AggregateKind::Max => write!(f, "MAX"),
            AggregateKind::Count | AggregateKind::CountAll => write!(f, "COUNT"),
            AggregateKind::GroupConcat => write!(f, "GROUP_CONCAT"),
            AggregateKind::StdDev => write!(f, "STDDEV"),
        }
    }
}
