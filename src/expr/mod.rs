//! # `Expr` definition and manipulation
//!
//! `Expr` is the expression half of the SQL AST: a closed set of variants
//! combining columns and constants with operators, scalar functions and
//! aggregate functions. The tree owns its children, so `clone()` is a deep
//! structural copy with fresh node identity, and `Display` renders the
//! canonical SQL text of the expression.

pub mod aggregate;
pub mod function;
pub mod value;

use itertools::Itertools;
use std::fmt;

pub use aggregate::AggregateKind;
pub use function::{FunctionKind, Operator};
pub use value::Value;

/// A column reference, bare or qualified.
///
/// The name is both the display name and the lookup name: columns
/// synthesized by the splitter reference map-side aliases by this name.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Column {
    pub qualifier: Option<String>,
    pub name: String,
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(qualifier) => write!(f, "{}.{}", qualifier, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// A named projection: `expr AS name`.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Alias {
    pub name: String,
    pub expr: Box<Expr>,
}

impl fmt::Display for Alias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} AS {}", self.expr, self.name)
    }
}

/// A binary operation.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Operation {
    pub op: Operator,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_operand(f, &self.left)?;
        write!(f, " {} ", self.op)?;
        fmt_operand(f, &self.right)
    }
}

/// Parenthesize an operand only when it is itself an operation, so that
/// `SUM(__C0 * __C1) / SUM(__C1)` renders without redundant parentheses.
fn fmt_operand(f: &mut fmt::Formatter<'_>, operand: &Expr) -> fmt::Result {
    match operand {
        Expr::Operation(_) => write!(f, "({operand})"),
        _ => write!(f, "{operand}"),
    }
}

/// A scalar function call.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Function {
    pub kind: FunctionKind,
    pub args: Vec<Expr>,
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            FunctionKind::Cast { to } => {
                write!(f, "CAST(")?;
                if let Some(arg) = self.args.first() {
                    write!(f, "{arg}")?;
                }
                write!(f, " AS {to})")
            }
            FunctionKind::Named(name) => write!(f, "{}({})", name, self.args.iter().join(", ")),
        }
    }
}

/// An aggregate function call.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Aggregate {
    pub kind: AggregateKind,
    pub distinct: bool,
    pub arg: Option<Box<Expr>>,
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.arg, self.kind) {
            (_, AggregateKind::CountAll) => write!(f, "COUNT(*)"),
            (Some(arg), kind) if self.distinct => write!(f, "{kind}(DISTINCT {arg})"),
            (Some(arg), kind) => write!(f, "{kind}({arg})"),
            (None, kind) => write!(f, "{kind}()"),
        }
    }
}

/// A SQL expression.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum Expr {
    Column(Column),
    Value(Value),
    Alias(Alias),
    Operation(Operation),
    Function(Function),
    Aggregate(Aggregate),
}

// Basic constructors

impl Expr {
    /// A bare column reference.
    pub fn col<S: Into<String>>(name: S) -> Expr {
        Expr::Column(Column {
            qualifier: None,
            name: name.into(),
        })
    }

    /// A qualified column reference.
    pub fn qcol<Q: Into<String>, S: Into<String>>(qualifier: Q, name: S) -> Expr {
        Expr::Column(Column {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        })
    }

    /// A constant.
    pub fn val<V: Into<Value>>(value: V) -> Expr {
        Expr::Value(value.into())
    }

    /// A named projection over `expr`.
    pub fn alias<S: Into<String>>(name: S, expr: Expr) -> Expr {
        Expr::Alias(Alias {
            name: name.into(),
            expr: Box::new(expr),
        })
    }

    /// A binary operation.
    pub fn op(op: Operator, left: Expr, right: Expr) -> Expr {
        Expr::Operation(Operation {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// A scalar function call by name.
    pub fn func<S: Into<String>>(name: S, args: Vec<Expr>) -> Expr {
        Expr::Function(Function {
            kind: FunctionKind::Named(name.into()),
            args,
        })
    }

    /// A `CAST(expr AS to)` call.
    pub fn cast<S: Into<String>>(expr: Expr, to: S) -> Expr {
        Expr::Function(Function {
            kind: FunctionKind::Cast { to: to.into() },
            args: vec![expr],
        })
    }

    /// An aggregate function call.
    pub fn aggregate(kind: AggregateKind, distinct: bool, arg: Option<Expr>) -> Expr {
        Expr::Aggregate(Aggregate {
            kind,
            distinct,
            arg: arg.map(Box::new),
        })
    }

    /// `COUNT(*)`.
    pub fn count_all() -> Expr {
        Expr::aggregate(AggregateKind::CountAll, false, None)
    }
}

macro_rules! impl_operation_constructors {
    ($(($Variant:ident, $name:ident)),*) => {
        impl Expr {
            $(
                pub fn $name(left: Expr, right: Expr) -> Expr {
                    Expr::op(Operator::$Variant, left, right)
                }
            )*
        }
    };
}

impl_operation_constructors!(
    (Multiply, multiply),
    (Divide, divide),
    (Plus, plus),
    (Minus, minus),
    (And, and),
    (Or, or),
    (Eq, eq),
    (NotEq, not_eq),
    (Lt, lt),
    (LtEq, lt_eq),
    (Gt, gt),
    (GtEq, gt_eq)
);

macro_rules! impl_aggregate_constructors {
    ($(($Variant:ident, $name:ident)),*) => {
        impl Expr {
            $(
                pub fn $name(arg: Expr) -> Expr {
                    Expr::aggregate(AggregateKind::$Variant, false, Some(arg))
                }
            )*
        }
    };
}

impl_aggregate_constructors!((Avg, avg), (Sum, sum), (Min, min), (Max, max), (Count, count));

// Tree helpers

impl Expr {
    /// The alias name when the node is an [`Alias`].
    pub fn alias_name(&self) -> Option<&str> {
        match self {
            Expr::Alias(alias) => Some(alias.name.as_str()),
            _ => None,
        }
    }

    /// Direct children of the node.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Column(_) | Expr::Value(_) => vec![],
            Expr::Alias(alias) => vec![alias.expr.as_ref()],
            Expr::Operation(operation) => vec![operation.left.as_ref(), operation.right.as_ref()],
            Expr::Function(function) => function.args.iter().collect(),
            Expr::Aggregate(aggregate) => aggregate.arg.as_deref().into_iter().collect(),
        }
    }

    /// Whether the subtree contains an aggregate function call.
    pub fn contains_aggregate(&self) -> bool {
        match self {
            Expr::Aggregate(_) => true,
            _ => self.children().iter().any(|child| child.contains_aggregate()),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(column) => column.fmt(f),
            Expr::Value(value) => value.fmt(f),
            Expr::Alias(alias) => alias.fmt(f),
            Expr::Operation(operation) => operation.fmt(f),
            Expr::Function(function) => function.fmt(f),
            Expr::Aggregate(aggregate) => aggregate.fmt(f),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_display() {
        assert_eq!(Expr::col("a").to_string(), "a");
        assert_eq!(Expr::qcol("t", "a").to_string(), "t.a");
    }

    #[test]
    fn test_alias_display() {
        let expr = Expr::alias("__C0", Expr::col("a"));
        assert_eq!(expr.to_string(), "a AS __C0");
    }

    #[test]
    fn test_operation_display() {
        let expr = Expr::divide(
            Expr::sum(Expr::multiply(Expr::col("__C0"), Expr::col("__C1"))),
            Expr::sum(Expr::col("__C1")),
        );
        assert_eq!(expr.to_string(), "SUM(__C0 * __C1) / SUM(__C1)");
        // Operation operands are parenthesized.
        let expr = Expr::and(
            Expr::gt(Expr::col("a"), Expr::val(1)),
            Expr::lt(Expr::col("b"), Expr::val(2)),
        );
        assert_eq!(expr.to_string(), "(a > 1) AND (b < 2)");
    }

    #[test]
    fn test_cast_display() {
        let expr = Expr::cast(Expr::col("x"), "DOUBLE");
        assert_eq!(expr.to_string(), "CAST(x AS DOUBLE)");
        let expr = Expr::cast(Expr::sum(Expr::col("__C0")), "BIGINT");
        assert_eq!(expr.to_string(), "CAST(SUM(__C0) AS BIGINT)");
    }

    #[test]
    fn test_aggregate_display() {
        assert_eq!(Expr::count_all().to_string(), "COUNT(*)");
        assert_eq!(Expr::count(Expr::col("x")).to_string(), "COUNT(x)");
        let distinct = Expr::aggregate(AggregateKind::Sum, true, Some(Expr::col("x")));
        assert_eq!(distinct.to_string(), "SUM(DISTINCT x)");
        assert_eq!(
            Expr::avg(Expr::cast(Expr::col("x"), "DOUBLE")).to_string(),
            "AVG(CAST(x AS DOUBLE))"
        );
    }

    #[test]
    fn test_function_display() {
        let expr = Expr::func("UPPER", vec![Expr::col("name")]);
        assert_eq!(expr.to_string(), "UPPER(name)");
    }

    #[test]
    fn test_contains_aggregate() {
        assert!(!Expr::col("a").contains_aggregate());
        assert!(Expr::sum(Expr::col("a")).contains_aggregate());
        assert!(Expr::plus(Expr::val(1), Expr::sum(Expr::col("a"))).contains_aggregate());
        let nested = Expr::sum(Expr::count(Expr::col("a")));
        assert!(nested.contains_aggregate());
    }

    #[test]
    fn test_deep_clone() {
        let expr = Expr::alias("u", Expr::avg(Expr::qcol("t", "x")));
        let copy = expr.clone();
        assert_eq!(expr, copy);
    }
}
