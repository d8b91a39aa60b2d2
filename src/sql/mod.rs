//! # SQL text frontend
//!
//! Parses a query with [`sqlparser`] and converts the generic AST into the
//! typed [`Select`](crate::select::Select) model the splitter operates on.
//! The conversion resolves `GROUP BY` and `ORDER BY` items to projection
//! slots, and stores the `HAVING` expression as a clause-helper projection
//! with its slot recorded, which is the shape the splitter expects.
//!
//! Only the splitter's domain is accepted: a single `SELECT` over plain
//! tables. Set operations, CTEs, joins, subqueries and window functions are
//! rejected up front rather than split incorrectly.

use sqlparser::{ast, dialect::GenericDialect, parser::Parser, parser::ParserError};
use std::{error, fmt, result};

use crate::{
    expr::{AggregateKind, Expr, Operator, Value},
    select::{NullsOrdering, Select, SortColumn, SortKey, SortSpec, Table},
};

// Error management

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The text is not valid SQL; the underlying parser error is kept
    /// unchanged.
    Parse(ParserError),
    /// Valid SQL outside the splitter's domain.
    Unsupported(String),
}

impl Error {
    pub fn unsupported(desc: impl fmt::Display) -> Error {
        Error::Unsupported(desc.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Parse(err) => write!(f, "{err}"),
            Error::Unsupported(desc) => write!(f, "unsupported: {desc}"),
        }
    }
}

impl error::Error for Error {}

impl From<ParserError> for Error {
    fn from(err: ParserError) -> Self {
        Error::Parse(err)
    }
}

pub type Result<T> = result::Result<T, Error>;

/// Parse a single `SELECT` statement into the typed model.
pub fn parse(sql: &str) -> Result<Select> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql)?;
    let statement = match statements.as_slice() {
        [statement] => statement,
        _ => return Err(Error::unsupported("expected a single statement")),
    };
    match statement {
        ast::Statement::Query(query) => try_from_query(query),
        _ => Err(Error::unsupported("only SELECT statements can be split")),
    }
}

fn try_from_query(query: &ast::Query) -> Result<Select> {
    if query.with.is_some() {
        return Err(Error::unsupported("WITH clauses"));
    }
    let body = match query.body.as_ref() {
        ast::SetExpr::Select(select) => select,
        _ => return Err(Error::unsupported("set operations")),
    };
    let mut select = try_from_select(body)?;

    if let Some(order_by) = &query.order_by {
        if order_by.interpolate.is_some() {
            return Err(Error::unsupported("INTERPOLATE"));
        }
        for entry in &order_by.exprs {
            if entry.with_fill.is_some() {
                return Err(Error::unsupported("WITH FILL"));
            }
            let expr = try_from_expr(&entry.expr)?;
            let slot = resolve_slot(&mut select, expr);
            let spec = SortSpec {
                descending: entry.asc == Some(false),
                nulls: match entry.nulls_first {
                    None => NullsOrdering::Default,
                    Some(true) => NullsOrdering::First,
                    Some(false) => NullsOrdering::Last,
                },
            };
            select.add_sort(SortColumn {
                key: SortKey::Slot(slot),
                spec,
            });
        }
    }

    if let Some(limit) = &query.limit {
        select.set_limit(Some(try_from_expr(limit)?));
    }
    if let Some(offset) = &query.offset {
        select.set_offset(Some(try_from_expr(&offset.value)?));
    }

    Ok(select)
}

fn try_from_select(body: &ast::Select) -> Result<Select> {
    let mut select = Select::new();

    match &body.distinct {
        None => {}
        Some(ast::Distinct::Distinct) => select.set_distinct(true),
        Some(ast::Distinct::On(_)) => return Err(Error::unsupported("DISTINCT ON")),
    }

    for item in &body.projection {
        match item {
            ast::SelectItem::UnnamedExpr(expr) => {
                select.add_select_expression(try_from_expr(expr)?);
            }
            ast::SelectItem::ExprWithAlias { expr, alias } => {
                let expr = try_from_expr(expr)?;
                select.add_select_expression(Expr::alias(alias.value.clone(), expr));
            }
            _ => return Err(Error::unsupported("wildcard projections")),
        }
    }

    for table_with_joins in &body.from {
        if !table_with_joins.joins.is_empty() {
            return Err(Error::unsupported("JOIN clauses"));
        }
        match &table_with_joins.relation {
            ast::TableFactor::Table {
                name, alias: None, ..
            } => select.add_from(try_from_object_name(name)?),
            ast::TableFactor::Table { alias: Some(_), .. } => {
                return Err(Error::unsupported("table aliases"))
            }
            _ => return Err(Error::unsupported("derived tables")),
        }
    }

    if let Some(selection) = &body.selection {
        select.set_filter(Some(try_from_expr(selection)?));
    }

    match &body.group_by {
        ast::GroupByExpr::Expressions(exprs, modifiers) => {
            if !modifiers.is_empty() {
                return Err(Error::unsupported("GROUP BY modifiers"));
            }
            for item in exprs {
                let expr = try_from_expr(item)?;
                let slot = resolve_slot(&mut select, expr.clone());
                select.add_group_column(slot, expr);
            }
        }
        ast::GroupByExpr::All(_) => return Err(Error::unsupported("GROUP BY ALL")),
    }

    if let Some(having) = &body.having {
        let expr = try_from_expr(having)?;
        let slot = select.add_clause_expression(expr);
        select.set_having_column(Some(slot));
    }

    Ok(select)
}

/// Resolve a clause item to a projection slot: by position constant, by
/// structural match, or by alias name; otherwise append it as a
/// clause-helper expression.
fn resolve_slot(select: &mut Select, expr: Expr) -> usize {
    // A 1-based positional constant, as in `ORDER BY 2`.
    if let Expr::Value(Value::Number(number)) = &expr {
        if let Ok(position) = number.parse::<usize>() {
            if position >= 1 && position <= select.select().len() {
                return position - 1;
            }
        }
    }
    for (slot, projected) in select.all_expressions().iter().enumerate() {
        if projected == &expr {
            return slot;
        }
        if let Expr::Alias(alias) = projected {
            if alias.expr.as_ref() == &expr {
                return slot;
            }
            if let Expr::Column(column) = &expr {
                if column.qualifier.is_none() && column.name == alias.name {
                    return slot;
                }
            }
        }
    }
    select.add_clause_expression(expr)
}

fn try_from_object_name(name: &ast::ObjectName) -> Result<Table> {
    match name.0.as_slice() {
        [table] => Ok(Table::new(table.value.clone())),
        [schema, table] => Ok(Table::qualified(schema.value.clone(), table.value.clone())),
        _ => Err(Error::unsupported(format!("table name {name}"))),
    }
}

fn try_from_expr(expr: &ast::Expr) -> Result<Expr> {
    match expr {
        ast::Expr::Identifier(ident) => Ok(Expr::col(ident.value.clone())),
        ast::Expr::CompoundIdentifier(idents) => match idents.as_slice() {
            [qualifier, name] => Ok(Expr::qcol(qualifier.value.clone(), name.value.clone())),
            _ => Err(Error::unsupported(format!("column reference {expr}"))),
        },
        ast::Expr::Value(value) => Ok(Expr::Value(try_from_value(value)?)),
        ast::Expr::BinaryOp { left, op, right } => Ok(Expr::op(
            try_from_operator(op)?,
            try_from_expr(left)?,
            try_from_expr(right)?,
        )),
        ast::Expr::UnaryOp {
            op: ast::UnaryOperator::Minus,
            expr,
        } => match try_from_expr(expr)? {
            Expr::Value(Value::Number(number)) => Ok(Expr::Value(Value::Number(format!("-{number}")))),
            _ => Err(Error::unsupported("unary operators")),
        },
        ast::Expr::Nested(inner) => try_from_expr(inner),
        ast::Expr::Cast {
            kind: ast::CastKind::Cast,
            expr,
            data_type,
            format: None,
        } => Ok(Expr::cast(try_from_expr(expr)?, data_type.to_string())),
        ast::Expr::Function(function) => try_from_function(function),
        _ => Err(Error::unsupported(format!("expression {expr}"))),
    }
}

fn try_from_function(function: &ast::Function) -> Result<Expr> {
    if function.over.is_some() {
        return Err(Error::unsupported("window functions"));
    }
    if !function.within_group.is_empty() {
        return Err(Error::unsupported("WITHIN GROUP"));
    }
    let name = function.name.to_string().to_uppercase();
    let args = match &function.args {
        ast::FunctionArguments::List(args) => args,
        ast::FunctionArguments::None => return Ok(Expr::func(name, vec![])),
        ast::FunctionArguments::Subquery(_) => {
            return Err(Error::unsupported("subquery arguments"))
        }
    };
    let distinct = matches!(
        args.duplicate_treatment,
        Some(ast::DuplicateTreatment::Distinct)
    );

    if let Some(kind) = AggregateKind::from_name(&name) {
        return match args.args.as_slice() {
            [ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Wildcard)] => {
                if kind != AggregateKind::Count {
                    return Err(Error::unsupported(format!("{name}(*)")));
                }
                Ok(Expr::count_all())
            }
            [ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Expr(arg))] => Ok(Expr::aggregate(
                kind,
                distinct,
                Some(try_from_expr(arg)?),
            )),
            _ => Err(Error::unsupported(format!(
                "{name} with {} arguments",
                args.args.len()
            ))),
        };
    }

    let args = args
        .args
        .iter()
        .map(|arg| match arg {
            ast::FunctionArg::Unnamed(ast::FunctionArgExpr::Expr(expr)) => try_from_expr(expr),
            _ => Err(Error::unsupported("function argument")),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Expr::func(name, args))
}

fn try_from_value(value: &ast::Value) -> Result<Value> {
    match value {
        ast::Value::Number(number, _) => Ok(Value::Number(number.clone())),
        ast::Value::SingleQuotedString(text) => Ok(Value::Text(text.clone())),
        ast::Value::Boolean(b) => Ok(Value::Boolean(*b)),
        ast::Value::Null => Ok(Value::Null),
        ast::Value::Placeholder(marker) => Ok(Value::Placeholder(marker.clone())),
        _ => Err(Error::unsupported(format!("literal {value}"))),
    }
}

fn try_from_operator(op: &ast::BinaryOperator) -> Result<Operator> {
    match op {
        ast::BinaryOperator::Multiply => Ok(Operator::Multiply),
        ast::BinaryOperator::Divide => Ok(Operator::Divide),
        ast::BinaryOperator::Plus => Ok(Operator::Plus),
        ast::BinaryOperator::Minus => Ok(Operator::Minus),
        ast::BinaryOperator::Modulo => Ok(Operator::Modulo),
        ast::BinaryOperator::And => Ok(Operator::And),
        ast::BinaryOperator::Or => Ok(Operator::Or),
        ast::BinaryOperator::Eq => Ok(Operator::Eq),
        ast::BinaryOperator::NotEq => Ok(Operator::NotEq),
        ast::BinaryOperator::Lt => Ok(Operator::Lt),
        ast::BinaryOperator::LtEq => Ok(Operator::LtEq),
        ast::BinaryOperator::Gt => Ok(Operator::Gt),
        ast::BinaryOperator::GtEq => Ok(Operator::GtEq),
        _ => Err(Error::unsupported(format!("operator {op}"))),
    }
}
