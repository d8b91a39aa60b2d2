//! # `Select` definition and manipulation
//!
//! The statement half of the SQL AST: a `SELECT` with its projection list,
//! source tables and clause bindings. Clause bindings reference the
//! projection by slot index, which is what makes the map/reduce rewrite
//! mechanical: `all_expressions()` exposes the user-visible projections
//! followed by the clause-helper expressions (`HAVING`, non-projected
//! `ORDER BY`/`GROUP BY` items), and `select()` exposes the user-visible
//! prefix only.

use itertools::Itertools;
use std::fmt;

use crate::expr::Expr;

/// A table reference, bare or schema-qualified.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct Table {
    pub schema: Option<String>,
    pub name: String,
}

impl Table {
    pub fn new<S: Into<String>>(name: S) -> Table {
        Table {
            schema: None,
            name: name.into(),
        }
    }

    pub fn qualified<Q: Into<String>, S: Into<String>>(schema: Q, name: S) -> Table {
        Table {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Where `NULL` values sort.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub enum NullsOrdering {
    #[default]
    Default,
    First,
    Last,
}

/// Direction and nulls ordering of one sort entry.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq)]
pub struct SortSpec {
    pub descending: bool,
    pub nulls: NullsOrdering,
}

/// What a sort entry points at.
///
/// The parser resolves `ORDER BY` items to projection slots; the splitter
/// rewrites reduce-side entries to alias references, by name and never by
/// position.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub enum SortKey {
    Slot(usize),
    Expr(Expr),
}

/// One `ORDER BY` entry.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct SortColumn {
    pub key: SortKey,
    pub spec: SortSpec,
}

/// A `SELECT` statement.
#[derive(Clone, Debug, Default, Hash, PartialEq, Eq)]
pub struct Select {
    distinct: bool,
    /// User-visible projections first, clause-helper expressions after.
    exprs: Vec<Expr>,
    visible: usize,
    from: Vec<Table>,
    filter: Option<Expr>,
    group: Vec<Expr>,
    group_columns: Vec<usize>,
    having_column: Option<usize>,
    sort: Vec<SortColumn>,
    limit: Option<Expr>,
    offset: Option<Expr>,
}

impl Select {
    pub fn new() -> Select {
        Select::default()
    }

    /// A fresh select over a single table, the shape of a reduce query.
    pub fn from_table(table: Table) -> Select {
        Select {
            from: vec![table],
            ..Select::default()
        }
    }

    // Accessors

    /// User-visible projections followed by clause-helper expressions.
    pub fn all_expressions(&self) -> &[Expr] {
        &self.exprs
    }

    /// The user-visible projection list.
    pub fn select(&self) -> &[Expr] {
        &self.exprs[..self.visible]
    }

    pub fn distinct(&self) -> bool {
        self.distinct
    }

    pub fn from(&self) -> &[Table] {
        &self.from
    }

    pub fn filter(&self) -> Option<&Expr> {
        self.filter.as_ref()
    }

    /// The `GROUP BY` expressions as rendered.
    pub fn groups(&self) -> &[Expr] {
        &self.group
    }

    /// The projection slots behind [`Select::groups`].
    pub fn group_columns(&self) -> &[usize] {
        &self.group_columns
    }

    /// The `HAVING` expression, stored as a clause-helper projection.
    pub fn having(&self) -> Option<&Expr> {
        self.having_column.and_then(|slot| self.exprs.get(slot))
    }

    /// The slot of the `HAVING` expression within [`Select::all_expressions`].
    pub fn having_column(&self) -> Option<usize> {
        self.having_column
    }

    pub fn sort(&self) -> &[SortColumn] {
        &self.sort
    }

    pub fn limit(&self) -> Option<&Expr> {
        self.limit.as_ref()
    }

    pub fn offset(&self) -> Option<&Expr> {
        self.offset.as_ref()
    }

    // Mutators, the surface the splitter and the frontend drive.

    pub fn clear_select(&mut self) {
        self.exprs.clear();
        self.visible = 0;
    }

    /// Append a user-visible projection.
    ///
    /// Visible projections must be added before any clause-helper
    /// expression.
    pub fn add_select_expression(&mut self, expr: Expr) {
        self.exprs.push(expr);
        self.visible = self.exprs.len();
    }

    /// Append a clause-helper expression past the visible range and return
    /// its slot.
    pub fn add_clause_expression(&mut self, expr: Expr) -> usize {
        self.exprs.push(expr);
        self.exprs.len() - 1
    }

    pub fn add_from(&mut self, table: Table) {
        self.from.push(table);
    }

    pub fn set_filter(&mut self, filter: Option<Expr>) {
        self.filter = filter;
    }

    /// Install `condition` as the `WHERE` clause, `AND`-ing it onto any
    /// existing one.
    pub fn where_and(&mut self, condition: Expr) {
        self.filter = match self.filter.take() {
            Some(filter) => Some(Expr::and(filter, condition)),
            None => Some(condition),
        };
    }

    pub fn clear_groups(&mut self) {
        self.group.clear();
        self.group_columns.clear();
    }

    /// Record a `GROUP BY` item resolved to projection slot `slot`.
    pub fn add_group_column(&mut self, slot: usize, expr: Expr) {
        self.group_columns.push(slot);
        self.group.push(expr);
    }

    /// Append a `GROUP BY` expression without a slot binding.
    pub fn add_group_expression(&mut self, expr: Expr) {
        self.group.push(expr);
    }

    pub fn set_having_column(&mut self, slot: Option<usize>) {
        self.having_column = slot;
    }

    pub fn clear_having(&mut self) {
        self.having_column = None;
    }

    pub fn add_sort(&mut self, sort_column: SortColumn) {
        self.sort.push(sort_column);
    }

    pub fn clear_sort(&mut self) {
        self.sort.clear();
    }

    pub fn set_limit(&mut self, limit: Option<Expr>) {
        self.limit = limit;
    }

    pub fn set_offset(&mut self, offset: Option<Expr>) {
        self.offset = offset;
    }

    pub fn set_distinct(&mut self, distinct: bool) {
        self.distinct = distinct;
    }

    fn fmt_sort_column(&self, f: &mut fmt::Formatter<'_>, sort_column: &SortColumn) -> fmt::Result {
        match &sort_column.key {
            SortKey::Expr(expr) => write!(f, "{expr}")?,
            SortKey::Slot(slot) => match self.exprs.get(*slot) {
                Some(expr) => match expr.alias_name() {
                    Some(name) => write!(f, "{name}")?,
                    None => write!(f, "{expr}")?,
                },
                None => write!(f, "{}", slot + 1)?,
            },
        }
        if sort_column.spec.descending {
            write!(f, " DESC")?;
        }
        match sort_column.spec.nulls {
            NullsOrdering::Default => Ok(()),
            NullsOrdering::First => write!(f, " NULLS FIRST"),
            NullsOrdering::Last => write!(f, " NULLS LAST"),
        }
    }
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SELECT ")?;
        if self.distinct {
            write!(f, "DISTINCT ")?;
        }
        write!(f, "{}", self.select().iter().join(", "))?;
        if !self.from.is_empty() {
            write!(f, " FROM {}", self.from.iter().join(", "))?;
        }
        if let Some(filter) = &self.filter {
            write!(f, " WHERE {filter}")?;
        }
        if !self.group.is_empty() {
            write!(f, " GROUP BY {}", self.group.iter().join(", "))?;
        }
        if let Some(having) = self.having() {
            write!(f, " HAVING {having}")?;
        }
        if !self.sort.is_empty() {
            write!(f, " ORDER BY ")?;
            for (i, sort_column) in self.sort.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                self.fmt_sort_column(f, sort_column)?;
            }
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {limit}")?;
        }
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Value;

    fn sample_select() -> Select {
        let mut select = Select::from_table(Table::new("t"));
        select.add_select_expression(Expr::col("a"));
        select.add_select_expression(Expr::alias("total", Expr::sum(Expr::col("b"))));
        select
    }

    #[test]
    fn test_display_projections() {
        let select = sample_select();
        assert_eq!(select.to_string(), "SELECT a, SUM(b) AS total FROM t");
    }

    #[test]
    fn test_display_clauses() {
        let mut select = sample_select();
        select.set_distinct(true);
        select.set_filter(Some(Expr::gt(Expr::col("a"), Expr::val(5))));
        select.add_group_column(0, Expr::col("a"));
        select.add_sort(SortColumn {
            key: SortKey::Slot(0),
            spec: SortSpec {
                descending: true,
                nulls: NullsOrdering::Last,
            },
        });
        select.set_limit(Some(Expr::val(Value::Number("10".into()))));
        select.set_offset(Some(Expr::val(Value::Number("5".into()))));
        assert_eq!(
            select.to_string(),
            "SELECT DISTINCT a, SUM(b) AS total FROM t WHERE a > 5 \
             GROUP BY a ORDER BY a DESC NULLS LAST LIMIT 10 OFFSET 5"
        );
    }

    #[test]
    fn test_having_is_a_clause_expression() {
        let mut select = sample_select();
        let slot = select.add_clause_expression(Expr::gt(Expr::count(Expr::col("b")), Expr::val(5)));
        select.set_having_column(Some(slot));
        assert_eq!(select.select().len(), 2);
        assert_eq!(select.all_expressions().len(), 3);
        assert_eq!(select.having_column(), Some(2));
        assert_eq!(
            select.to_string(),
            "SELECT a, SUM(b) AS total FROM t HAVING COUNT(b) > 5"
        );
    }

    #[test]
    fn test_where_and() {
        let mut select = sample_select();
        select.where_and(Expr::col("__C2"));
        assert_eq!(select.filter(), Some(&Expr::col("__C2")));
        select.where_and(Expr::col("__C3"));
        assert_eq!(
            select.to_string(),
            "SELECT a, SUM(b) AS total FROM t WHERE __C2 AND __C3"
        );
    }

    #[test]
    fn test_sort_by_alias_reference() {
        let mut select = Select::from_table(Table::new("__T0"));
        select.add_select_expression(Expr::col("__C0"));
        select.add_sort(SortColumn {
            key: SortKey::Expr(Expr::col("__C0")),
            spec: SortSpec::default(),
        });
        assert_eq!(select.to_string(), "SELECT __C0 FROM __T0 ORDER BY __C0");
    }
}
