//! # Two-step query splitting
//!
//! Rewrites a single-node `SELECT` into a map/reduce pair: the map query
//! runs on every data-bearing node against its local partitions, the
//! per-node result sets are streamed into a synthetic merge table on the
//! coordinator, and the reduce query computes the final result over that
//! table alone.
//!
//! Every map projection is wrapped in an alias so the reduce side can
//! reference it by name. Aggregates are decomposed by their distributivity
//! laws:
//!
//! | Source       | Map                                   | Reduce                           |
//! |--------------|---------------------------------------|----------------------------------|
//! | `SUM(x)`     | `SUM(x)`                              | `SUM(c)`                         |
//! | `MIN(x)`     | `MIN(x)`                              | `MIN(c)`                         |
//! | `MAX(x)`     | `MAX(x)`                              | `MAX(c)`                         |
//! | `COUNT(x)`   | `COUNT(x)`                            | `CAST(SUM(c) AS BIGINT)`         |
//! | `COUNT(*)`   | `COUNT(*)`                            | `CAST(SUM(c) AS BIGINT)`         |
//! | `AVG(x)`     | `AVG(CAST(x AS DOUBLE))`, `COUNT(x)`  | `SUM(c * n) / SUM(n)`            |
//!
//! where `c`/`n` are the generated aliases of the map columns.

use colored::Colorize;
use serde::Serialize;
use std::{error, fmt, result};
use tracing::debug;

use crate::{
    expr::{AggregateKind, Expr, Value},
    namer,
    select::{Select, SortColumn, SortKey, Table},
};

// Error management

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// The aggregate has no known decomposition into per-node partials.
    UnsupportedAggregate(AggregateKind),
    /// A structural assumption about the input did not hold. This is a bug
    /// in the caller or the parser, not a property of the data.
    InvariantViolated(String),
}

impl Error {
    pub fn unsupported_aggregate(kind: AggregateKind) -> Error {
        Error::UnsupportedAggregate(kind)
    }

    pub fn invariant_violated(desc: impl fmt::Display) -> Error {
        Error::InvariantViolated(desc.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::UnsupportedAggregate(kind) => write!(f, "unsupported aggregate: {kind}"),
            Error::InvariantViolated(desc) => write!(f, "invariant violated: {desc}"),
        }
    }
}

impl error::Error for Error {}

pub type Result<T> = result::Result<T, Error>;

/// One map query together with the merge table its results stream into.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MapQuery {
    pub merge_table: String,
    pub sql: String,
    pub params: Vec<Value>,
}

/// The executable artifact of a split: the reduce SQL and the map queries
/// feeding its merge tables.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TwoStepQuery {
    pub reduce_sql: String,
    pub map_queries: Vec<MapQuery>,
}

impl TwoStepQuery {
    pub fn new<S: Into<String>>(reduce_sql: S) -> TwoStepQuery {
        TwoStepQuery {
            reduce_sql: reduce_sql.into(),
            map_queries: vec![],
        }
    }

    pub fn add_map_query<S: Into<String>>(&mut self, merge_table: S, sql: S, params: Vec<Value>) {
        self.map_queries.push(MapQuery {
            merge_table: merge_table.into(),
            sql: sql.into(),
            params,
        });
    }
}

impl fmt::Display for TwoStepQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for map_query in &self.map_queries {
            writeln!(
                f,
                "{} -> {}",
                map_query.merge_table,
                map_query.sql.yellow()
            )?;
        }
        write!(f, "{}", self.reduce_sql.red())
    }
}

/// Split `src` into its map and reduce statements.
///
/// The source is never mutated: the map query starts as a deep clone and
/// the reduce query is built from scratch over the merge table.
pub fn split_select(src: &Select) -> Result<(Select, Select)> {
    let mut map_qry = src.clone();
    let mut rdc_qry = Select::from_table(Table::new(namer::table_name(0)));

    // Split all select expressions into map-reduce parts.
    let mut map_exps: Vec<Expr> = src.all_expressions().to_vec();
    let mut rdc_exps: Vec<Option<Expr>> = vec![None; src.select().len()];

    // The bound is frozen before the loop: AVG appends COUNT columns to
    // `map_exps`, and those are already fully split.
    let len = map_exps.len();
    for idx in 0..len {
        split_select_expression(&mut map_exps, &mut rdc_exps, idx)?;
    }

    // Fill select expressions.
    map_qry.clear_select();
    for exp in &map_exps {
        map_qry.add_select_expression(exp.clone());
    }
    for exp in rdc_exps.into_iter().flatten() {
        rdc_qry.add_select_expression(exp);
    }

    // -- GROUP BY
    if !src.groups().is_empty() {
        map_qry.clear_groups();
        for &col in src.group_columns() {
            map_qry.add_group_expression(Expr::col(slot_alias(&map_exps, col)?));
        }
        for &col in src.group_columns() {
            rdc_qry.add_group_expression(Expr::col(slot_alias(&map_exps, col)?));
        }
    }

    // -- HAVING
    // The parser stores the HAVING expression as a clause-helper projection,
    // so after the split it is a named map column: the reduce query filters
    // on that column and the map query drops its HAVING.
    if let Some(having) = src.having_column() {
        rdc_qry.where_and(Expr::col(namer::column_name(having)));
        map_qry.clear_having();
    }

    // -- ORDER BY
    // The final ordering is produced on the reduce side, by map alias; the
    // merge table is unordered by construction, so the map side sorts
    // nothing.
    if !src.sort().is_empty() {
        for sort_column in src.sort() {
            let slot = match sort_column.key {
                SortKey::Slot(slot) => slot,
                SortKey::Expr(_) => {
                    return Err(Error::invariant_violated(
                        "source sort entry is not slot-addressed",
                    ))
                }
            };
            rdc_qry.add_sort(SortColumn {
                key: SortKey::Expr(Expr::col(slot_alias(&map_exps, slot)?)),
                spec: sort_column.spec,
            });
        }
        map_qry.clear_sort();
    }

    // -- LIMIT
    // A map-side LIMIT would truncate the partials feeding reduce-side
    // grouping and ordering, so it moves wholesale to the reduce query.
    if src.limit().is_some() {
        map_qry.set_limit(None);
        rdc_qry.set_limit(src.limit().cloned());
    }

    // -- OFFSET
    if src.offset().is_some() {
        map_qry.set_offset(None);
        rdc_qry.set_offset(src.offset().cloned());
    }

    // -- DISTINCT
    // Deduplication is only global after the merge.
    if src.distinct() {
        map_qry.set_distinct(false);
        rdc_qry.set_distinct(true);
    }

    Ok((map_qry, rdc_qry))
}

/// Split `src` and package the result as the executable artifact, with
/// `params` passed through to the map query verbatim.
pub fn split(src: &Select, params: Vec<Value>) -> Result<TwoStepQuery> {
    let merge_table = namer::table_name(0);

    let (map_qry, rdc_qry) = split_select(src)?;

    let map_sql = map_qry.to_string();
    let reduce_sql = rdc_qry.to_string();
    debug!(
        merge_table = %merge_table,
        map = %map_sql,
        reduce = %reduce_sql,
        "split select into a two-step query"
    );

    let mut res = TwoStepQuery::new(reduce_sql);
    res.add_map_query(merge_table, map_sql, params);
    Ok(res)
}

/// Split the expression at `map_select[idx]` into its map-side form
/// (rewritten in place) and its reduce-side form (stored in `rdc_select`
/// when the slot is user-visible).
fn split_select_expression(
    map_select: &mut Vec<Expr>,
    rdc_select: &mut [Option<Expr>],
    idx: usize,
) -> Result<()> {
    // Unwrap the user alias, if any.
    let (user_alias, el) = match map_select[idx].clone() {
        Expr::Alias(alias) => (Some(alias.name), *alias.expr),
        other => (None, other),
    };

    match el {
        Expr::Aggregate(agg) => {
            let map_agg_alias = namer::column_name(idx);

            if let Some(arg) = agg.arg.as_deref() {
                if arg.contains_aggregate() {
                    return Err(Error::invariant_violated(format!(
                        "nested aggregate in {arg}"
                    )));
                }
            }

            let (map_agg, rdc_agg) = match agg.kind {
                // SUM( AVG(CAST(x AS DOUBLE)) * COUNT(x) ) / SUM( COUNT(x) )
                AggregateKind::Avg => {
                    let arg = match agg.arg {
                        Some(arg) => *arg,
                        None => return Err(Error::invariant_violated("AVG without an argument")),
                    };

                    // COUNT(x) goes in as the last map column, so its alias
                    // is derived from the list length at append time.
                    let cnt_alias = namer::column_name(map_select.len());
                    map_select.push(Expr::alias(
                        cnt_alias.clone(),
                        Expr::aggregate(AggregateKind::Count, agg.distinct, Some(arg.clone())),
                    ));

                    let map_agg = Expr::aggregate(
                        AggregateKind::Avg,
                        agg.distinct,
                        Some(Expr::cast(arg, "DOUBLE")),
                    );

                    let sum_up = Expr::sum(Expr::multiply(
                        Expr::col(map_agg_alias.clone()),
                        Expr::col(cnt_alias.clone()),
                    ));
                    let sum_down = Expr::sum(Expr::col(cnt_alias));
                    (map_agg, Expr::divide(sum_up, sum_down))
                }

                // SUM(SUM(x)), MIN(MIN(x)), MAX(MAX(x))
                AggregateKind::Sum | AggregateKind::Min | AggregateKind::Max => {
                    let arg = match agg.arg {
                        Some(arg) => *arg,
                        None => {
                            return Err(Error::invariant_violated(format!(
                                "{} without an argument",
                                agg.kind
                            )))
                        }
                    };
                    (
                        Expr::aggregate(agg.kind, agg.distinct, Some(arg)),
                        Expr::aggregate(agg.kind, agg.distinct, Some(Expr::col(map_agg_alias.clone()))),
                    )
                }

                // CAST(SUM( COUNT(x) ) AS BIGINT), CAST(SUM( COUNT(*) ) AS BIGINT).
                // The outer SUM is never DISTINCT: the map side already
                // deduplicated, and the partial counts are not a duplicate set.
                AggregateKind::Count | AggregateKind::CountAll => {
                    let map_agg = Expr::aggregate(agg.kind, agg.distinct, agg.arg.map(|arg| *arg));
                    let rdc_agg = Expr::cast(Expr::sum(Expr::col(map_agg_alias.clone())), "BIGINT");
                    (map_agg, rdc_agg)
                }

                kind => return Err(Error::unsupported_aggregate(kind)),
            };

            if map_agg.alias_name().is_some() {
                return Err(Error::invariant_violated("map aggregate is already aliased"));
            }

            // Add the generated alias to the map aggregate, and the user
            // alias back onto the reduce expression so clause bindings
            // still resolve.
            map_select[idx] = Expr::alias(map_agg_alias, map_agg);

            let rdc_agg = match user_alias {
                Some(name) => Expr::alias(name, rdc_agg),
                None => rdc_agg,
            };
            if idx < rdc_select.len() {
                rdc_select[idx] = Some(rdc_agg);
            }
        }
        el => {
            // Non-aggregate expression: keep the user alias, or fall back
            // to the column's own name, or generate one.
            let alias_name = match user_alias {
                Some(name) => name,
                None => match &el {
                    Expr::Column(column) => column.name.clone(),
                    _ => namer::column_name(idx),
                },
            };
            map_select[idx] = Expr::alias(alias_name.clone(), el);
            if idx < rdc_select.len() {
                rdc_select[idx] = Some(Expr::col(alias_name));
            }
        }
    }
    Ok(())
}

/// The generated alias of the map projection at `slot`.
fn slot_alias(map_exps: &[Expr], slot: usize) -> Result<String> {
    map_exps
        .get(slot)
        .and_then(|exp| exp.alias_name())
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            Error::invariant_violated(format!("projection slot {slot} has no alias after split"))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn split_one(exprs: Vec<Expr>, visible: usize) -> Result<(Vec<Expr>, Vec<Option<Expr>>)> {
        let mut map_select = exprs;
        let mut rdc_select = vec![None; visible];
        let len = map_select.len();
        for idx in 0..len {
            split_select_expression(&mut map_select, &mut rdc_select, idx)?;
        }
        Ok((map_select, rdc_select))
    }

    #[test]
    fn test_bare_column_keeps_its_name() {
        let (map, rdc) = split_one(vec![Expr::col("a")], 1).unwrap();
        assert_eq!(map[0], Expr::alias("a", Expr::col("a")));
        assert_eq!(rdc[0], Some(Expr::col("a")));
    }

    #[test]
    fn test_user_alias_wins() {
        let (map, rdc) = split_one(vec![Expr::alias("mine", Expr::col("a"))], 1).unwrap();
        assert_eq!(map[0], Expr::alias("mine", Expr::col("a")));
        assert_eq!(rdc[0], Some(Expr::col("mine")));
    }

    #[test]
    fn test_complex_expression_gets_generated_alias() {
        let expr = Expr::multiply(Expr::col("a"), Expr::val(2));
        let (map, rdc) = split_one(vec![expr.clone()], 1).unwrap();
        assert_eq!(map[0], Expr::alias("__C0", expr));
        assert_eq!(rdc[0], Some(Expr::col("__C0")));
    }

    #[test]
    fn test_sum_split() {
        let (map, rdc) = split_one(vec![Expr::sum(Expr::col("b"))], 1).unwrap();
        assert_eq!(map[0].to_string(), "SUM(b) AS __C0");
        assert_eq!(rdc[0].as_ref().unwrap().to_string(), "SUM(__C0)");
    }

    #[test]
    fn test_count_split_casts_the_merged_sum() {
        let (map, rdc) = split_one(vec![Expr::count(Expr::col("b"))], 1).unwrap();
        assert_eq!(map[0].to_string(), "COUNT(b) AS __C0");
        assert_eq!(
            rdc[0].as_ref().unwrap().to_string(),
            "CAST(SUM(__C0) AS BIGINT)"
        );
    }

    #[test]
    fn test_count_distinct_stays_on_the_map_side() {
        let distinct = Expr::aggregate(AggregateKind::Count, true, Some(Expr::col("b")));
        let (map, rdc) = split_one(vec![distinct], 1).unwrap();
        assert_eq!(map[0].to_string(), "COUNT(DISTINCT b) AS __C0");
        // The merged partial counts are not a duplicate set.
        assert_eq!(
            rdc[0].as_ref().unwrap().to_string(),
            "CAST(SUM(__C0) AS BIGINT)"
        );
    }

    #[test]
    fn test_avg_split_grows_the_map_list() {
        let (map, rdc) = split_one(vec![Expr::avg(Expr::col("x"))], 1).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map[0].to_string(), "AVG(CAST(x AS DOUBLE)) AS __C0");
        assert_eq!(map[1].to_string(), "COUNT(x) AS __C1");
        assert_eq!(
            rdc[0].as_ref().unwrap().to_string(),
            "SUM(__C0 * __C1) / SUM(__C1)"
        );
    }

    #[test]
    fn test_avg_count_alias_uses_the_length_at_append_time() {
        let exprs = vec![Expr::avg(Expr::col("x")), Expr::avg(Expr::col("y"))];
        let (map, rdc) = split_one(exprs, 2).unwrap();
        assert_eq!(map.len(), 4);
        assert_eq!(map[2].to_string(), "COUNT(x) AS __C2");
        assert_eq!(map[3].to_string(), "COUNT(y) AS __C3");
        assert_eq!(
            rdc[1].as_ref().unwrap().to_string(),
            "SUM(__C1 * __C3) / SUM(__C3)"
        );
    }

    #[test]
    fn test_user_alias_moves_to_the_reduce_side() {
        let (map, rdc) = split_one(vec![Expr::alias("c", Expr::count(Expr::col("b")))], 1).unwrap();
        assert_eq!(map[0].to_string(), "COUNT(b) AS __C0");
        assert_eq!(
            rdc[0].as_ref().unwrap().to_string(),
            "CAST(SUM(__C0) AS BIGINT) AS c"
        );
    }

    #[test]
    fn test_clause_helper_slot_has_no_reduce_expression() {
        let exprs = vec![
            Expr::col("a"),
            Expr::gt(Expr::count(Expr::col("b")), Expr::val(5)),
        ];
        let (map, rdc) = split_one(exprs, 1).unwrap();
        assert_eq!(map[1].to_string(), "COUNT(b) > 5 AS __C1");
        assert_eq!(rdc.len(), 1);
        assert_eq!(rdc[0], Some(Expr::col("a")));
    }

    #[test]
    fn test_unsupported_aggregate() {
        let expr = Expr::aggregate(AggregateKind::GroupConcat, false, Some(Expr::col("a")));
        let err = split_one(vec![expr], 1).unwrap_err();
        assert_eq!(err, Error::UnsupportedAggregate(AggregateKind::GroupConcat));
    }

    #[test]
    fn test_nested_aggregate_is_rejected() {
        let expr = Expr::sum(Expr::count(Expr::col("a")));
        let err = split_one(vec![expr], 1).unwrap_err();
        assert!(matches!(err, Error::InvariantViolated(_)));
    }

    #[test]
    fn test_two_step_query_display() {
        let mut res = TwoStepQuery::new("SELECT SUM(__C0) FROM __T0");
        res.add_map_query("__T0", "SELECT SUM(b) AS __C0 FROM t", vec![]);
        let rendered = format!("{res}");
        assert!(rendered.contains("__T0 -> "));
        assert!(rendered.contains("SELECT SUM(b) AS __C0 FROM t"));
        assert!(rendered.contains("SELECT SUM(__C0) FROM __T0"));
    }
}
