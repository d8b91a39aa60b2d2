//! # `twostep` — two-step splitting of SQL queries
//!
//! `twostep` rewrites a single-node SQL `SELECT` into a pair of queries
//! that together compute the same result in a two-stage map/reduce
//! execution model: a *map* query executed by every data-bearing node
//! against its local partitions, and a *reduce* query executed on a
//! coordinator over a synthetic merge table holding the union of the map
//! results.
//!
//! The rewrite is purely algebraic. Aggregates are decomposed by their
//! distributivity laws (`AVG` becomes `SUM`/`COUNT` arithmetic, `COUNT`
//! partials are summed, `SUM`/`MIN`/`MAX` fold into themselves) and the
//! clause bindings — `GROUP BY`, `HAVING`, `ORDER BY`, `LIMIT`, `OFFSET`,
//! `DISTINCT` — are rehomed between the two stages so the reduce query can
//! be evaluated over the projected map outputs alone.
//!
//! ```
//! use twostep::{split, sql::parse};
//!
//! let select = parse("SELECT dept, AVG(salary) FROM emp GROUP BY dept").unwrap();
//! let two_step = split(&select, vec![]).unwrap();
//! assert_eq!(two_step.map_queries[0].merge_table, "__T0");
//! ```
//!
//! The source AST is never mutated and the output is deterministic: the
//! same input yields byte-identical map and reduce SQL.

pub mod expr;
pub mod namer;
pub mod select;
pub mod split;
pub mod sql;

pub use expr::{Expr, Value};
pub use select::Select;
pub use split::{split, split_select, MapQuery, TwoStepQuery};
