//! # Query Execution Engine
//!
//! Parses and validates SQL query text, evaluates it over documents, and
//! pages results back through an explicit cursor.
//!
//! - Single-partition, cross-partition and unscoped execution
//! - ORDER BY across partitions by k-way merge
//! - `SELECT VALUE` aggregates folded per partition, merged by the cursor
//! - Cancellation between or during page fetches

mod aggregate;
mod ast;
mod cursor;
mod eval;
mod lexer;
mod merge;
mod parser;
mod spec;

pub use aggregate::{fold as fold_aggregate, PartialAggregate};
pub use ast::{
    Aggregate, AggregateFunction, CompareOp, Expr, OrderBy, PathSegment, Projection, PropertyPath,
    SelectItem, SelectQuery, SortDirection, TypeCheck,
};
pub use cursor::{CancelHandle, QueryCursor, QueryOptions, QueryState};
pub use eval::{compare_values, execute, QueryRow};
pub use merge::{select_next, OrderKeyGuard};
pub use parser::{parse_query, BoundQuery};
pub use spec::{SqlParameter, SqlQuerySpec};
