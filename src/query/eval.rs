//! # Query Evaluation
//!
//! Runs a bound query over a set of documents: filter, order, projection
//! and TOP. Used by the in-memory backend for each partition.
//!
//! Missing properties evaluate to "undefined" (`None`). A WHERE clause
//! keeps a document only when it evaluates to `true`.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::ast::{CompareOp, Expr, Projection, SelectQuery, SortDirection};
use super::parser::BoundQuery;

/// One result row. `order_key` is set when the query has ORDER BY.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRow {
    pub order_key: Option<Value>,
    pub payload: Value,
}

/// Type rank used for ordering: null < bool < number < string < array < object
pub fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values, by type first then by value
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    let by_type = type_rank(a).cmp(&type_rank(b));
    if by_type != Ordering::Equal {
        return by_type;
    }

    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

/// Run the query over documents of one partition
pub fn execute<'a>(bound: &BoundQuery, documents: impl IntoIterator<Item = &'a Value>) -> Vec<QueryRow> {
    let query = &bound.query;
    let params = &bound.parameters;

    let mut matched: Vec<(Option<Value>, &Value)> = Vec::new();
    for document in documents {
        if !matches_filter(query, document, params) {
            continue;
        }
        match &query.order_by {
            Some(order) => {
                // Documents without the ORDER BY property are excluded
                if let Some(key) = order.path.lookup(document) {
                    matched.push((Some(key.clone()), document));
                }
            }
            None => matched.push((None, document)),
        }
    }

    if let Some(order) = &query.order_by {
        matched.sort_by(|(a, _), (b, _)| {
            let ordering = match (a, b) {
                (Some(a), Some(b)) => compare_values(a, b),
                _ => Ordering::Equal,
            };
            match order.direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }

    // TOP counts projected rows, after undefined `SELECT VALUE` rows are gone
    matched
        .into_iter()
        .filter_map(|(order_key, document)| {
            project(query, document, params).map(|payload| QueryRow { order_key, payload })
        })
        .take(query.top.unwrap_or(usize::MAX))
        .collect()
}

/// Whether a document passes the WHERE clause
pub fn matches_filter(query: &SelectQuery, document: &Value, params: &BTreeMap<String, Value>) -> bool {
    match &query.filter {
        Some(filter) => evaluate(filter, document, params) == Some(Value::Bool(true)),
        None => true,
    }
}

/// Shape one document per the SELECT list. `None` when `SELECT VALUE`
/// evaluates to undefined, and for aggregates, which `aggregate::fold`
/// computes over the whole partition instead.
pub fn project(query: &SelectQuery, document: &Value, params: &BTreeMap<String, Value>) -> Option<Value> {
    match &query.projection {
        Projection::All => Some(document.clone()),
        Projection::Value(expr) => evaluate(expr, document, params),
        Projection::Aggregate(_) => None,
        Projection::Items(items) => {
            let mut out = Map::new();
            for (position, item) in items.iter().enumerate() {
                let name = match (&item.alias, &item.expr) {
                    (Some(alias), _) => alias.clone(),
                    (None, Expr::Path(path)) => path
                        .leaf_name()
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("${}", position + 1)),
                    _ => format!("${}", position + 1),
                };
                if let Some(value) = evaluate(&item.expr, document, params) {
                    out.insert(name, value);
                }
            }
            Some(Value::Object(out))
        }
    }
}

/// Evaluate an expression against one document
pub fn evaluate(expr: &Expr, document: &Value, params: &BTreeMap<String, Value>) -> Option<Value> {
    match expr {
        Expr::Literal(value) => Some(value.clone()),
        Expr::Parameter(name) => params.get(name).cloned(),
        Expr::Root(_) => Some(document.clone()),
        Expr::Path(path) => path.lookup(document).cloned(),
        Expr::IsDefined(path) => Some(Value::Bool(path.lookup(document).is_some())),
        Expr::TypeCheck(check, arg) => Some(Value::Bool(
            evaluate(arg, document, params).is_some_and(|value| check.matches(&value)),
        )),
        Expr::Compare { op, left, right } => {
            let left = evaluate(left, document, params)?;
            let right = evaluate(right, document, params)?;
            compare(*op, &left, &right).map(Value::Bool)
        }
        Expr::And(left, right) => {
            let left = as_bool(evaluate(left, document, params));
            let right = as_bool(evaluate(right, document, params));
            match (left, right) {
                (Some(false), _) | (_, Some(false)) => Some(Value::Bool(false)),
                (Some(true), Some(true)) => Some(Value::Bool(true)),
                _ => None,
            }
        }
        Expr::Or(left, right) => {
            let left = as_bool(evaluate(left, document, params));
            let right = as_bool(evaluate(right, document, params));
            match (left, right) {
                (Some(true), _) | (_, Some(true)) => Some(Value::Bool(true)),
                (Some(false), Some(false)) => Some(Value::Bool(false)),
                _ => None,
            }
        }
        Expr::Not(inner) => as_bool(evaluate(inner, document, params)).map(|b| Value::Bool(!b)),
    }
}

fn as_bool(value: Option<Value>) -> Option<bool> {
    match value {
        Some(Value::Bool(b)) => Some(b),
        _ => None,
    }
}

/// Equality works across types; ordering comparisons between different
/// types, arrays or objects are undefined.
fn compare(op: CompareOp, left: &Value, right: &Value) -> Option<bool> {
    let same_type = type_rank(left) == type_rank(right);
    let equal = match (left, right) {
        (Value::Number(_), Value::Number(_)) => compare_values(left, right) == Ordering::Equal,
        _ => left == right,
    };

    let orderable = same_type && !matches!(left, Value::Array(_) | Value::Object(_));
    let ordering = compare_values(left, right);

    match op {
        CompareOp::Eq => Some(same_type && equal),
        CompareOp::Ne => Some(!(same_type && equal)),
        _ if !orderable => None,
        CompareOp::Lt => Some(ordering == Ordering::Less),
        CompareOp::Le => Some(ordering != Ordering::Greater),
        CompareOp::Gt => Some(ordering == Ordering::Greater),
        CompareOp::Ge => Some(ordering != Ordering::Less),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::spec::SqlQuerySpec;
    use serde_json::json;

    fn run(spec: SqlQuerySpec, docs: &[Value]) -> Vec<Value> {
        let bound = BoundQuery::bind(&spec).unwrap();
        execute(&bound, docs).into_iter().map(|r| r.payload).collect()
    }

    fn people() -> Vec<Value> {
        vec![
            json!({"id": "a", "name": "Ann", "age": 31, "city": {"name": "Oslo"}}),
            json!({"id": "b", "name": "Bo", "age": 19}),
            json!({"id": "c", "name": "Cy", "age": 45, "city": {"name": "Rome"}}),
            json!({"id": "d", "name": "Di"}),
        ]
    }

    #[test]
    fn test_compare_values_type_order() {
        assert_eq!(compare_values(&json!(null), &json!(false)), Ordering::Less);
        assert_eq!(compare_values(&json!(true), &json!(0)), Ordering::Less);
        assert_eq!(compare_values(&json!(10), &json!("1")), Ordering::Less);
        assert_eq!(compare_values(&json!(2), &json!(10.5)), Ordering::Less);
        assert_eq!(compare_values(&json!(1), &json!(1.0)), Ordering::Equal);
        assert_eq!(compare_values(&json!("b"), &json!("a")), Ordering::Greater);
    }

    #[test]
    fn test_filter_with_parameter() {
        let out = run(
            SqlQuerySpec::new("SELECT VALUE c.id FROM c WHERE c.age > @min").with_parameter("@min", 20),
            &people(),
        );
        assert_eq!(out, vec![json!("a"), json!("c")]);
    }

    #[test]
    fn test_undefined_is_not_true() {
        let out = run(SqlQuerySpec::new("SELECT VALUE c.id FROM c WHERE NOT (c.age > 20)"), &people());
        assert_eq!(out, vec![json!("b")]);
    }

    #[test]
    fn test_or_with_undefined() {
        let out = run(
            SqlQuerySpec::new("SELECT VALUE c.id FROM c WHERE c.age < 20 OR c.name = 'Di'"),
            &people(),
        );
        assert_eq!(out, vec![json!("b"), json!("d")]);
    }

    #[test]
    fn test_is_defined() {
        let out = run(SqlQuerySpec::new("SELECT VALUE c.id FROM c WHERE IS_DEFINED(c.city)"), &people());
        assert_eq!(out, vec![json!("a"), json!("c")]);
    }

    #[test]
    fn test_order_by_excludes_missing_and_applies_top() {
        let out = run(SqlQuerySpec::new("SELECT TOP 2 VALUE c.id FROM c ORDER BY c.age DESC"), &people());
        assert_eq!(out, vec![json!("c"), json!("a")]);

        let bound = BoundQuery::bind(&SqlQuerySpec::new("SELECT * FROM c ORDER BY c.age")).unwrap();
        let rows = execute(&bound, &people());
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].order_key, Some(json!(19)));
    }

    #[test]
    fn test_top_counts_projected_rows() {
        let docs = vec![json!({"id": "a"}), json!({"id": "b", "city": "Oslo"})];
        let out = run(SqlQuerySpec::new("SELECT TOP 1 VALUE c.city FROM c"), &docs);
        assert_eq!(out, vec![json!("Oslo")]);

        let out = run(SqlQuerySpec::new("SELECT TOP 0 * FROM c"), &docs);
        assert!(out.is_empty());
    }

    #[test]
    fn test_type_checks() {
        let docs = vec![
            json!({"id": "a", "v": 1}),
            json!({"id": "b", "v": "1"}),
            json!({"id": "c", "v": null}),
            json!({"id": "d"}),
        ];
        let numbers = run(SqlQuerySpec::new("SELECT VALUE c.id FROM c WHERE IS_NUMBER(c.v)"), &docs);
        assert_eq!(numbers, vec![json!("a")]);
        let nulls = run(SqlQuerySpec::new("SELECT VALUE c.id FROM c WHERE IS_NULL(c.v)"), &docs);
        assert_eq!(nulls, vec![json!("c")]);
        let others = run(SqlQuerySpec::new("SELECT VALUE c.id FROM c WHERE NOT IS_STRING(c.v)"), &docs);
        assert_eq!(others, vec![json!("a"), json!("c"), json!("d")]);
    }

    #[test]
    fn test_projection_names() {
        let out = run(
            SqlQuerySpec::new("SELECT c.id, c.city.name, c.age > 30 AS senior, c.missing FROM c WHERE c.id = 'a'"),
            &people(),
        );
        assert_eq!(out, vec![json!({"id": "a", "name": "Oslo", "senior": true})]);
    }

    #[test]
    fn test_select_value_skips_undefined() {
        let out = run(SqlQuerySpec::new("SELECT VALUE c.city FROM c"), &people());
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_cross_type_comparisons() {
        let docs = vec![json!({"id": "x", "v": "5"}), json!({"id": "y", "v": 5})];
        let eq = run(SqlQuerySpec::new("SELECT VALUE c.id FROM c WHERE c.v = 5"), &docs);
        assert_eq!(eq, vec![json!("y")]);
        let gt = run(SqlQuerySpec::new("SELECT VALUE c.id FROM c WHERE c.v > 1"), &docs);
        assert_eq!(gt, vec![json!("y")]);
        let ne = run(SqlQuerySpec::new("SELECT VALUE c.id FROM c WHERE c.v != 5"), &docs);
        assert_eq!(ne, vec![json!("x")]);
    }
}
