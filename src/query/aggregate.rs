//! # Aggregates
//!
//! `SELECT VALUE COUNT/SUM/AVG/MIN/MAX(expr)` runs in two steps: every
//! partition folds its matching documents into a `PartialAggregate`, and
//! the cursor merges the partials of all ranges into the final value.
//!
//! Undefined arguments are skipped. SUM and AVG become undefined once any
//! defined argument is not a number. MIN and MAX use the type order of
//! `compare_values` and ignore arrays and objects.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ast::{Aggregate, AggregateFunction};
use super::eval::{compare_values, evaluate, matches_filter};
use super::parser::BoundQuery;

/// Per-partition state of an aggregate
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialAggregate {
    /// Defined arguments seen
    #[serde(default)]
    pub count: u64,
    #[serde(default)]
    pub sum: f64,
    /// Running MIN or MAX
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<Value>,
    /// A non-number reached SUM or AVG
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub non_numeric: bool,
}

impl PartialAggregate {
    fn add(&mut self, function: AggregateFunction, value: Value) {
        self.count += 1;
        match function {
            AggregateFunction::Count => {}
            AggregateFunction::Sum | AggregateFunction::Avg => match value.as_f64() {
                Some(n) => self.sum += n,
                None => self.non_numeric = true,
            },
            AggregateFunction::Min | AggregateFunction::Max => self.keep_extreme(function, value),
        }
    }

    /// Combine with the partial of another range
    pub fn merge(&mut self, function: AggregateFunction, other: PartialAggregate) {
        self.count += other.count;
        self.sum += other.sum;
        self.non_numeric |= other.non_numeric;
        if let Some(item) = other.item {
            self.keep_extreme(function, item);
        }
    }

    fn keep_extreme(&mut self, function: AggregateFunction, candidate: Value) {
        if matches!(candidate, Value::Array(_) | Value::Object(_)) {
            return;
        }
        let wanted = match function {
            AggregateFunction::Min => Ordering::Less,
            _ => Ordering::Greater,
        };
        let replace = match &self.item {
            None => true,
            Some(current) => compare_values(&candidate, current) == wanted,
        };
        if replace {
            self.item = Some(candidate);
        }
    }

    /// Final value; `None` when the aggregate is undefined
    pub fn finish(self, function: AggregateFunction) -> Option<Value> {
        match function {
            AggregateFunction::Count => Some(Value::from(self.count)),
            AggregateFunction::Sum if self.non_numeric => None,
            AggregateFunction::Sum => Some(number(self.sum)),
            AggregateFunction::Avg if self.non_numeric || self.count == 0 => None,
            AggregateFunction::Avg => Some(number(self.sum / self.count as f64)),
            AggregateFunction::Min | AggregateFunction::Max => self.item,
        }
    }
}

/// Fold the documents of one partition
pub fn fold<'a>(
    bound: &BoundQuery,
    aggregate: &Aggregate,
    documents: impl IntoIterator<Item = &'a Value>,
) -> PartialAggregate {
    let params: &BTreeMap<String, Value> = &bound.parameters;
    let mut partial = PartialAggregate::default();
    for document in documents {
        if !matches_filter(&bound.query, document, params) {
            continue;
        }
        if let Some(value) = evaluate(&aggregate.arg, document, params) {
            partial.add(aggregate.function, value);
        }
    }
    partial
}

/// Integral results stay integers
fn number(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::spec::SqlQuerySpec;
    use serde_json::json;

    fn run(text: &str, docs: &[Value]) -> Option<Value> {
        let bound = BoundQuery::bind(&SqlQuerySpec::new(text)).unwrap();
        let aggregate = bound.query.aggregate().unwrap().clone();
        fold(&bound, &aggregate, docs).finish(aggregate.function)
    }

    fn mixed() -> Vec<Value> {
        vec![
            json!({"k": null}),
            json!({"k": false}),
            json!({"k": "abc"}),
            json!({"k": "xyz"}),
            json!({"k": 1}),
            json!({"k": 2}),
            json!({"k": 4}),
            json!({"other": 1}),
        ]
    }

    #[test]
    fn test_count_skips_undefined() {
        assert_eq!(run("SELECT VALUE COUNT(c.k) FROM c", &mixed()), Some(json!(7)));
        assert_eq!(run("SELECT VALUE COUNT(1) FROM c", &mixed()), Some(json!(8)));
        assert_eq!(run("SELECT VALUE COUNT(1) FROM c WHERE false", &mixed()), Some(json!(0)));
    }

    #[test]
    fn test_sum_and_avg_need_numbers() {
        assert_eq!(run("SELECT VALUE SUM(c.k) FROM c WHERE IS_NUMBER(c.k)", &mixed()), Some(json!(7)));
        assert_eq!(run("SELECT VALUE SUM(c.k) FROM c", &mixed()), None);
        assert_eq!(run("SELECT VALUE AVG(c.k) FROM c", &mixed()), None);
        assert_eq!(
            run("SELECT VALUE AVG(c.k) FROM c WHERE IS_NUMBER(c.k)", &mixed()),
            Some(json!(7.0 / 3.0))
        );
        assert_eq!(run("SELECT VALUE AVG(c.k) FROM c WHERE false", &mixed()), None);
    }

    #[test]
    fn test_min_max_follow_type_order() {
        assert_eq!(run("SELECT VALUE MAX(c.k) FROM c", &mixed()), Some(json!("xyz")));
        assert_eq!(run("SELECT VALUE MIN(c.k) FROM c", &mixed()), Some(json!(null)));
        assert_eq!(run("SELECT VALUE MIN(c.k) FROM c WHERE IS_NUMBER(c.k)", &mixed()), Some(json!(1)));
        assert_eq!(run("SELECT VALUE MAX(c.missing) FROM c", &mixed()), None);
    }

    #[test]
    fn test_merge_across_partitions() {
        let bound = BoundQuery::bind(&SqlQuerySpec::new("SELECT VALUE AVG(c.k) FROM c")).unwrap();
        let aggregate = bound.query.aggregate().unwrap().clone();
        let docs = [json!({"k": 1}), json!({"k": 2}), json!({"k": 6})];

        let mut total = fold(&bound, &aggregate, &docs[..1]);
        total.merge(aggregate.function, fold(&bound, &aggregate, &docs[1..]));
        total.merge(aggregate.function, PartialAggregate::default());
        assert_eq!(total.finish(aggregate.function), Some(json!(3)));
    }

    #[test]
    fn test_partial_wire_shape() {
        let partial = PartialAggregate {
            count: 2,
            sum: 3.0,
            item: None,
            non_numeric: false,
        };
        let wire = serde_json::to_value(&partial).unwrap();
        assert_eq!(wire, json!({"count": 2, "sum": 3.0}));
        let back: PartialAggregate = serde_json::from_value(wire).unwrap();
        assert_eq!(back, partial);
    }
}
