//! # Order-By Merge
//!
//! Cross-partition ORDER BY: each range yields rows already sorted by the
//! backend, and the cursor repeatedly takes the smallest head across ranges.
//! Ties go to the lowest range so the merged order is deterministic.

use std::cmp::Ordering;

use serde_json::Value;

use crate::error::{CosmosError, CosmosResult};

use super::ast::SortDirection;
use super::eval::{compare_values, type_rank};

/// Tracks the type of every ORDER BY key seen by one query
#[derive(Debug, Default)]
pub struct OrderKeyGuard {
    rank: Option<u8>,
}

impl OrderKeyGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject keys that cannot be totally ordered together with earlier ones
    pub fn check(&mut self, key: &Value) -> CosmosResult<()> {
        if matches!(key, Value::Array(_) | Value::Object(_)) {
            return Err(CosmosError::unsupported_query(format!(
                "ORDER BY key {} is not a scalar",
                key
            )));
        }

        let rank = type_rank(key);
        match self.rank {
            None => {
                self.rank = Some(rank);
                Ok(())
            }
            Some(seen) if seen == rank => Ok(()),
            Some(_) => Err(CosmosError::unsupported_query(
                "ORDER BY keys of mixed types cannot be merged",
            )),
        }
    }
}

/// Index of the head that comes next, given one optional head per range
pub fn select_next(heads: &[Option<&Value>], direction: SortDirection) -> Option<usize> {
    let mut best: Option<(usize, &Value)> = None;
    for (index, head) in heads.iter().enumerate() {
        let Some(key) = *head else {
            continue;
        };
        best = match best {
            None => Some((index, key)),
            Some((best_index, best_key)) => {
                let ordering = match direction {
                    SortDirection::Asc => compare_values(key, best_key),
                    SortDirection::Desc => compare_values(best_key, key),
                };
                if ordering == Ordering::Less {
                    Some((index, key))
                } else {
                    Some((best_index, best_key))
                }
            }
        };
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_next_ascending() {
        let a = json!(5);
        let b = json!(2);
        let c = json!(9);
        let heads = vec![Some(&a), Some(&b), None, Some(&c)];
        assert_eq!(select_next(&heads, SortDirection::Asc), Some(1));
        assert_eq!(select_next(&heads, SortDirection::Desc), Some(3));
    }

    #[test]
    fn test_ties_prefer_lowest_range() {
        let a = json!("k");
        let b = json!("k");
        let heads = vec![None, Some(&a), Some(&b)];
        assert_eq!(select_next(&heads, SortDirection::Asc), Some(1));
        assert_eq!(select_next(&heads, SortDirection::Desc), Some(1));
    }

    #[test]
    fn test_all_empty() {
        assert_eq!(select_next(&[None, None], SortDirection::Asc), None);
    }

    #[test]
    fn test_merging_sorted_runs_gives_full_sort() {
        let runs = vec![vec![json!(1), json!(4), json!(7)], vec![json!(2), json!(3)], vec![json!(0), json!(9)]];
        let mut cursors = vec![0usize; runs.len()];
        let mut merged = Vec::new();
        loop {
            let heads: Vec<Option<&Value>> = runs.iter().zip(&cursors).map(|(run, &i)| run.get(i)).collect();
            match select_next(&heads, SortDirection::Asc) {
                Some(index) => {
                    merged.push(runs[index][cursors[index]].clone());
                    cursors[index] += 1;
                }
                None => break,
            }
        }
        assert_eq!(merged, (0..10).filter(|n| ![5, 6, 8].contains(n)).map(|n| json!(n)).collect::<Vec<_>>());
    }

    #[test]
    fn test_guard_rejects_mixed_types() {
        let mut guard = OrderKeyGuard::new();
        guard.check(&json!(1)).unwrap();
        guard.check(&json!(2.5)).unwrap();
        let err = guard.check(&json!("3")).unwrap_err();
        assert!(matches!(err, CosmosError::UnsupportedQuery(_)));
    }

    #[test]
    fn test_guard_rejects_structured_keys() {
        let mut guard = OrderKeyGuard::new();
        assert!(guard.check(&json!([1])).is_err());
        assert!(guard.check(&json!({"a": 1})).is_err());
    }
}
