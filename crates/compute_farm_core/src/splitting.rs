use serde::{Deserialize, Serialize};

use crate::contract::ValidationError;
use crate::paths::SplitPath;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SplitAssignment {
    pub path: SplitPath,
    pub start_index: usize,
    pub end_index_exclusive: usize,
}

impl SplitAssignment {
    pub fn len(&self) -> usize {
        self.end_index_exclusive - self.start_index
    }

    pub fn is_empty(&self) -> bool {
        self.start_index == self.end_index_exclusive
    }

    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.start_index..self.end_index_exclusive]
    }
}

pub fn should_split(path: &SplitPath, max_level: usize) -> bool {
    path.depth() < max_level
}

/// Halves `line_count` lines into the two children of `parent`.
///
/// The left child takes `floor(n / 2)` lines and the right child the rest,
/// both in original order.
pub fn compute_split_plan(
    parent: &SplitPath,
    line_count: usize,
) -> Result<[SplitAssignment; 2], ValidationError> {
    let midpoint = line_count / 2;
    let [left_path, right_path] = parent.children();

    let assignments = [
        SplitAssignment {
            path: left_path,
            start_index: 0,
            end_index_exclusive: midpoint,
        },
        SplitAssignment {
            path: right_path,
            start_index: midpoint,
            end_index_exclusive: line_count,
        },
    ];

    validate_assignments(line_count, &assignments)?;
    Ok(assignments)
}

fn validate_assignments(
    line_count: usize,
    assignments: &[SplitAssignment],
) -> Result<(), ValidationError> {
    if assignments.is_empty() {
        return Err(ValidationError::new("No shards to write"));
    }

    if assignments[0].start_index != 0
        || assignments[assignments.len() - 1].end_index_exclusive != line_count
    {
        return Err(ValidationError::new(
            "Split boundaries do not cover the full shard",
        ));
    }

    for idx in 1..assignments.len() {
        if assignments[idx - 1].end_index_exclusive != assignments[idx].start_index {
            return Err(ValidationError::new("Split boundaries overlap or leave gaps"));
        }
    }

    let largest = assignments.iter().map(SplitAssignment::len).max().unwrap_or(0);
    let smallest = assignments.iter().map(SplitAssignment::len).min().unwrap_or(0);
    if largest - smallest > 1 {
        return Err(ValidationError::new("Split halves differ by more than one line"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn odd_line_counts_put_the_extra_line_on_the_right() {
        let plan = compute_split_plan(&SplitPath::root(), 5).expect("plan should pass");

        assert_eq!(plan[0].path.as_str(), "0");
        assert_eq!(plan[0].len(), 2);
        assert_eq!(plan[1].path.as_str(), "1");
        assert_eq!(plan[1].len(), 3);
        assert_eq!(plan[0].end_index_exclusive, plan[1].start_index);
    }

    #[test]
    fn split_plan_is_deterministic_for_identical_input() {
        let parent = SplitPath::parse("10").expect("path should parse");
        let plan_a = compute_split_plan(&parent, 1_001).expect("plan should pass");
        let plan_b = compute_split_plan(&parent, 1_001).expect("plan should pass");

        assert_eq!(plan_a, plan_b);
        assert_eq!(plan_a[0].path.as_str(), "100");
        assert_eq!(plan_a[1].path.as_str(), "101");
    }

    #[test]
    fn tiny_shards_split_into_possibly_empty_halves() {
        let empty = compute_split_plan(&SplitPath::root(), 0).expect("plan should pass");
        assert!(empty[0].is_empty());
        assert!(empty[1].is_empty());

        let single = compute_split_plan(&SplitPath::root(), 1).expect("plan should pass");
        assert!(single[0].is_empty());
        assert_eq!(single[1].len(), 1);
    }

    #[test]
    fn slices_follow_the_plan_in_order() {
        let lines = vec!["a", "b", "c", "d"];
        let plan = compute_split_plan(&SplitPath::root(), lines.len()).expect("plan should pass");
        assert_eq!(plan[0].slice(&lines), &["a", "b"]);
        assert_eq!(plan[1].slice(&lines), &["c", "d"]);
    }

    #[test]
    fn should_split_stops_at_leaf_level() {
        assert!(should_split(&SplitPath::root(), 1));
        assert!(!should_split(&SplitPath::root(), 0));
        let leaf = SplitPath::parse("01").expect("path should parse");
        assert!(!should_split(&leaf, 2));
        assert!(should_split(&leaf, 3));
    }
}
