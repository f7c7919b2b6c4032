//! Line ordering shared by the build and merge tasks.
//!
//! Lines compare byte-wise after lower-casing, and equal keys keep their
//! input order, so sorting is stable and idempotent.

use std::cmp::Ordering;

pub fn compare_lines(left: &str, right: &str) -> Ordering {
    // Code point order over chars matches byte order over their UTF-8 encoding.
    left.chars()
        .flat_map(char::to_lowercase)
        .cmp(right.chars().flat_map(char::to_lowercase))
}

pub fn sort_lines(lines: &mut [String]) {
    lines.sort_by(|left, right| compare_lines(left, right));
}

pub fn is_sorted(lines: &[String]) -> bool {
    lines
        .windows(2)
        .all(|pair| compare_lines(&pair[0], &pair[1]) != Ordering::Greater)
}

/// Merges two sorted runs. On equal keys the left run wins.
pub fn merge_sorted(left: Vec<String>, right: Vec<String>) -> Vec<String> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => compare_lines(l, r) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        merged.extend(next);
    }

    merged
}
