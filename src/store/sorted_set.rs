//! Sorted set: member -> score mapping, ordered by (score, member)
//!
//! Ordering is materialized at query time by sorting the member table;
//! ties on score break lexicographically on the member bytes.

use bytes::Bytes;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Members with a floating-point score each.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SortedSet {
    members: HashMap<Bytes, f64>,
}

impl SortedSet {
    /// Create an empty sorted set
    pub fn new() -> Self {
        SortedSet {
            members: HashMap::new(),
        }
    }

    /// Insert or update a member. Returns true if the member was new.
    pub fn insert(&mut self, member: Bytes, score: f64) -> bool {
        self.members.insert(member, score).is_none()
    }

    /// Remove a member. Returns true if it existed.
    pub fn remove(&mut self, member: &Bytes) -> bool {
        self.members.remove(member).is_some()
    }

    /// Score of a member, if present.
    pub fn score(&self, member: &Bytes) -> Option<f64> {
        self.members.get(member).copied()
    }

    /// Add `delta` to a member's score (0.0 if absent). Returns the new score.
    pub fn increment(&mut self, member: Bytes, delta: f64) -> f64 {
        let score = self.members.entry(member).or_insert(0.0);
        *score += delta;
        *score
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True if there are no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Members with min_score <= score <= max_score.
    pub fn count_in_range(&self, min_score: f64, max_score: f64) -> usize {
        self.members
            .values()
            .filter(|s| **s >= min_score && **s <= max_score)
            .count()
    }

    /// All (member, score) pairs ordered by (score, member) ascending.
    pub fn sorted(&self) -> Vec<(Bytes, f64)> {
        let mut pairs: Vec<(Bytes, f64)> = self
            .members
            .iter()
            .map(|(m, s)| (m.clone(), *s))
            .collect();
        pairs.sort_by(|a, b| compare_entries(a, b));
        pairs
    }

    /// Slice of the ascending ordering with Redis-style inclusive
    /// negative-capable indexes.
    pub fn range(&self, start: i64, stop: i64) -> Vec<(Bytes, f64)> {
        slice_inclusive(self.sorted(), start, stop)
    }

    /// Slice of the descending ordering.
    pub fn rev_range(&self, start: i64, stop: i64) -> Vec<(Bytes, f64)> {
        let mut pairs = self.sorted();
        pairs.reverse();
        slice_inclusive(pairs, start, stop)
    }

    /// Position of a member in the ascending ordering.
    pub fn rank(&self, member: &Bytes) -> Option<usize> {
        if !self.members.contains_key(member) {
            return None;
        }
        self.sorted().iter().position(|(m, _)| m == member)
    }

    /// Position of a member in the descending ordering.
    pub fn rev_rank(&self, member: &Bytes) -> Option<usize> {
        self.rank(member).map(|r| self.members.len() - 1 - r)
    }

    /// Iterate over (member, score) pairs in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &f64)> {
        self.members.iter()
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        let items: usize = self
            .members
            .keys()
            .map(|m| m.len() + std::mem::size_of::<f64>())
            .sum();
        items + std::mem::size_of::<HashMap<Bytes, f64>>()
    }
}

fn compare_entries(a: &(Bytes, f64), b: &(Bytes, f64)) -> Ordering {
    a.1.partial_cmp(&b.1)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.0.cmp(&b.0))
}

/// Inclusive [start, stop] slicing with negative indexes counted from
/// the end, matching list range semantics.
fn slice_inclusive(pairs: Vec<(Bytes, f64)>, start: i64, stop: i64) -> Vec<(Bytes, f64)> {
    let len = pairs.len() as i64;
    let mut start = if start < 0 { len + start } else { start };
    let mut stop = if stop < 0 { len + stop } else { stop };
    if start < 0 {
        start = 0;
    }
    if stop >= len {
        stop = len - 1;
    }
    if start > stop || len == 0 {
        return Vec::new();
    }
    pairs[start as usize..=stop as usize].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SortedSet {
        let mut z = SortedSet::new();
        z.insert(Bytes::from("b"), 2.0);
        z.insert(Bytes::from("a"), 1.0);
        z.insert(Bytes::from("c"), 2.0);
        z
    }

    #[test]
    fn test_ordering_with_tie_break() {
        let z = sample();
        let ordered: Vec<Bytes> = z.sorted().into_iter().map(|(m, _)| m).collect();
        // "b" and "c" share score 2.0: lexicographic tie-break
        assert_eq!(
            ordered,
            vec![Bytes::from("a"), Bytes::from("b"), Bytes::from("c")]
        );
    }

    #[test]
    fn test_insert_update() {
        let mut z = sample();
        assert!(!z.insert(Bytes::from("a"), 9.0));
        assert_eq!(z.score(&Bytes::from("a")), Some(9.0));
        assert_eq!(z.len(), 3);
    }

    #[test]
    fn test_range_negative_indexes() {
        let z = sample();
        let all = z.range(0, -1);
        assert_eq!(all.len(), 3);

        let tail = z.range(-2, -1);
        assert_eq!(tail[0].0, Bytes::from("b"));
        assert_eq!(tail[1].0, Bytes::from("c"));

        assert!(z.range(2, 1).is_empty());
    }

    #[test]
    fn test_rev_range() {
        let z = sample();
        let top = z.rev_range(0, 0);
        assert_eq!(top[0].0, Bytes::from("c"));
    }

    #[test]
    fn test_rank() {
        let z = sample();
        assert_eq!(z.rank(&Bytes::from("a")), Some(0));
        assert_eq!(z.rank(&Bytes::from("c")), Some(2));
        assert_eq!(z.rev_rank(&Bytes::from("c")), Some(0));
        assert_eq!(z.rank(&Bytes::from("missing")), None);
    }

    #[test]
    fn test_count_and_increment() {
        let mut z = sample();
        assert_eq!(z.count_in_range(2.0, 2.0), 2);
        assert_eq!(z.increment(Bytes::from("a"), 0.5), 1.5);
        assert_eq!(z.increment(Bytes::from("new"), 3.0), 3.0);
    }
}
