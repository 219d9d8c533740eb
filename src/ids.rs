//! Ordered identifier collections used throughout the validator.
//!
//! `IdList` is an insertion-ordered, duplicate-free list of identifiers (used
//! for visited sets that must also report the walk order). `IdGraph` is an
//! insertion-ordered set of directed `(from, to)` edges with the relational
//! composition needed by the dependency checkers.

use std::collections::HashSet;

/// An ordered sequence of identifiers with no repeats.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdList {
    ids: Vec<String>,
}

impl IdList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `id` unless it is already present. Returns `true` if it was added.
    pub fn append(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.contains(&id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.iter().any(|x| x == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|x| x == id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }

    /// The identifiers from `start` to the end, in walk order.
    pub fn tail_from(&self, start: usize) -> &[String] {
        &self.ids[start.min(self.ids.len())..]
    }

    pub fn as_slice(&self) -> &[String] {
        &self.ids
    }
}

impl std::fmt::Display for IdList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ids.join(", "))
    }
}

/// A directed multimap of identifiers: each edge appears at most once and
/// edges are kept in insertion order so that reports are deterministic.
#[derive(Debug, Clone, Default)]
pub struct IdGraph {
    edges: Vec<(String, String)>,
    lookup: HashSet<(String, String)>,
}

impl IdGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the edge `from -> to`. Returns `true` if it was not present.
    pub fn insert(&mut self, from: &str, to: &str) -> bool {
        let key = (from.to_string(), to.to_string());
        if !self.lookup.insert(key.clone()) {
            return false;
        }
        self.edges.push(key);
        true
    }

    pub fn contains(&self, from: &str, to: &str) -> bool {
        self.lookup.contains(&(from.to_string(), to.to_string()))
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn edges(&self) -> impl Iterator<Item = (&str, &str)> {
        self.edges.iter().map(|(a, b)| (a.as_str(), b.as_str()))
    }

    /// One pass of relational composition: for every `(x, y)` and `(y, z)`
    /// present at the start of the pass, insert `(x, z)`. Returns the number
    /// of edges added.
    pub fn compose_once(&mut self) -> usize {
        let snapshot = self.edges.clone();
        let mut added = 0;
        for (x, y) in &snapshot {
            for (y2, z) in &snapshot {
                if y == y2 && self.insert(x, z) {
                    added += 1;
                }
            }
        }
        added
    }

    /// Repeats [`IdGraph::compose_once`] until no new edge appears.
    pub fn close_transitively(&mut self) {
        while self.compose_once() > 0 {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_list_rejects_duplicates_and_keeps_order() {
        let mut list = IdList::new();
        assert!(list.append("b"));
        assert!(list.append("a"));
        assert!(!list.append("b"));
        assert_eq!(list.as_slice(), &["b".to_string(), "a".to_string()]);
        assert_eq!(list.position("a"), Some(1));
        assert_eq!(list.tail_from(1), &["a".to_string()]);
    }

    #[test]
    fn test_id_graph_composition_reaches_fixpoint() {
        let mut g = IdGraph::new();
        g.insert("x", "y");
        g.insert("y", "z");
        g.insert("z", "w");
        assert_eq!(g.compose_once(), 2); // x->z, y->w
        g.close_transitively();
        assert!(g.contains("x", "w"));
        assert!(!g.contains("w", "x"));
        let from_x: Vec<&str> = g.edges().filter(|(a, _)| *a == "x").map(|(_, b)| b).collect();
        assert_eq!(from_x, vec!["y", "z", "w"]);
    }

    #[test]
    fn test_id_graph_ignores_repeated_edges() {
        let mut g = IdGraph::new();
        assert!(g.insert("a", "b"));
        assert!(!g.insert("a", "b"));
        assert_eq!(g.len(), 1);
    }
}
