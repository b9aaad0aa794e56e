use std::collections::{HashMap, HashSet, VecDeque};

use tracing::warn;

use super::error::GraphError;
use super::node::CommitRecord;

/// Which way a reachability walk follows the edges.
#[derive(Debug, Clone, Copy)]
enum Direction {
    Down,
    Up,
}

/// Directed acyclic graph over node ids, representing commit ancestry.
///
/// Nodes keep their insertion order and successor lists are
/// insertion-ordered and deduplicated, so every traversal is
/// deterministic. Predecessors are always derived, never stored.
///
/// Mutations validate before committing: an edge that would introduce a
/// cycle is tried on a copy first and rejected without touching the
/// real graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphStore {
    /// Node ids in insertion order
    order: Vec<String>,
    /// Successor ids per node, insertion-ordered and unique
    succs: HashMap<String, Vec<String>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from ordered commit records: one node per record,
    /// then a parent -> child edge for every parent id. Parents missing
    /// from the record set (shallow or limited walks) are skipped.
    pub fn build(records: &[CommitRecord]) -> Result<Self, GraphError> {
        let mut store = Self::new();
        for record in records {
            store.add_node_if_absent(&record.id);
        }
        for record in records {
            for parent in &record.parents {
                if !store.contains(parent) {
                    warn!(commit = %record.id, %parent, "skipping edge to unknown parent");
                    continue;
                }
                store.add_edge(parent, &record.id)?;
            }
        }
        Ok(store)
    }

    /// Rebuild from an id -> successors listing. Nodes are created
    /// first so edge order in the listing does not matter.
    pub fn from_adjacency(entries: &[(&str, Vec<&str>)]) -> Result<Self, GraphError> {
        let mut store = Self::new();
        for (id, _) in entries {
            store.add_node(id)?;
        }
        for (from, succs) in entries {
            for to in succs {
                store.add_edge(from, to)?;
            }
        }
        Ok(store)
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.succs.contains_key(id)
    }

    /// Node ids in insertion order
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Add a node, or fail if the id is already present.
    pub fn add_node(&mut self, id: &str) -> Result<(), GraphError> {
        if self.contains(id) {
            return Err(GraphError::DuplicateNode(id.to_string()));
        }
        self.order.push(id.to_string());
        self.succs.insert(id.to_string(), Vec::new());
        Ok(())
    }

    /// Idempotent variant of `add_node`.
    pub fn add_node_if_absent(&mut self, id: &str) {
        if !self.contains(id) {
            self.order.push(id.to_string());
            self.succs.insert(id.to_string(), Vec::new());
        }
    }

    /// Remove a node and strip it from every other node's successors.
    pub fn remove_node(&mut self, id: &str) -> Result<(), GraphError> {
        if self.succs.remove(id).is_none() {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        self.order.retain(|n| n != id);
        for succ in self.succs.values_mut() {
            succ.retain(|n| n != id);
        }
        Ok(())
    }

    /// Idempotent variant of `remove_node`.
    pub fn remove_node_if_present(&mut self, id: &str) {
        let _ = self.remove_node(id);
    }

    /// Add an edge after validating acyclicity on a copy of the graph.
    /// The real graph is only touched once the trial sort succeeds, so
    /// a rejected insertion leaves it byte-for-byte unchanged. Inserting
    /// an edge that already exists is a no-op.
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        if !self.contains(from) {
            return Err(GraphError::NodeNotFound(from.to_string()));
        }
        if !self.contains(to) {
            return Err(GraphError::NodeNotFound(to.to_string()));
        }
        if self.has_edge(from, to) {
            return Ok(());
        }

        let mut trial = self.clone();
        if let Some(succ) = trial.succs.get_mut(from) {
            succ.push(to.to_string());
        }
        if trial.topological_sort().is_err() {
            return Err(GraphError::CreatesCycle {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        if let Some(succ) = self.succs.get_mut(from) {
            succ.push(to.to_string());
        }
        Ok(())
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.succs
            .get(from)
            .map_or(false, |succ| succ.iter().any(|n| n == to))
    }

    /// Remove an edge, or fail if it does not exist.
    pub fn remove_edge(&mut self, from: &str, to: &str) -> Result<(), GraphError> {
        let missing = || GraphError::EdgeNotFound {
            from: from.to_string(),
            to: to.to_string(),
        };
        let succ = self.succs.get_mut(from).ok_or_else(missing)?;
        let idx = succ.iter().position(|n| n == to).ok_or_else(missing)?;
        succ.remove(idx);
        Ok(())
    }

    /// Move the adjacency entry to a new id and rewrite every other
    /// node's reference to the old id. The node keeps its insertion
    /// position.
    pub fn rename_node(&mut self, old: &str, new: &str) -> Result<(), GraphError> {
        if !self.contains(old) {
            return Err(GraphError::NodeNotFound(old.to_string()));
        }
        if self.contains(new) {
            return Err(GraphError::DuplicateNode(new.to_string()));
        }

        let succ = self.succs.remove(old).unwrap_or_default();
        self.succs.insert(new.to_string(), succ);
        if let Some(slot) = self.order.iter_mut().find(|n| n.as_str() == old) {
            *slot = new.to_string();
        }
        for succ in self.succs.values_mut() {
            for slot in succ.iter_mut() {
                if slot.as_str() == old {
                    *slot = new.to_string();
                }
            }
        }
        Ok(())
    }

    /// Kahn's algorithm. The ready queue is seeded in node insertion
    /// order and drained FIFO, so ties among simultaneously-ready nodes
    /// resolve to insertion order and the result is deterministic.
    pub fn topological_sort(&self) -> Result<Vec<String>, GraphError> {
        let mut in_degree: HashMap<&str, usize> =
            self.order.iter().map(|n| (n.as_str(), 0)).collect();
        for succ in self.succs.values() {
            for to in succ {
                if let Some(d) = in_degree.get_mut(to.as_str()) {
                    *d += 1;
                }
            }
        }

        let mut ready: VecDeque<&str> = self
            .order
            .iter()
            .map(String::as_str)
            .filter(|n| in_degree[n] == 0)
            .collect();

        let mut result = Vec::with_capacity(self.order.len());
        while let Some(id) = ready.pop_front() {
            result.push(id.to_string());
            if let Some(succ) = self.succs.get(id) {
                for to in succ {
                    if let Some(d) = in_degree.get_mut(to.as_str()) {
                        *d -= 1;
                        if *d == 0 {
                            ready.push_back(to.as_str());
                        }
                    }
                }
            }
        }

        if result.len() == self.order.len() {
            Ok(result)
        } else {
            Err(GraphError::NotAcyclic)
        }
    }

    /// True iff at least one root exists and a full topological order
    /// can be produced.
    pub fn validate(&self) -> bool {
        self.check().is_ok()
    }

    /// Structural check behind `validate`, with the failing condition.
    pub fn check(&self) -> Result<(), GraphError> {
        if self.roots().is_empty() {
            return Err(GraphError::NoRoot);
        }
        self.topological_sort()?;
        Ok(())
    }

    /// Nodes with no predecessors, in insertion order.
    pub fn roots(&self) -> Vec<String> {
        let with_preds: HashSet<&str> = self
            .succs
            .values()
            .flatten()
            .map(String::as_str)
            .collect();
        self.order
            .iter()
            .filter(|n| !with_preds.contains(n.as_str()))
            .cloned()
            .collect()
    }

    /// Nodes with no successors, in insertion order.
    pub fn leaves(&self) -> Vec<String> {
        self.order
            .iter()
            .filter(|n| self.succs.get(n.as_str()).map_or(false, Vec::is_empty))
            .cloned()
            .collect()
    }

    /// Direct successors of a node.
    pub fn downstream(&self, id: &str) -> Result<Vec<String>, GraphError> {
        self.succs
            .get(id)
            .cloned()
            .ok_or_else(|| GraphError::NodeNotFound(id.to_string()))
    }

    /// Direct predecessors of a node, derived from the adjacency.
    pub fn upstream(&self, id: &str) -> Result<Vec<String>, GraphError> {
        if !self.contains(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        Ok(self
            .order
            .iter()
            .filter(|n| self.has_edge(n.as_str(), id))
            .cloned()
            .collect())
    }

    /// All nodes directly connected to this one (upstream ∪ downstream).
    pub fn direct_nodes(&self, id: &str) -> Result<Vec<String>, GraphError> {
        let mut nodes = self.upstream(id)?;
        for n in self.downstream(id)? {
            if !nodes.contains(&n) {
                nodes.push(n);
            }
        }
        Ok(nodes)
    }

    /// All nodes reachable through successor edges, ordered by a full
    /// topological sort of the graph. The start node is not included.
    pub fn descendants(&self, id: &str) -> Result<Vec<String>, GraphError> {
        let reachable = self.reach(id, Direction::Down)?;
        Ok(self
            .topological_sort()?
            .into_iter()
            .filter(|n| reachable.contains(n.as_str()))
            .collect())
    }

    /// All nodes that can reach this one through successor edges,
    /// ordered the same way as `descendants`.
    pub fn ancestors(&self, id: &str) -> Result<Vec<String>, GraphError> {
        let reachable = self.reach(id, Direction::Up)?;
        Ok(self
            .topological_sort()?
            .into_iter()
            .filter(|n| reachable.contains(n.as_str()))
            .collect())
    }

    /// Number of edges on the directed path between an ancestor and its
    /// descendant. `Some(0)` when `a == b`; `None` when neither node is
    /// an ancestor of the other, so "no relation" is never mistaken for
    /// distance zero.
    pub fn distance(&self, a: &str, b: &str) -> Result<Option<usize>, GraphError> {
        if !self.contains(a) {
            return Err(GraphError::NodeNotFound(a.to_string()));
        }
        if !self.contains(b) {
            return Err(GraphError::NodeNotFound(b.to_string()));
        }
        if a == b {
            return Ok(Some(0));
        }

        if self.reach(a, Direction::Down)?.contains(b) {
            return Ok(Some(self.path_len(a, b)?));
        }
        if self.reach(b, Direction::Down)?.contains(a) {
            return Ok(Some(self.path_len(b, a)?));
        }
        Ok(None)
    }

    /// Every edge as a (from, to) pair, in insertion order of both ends.
    pub fn all_edges(&self) -> Vec<(String, String)> {
        let mut edges = Vec::new();
        for from in &self.order {
            if let Some(succ) = self.succs.get(from.as_str()) {
                for to in succ {
                    edges.push((from.clone(), to.clone()));
                }
            }
        }
        edges
    }

    pub fn edge_count(&self) -> usize {
        self.succs.values().map(Vec::len).sum()
    }

    /// BFS over successor or predecessor edges. The start node itself
    /// is only part of the result if a cycle leads back to it, which
    /// the acyclicity invariant rules out.
    fn reach(&self, id: &str, direction: Direction) -> Result<HashSet<String>, GraphError> {
        if !self.contains(id) {
            return Err(GraphError::NodeNotFound(id.to_string()));
        }
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(id.to_string());
        while let Some(curr) = queue.pop_front() {
            let next = match direction {
                Direction::Down => self.downstream(&curr)?,
                Direction::Up => self.upstream(&curr)?,
            };
            for n in next {
                if seen.insert(n.clone()) {
                    queue.push_back(n);
                }
            }
        }
        Ok(seen)
    }

    // Greedy walk from an ancestor toward its descendant, following the
    // first successor (insertion order) whose subtree contains the
    // target. The caller guarantees reachability.
    fn path_len(&self, from: &str, to: &str) -> Result<usize, GraphError> {
        let mut steps = 0;
        let mut curr = from.to_string();
        while curr != to {
            let next = self.downstream(&curr)?.into_iter().find(|n| {
                n == to
                    || self
                        .reach(n, Direction::Down)
                        .map_or(false, |r| r.contains(to))
            });
            match next {
                Some(n) => {
                    curr = n;
                    steps += 1;
                }
                None => return Err(GraphError::NodeNotFound(to.to_string())),
            }
        }
        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // a(root) -> b, a -> d, b -> c, c -> e
    fn sample_store() -> GraphStore {
        GraphStore::from_adjacency(&[
            ("a", vec!["b", "d"]),
            ("b", vec!["c"]),
            ("c", vec!["e"]),
            ("d", vec![]),
            ("e", vec![]),
        ])
        .unwrap()
    }

    #[test]
    fn add_duplicate_node_fails_and_keeps_original() {
        let mut store = GraphStore::new();
        store.add_node("a").unwrap();
        let err = store.add_node("a").unwrap_err();
        assert_eq!(err, GraphError::DuplicateNode("a".to_string()));
        assert_eq!(store.node_count(), 1);
        assert!(store.contains("a"));
    }

    #[test]
    fn add_edge_missing_endpoint_fails() {
        let mut store = GraphStore::new();
        store.add_node("a").unwrap();
        assert_eq!(
            store.add_edge("a", "b").unwrap_err(),
            GraphError::NodeNotFound("b".to_string())
        );
        assert_eq!(
            store.add_edge("x", "a").unwrap_err(),
            GraphError::NodeNotFound("x".to_string())
        );
    }

    #[test]
    fn cycle_rejected_and_graph_unchanged() {
        let mut store = GraphStore::from_adjacency(&[
            ("a", vec!["b"]),
            ("b", vec!["c"]),
            ("c", vec![]),
        ])
        .unwrap();
        let before = store.clone();
        let err = store.add_edge("c", "a").unwrap_err();
        assert_eq!(
            err,
            GraphError::CreatesCycle {
                from: "c".to_string(),
                to: "a".to_string()
            }
        );
        assert_eq!(store, before);
        assert!(store.validate());
    }

    #[test]
    fn self_edge_rejected() {
        let mut store = GraphStore::new();
        store.add_node("a").unwrap();
        assert!(matches!(
            store.add_edge("a", "a"),
            Err(GraphError::CreatesCycle { .. })
        ));
    }

    #[test]
    fn duplicate_edge_is_noop() {
        let mut store = sample_store();
        store.add_edge("a", "b").unwrap();
        assert_eq!(store.edge_count(), 4);
    }

    #[test]
    fn remove_node_cascades_edges() {
        let mut store = sample_store();
        store.remove_node("c").unwrap();
        assert!(!store.contains("c"));
        for id in ["a", "b", "d", "e"] {
            assert!(!store.downstream(id).unwrap().iter().any(|n| n == "c"));
        }
        assert_eq!(
            store.remove_node("c").unwrap_err(),
            GraphError::NodeNotFound("c".to_string())
        );
    }

    #[test]
    fn remove_edge_point_operation() {
        let mut store = sample_store();
        store.remove_edge("a", "d").unwrap();
        assert!(!store.has_edge("a", "d"));
        assert!(store.contains("d"));
        assert!(matches!(
            store.remove_edge("a", "d"),
            Err(GraphError::EdgeNotFound { .. })
        ));
    }

    #[test]
    fn rename_rewrites_all_references() {
        let mut store = sample_store();
        store.rename_node("b", "b2").unwrap();
        assert!(!store.contains("b"));
        assert!(store.has_edge("a", "b2"));
        assert!(store.has_edge("b2", "c"));
        // insertion position preserved
        let ids: Vec<&str> = store.node_ids().collect();
        assert_eq!(ids, vec!["a", "b2", "c", "d", "e"]);
    }

    #[test]
    fn rename_to_existing_id_fails() {
        let mut store = sample_store();
        assert_eq!(
            store.rename_node("b", "c").unwrap_err(),
            GraphError::DuplicateNode("c".to_string())
        );
    }

    #[test]
    fn topological_sort_orders_every_edge() {
        let store = sample_store();
        let sorted = store.topological_sort().unwrap();
        assert_eq!(sorted.len(), store.node_count());
        for (from, to) in store.all_edges() {
            let from_idx = sorted.iter().position(|n| *n == from).unwrap();
            let to_idx = sorted.iter().position(|n| *n == to).unwrap();
            assert!(from_idx < to_idx, "{from} must sort before {to}");
        }
    }

    #[test]
    fn topological_sort_tie_break_is_insertion_order() {
        let store = GraphStore::from_adjacency(&[
            ("r", vec!["x", "y", "z"]),
            ("x", vec![]),
            ("y", vec![]),
            ("z", vec![]),
        ])
        .unwrap();
        assert_eq!(store.topological_sort().unwrap(), vec!["r", "x", "y", "z"]);
    }

    #[test]
    fn validate_requires_a_root() {
        let store = GraphStore::new();
        assert!(!store.validate());
        assert_eq!(store.check().unwrap_err(), GraphError::NoRoot);

        let store = sample_store();
        assert!(store.validate());
    }

    #[test]
    fn descendants_and_ancestors_in_topological_order() {
        let store = sample_store();
        assert_eq!(store.descendants("a").unwrap(), vec!["b", "d", "c", "e"]);
        assert_eq!(store.descendants("b").unwrap(), vec!["c", "e"]);
        assert_eq!(store.ancestors("e").unwrap(), vec!["a", "b", "c"]);
        // start node never appears in its own result
        assert!(!store.descendants("a").unwrap().contains(&"a".to_string()));
        assert!(!store.ancestors("e").unwrap().contains(&"e".to_string()));
    }

    #[test]
    fn distance_counts_edges_on_the_path() {
        let store = sample_store();
        assert_eq!(store.distance("b", "e").unwrap(), Some(2));
        assert_eq!(store.distance("e", "b").unwrap(), Some(2));
        assert_eq!(store.distance("a", "e").unwrap(), Some(3));
        assert_eq!(store.distance("b", "b").unwrap(), Some(0));
        // siblings are unrelated, not distance zero
        assert_eq!(store.distance("b", "d").unwrap(), None);
        assert!(matches!(
            store.distance("b", "zzz"),
            Err(GraphError::NodeNotFound(_))
        ));
    }

    #[test]
    fn edge_listing_and_direct_neighbors() {
        let store = sample_store();
        let edges: HashSet<(String, String)> = store.all_edges().into_iter().collect();
        let expected: HashSet<(String, String)> = [
            ("a", "b"),
            ("a", "d"),
            ("b", "c"),
            ("c", "e"),
        ]
        .into_iter()
        .map(|(f, t)| (f.to_string(), t.to_string()))
        .collect();
        assert_eq!(edges, expected);

        let direct = store.direct_nodes("b").unwrap();
        assert_eq!(direct, vec!["a", "c"]);
    }

    #[test]
    fn leaves_and_roots() {
        let store = sample_store();
        assert_eq!(store.roots(), vec!["a"]);
        assert_eq!(store.leaves(), vec!["d", "e"]);
    }

    #[test]
    fn build_from_records_wires_parent_edges() {
        use chrono::Utc;

        let records = vec![
            CommitRecord::new("r1".into(), vec![], Utc::now(), "a".into(), "root".into()),
            CommitRecord::new(
                "c1".into(),
                vec!["r1".into()],
                Utc::now(),
                "a".into(),
                "child".into(),
            ),
            CommitRecord::new(
                "c2".into(),
                vec!["r1".into(), "missing".into()],
                Utc::now(),
                "a".into(),
                "shallow parent".into(),
            ),
        ];
        let store = GraphStore::build(&records).unwrap();
        assert_eq!(store.node_count(), 3);
        assert!(store.has_edge("r1", "c1"));
        assert!(store.has_edge("r1", "c2"));
        // the unknown parent is skipped, not materialized
        assert!(!store.contains("missing"));
        assert_eq!(store.edge_count(), 2);
    }
}
