//! Validated dependency graph over [`Revision`]s.
//!
//! An edge `A → B` means "B depends on A": A must be applied before B.
//! Construction checks, in order, that ids are unique, that every declared
//! dependency resolves and that the relation is acyclic. A graph value that
//! exists is always valid.

use std::collections::btree_set;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::graph::error::{GraphError, GraphResult};
use crate::graph::layers::compute_layers;
use crate::revision::{Revision, RevisionStore};

static NO_EDGES: BTreeSet<String> = BTreeSet::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

/// Directed acyclic graph of revisions keyed by id.
#[derive(Debug, Clone, Default)]
pub struct RevisionGraph {
    nodes: BTreeMap<String, Revision>,
    /// `dependent_id → {dependency_id, ...}`
    upstream: BTreeMap<String, BTreeSet<String>>,
    /// `dependency_id → {dependent_id, ...}`
    downstream: BTreeMap<String, BTreeSet<String>>,
}

impl RevisionGraph {
    /// Build and validate a graph from a revision collection.
    pub fn build<I>(revisions: I) -> GraphResult<Self>
    where
        I: IntoIterator<Item = Revision>,
    {
        let mut nodes = BTreeMap::new();
        for revision in revisions {
            if nodes.contains_key(&revision.id) {
                return Err(GraphError::DuplicateRevisionId { id: revision.id });
            }
            nodes.insert(revision.id.clone(), revision);
        }

        for revision in nodes.values() {
            if let Some(missing) = revision
                .dependencies
                .iter()
                .find(|dep| !nodes.contains_key(dep.as_str()))
            {
                return Err(GraphError::MissingDependency {
                    revision: revision.id.clone(),
                    dependency: missing.clone(),
                });
            }
        }

        let mut upstream: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut downstream: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (id, revision) in &nodes {
            upstream.insert(id.clone(), revision.dependencies.clone());
            downstream.entry(id.clone()).or_default();
            for dep in &revision.dependencies {
                downstream.entry(dep.clone()).or_default().insert(id.clone());
            }
        }

        let graph = Self {
            nodes,
            upstream,
            downstream,
        };
        if let Some(cycle) = graph.find_cycle() {
            return Err(GraphError::CycleDetected { cycle });
        }
        debug!(revisions = graph.len(), "revision graph validated");
        Ok(graph)
    }

    /// Build from a loaded store snapshot.
    pub fn from_store(store: &RevisionStore) -> GraphResult<Self> {
        Self::build(store.revisions().iter().cloned())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&Revision> {
        self.nodes.get(id)
    }

    /// All revisions in ascending id order.
    pub fn revisions(&self) -> impl Iterator<Item = &Revision> {
        self.nodes.values()
    }

    /// Direct dependencies of `id`.
    pub fn dependencies_of(&self, id: &str) -> GraphResult<&BTreeSet<String>> {
        self.upstream
            .get(id)
            .ok_or_else(|| GraphError::RevisionNotFound { id: id.to_string() })
    }

    /// Direct dependents of `id`.
    pub fn dependents_of(&self, id: &str) -> GraphResult<&BTreeSet<String>> {
        self.downstream
            .get(id)
            .ok_or_else(|| GraphError::RevisionNotFound { id: id.to_string() })
    }

    /// Every revision `id` transitively depends on, excluding `id` itself.
    pub fn ancestors_of(&self, id: &str) -> GraphResult<BTreeSet<String>> {
        let mut seen = BTreeSet::new();
        let mut frontier: Vec<&str> = self
            .dependencies_of(id)?
            .iter()
            .map(String::as_str)
            .collect();
        while let Some(next) = frontier.pop() {
            if seen.insert(next.to_string()) {
                frontier.extend(self.edges_up(next).map(String::as_str));
            }
        }
        Ok(seen)
    }

    /// The graph induced by `ids`: those revisions and the edges between them.
    ///
    /// Dependencies outside `ids` are dropped from the copied revisions.
    pub fn subgraph(&self, ids: &BTreeSet<String>) -> GraphResult<Self> {
        let mut revisions = Vec::with_capacity(ids.len());
        for id in ids {
            let revision = self
                .nodes
                .get(id)
                .ok_or_else(|| GraphError::RevisionNotFound { id: id.clone() })?;
            let mut revision = revision.clone();
            revision.dependencies.retain(|dep| ids.contains(dep));
            revisions.push(revision);
        }
        Self::build(revisions)
    }

    /// Dependencies before dependents; layer by layer, ascending id within a
    /// layer.
    pub fn topological_order(&self) -> Vec<String> {
        compute_layers(self)
            .into_iter()
            .flat_map(|layer| layer.revisions)
            .collect()
    }

    pub(crate) fn edges_up(&self, id: &str) -> btree_set::Iter<'_, String> {
        self.upstream.get(id).unwrap_or(&NO_EDGES).iter()
    }

    pub(crate) fn edges_down(&self, id: &str) -> btree_set::Iter<'_, String> {
        self.downstream.get(id).unwrap_or(&NO_EDGES).iter()
    }

    /// Iterative DFS along dependency edges, roots in ascending id order.
    ///
    /// Returns the first cycle found as `[a, b, ..., a]` where each element
    /// depends on the next.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut marks: BTreeMap<&str, Mark> = BTreeMap::new();

        for root in self.nodes.keys() {
            if marks.contains_key(root.as_str()) {
                continue;
            }
            marks.insert(root.as_str(), Mark::Visiting);
            let mut stack: Vec<(&str, btree_set::Iter<'_, String>)> =
                vec![(root.as_str(), self.edges_up(root))];

            loop {
                let Some((node, deps)) = stack.last_mut() else {
                    break;
                };
                let node: &str = *node;
                match deps.next() {
                    Some(dep) => match marks.get(dep.as_str()) {
                        Some(Mark::Visiting) => {
                            let start = stack
                                .iter()
                                .position(|(id, _)| *id == dep.as_str())
                                .unwrap_or(0);
                            let mut cycle: Vec<String> =
                                stack[start..].iter().map(|(id, _)| id.to_string()).collect();
                            cycle.push(dep.clone());
                            return Some(cycle);
                        }
                        Some(Mark::Done) => {}
                        None => {
                            marks.insert(dep.as_str(), Mark::Visiting);
                            stack.push((dep.as_str(), self.edges_up(dep)));
                        }
                    },
                    None => {
                        marks.insert(node, Mark::Done);
                        stack.pop();
                    }
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(id: &str, deps: &[&str]) -> Revision {
        Revision::new(id, deps.iter().copied(), format!("-- {id}"))
    }

    fn diamond() -> RevisionGraph {
        RevisionGraph::build(vec![
            rev("d", &["b", "c"]),
            rev("a", &[]),
            rev("c", &["a"]),
            rev("b", &["a"]),
        ])
        .unwrap()
    }

    #[test]
    fn test_build_exposes_both_edge_directions() {
        let graph = diamond();
        assert_eq!(graph.len(), 4);
        let deps: Vec<&str> = graph
            .dependencies_of("d")
            .unwrap()
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(deps, vec!["b", "c"]);
        let dependents: Vec<&str> =
            graph.dependents_of("a").unwrap().iter().map(String::as_str).collect();
        assert_eq!(dependents, vec!["b", "c"]);
        assert!(graph.dependents_of("d").unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = RevisionGraph::build(vec![rev("a", &[]), rev("a", &[])]).unwrap_err();
        assert_eq!(err, GraphError::DuplicateRevisionId { id: "a".into() });
    }

    #[test]
    fn test_missing_dependency_rejected() {
        let err = RevisionGraph::build(vec![rev("a", &[]), rev("b", &["ghost"])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::MissingDependency {
                revision: "b".into(),
                dependency: "ghost".into()
            }
        );
    }

    #[test]
    fn test_two_node_cycle_reported_as_path() {
        let err = RevisionGraph::build(vec![rev("a", &["b"]), rev("b", &["a"])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::CycleDetected {
                cycle: vec!["a".into(), "b".into(), "a".into()]
            }
        );
    }

    #[test]
    fn test_self_dependency_is_one_node_cycle() {
        let err = RevisionGraph::build(vec![rev("a", &["a"])]).unwrap_err();
        assert_eq!(
            err,
            GraphError::CycleDetected {
                cycle: vec!["a".into(), "a".into()]
            }
        );
    }

    #[test]
    fn test_cycle_below_acyclic_prefix_excludes_prefix() {
        // root -> x -> y -> x
        let err = RevisionGraph::build(vec![
            rev("root", &["x"]),
            rev("x", &["y"]),
            rev("y", &["x"]),
        ])
        .unwrap_err();
        assert_eq!(
            err,
            GraphError::CycleDetected {
                cycle: vec!["x".into(), "y".into(), "x".into()]
            }
        );
    }

    #[test]
    fn test_ancestors_and_subgraph() {
        let graph = diamond();
        let ancestors = graph.ancestors_of("d").unwrap();
        assert_eq!(
            ancestors.into_iter().collect::<Vec<_>>(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(graph.ancestors_of("a").unwrap().is_empty());

        let ids: BTreeSet<String> = ["b", "d"].iter().map(|s| s.to_string()).collect();
        let sub = graph.subgraph(&ids).unwrap();
        assert_eq!(sub.len(), 2);
        assert!(sub.dependencies_of("b").unwrap().is_empty());
        assert!(sub.dependencies_of("d").unwrap().contains("b"));
        assert!(!sub.dependencies_of("d").unwrap().contains("c"));
    }

    #[test]
    fn test_unknown_revision_queries_fail() {
        let graph = diamond();
        assert!(matches!(
            graph.dependencies_of("zzz"),
            Err(GraphError::RevisionNotFound { .. })
        ));
        assert!(graph.ancestors_of("zzz").is_err());
    }

    #[test]
    fn test_topological_order_is_layered() {
        assert_eq!(diamond().topological_order(), vec!["a", "b", "c", "d"]);
    }
}
