//! Dependency generations ("layers") of a validated [`RevisionGraph`].
//!
//! Generational Kahn: layer 0 holds the revisions with no dependencies and
//! each following layer holds the revisions whose dependencies all sit in
//! strictly earlier layers. Members of a layer are in ascending id order.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::graph::dag::RevisionGraph;
use crate::graph::error::GraphResult;

/// One dependency generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub index: usize,
    pub revisions: Vec<String>,
}

impl Layer {
    pub fn contains(&self, id: &str) -> bool {
        self.revisions.iter().any(|r| r == id)
    }

    pub fn len(&self) -> usize {
        self.revisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.revisions.is_empty()
    }
}

/// Partition the graph into layers.
pub fn compute_layers(graph: &RevisionGraph) -> Vec<Layer> {
    let mut remaining: BTreeMap<&str, usize> = graph
        .revisions()
        .map(|r| (r.id.as_str(), r.dependencies.len()))
        .collect();

    let mut current: Vec<&str> = remaining
        .iter()
        .filter(|(_, &deg)| deg == 0)
        .map(|(&id, _)| id)
        .collect();

    let mut layers = Vec::new();
    while !current.is_empty() {
        let mut next: BTreeSet<&str> = BTreeSet::new();
        for id in &current {
            for dependent in graph.edges_down(id) {
                if let Some(deg) = remaining.get_mut(dependent.as_str()) {
                    *deg -= 1;
                    if *deg == 0 {
                        next.insert(dependent.as_str());
                    }
                }
            }
        }
        layers.push(Layer {
            index: layers.len(),
            revisions: current.iter().map(|id| id.to_string()).collect(),
        });
        current = next.into_iter().collect();
    }
    layers
}

/// Layers of `id` and everything it transitively depends on.
///
/// `id` is always alone in the last layer.
pub fn revision_layers(graph: &RevisionGraph, id: &str) -> GraphResult<Vec<Layer>> {
    let mut closure = graph.ancestors_of(id)?;
    closure.insert(id.to_string());
    let sub = graph.subgraph(&closure)?;
    Ok(compute_layers(&sub))
}

/// Index of the layer holding each revision.
pub fn layer_index(layers: &[Layer]) -> BTreeMap<&str, usize> {
    layers
        .iter()
        .flat_map(|layer| layer.revisions.iter().map(move |id| (id.as_str(), layer.index)))
        .collect()
}
