//! Everything one apply run works on, passed explicitly.

use strata_state::MigrationTarget;

use crate::graph::{compute_layers, Layer, RevisionGraph};

/// Validated graph, its layer order and the target, borrowed for one run.
///
/// Layers are always computed from `graph`. The target handle is released
/// when the context is dropped, whichever way the run ends.
pub struct RunContext<'r> {
    pub(crate) graph: &'r RevisionGraph,
    pub(crate) layers: Vec<Layer>,
    pub(crate) target: &'r mut dyn MigrationTarget,
}

impl<'r> RunContext<'r> {
    pub fn new(graph: &'r RevisionGraph, target: &'r mut dyn MigrationTarget) -> Self {
        Self {
            layers: compute_layers(graph),
            graph,
            target,
        }
    }

    pub fn graph(&self) -> &RevisionGraph {
        self.graph
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// `(layer index, revision id)` in visit order.
    pub fn visit_order(&self) -> Vec<(usize, String)> {
        self.layers
            .iter()
            .flat_map(|layer| layer.revisions.iter().map(move |id| (layer.index, id.clone())))
            .collect()
    }
}
