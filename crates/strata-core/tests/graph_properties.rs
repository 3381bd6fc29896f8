//! Property tests for graph validation and layering.

use std::collections::BTreeMap;

use proptest::prelude::*;
use strata_core::graph::{compute_layers, layer_index, GraphError, RevisionGraph};
use strata_core::revision::Revision;

fn id(i: usize) -> String {
    format!("r{i:02}")
}

/// Random DAG: node `j` may depend on any `i < j`.
fn dag_strategy() -> impl Strategy<Value = Vec<Revision>> {
    (1usize..16)
        .prop_flat_map(|n| (Just(n), prop::collection::vec(any::<bool>(), n * n)))
        .prop_map(|(n, edges)| {
            (0..n)
                .map(|j| {
                    let deps: Vec<String> = (0..j).filter(|&i| edges[i * n + j]).map(id).collect();
                    Revision::new(id(j), deps, format!("-- {j}"))
                })
                .collect()
        })
}

proptest! {
    #[test]
    fn layers_are_deterministic(mut revisions in dag_strategy()) {
        let first = compute_layers(&RevisionGraph::build(revisions.clone()).unwrap());
        revisions.reverse();
        let second = compute_layers(&RevisionGraph::build(revisions).unwrap());
        prop_assert_eq!(first, second);
    }

    #[test]
    fn dependencies_sit_in_earlier_layers(revisions in dag_strategy()) {
        let graph = RevisionGraph::build(revisions).unwrap();
        let layers = compute_layers(&graph);
        let index = layer_index(&layers);
        prop_assert_eq!(index.len(), graph.len());

        for layer in &layers {
            let mut sorted = layer.revisions.clone();
            sorted.sort();
            prop_assert_eq!(&sorted, &layer.revisions);
            for rev in &layer.revisions {
                let deps = graph.dependencies_of(rev).unwrap();
                if layer.index == 0 {
                    prop_assert!(deps.is_empty());
                } else {
                    prop_assert!(!deps.is_empty());
                }
                for dep in deps {
                    prop_assert!(index[dep.as_str()] < layer.index);
                }
            }
        }
    }

    #[test]
    fn topological_order_respects_edges(revisions in dag_strategy()) {
        let graph = RevisionGraph::build(revisions).unwrap();
        let order = graph.topological_order();
        let position: BTreeMap<&str, usize> =
            order.iter().enumerate().map(|(i, id)| (id.as_str(), i)).collect();
        for rev in graph.revisions() {
            for dep in &rev.dependencies {
                prop_assert!(position[dep.as_str()] < position[rev.id.as_str()]);
            }
        }
    }

    #[test]
    fn cycles_are_detected_with_a_valid_path(
        mut revisions in dag_strategy(),
        ring in 1usize..6,
    ) {
        // Close a ring of extra nodes c0 -> c1 -> ... -> c0, hung below r00.
        let ring_ids: Vec<String> = (0..ring).map(|k| format!("c{k}")).collect();
        for k in 0..ring {
            let next = ring_ids[(k + 1) % ring].clone();
            revisions.push(Revision::new(ring_ids[k].clone(), [next, id(0)], "-- ring"));
        }
        let declared: BTreeMap<String, Vec<String>> = revisions
            .iter()
            .map(|r| (r.id.clone(), r.dependencies.iter().cloned().collect()))
            .collect();

        match RevisionGraph::build(revisions) {
            Err(GraphError::CycleDetected { cycle }) => {
                prop_assert!(cycle.len() >= 2);
                prop_assert_eq!(cycle.first(), cycle.last());
                for pair in cycle.windows(2) {
                    prop_assert!(declared[&pair[0]].contains(&pair[1]));
                }
            }
            other => prop_assert!(false, "expected a cycle, got {:?}", other.map(|g| g.len())),
        }
    }
}
