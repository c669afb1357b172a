//! Bounded breadth-first traversal over hyperedges.
//!
//! Finds chains of hyperedges connecting a start concept to a goal concept.
//! Two hyperedges are adjacent when they share at least `intersection_size`
//! concepts; raising that threshold demands a stronger shared context before
//! two relations are considered linked.
//!
//! The frontier holds `(edge, path)` entries; every enqueued edge is marked
//! visited immediately, so the visited set grows monotonically and the
//! traversal always terminates within `max_depth` x (max neighbors per edge)
//! expansions.

use std::collections::{HashSet, VecDeque};

use anyhow::Result;

use crate::store::HyperEdgeStore;
use crate::types::{ConceptId, HyperEdgeId};

/// Bounds for a single traversal call.
#[derive(Debug, Clone)]
pub struct TraversalConfig {
    /// Maximum number of hops (hyperedges) in a returned path.
    pub max_depth: usize,
    /// Stop once this many goal-reaching paths have been found.
    pub k_paths: usize,
    /// Minimum number of shared concepts for two edges to be adjacent.
    pub intersection_size: usize,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            k_paths: 3,
            intersection_size: 1,
        }
    }
}

/// Find up to `k_paths` chains of hyperedges from `start` to `goal`.
///
/// Each returned path is an ordered list of hyperedge ids; the first edge
/// contains `start` and the last contains `goal`. An empty result means no
/// connection exists within the configured depth — an expected outcome, not
/// an error.
pub fn find_paths(
    store: &dyn HyperEdgeStore,
    start: ConceptId,
    goal: ConceptId,
    config: &TraversalConfig,
) -> Result<Vec<Vec<HyperEdgeId>>> {
    let mut queue: VecDeque<(HyperEdgeId, Vec<HyperEdgeId>)> = VecDeque::new();
    let mut visited: HashSet<HyperEdgeId> = HashSet::new();
    let mut found: Vec<Vec<HyperEdgeId>> = Vec::new();

    // Seed the frontier with every edge containing the start concept.
    for edge_id in store.edges_containing(start)? {
        visited.insert(edge_id);
        queue.push_back((edge_id, vec![edge_id]));
    }

    while let Some((edge_id, path)) = queue.pop_front() {
        if path.len() > config.max_depth {
            continue;
        }

        let edge = match store.get(edge_id)? {
            Some(edge) => edge,
            None => continue,
        };

        // Goal test: edges that reach the goal are recorded, not expanded.
        if edge.contains_concept(goal) {
            found.push(path);
            if found.len() >= config.k_paths {
                break;
            }
            continue;
        }

        let current_ids = edge.concept_ids();
        let current_set: HashSet<ConceptId> = current_ids.iter().copied().collect();

        for candidate_id in store.edges_for_concepts(&current_ids)? {
            if visited.contains(&candidate_id) {
                continue;
            }
            let candidate = match store.get(candidate_id)? {
                Some(candidate) => candidate,
                None => continue,
            };
            let shared = candidate
                .concept_ids()
                .iter()
                .filter(|id| current_set.contains(id))
                .count();
            if shared >= config.intersection_size {
                visited.insert(candidate_id);
                let mut next_path = path.clone();
                next_path.push(candidate_id);
                queue.push_back((candidate_id, next_path));
            }
        }
    }

    Ok(found)
}
