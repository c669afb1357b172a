//! Offline consolidation of near-duplicate concepts.
//!
//! Concurrent construction can race two resolutions of the same mention into
//! two concept rows. This pass runs while no construction is active: it scans
//! all embedded concepts, merges every pair within the threshold into the
//! lower-id survivor, repoints memberships, and transfers the duplicate's
//! description when the survivor has none.

use std::collections::HashSet;

use anyhow::Result;
use tracing::info;

use noema_core::{cosine_distance, ConceptId, ConceptStore, HyperEdgeStore};

/// What one consolidation pass did.
#[derive(Debug, Clone, Default)]
pub struct MergeReport {
    /// `(retired, survivor)` pairs, in merge order.
    pub merged: Vec<(ConceptId, ConceptId)>,
    /// Hyperedges whose memberships were rewritten.
    pub edges_touched: usize,
}

/// Merge every pair of concepts within `threshold` cosine distance.
///
/// The lower id always survives, so repeated passes are stable. Concepts
/// without an embedding are never merge candidates.
pub fn merge_duplicate_concepts(
    concepts: &dyn ConceptStore,
    edges: &dyn HyperEdgeStore,
    threshold: f32,
) -> Result<MergeReport> {
    let all = concepts.all()?;
    let mut report = MergeReport::default();
    let mut retired: HashSet<ConceptId> = HashSet::new();

    for (i, survivor) in all.iter().enumerate() {
        if retired.contains(&survivor.id) {
            continue;
        }
        let survivor_embedding = match survivor.embedding.as_ref() {
            Some(embedding) => embedding,
            None => continue,
        };
        for duplicate in &all[i + 1..] {
            if retired.contains(&duplicate.id) {
                continue;
            }
            let embedding = match duplicate.embedding.as_ref() {
                Some(embedding) => embedding,
                None => continue,
            };
            if cosine_distance(survivor_embedding, embedding) >= threshold {
                continue;
            }

            report.edges_touched += edges.repoint_concept(duplicate.id, survivor.id)?;
            if let Some(description) = duplicate.description.as_deref() {
                concepts.set_description_if_empty(survivor.id, description)?;
            }
            concepts.remove(duplicate.id)?;
            retired.insert(duplicate.id);
            info!(
                retired = duplicate.id,
                retired_name = %duplicate.name,
                survivor = survivor.id,
                survivor_name = %survivor.name,
                "merged duplicate concept"
            );
            report.merged.push((duplicate.id, survivor.id));
        }
    }
    Ok(report)
}
