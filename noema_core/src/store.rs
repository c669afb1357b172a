//! Storage traits and the reference in-memory engine.
//!
//! The concept and hyperedge stores are the only shared mutable state in the
//! system. All mutation is append-only: the single exception is the
//! first-write-wins concept description. Durable engines implement the same
//! traits; [`MemoryStore`] is the reference engine used by the library's own
//! tests and by embedders that do not need persistence.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use anyhow::Result;

use crate::types::{
    Concept, ConceptId, HyperEdge, HyperEdgeId, NewConcept, NewHyperEdge, Provenance,
};

/// Cosine distance between two vectors: `1 - cos(a, b)`.
///
/// Returns `1.0` for empty or zero-magnitude vectors so that degenerate
/// embeddings never fuzzy-match anything.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 1.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a * norm_b)
}

/// Durable table of canonical concepts.
pub trait ConceptStore: Send + Sync {
    /// Insert a new concept and return its allocated id.
    fn insert(&self, concept: NewConcept) -> Result<ConceptId>;

    /// Fetch a concept by id.
    fn get(&self, id: ConceptId) -> Result<Option<Concept>>;

    /// Exact lookup by canonical name.
    fn by_name(&self, name: &str) -> Result<Option<Concept>>;

    /// The `k` nearest concepts to `query` by cosine distance, ascending.
    ///
    /// Concepts without an embedding are not candidates.
    fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(Concept, f32)>>;

    /// Set the description if the concept has none yet (first-write-wins).
    ///
    /// Returns `true` if the description was written, `false` if one already
    /// existed or the concept does not exist.
    fn set_description_if_empty(&self, id: ConceptId, description: &str) -> Result<bool>;

    /// All concepts. Used by the offline consolidation pass.
    fn all(&self) -> Result<Vec<Concept>>;

    /// Delete a concept row.
    ///
    /// The construction and reasoning pipelines never delete concepts; this
    /// exists for administrative operations (duplicate merge). Returns `true`
    /// if the concept existed.
    fn remove(&self, id: ConceptId) -> Result<bool>;
}

/// Durable table of n-ary relations with role-tagged memberships.
pub trait HyperEdgeStore: Send + Sync {
    /// Persist a new hyperedge, allocating its id.
    ///
    /// Fails if the edge has fewer than 2 distinct member concepts; such
    /// edges are never persisted.
    fn insert(&self, edge: NewHyperEdge) -> Result<HyperEdgeId>;

    /// Fetch a hyperedge (with its memberships) by id.
    fn get(&self, id: HyperEdgeId) -> Result<Option<HyperEdge>>;

    /// All hyperedges containing the given concept.
    fn edges_containing(&self, concept_id: ConceptId) -> Result<Vec<HyperEdgeId>>;

    /// All hyperedges containing any of the given concepts, deduplicated.
    ///
    /// This is the single query issued per frontier-expansion step during
    /// traversal.
    fn edges_for_concepts(&self, concept_ids: &[ConceptId]) -> Result<Vec<HyperEdgeId>>;

    /// All hyperedges carrying exactly this provenance.
    fn edges_with_provenance(&self, provenance: &Provenance) -> Result<Vec<HyperEdgeId>>;

    /// Cascade-delete every hyperedge whose provenance references the given
    /// document. Memberships die with their edge. Returns the edge count.
    fn delete_by_document(&self, document_id: u64) -> Result<usize>;

    /// Rewrite memberships of `from` to reference `to`, collapsing
    /// memberships that become duplicates. Used by the offline consolidation
    /// pass. Returns the number of edges touched.
    fn repoint_concept(&self, from: ConceptId, to: ConceptId) -> Result<usize>;
}

/// Reference in-memory engine implementing both store traits.
///
/// Thread-safe behind mutexes; maintains an inverted concept-to-edge index so
/// frontier expansion is a map union rather than a scan. Inserts build the
/// full row before touching shared state, so a failed insert leaves nothing
/// partially applied.
#[derive(Default)]
pub struct MemoryStore {
    concepts: Mutex<HashMap<ConceptId, Concept>>,
    name_index: Mutex<HashMap<String, ConceptId>>,
    edges: Mutex<HashMap<HyperEdgeId, HyperEdge>>,
    by_concept: Mutex<HashMap<ConceptId, Vec<HyperEdgeId>>>,
    next_concept_id: AtomicU64,
    next_edge_id: AtomicU64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            next_concept_id: AtomicU64::new(1),
            next_edge_id: AtomicU64::new(1),
            ..Default::default()
        }
    }

    /// Number of stored concepts.
    pub fn concept_count(&self) -> usize {
        self.concepts.lock().unwrap().len()
    }

    /// Number of stored hyperedges.
    pub fn edge_count(&self) -> usize {
        self.edges.lock().unwrap().len()
    }
}

impl ConceptStore for MemoryStore {
    fn insert(&self, concept: NewConcept) -> Result<ConceptId> {
        let id = self.next_concept_id.fetch_add(1, Ordering::SeqCst);
        let row = Concept {
            id,
            name: concept.name,
            description: concept.description,
            embedding: concept.embedding,
        };
        self.name_index
            .lock()
            .unwrap()
            .insert(row.name.clone(), id);
        self.concepts.lock().unwrap().insert(id, row);
        Ok(id)
    }

    fn get(&self, id: ConceptId) -> Result<Option<Concept>> {
        Ok(self.concepts.lock().unwrap().get(&id).cloned())
    }

    fn by_name(&self, name: &str) -> Result<Option<Concept>> {
        let id = match self.name_index.lock().unwrap().get(name) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(self.concepts.lock().unwrap().get(&id).cloned())
    }

    fn nearest(&self, query: &[f32], k: usize) -> Result<Vec<(Concept, f32)>> {
        let concepts = self.concepts.lock().unwrap();
        let mut scored: Vec<(Concept, f32)> = concepts
            .values()
            .filter_map(|c| {
                c.embedding
                    .as_ref()
                    .map(|e| (c.clone(), cosine_distance(query, e)))
            })
            .collect();
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    fn set_description_if_empty(&self, id: ConceptId, description: &str) -> Result<bool> {
        let mut concepts = self.concepts.lock().unwrap();
        match concepts.get_mut(&id) {
            Some(concept) if concept.description.is_none() => {
                concept.description = Some(description.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn all(&self) -> Result<Vec<Concept>> {
        let mut rows: Vec<Concept> = self.concepts.lock().unwrap().values().cloned().collect();
        rows.sort_by_key(|c| c.id);
        Ok(rows)
    }

    fn remove(&self, id: ConceptId) -> Result<bool> {
        let removed = self.concepts.lock().unwrap().remove(&id);
        if let Some(concept) = &removed {
            self.name_index.lock().unwrap().remove(&concept.name);
        }
        Ok(removed.is_some())
    }
}

impl HyperEdgeStore for MemoryStore {
    fn insert(&self, edge: NewHyperEdge) -> Result<HyperEdgeId> {
        let distinct: HashSet<ConceptId> = edge.members.iter().map(|m| m.concept_id).collect();
        if distinct.len() < 2 {
            anyhow::bail!(
                "hyperedge requires at least 2 distinct member concepts, got {}",
                distinct.len()
            );
        }

        let id = self.next_edge_id.fetch_add(1, Ordering::SeqCst);
        let row = HyperEdge {
            id,
            description: edge.description,
            embedding: edge.embedding,
            provenance: edge.provenance,
            members: edge.members,
        };

        let mut by_concept = self.by_concept.lock().unwrap();
        for concept_id in &distinct {
            by_concept.entry(*concept_id).or_default().push(id);
        }
        drop(by_concept);

        self.edges.lock().unwrap().insert(id, row);
        Ok(id)
    }

    fn get(&self, id: HyperEdgeId) -> Result<Option<HyperEdge>> {
        Ok(self.edges.lock().unwrap().get(&id).cloned())
    }

    fn edges_containing(&self, concept_id: ConceptId) -> Result<Vec<HyperEdgeId>> {
        Ok(self
            .by_concept
            .lock()
            .unwrap()
            .get(&concept_id)
            .cloned()
            .unwrap_or_default())
    }

    fn edges_for_concepts(&self, concept_ids: &[ConceptId]) -> Result<Vec<HyperEdgeId>> {
        let by_concept = self.by_concept.lock().unwrap();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for concept_id in concept_ids {
            if let Some(edge_ids) = by_concept.get(concept_id) {
                for edge_id in edge_ids {
                    if seen.insert(*edge_id) {
                        out.push(*edge_id);
                    }
                }
            }
        }
        Ok(out)
    }

    fn edges_with_provenance(&self, provenance: &Provenance) -> Result<Vec<HyperEdgeId>> {
        let edges = self.edges.lock().unwrap();
        let mut out: Vec<HyperEdgeId> = edges
            .values()
            .filter(|e| e.provenance.as_ref() == Some(provenance))
            .map(|e| e.id)
            .collect();
        out.sort_unstable();
        Ok(out)
    }

    fn delete_by_document(&self, document_id: u64) -> Result<usize> {
        let mut edges = self.edges.lock().unwrap();
        let doomed: Vec<HyperEdgeId> = edges
            .values()
            .filter(|e| e.provenance == Some(Provenance::Document(document_id)))
            .map(|e| e.id)
            .collect();

        let mut by_concept = self.by_concept.lock().unwrap();
        for edge_id in &doomed {
            if let Some(edge) = edges.remove(edge_id) {
                for concept_id in edge.concept_ids() {
                    if let Some(list) = by_concept.get_mut(&concept_id) {
                        list.retain(|e| e != edge_id);
                    }
                }
            }
        }
        Ok(doomed.len())
    }

    fn repoint_concept(&self, from: ConceptId, to: ConceptId) -> Result<usize> {
        if from == to {
            return Ok(0);
        }
        let mut edges = self.edges.lock().unwrap();
        let mut by_concept = self.by_concept.lock().unwrap();
        let affected = by_concept.remove(&from).unwrap_or_default();

        let mut touched = 0;
        for edge_id in &affected {
            if let Some(edge) = edges.get_mut(edge_id) {
                for member in edge.members.iter_mut() {
                    if member.concept_id == from {
                        member.concept_id = to;
                    }
                }
                // Collapse memberships that became duplicates of an existing
                // (concept, role) pair.
                let mut seen = HashSet::new();
                edge.members.retain(|m| seen.insert(m.clone()));
                touched += 1;

                let list = by_concept.entry(to).or_default();
                if !list.contains(edge_id) {
                    list.push(*edge_id);
                }
            }
        }
        Ok(touched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MemberRole, Membership};

    fn membership(concept_id: ConceptId, role: MemberRole) -> Membership {
        Membership { concept_id, role }
    }

    fn new_concept(name: &str, embedding: Option<Vec<f32>>) -> NewConcept {
        NewConcept {
            name: name.to_string(),
            description: None,
            embedding,
        }
    }

    #[test]
    fn test_cosine_distance_identical() {
        let v = vec![0.6, 0.8];
        assert!(cosine_distance(&v, &v).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_orthogonal() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!((cosine_distance(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_distance_degenerate() {
        assert_eq!(cosine_distance(&[], &[1.0]), 1.0);
        assert_eq!(cosine_distance(&[0.0, 0.0], &[1.0, 0.0]), 1.0);
        assert_eq!(cosine_distance(&[1.0], &[1.0, 0.0]), 1.0);
    }

    #[test]
    fn test_concept_insert_and_lookup() {
        let store = MemoryStore::new();
        let id = ConceptStore::insert(&store, new_concept("glucose", None)).unwrap();
        let found = store.by_name("glucose").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert!(store.by_name("Glucose").unwrap().is_none());
        assert_eq!(ConceptStore::get(&store, id).unwrap().unwrap().name, "glucose");
    }

    #[test]
    fn test_nearest_orders_by_distance() {
        let store = MemoryStore::new();
        ConceptStore::insert(&store, new_concept("a", Some(vec![1.0, 0.0]))).unwrap();
        ConceptStore::insert(&store, new_concept("b", Some(vec![0.0, 1.0]))).unwrap();
        ConceptStore::insert(&store, new_concept("c", None)).unwrap();

        let results = store.nearest(&[0.9, 0.1], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].0.name, "a");
        assert!(results[0].1 < results[1].1);
    }

    #[test]
    fn test_description_first_write_wins() {
        let store = MemoryStore::new();
        let id = ConceptStore::insert(&store, new_concept("pyruvate", None)).unwrap();
        assert!(store.set_description_if_empty(id, "first").unwrap());
        assert!(!store.set_description_if_empty(id, "second").unwrap());
        assert_eq!(
            ConceptStore::get(&store, id).unwrap().unwrap().description.as_deref(),
            Some("first")
        );
        assert!(!store.set_description_if_empty(999, "ghost").unwrap());
    }

    #[test]
    fn test_edge_minimum_arity_rejected() {
        let store = MemoryStore::new();
        let err = HyperEdgeStore::insert(
            &store,
            NewHyperEdge {
                description: "solo".to_string(),
                embedding: None,
                provenance: None,
                members: vec![
                    membership(1, MemberRole::Source),
                    membership(1, MemberRole::Target),
                ],
            },
        );
        assert!(err.is_err());
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_edge_insert_and_inverted_index() {
        let store = MemoryStore::new();
        let edge_id = HyperEdgeStore::insert(
            &store,
            NewHyperEdge {
                description: "a relates to b".to_string(),
                embedding: None,
                provenance: Some(Provenance::Chunk(10)),
                members: vec![
                    membership(1, MemberRole::Source),
                    membership(2, MemberRole::Target),
                ],
            },
        )
        .unwrap();

        assert_eq!(store.edges_containing(1).unwrap(), vec![edge_id]);
        assert_eq!(store.edges_containing(2).unwrap(), vec![edge_id]);
        assert!(store.edges_containing(3).unwrap().is_empty());
        assert_eq!(
            store.edges_with_provenance(&Provenance::Chunk(10)).unwrap(),
            vec![edge_id]
        );
    }

    #[test]
    fn test_edges_for_concepts_dedups() {
        let store = MemoryStore::new();
        let edge_id = HyperEdgeStore::insert(
            &store,
            NewHyperEdge {
                description: "d".to_string(),
                embedding: None,
                provenance: None,
                members: vec![
                    membership(1, MemberRole::Source),
                    membership(2, MemberRole::Target),
                ],
            },
        )
        .unwrap();

        let found = store.edges_for_concepts(&[1, 2]).unwrap();
        assert_eq!(found, vec![edge_id]);
    }

    #[test]
    fn test_delete_by_document_cascades() {
        let store = MemoryStore::new();
        HyperEdgeStore::insert(
            &store,
            NewHyperEdge {
                description: "doc edge".to_string(),
                embedding: None,
                provenance: Some(Provenance::Document(7)),
                members: vec![
                    membership(1, MemberRole::Source),
                    membership(2, MemberRole::Target),
                ],
            },
        )
        .unwrap();
        let kept = HyperEdgeStore::insert(
            &store,
            NewHyperEdge {
                description: "other edge".to_string(),
                embedding: None,
                provenance: Some(Provenance::Document(8)),
                members: vec![
                    membership(1, MemberRole::Source),
                    membership(3, MemberRole::Target),
                ],
            },
        )
        .unwrap();

        assert_eq!(store.delete_by_document(7).unwrap(), 1);
        assert_eq!(store.edge_count(), 1);
        // Memberships of the deleted edge are gone from the index.
        assert_eq!(store.edges_containing(1).unwrap(), vec![kept]);
        assert!(store.edges_containing(2).unwrap().is_empty());
    }

    #[test]
    fn test_repoint_concept_collapses_duplicates() {
        let store = MemoryStore::new();
        let edge_id = HyperEdgeStore::insert(
            &store,
            NewHyperEdge {
                description: "d".to_string(),
                embedding: None,
                provenance: None,
                members: vec![
                    membership(1, MemberRole::Source),
                    membership(2, MemberRole::Source),
                    membership(3, MemberRole::Target),
                ],
            },
        )
        .unwrap();

        let touched = store.repoint_concept(2, 1).unwrap();
        assert_eq!(touched, 1);
        let edge = HyperEdgeStore::get(&store, edge_id).unwrap().unwrap();
        // (1, Source) and the repointed (2 -> 1, Source) collapse into one.
        assert_eq!(edge.members.len(), 2);
        assert_eq!(edge.concept_ids(), vec![1, 3]);
        assert!(store.edges_containing(2).unwrap().is_empty());
        assert_eq!(store.edges_containing(1).unwrap(), vec![edge_id]);
    }

    #[test]
    fn test_concept_remove() {
        let store = MemoryStore::new();
        let id = ConceptStore::insert(&store, new_concept("transient", None)).unwrap();
        assert!(store.remove(id).unwrap());
        assert!(!store.remove(id).unwrap());
        assert!(store.by_name("transient").unwrap().is_none());
    }
}
