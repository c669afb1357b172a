//! Section-summary promotion.
//!
//! The lighter-weight construction path: a section whose summary names two or
//! more key concepts becomes a single hyperedge tying those concepts together
//! with the `Topic` role. Promotion is idempotent per section, keyed on the
//! edge's section provenance.

use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, warn};

use noema_core::{
    canonical_name, Concept, ConceptStore, HyperEdgeId, HyperEdgeStore, MemberRole, Membership,
    NewConcept, NewHyperEdge, Provenance, SectionSummary,
};

use crate::EmbeddingPipeline;

const SUMMARY_CONCEPT_DESCRIPTION: &str = "Extracted from document summary";

/// Promote one section summary into a topic hyperedge.
///
/// Returns the promoted edge's id, the already-existing edge's id when the
/// section was promoted before, or `None` when fewer than two distinct
/// concepts survive resolution.
///
/// Concepts named by the summary that are not in the store yet are created
/// with a placeholder description; an embedding failure downgrades the new
/// concept to exact-match-only rather than failing the promotion.
pub fn promote_section(
    concepts: &dyn ConceptStore,
    edges: &dyn HyperEdgeStore,
    embedder: &dyn EmbeddingPipeline,
    section: &SectionSummary,
) -> Result<Option<HyperEdgeId>> {
    let provenance = Provenance::Section(section.id);
    if let Some(existing) = edges.edges_with_provenance(&provenance)?.first() {
        debug!(
            section_id = section.id,
            edge_id = existing,
            "section already promoted"
        );
        return Ok(Some(*existing));
    }

    let mut members: Vec<Membership> = Vec::new();
    let mut seen: HashSet<u64> = HashSet::new();
    for mention in &section.concepts {
        let name = canonical_name(mention);
        if name.is_empty() {
            continue;
        }
        let concept = match concepts.by_name(&name)? {
            Some(found) => found,
            None => create_summary_concept(concepts, embedder, &name)?,
        };
        if seen.insert(concept.id) {
            members.push(Membership {
                concept_id: concept.id,
                role: MemberRole::Topic,
            });
        }
    }

    if seen.len() < 2 {
        debug!(
            section_id = section.id,
            concepts = seen.len(),
            "too few distinct concepts, section not promoted"
        );
        return Ok(None);
    }

    let description = format!("Section Summary: {}", section.title);
    let embedding = match embedder.embed_text(&description) {
        Ok(vector) => Some(vector),
        Err(e) => {
            warn!(section_id = section.id, error = %e, "embedding failed for section edge");
            None
        }
    };
    let id = edges.insert(NewHyperEdge {
        description,
        embedding,
        provenance: Some(provenance),
        members,
    })?;
    Ok(Some(id))
}

fn create_summary_concept(
    concepts: &dyn ConceptStore,
    embedder: &dyn EmbeddingPipeline,
    name: &str,
) -> Result<Concept> {
    let embedding = match embedder.embed_text(name) {
        Ok(vector) => Some(vector),
        Err(e) => {
            warn!(name, error = %e, "embedding failed for summary concept");
            None
        }
    };
    let id = concepts.insert(NewConcept {
        name: name.to_string(),
        description: Some(SUMMARY_CONCEPT_DESCRIPTION.to_string()),
        embedding: embedding.clone(),
    })?;
    Ok(Concept {
        id,
        name: name.to_string(),
        description: Some(SUMMARY_CONCEPT_DESCRIPTION.to_string()),
        embedding,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, ScriptedEmbedder};
    use noema_core::MemoryStore;

    fn section(id: u64, title: &str, concepts: &[&str]) -> SectionSummary {
        SectionSummary {
            id,
            document_id: 1,
            title: title.to_string(),
            concepts: concepts.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_promotes_section_with_topic_roles() {
        let store = MemoryStore::new();
        let embedder = ScriptedEmbedder::new();
        let summary = section(5, "Bone Regeneration", &["nHAp Composite", "collagen"]);

        let edge_id = promote_section(&store, &store, &embedder, &summary)
            .unwrap()
            .unwrap();
        let edge = HyperEdgeStore::get(&store, edge_id).unwrap().unwrap();
        assert_eq!(edge.description, "Section Summary: Bone Regeneration");
        assert_eq!(edge.provenance, Some(Provenance::Section(5)));
        assert_eq!(edge.members.len(), 2);
        assert!(edge.members.iter().all(|m| m.role == MemberRole::Topic));

        // Missing concepts were created with the placeholder description.
        let created = store.by_name("nhap composite").unwrap().unwrap();
        assert_eq!(
            created.description.as_deref(),
            Some("Extracted from document summary")
        );
    }

    #[test]
    fn test_promotion_is_idempotent() {
        let store = MemoryStore::new();
        let embedder = ScriptedEmbedder::new();
        let summary = section(5, "Bone Regeneration", &["a", "b"]);

        let first = promote_section(&store, &store, &embedder, &summary)
            .unwrap()
            .unwrap();
        let second = promote_section(&store, &store, &embedder, &summary)
            .unwrap()
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(store.edge_count(), 1);
        assert_eq!(store.concept_count(), 2);
    }

    #[test]
    fn test_too_few_concepts_not_promoted() {
        let store = MemoryStore::new();
        let embedder = ScriptedEmbedder::new();

        let single = section(1, "Short", &["alone"]);
        assert!(promote_section(&store, &store, &embedder, &single)
            .unwrap()
            .is_none());

        // Duplicate mentions collapse onto one concept.
        let duplicated = section(2, "Echo", &["alone", "Alone", " alone "]);
        assert!(promote_section(&store, &store, &embedder, &duplicated)
            .unwrap()
            .is_none());
        assert_eq!(store.edge_count(), 0);
    }

    #[test]
    fn test_reuses_existing_concepts() {
        let store = MemoryStore::new();
        let existing = ConceptStore::insert(
            &store,
            NewConcept {
                name: "collagen".to_string(),
                description: Some("A structural protein.".to_string()),
                embedding: None,
            },
        )
        .unwrap();

        let embedder = ScriptedEmbedder::new();
        let summary = section(9, "Scaffolds", &["Collagen", "hydrogel"]);
        let edge_id = promote_section(&store, &store, &embedder, &summary)
            .unwrap()
            .unwrap();

        let edge = HyperEdgeStore::get(&store, edge_id).unwrap().unwrap();
        assert!(edge.contains_concept(existing));
        // Existing description untouched by the placeholder.
        let collagen = store.by_name("collagen").unwrap().unwrap();
        assert_eq!(collagen.description.as_deref(), Some("A structural protein."));
    }

    #[test]
    fn test_embedding_failure_tolerated() {
        let store = MemoryStore::new();
        let summary = section(3, "Resilience", &["a", "b"]);

        let edge_id = promote_section(&store, &store, &FailingEmbedder, &summary)
            .unwrap()
            .unwrap();
        let edge = HyperEdgeStore::get(&store, edge_id).unwrap().unwrap();
        assert!(edge.embedding.is_none());
        let a = store.by_name("a").unwrap().unwrap();
        assert!(a.embedding.is_none());
    }
}
