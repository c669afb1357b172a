//! Exact-then-fuzzy entity resolution.
//!
//! Every entity mention funnels through one resolution path: canonicalize,
//! try the exact name index, then embed and try the nearest stored concept
//! within a cosine-distance threshold, and only then create a new concept.
//! The threshold is the caller's knob: construction uses a tight one to keep
//! the graph clean, reasoning a loose one to map free-text questions onto
//! whatever the graph already knows.

use anyhow::Result;
use tracing::{debug, info};

use noema_core::{canonical_name, Concept, ConceptStore, NewConcept};

use crate::EmbeddingPipeline;

/// Resolves entity mentions against the concept store.
pub struct EntityResolver<'a> {
    concepts: &'a dyn ConceptStore,
    embedder: &'a dyn EmbeddingPipeline,
}

impl<'a> EntityResolver<'a> {
    pub fn new(concepts: &'a dyn ConceptStore, embedder: &'a dyn EmbeddingPipeline) -> Self {
        Self { concepts, embedder }
    }

    /// Resolve a mention to an existing concept, creating one if no stored
    /// concept is within `threshold` cosine distance.
    ///
    /// Newly created concepts store the mention's embedding; the description
    /// stays empty until a definition is extracted for it.
    pub fn resolve(&self, mention: &str, threshold: f32) -> Result<Concept> {
        let name = canonical_name(mention);
        if name.is_empty() {
            anyhow::bail!("cannot resolve an empty mention");
        }

        if let Some(found) = self.concepts.by_name(&name)? {
            return Ok(found);
        }

        let embedding = self.embedder.embed_text(&name)?;
        if let Some((candidate, distance)) = self.concepts.nearest(&embedding, 1)?.into_iter().next()
        {
            if distance < threshold {
                debug!(
                    mention = %name,
                    matched = %candidate.name,
                    distance,
                    "fuzzy-resolved mention to existing concept"
                );
                return Ok(candidate);
            }
        }

        let id = self.concepts.insert(NewConcept {
            name: name.clone(),
            description: None,
            embedding: Some(embedding.clone()),
        })?;
        info!(concept_id = id, name = %name, "created concept");
        Ok(Concept {
            id,
            name,
            description: None,
            embedding: Some(embedding),
        })
    }

    /// Like [`resolve`](Self::resolve) but read-only: returns `None` instead
    /// of creating a concept. Used by the reasoning engine, which must never
    /// grow the graph.
    pub fn lookup(&self, mention: &str, threshold: f32) -> Result<Option<Concept>> {
        let name = canonical_name(mention);
        if name.is_empty() {
            return Ok(None);
        }

        if let Some(found) = self.concepts.by_name(&name)? {
            return Ok(Some(found));
        }

        let embedding = self.embedder.embed_text(&name)?;
        if let Some((candidate, distance)) = self.concepts.nearest(&embedding, 1)?.into_iter().next()
        {
            if distance < threshold {
                debug!(
                    mention = %name,
                    matched = %candidate.name,
                    distance,
                    "fuzzy lookup matched existing concept"
                );
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingEmbedder, ScriptedEmbedder};
    use noema_core::MemoryStore;

    #[test]
    fn test_exact_match_skips_embedding() {
        let store = MemoryStore::new();
        ConceptStore::insert(
            &store,
            NewConcept {
                name: "glucose".to_string(),
                description: None,
                embedding: None,
            },
        )
        .unwrap();

        // The embedder would fail, so exact resolution must not call it.
        let resolver = EntityResolver::new(&store, &FailingEmbedder);
        let found = resolver.resolve("  Glucose ", 0.15).unwrap();
        assert_eq!(found.name, "glucose");
        assert_eq!(store.concept_count(), 1);
    }

    #[test]
    fn test_fuzzy_match_within_threshold_reuses_concept() {
        let store = MemoryStore::new();
        let embedder = ScriptedEmbedder::new()
            .with("glucose", vec![1.0, 0.0, 0.0])
            .with("glucose molecule", vec![0.99, 0.1, 0.0]);
        let resolver = EntityResolver::new(&store, &embedder);

        let first = resolver.resolve("glucose", 0.15).unwrap();
        let second = resolver.resolve("glucose molecule", 0.15).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "glucose");
        assert_eq!(store.concept_count(), 1);
    }

    #[test]
    fn test_distant_mention_creates_new_concept() {
        let store = MemoryStore::new();
        let embedder = ScriptedEmbedder::new()
            .with("glucose", vec![1.0, 0.0, 0.0])
            .with("bone scaffold", vec![0.0, 1.0, 0.0]);
        let resolver = EntityResolver::new(&store, &embedder);

        let first = resolver.resolve("glucose", 0.15).unwrap();
        let second = resolver.resolve("bone scaffold", 0.15).unwrap();
        assert_ne!(first.id, second.id);
        assert_eq!(store.concept_count(), 2);
        // The new concept stores the mention's embedding.
        assert!(second.embedding.is_some());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let store = MemoryStore::new();
        let embedder = ScriptedEmbedder::new().with("pyruvate", vec![0.0, 0.0, 1.0]);
        let resolver = EntityResolver::new(&store, &embedder);

        let a = resolver.resolve("pyruvate", 0.15).unwrap();
        let b = resolver.resolve("Pyruvate", 0.15).unwrap();
        let c = resolver.resolve(" pyruvate ", 0.15).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.id, c.id);
        assert_eq!(store.concept_count(), 1);
    }

    #[test]
    fn test_empty_mention_rejected() {
        let store = MemoryStore::new();
        let embedder = ScriptedEmbedder::new();
        let resolver = EntityResolver::new(&store, &embedder);
        assert!(resolver.resolve("   ", 0.15).is_err());
        assert!(resolver.lookup("   ", 0.4).unwrap().is_none());
    }

    #[test]
    fn test_lookup_never_creates() {
        let store = MemoryStore::new();
        let embedder = ScriptedEmbedder::new()
            .with("glucose", vec![1.0, 0.0, 0.0])
            .with("glucose sugar", vec![0.95, 0.2, 0.0]);
        let resolver = EntityResolver::new(&store, &embedder);

        assert!(resolver.lookup("glucose", 0.4).unwrap().is_none());
        assert_eq!(store.concept_count(), 0);

        resolver.resolve("glucose", 0.15).unwrap();
        // Loose threshold maps the paraphrase onto the stored concept.
        let found = resolver.lookup("glucose sugar", 0.4).unwrap().unwrap();
        assert_eq!(found.name, "glucose");
        assert_eq!(store.concept_count(), 1);
    }

    #[test]
    fn test_embedding_failure_propagates() {
        let store = MemoryStore::new();
        let resolver = EntityResolver::new(&store, &FailingEmbedder);
        assert!(resolver.resolve("glucose", 0.15).is_err());
        assert!(resolver.lookup("glucose", 0.4).is_err());
    }
}
