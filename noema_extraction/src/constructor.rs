//! Hypergraph construction from document chunks.
//!
//! Chunks are batched and sent to the generation oracle with a structured
//! extraction prompt. Each parsed assertion becomes one hyperedge whose
//! members are the resolved source and target concepts. Parsed definitions
//! back-fill concept descriptions; a definition whose concept is not known
//! yet stays pending for the rest of the document, so it still attaches when
//! a later batch extracts the concept.
//!
//! Oracle flakiness is contained per batch: a failed generation call or an
//! unparseable reply skips that batch and the run continues. Embedding and
//! store errors, by contrast, propagate and abort the remaining batches:
//! embeddings are immutable once stored, so an edge persisted without one
//! could never be repaired.

use std::collections::HashSet;
use std::time::{Duration, Instant};

use anyhow::Result;
use tracing::{debug, info, warn};

use noema_config::ExtractionConfig;
use noema_core::{
    canonical_name, ConceptStore, DocumentContent, HyperEdgeStore, MemberRole, Membership,
    NewHyperEdge, Provenance,
};

use crate::parsing::{parse_extraction, Assertion};
use crate::resolver::EntityResolver;
use crate::{ChatMessage, EmbeddingPipeline, TextGenerator};

const EXTRACTION_SYSTEM_PROMPT: &str = "\
You are a knowledge extraction engine. From the provided text, extract factual \
assertions and term definitions as strict JSON with this shape:

{
  \"events\": [
    {\"source\": [\"entity\", ...], \"relation\": \"verb phrase\", \"target\": [\"entity\", ...]}
  ],
  \"definitions\": {\"term\": \"one-sentence definition\"}
}

Rules:
- Entities are short noun phrases naming concrete things or concepts.
- An event may have multiple entities on either side.
- Only include definitions the text itself states.
- Respond with the JSON object only, no commentary.";

/// Counters and timing for one construction run.
#[derive(Debug, Clone, Default)]
pub struct ConstructionMetrics {
    /// Chunk batches attempted.
    pub batches: usize,
    /// Batches dropped to generation or parse failure.
    pub skipped_batches: usize,
    /// Assertions parsed out of oracle replies.
    pub assertions: usize,
    /// Hyperedges actually persisted.
    pub edges_created: usize,
    /// Definitions applied to concepts (first-write-wins).
    pub definitions_applied: usize,
    /// Wall-clock duration of the run.
    pub elapsed: Duration,
}

/// Builds the hypergraph for one document at a time.
pub struct HypergraphConstructor<'a> {
    concepts: &'a dyn ConceptStore,
    edges: &'a dyn HyperEdgeStore,
    embedder: &'a dyn EmbeddingPipeline,
    generator: &'a dyn TextGenerator,
    config: ExtractionConfig,
}

impl<'a> HypergraphConstructor<'a> {
    pub fn new(
        concepts: &'a dyn ConceptStore,
        edges: &'a dyn HyperEdgeStore,
        embedder: &'a dyn EmbeddingPipeline,
        generator: &'a dyn TextGenerator,
        config: ExtractionConfig,
    ) -> Self {
        Self {
            concepts,
            edges,
            embedder,
            generator,
            config,
        }
    }

    /// Extract concepts and hyperedges from the document's chunks.
    ///
    /// Re-running over the same document is append-only: existing concepts
    /// are reused through resolution, but previously extracted edges are not
    /// deduplicated. Callers wanting a clean re-ingest should cascade-delete
    /// the document's edges first.
    pub fn process(&self, document: &DocumentContent) -> Result<ConstructionMetrics> {
        let started = Instant::now();
        let mut metrics = ConstructionMetrics::default();
        let resolver = EntityResolver::new(self.concepts, self.embedder);
        let mut pending_definitions: Vec<(String, String)> = Vec::new();

        for batch in document.chunks.chunks(self.config.batch_width.max(1)) {
            metrics.batches += 1;
            let text = batch
                .iter()
                .map(|c| c.text.as_str())
                .collect::<Vec<&str>>()
                .join("\n\n");
            let request = ChatMessage::user(format!(
                "Extract the knowledge from the following text:\n\n{}",
                text
            ));

            let reply = match self.generator.generate(EXTRACTION_SYSTEM_PROMPT, &[request]) {
                Ok(reply) => reply,
                Err(e) => {
                    warn!(
                        document_id = document.id,
                        batch = metrics.batches,
                        error = %e,
                        "generation failed, skipping batch"
                    );
                    metrics.skipped_batches += 1;
                    continue;
                }
            };

            let payload = match parse_extraction(&reply) {
                Some(payload) => payload,
                None => {
                    warn!(
                        document_id = document.id,
                        batch = metrics.batches,
                        "unparseable extraction reply, skipping batch"
                    );
                    metrics.skipped_batches += 1;
                    continue;
                }
            };

            let provenance = batch.first().map(|chunk| Provenance::Chunk(chunk.id));
            for assertion in &payload.assertions {
                metrics.assertions += 1;
                if self.commit_assertion(&resolver, assertion, provenance)? {
                    metrics.edges_created += 1;
                }
            }

            for (term, definition) in &payload.definitions {
                let name = canonical_name(term);
                if !name.is_empty() {
                    pending_definitions.push((name, definition.clone()));
                }
            }
            // After the assertions, so a term first seen in this batch can
            // receive its definition. Definitions for still-unknown terms
            // stay pending until a later batch creates the concept.
            pending_definitions =
                self.apply_definitions(pending_definitions, &mut metrics)?;
        }

        metrics.elapsed = started.elapsed();
        info!(
            document_id = document.id,
            batches = metrics.batches,
            skipped = metrics.skipped_batches,
            edges = metrics.edges_created,
            definitions = metrics.definitions_applied,
            elapsed_ms = metrics.elapsed.as_millis() as u64,
            "hypergraph construction finished"
        );
        Ok(metrics)
    }

    /// Back-fill pending definitions, returning those still waiting for
    /// their concept.
    ///
    /// Definitions only ever attach through the exact name index; they never
    /// create concepts and never overwrite an existing description. A
    /// definition whose concept exists but is already described is dropped.
    fn apply_definitions(
        &self,
        pending: Vec<(String, String)>,
        metrics: &mut ConstructionMetrics,
    ) -> Result<Vec<(String, String)>> {
        let mut still_pending = Vec::new();
        for (name, definition) in pending {
            match self.concepts.by_name(&name)? {
                Some(concept) => {
                    if self.concepts.set_description_if_empty(concept.id, &definition)? {
                        metrics.definitions_applied += 1;
                    }
                }
                None => still_pending.push((name, definition)),
            }
        }
        Ok(still_pending)
    }

    fn commit_assertion(
        &self,
        resolver: &EntityResolver<'_>,
        assertion: &Assertion,
        provenance: Option<Provenance>,
    ) -> Result<bool> {
        let mut members: Vec<Membership> = Vec::new();
        let mut seen: HashSet<u64> = HashSet::new();
        for (mentions, role) in [
            (&assertion.sources, MemberRole::Source),
            (&assertion.targets, MemberRole::Target),
        ] {
            for mention in mentions {
                let concept = resolver.resolve(mention, self.config.resolution_threshold)?;
                // A mention on both sides keeps its first role.
                if seen.insert(concept.id) {
                    members.push(Membership {
                        concept_id: concept.id,
                        role: role.clone(),
                    });
                }
            }
        }

        if seen.len() < 2 {
            debug!(
                description = %assertion.describe(),
                "assertion collapsed below minimum arity, skipping"
            );
            return Ok(false);
        }

        let description = assertion.describe();
        let embedding = self.embedder.embed_text(&description)?;

        self.edges.insert(NewHyperEdge {
            description,
            embedding: Some(embedding),
            provenance,
            members,
        })?;
        Ok(true)
    }
}
