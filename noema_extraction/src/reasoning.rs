//! Multi-hop reasoning: endpoint resolution, traversal, synthesis, projection.
//!
//! The engine answers "how does X relate to Y" questions. Endpoints are
//! resolved read-only with a loose threshold; a question can never grow the
//! graph. Traversal is the bounded breadth-first search of
//! [`noema_core::traversal`]; found paths are narrated by the generation
//! oracle and projected into a renderable graph.

use anyhow::Result;
use tracing::{info, warn};

use noema_config::ReasoningConfig;
use noema_core::{
    canonical_name, find_paths, project, Concept, ConceptStore, GraphData, HyperEdgeId,
    HyperEdgeStore, TraversalConfig,
};

use crate::resolver::EntityResolver;
use crate::{ChatMessage, EmbeddingPipeline, TextGenerator};

const SYNTHESIS_SYSTEM_PROMPT: &str = "\
You are a scientific reasoning assistant. You are given evidence paths from a \
knowledge hypergraph, each path a chain of extracted relation contexts. \
Explain the mechanistic bridge between the two named concepts using only the \
provided contexts. Be concise and do not invent relations that are not in the \
evidence.";

/// Result of one reasoning question.
#[derive(Debug, Clone)]
pub enum TraversalOutcome {
    /// A connection was found.
    Connected {
        /// Synthesized explanation of the connection.
        narrative: String,
        /// The underlying hyperedge chains, strongest-first.
        paths: Vec<Vec<HyperEdgeId>>,
        /// Renderable projection of the paths.
        graph: GraphData,
    },
    /// No connection; the message says which stage gave up.
    NotFound(String),
}

/// Answers relation questions over the stored hypergraph.
pub struct ReasoningEngine<'a> {
    concepts: &'a dyn ConceptStore,
    edges: &'a dyn HyperEdgeStore,
    embedder: &'a dyn EmbeddingPipeline,
    generator: &'a dyn TextGenerator,
    config: ReasoningConfig,
}

impl<'a> ReasoningEngine<'a> {
    pub fn new(
        concepts: &'a dyn ConceptStore,
        edges: &'a dyn HyperEdgeStore,
        embedder: &'a dyn EmbeddingPipeline,
        generator: &'a dyn TextGenerator,
        config: ReasoningConfig,
    ) -> Self {
        Self {
            concepts,
            edges,
            embedder,
            generator,
            config,
        }
    }

    /// Find and narrate the connection between two free-text mentions.
    ///
    /// An unresolvable endpoint or an exhausted traversal yields
    /// [`TraversalOutcome::NotFound`]; only infrastructure failures (store or
    /// embedding errors) are `Err`.
    pub fn reason(&self, start_mention: &str, goal_mention: &str) -> Result<TraversalOutcome> {
        let resolver = EntityResolver::new(self.concepts, self.embedder);
        let threshold = self.config.resolution_threshold;

        let start = match resolver.lookup(start_mention, threshold)? {
            Some(concept) => concept,
            None => {
                return Ok(TraversalOutcome::NotFound(format!(
                    "Starting concept '{}' not found (and no close matches).",
                    canonical_name(start_mention)
                )))
            }
        };
        let goal = match resolver.lookup(goal_mention, threshold)? {
            Some(concept) => concept,
            None => {
                return Ok(TraversalOutcome::NotFound(format!(
                    "Goal concept '{}' not found (and no close matches).",
                    canonical_name(goal_mention)
                )))
            }
        };

        let traversal = TraversalConfig {
            max_depth: self.config.max_depth,
            k_paths: self.config.k_paths,
            intersection_size: self.config.intersection_size,
        };
        let paths = find_paths(self.edges, start.id, goal.id, &traversal)?;
        if paths.is_empty() {
            return Ok(TraversalOutcome::NotFound(format!(
                "No connection found between {} and {} within depth {}.",
                start.name, goal.name, self.config.max_depth
            )));
        }
        info!(
            start = %start.name,
            goal = %goal.name,
            paths = paths.len(),
            "traversal connected the endpoints"
        );

        let narrative = self.synthesize(&start, &goal, &paths)?;
        let graph = project(self.concepts, self.edges, &paths)?;
        Ok(TraversalOutcome::Connected {
            narrative,
            paths,
            graph,
        })
    }

    /// Render the found paths as the evidence block fed to synthesis.
    fn paths_text(&self, paths: &[Vec<HyperEdgeId>]) -> Result<String> {
        let mut text = String::new();
        for (i, path) in paths.iter().enumerate() {
            text.push_str(&format!("Path {}:\n", i + 1));
            for edge_id in path {
                let edge = match self.edges.get(*edge_id)? {
                    Some(edge) => edge,
                    None => continue,
                };
                let mut names: Vec<String> = Vec::new();
                for concept_id in edge.concept_ids() {
                    names.push(
                        self.concepts
                            .get(concept_id)?
                            .map(|c| c.name)
                            .unwrap_or_else(|| format!("concept {}", concept_id)),
                    );
                }
                text.push_str(&format!(
                    "  - Context: {} (Concepts: {})\n",
                    edge.description,
                    names.join(", ")
                ));
            }
        }
        Ok(text)
    }

    /// Narrate the paths. Falls back to the raw evidence text when the
    /// generation oracle fails or returns nothing, so a found connection is
    /// never lost to a flaky model.
    fn synthesize(
        &self,
        start: &Concept,
        goal: &Concept,
        paths: &[Vec<HyperEdgeId>],
    ) -> Result<String> {
        let evidence = self.paths_text(paths)?;
        let question = format!(
            "How does {} relate to {}?\n\nEvidence paths:\n{}",
            start.name, goal.name, evidence
        );
        match self
            .generator
            .generate(SYNTHESIS_SYSTEM_PROMPT, &[ChatMessage::user(question)])
        {
            Ok(narrative) if !narrative.trim().is_empty() => Ok(narrative.trim().to_string()),
            Ok(_) => {
                warn!("synthesis returned an empty narrative, using raw paths");
                Ok(evidence)
            }
            Err(e) => {
                warn!(error = %e, "synthesis failed, using raw paths");
                Ok(evidence)
            }
        }
    }
}
