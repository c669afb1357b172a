//! # Noema Extraction
//!
//! LLM-assisted hypergraph construction and reasoning on top of
//! [`noema_core`].
//!
//! The crate is organized around two external "oracles", both abstracted
//! behind traits so tests and alternative backends can plug in:
//! - [`TextGenerator`] — a chat-completion model used for knowledge
//!   extraction and narrative synthesis.
//! - [`EmbeddingPipeline`] — a text-embedding model used for fuzzy entity
//!   resolution and relation indexing.
//!
//! The pipelines built on those oracles:
//! - [`constructor::HypergraphConstructor`] — turns document chunks into
//!   concepts and n-ary hyperedges.
//! - [`unifier`] — promotes section summaries into topic hyperedges.
//! - [`resolver::EntityResolver`] — exact-then-fuzzy concept resolution.
//! - [`reasoning::ReasoningEngine`] — multi-hop traversal plus narrative
//!   synthesis and graph projection.
//! - [`consolidation`] — offline merge of near-duplicate concepts.

use anyhow::Result;

pub mod consolidation;
pub mod constructor;
pub mod oracles;
pub mod parsing;
pub mod reasoning;
pub mod resolver;
pub mod unifier;

pub use consolidation::{merge_duplicate_concepts, MergeReport};
pub use constructor::{ConstructionMetrics, HypergraphConstructor};
pub use oracles::{HttpEmbeddingPipeline, OpenAiChatGenerator};
pub use parsing::{parse_extraction, Assertion, ExtractionPayload};
pub use reasoning::{ReasoningEngine, TraversalOutcome};
pub use resolver::EntityResolver;
pub use unifier::promote_section;

/// One message of a chat-completion conversation (system prompts are passed
/// separately).
#[derive(Debug, Clone, serde::Serialize)]
pub struct ChatMessage {
    /// Wire-format role: "user" or "assistant".
    pub role: String,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// A chat-completion text generation backend.
pub trait TextGenerator: Send + Sync {
    /// Generate a completion for the given system prompt and conversation.
    fn generate(&self, system: &str, messages: &[ChatMessage]) -> Result<String>;
}

/// A text embedding backend.
pub trait EmbeddingPipeline: Send + Sync {
    /// Embed a single text.
    fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}
