//! Core data types for the noema hypergraph knowledge base.
//!
//! Defines the fundamental types shared across the construction and reasoning
//! pipelines: canonical concepts, n-ary hyperedges with role-tagged
//! memberships, provenance references, and the content units that the
//! hypergraph constructor consumes.

use serde::{Deserialize, Serialize};

/// Unique identifier for a concept (sequential, allocated by the store).
pub type ConceptId = u64;

/// Unique identifier for a hyperedge (sequential, allocated by the store).
pub type HyperEdgeId = u64;

/// Normalize a free-text mention into its canonical concept name.
///
/// Canonical names are trimmed and lower-cased; uniqueness at this layer is
/// enforced by the entity resolver at write time.
pub fn canonical_name(mention: &str) -> String {
    mention.trim().to_lowercase()
}

/// A canonical named entity node in the knowledge graph.
///
/// The `description` is first-write-wins: once set it is never overwritten,
/// so the earliest committed definition survives. The `embedding` is set when
/// the concept is first resolved and is immutable afterwards (a concept is
/// never re-embedded).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Concept {
    /// Unique concept identifier.
    pub id: ConceptId,
    /// Canonical name (trimmed, lower-cased, unique at the resolver layer).
    pub name: String,
    /// Optional free-text definition, back-filled from extraction.
    #[serde(default)]
    pub description: Option<String>,
    /// Embedding of the canonical name. `None` until first resolved.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

/// A concept row before the store has allocated an id.
#[derive(Debug, Clone)]
pub struct NewConcept {
    /// Canonical name.
    pub name: String,
    /// Optional definition.
    pub description: Option<String>,
    /// Embedding of the name, if already computed.
    pub embedding: Option<Vec<f32>>,
}

/// Role a concept plays inside a hyperedge.
///
/// The role vocabulary is open-ended in stored data; the common roles get
/// dedicated variants and anything else round-trips through `Other`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MemberRole {
    /// The concept appeared on the source side of the extracted assertion.
    Source,
    /// The concept appeared on the target side of the extracted assertion.
    Target,
    /// The concept is a topic of a promoted section summary.
    Topic,
    /// Default role when the concept is neither source nor target.
    Participant,
    /// Forward-compatibility fallback for unrecognized role labels.
    Other(String),
}

impl MemberRole {
    /// The storage/display label for this role.
    pub fn as_str(&self) -> &str {
        match self {
            MemberRole::Source => "source",
            MemberRole::Target => "target",
            MemberRole::Topic => "topic",
            MemberRole::Participant => "participant",
            MemberRole::Other(label) => label,
        }
    }

    /// Parse a role label, falling back to `Other` for unknown strings.
    pub fn from_label(label: &str) -> Self {
        match label {
            "source" => MemberRole::Source,
            "target" => MemberRole::Target,
            "topic" => MemberRole::Topic,
            "participant" => MemberRole::Participant,
            other => MemberRole::Other(other.to_string()),
        }
    }
}

/// The join between a hyperedge and one of its member concepts.
///
/// Owned by its hyperedge; memberships disappear with the edge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Membership {
    /// The member concept.
    pub concept_id: ConceptId,
    /// The role the concept plays in this edge.
    pub role: MemberRole,
}

/// Provenance reference for a hyperedge: at most one source.
///
/// Referenced ids belong to the surrounding service's document model; the
/// core only uses them for scoping and cascade deletion.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Provenance {
    /// Extracted from a whole document.
    Document(u64),
    /// Promoted from a section summary.
    Section(u64),
    /// Extracted from a chunk batch (the batch's first chunk).
    Chunk(u64),
}

/// An n-ary relation connecting two or more concepts.
///
/// The `description` is a generated natural-language summary of the relation
/// (e.g. "glucose is metabolized into pyruvate"); its embedding, once set, is
/// immutable. Edges are never merged or updated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HyperEdge {
    /// Unique hyperedge identifier.
    pub id: HyperEdgeId,
    /// Natural-language summary of the relation.
    pub description: String,
    /// Embedding of the description, if computed.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    /// Optional provenance (document, section, or chunk).
    #[serde(default)]
    pub provenance: Option<Provenance>,
    /// Role-tagged member concepts. Invariant: at least 2 distinct concepts.
    pub members: Vec<Membership>,
}

impl HyperEdge {
    /// Distinct member concept ids, in first-seen order.
    pub fn concept_ids(&self) -> Vec<ConceptId> {
        let mut seen = std::collections::HashSet::new();
        self.members
            .iter()
            .filter(|m| seen.insert(m.concept_id))
            .map(|m| m.concept_id)
            .collect()
    }

    /// Whether the given concept is a member of this edge.
    pub fn contains_concept(&self, id: ConceptId) -> bool {
        self.members.iter().any(|m| m.concept_id == id)
    }
}

/// A hyperedge before the store has allocated an id.
#[derive(Debug, Clone)]
pub struct NewHyperEdge {
    /// Natural-language summary of the relation.
    pub description: String,
    /// Embedding of the description, if computed.
    pub embedding: Option<Vec<f32>>,
    /// Optional provenance.
    pub provenance: Option<Provenance>,
    /// Role-tagged member concepts.
    pub members: Vec<Membership>,
}

/// One ordered content unit of a document (text extracted and chunked
/// upstream of this core).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Chunk identifier in the surrounding service's document model.
    pub id: u64,
    /// Position of the chunk within its document.
    pub index: usize,
    /// Chunk text.
    pub text: String,
}

/// A document's ordered content, as handed to the hypergraph constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentContent {
    /// Document identifier in the surrounding service's document model.
    pub id: u64,
    /// Ordered chunks.
    pub chunks: Vec<Chunk>,
}

/// Summary metadata of a document section, as handed to the section promoter.
///
/// This is the lighter-weight construction path: one hyperedge per section,
/// linking the section's key concepts with the `Topic` role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSummary {
    /// Section identifier.
    pub id: u64,
    /// Owning document identifier.
    pub document_id: u64,
    /// Section title, used in the promoted edge description.
    pub title: String,
    /// Key concept names extracted from the section summary.
    pub concepts: Vec<String>,
}
