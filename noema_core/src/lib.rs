//! # Noema Core
//!
//! Core data model and algorithms for the noema hypergraph knowledge base.
//!
//! This crate defines the concept/hyperedge data model, the storage traits
//! that durable engines implement, a reference in-memory engine, the bounded
//! breadth-first traversal over hyperedges, and the node/edge graph
//! projection used for rendering found paths.
//!
//! Extraction (LLM-assisted construction) and reasoning orchestration live
//! in the `noema_extraction` crate; this crate has no oracle dependencies.

pub mod projection;
pub mod store;
pub mod traversal;
pub mod types;

pub use projection::{project, GraphData, GraphEdge, GraphNode, NodeKind};
pub use store::{cosine_distance, ConceptStore, HyperEdgeStore, MemoryStore};
pub use traversal::{find_paths, TraversalConfig};
pub use types::*;
