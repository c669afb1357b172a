//! Graph projection of traversal paths for rendering.
//!
//! Every distinct hyperedge across the found paths becomes one "context"
//! node, every distinct member concept becomes one "concept" node, and each
//! membership becomes a visual edge labeled with its role. Deduplication is
//! by stable id, so a hyperedge appearing in several paths collapses to one
//! visual element. The output is a plain node/edge structure suitable for
//! direct rendering by any graph-visualization front end.

use std::collections::HashSet;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::store::{ConceptStore, HyperEdgeStore};
use crate::types::HyperEdgeId;

/// Maximum label length for hyperedge nodes before truncation.
const LABEL_MAX_CHARS: usize = 30;

/// Node class in the projected graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A canonical concept.
    Concept,
    /// A hyperedge ("context") node.
    Hyperedge,
}

/// A node in the projected graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    /// Stable id: `c<concept_id>` or `h<edge_id>`.
    pub id: String,
    /// Display label (concept name, or truncated edge description).
    pub label: String,
    /// Node class.
    #[serde(rename = "type")]
    pub kind: NodeKind,
}

/// A visual edge from a concept node to the hyperedge node it belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Stable id: `h<edge_id>_c<concept_id>`.
    pub id: String,
    /// Source node id (the concept).
    pub source: String,
    /// Target node id (the hyperedge).
    pub target: String,
    /// Membership role label.
    pub label: String,
}

/// A renderable projection of one or more traversal paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphData {
    /// Deduplicated nodes.
    pub nodes: Vec<GraphNode>,
    /// Deduplicated membership edges.
    pub edges: Vec<GraphEdge>,
}

impl GraphData {
    /// Count of nodes with the given kind.
    pub fn count_kind(&self, kind: NodeKind) -> usize {
        self.nodes.iter().filter(|n| n.kind == kind).count()
    }
}

fn truncate_label(description: &str) -> String {
    if description.chars().count() > LABEL_MAX_CHARS {
        let short: String = description.chars().take(LABEL_MAX_CHARS).collect();
        format!("{}..", short)
    } else {
        description.to_string()
    }
}

/// Project the given paths into a deduplicated node/edge graph.
///
/// Hyperedge ids that no longer resolve in the store are skipped; member
/// concepts that cannot be fetched fall back to an id-based label.
pub fn project(
    concepts: &dyn ConceptStore,
    edges: &dyn HyperEdgeStore,
    paths: &[Vec<HyperEdgeId>],
) -> Result<GraphData> {
    let mut graph = GraphData::default();
    let mut seen_nodes: HashSet<String> = HashSet::new();
    let mut seen_edges: HashSet<String> = HashSet::new();

    for path in paths {
        for edge_id in path {
            let edge = match edges.get(*edge_id)? {
                Some(edge) => edge,
                None => continue,
            };

            let edge_node_id = format!("h{}", edge.id);
            if seen_nodes.insert(edge_node_id.clone()) {
                graph.nodes.push(GraphNode {
                    id: edge_node_id.clone(),
                    label: truncate_label(&edge.description),
                    kind: NodeKind::Hyperedge,
                });
            }

            for member in &edge.members {
                let concept_node_id = format!("c{}", member.concept_id);
                if seen_nodes.insert(concept_node_id.clone()) {
                    let label = concepts
                        .get(member.concept_id)?
                        .map(|c| c.name)
                        .unwrap_or_else(|| format!("concept {}", member.concept_id));
                    graph.nodes.push(GraphNode {
                        id: concept_node_id.clone(),
                        label,
                        kind: NodeKind::Concept,
                    });
                }

                let link_id = format!("h{}_c{}", edge.id, member.concept_id);
                if seen_edges.insert(link_id.clone()) {
                    graph.edges.push(GraphEdge {
                        id: link_id,
                        source: concept_node_id,
                        target: edge_node_id.clone(),
                        label: member.role.as_str().to_string(),
                    });
                }
            }
        }
    }

    Ok(graph)
}
