//! Top-level ComfyUI workflow document.
//!
//! Wraps the builder's nodes and links with the bookkeeping fields the
//! ComfyUI front end expects, and verifies the graph invariants before the
//! document leaves this crate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::graph::{GraphLink, GraphNode};
use crate::types::{LinkId, NodeId};

/// Workflow schema version written to every document.
pub const WORKFLOW_SCHEMA_VERSION: f64 = 0.4;

/// A ComfyUI UI-format workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub id: String,
    pub revision: u32,
    pub last_node_id: NodeId,
    pub last_link_id: LinkId,
    pub nodes: Vec<GraphNode>,
    pub links: Vec<GraphLink>,
    #[serde(default)]
    pub groups: Vec<serde_json::Value>,
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub extra: serde_json::Map<String, serde_json::Value>,
    pub version: f64,
}

/// Assemble a document from built nodes and links.
///
/// Each call generates a fresh UUID v4 identifier. The result is verified
/// with [`WorkflowDocument::verify`] before it is returned.
pub fn assemble(nodes: Vec<GraphNode>, links: Vec<GraphLink>) -> Result<WorkflowDocument, CoreError> {
    let last_node_id = nodes.iter().map(|n| n.id).max().ok_or_else(|| {
        CoreError::Validation("Workflow must contain at least one node".to_string())
    })?;
    let last_link_id = links.iter().map(|l| l.id).max().unwrap_or(0);

    let document = WorkflowDocument {
        id: uuid::Uuid::new_v4().to_string(),
        revision: 0,
        last_node_id,
        last_link_id,
        nodes,
        links,
        groups: Vec::new(),
        config: serde_json::Map::new(),
        extra: serde_json::Map::new(),
        version: WORKFLOW_SCHEMA_VERSION,
    };
    document.verify()?;
    Ok(document)
}

impl WorkflowDocument {
    /// Check the structural invariants of the document.
    ///
    /// - `last_node_id` / `last_link_id` equal the maximum ids present
    /// - node and link ids are unique
    /// - every link's endpoints and slots exist and carry the link's type
    /// - both endpoints record the link, and no slot records a stray link
    pub fn verify(&self) -> Result<(), CoreError> {
        let max_node = self.nodes.iter().map(|n| n.id).max().unwrap_or(0);
        if self.last_node_id != max_node {
            return Err(CoreError::Validation(format!(
                "last_node_id is {} but the highest node id is {max_node}",
                self.last_node_id
            )));
        }
        let max_link = self.links.iter().map(|l| l.id).max().unwrap_or(0);
        if self.last_link_id != max_link {
            return Err(CoreError::Validation(format!(
                "last_link_id is {} but the highest link id is {max_link}",
                self.last_link_id
            )));
        }

        let mut node_ids = HashSet::new();
        for node in &self.nodes {
            if !node_ids.insert(node.id) {
                return Err(CoreError::Validation(format!(
                    "Duplicate node id {}",
                    node.id
                )));
            }
        }
        let mut link_ids = HashSet::new();
        for link in &self.links {
            if !link_ids.insert(link.id) {
                return Err(CoreError::Validation(format!(
                    "Duplicate link id {}",
                    link.id
                )));
            }
        }

        for link in &self.links {
            self.verify_link(link)?;
        }

        // Reverse direction: every id recorded on a slot must be a real link
        // that points back at that slot.
        for node in &self.nodes {
            for (slot, input) in node.inputs.iter().enumerate() {
                if let Some(id) = input.link {
                    let ok = self
                        .links
                        .iter()
                        .any(|l| l.id == id && l.target_node == node.id && l.target_slot == slot);
                    if !ok {
                        return Err(CoreError::InconsistentLink {
                            link_id: id,
                            reason: format!("recorded on input {slot} of node {}", node.id),
                        });
                    }
                }
            }
            for (slot, output) in node.outputs.iter().enumerate() {
                for &id in &output.links {
                    let ok = self
                        .links
                        .iter()
                        .any(|l| l.id == id && l.source_node == node.id && l.source_slot == slot);
                    if !ok {
                        return Err(CoreError::InconsistentLink {
                            link_id: id,
                            reason: format!("recorded on output {slot} of node {}", node.id),
                        });
                    }
                }
            }
        }

        Ok(())
    }

    /// Look up a node by id.
    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes of the given ComfyUI class type, in creation order.
    pub fn nodes_of_type<'a>(&'a self, node_type: &'a str) -> impl Iterator<Item = &'a GraphNode> {
        self.nodes.iter().filter(move |n| n.node_type == node_type)
    }

    fn verify_link(&self, link: &GraphLink) -> Result<(), CoreError> {
        let inconsistent = |reason: String| CoreError::InconsistentLink {
            link_id: link.id,
            reason,
        };

        let source = self.node(link.source_node).ok_or_else(|| {
            inconsistent(format!("source node {} does not exist", link.source_node))
        })?;
        let target = self.node(link.target_node).ok_or_else(|| {
            inconsistent(format!("target node {} does not exist", link.target_node))
        })?;

        let output = source.outputs.get(link.source_slot).ok_or_else(|| {
            inconsistent(format!(
                "node {} has no output slot {}",
                source.id, link.source_slot
            ))
        })?;
        let input = target.inputs.get(link.target_slot).ok_or_else(|| {
            inconsistent(format!(
                "node {} has no input slot {}",
                target.id, link.target_slot
            ))
        })?;

        if output.slot_type != link.data_type || input.slot_type != link.data_type {
            return Err(inconsistent(format!(
                "{} link connects {} output to {} input",
                link.data_type, output.slot_type, input.slot_type
            )));
        }
        if !output.links.contains(&link.id) {
            return Err(inconsistent(format!(
                "missing from output {} of node {}",
                link.source_slot, source.id
            )));
        }
        if input.link != Some(link.id) {
            return Err(inconsistent(format!(
                "missing from input {} of node {}",
                link.target_slot, target.id
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
