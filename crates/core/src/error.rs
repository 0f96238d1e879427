use crate::types::{LinkId, NodeId};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Node {node_id} has no {direction} slot {slot}")]
    SlotNotFound {
        node_id: NodeId,
        direction: &'static str,
        slot: usize,
    },

    #[error("Link {link_id} is inconsistent: {reason}")]
    InconsistentLink { link_id: LinkId, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}
