//! Error type for `atrium-tree` operations.

use thiserror::Error;

use crate::node_id::NodeId;

#[derive(Debug, Error)]
pub enum TreeError {
    #[error("node {0} does not exist or is stale")]
    UnknownNode(NodeId),
    #[error("cannot reparent {0} under itself or one of its own descendants")]
    CyclicReparent(NodeId),
    #[error("node {0} is not a Player and has no character to assign")]
    NotAPlayer(NodeId),
}
