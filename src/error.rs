//! Error types for graph and host operations

use crate::node::{NodeId, NodeKind};
use thiserror::Error;

/// Failures reported by an [`AudioHost`](crate::host::AudioHost) implementation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum HostError {
    /// The host audio context could not be created (no device, no permission)
    #[error("audio host unavailable: {0}")]
    Unavailable(String),

    /// The host exists but refused to start running (e.g. no user gesture yet)
    #[error("audio host is suspended: {0}")]
    Suspended(String),
}

/// Error types for graph operations
///
/// The [`Engine`](crate::engine::Engine) façade treats every variant except
/// `HostUnavailable` as a silent no-op, because the surrounding UI may race
/// with deletions.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GraphError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("node {0} already exists")]
    DuplicateNode(NodeId),

    #[error("node {to} accepts neither audio nor frequency modulation from {from}")]
    UnsupportedRouting { from: NodeId, to: NodeId },

    #[error("no edge from {from} to {to}")]
    StaleEdge { from: NodeId, to: NodeId },

    #[error("node {id} is a {actual:?}, cannot become a {requested:?}")]
    KindMismatch {
        id: NodeId,
        actual: NodeKind,
        requested: NodeKind,
    },

    #[error("unknown subtype '{0}'")]
    UnknownSubtype(String),

    #[error("node {id} has no parameter '{name}'")]
    UnknownParam { id: NodeId, name: String },

    #[error("engine is not initialized")]
    NotInitialized,

    #[error(transparent)]
    HostUnavailable(#[from] HostError),

    #[error("invalid patch document: {0}")]
    Document(String),
}

impl From<serde_json::Error> for GraphError {
    fn from(err: serde_json::Error) -> Self {
        GraphError::Document(err.to_string())
    }
}
