//! Patch Documents
//!
//! Serializable snapshot of a patch in the shape collaborators exchange:
//! a node list plus a connection list. Display attributes (positions,
//! colors, labels) are carried opaquely and never interpreted.
//!
//! ```json
//! {
//!   "nodes": [
//!     { "id": 1, "kind": "generator", "subtype": "sine",
//!       "frequency": 440.0, "gain": 0.5, "audible": true, "x": 120 }
//!   ],
//!   "connections": [ { "fromId": 1, "toId": 2 } ]
//! }
//! ```

use crate::error::GraphError;
use crate::graph::{AudioGraph, DEFAULT_FREQUENCY, DEFAULT_GAIN};
use crate::host::AudioHost;
use crate::node::{NodeId, NodeKind, Subtype};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

/// Serializable patch document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatchDocument {
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

/// One node of a patch document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    pub kind: NodeKind,
    pub subtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gain: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audible: Option<bool>,
    /// Collaborator attributes the graph does not interpret
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl NodeRecord {
    pub fn generator(id: impl Into<NodeId>, subtype: &str, frequency: f64, gain: f64, audible: bool) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Generator,
            subtype: subtype.to_string(),
            frequency: Some(frequency),
            gain: Some(gain),
            audible: Some(audible),
            extra: Map::new(),
        }
    }

    pub fn processor(id: impl Into<NodeId>, subtype: &str) -> Self {
        Self {
            id: id.into(),
            kind: NodeKind::Processor,
            subtype: subtype.to_string(),
            frequency: None,
            gain: None,
            audible: None,
            extra: Map::new(),
        }
    }
}

/// One directed edge of a patch document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionRecord {
    pub from_id: NodeId,
    pub to_id: NodeId,
}

impl PatchDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn with_node(mut self, node: NodeRecord) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_connection(mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Self {
        self.connections.push(ConnectionRecord {
            from_id: from.into(),
            to_id: to.into(),
        });
        self
    }
}

impl<H: AudioHost> AudioGraph<H> {
    /// Replay a document: every node first, then every connection
    ///
    /// Records that cannot be applied are skipped; their errors are returned
    /// in document order.
    pub fn load_document(&mut self, document: &PatchDocument) -> Vec<GraphError> {
        let mut skipped = Vec::new();
        for record in &document.nodes {
            if let Err(err) = self.create_from_record(record) {
                debug!(id = %record.id, %err, "node record skipped");
                skipped.push(err);
            }
        }
        for edge in &document.connections {
            if let Err(err) = self.connect(edge.from_id, edge.to_id) {
                debug!(from = %edge.from_id, to = %edge.to_id, %err, "connection record skipped");
                skipped.push(err);
            }
        }
        skipped
    }

    fn create_from_record(&mut self, record: &NodeRecord) -> Result<(), GraphError> {
        let subtype: Subtype = record.subtype.parse()?;
        if subtype.kind() != record.kind {
            return Err(GraphError::KindMismatch {
                id: record.id,
                actual: record.kind,
                requested: subtype.kind(),
            });
        }
        match subtype {
            Subtype::Generator(subtype) => self.create_generator(
                record.id,
                subtype,
                record.frequency.unwrap_or(DEFAULT_FREQUENCY),
                record.gain.unwrap_or(DEFAULT_GAIN),
                record.audible.unwrap_or(true),
            ),
            Subtype::Processor(subtype) => {
                self.create_processor(record.id, subtype)?;
                if record.audible == Some(false) {
                    self.set_audible(record.id, false)?;
                }
                Ok(())
            }
        }
    }

    /// Snapshot the live graph
    pub fn document(&self) -> PatchDocument {
        let mut document = PatchDocument::new();
        for node in self.nodes() {
            let id = node.id();
            let record = match node.kind() {
                NodeKind::Generator => NodeRecord::generator(
                    id,
                    node.subtype().name(),
                    self.param_value(id, "frequency").unwrap_or(DEFAULT_FREQUENCY),
                    self.param_value(id, "gain").unwrap_or(DEFAULT_GAIN),
                    node.audible(),
                ),
                NodeKind::Processor => {
                    let mut record = NodeRecord::processor(id, node.subtype().name());
                    // Processors are audible unless told otherwise
                    if !node.audible() {
                        record.audible = Some(false);
                    }
                    record
                }
            };
            document.nodes.push(record);
            for to in node.outgoing() {
                document.connections.push(ConnectionRecord { from_id: id, to_id: to });
            }
        }
        document
    }
}
