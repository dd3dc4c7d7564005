//! Connection Routing
//!
//! The kind of an edge is never stored. It is derived from the source's
//! audibility and the capabilities of the destination each time the edge is
//! (re)built:
//!
//! | destination            | audible source | non-audible source          |
//! |------------------------|----------------|-----------------------------|
//! | has audio input        | audio chain    | scaler ⇢ primary parameter  |
//! | frequency target only  | scaler ⇢ freq  | scaler ⇢ freq               |
//! | neither                | unsupported    | unsupported                 |
//!
//! A node is linked to the master bus exactly when it is audible and has no
//! outgoing edges. Every mutation here re-evaluates that rule for the nodes
//! it touches.

use crate::error::GraphError;
use crate::graph::AudioGraph;
use crate::host::{AudioHost, Endpoint, PrimitiveSpec};
use crate::node::{resolve_route, AudioSink, NodeId, NodeKind, Route};
use tracing::debug;

impl<H: AudioHost> AudioGraph<H> {
    /// Create an edge from `from` to `to`
    ///
    /// Self-loops and existing edges are accepted without change.
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        let source = self.node(from)?;
        let dest = self.node(to)?;
        if from == to || source.has_edge_to(to) {
            debug!(%from, %to, "connect ignored");
            return Ok(());
        }
        let output = source.output();
        let route =
            resolve_route(source.routes_audio(), dest).ok_or(GraphError::UnsupportedRouting { from, to })?;

        let scaler = match route {
            Route::Direct(input) => {
                self.host.connect(output, Endpoint::Input(input));
                None
            }
            Route::Modulate { target, param, .. } => {
                let depth = self.config.modulation.for_param(param);
                let scaler = self.host.create(PrimitiveSpec::Gain { gain: depth });
                self.host.connect(output, Endpoint::Input(scaler));
                self.host.connect(scaler, Endpoint::Param(target));
                Some(scaler)
            }
        };

        let source = self
            .registry
            .get_mut(from)
            .ok_or(GraphError::UnknownNode(from))?;
        source.outgoing.insert(to);
        if let Some(scaler) = scaler {
            source.modulators.insert(to, scaler);
        }
        debug!(%from, %to, kind = ?route.kind(), "connected");

        self.relink_master(from);
        self.relink_master(to);
        Ok(())
    }

    /// Remove the edge from `from` to `to`, discarding its scaler if any
    pub fn disconnect(&mut self, from: NodeId, to: NodeId) -> Result<(), GraphError> {
        let input = self.registry.get(to).and_then(AudioSink::audio_input);
        let source = self
            .registry
            .get_mut(from)
            .ok_or(GraphError::UnknownNode(from))?;
        if !source.outgoing.remove(&to) {
            return Err(GraphError::StaleEdge { from, to });
        }
        let output = source.output;
        match source.modulators.remove(&to) {
            Some(scaler) => self.host.release(scaler),
            None => {
                if let Some(input) = input {
                    self.host.disconnect(output, Endpoint::Input(input));
                }
            }
        }
        debug!(%from, %to, "disconnected");

        self.relink_master(from);
        Ok(())
    }

    /// Change whether a node contributes raw audio
    ///
    /// Every outgoing edge of a generator is rebuilt under the new flag, so
    /// the set of targets is unchanged while their physical kind may flip.
    /// A processor's edges always carry audio, so for processors only the
    /// master-bus membership follows the flag.
    pub fn set_audible(&mut self, id: NodeId, audible: bool) -> Result<(), GraphError> {
        let node = self.node(id)?;
        if node.audible() == audible {
            return Ok(());
        }
        if node.kind() == NodeKind::Processor {
            if let Some(node) = self.registry.get_mut(id) {
                node.audible = audible;
            }
            debug!(%id, audible, "processor audibility changed");
            self.relink_master(id);
            return Ok(());
        }
        let targets: Vec<NodeId> = node.outgoing().collect();
        for &to in &targets {
            self.disconnect(id, to)?;
        }
        if let Some(node) = self.registry.get_mut(id) {
            node.audible = audible;
        }
        for to in targets {
            if let Err(err) = self.connect(id, to) {
                debug!(%id, %to, %err, "edge dropped on audibility change");
            }
        }
        debug!(%id, audible, "audibility changed");
        self.relink_master(id);
        Ok(())
    }

    /// Wire or unwire `id` to the master bus so that it is linked exactly
    /// when it is audible with no outgoing edges
    pub(crate) fn relink_master(&mut self, id: NodeId) {
        let Some(node) = self.registry.get_mut(id) else {
            return;
        };
        let wanted = node.wants_master_link();
        if wanted == node.master_linked {
            return;
        }
        let master = Endpoint::Input(self.master);
        if wanted {
            self.host.connect(node.output, master);
        } else {
            self.host.disconnect(node.output, master);
        }
        node.master_linked = wanted;
        debug!(%id, linked = wanted, "master link");
    }
}
