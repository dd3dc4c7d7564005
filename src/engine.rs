//! Engine - Core API façade
//!
//! The engine opens the host lazily on the first [`Engine::initialize`] and
//! then forwards every call to the [`AudioGraph`]. Apart from
//! `initialize`/`resume`, calls never fail: a call naming an unknown node,
//! a missing edge or an unsupported route is logged and ignored, because the
//! surrounding UI may race with deletions.

use crate::config::EngineConfig;
use crate::disturbance::DisturbanceSettings;
use crate::document::PatchDocument;
use crate::error::GraphError;
use crate::graph::AudioGraph;
use crate::host::{AudioHost, HostLauncher};
use crate::node::{EdgeKind, NodeId, NodeKind, Subtype};
use tracing::{debug, warn};

/// Core API over a lazily launched host
pub struct Engine<H: AudioHost> {
    config: EngineConfig,
    launcher: HostLauncher<H>,
    graph: Option<AudioGraph<H>>,
    muted: bool,
}

impl<H: AudioHost> Engine<H> {
    pub fn new(config: EngineConfig, launcher: HostLauncher<H>) -> Self {
        Self {
            config,
            launcher,
            graph: None,
            muted: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.graph.is_some()
    }

    pub fn graph(&self) -> Option<&AudioGraph<H>> {
        self.graph.as_ref()
    }

    pub fn graph_mut(&mut self) -> Option<&mut AudioGraph<H>> {
        self.graph.as_mut()
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open and start the host, or restart it if already open
    ///
    /// On failure the engine stays uninitialized and a later call retries.
    pub fn initialize(&mut self) -> Result<(), GraphError> {
        if let Some(graph) = self.graph.as_mut() {
            return graph.host_mut().resume().map_err(|err| {
                warn!(%err, "host resume failed");
                GraphError::from(err)
            });
        }

        let launched = (self.launcher)(self.config.sample_rate).and_then(|mut host| {
            host.resume()?;
            Ok(host)
        });
        let host = launched.map_err(|err| {
            warn!(%err, "host launch failed");
            GraphError::from(err)
        })?;

        let mut graph = AudioGraph::new(host, self.config.clone());
        if self.muted {
            graph.set_master_mute(true);
        }
        self.graph = Some(graph);
        debug!("engine initialized");
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), GraphError> {
        self.initialize()
    }

    /// Mute state is remembered across initialization
    pub fn set_master_mute(&mut self, muted: bool) {
        self.muted = muted;
        if let Some(graph) = self.graph.as_mut() {
            graph.set_master_mute(muted);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    pub fn create_generator(
        &mut self,
        id: impl Into<NodeId>,
        subtype: &str,
        frequency: f64,
        gain: f64,
        audible: bool,
    ) {
        let id = id.into();
        self.dispatch("create_generator", |graph| match subtype.parse::<Subtype>()? {
            Subtype::Generator(subtype) => {
                graph.create_generator(id, subtype, frequency, gain, audible)
            }
            Subtype::Processor(_) => Err(GraphError::KindMismatch {
                id,
                actual: NodeKind::Processor,
                requested: NodeKind::Generator,
            }),
        });
    }

    pub fn create_processor(&mut self, id: impl Into<NodeId>, subtype: &str) {
        let id = id.into();
        self.dispatch("create_processor", |graph| match subtype.parse::<Subtype>()? {
            Subtype::Processor(subtype) => graph.create_processor(id, subtype),
            Subtype::Generator(_) => Err(GraphError::KindMismatch {
                id,
                actual: NodeKind::Generator,
                requested: NodeKind::Processor,
            }),
        });
    }

    pub fn remove_node(&mut self, id: impl Into<NodeId>) {
        let id = id.into();
        self.dispatch("remove_node", |graph| graph.remove_node(id));
    }

    pub fn set_subtype(&mut self, id: impl Into<NodeId>, subtype: &str) {
        let id = id.into();
        self.dispatch("set_subtype", |graph| {
            let subtype = subtype.parse::<Subtype>()?;
            graph.set_subtype(id, subtype)
        });
    }

    pub fn set_audible(&mut self, id: impl Into<NodeId>, audible: bool) {
        let id = id.into();
        self.dispatch("set_audible", |graph| graph.set_audible(id, audible));
    }

    pub fn set_param(&mut self, id: impl Into<NodeId>, name: &str, value: f64) {
        let id = id.into();
        self.dispatch("set_param", |graph| graph.set_param(id, name, value));
    }

    // =========================================================================
    // Connections
    // =========================================================================

    pub fn connect(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) {
        let (from, to) = (from.into(), to.into());
        self.dispatch("connect", |graph| graph.connect(from, to));
    }

    pub fn disconnect(&mut self, from: impl Into<NodeId>, to: impl Into<NodeId>) {
        let (from, to) = (from.into(), to.into());
        self.dispatch("disconnect", |graph| graph.disconnect(from, to));
    }

    // =========================================================================
    // Events
    // =========================================================================

    pub fn trigger_disturbance(
        &mut self,
        id: impl Into<NodeId>,
        velocity: f64,
        pan: f64,
        settings: &DisturbanceSettings,
    ) {
        let id = id.into();
        self.dispatch("trigger_disturbance", |graph| {
            graph.trigger_disturbance(id, velocity, pan, settings)
        });
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Replay a patch document; skipped records are logged
    pub fn load_document(&mut self, document: &PatchDocument) -> Result<(), GraphError> {
        let graph = self.graph.as_mut().ok_or(GraphError::NotInitialized)?;
        for err in graph.load_document(document) {
            debug!(%err, "document record ignored");
        }
        Ok(())
    }

    pub fn load_json(&mut self, json: &str) -> Result<(), GraphError> {
        let document = PatchDocument::from_json(json)?;
        self.load_document(&document)
    }

    pub fn document(&self) -> Option<PatchDocument> {
        self.graph.as_ref().map(AudioGraph::document)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn contains(&self, id: impl Into<NodeId>) -> bool {
        let id = id.into();
        self.graph.as_ref().is_some_and(|graph| graph.contains(id))
    }

    pub fn node_count(&self) -> usize {
        self.graph.as_ref().map_or(0, AudioGraph::node_count)
    }

    pub fn is_master_linked(&self, id: impl Into<NodeId>) -> bool {
        let id = id.into();
        self.query(|graph| graph.is_master_linked(id))
            .unwrap_or(false)
    }

    pub fn edge_kind(&self, from: impl Into<NodeId>, to: impl Into<NodeId>) -> Option<EdgeKind> {
        let (from, to) = (from.into(), to.into());
        self.query(|graph| graph.edge_kind(from, to))
    }

    pub fn outgoing(&self, id: impl Into<NodeId>) -> Vec<NodeId> {
        let id = id.into();
        self.query(|graph| graph.outgoing(id)).unwrap_or_default()
    }

    pub fn param_value(&self, id: impl Into<NodeId>, name: &str) -> Option<f64> {
        let id = id.into();
        self.query(|graph| graph.param_value(id, name))
    }

    fn dispatch<T>(
        &mut self,
        op: &'static str,
        f: impl FnOnce(&mut AudioGraph<H>) -> Result<T, GraphError>,
    ) -> Option<T> {
        let Some(graph) = self.graph.as_mut() else {
            debug!(op, "ignored before initialize");
            return None;
        };
        match f(graph) {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(op, %err, "ignored");
                None
            }
        }
    }

    fn query<T>(&self, f: impl FnOnce(&AudioGraph<H>) -> Result<T, GraphError>) -> Option<T> {
        self.graph.as_ref().and_then(|graph| f(graph).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HostError;
    use crate::offline::OfflineHost;

    fn config() -> EngineConfig {
        EngineConfig::new(8000.0)
            .with_seed(2)
            .with_noise_seconds(0.1)
            .with_impulse_seconds(0.05)
    }

    fn engine() -> Engine<OfflineHost> {
        let mut engine = Engine::new(config(), OfflineHost::launcher());
        engine.initialize().unwrap();
        engine
    }

    #[test]
    fn test_calls_before_initialize_are_ignored() {
        let mut engine = Engine::new(config(), OfflineHost::launcher());
        engine.create_generator(1u64, "sine", 440.0, 0.5, true);
        engine.connect(1u64, 2u64);
        assert!(!engine.is_initialized());
        assert_eq!(engine.node_count(), 0);
        assert!(engine.document().is_none());
        assert_eq!(
            engine.load_document(&PatchDocument::new()),
            Err(GraphError::NotInitialized)
        );
    }

    #[test]
    fn test_initialize_resumes_host() {
        let engine = engine();
        assert!(engine.graph().unwrap().host().is_running());
    }

    #[test]
    fn test_failed_launch_retries() {
        let mut attempts = 0;
        let launcher: HostLauncher<OfflineHost> = Box::new(move |sample_rate| {
            attempts += 1;
            if attempts == 1 {
                Err(HostError::Unavailable("no device".into()))
            } else {
                Ok(OfflineHost::new(sample_rate))
            }
        });
        let mut engine = Engine::new(config(), launcher);
        assert!(matches!(
            engine.initialize(),
            Err(GraphError::HostUnavailable(HostError::Unavailable(_)))
        ));
        assert!(!engine.is_initialized());
        engine.resume().unwrap();
        assert!(engine.is_initialized());
    }

    #[test]
    fn test_mute_before_initialize_is_applied() {
        let mut engine = Engine::new(config(), OfflineHost::launcher());
        engine.set_master_mute(true);
        engine.initialize().unwrap();
        assert!(engine.graph().unwrap().is_muted());
    }

    #[test]
    fn test_operations_are_total() {
        let mut engine = engine();
        engine.create_generator(1u64, "sine", 440.0, 0.5, true);
        engine.create_generator(2u64, "reverb", 440.0, 0.5, true);
        engine.create_processor(3u64, "wobble");
        assert_eq!(engine.node_count(), 1);

        engine.disconnect(1u64, 9u64);
        engine.set_param(9u64, "cutoff", 100.0);
        engine.set_param(1u64, "nonsense", 1.0);
        engine.set_subtype(1u64, "lowpass");
        engine.trigger_disturbance(9u64, 1.0, 0.0, &DisturbanceSettings::default());
        assert!(engine.is_master_linked(1u64));
        assert_eq!(engine.edge_kind(1u64, 9u64), None);
        assert!(engine.outgoing(9u64).is_empty());
    }

    #[test]
    fn test_removed_node_calls_are_noops() {
        let mut engine = engine();
        engine.create_generator(1u64, "triangle", 220.0, 0.5, true);
        engine.create_processor(2u64, "delay");
        engine.connect(1u64, 2u64);
        engine.remove_node(2u64);

        engine.connect(1u64, 2u64);
        engine.set_param(2u64, "time", 0.5);
        engine.set_audible(2u64, false);
        engine.remove_node(2u64);
        assert!(!engine.contains(2u64));
        assert!(engine.outgoing(1u64).is_empty());
        assert!(engine.is_master_linked(1u64));
        assert_eq!(engine.param_value(2u64, "time"), None);
    }

    #[test]
    fn test_json_roundtrip_through_engine() {
        let mut engine = engine();
        engine.create_generator(1u64, "sample-hold", 5.0, 0.5, false);
        engine.create_processor(2u64, "bandpass");
        engine.connect(1u64, 2u64);
        let json = engine.document().unwrap().to_json().unwrap();

        let mut other = self::engine();
        other.load_json(&json).unwrap();
        assert_eq!(other.node_count(), 2);
        assert_eq!(
            other.edge_kind(1u64, 2u64),
            Some(EdgeKind::ParameterModulation)
        );
    }
}
