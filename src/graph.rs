//! Routing Graph
//!
//! [`AudioGraph`] is the single owner of the host context, the node registry,
//! the node factory and the master bus. Structural mutations take
//! `&mut self`; there are no locks and no shared handles. Routing lives in
//! [`routing`](crate::routing), parameter updates in
//! [`update`](crate::update) and one-shot events in
//! [`disturbance`](crate::disturbance).
//!
//! ```text
//! node.output ──→ node.input ──→ ... ──→ [master gain] ──→ destination
//!      └──→ [scaler] ⇢ param
//! ```

use crate::config::EngineConfig;
use crate::error::GraphError;
use crate::factory::{NodeFactory, NodeSpec};
use crate::host::{AudioHost, AudioParamKind, Endpoint, ParamHandle, PrimitiveId, PrimitiveSpec};
use crate::node::{
    derive_edge_kind, EdgeKind, GeneratorType, Node, NodeId, NodeKind, ParamSlot, ParameterHost,
    ProcessorType, Subtype,
};
use crate::registry::NodeRegistry;
use crate::update::Transition;
use tracing::debug;

/// Frequency used when a generator is created without one, Hz
pub const DEFAULT_FREQUENCY: f64 = 440.0;

/// Gain used when a generator is created without one
pub const DEFAULT_GAIN: f64 = 0.5;

/// Dynamic routing graph over a host audio context
pub struct AudioGraph<H: AudioHost> {
    pub(crate) host: H,
    pub(crate) registry: NodeRegistry,
    pub(crate) factory: NodeFactory,
    pub(crate) master: PrimitiveId,
    pub(crate) muted: bool,
    pub(crate) config: EngineConfig,
}

impl<H: AudioHost> AudioGraph<H> {
    /// Build the master bus on `host` and generate the shared synthesis tables
    pub fn new(mut host: H, config: EngineConfig) -> Self {
        let master = host.create(PrimitiveSpec::Gain {
            gain: config.master_gain,
        });
        let destination = host.destination();
        host.connect(master, Endpoint::Input(destination));
        let factory = NodeFactory::new(&config);
        debug!(sample_rate = host.sample_rate(), "audio graph ready");
        Self {
            host,
            registry: NodeRegistry::new(),
            factory,
            master,
            muted: false,
            config,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The master bus gain primitive
    pub fn master(&self) -> PrimitiveId {
        self.master
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Fade the master bus to silence or back to its configured level
    pub fn set_master_mute(&mut self, muted: bool) {
        self.muted = muted;
        let target = if muted { 0.0 } else { self.config.master_gain };
        let gain = ParamHandle::new(self.master, AudioParamKind::Gain);
        self.host
            .smooth_to(gain, target, self.config.smoothing_time_constant);
        debug!(muted, "master mute");
    }

    pub fn create_generator(
        &mut self,
        id: NodeId,
        subtype: GeneratorType,
        frequency: f64,
        gain: f64,
        audible: bool,
    ) -> Result<(), GraphError> {
        self.create(
            id,
            NodeSpec::Generator {
                subtype,
                frequency,
                gain,
                audible,
            },
        )
    }

    pub fn create_processor(&mut self, id: NodeId, subtype: ProcessorType) -> Result<(), GraphError> {
        self.create(id, NodeSpec::Processor { subtype })
    }

    /// Materialize a node and link it to the master bus if it is audible
    pub fn create(&mut self, id: NodeId, spec: NodeSpec) -> Result<(), GraphError> {
        if self.registry.contains(id) {
            return Err(GraphError::DuplicateNode(id));
        }
        let node = self.factory.build(&mut self.host, id, spec);
        debug!(%id, subtype = %node.subtype(), "node created");
        self.registry.insert(node);
        self.relink_master(id);
        Ok(())
    }

    /// Sever every edge of `id`, stop its voices and release its primitives
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), GraphError> {
        let outgoing = self.outgoing(id)?;
        for to in outgoing {
            self.disconnect(id, to)?;
        }
        for from in self.registry.incoming(id) {
            self.disconnect(from, id)?;
        }

        let node = self
            .registry
            .remove(id)
            .ok_or(GraphError::UnknownNode(id))?;
        if node.master_linked {
            self.host
                .disconnect(node.output, Endpoint::Input(self.master));
        }
        let now = self.host.current_time();
        for &voice in &node.voices {
            self.host.stop(voice, now);
        }
        for &primitive in &node.primitives {
            self.host.release(primitive);
        }
        debug!(%id, "node removed");
        Ok(())
    }

    /// Swap a node's subtype in place
    ///
    /// The node is rebuilt under the same id. Frequency, gain, audibility
    /// and all incoming and outgoing edges carry over. Other parameters carry
    /// over only where both subtypes give them the same units (see
    /// [`Subtype::shares_param`]). Generators cannot become processors.
    pub fn set_subtype(&mut self, id: NodeId, subtype: Subtype) -> Result<(), GraphError> {
        let node = self.node(id)?;
        if node.subtype() == subtype {
            return Ok(());
        }
        if node.kind() != subtype.kind() {
            return Err(GraphError::KindMismatch {
                id,
                actual: node.kind(),
                requested: subtype.kind(),
            });
        }

        let previous = node.subtype();
        let audible = node.audible();
        let outgoing: Vec<NodeId> = node.outgoing().collect();
        let incoming = self.registry.incoming(id);
        let params: Vec<(&'static str, f64)> = node
            .param_names()
            .into_iter()
            .filter_map(|name| self.param_value(id, name).ok().map(|value| (name, value)))
            .collect();
        let lookup = |name: &str| {
            params
                .iter()
                .find(|(n, _)| *n == name)
                .map(|&(_, value)| value)
        };

        let spec = match subtype {
            Subtype::Generator(subtype) => NodeSpec::Generator {
                subtype,
                frequency: lookup("frequency").unwrap_or(DEFAULT_FREQUENCY),
                gain: lookup("gain").unwrap_or(DEFAULT_GAIN),
                audible,
            },
            Subtype::Processor(subtype) => NodeSpec::Processor { subtype },
        };

        self.remove_node(id)?;
        self.create(id, spec)?;
        if subtype.kind() == NodeKind::Processor && !audible {
            self.set_audible(id, false)?;
        }

        let carried: Vec<(&'static str, f64)> = {
            let rebuilt = self.node(id)?;
            params
                .iter()
                .filter(|(name, _)| !matches!(*name, "frequency" | "gain"))
                .filter(|(name, _)| previous.shares_param(subtype, name))
                .filter(|(name, _)| rebuilt.param(name).is_some())
                .copied()
                .collect()
        };
        for (name, value) in carried {
            self.apply_param(id, name, value, Transition::Immediate)?;
        }

        for to in outgoing {
            if let Err(err) = self.connect(id, to) {
                debug!(%id, %to, %err, "edge dropped on subtype change");
            }
        }
        for from in incoming {
            if let Err(err) = self.connect(from, id) {
                debug!(%from, %id, %err, "edge dropped on subtype change");
            }
        }
        debug!(%id, %subtype, "subtype changed");
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, GraphError> {
        self.registry.get(id).ok_or(GraphError::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.registry.contains(id)
    }

    pub fn node_count(&self) -> usize {
        self.registry.len()
    }

    /// Live node ids in ascending order
    pub fn ids(&self) -> Vec<NodeId> {
        self.registry.ids()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.registry.iter()
    }

    pub fn is_master_linked(&self, id: NodeId) -> Result<bool, GraphError> {
        Ok(self.node(id)?.is_master_linked())
    }

    /// Physical kind of an existing edge
    pub fn edge_kind(&self, from: NodeId, to: NodeId) -> Result<EdgeKind, GraphError> {
        let source = self.node(from)?;
        let dest = self.node(to)?;
        if !source.has_edge_to(to) {
            return Err(GraphError::StaleEdge { from, to });
        }
        derive_edge_kind(source.routes_audio(), dest).ok_or(GraphError::UnsupportedRouting { from, to })
    }

    pub fn outgoing(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        Ok(self.node(id)?.outgoing().collect())
    }

    pub fn incoming(&self, id: NodeId) -> Result<Vec<NodeId>, GraphError> {
        self.node(id)?;
        Ok(self.registry.incoming(id))
    }

    /// Current value of a named parameter
    ///
    /// Curve-backed parameters report their curve setting, not the drive
    /// gain that modulation acts on.
    pub fn param_value(&self, id: NodeId, name: &str) -> Result<f64, GraphError> {
        let node = self.node(id)?;
        if let Some(shaper) = node.shaper().filter(|s| s.param == name) {
            return Ok(shaper.setting);
        }
        let unknown = || GraphError::UnknownParam {
            id,
            name: name.to_string(),
        };
        match node.param(name) {
            Some(ParamSlot::Literal(value)) => Ok(*value),
            Some(ParamSlot::Automatable(handle)) => self.host.param_value(*handle).ok_or_else(unknown),
            None => Err(unknown()),
        }
    }

    /// Check the master-link invariant against the registry and the host
    /// wiring, returning the first node that violates it
    pub fn master_link_violation(&self) -> Option<NodeId>
    where
        H: WiringInspect,
    {
        self.registry
            .iter()
            .find(|node| {
                let wired = self
                    .host
                    .has_wire(node.output(), Endpoint::Input(self.master));
                node.is_master_linked() != node.wants_master_link() || wired != node.wants_master_link()
            })
            .map(Node::id)
    }
}

/// Hosts that can report their wiring back
pub trait WiringInspect {
    fn has_wire(&self, from: PrimitiveId, to: Endpoint) -> bool;
}

impl WiringInspect for crate::offline::OfflineHost {
    fn has_wire(&self, from: PrimitiveId, to: Endpoint) -> bool {
        self.is_wired(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::AudioSink;
    use crate::offline::OfflineHost;
    use approx::assert_abs_diff_eq;

    fn graph() -> AudioGraph<OfflineHost> {
        let config = EngineConfig::new(8000.0)
            .with_seed(7)
            .with_noise_seconds(0.1)
            .with_impulse_seconds(0.05);
        AudioGraph::new(OfflineHost::new(8000.0), config)
    }

    #[test]
    fn test_master_bus_reaches_destination() {
        let g = graph();
        let destination = g.host().destination();
        assert!(g.host().is_wired(g.master(), Endpoint::Input(destination)));
    }

    #[test]
    fn test_audible_generator_is_master_linked() {
        let mut g = graph();
        g.create_generator(NodeId(1), GeneratorType::Sine, 440.0, 0.5, true)
            .unwrap();
        g.create_generator(NodeId(2), GeneratorType::Sine, 2.0, 0.5, false)
            .unwrap();
        assert!(g.is_master_linked(NodeId(1)).unwrap());
        assert!(!g.is_master_linked(NodeId(2)).unwrap());
        assert_eq!(g.master_link_violation(), None);
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut g = graph();
        g.create_processor(NodeId(1), ProcessorType::Reverb).unwrap();
        assert_eq!(
            g.create_processor(NodeId(1), ProcessorType::Delay),
            Err(GraphError::DuplicateNode(NodeId(1)))
        );
        assert_eq!(g.node_count(), 1);
    }

    #[test]
    fn test_remove_releases_everything() {
        let mut g = graph();
        let baseline = g.host().primitive_count();
        g.create_processor(NodeId(1), ProcessorType::Phaser).unwrap();
        g.create_generator(NodeId(2), GeneratorType::Noise, 440.0, 0.5, true)
            .unwrap();
        g.connect(NodeId(2), NodeId(1)).unwrap();
        g.remove_node(NodeId(1)).unwrap();
        g.remove_node(NodeId(2)).unwrap();
        assert_eq!(g.host().primitive_count(), baseline);
        assert_eq!(g.host().wire_count(), 1);
        assert_eq!(g.node_count(), 0);
    }

    #[test]
    fn test_remove_relinks_upstream() {
        let mut g = graph();
        g.create_generator(NodeId(1), GeneratorType::Sine, 440.0, 0.5, true)
            .unwrap();
        g.create_processor(NodeId(2), ProcessorType::Lowpass).unwrap();
        g.connect(NodeId(1), NodeId(2)).unwrap();
        assert!(!g.is_master_linked(NodeId(1)).unwrap());
        g.remove_node(NodeId(2)).unwrap();
        assert!(g.is_master_linked(NodeId(1)).unwrap());
        assert_eq!(g.master_link_violation(), None);
    }

    #[test]
    fn test_removed_node_is_unknown() {
        let mut g = graph();
        g.create_processor(NodeId(1), ProcessorType::Delay).unwrap();
        g.remove_node(NodeId(1)).unwrap();
        assert_eq!(g.remove_node(NodeId(1)), Err(GraphError::UnknownNode(NodeId(1))));
        assert!(g.param_value(NodeId(1), "time").is_err());
        assert!(!g.contains(NodeId(1)));
    }

    #[test]
    fn test_set_subtype_preserves_frequency_gain_and_edges() {
        let mut g = graph();
        g.create_generator(NodeId(1), GeneratorType::Sine, 330.0, 0.25, true)
            .unwrap();
        g.create_processor(NodeId(2), ProcessorType::Lowpass).unwrap();
        g.create_generator(NodeId(3), GeneratorType::Triangle, 3.0, 0.5, false)
            .unwrap();
        g.connect(NodeId(1), NodeId(2)).unwrap();
        g.connect(NodeId(3), NodeId(1)).unwrap();

        g.set_subtype(NodeId(1), Subtype::Generator(GeneratorType::Sawtooth))
            .unwrap();

        assert_eq!(
            g.node(NodeId(1)).unwrap().subtype(),
            Subtype::Generator(GeneratorType::Sawtooth)
        );
        assert_abs_diff_eq!(g.param_value(NodeId(1), "frequency").unwrap(), 330.0);
        assert_abs_diff_eq!(g.param_value(NodeId(1), "gain").unwrap(), 0.25);
        assert_eq!(g.outgoing(NodeId(1)).unwrap(), vec![NodeId(2)]);
        assert_eq!(g.outgoing(NodeId(3)).unwrap(), vec![NodeId(1)]);
        assert_eq!(
            g.edge_kind(NodeId(3), NodeId(1)).unwrap(),
            EdgeKind::FrequencyModulation
        );
        assert_eq!(g.master_link_violation(), None);
    }

    #[test]
    fn test_set_subtype_carries_shared_params() {
        let mut g = graph();
        g.create_processor(NodeId(1), ProcessorType::Lowpass).unwrap();
        g.set_param(NodeId(1), "cutoff", 2500.0).unwrap();
        g.host_mut().advance(1.0);
        g.set_subtype(NodeId(1), Subtype::Processor(ProcessorType::Highpass))
            .unwrap();
        assert_abs_diff_eq!(
            g.param_value(NodeId(1), "cutoff").unwrap(),
            2500.0,
            epsilon = 1e-6
        );
    }

    #[test]
    fn test_set_subtype_resets_depth_across_units() {
        use crate::factory::{DEFAULT_CHORUS_DEPTH, DEFAULT_TREMOLO_DEPTH};

        let mut g = graph();
        g.create_processor(NodeId(1), ProcessorType::Phaser).unwrap();
        g.set_subtype(NodeId(1), Subtype::Processor(ProcessorType::Tremolo))
            .unwrap();
        assert_abs_diff_eq!(
            g.param_value(NodeId(1), "depth").unwrap(),
            DEFAULT_TREMOLO_DEPTH,
            epsilon = 1e-9
        );

        g.set_param(NodeId(1), "rate", 7.0).unwrap();
        g.host_mut().advance(1.0);
        g.set_subtype(NodeId(1), Subtype::Processor(ProcessorType::Chorus))
            .unwrap();
        assert_abs_diff_eq!(
            g.param_value(NodeId(1), "depth").unwrap(),
            DEFAULT_CHORUS_DEPTH,
            epsilon = 1e-9
        );
        // Rate means Hz on both, so it survives
        assert_abs_diff_eq!(g.param_value(NodeId(1), "rate").unwrap(), 7.0, epsilon = 1e-6);
    }

    #[test]
    fn test_set_subtype_keeps_processor_audibility() {
        let mut g = graph();
        g.create_processor(NodeId(1), ProcessorType::Delay).unwrap();
        g.set_audible(NodeId(1), false).unwrap();
        g.set_subtype(NodeId(1), Subtype::Processor(ProcessorType::Reverb))
            .unwrap();
        assert!(!g.node(NodeId(1)).unwrap().audible());
        assert!(!g.is_master_linked(NodeId(1)).unwrap());
        assert_eq!(g.master_link_violation(), None);
    }

    #[test]
    fn test_set_subtype_rejects_kind_change() {
        let mut g = graph();
        g.create_generator(NodeId(1), GeneratorType::Sine, 440.0, 0.5, true)
            .unwrap();
        assert!(matches!(
            g.set_subtype(NodeId(1), Subtype::Processor(ProcessorType::Delay)),
            Err(GraphError::KindMismatch { .. })
        ));
        assert_eq!(
            g.node(NodeId(1)).unwrap().subtype(),
            Subtype::Generator(GeneratorType::Sine)
        );
    }

    #[test]
    fn test_set_subtype_drops_unroutable_edges() {
        let mut g = graph();
        g.create_generator(NodeId(1), GeneratorType::Sine, 440.0, 0.5, true)
            .unwrap();
        g.create_generator(NodeId(2), GeneratorType::Sine, 2.0, 0.5, false)
            .unwrap();
        g.connect(NodeId(2), NodeId(1)).unwrap();
        // Noise has no frequency target, so the incoming edge cannot survive
        g.set_subtype(NodeId(1), Subtype::Generator(GeneratorType::Noise))
            .unwrap();
        assert!(g.outgoing(NodeId(2)).unwrap().is_empty());
        assert_eq!(g.node(NodeId(2)).unwrap().modulator_count(), 0);
        assert_eq!(g.master_link_violation(), None);
    }

    #[test]
    fn test_master_mute_fades() {
        let mut g = graph();
        g.set_master_mute(true);
        g.host_mut().advance(1.0);
        let gain = ParamHandle::new(g.master(), AudioParamKind::Gain);
        assert_abs_diff_eq!(g.host().param_value(gain).unwrap(), 0.0, epsilon = 1e-9);
        g.set_master_mute(false);
        g.host_mut().advance(1.0);
        assert_abs_diff_eq!(
            g.host().param_value(gain).unwrap(),
            g.config().master_gain,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_processor_input_exists() {
        let mut g = graph();
        g.create_processor(NodeId(1), ProcessorType::Chorus).unwrap();
        assert!(g.node(NodeId(1)).unwrap().audio_input().is_some());
    }
}
