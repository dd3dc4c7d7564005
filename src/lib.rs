//! # Patchweave: Dynamic Audio Routing Graph
//!
//! `patchweave` maintains a live graph of sound generators and processors
//! whose connections can be created, removed and re-typed while sound is
//! playing. The *meaning* of a connection is never declared: it follows from
//! the state of its endpoints. An audible generator wired into a processor
//! carries program audio; a silent one drives the processor's primary
//! parameter through a scaling element instead.
//!
//! ## Architecture
//!
//! The library never renders audio itself. Filtering, delay, convolution and
//! oscillators are primitive units provided by a host audio context behind
//! the [`AudioHost`](host::AudioHost) trait.
//!
//! - **Host layer** - primitive catalog, automation timelines, and an
//!   in-memory [`OfflineHost`](offline::OfflineHost)
//! - **Synthesis tables** - colored noise, waveshaper curves, reverb impulses
//! - **Routing graph** - [`AudioGraph`](graph::AudioGraph): node lifecycle,
//!   edge-kind derivation, master-bus membership, parameter smoothing and
//!   one-shot disturbances
//! - **Façade** - [`Engine`](engine::Engine): lazy host launch and a total
//!   API that ignores calls naming nodes that no longer exist
//!
//! ## Quick Start
//!
//! ```rust
//! use patchweave::prelude::*;
//!
//! let config = EngineConfig::new(44100.0).with_seed(1).with_noise_seconds(0.1);
//! let mut engine = Engine::new(config, OfflineHost::launcher());
//! engine.initialize().unwrap();
//!
//! engine.create_generator(1u64, "sine", 220.0, 0.5, true);
//! engine.create_processor(2u64, "lowpass");
//! engine.connect(1u64, 2u64);
//!
//! // The filter now carries the sine and feeds the master bus
//! assert_eq!(engine.edge_kind(1u64, 2u64), Some(EdgeKind::AudioChain));
//! assert!(engine.is_master_linked(2u64));
//!
//! // A silent LFO sweeps the filter's cutoff instead of feeding its input
//! engine.create_generator(3u64, "triangle", 0.5, 0.5, false);
//! engine.connect(3u64, 2u64);
//! assert_eq!(engine.edge_kind(3u64, 2u64), Some(EdgeKind::ParameterModulation));
//! ```

pub mod config;
pub mod curves;
pub mod disturbance;
pub mod document;
pub mod engine;
pub mod error;
pub mod factory;
pub mod graph;
pub mod host;
pub mod noise;
pub mod node;
pub mod offline;
pub mod param;
pub mod registry;
pub mod routing;
pub mod update;

/// Prelude module for convenient imports
pub mod prelude {
    // Host layer
    pub use crate::host::{
        AudioHost, AudioParamKind, Endpoint, FilterMode, HostLauncher, ParamHandle, PrimitiveId,
        PrimitiveSpec, Waveform,
    };
    pub use crate::offline::OfflineHost;
    pub use crate::param::{AutomationEvent, ParamRange, ParamTimeline};

    // Synthesis tables
    pub use crate::curves::{bitcrush_curve, distortion_curve, ImpulseResponse};
    pub use crate::noise::{MorphGains, NoiseBank, NoiseColor};

    // Routing graph
    pub use crate::disturbance::DisturbanceSettings;
    pub use crate::factory::{NodeFactory, NodeSpec};
    pub use crate::graph::{AudioGraph, WiringInspect};
    pub use crate::node::{
        derive_edge_kind, AudioSink, EdgeKind, FrequencyModulatable, GeneratorType, Node, NodeId,
        NodeKind, ParamSlot, ParameterHost, ProcessorType, Subtype,
    };
    pub use crate::registry::NodeRegistry;
    pub use crate::update::Transition;

    // Façade, documents and configuration
    pub use crate::config::{DisturbanceConfig, EngineConfig, ModulationDepths};
    pub use crate::document::{ConnectionRecord, NodeRecord, PatchDocument};
    pub use crate::engine::Engine;
    pub use crate::error::{GraphError, HostError};
}

// Re-export key types at crate root for convenience
pub use prelude::*;
