//! End-to-end routing behavior through the public API

use approx::assert_abs_diff_eq;
use patchweave::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const G1: NodeId = NodeId(1);
const G2: NodeId = NodeId(2);
const P1: NodeId = NodeId(10);

fn config() -> EngineConfig {
    EngineConfig::new(8000.0)
        .with_seed(17)
        .with_noise_seconds(0.1)
        .with_impulse_seconds(0.05)
}

fn graph() -> AudioGraph<OfflineHost> {
    AudioGraph::new(OfflineHost::new(8000.0), config())
}

/// Scaling elements wired into any parameter of `dest`
fn modulators_into(graph: &AudioGraph<OfflineHost>, dest: NodeId) -> usize {
    let primitives = graph.node(dest).unwrap().primitives().to_vec();
    graph
        .nodes()
        .filter(|node| node.id() != dest)
        .filter_map(|node| node.modulator(dest))
        .filter(|&scaler| {
            graph.host().wires_from(scaler).iter().any(|endpoint| {
                matches!(endpoint, Endpoint::Param(handle) if primitives.contains(&handle.primitive))
            })
        })
        .count()
}

#[test]
fn scenario_chain_moves_master_link_and_back() {
    let mut g = graph();
    g.create_generator(G1, GeneratorType::Sine, 440.0, 0.5, true)
        .unwrap();
    assert!(g.is_master_linked(G1).unwrap());

    g.create_processor(P1, ProcessorType::Lowpass).unwrap();
    g.connect(G1, P1).unwrap();
    assert!(!g.is_master_linked(G1).unwrap());
    assert!(g.is_master_linked(P1).unwrap());
    assert_eq!(g.master_link_violation(), None);

    g.disconnect(G1, P1).unwrap();
    assert!(g.is_master_linked(G1).unwrap());
    assert_eq!(g.master_link_violation(), None);
}

#[test]
fn scenario_silent_generator_drives_cutoff() {
    let mut g = graph();
    g.create_processor(P1, ProcessorType::Lowpass).unwrap();
    g.create_generator(G2, GeneratorType::Sine, 3.0, 0.5, false)
        .unwrap();
    g.connect(G2, P1).unwrap();

    assert_eq!(g.edge_kind(G2, P1).unwrap(), EdgeKind::ParameterModulation);
    assert_eq!(modulators_into(&g, P1), 1);

    let input = g.node(P1).unwrap().audio_input().unwrap();
    let output = g.node(G2).unwrap().output();
    assert!(!g.host().is_wired(output, Endpoint::Input(input)));

    let cutoff = g
        .node(P1)
        .unwrap()
        .param("cutoff")
        .and_then(ParamSlot::handle)
        .unwrap();
    let scaler = g.node(G2).unwrap().modulator(P1).unwrap();
    assert!(g.host().is_wired(scaler, Endpoint::Param(cutoff)));
}

#[test]
fn connect_then_disconnect_restores_state() {
    let mut g = graph();
    g.create_generator(G1, GeneratorType::Square, 110.0, 0.5, true)
        .unwrap();
    g.create_generator(G2, GeneratorType::SampleAndHold, 4.0, 0.5, false)
        .unwrap();
    g.create_processor(P1, ProcessorType::Delay).unwrap();

    for source in [G1, G2] {
        let linked = g.is_master_linked(source).unwrap();
        let primitives = g.host().primitive_count();
        let wires = g.host().wire_count();

        g.connect(source, P1).unwrap();
        g.disconnect(source, P1).unwrap();

        assert_eq!(g.is_master_linked(source).unwrap(), linked);
        assert_eq!(modulators_into(&g, P1), 0);
        assert_eq!(g.host().primitive_count(), primitives);
        assert_eq!(g.host().wire_count(), wires);
    }
}

#[test]
fn toggling_audible_keeps_targets() {
    let mut g = graph();
    g.create_generator(G1, GeneratorType::Sine, 440.0, 0.5, true)
        .unwrap();
    g.create_processor(P1, ProcessorType::Reverb).unwrap();
    g.create_processor(NodeId(11), ProcessorType::Tremolo).unwrap();
    g.create_generator(G2, GeneratorType::Triangle, 220.0, 0.5, true)
        .unwrap();
    for to in [P1, NodeId(11), G2] {
        g.connect(G1, to).unwrap();
    }
    let targets = g.outgoing(G1).unwrap();

    g.set_audible(G1, false).unwrap();
    assert_eq!(g.outgoing(G1).unwrap(), targets);
    assert_eq!(g.edge_kind(G1, P1).unwrap(), EdgeKind::ParameterModulation);
    assert_eq!(g.edge_kind(G1, NodeId(11)).unwrap(), EdgeKind::ParameterModulation);
    assert_eq!(g.edge_kind(G1, G2).unwrap(), EdgeKind::FrequencyModulation);

    g.set_audible(G1, true).unwrap();
    assert_eq!(g.outgoing(G1).unwrap(), targets);
    assert_eq!(g.edge_kind(G1, P1).unwrap(), EdgeKind::AudioChain);
    assert_eq!(g.edge_kind(G1, G2).unwrap(), EdgeKind::FrequencyModulation);
    assert_eq!(g.master_link_violation(), None);
}

#[test]
fn silent_generator_never_feeds_an_audio_input() {
    let mut g = graph();
    g.create_generator(G2, GeneratorType::Noise, 440.0, 0.5, false)
        .unwrap();
    for (i, subtype) in ProcessorType::ALL.into_iter().enumerate() {
        let id = NodeId(100 + i as u64);
        g.create_processor(id, subtype).unwrap();
        g.connect(G2, id).unwrap();
        let input = g.node(id).unwrap().audio_input().unwrap();
        let output = g.node(G2).unwrap().output();
        assert!(
            !g.host().is_wired(output, Endpoint::Input(input)),
            "{} received raw audio",
            subtype.name()
        );
    }
}

#[test]
fn subtype_change_preserves_everything_it_can() {
    let mut g = graph();
    g.create_generator(G1, GeneratorType::Sine, 330.0, 0.7, true)
        .unwrap();
    g.create_processor(P1, ProcessorType::Lowpass).unwrap();
    g.create_processor(NodeId(11), ProcessorType::Delay).unwrap();
    g.connect(G1, P1).unwrap();
    g.connect(P1, NodeId(11)).unwrap();

    g.set_subtype(P1, Subtype::Processor(ProcessorType::Chorus))
        .unwrap();
    assert_eq!(g.outgoing(P1).unwrap(), vec![NodeId(11)]);
    assert_eq!(g.incoming(P1).unwrap(), vec![G1]);
    assert_eq!(g.edge_kind(G1, P1).unwrap(), EdgeKind::AudioChain);

    g.set_subtype(G1, Subtype::Generator(GeneratorType::SampleAndHold))
        .unwrap();
    assert_abs_diff_eq!(g.param_value(G1, "frequency").unwrap(), 330.0);
    assert_abs_diff_eq!(g.param_value(G1, "gain").unwrap(), 0.7);
    assert_eq!(g.outgoing(G1).unwrap(), vec![P1]);
    assert_eq!(g.master_link_violation(), None);
}

#[test]
fn removed_node_is_inert() {
    let mut engine = Engine::new(config(), OfflineHost::launcher());
    engine.initialize().unwrap();
    engine.create_generator(1u64, "sine", 440.0, 0.5, true);
    engine.create_processor(10u64, "lowpass");
    engine.connect(1u64, 10u64);
    engine.remove_node(10u64);

    engine.connect(1u64, 10u64);
    engine.disconnect(1u64, 10u64);
    engine.set_param(10u64, "cutoff", 200.0);
    engine.set_subtype(10u64, "highpass");
    engine.trigger_disturbance(10u64, 4.0, 0.0, &DisturbanceSettings::default());

    assert!(!engine.contains(10u64));
    assert_eq!(engine.node_count(), 1);
    assert!(engine.is_master_linked(1u64));
}

#[test]
fn noise_morph_is_monotonic_and_continuous() {
    let range = config().morph_range;
    let mut previous = MorphGains::at(range.normalize(20.0));
    assert_abs_diff_eq!(previous.brown, 1.0);
    let mut frequency = 20.0;
    while frequency < 20000.0 {
        frequency *= 1.01;
        let gains = MorphGains::at(range.normalize(frequency));
        assert!(gains.brown <= previous.brown + 1e-12);
        assert!(gains.white >= previous.white - 1e-12);
        assert!((gains.brown - previous.brown).abs() < 0.01);
        assert!((gains.pink - previous.pink).abs() < 0.01);
        assert!((gains.white - previous.white).abs() < 0.01);
        previous = gains;
    }
    assert_abs_diff_eq!(previous.white, 1.0);
}

#[test]
fn random_mutations_keep_master_link_invariant() {
    let mut rng = StdRng::seed_from_u64(99);
    let mut g = graph();
    let ids: Vec<NodeId> = (0..8).map(NodeId).collect();

    for step in 0..400 {
        let a = ids[rng.gen_range(0..ids.len())];
        let b = ids[rng.gen_range(0..ids.len())];
        // Errors are expected here: unknown ids, stale edges, unsupported routes
        let _ = match rng.gen_range(0..8) {
            0 => {
                if rng.gen_bool(0.5) {
                    let subtype = GeneratorType::ALL[rng.gen_range(0..GeneratorType::ALL.len())];
                    g.create_generator(a, subtype, 220.0, 0.5, rng.gen_bool(0.5))
                } else {
                    let subtype = ProcessorType::ALL[rng.gen_range(0..ProcessorType::ALL.len())];
                    g.create_processor(a, subtype)
                }
            }
            1 => g.remove_node(a),
            2 | 3 => g.connect(a, b),
            4 => g.disconnect(a, b),
            5 => g.set_audible(a, rng.gen_bool(0.5)),
            6 => {
                let subtype = if rng.gen_bool(0.5) {
                    Subtype::Generator(GeneratorType::ALL[rng.gen_range(0..6)])
                } else {
                    Subtype::Processor(ProcessorType::ALL[rng.gen_range(0..10)])
                };
                g.set_subtype(a, subtype)
            }
            _ => g.trigger_disturbance(a, rng.gen_range(-10.0..10.0), 0.0, &DisturbanceSettings::default()),
        };
        g.host_mut().advance(0.01);

        assert_eq!(g.master_link_violation(), None, "violated at step {}", step);
        for node in g.nodes() {
            // Exactly one scaler per modulation edge, none for audio chains
            for to in node.outgoing() {
                let kind = g.edge_kind(node.id(), to).unwrap();
                assert_eq!(
                    node.modulator(to).is_some(),
                    kind != EdgeKind::AudioChain,
                    "edge {} -> {} at step {}",
                    node.id(),
                    to,
                    step
                );
            }
            assert!(node.outgoing().all(|to| g.contains(to)));
        }
    }
}
