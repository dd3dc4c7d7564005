//! Demo: Collision Patch
//!
//! Builds a small patch on the offline host, flips a generator between
//! audible and silent, swaps a filter's subtype, and fires a collision
//! disturbance. Prints how the routing reacts at each step.
//!
//! Run with: cargo run --example collision_patch

use patchweave::prelude::*;

fn describe(engine: &Engine<OfflineHost>, ids: &[u64]) {
    for &id in ids {
        let outgoing: Vec<String> = engine
            .outgoing(id)
            .iter()
            .map(|to| {
                let kind = engine
                    .edge_kind(id, *to)
                    .map_or("?".to_string(), |kind| format!("{:?}", kind));
                format!("{} ({})", to, kind)
            })
            .collect();
        println!(
            "  #{:<3} master={:<5} -> [{}]",
            id,
            engine.is_master_linked(id),
            outgoing.join(", ")
        );
    }
    println!();
}

fn main() {
    let config = EngineConfig::new(44100.0).with_seed(2024);
    let mut engine = Engine::new(config, OfflineHost::launcher());

    if let Err(err) = engine.initialize() {
        eprintln!("could not start audio: {}", err);
        return;
    }

    println!("=== Collision Patch Demo ===\n");

    // Sawtooth into a lowpass, which feeds the master bus
    engine.create_generator(1u64, "sawtooth", 110.0, 0.4, true);
    engine.create_processor(2u64, "lowpass");
    engine.connect(1u64, 2u64);

    // A silent triangle LFO wired to the same filter sweeps its cutoff
    engine.create_generator(3u64, "triangle", 0.5, 0.5, false);
    engine.connect(3u64, 2u64);

    println!("Initial patch:");
    describe(&engine, &[1, 2, 3]);

    // Making the LFO audible turns its edge into an audio chain
    engine.set_audible(3u64, true);
    println!("LFO made audible:");
    describe(&engine, &[1, 2, 3]);

    // Swap the filter for a reverb; edges carry over
    engine.set_subtype(2u64, "reverb");
    engine.set_param(2u64, "diffusion", 0.8);
    println!("Filter swapped for reverb:");
    describe(&engine, &[1, 2, 3]);

    // Collision at the sawtooth: voices self-expire on the host clock
    engine.trigger_disturbance(1u64, 7.5, -0.4, &DisturbanceSettings::default());
    if let Some(graph) = engine.graph_mut() {
        let before = graph.host().primitive_count();
        graph.host_mut().advance(2.0);
        let after = graph.host().primitive_count();
        println!("Disturbance voices reclaimed: {} primitives", before - after);
    }

    if let Some(json) = engine.document().and_then(|doc| doc.to_json().ok()) {
        println!("\nPatch document:\n{}", json);
    }
}
