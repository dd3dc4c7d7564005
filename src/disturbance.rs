//! Disturbance Events
//!
//! A disturbance is a one-shot impact sound layered on top of the persistent
//! graph. Its voices are not nodes: they are built, scheduled with an
//! absolute stop time and an absolute disposal time, and then forgotten.
//! The host reclaims them on its own clock.
//!
//! ```text
//! [spark]  noise → highpass → env ─┐
//! [thump]  sine (drooping) → env ──┤
//! [glitch] square (stepped) → env ─┼──→ [panner] ──→ master
//! [echo]   triangle → env ─┬───────┤
//!                          └→ [delay ⟲ feedback] ┘
//! ```
//!
//! The target node's own `detune` and `cutoff` are also kicked away from
//! rest and settle back.

use crate::error::GraphError;
use crate::graph::AudioGraph;
use crate::host::{
    AudioHost, AudioParamKind, Endpoint, FilterMode, ParamHandle, PrimitiveId, PrimitiveSpec,
    Waveform,
};
use crate::noise::NoiseColor;
use crate::node::{NodeId, ParamSlot, ParameterHost};
use crate::param::AutomationEvent;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Extra time after the last voice stops before the cluster is reclaimed
const RELEASE_TAIL: f64 = 0.05;

/// Floor for exponential envelope tails
const SILENCE: f64 = 1e-4;

/// Attack time of every envelope
const ATTACK: f64 = 0.005;

const SPARK_LENGTH: f64 = 0.08;
const THUMP_LENGTH: f64 = 0.3;
const THUMP_PITCH: (f64, f64) = (120.0, 40.0);
const GLITCH_STEPS: usize = 6;
const GLITCH_STEP_LENGTH: f64 = 0.02;
const GLITCH_PITCH: (f64, f64) = (200.0, 2000.0);
const ECHO_LENGTH: f64 = 0.15;
const ECHO_PITCH: f64 = 880.0;
const ECHO_DELAY: f64 = 0.09;
const ECHO_FEEDBACK: f64 = 0.45;
/// Time for the echo feedback loop to decay below audibility
const ECHO_RING: f64 = 1.0;

/// Which layers a disturbance fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisturbanceSettings {
    pub spark: bool,
    pub sub_thump: bool,
    pub glitch: bool,
    pub echo: bool,
    /// Kick the target's detune
    pub detune: bool,
    /// Kick the target's cutoff
    pub cutoff: bool,
}

impl Default for DisturbanceSettings {
    fn default() -> Self {
        Self {
            spark: true,
            sub_thump: true,
            glitch: true,
            echo: true,
            detune: true,
            cutoff: true,
        }
    }
}

impl DisturbanceSettings {
    /// Every layer disabled
    pub fn none() -> Self {
        Self {
            spark: false,
            sub_thump: false,
            glitch: false,
            echo: false,
            detune: false,
            cutoff: false,
        }
    }
}

/// Primitives of one self-expiring voice cluster
struct Burst<'h, H: AudioHost> {
    host: &'h mut H,
    now: f64,
    primitives: Vec<PrimitiveId>,
    end: f64,
}

impl<'h, H: AudioHost> Burst<'h, H> {
    fn new(host: &'h mut H) -> Self {
        let now = host.current_time();
        Self {
            host,
            now,
            primitives: Vec::new(),
            end: now,
        }
    }

    fn add(&mut self, spec: PrimitiveSpec) -> PrimitiveId {
        let id = self.host.create(spec);
        self.primitives.push(id);
        id
    }

    /// A source playing from now for `length` seconds
    fn source(&mut self, spec: PrimitiveSpec, length: f64) -> PrimitiveId {
        let id = self.add(spec);
        let stop = self.now + length;
        self.host.start(id, self.now);
        self.host.stop(id, stop);
        self.end = self.end.max(stop);
        id
    }

    /// Gain with a fast attack to `peak` and an exponential fall over `length`
    fn envelope(&mut self, peak: f64, length: f64) -> PrimitiveId {
        let env = self.add(PrimitiveSpec::Gain { gain: 0.0 });
        let gain = ParamHandle::new(env, AudioParamKind::Gain);
        let now = self.now;
        self.host.set_value_at(gain, 0.0, now);
        self.host.schedule(
            gain,
            AutomationEvent::LinearRamp {
                value: peak.max(SILENCE),
                end_time: now + ATTACK,
            },
        );
        self.host.schedule(
            gain,
            AutomationEvent::ExponentialRamp {
                value: SILENCE,
                end_time: now + length,
            },
        );
        env
    }

    fn wire(&mut self, from: PrimitiveId, to: PrimitiveId) {
        self.host.connect(from, Endpoint::Input(to));
    }

    /// Keep the cluster alive at least until `at`
    fn extend(&mut self, at: f64) {
        self.end = self.end.max(at);
    }

    /// Schedule disposal of every primitive and return the disposal time
    fn release(mut self) -> f64 {
        let at = self.end + RELEASE_TAIL;
        for &id in &self.primitives {
            self.host.dispose_at(id, at);
        }
        at
    }
}

impl<H: AudioHost> AudioGraph<H> {
    /// Fire a one-shot impact at node `id`
    ///
    /// `velocity` is signed; its magnitude against the configured reference
    /// velocity sets the intensity. `pan` places the voices in the stereo
    /// field (-1 to 1).
    pub fn trigger_disturbance(
        &mut self,
        id: NodeId,
        velocity: f64,
        pan: f64,
        settings: &DisturbanceSettings,
    ) -> Result<(), GraphError> {
        self.node(id)?;
        let tuning = self.config.disturbance.clone();
        let intensity = (velocity.abs() / tuning.reference_velocity.max(f64::EPSILON)).clamp(0.0, 1.0);
        let any_voice = settings.spark || settings.sub_thump || settings.glitch || settings.echo;

        if any_voice && intensity > 0.0 {
            let peak = tuning.peak_gain * intensity;
            let white = self.factory.noise().buffer(NoiseColor::White);
            let glitch_steps: Vec<(f64, f64)> = (0..GLITCH_STEPS)
                .map(|k| {
                    let pitch = self.factory.rng().gen_range(GLITCH_PITCH.0..GLITCH_PITCH.1);
                    (k as f64 * GLITCH_STEP_LENGTH, pitch)
                })
                .collect();

            let mut burst = Burst::new(&mut self.host);
            let now = burst.now;
            let panner = burst.add(PrimitiveSpec::StereoPanner {
                pan: pan.clamp(-1.0, 1.0),
            });
            burst.host.connect(panner, Endpoint::Input(self.master));

            if settings.spark {
                let cutoff = if velocity >= 0.0 {
                    tuning.spark_cutoffs.0
                } else {
                    tuning.spark_cutoffs.1
                };
                let noise = burst.source(
                    PrimitiveSpec::BufferSource {
                        buffer: white,
                        looped: true,
                    },
                    SPARK_LENGTH,
                );
                let highpass = burst.add(PrimitiveSpec::Filter {
                    mode: FilterMode::Highpass,
                    frequency: cutoff,
                    q: 1.0,
                });
                let env = burst.envelope(peak, SPARK_LENGTH);
                burst.wire(noise, highpass);
                burst.wire(highpass, env);
                burst.wire(env, panner);
            }

            if settings.sub_thump {
                let osc = burst.source(
                    PrimitiveSpec::Oscillator {
                        waveform: Waveform::Sine,
                        frequency: THUMP_PITCH.0,
                        detune: 0.0,
                    },
                    THUMP_LENGTH,
                );
                let pitch = ParamHandle::new(osc, AudioParamKind::Frequency);
                burst.host.set_value_at(pitch, THUMP_PITCH.0, now);
                burst.host.schedule(
                    pitch,
                    AutomationEvent::ExponentialRamp {
                        value: THUMP_PITCH.1,
                        end_time: now + THUMP_LENGTH,
                    },
                );
                let env = burst.envelope(peak, THUMP_LENGTH);
                burst.wire(osc, env);
                burst.wire(env, panner);
            }

            if settings.glitch {
                let length = GLITCH_STEPS as f64 * GLITCH_STEP_LENGTH;
                let osc = burst.source(
                    PrimitiveSpec::Oscillator {
                        waveform: Waveform::Square,
                        frequency: glitch_steps.first().map_or(GLITCH_PITCH.0, |s| s.1),
                        detune: 0.0,
                    },
                    length,
                );
                let pitch = ParamHandle::new(osc, AudioParamKind::Frequency);
                for &(offset, value) in &glitch_steps {
                    burst.host.set_value_at(pitch, value, now + offset);
                }
                let env = burst.add(PrimitiveSpec::Gain { gain: 0.0 });
                let level = ParamHandle::new(env, AudioParamKind::Gain);
                burst.host.set_value_at(level, peak * 0.5, now);
                burst.host.set_value_at(level, 0.0, now + length);
                burst.wire(osc, env);
                burst.wire(env, panner);
            }

            if settings.echo {
                let osc = burst.source(
                    PrimitiveSpec::Oscillator {
                        waveform: Waveform::Triangle,
                        frequency: ECHO_PITCH,
                        detune: 0.0,
                    },
                    ECHO_LENGTH,
                );
                let env = burst.envelope(peak * 0.5, ECHO_LENGTH);
                let line = burst.add(PrimitiveSpec::Delay {
                    max_time: ECHO_DELAY * 2.0,
                    time: ECHO_DELAY,
                });
                let feedback = burst.add(PrimitiveSpec::Gain {
                    gain: ECHO_FEEDBACK,
                });
                burst.wire(osc, env);
                burst.wire(env, panner);
                burst.wire(env, line);
                burst.wire(line, feedback);
                burst.wire(feedback, line);
                burst.wire(line, panner);
                burst.extend(now + ECHO_LENGTH + ECHO_RING);
            }

            let disposal = burst.release();
            debug!(%id, velocity, intensity, disposal, "disturbance fired");
        }

        if settings.detune {
            let offset = -velocity / tuning.reference_velocity.max(f64::EPSILON) * tuning.detune_cents;
            self.perturb(id, "detune", |rest| rest + offset, tuning.settle_time);
        }
        if settings.cutoff && intensity > 0.0 {
            let direction = if velocity >= 0.0 { 1.0 } else { -1.0 };
            let swing = direction * tuning.cutoff_swing * intensity;
            self.perturb(id, "cutoff", |rest| (rest * (1.0 + swing)).max(20.0), tuning.settle_time);
        }
        Ok(())
    }

    /// Jump `name` away from its resting value and let it settle back
    fn perturb(&mut self, id: NodeId, name: &str, kick: impl Fn(f64) -> f64, settle_time: f64) {
        let Some(node) = self.registry.get(id) else {
            return;
        };
        let Some(ParamSlot::Automatable(handle)) = node.param(name).copied() else {
            return;
        };
        let Some(rest) = node
            .resting
            .get(name)
            .copied()
            .or_else(|| self.host.param_value(handle))
        else {
            return;
        };
        let now = self.host.current_time();
        self.host.cancel_scheduled(handle, now);
        self.host.set_value_at(handle, kick(rest), now);
        self.host.schedule(
            handle,
            AutomationEvent::SetTarget {
                target: rest,
                start_time: now,
                time_constant: settle_time,
            },
        );
    }
}
