//! Host Primitive Interface
//!
//! The routing graph never renders audio itself. Filtering, delay lines,
//! convolution and oscillators are primitive units owned by the host audio
//! context, which renders them on its own real-time thread. This module
//! defines the catalog of primitives the graph may request, the handles used
//! to address their automatable parameters, and the [`AudioHost`] trait the
//! graph drives.
//!
//! All calls are declarative: creating, wiring and scheduling return
//! immediately and take effect on the host clock.

use crate::curves::ImpulseResponse;
use crate::error::HostError;
use crate::param::AutomationEvent;
use serde::{Deserialize, Serialize};
use slotmap::new_key_type;
use std::sync::Arc;

new_key_type! {
    /// Identifier of a host primitive unit
    pub struct PrimitiveId;
}

/// Automatable parameters exposed by host primitives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AudioParamKind {
    Frequency,
    Detune,
    Gain,
    Q,
    DelayTime,
    Pan,
    PlaybackRate,
}

/// Address of one automatable parameter on one primitive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ParamHandle {
    pub primitive: PrimitiveId,
    pub param: AudioParamKind,
}

impl ParamHandle {
    pub fn new(primitive: PrimitiveId, param: AudioParamKind) -> Self {
        Self { primitive, param }
    }
}

/// Where a primitive's output may be wired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// The audio input of another primitive
    Input(PrimitiveId),
    /// An automatable parameter, summed with its intrinsic value
    Param(ParamHandle),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Waveform {
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FilterMode {
    Lowpass,
    Highpass,
    Bandpass,
    Allpass,
}

/// Construction request for a host primitive
#[derive(Debug, Clone)]
pub enum PrimitiveSpec {
    Oscillator {
        waveform: Waveform,
        frequency: f64,
        detune: f64,
    },
    Gain {
        gain: f64,
    },
    Filter {
        mode: FilterMode,
        frequency: f64,
        q: f64,
    },
    Delay {
        max_time: f64,
        time: f64,
    },
    WaveShaper {
        curve: Arc<[f32]>,
    },
    Convolver {
        impulse: Arc<ImpulseResponse>,
    },
    /// Plays a mono buffer, optionally looping
    BufferSource {
        buffer: Arc<[f32]>,
        looped: bool,
    },
    /// Steps through `steps`, holding each value for `1/frequency` seconds
    StepSource {
        frequency: f64,
        steps: Arc<[f32]>,
    },
    StereoPanner {
        pan: f64,
    },
}

impl PrimitiveSpec {
    /// Automatable parameters and their intrinsic values at creation
    pub fn params(&self) -> Vec<(AudioParamKind, f64)> {
        match self {
            PrimitiveSpec::Oscillator {
                frequency, detune, ..
            } => vec![
                (AudioParamKind::Frequency, *frequency),
                (AudioParamKind::Detune, *detune),
            ],
            PrimitiveSpec::Gain { gain } => vec![(AudioParamKind::Gain, *gain)],
            PrimitiveSpec::Filter { frequency, q, .. } => vec![
                (AudioParamKind::Frequency, *frequency),
                (AudioParamKind::Q, *q),
            ],
            PrimitiveSpec::Delay { time, .. } => vec![(AudioParamKind::DelayTime, *time)],
            PrimitiveSpec::WaveShaper { .. } | PrimitiveSpec::Convolver { .. } => vec![],
            PrimitiveSpec::BufferSource { .. } => vec![(AudioParamKind::PlaybackRate, 1.0)],
            PrimitiveSpec::StepSource { frequency, .. } => {
                vec![(AudioParamKind::Frequency, *frequency)]
            }
            PrimitiveSpec::StereoPanner { pan } => vec![(AudioParamKind::Pan, *pan)],
        }
    }

    /// Whether the primitive generates signal and must be started/stopped
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            PrimitiveSpec::Oscillator { .. }
                | PrimitiveSpec::BufferSource { .. }
                | PrimitiveSpec::StepSource { .. }
        )
    }

    /// Short type name for logging and inspection
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveSpec::Oscillator { .. } => "oscillator",
            PrimitiveSpec::Gain { .. } => "gain",
            PrimitiveSpec::Filter { .. } => "filter",
            PrimitiveSpec::Delay { .. } => "delay",
            PrimitiveSpec::WaveShaper { .. } => "waveshaper",
            PrimitiveSpec::Convolver { .. } => "convolver",
            PrimitiveSpec::BufferSource { .. } => "buffer_source",
            PrimitiveSpec::StepSource { .. } => "step_source",
            PrimitiveSpec::StereoPanner { .. } => "stereo_panner",
        }
    }
}

/// Factory used by the engine to open a host on demand
pub type HostLauncher<H> = Box<dyn FnMut(f64) -> Result<H, HostError> + Send>;

/// A host audio context providing primitive processing units
///
/// Implementations own the real-time render thread. Every method is called
/// from the single thread that owns the graph and must not block on
/// rendering.
pub trait AudioHost {
    /// Start (or restart) rendering
    fn resume(&mut self) -> Result<(), HostError>;

    /// Monotonic host clock in seconds
    fn current_time(&self) -> f64;

    fn sample_rate(&self) -> f64;

    /// The final output of the context
    fn destination(&self) -> PrimitiveId;

    /// Create a primitive. Sources are created stopped.
    fn create(&mut self, spec: PrimitiveSpec) -> PrimitiveId;

    /// Wire `from`'s output into `to`. Wiring the same pair twice is idempotent.
    fn connect(&mut self, from: PrimitiveId, to: Endpoint);

    /// Remove a wire. Unknown wires are ignored.
    fn disconnect(&mut self, from: PrimitiveId, to: Endpoint);

    /// Current (computed) value of a parameter
    fn param_value(&self, param: ParamHandle) -> Option<f64>;

    /// Append an automation event to a parameter's timeline
    fn schedule(&mut self, param: ParamHandle, event: AutomationEvent);

    /// Drop all events starting at or after `from_time`
    fn cancel_scheduled(&mut self, param: ParamHandle, from_time: f64);

    /// Replace a waveshaper's transfer curve
    fn set_curve(&mut self, shaper: PrimitiveId, curve: Arc<[f32]>);

    fn start(&mut self, source: PrimitiveId, at: f64);

    fn stop(&mut self, source: PrimitiveId, at: f64);

    /// Let the host reclaim the primitive (and its wires) once the clock passes `at`
    fn dispose_at(&mut self, id: PrimitiveId, at: f64);

    /// Reclaim the primitive immediately, removing all of its wires
    fn release(&mut self, id: PrimitiveId);

    /// Jump a parameter to `value` at `time`
    fn set_value_at(&mut self, param: ParamHandle, value: f64, time: f64) {
        self.schedule(param, AutomationEvent::SetValue { value, time });
    }

    /// Supersede any pending schedule and approach `target` exponentially
    ///
    /// The current value is pinned at the present instant so the approach
    /// starts without a discontinuity.
    fn smooth_to(&mut self, param: ParamHandle, target: f64, time_constant: f64) {
        let now = self.current_time();
        let current = self.param_value(param).unwrap_or(target);
        self.cancel_scheduled(param, now);
        self.schedule(
            param,
            AutomationEvent::SetValue {
                value: current,
                time: now,
            },
        );
        self.schedule(
            param,
            AutomationEvent::SetTarget {
                target,
                start_time: now,
                time_constant,
            },
        );
    }
}
