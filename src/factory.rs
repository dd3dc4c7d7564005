//! Node Factory
//!
//! Builds the primitive sub-graph behind every generator and processor
//! subtype and exposes its parameter table. Shared synthesis products (noise
//! tables, step tables) are generated once and reused by every node.
//!
//! ```text
//! oscillator:  [osc] ──→ [gain]=out
//! noise:       [brown] → [g] ─┐
//!              [pink]  → [g] ─┼──→ [gain]=out
//!              [white] → [g] ─┘
//! phaser:      in ──→ [allpass] → [allpass] ──→ out
//!               └──────────── dry ─────────────┘
//!              [lfo] → [depth] ⇢ allpass.frequency
//! ```

use crate::config::EngineConfig;
use crate::curves::{bitcrush_curve, distortion_curve, ImpulseResponse};
use crate::host::{
    AudioHost, AudioParamKind, Endpoint, FilterMode, ParamHandle, PrimitiveId, PrimitiveSpec,
    Waveform,
};
use crate::noise::{MorphGains, NoiseBank, NoiseColor};
use crate::node::{
    GeneratorType, NoiseMix, Node, NodeId, ParamSlot, ProcessorType, Shaper, ShaperCurve,
    Subtype,
};
use crate::param::ParamRange;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

pub const DEFAULT_CUTOFF: f64 = 1000.0;
pub const DEFAULT_RESONANCE: f64 = 1.0;
pub const DEFAULT_DELAY_TIME: f64 = 0.3;
pub const DEFAULT_FEEDBACK: f64 = 0.4;
pub const MAX_DELAY_TIME: f64 = 2.0;
pub const DEFAULT_DISTORTION_AMOUNT: f64 = 50.0;
pub const DEFAULT_BITS: f64 = 8.0;
pub const DEFAULT_PHASER_SPEED: f64 = 0.5;
pub const DEFAULT_PHASER_DEPTH: f64 = 800.0;
pub const DEFAULT_TREMOLO_RATE: f64 = 5.0;
pub const DEFAULT_TREMOLO_DEPTH: f64 = 0.5;
pub const DEFAULT_CHORUS_RATE: f64 = 1.5;
pub const DEFAULT_CHORUS_DEPTH: f64 = 0.004;
pub const DEFAULT_DIFFUSION: f64 = 0.5;

/// Request for a new node
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeSpec {
    Generator {
        subtype: GeneratorType,
        frequency: f64,
        gain: f64,
        audible: bool,
    },
    Processor {
        subtype: ProcessorType,
    },
}

impl NodeSpec {
    pub fn subtype(&self) -> Subtype {
        match *self {
            NodeSpec::Generator { subtype, .. } => Subtype::Generator(subtype),
            NodeSpec::Processor { subtype } => Subtype::Processor(subtype),
        }
    }
}

/// Tracks the primitives created for one node
struct Assembly<'h, H: AudioHost> {
    host: &'h mut H,
    primitives: Vec<PrimitiveId>,
    voices: Vec<PrimitiveId>,
    params: BTreeMap<&'static str, ParamSlot>,
}

impl<'h, H: AudioHost> Assembly<'h, H> {
    fn new(host: &'h mut H) -> Self {
        Self {
            host,
            primitives: Vec::new(),
            voices: Vec::new(),
            params: BTreeMap::new(),
        }
    }

    fn add(&mut self, spec: PrimitiveSpec) -> PrimitiveId {
        let id = self.host.create(spec);
        self.primitives.push(id);
        id
    }

    fn gain(&mut self, gain: f64) -> PrimitiveId {
        self.add(PrimitiveSpec::Gain { gain })
    }

    /// A source that starts now and runs for the node's lifetime
    fn voice(&mut self, spec: PrimitiveSpec) -> PrimitiveId {
        let id = self.add(spec);
        let now = self.host.current_time();
        self.host.start(id, now);
        self.voices.push(id);
        id
    }

    fn wire(&mut self, from: PrimitiveId, to: PrimitiveId) {
        self.host.connect(from, Endpoint::Input(to));
    }

    fn wire_param(&mut self, from: PrimitiveId, to: ParamHandle) {
        self.host.connect(from, Endpoint::Param(to));
    }

    fn expose(&mut self, name: &'static str, primitive: PrimitiveId, param: AudioParamKind) -> ParamHandle {
        let handle = ParamHandle::new(primitive, param);
        self.params.insert(name, ParamSlot::Automatable(handle));
        handle
    }

    fn literal(&mut self, name: &'static str, value: f64) {
        self.params.insert(name, ParamSlot::Literal(value));
    }

    fn finish(self, id: NodeId, subtype: Subtype, audible: bool, input: Option<PrimitiveId>, output: PrimitiveId) -> Node {
        Node {
            id,
            subtype,
            audible,
            params: self.params,
            input,
            output,
            primitives: self.primitives,
            voices: self.voices,
            frequency_target: None,
            shaper: None,
            noise: None,
            outgoing: BTreeSet::new(),
            modulators: BTreeMap::new(),
            master_linked: false,
            resting: BTreeMap::new(),
        }
    }
}

/// Builds nodes and owns the shared synthesis tables
pub struct NodeFactory {
    noise: NoiseBank,
    steps: Arc<[f32]>,
    rng: StdRng,
    morph_range: ParamRange,
    curve_samples: usize,
    impulse_seconds: f64,
    impulse_decay: f64,
}

impl NodeFactory {
    pub fn new(config: &EngineConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let noise = NoiseBank::generate(config.noise_len(), &mut rng);
        let steps = noise.step_table(config.step_count);
        Self {
            noise,
            steps,
            rng,
            morph_range: config.morph_range,
            curve_samples: config.curve_samples.max(2),
            impulse_seconds: config.impulse_seconds,
            impulse_decay: config.impulse_decay,
        }
    }

    pub fn noise(&self) -> &NoiseBank {
        &self.noise
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub fn curve_samples(&self) -> usize {
        self.curve_samples
    }

    /// Mix gains for a noise node whose morph control sits at `frequency`
    pub fn morph_gains(&self, frequency: f64) -> MorphGains {
        MorphGains::at(self.morph_range.normalize(frequency))
    }

    /// Waveshaper table for `curve` at `setting`
    pub fn curve(&self, curve: ShaperCurve, setting: f64) -> Arc<[f32]> {
        match curve {
            ShaperCurve::Distortion => distortion_curve(setting, self.curve_samples),
            ShaperCurve::Bitcrush => bitcrush_curve(setting, self.curve_samples),
        }
    }

    pub fn build<H: AudioHost>(&mut self, host: &mut H, id: NodeId, spec: NodeSpec) -> Node {
        match spec {
            NodeSpec::Generator {
                subtype,
                frequency,
                gain,
                audible,
            } => self.build_generator(host, id, subtype, frequency, gain, audible),
            NodeSpec::Processor { subtype } => self.build_processor(host, id, subtype),
        }
    }

    pub fn build_generator<H: AudioHost>(
        &mut self,
        host: &mut H,
        id: NodeId,
        subtype: GeneratorType,
        frequency: f64,
        gain: f64,
        audible: bool,
    ) -> Node {
        let mut a = Assembly::new(host);
        let output = a.gain(gain);
        a.expose("gain", output, AudioParamKind::Gain);

        let waveform = match subtype {
            GeneratorType::Sine => Some(Waveform::Sine),
            GeneratorType::Square => Some(Waveform::Square),
            GeneratorType::Sawtooth => Some(Waveform::Sawtooth),
            GeneratorType::Triangle => Some(Waveform::Triangle),
            GeneratorType::Noise | GeneratorType::SampleAndHold => None,
        };

        let mut frequency_target = None;
        let mut noise = None;

        if let Some(waveform) = waveform {
            let osc = a.voice(PrimitiveSpec::Oscillator {
                waveform,
                frequency,
                detune: 0.0,
            });
            a.wire(osc, output);
            frequency_target = Some(a.expose("frequency", osc, AudioParamKind::Frequency));
            a.expose("detune", osc, AudioParamKind::Detune);
        } else if subtype == GeneratorType::Noise {
            let gains = self.morph_gains(frequency);
            let mut stage = |color: NoiseColor| {
                let source = a.voice(PrimitiveSpec::BufferSource {
                    buffer: self.noise.buffer(color),
                    looped: true,
                });
                let level = a.gain(gains.get(color));
                a.wire(source, level);
                a.wire(level, output);
                ParamHandle::new(level, AudioParamKind::Gain)
            };
            let brown = stage(NoiseColor::Brown);
            let pink = stage(NoiseColor::Pink);
            let white = stage(NoiseColor::White);
            noise = Some(NoiseMix { brown, pink, white });
            a.literal("frequency", frequency);
        } else {
            let step = a.voice(PrimitiveSpec::StepSource {
                frequency,
                steps: Arc::clone(&self.steps),
            });
            a.wire(step, output);
            frequency_target = Some(a.expose("frequency", step, AudioParamKind::Frequency));
        }

        let mut node = a.finish(id, Subtype::Generator(subtype), audible, None, output);
        node.frequency_target = frequency_target;
        node.noise = noise;
        node
    }

    pub fn build_processor<H: AudioHost>(
        &mut self,
        host: &mut H,
        id: NodeId,
        subtype: ProcessorType,
    ) -> Node {
        let mut a = Assembly::new(host);
        let mut frequency_target = None;
        let mut shaper = None;

        let (input, output) = match subtype {
            ProcessorType::Lowpass | ProcessorType::Highpass | ProcessorType::Bandpass => {
                let mode = match subtype {
                    ProcessorType::Highpass => FilterMode::Highpass,
                    ProcessorType::Bandpass => FilterMode::Bandpass,
                    _ => FilterMode::Lowpass,
                };
                let filter = a.add(PrimitiveSpec::Filter {
                    mode,
                    frequency: DEFAULT_CUTOFF,
                    q: DEFAULT_RESONANCE,
                });
                frequency_target = Some(a.expose("cutoff", filter, AudioParamKind::Frequency));
                a.expose("resonance", filter, AudioParamKind::Q);
                (filter, filter)
            }
            ProcessorType::Delay => {
                let input = a.gain(1.0);
                let line = a.add(PrimitiveSpec::Delay {
                    max_time: MAX_DELAY_TIME,
                    time: DEFAULT_DELAY_TIME,
                });
                let feedback = a.gain(DEFAULT_FEEDBACK);
                let output = a.gain(1.0);
                a.wire(input, line);
                a.wire(line, feedback);
                a.wire(feedback, line);
                a.wire(line, output);
                a.wire(input, output);
                a.expose("time", line, AudioParamKind::DelayTime);
                a.expose("feedback", feedback, AudioParamKind::Gain);
                (input, output)
            }
            ProcessorType::Distortion | ProcessorType::Bitcrusher => {
                let (curve, param, setting) = if subtype == ProcessorType::Distortion {
                    (ShaperCurve::Distortion, "amount", DEFAULT_DISTORTION_AMOUNT)
                } else {
                    (ShaperCurve::Bitcrush, "bits", DEFAULT_BITS)
                };
                let drive = a.gain(1.0);
                let table = self.curve(curve, setting);
                let primitive = a.add(PrimitiveSpec::WaveShaper { curve: table });
                let output = a.gain(1.0);
                a.wire(drive, primitive);
                a.wire(primitive, output);
                a.expose(param, drive, AudioParamKind::Gain);
                shaper = Some(Shaper {
                    primitive,
                    curve,
                    param,
                    setting,
                });
                (drive, output)
            }
            ProcessorType::Phaser => {
                let input = a.gain(1.0);
                let output = a.gain(1.0);
                let first = a.add(PrimitiveSpec::Filter {
                    mode: FilterMode::Allpass,
                    frequency: DEFAULT_CUTOFF,
                    q: 0.7,
                });
                let second = a.add(PrimitiveSpec::Filter {
                    mode: FilterMode::Allpass,
                    frequency: DEFAULT_CUTOFF,
                    q: 0.7,
                });
                a.wire(input, first);
                a.wire(first, second);
                a.wire(second, output);
                a.wire(input, output);
                let (lfo, depth) = self.lfo(&mut a, DEFAULT_PHASER_SPEED, DEFAULT_PHASER_DEPTH);
                a.wire_param(depth, ParamHandle::new(first, AudioParamKind::Frequency));
                a.wire_param(depth, ParamHandle::new(second, AudioParamKind::Frequency));
                a.expose("speed", lfo, AudioParamKind::Frequency);
                a.expose("depth", depth, AudioParamKind::Gain);
                (input, output)
            }
            ProcessorType::Tremolo => {
                let amp = a.gain(1.0 - DEFAULT_TREMOLO_DEPTH);
                let output = a.gain(1.0);
                a.wire(amp, output);
                let (lfo, depth) = self.lfo(&mut a, DEFAULT_TREMOLO_RATE, DEFAULT_TREMOLO_DEPTH);
                a.wire_param(depth, ParamHandle::new(amp, AudioParamKind::Gain));
                a.expose("rate", lfo, AudioParamKind::Frequency);
                a.expose("depth", depth, AudioParamKind::Gain);
                (amp, output)
            }
            ProcessorType::Chorus => {
                let input = a.gain(1.0);
                let line = a.add(PrimitiveSpec::Delay {
                    max_time: 0.1,
                    time: 0.02,
                });
                let wet = a.gain(0.5);
                let output = a.gain(1.0);
                a.wire(input, line);
                a.wire(line, wet);
                a.wire(wet, output);
                a.wire(input, output);
                let (lfo, depth) = self.lfo(&mut a, DEFAULT_CHORUS_RATE, DEFAULT_CHORUS_DEPTH);
                a.wire_param(depth, ParamHandle::new(line, AudioParamKind::DelayTime));
                a.expose("rate", lfo, AudioParamKind::Frequency);
                a.expose("depth", depth, AudioParamKind::Gain);
                (input, output)
            }
            ProcessorType::Reverb => {
                let sample_rate = a.host.sample_rate();
                let impulse = ImpulseResponse::synthesize(
                    self.impulse_seconds,
                    self.impulse_decay,
                    sample_rate,
                    &mut self.rng,
                );
                let input = a.gain(1.0);
                let convolver = a.add(PrimitiveSpec::Convolver {
                    impulse: Arc::new(impulse),
                });
                let wet = a.gain(DEFAULT_DIFFUSION);
                let output = a.gain(1.0);
                a.wire(input, convolver);
                a.wire(convolver, wet);
                a.wire(wet, output);
                a.wire(input, output);
                a.expose("diffusion", wet, AudioParamKind::Gain);
                (input, output)
            }
        };

        let mut node = a.finish(id, Subtype::Processor(subtype), true, Some(input), output);
        node.frequency_target = frequency_target;
        node.shaper = shaper;
        node
    }

    /// Sine LFO into a depth gain; the LFO runs for the node's lifetime
    fn lfo<H: AudioHost>(&self, a: &mut Assembly<'_, H>, rate: f64, depth: f64) -> (PrimitiveId, PrimitiveId) {
        let lfo = a.voice(PrimitiveSpec::Oscillator {
            waveform: Waveform::Sine,
            frequency: rate,
            detune: 0.0,
        });
        let scale = a.gain(depth);
        a.wire(lfo, scale);
        (lfo, scale)
    }
}
