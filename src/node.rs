//! Graph Nodes
//!
//! A node is a generator or processor built from host primitives. It exposes
//! a named parameter table, an optional audio input, an audio output, and
//! owns its outgoing edges together with the scaling elements of its
//! modulation edges.

use crate::error::GraphError;
use crate::host::{ParamHandle, PrimitiveId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Stable, collaborator-chosen node identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId(value)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Generator,
    Processor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GeneratorType {
    Sine,
    Square,
    Sawtooth,
    Triangle,
    Noise,
    SampleAndHold,
}

impl GeneratorType {
    pub const ALL: [GeneratorType; 6] = [
        GeneratorType::Sine,
        GeneratorType::Square,
        GeneratorType::Sawtooth,
        GeneratorType::Triangle,
        GeneratorType::Noise,
        GeneratorType::SampleAndHold,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            GeneratorType::Sine => "sine",
            GeneratorType::Square => "square",
            GeneratorType::Sawtooth => "sawtooth",
            GeneratorType::Triangle => "triangle",
            GeneratorType::Noise => "noise",
            GeneratorType::SampleAndHold => "sample-and-hold",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcessorType {
    Lowpass,
    Highpass,
    Bandpass,
    Delay,
    Distortion,
    Bitcrusher,
    Phaser,
    Tremolo,
    Chorus,
    Reverb,
}

impl ProcessorType {
    pub const ALL: [ProcessorType; 10] = [
        ProcessorType::Lowpass,
        ProcessorType::Highpass,
        ProcessorType::Bandpass,
        ProcessorType::Delay,
        ProcessorType::Distortion,
        ProcessorType::Bitcrusher,
        ProcessorType::Phaser,
        ProcessorType::Tremolo,
        ProcessorType::Chorus,
        ProcessorType::Reverb,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ProcessorType::Lowpass => "lowpass",
            ProcessorType::Highpass => "highpass",
            ProcessorType::Bandpass => "bandpass",
            ProcessorType::Delay => "delay",
            ProcessorType::Distortion => "distortion",
            ProcessorType::Bitcrusher => "bitcrusher",
            ProcessorType::Phaser => "phaser",
            ProcessorType::Tremolo => "tremolo",
            ProcessorType::Chorus => "chorus",
            ProcessorType::Reverb => "reverb",
        }
    }
}

/// Subtype of a node, which also fixes its kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subtype {
    Generator(GeneratorType),
    Processor(ProcessorType),
}

impl Subtype {
    pub fn kind(&self) -> NodeKind {
        match self {
            Subtype::Generator(_) => NodeKind::Generator,
            Subtype::Processor(_) => NodeKind::Processor,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Subtype::Generator(g) => g.name(),
            Subtype::Processor(p) => p.name(),
        }
    }

    /// Whether `name` denotes the same quantity, in the same units, on both
    /// subtypes. Equal names alone are not enough: a phaser's `depth` is in
    /// Hz while a tremolo's is a gain.
    pub fn shares_param(&self, other: Subtype, name: &str) -> bool {
        if *self == other {
            return true;
        }
        match (param_family(*self, name), param_family(other, name)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParamFamily {
    Oscillator,
    Filter,
    Modulation,
}

fn param_family(subtype: Subtype, name: &str) -> Option<ParamFamily> {
    use GeneratorType::*;
    use ProcessorType::*;

    match (subtype, name) {
        (Subtype::Generator(Sine | Square | Sawtooth | Triangle), "detune") => {
            Some(ParamFamily::Oscillator)
        }
        (Subtype::Processor(Lowpass | Highpass | Bandpass), "cutoff" | "resonance") => {
            Some(ParamFamily::Filter)
        }
        (Subtype::Processor(Tremolo | Chorus), "rate") => Some(ParamFamily::Modulation),
        _ => None,
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subtype {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        // Accept the short alias used by older patch documents.
        let name = if name == "sample-hold" || name == "samplehold" {
            "sample-and-hold".to_string()
        } else {
            name
        };
        if let Some(g) = GeneratorType::ALL.iter().find(|g| g.name() == name) {
            return Ok(Subtype::Generator(*g));
        }
        if let Some(p) = ProcessorType::ALL.iter().find(|p| p.name() == name) {
            return Ok(Subtype::Processor(*p));
        }
        Err(GraphError::UnknownSubtype(s.to_string()))
    }
}

impl From<GeneratorType> for Subtype {
    fn from(value: GeneratorType) -> Self {
        Subtype::Generator(value)
    }
}

impl From<ProcessorType> for Subtype {
    fn from(value: ProcessorType) -> Self {
        Subtype::Processor(value)
    }
}

/// One entry of a node's parameter table
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamSlot {
    /// A host parameter that can be ramped and modulated
    Automatable(ParamHandle),
    /// A plain value held by the node itself
    Literal(f64),
}

impl ParamSlot {
    pub fn handle(&self) -> Option<ParamHandle> {
        match self {
            ParamSlot::Automatable(handle) => Some(*handle),
            ParamSlot::Literal(_) => None,
        }
    }
}

/// Physical kind of an edge, derived from its endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Source output wired into the destination's audio input
    AudioChain,
    /// Source drives the destination's primary parameter through a scaling element
    ParameterModulation,
    /// Source drives the destination's frequency-like target through a scaling element
    FrequencyModulation,
}

/// Default modulation targets, in priority order
pub const PRIMARY_PARAM_PRIORITY: [&str; 7] = [
    "cutoff",
    "time",
    "amount",
    "speed",
    "rate",
    "bits",
    "diffusion",
];

/// Which waveshaper table a node regenerates on parameter updates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ShaperCurve {
    Distortion,
    Bitcrush,
}

/// Waveshaper owned by a distortion or bitcrusher node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shaper {
    pub primitive: PrimitiveId,
    pub curve: ShaperCurve,
    /// Parameter name whose updates regenerate the curve
    pub param: &'static str,
    /// Current curve setting (`k` or bit depth)
    pub setting: f64,
}

/// Per-color gain stages of a noise generator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoiseMix {
    pub brown: ParamHandle,
    pub pink: ParamHandle,
    pub white: ParamHandle,
}

/// A live generator or processor
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) subtype: Subtype,
    pub(crate) audible: bool,
    pub(crate) params: BTreeMap<&'static str, ParamSlot>,
    pub(crate) input: Option<PrimitiveId>,
    pub(crate) output: PrimitiveId,
    /// Every primitive the node owns, output and input included
    pub(crate) primitives: Vec<PrimitiveId>,
    /// Sources that run until the node is removed
    pub(crate) voices: Vec<PrimitiveId>,
    pub(crate) frequency_target: Option<ParamHandle>,
    pub(crate) shaper: Option<Shaper>,
    pub(crate) noise: Option<NoiseMix>,
    pub(crate) outgoing: BTreeSet<NodeId>,
    pub(crate) modulators: BTreeMap<NodeId, PrimitiveId>,
    pub(crate) master_linked: bool,
    /// Last value requested through a parameter update, per automatable parameter
    pub(crate) resting: BTreeMap<&'static str, f64>,
}

impl Node {
    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn subtype(&self) -> Subtype {
        self.subtype
    }

    pub fn kind(&self) -> NodeKind {
        self.subtype.kind()
    }

    pub fn audible(&self) -> bool {
        self.audible
    }

    /// Whether outgoing edges carry program audio. Processors always do;
    /// their flag only decides master-bus membership.
    pub fn routes_audio(&self) -> bool {
        self.audible || self.kind() == NodeKind::Processor
    }

    pub fn output(&self) -> PrimitiveId {
        self.output
    }

    pub fn outgoing(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.outgoing.iter().copied()
    }

    pub fn has_edge_to(&self, to: NodeId) -> bool {
        self.outgoing.contains(&to)
    }

    /// Scaling element owned for a modulation edge to `to`
    pub fn modulator(&self, to: NodeId) -> Option<PrimitiveId> {
        self.modulators.get(&to).copied()
    }

    pub fn modulator_count(&self) -> usize {
        self.modulators.len()
    }

    pub fn is_master_linked(&self) -> bool {
        self.master_linked
    }

    /// `audible && no outgoing edges`
    pub fn wants_master_link(&self) -> bool {
        self.audible && self.outgoing.is_empty()
    }

    pub fn primitives(&self) -> &[PrimitiveId] {
        &self.primitives
    }

    pub fn voices(&self) -> &[PrimitiveId] {
        &self.voices
    }

    pub fn shaper(&self) -> Option<&Shaper> {
        self.shaper.as_ref()
    }
}

/// Nodes that accept program audio
pub trait AudioSink {
    fn audio_input(&self) -> Option<PrimitiveId>;
}

/// Nodes with a pitch- or cutoff-like parameter
pub trait FrequencyModulatable {
    fn frequency_target(&self) -> Option<ParamHandle>;
}

/// Nodes exposing a named parameter table
pub trait ParameterHost {
    fn param(&self, name: &str) -> Option<&ParamSlot>;

    fn param_names(&self) -> Vec<&'static str>;

    /// First automatable parameter in [`PRIMARY_PARAM_PRIORITY`] order
    fn primary_param(&self) -> Option<(&'static str, ParamHandle)> {
        PRIMARY_PARAM_PRIORITY.iter().find_map(|&name| {
            self.param(name)
                .and_then(ParamSlot::handle)
                .map(|handle| (name, handle))
        })
    }
}

impl AudioSink for Node {
    fn audio_input(&self) -> Option<PrimitiveId> {
        self.input
    }
}

impl FrequencyModulatable for Node {
    fn frequency_target(&self) -> Option<ParamHandle> {
        self.frequency_target
    }
}

impl ParameterHost for Node {
    fn param(&self, name: &str) -> Option<&ParamSlot> {
        self.params.get(name)
    }

    fn param_names(&self) -> Vec<&'static str> {
        self.params.keys().copied().collect()
    }
}

/// Resolved routing of a prospective edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Route {
    Direct(PrimitiveId),
    Modulate {
        kind: EdgeKind,
        target: ParamHandle,
        param: &'static str,
    },
}

impl Route {
    pub(crate) fn kind(&self) -> EdgeKind {
        match self {
            Route::Direct(_) => EdgeKind::AudioChain,
            Route::Modulate { kind, .. } => *kind,
        }
    }
}

/// Derive how `source_audible` output should reach `dest`
///
/// Returns `None` when the destination accepts neither audio nor
/// frequency modulation.
pub(crate) fn resolve_route<D>(source_audible: bool, dest: &D) -> Option<Route>
where
    D: AudioSink + FrequencyModulatable + ParameterHost,
{
    if let Some(input) = dest.audio_input() {
        if source_audible {
            return Some(Route::Direct(input));
        }
        if let Some((param, target)) = dest.primary_param() {
            return Some(Route::Modulate {
                kind: EdgeKind::ParameterModulation,
                target,
                param,
            });
        }
    }
    dest.frequency_target().map(|target| Route::Modulate {
        kind: EdgeKind::FrequencyModulation,
        target,
        param: "frequency",
    })
}

/// Kind of the edge a source with `source_audible` would form into `dest`
pub fn derive_edge_kind<D>(source_audible: bool, dest: &D) -> Option<EdgeKind>
where
    D: AudioSink + FrequencyModulatable + ParameterHost,
{
    resolve_route(source_audible, dest).map(|route| route.kind())
}
