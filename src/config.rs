//! Engine Configuration
//!
//! Tuning for the routing graph. Every field has a default, so a partial
//! JSON document is a valid configuration.

use crate::error::GraphError;
use crate::param::ParamRange;
use serde::{Deserialize, Serialize};

/// Modulation depth applied by a scaling element, per destination parameter
///
/// A modulation source with unit amplitude swings the destination by
/// ± the listed amount, in the destination parameter's own units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulationDepths {
    /// Filter cutoff, Hz
    pub cutoff: f64,
    /// Delay time, seconds
    pub time: f64,
    /// Distortion drive, linear gain. Kept below the resting drive of 1 so
    /// the swing never inverts the signal.
    pub amount: f64,
    /// Phaser sweep rate, Hz
    pub speed: f64,
    /// Tremolo/chorus rate, Hz
    pub rate: f64,
    /// Bitcrusher drive, linear gain, bounded like `amount`
    pub bits: f64,
    /// Reverb wet level
    pub diffusion: f64,
    /// Frequency modulation of another generator, Hz
    pub frequency: f64,
}

impl Default for ModulationDepths {
    fn default() -> Self {
        Self {
            cutoff: 1500.0,
            time: 0.05,
            amount: 0.8,
            speed: 2.0,
            rate: 4.0,
            bits: 0.8,
            diffusion: 0.5,
            frequency: 100.0,
        }
    }
}

impl ModulationDepths {
    /// Depth for a named destination parameter
    pub fn for_param(&self, name: &str) -> f64 {
        match name {
            "cutoff" => self.cutoff,
            "time" => self.time,
            "amount" => self.amount,
            "speed" => self.speed,
            "rate" => self.rate,
            "bits" => self.bits,
            "diffusion" => self.diffusion,
            _ => self.frequency,
        }
    }
}

/// Tuning of disturbance (impact) events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisturbanceConfig {
    /// Impact velocity mapped to full intensity
    pub reference_velocity: f64,
    /// Peak level of a full-intensity voice
    pub peak_gain: f64,
    /// Detune excursion per unit of velocity, cents
    pub detune_cents: f64,
    /// Cutoff excursion at full intensity, as a fraction of the resting cutoff
    pub cutoff_swing: f64,
    /// Time constant for perturbations settling back, seconds
    pub settle_time: f64,
    /// Cutoff of the spark highpass for positive / negative velocity, Hz
    pub spark_cutoffs: (f64, f64),
}

impl Default for DisturbanceConfig {
    fn default() -> Self {
        Self {
            reference_velocity: 10.0,
            peak_gain: 0.4,
            detune_cents: 30.0,
            cutoff_swing: 0.6,
            settle_time: 0.12,
            spark_cutoffs: (6000.0, 2500.0),
        }
    }
}

/// Configuration for an [`AudioGraph`](crate::graph::AudioGraph)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Sample rate requested from the host
    pub sample_rate: f64,
    /// Length of each noise table, seconds
    pub noise_seconds: f64,
    /// Seed for noise, impulse and step tables; random when absent
    pub seed: Option<u64>,
    /// Exponential time constant for parameter changes, seconds
    pub smoothing_time_constant: f64,
    /// Master bus level when unmuted
    pub master_gain: f64,
    /// Range of the noise generator's morph control, Hz
    pub morph_range: ParamRange,
    /// Reverb impulse length, seconds
    pub impulse_seconds: f64,
    /// Reverb impulse envelope exponent
    pub impulse_decay: f64,
    /// Number of points in waveshaper tables
    pub curve_samples: usize,
    /// Number of held values in a sample-and-hold step table
    pub step_count: usize,
    pub modulation: ModulationDepths,
    pub disturbance: DisturbanceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            noise_seconds: 2.0,
            seed: None,
            smoothing_time_constant: 0.015,
            master_gain: 0.8,
            morph_range: ParamRange::Exponential {
                min: 20.0,
                max: 20000.0,
            },
            impulse_seconds: 2.0,
            impulse_decay: 2.0,
            curve_samples: 4096,
            step_count: 1024,
            modulation: ModulationDepths::default(),
            disturbance: DisturbanceConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Self::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_noise_seconds(mut self, seconds: f64) -> Self {
        self.noise_seconds = seconds;
        self
    }

    pub fn with_impulse_seconds(mut self, seconds: f64) -> Self {
        self.impulse_seconds = seconds;
        self
    }

    pub fn with_smoothing(mut self, time_constant: f64) -> Self {
        self.smoothing_time_constant = time_constant;
        self
    }

    pub fn with_master_gain(mut self, gain: f64) -> Self {
        self.master_gain = gain;
        self
    }

    pub fn with_modulation(mut self, modulation: ModulationDepths) -> Self {
        self.modulation = modulation;
        self
    }

    /// Number of samples in each noise table
    pub fn noise_len(&self) -> usize {
        (self.sample_rate * self.noise_seconds).round().max(1.0) as usize
    }

    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, GraphError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, GraphError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
