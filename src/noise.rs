//! Noise Synthesis
//!
//! Precomputed looping noise tables shared by every noise generator node,
//! the sample-and-hold step table and disturbance bursts. The tables are
//! generated once per graph and handed to the host as shared buffers.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Spectral color of a noise table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoiseColor {
    Brown,
    Pink,
    White,
}

/// Pink noise filter state (Paul Kellet's economy cascade)
///
/// Six one-pole sections with fixed coefficients, driven by white noise.
#[derive(Debug, Clone, Default)]
struct PinkFilter {
    b: [f64; 6],
}

impl PinkFilter {
    const POLES: [f64; 6] = [0.99886, 0.99332, 0.96900, 0.86650, 0.55000, -0.7616];
    const GAINS: [f64; 6] = [
        0.0555179, 0.0750759, 0.1538520, 0.3104856, 0.5329522, -0.0168980,
    ];
    const DIRECT: f64 = 0.5362;
    const SCALE: f64 = 0.11;

    fn sample(&mut self, white: f64) -> f64 {
        let mut sum = white * Self::DIRECT;
        for ((state, pole), gain) in self.b.iter_mut().zip(Self::POLES).zip(Self::GAINS) {
            *state = pole * *state + white * gain;
            sum += *state;
        }
        sum * Self::SCALE
    }
}

/// Brown (red) noise: a leaky integrator of white noise
#[derive(Debug, Clone, Default)]
struct BrownFilter {
    last: f64,
}

impl BrownFilter {
    const SCALE: f64 = 3.5;

    fn sample(&mut self, white: f64) -> f64 {
        self.last = (self.last + 0.02 * white) / 1.02;
        self.last * Self::SCALE
    }
}

/// The three shared noise tables, all of equal length
#[derive(Debug, Clone)]
pub struct NoiseBank {
    white: Arc<[f32]>,
    pink: Arc<[f32]>,
    brown: Arc<[f32]>,
}

impl NoiseBank {
    /// Generate `len` samples of each color from one white sequence
    pub fn generate<R: Rng + ?Sized>(len: usize, rng: &mut R) -> Self {
        let mut pink_filter = PinkFilter::default();
        let mut brown_filter = BrownFilter::default();

        let mut white = Vec::with_capacity(len);
        let mut pink = Vec::with_capacity(len);
        let mut brown = Vec::with_capacity(len);

        for _ in 0..len {
            let w: f64 = rng.gen_range(-1.0..=1.0);
            white.push(w as f32);
            pink.push(pink_filter.sample(w) as f32);
            brown.push(brown_filter.sample(w) as f32);
        }

        Self {
            white: white.into(),
            pink: pink.into(),
            brown: brown.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.white.len()
    }

    pub fn is_empty(&self) -> bool {
        self.white.is_empty()
    }

    pub fn buffer(&self, color: NoiseColor) -> Arc<[f32]> {
        match color {
            NoiseColor::Brown => Arc::clone(&self.brown),
            NoiseColor::Pink => Arc::clone(&self.pink),
            NoiseColor::White => Arc::clone(&self.white),
        }
    }

    /// First `count` white samples, used as a sample-and-hold step table
    pub fn step_table(&self, count: usize) -> Arc<[f32]> {
        let count = count.min(self.white.len()).max(1);
        match self.white.get(..count) {
            Some(slice) => Arc::from(slice),
            None => Arc::from(vec![0.0_f32]),
        }
    }
}

/// Mix gains for the brown, pink and white sources of a noise node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MorphGains {
    pub brown: f64,
    pub pink: f64,
    pub white: f64,
}

impl MorphGains {
    /// Single continuous three-stop crossfade over `position` in 0–1
    ///
    /// 0.0 is pure brown, 0.5 pure pink, 1.0 pure white. Brown only ever
    /// falls and white only ever rises as the position increases.
    pub fn at(position: f64) -> Self {
        let p = position.clamp(0.0, 1.0);
        if p <= 0.5 {
            let t = p * 2.0;
            Self {
                brown: 1.0 - t,
                pink: t,
                white: 0.0,
            }
        } else {
            let t = (p - 0.5) * 2.0;
            Self {
                brown: 0.0,
                pink: 1.0 - t,
                white: t,
            }
        }
    }

    pub fn get(&self, color: NoiseColor) -> f64 {
        match color {
            NoiseColor::Brown => self.brown,
            NoiseColor::Pink => self.pink,
            NoiseColor::White => self.white,
        }
    }
}
