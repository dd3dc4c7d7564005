//! Transfer Curves and Impulse Responses
//!
//! Waveshaper tables for the distortion and bitcrusher processors, and the
//! synthetic stereo impulse used by the reverb convolver.
//!
//! # Waveshaping
//!
//! A waveshaper maps each input sample `x` in [-1, 1] through a lookup table.
//! The table index spans the input range linearly:
//!
//! ```text
//! x = 2·i / (n - 1) - 1
//! ```
//!
//! Distortion uses a soft-knee curve whose knee sharpens with `k`:
//!
//! ```text
//! f(x) = (3 + k)·x·(20·π/180) / (π + k·|x|)
//! ```
//!
//! The bitcrusher quantizes to `2^bits` steps per unit:
//!
//! ```text
//! f(x) = round(x·2^bits) / 2^bits
//! ```

use rand::Rng;
use std::f64::consts::PI;
use std::sync::Arc;

/// Lowest and highest bit depth accepted by the bitcrusher curve
pub const BITS_RANGE: (f64, f64) = (1.0, 16.0);

fn table_x(index: usize, samples: usize) -> f64 {
    if samples < 2 {
        return 0.0;
    }
    2.0 * index as f64 / (samples - 1) as f64 - 1.0
}

/// Soft-knee distortion table for drive amount `k`
pub fn distortion_curve(amount: f64, samples: usize) -> Arc<[f32]> {
    let k = amount.max(0.0);
    let deg = 20.0 * PI / 180.0;
    (0..samples)
        .map(|i| {
            let x = table_x(i, samples);
            ((3.0 + k) * x * deg / (PI + k * x.abs())) as f32
        })
        .collect()
}

/// Quantizing table for the given bit depth
pub fn bitcrush_curve(bits: f64, samples: usize) -> Arc<[f32]> {
    let bits = bits.clamp(BITS_RANGE.0, BITS_RANGE.1);
    let steps = 2.0_f64.powf(bits);
    (0..samples)
        .map(|i| {
            let x = table_x(i, samples);
            ((x * steps).round() / steps) as f32
        })
        .collect()
}

/// Stereo impulse response for a convolver
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseResponse {
    pub left: Vec<f32>,
    pub right: Vec<f32>,
}

impl ImpulseResponse {
    /// Exponentially decaying noise, `rand(-1,1)·(1 - j/len)^decay` per channel
    pub fn synthesize<R: Rng + ?Sized>(
        seconds: f64,
        decay: f64,
        sample_rate: f64,
        rng: &mut R,
    ) -> Self {
        let len = (sample_rate * seconds).round().max(1.0) as usize;
        let mut channel = || -> Vec<f32> {
            (0..len)
                .map(|j| {
                    let envelope = (1.0 - j as f64 / len as f64).powf(decay);
                    (rng.gen_range(-1.0..=1.0) * envelope) as f32
                })
                .collect()
        };
        let left = channel();
        let right = channel();
        Self { left, right }
    }

    pub fn len(&self) -> usize {
        self.left.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty()
    }
}
