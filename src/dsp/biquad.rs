//! Biquad Filter Implementation (IIR 2nd Order)
//!
//! Transposed direct-form II section used by the smoothing filter. Two of these
//! in cascade with Butterworth Q values form the 4th-order low-pass.
//!
//! # Design Notes
//! - Coefficients follow the RBJ cookbook (bilinear transform with prewarping),
//!   which matches the classic digital Butterworth design for cascaded sections.
//! - `prime()` loads steady-state delay values for a constant input, so a pass can
//!   start mid-signal without a step transient.
//! - All operations are safe for the audio thread (no allocations)

use std::f32::consts::PI;

/// Biquad filter implementation (IIR 2nd order)
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    a0: f32,
    a1: f32,
    a2: f32,
    b1: f32,
    b2: f32,
    z1: f32,
    z2: f32,
}

impl Default for Biquad {
    fn default() -> Self {
        Self::new()
    }
}

impl Biquad {
    pub fn new() -> Self {
        Self {
            a0: 1.0,
            a1: 0.0,
            a2: 0.0,
            b1: 0.0,
            b2: 0.0,
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Process a single sample
    #[inline]
    pub fn process(&mut self, input: f32) -> f32 {
        let out = input * self.a0 + self.z1;

        // Anti-denormal: tiny DC offset
        self.z1 = input * self.a1 + self.z2 - self.b1 * out + 1e-25;
        self.z2 = input * self.a2 - self.b2 * out + 1e-25;

        out
    }

    /// Gain of the section at 0 Hz.
    #[inline]
    pub fn dc_gain(&self) -> f32 {
        let den = 1.0 + self.b1 + self.b2;
        if den.abs() < 1e-12 {
            return 1.0;
        }
        (self.a0 + self.a1 + self.a2) / den
    }

    /// Load the delay line with the steady state reached after an infinitely long
    /// run of `x`, and return the output that state produces for `x`.
    #[inline]
    pub fn prime(&mut self, x: f32) -> f32 {
        let g = self.dc_gain();
        self.z1 = (g - self.a0) * x;
        self.z2 = (self.a2 - self.b2 * g) * x;
        g * x
    }

    // ---------------------------------------------------------------------
    // Filter design helpers (RBJ-style)
    // ---------------------------------------------------------------------

    pub fn update_lpf(&mut self, cutoff: f32, q: f32, sr: f32) {
        let w0 = 2.0 * PI * cutoff / sr;
        let alpha = w0.sin() / (2.0 * q.max(1e-6));
        let cw0 = w0.cos();

        let a0 = 1.0 + alpha;
        let inv_a0 = 1.0 / a0;

        self.a0 = ((1.0 - cw0) * 0.5) * inv_a0;
        self.a1 = (1.0 - cw0) * inv_a0;
        self.a2 = ((1.0 - cw0) * 0.5) * inv_a0;
        self.b1 = (-2.0 * cw0) * inv_a0;
        self.b2 = (1.0 - alpha) * inv_a0;
    }
}
