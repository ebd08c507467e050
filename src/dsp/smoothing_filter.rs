//! Zero-phase Smoothing Filter
//!
//! 4th-order Butterworth low-pass run forward and then backward over each chunk
//! (`filtfilt` style), giving a zero-phase, 8th-order-magnitude response.
//!
//! # Edge handling
//! Each chunk is extended at both ends by an odd reflection of up to
//! `PAD_LEN` samples, and every pass starts from steady-state filter memory for
//! its first sample. Chunks are filtered independently, so samples near chunk
//! edges carry a small, bounded error compared to filtering the whole stream.
//!
//! # Lifecycle
//! - **Active**: cutoff strictly between 0 Hz and Nyquist.
//! - **Bypassed**: cutoff outside that range; chunks pass through untouched.

use crate::dsp::biquad::Biquad;

/// Reflection padding per side: three times the transfer-function length of a
/// 4th-order section pair.
const PAD_LEN: usize = 15;

/// Section Q values for a 4th-order Butterworth (1 / (2 cos(kπ/8)), k = 1, 3).
const BUTTERWORTH_Q: [f32; 2] = [0.541_196_1, 1.306_563];

/// Default cutoff (Hz).
pub const DEFAULT_CUTOFF_HZ: f32 = 8000.0;

pub struct SmoothingFilter {
    sections: [Biquad; 2],
    enabled: bool,
    cutoff_hz: f32,
    sample_rate: f32,
    // Padded working copy, sized for the expected chunk length.
    ext: Vec<f32>,
}

impl SmoothingFilter {
    pub fn new(cutoff_hz: f32, sample_rate: f32, expected_chunk: usize) -> Self {
        let mut filter = Self {
            sections: [Biquad::new(); 2],
            enabled: false,
            cutoff_hz,
            sample_rate,
            ext: Vec::with_capacity(expected_chunk + 2 * PAD_LEN),
        };
        filter.update(cutoff_hz, sample_rate);
        filter
    }

    /// True when `cutoff_hz` is a usable low-pass corner for `sample_rate`.
    pub fn cutoff_is_valid(cutoff_hz: f32, sample_rate: f32) -> bool {
        cutoff_hz.is_finite() && cutoff_hz > 0.0 && cutoff_hz < sample_rate * 0.5
    }

    pub fn update(&mut self, cutoff_hz: f32, sample_rate: f32) {
        self.cutoff_hz = cutoff_hz;
        self.sample_rate = sample_rate;
        self.enabled = Self::cutoff_is_valid(cutoff_hz, sample_rate);
        if self.enabled {
            for (section, &q) in self.sections.iter_mut().zip(BUTTERWORTH_Q.iter()) {
                section.update_lpf(cutoff_hz, q, sample_rate);
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cutoff_hz(&self) -> f32 {
        self.cutoff_hz
    }

    /// Filter `chunk` in place. Length is preserved.
    pub fn filter(&mut self, chunk: &mut [f32]) {
        let n = chunk.len();
        if !self.enabled || n == 0 {
            return;
        }
        let pad = PAD_LEN.min(n - 1);

        // Odd extension: 2·x[0] - x[i] before, 2·x[n-1] - x[n-1-i] after.
        self.ext.clear();
        let first = chunk[0];
        let last = chunk[n - 1];
        for i in (1..=pad).rev() {
            self.ext.push(2.0 * first - chunk[i]);
        }
        self.ext.extend_from_slice(chunk);
        for i in 1..=pad {
            self.ext.push(2.0 * last - chunk[n - 1 - i]);
        }

        // Forward, then backward.
        run_cascade(&mut self.sections, &mut self.ext);
        self.ext.reverse();
        run_cascade(&mut self.sections, &mut self.ext);
        self.ext.reverse();

        chunk.copy_from_slice(&self.ext[pad..pad + n]);
    }
}

/// Run the sections in series over `x`, each starting from steady state.
fn run_cascade(sections: &mut [Biquad; 2], x: &mut [f32]) {
    let Some(&x0) = x.first() else {
        return;
    };
    let mut level = x0;
    for section in sections.iter_mut() {
        level = section.prime(level);
    }
    for v in x.iter_mut() {
        let mut s = *v;
        for section in sections.iter_mut() {
            s = section.process(s);
        }
        *v = s;
    }
}
