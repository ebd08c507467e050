//! Spectral Subtractor (learned-profile noise removal)
//!
//! # Perceptual Contract
//! - **Target Source**: Any signal over a stationary background (room tone, fans, hiss).
//! - **Intended Effect**: Remove the learned noise magnitude spectrum from each chunk.
//! - **Failure Modes**:
//!   - "Musical noise" if subtraction is allowed to reach zero; held off by a 10% floor.
//!   - Non-stationary noise (door slams, speech in the background) is not modeled.
//! - **Will Not Do**:
//!   - Amplify any bin.
//!   - Re-learn the profile.
//!
//! # Model
//! 1. Hann-window the chunk, FFT to magnitude `M` and phase `φ`.
//! 2. `M' = max(M - α·profile, 0.1·M)`.
//! 3. Inverse FFT of `M'·e^(iφ)`, real part. This is the enhanced *windowed* frame.
//! 4. The chunk minus the removed component (`window·chunk - enhanced`) is written
//!    back, so the un-windowed signal is otherwise left intact and `α = 0` is an
//!    identity up to FFT rounding. Plain windowed reconstruction (emitting the
//!    enhanced frame itself) is deliberately not used: it would taper every chunk.
//!
//! The FFT length is fixed to the profile length at construction. Chunks of any
//! other length are returned unchanged.

use crate::dsp::noise_learner::NoiseProfile;
use crate::dsp::utils::{make_hann_window, MAG_FLOOR};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Serialize;
use std::sync::Arc;

/// Fraction of the original magnitude every bin keeps.
pub const SPECTRAL_FLOOR: f32 = 0.1;

/// Default over-subtraction factor.
pub const DEFAULT_REDUCTION_FACTOR: f32 = 0.7;

/// What the subtractor did with a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubtractionOutcome {
    Applied,
    SkippedLengthMismatch,
    /// No profile exists yet (still learning, or bypassed).
    NotRun,
}

pub struct SpectralSubtractor {
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    spectrum: Vec<Complex<f32>>,
    window: Vec<f32>,
    frame_len: usize,
    alpha: f32,
}

impl SpectralSubtractor {
    /// Plan for frames of `frame_len` samples (the profile length).
    pub fn new(frame_len: usize, alpha: f32) -> Self {
        let frame_len = frame_len.max(1);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(frame_len);
        let ifft = planner.plan_fft_inverse(frame_len);
        let scratch_len = fft
            .get_inplace_scratch_len()
            .max(ifft.get_inplace_scratch_len());

        Self {
            fft,
            ifft,
            fft_scratch: vec![Complex::default(); scratch_len],
            spectrum: vec![Complex::default(); frame_len],
            window: make_hann_window(frame_len),
            frame_len,
            alpha: alpha.clamp(0.0, 1.0),
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f32) {
        self.alpha = alpha.clamp(0.0, 1.0);
    }

    /// Subtract `profile` from `chunk` in place.
    pub fn suppress(&mut self, chunk: &mut [f32], profile: &NoiseProfile) -> SubtractionOutcome {
        let n = self.frame_len;
        if chunk.len() != profile.len() || chunk.len() != n {
            return SubtractionOutcome::SkippedLengthMismatch;
        }

        // 1) Window + FFT
        for i in 0..n {
            self.spectrum[i] = Complex::new(chunk[i] * self.window[i], 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);

        // 2) Magnitude subtraction with floor; phase is kept by scaling the bin.
        let alpha = self.alpha;
        for (bin, &noise) in self.spectrum.iter_mut().zip(profile.magnitudes()) {
            let m = bin.norm();
            if m <= MAG_FLOOR {
                continue;
            }
            let enhanced = (m - alpha * noise).max(SPECTRAL_FLOOR * m);
            *bin *= enhanced / m;
        }

        // 3) Inverse FFT, 4) write back with the removed component taken out
        self.ifft
            .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);
        let norm = 1.0 / n as f32;
        for i in 0..n {
            let enhanced = self.spectrum[i].re * norm;
            let removed = chunk[i] * self.window[i] - enhanced;
            chunk[i] -= removed;
        }

        SubtractionOutcome::Applied
    }
}
