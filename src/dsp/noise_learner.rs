//! Noise Profile Learner (fixed calibration window)
//!
//! Collects the first `R · noise_learning_seconds` samples of a session and turns
//! them into a single magnitude spectrum used as the subtraction reference.
//!
//! Design goals
//! - Learning is a one-shot calibration phase, not a running estimate.
//! - `accumulate()` never allocates: the buffer is sized once at construction.
//! - The FFT for the full window is planned up front, so `finalize()` only runs it.
//!
//! Notes
//! - When a chunk overruns the window, the oldest samples are dropped and the most
//!   recent window is kept.
//! - The profile is the full complex-FFT magnitude (length = window), not a
//!   one-sided spectrum, so it lines up bin-for-bin with a same-length chunk.

use crate::dsp::utils::make_hann_window;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Magnitude spectrum of the learned ambient noise. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct NoiseProfile {
    magnitudes: Box<[f32]>,
}

impl NoiseProfile {
    pub fn from_magnitudes(magnitudes: Vec<f32>) -> Self {
        Self {
            magnitudes: magnitudes.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.magnitudes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.magnitudes.is_empty()
    }

    pub fn magnitudes(&self) -> &[f32] {
        &self.magnitudes
    }
}

pub struct NoiseProfileLearner {
    fft: Arc<dyn Fft<f32>>,
    fft_scratch: Vec<Complex<f32>>,
    spectrum: Vec<Complex<f32>>,
    window: Vec<f32>,

    buffer: Vec<f32>,
    capacity: usize,
    sample_rate: f32,
    finalized: bool,
}

impl NoiseProfileLearner {
    /// `capacity` is the learning window in samples (clamped to at least one).
    pub fn new(capacity: usize, sample_rate: f32) -> Self {
        let capacity = capacity.max(1);
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(capacity);
        let fft_scratch_len = fft.get_inplace_scratch_len();

        Self {
            fft,
            fft_scratch: vec![Complex::default(); fft_scratch_len],
            spectrum: vec![Complex::default(); capacity],
            window: make_hann_window(capacity),
            buffer: Vec::with_capacity(capacity),
            capacity,
            sample_rate: sample_rate.max(1.0),
            finalized: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append a chunk. Non-finite samples are stored as silence.
    pub fn accumulate(&mut self, chunk: &[f32]) {
        if self.finalized {
            return;
        }

        // Only the newest `capacity` samples of the chunk can survive.
        let chunk = if chunk.len() > self.capacity {
            &chunk[chunk.len() - self.capacity..]
        } else {
            chunk
        };

        let overflow = (self.buffer.len() + chunk.len()).saturating_sub(self.capacity);
        if overflow > 0 {
            self.buffer.drain(..overflow);
        }

        self.buffer.extend(
            chunk
                .iter()
                .map(|&v| if v.is_finite() { v } else { 0.0 }),
        );
    }

    /// True once the window is full.
    pub fn is_ready(&self) -> bool {
        self.buffer.len() >= self.capacity
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// 0..1 progress through the learning window (useful for status displays)
    pub fn progress(&self) -> f32 {
        (self.buffer.len() as f32 / self.capacity as f32).clamp(0.0, 1.0)
    }

    pub fn remaining_seconds(&self) -> f32 {
        let remaining = self.capacity.saturating_sub(self.buffer.len());
        remaining as f32 / self.sample_rate
    }

    /// Window + FFT the collected buffer into a [`NoiseProfile`].
    ///
    /// Returns `None` if the window is not yet full or a profile was already
    /// produced; the learner hands out exactly one profile per session.
    pub fn finalize(&mut self) -> Option<NoiseProfile> {
        if self.finalized || !self.is_ready() {
            return None;
        }

        for ((bin, &x), &w) in self
            .spectrum
            .iter_mut()
            .zip(self.buffer.iter())
            .zip(self.window.iter())
        {
            *bin = Complex::new(x * w, 0.0);
        }
        self.fft
            .process_with_scratch(&mut self.spectrum, &mut self.fft_scratch);

        let magnitudes: Vec<f32> = self.spectrum.iter().map(|c| c.norm()).collect();
        self.finalized = true;
        Some(NoiseProfile::from_magnitudes(magnitudes))
    }

    /// Forget everything collected so far and allow a new profile to be learned.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.finalized = false;
    }
}
