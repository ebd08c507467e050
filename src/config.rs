//! Session configuration.
//!
//! Every field has a default, so a JSON file only needs the values it changes:
//!
//! ```json
//! { "sample_rate": 48000, "noise_reduction_factor": 0.5 }
//! ```

use crate::dsp::level_meter::DEFAULT_CALIBRATION_OFFSET_DB;
use crate::dsp::limiter::DEFAULT_CEILING_DB;
use crate::dsp::smoothing_filter::{SmoothingFilter, DEFAULT_CUTOFF_HZ};
use crate::dsp::spectral_subtractor::DEFAULT_REDUCTION_FACTOR;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_NOISE_LEARNING_SECONDS: f32 = 3.0;

/// Longest accepted learning period.
pub const MAX_LEARNING_SECONDS: f32 = 60.0;
/// Largest learning window in samples (about 95 s at 44.1 kHz). The learner
/// buffer, FFT plan and subtractor frames are all sized from it.
pub const MAX_LEARNING_WINDOW: usize = 1 << 22;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub sample_rate: u32,
    pub chunk_size: usize,
    pub safety_ceiling_db: f32,
    pub noise_learning_seconds: f32,
    /// Over-subtraction factor α, 0..1.
    pub noise_reduction_factor: f32,
    pub low_pass_cutoff_hz: f32,
    /// Digital full scale to SPL approximation. Not a measured calibration.
    pub calibration_offset_db: f32,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            safety_ceiling_db: DEFAULT_CEILING_DB,
            noise_learning_seconds: DEFAULT_NOISE_LEARNING_SECONDS,
            noise_reduction_factor: DEFAULT_REDUCTION_FACTOR,
            low_pass_cutoff_hz: DEFAULT_CUTOFF_HZ,
            calibration_offset_db: DEFAULT_CALIBRATION_OFFSET_DB,
        }
    }
}

impl SafetyConfig {
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let cfg: SafetyConfig =
            serde_json::from_str(json).context("failed to parse safety config JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config '{}'", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("invalid config '{}'", path.display()))
    }

    /// Reject values the engine cannot run with. Values it can run with but
    /// that disable a stage are logged as warnings.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sample_rate == 0 {
            bail!("sample_rate must be > 0");
        }
        if self.chunk_size == 0 {
            bail!("chunk_size must be > 0");
        }
        if !self.safety_ceiling_db.is_finite() {
            bail!("safety_ceiling_db must be finite");
        }
        if !self.calibration_offset_db.is_finite() {
            bail!("calibration_offset_db must be finite");
        }
        if !(self.noise_learning_seconds.is_finite() && self.noise_learning_seconds > 0.0) {
            bail!(
                "noise_learning_seconds must be > 0 (got {})",
                self.noise_learning_seconds
            );
        }
        if self.noise_learning_seconds > MAX_LEARNING_SECONDS {
            bail!(
                "noise_learning_seconds must be <= {} (got {})",
                MAX_LEARNING_SECONDS,
                self.noise_learning_seconds
            );
        }
        let window = self.learning_window_len();
        if window > MAX_LEARNING_WINDOW {
            bail!(
                "learning window of {} samples exceeds the maximum of {}; lower noise_learning_seconds or sample_rate",
                window,
                MAX_LEARNING_WINDOW
            );
        }
        if !(0.0..=1.0).contains(&self.noise_reduction_factor) {
            bail!(
                "noise_reduction_factor must be within 0..=1 (got {})",
                self.noise_reduction_factor
            );
        }
        if !SmoothingFilter::cutoff_is_valid(self.low_pass_cutoff_hz, self.sample_rate as f32) {
            log::warn!(
                "low_pass_cutoff_hz {} is outside (0, {}) Hz; smoothing filter disabled",
                self.low_pass_cutoff_hz,
                self.sample_rate as f32 * 0.5
            );
        }
        Ok(())
    }

    /// Learning window in samples: `round(R · noise_learning_seconds)`, at least 1.
    pub fn learning_window_len(&self) -> usize {
        let samples = (self.sample_rate as f64 * self.noise_learning_seconds as f64).round();
        if samples.is_finite() && samples >= 1.0 {
            samples as usize
        } else {
            1
        }
    }

    /// Real-time budget for one nominal chunk, in seconds.
    pub fn chunk_budget_seconds(&self) -> f32 {
        self.chunk_size as f32 / self.sample_rate.max(1) as f32
    }
}
