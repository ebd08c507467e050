//! Safety Limiter
//!
//! # Perceptual Contract
//! - **Target Source**: Final output chunk, after noise removal and smoothing.
//! - **Intended Effect**: Keep calibrated chunk loudness at or below the safety ceiling (70 dB).
//! - **Failure Modes**:
//!   - Audible level steps between chunks when the input swings across the ceiling.
//!   - Mild saturation colour from the tanh knee on heavily limited chunks.
//! - **Will Not Do**:
//!   - Touch chunks that are already at or below the ceiling.
//!   - Split the spectrum into bands (one global ceiling only).
//!
//! # Lifecycle
//! - **Active**: Runs on every chunk once the pipeline leaves Learning.
//! - **Bypassed**: Not called at all (unsafe!).
//!
//! # Gain Model
//! `reduction_db = level - ceiling`, linear gain `10^(-reduction_db / 20)`, then a
//! soft knee `tanh(0.8·x)·0.8`. Since `tanh(y) <= y` for `y >= 0`, the knee only
//! ever lowers the level further, so the result lands at or below the ceiling.

use crate::dsp::level_meter::LevelMeter;
use crate::dsp::utils::{clamp_unit, db_to_gain};

/// Default listener ceiling in calibrated dB.
pub const DEFAULT_CEILING_DB: f32 = 70.0;

/// Drive/output scale of the tanh knee.
const KNEE_SCALE: f32 = 0.8;

pub struct SafetyLimiter {
    meter: LevelMeter,
    ceiling_db: f32,
    // Last applied reduction, for metering
    gain_reduction_db: f32,
}

impl SafetyLimiter {
    pub fn new(ceiling_db: f32, meter: LevelMeter) -> Self {
        Self {
            meter,
            ceiling_db,
            gain_reduction_db: 0.0,
        }
    }

    pub fn ceiling_db(&self) -> f32 {
        self.ceiling_db
    }

    /// Limit `chunk` in place and return its post-processing level in dB.
    pub fn limit(&mut self, chunk: &mut [f32]) -> f32 {
        let level_db = self.meter.measure(chunk);

        // Covers silence too: -inf never exceeds the ceiling.
        if level_db <= self.ceiling_db {
            self.gain_reduction_db = 0.0;
            return level_db;
        }

        let reduction_db = level_db - self.ceiling_db;
        let gain = db_to_gain(-reduction_db);
        for v in chunk.iter_mut() {
            let scaled = *v * gain;
            *v = (KNEE_SCALE * scaled).tanh() * KNEE_SCALE;
        }
        clamp_unit(chunk);

        let out_db = self.meter.measure(chunk);
        self.gain_reduction_db = if out_db.is_finite() {
            level_db - out_db
        } else {
            level_db - self.ceiling_db
        };
        out_db
    }

    /// Get current gain reduction in dB (for metering)
    pub fn gain_reduction_db(&self) -> f32 {
        self.gain_reduction_db
    }
}
