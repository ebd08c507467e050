//! Calibrated Level Meter
//!
//! Turns a chunk into a single loudness figure in "dB SPL-ish" units:
//! `20·log10(rms) + calibration_offset_db`.
//!
//! # Limitations
//! The calibration offset (94 dB by default) ties digital full scale to an
//! assumed acoustic level. It is an approximation carried over from practice,
//! not a measured microphone/headphone calibration, so absolute figures are only
//! as good as that assumption. Relative behaviour (ceiling decisions, metering
//! deltas) does not depend on it being exact.

use crate::dsp::utils::frame_rms;

/// Default offset mapping 0 dBFS RMS to an SPL-like scale.
pub const DEFAULT_CALIBRATION_OFFSET_DB: f32 = 94.0;

#[derive(Debug, Clone, Copy)]
pub struct LevelMeter {
    calibration_offset_db: f32,
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new(DEFAULT_CALIBRATION_OFFSET_DB)
    }
}

impl LevelMeter {
    pub fn new(calibration_offset_db: f32) -> Self {
        Self {
            calibration_offset_db,
        }
    }

    pub fn calibration_offset_db(&self) -> f32 {
        self.calibration_offset_db
    }

    /// Loudness of `chunk` in calibrated dB.
    ///
    /// Silence (RMS of exactly zero) and empty input both return
    /// `f32::NEG_INFINITY`. Never panics and never returns NaN.
    pub fn measure(&self, chunk: &[f32]) -> f32 {
        let rms = frame_rms(chunk);
        if rms > 0.0 {
            20.0 * rms.log10() + self.calibration_offset_db
        } else {
            f32::NEG_INFINITY
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::utils::I16_SCALE;

    #[test]
    fn test_silence_is_negative_infinity() {
        let meter = LevelMeter::default();
        assert_eq!(meter.measure(&[0.0; 1024]), f32::NEG_INFINITY);
        assert_eq!(meter.measure(&[]), f32::NEG_INFINITY);
    }

    #[test]
    fn test_full_scale_dc_reads_offset() {
        let meter = LevelMeter::default();
        let db = meter.measure(&[1.0; 256]);
        assert!((db - 94.0).abs() < 1e-4);
    }

    #[test]
    fn test_440hz_int16_sine_calibration() {
        // 440 Hz at 30000/32768 full scale, one 1024-sample chunk @ 44.1 kHz.
        let sr = 44100.0f32;
        let chunk: Vec<f32> = (0..1024)
            .map(|i| {
                let s = 30000.0 * (2.0 * std::f32::consts::PI * 440.0 * i as f32 / sr).sin();
                (s as i16) as f32 / I16_SCALE
            })
            .collect();
        let meter = LevelMeter::default();
        let db = meter.measure(&chunk);

        // RMS of a sine is A/sqrt(2); 1024 samples hold ~10.2 cycles so the
        // partial cycle moves the estimate by well under 0.1 dB.
        let expected = 20.0 * (30000.0 / I16_SCALE / 2.0f32.sqrt()).log10() + 94.0;
        assert!((db - expected).abs() < 0.1, "db {db} expected {expected}");
        assert!(db > 90.0 && db < 90.5);

        // Pure function of the samples.
        assert_eq!(db.to_bits(), meter.measure(&chunk).to_bits());
    }

    #[test]
    fn test_offset_is_additive() {
        let chunk = [0.1f32; 64];
        let a = LevelMeter::new(94.0).measure(&chunk);
        let b = LevelMeter::new(100.0).measure(&chunk);
        assert!((b - a - 6.0).abs() < 1e-4);
    }

    #[test]
    fn test_malformed_samples_do_not_poison_level() {
        let meter = LevelMeter::default();
        let db = meter.measure(&[f32::NAN, 0.5, f32::INFINITY, 0.5]);
        assert!(db.is_finite());
        assert_eq!(meter.measure(&[f32::NAN; 8]), f32::NEG_INFINITY);
    }
}
