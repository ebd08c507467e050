//! Chunk representation at the ingestion boundary.
//!
//! Sources hand the engine either 16-bit PCM or normalized float samples; the
//! engine always hands back the same variant and length it was given.

use crate::dsp::utils::I16_SCALE;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    Int16,
    Float32,
}

/// One block of mono samples.
#[derive(Debug, Clone, PartialEq)]
pub enum Chunk {
    Int16(Vec<i16>),
    Float32(Vec<f32>),
}

impl Chunk {
    pub fn len(&self) -> usize {
        match self {
            Chunk::Int16(s) => s.len(),
            Chunk::Float32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> SampleFormat {
        match self {
            Chunk::Int16(_) => SampleFormat::Int16,
            Chunk::Float32(_) => SampleFormat::Float32,
        }
    }

    /// Write the samples into `out` in the floating domain, replacing its contents.
    pub fn to_f32_into(&self, out: &mut Vec<f32>) {
        out.clear();
        match self {
            Chunk::Int16(s) => out.extend(s.iter().map(|&v| i16_to_f32(v))),
            Chunk::Float32(s) => out.extend_from_slice(s),
        }
    }

    /// Build a chunk of `format` from floating samples.
    ///
    /// Samples are clamped to [-1, 1] before any fixed-point conversion.
    pub fn from_f32(format: SampleFormat, samples: &[f32]) -> Chunk {
        match format {
            SampleFormat::Int16 => Chunk::Int16(samples.iter().map(|&v| f32_to_i16(v)).collect()),
            SampleFormat::Float32 => Chunk::Float32(
                samples
                    .iter()
                    .map(|&v| if v.is_finite() { v.clamp(-1.0, 1.0) } else { 0.0 })
                    .collect(),
            ),
        }
    }
}

#[inline]
pub fn i16_to_f32(v: i16) -> f32 {
    v as f32 / I16_SCALE
}

/// Clamp, scale and saturate to i16. Non-finite input becomes silence.
#[inline]
pub fn f32_to_i16(v: f32) -> i16 {
    if !v.is_finite() {
        return 0;
    }
    let scaled = v.clamp(-1.0, 1.0) * I16_SCALE;
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_i16_extremes() {
        assert_eq!(i16_to_f32(i16::MIN), -1.0);
        assert!(i16_to_f32(i16::MAX) < 1.0);
        assert_eq!(f32_to_i16(1.0), i16::MAX);
        assert_eq!(f32_to_i16(-1.0), i16::MIN);
        assert_eq!(f32_to_i16(7.5), i16::MAX);
        assert_eq!(f32_to_i16(f32::NAN), 0);
    }

    #[test]
    fn test_i16_samples_survive_float_domain() {
        let chunk = Chunk::Int16(vec![-32768, -1, 0, 1, 12345, 32767]);
        let mut f = Vec::new();
        chunk.to_f32_into(&mut f);
        assert_eq!(Chunk::from_f32(SampleFormat::Int16, &f), chunk);
    }

    #[test]
    fn test_float_output_is_clamped() {
        let c = Chunk::from_f32(SampleFormat::Float32, &[1.5, -2.0, f32::NAN, 0.25]);
        assert_eq!(c, Chunk::Float32(vec![1.0, -1.0, 0.0, 0.25]));
        assert_eq!(c.format(), SampleFormat::Float32);
        assert_eq!(c.len(), 4);
    }
}
