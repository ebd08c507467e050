
/// Floor below which a spectral magnitude is treated as empty.
pub const MAG_FLOOR: f32 = 1e-12;

/// Full-scale conversion factor between i16 PCM and the floating domain.
pub const I16_SCALE: f32 = 32768.0;

pub fn db_to_gain(db: f32) -> f32 {
    (10.0f32).powf(db / 20.0)
}

/// Root-mean-square of a frame. Energy is accumulated in f64 so long
/// windows keep their precision; non-finite samples contribute nothing.
/// Returns 0.0 for an empty frame.
pub fn frame_rms(x: &[f32]) -> f32 {
    if x.is_empty() {
        return 0.0;
    }
    let mut s = 0.0f64;
    for &v in x {
        if v.is_finite() {
            let v = v as f64;
            s += v * v;
        }
    }
    (s / x.len() as f64).sqrt() as f32
}

/// Symmetric Hann window (`0.5 - 0.5 cos(2πn / (len - 1))`).
///
/// Endpoints are exactly zero. A single-sample window is `[1.0]`.
pub fn make_hann_window(len: usize) -> Vec<f32> {
    match len {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => {
            let denom = (len - 1) as f64;
            (0..len)
                .map(|n| {
                    let phase = 2.0 * std::f64::consts::PI * n as f64 / denom;
                    (0.5 - 0.5 * phase.cos()) as f32
                })
                .collect()
        }
    }
}

/// Replace NaN and infinities with silence.
#[inline]
pub fn sanitize(x: &mut [f32]) {
    for v in x.iter_mut() {
        if !v.is_finite() {
            *v = 0.0;
        }
    }
}

#[inline]
pub fn clamp_unit(x: &mut [f32]) {
    for v in x.iter_mut() {
        *v = v.clamp(-1.0, 1.0);
    }
}
