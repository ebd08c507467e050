pub mod biquad;
pub mod level_meter;
pub mod limiter;
pub mod noise_learner;
pub mod smoothing_filter;
pub mod spectral_subtractor;
pub mod utils;

pub use biquad::Biquad;
pub use level_meter::LevelMeter;
pub use limiter::SafetyLimiter;
pub use noise_learner::{NoiseProfile, NoiseProfileLearner};
pub use smoothing_filter::SmoothingFilter;
pub use spectral_subtractor::{SpectralSubtractor, SubtractionOutcome};
