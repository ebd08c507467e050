//! Pipeline Controller
//!
//! Owns all per-session state and sequences the processing stages for each chunk.
//!
//! # Lifecycle
//! - **Learning** (initial): chunks are fed to the noise learner and passed to the
//!   output untouched. The listener gets no loudness protection during this
//!   warm-up (≈3 s by default); this is a known safety gap, not an oversight.
//! - **Active**: `subtract (if profile length matches) → smooth → limit`. The
//!   limiter runs on every Active chunk; it is what keeps output under the ceiling.
//! - **Bypassed**: manual pause from Active via [`BypassHandle`]; chunks pass
//!   through untouched until the flag is cleared, which re-enters Active.
//!
//! The Learning → Active transition fires exactly once per session, on the chunk
//! that fills the learning window. That chunk is still passed through; the next
//! chunk is the first one processed.
//!
//! # Failure semantics
//! Nothing here returns an error. Silence, short chunks, non-finite samples and
//! profile/chunk length mismatches all resolve to a defined output.

use crate::chunk::Chunk;
use crate::config::SafetyConfig;
use crate::dsp::utils::{clamp_unit, sanitize};
use crate::dsp::{
    LevelMeter, NoiseProfile, NoiseProfileLearner, SafetyLimiter, SmoothingFilter,
    SpectralSubtractor, SubtractionOutcome,
};
use crate::eg_log;
use crate::meters::{MetricsProducer, SessionMeters};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Learning,
    Active,
    Bypassed,
}

impl PipelineState {
    pub fn as_u8(self) -> u8 {
        match self {
            PipelineState::Learning => 0,
            PipelineState::Active => 1,
            PipelineState::Bypassed => 2,
        }
    }

    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => PipelineState::Active,
            2 => PipelineState::Bypassed,
            _ => PipelineState::Learning,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Learning => "learning",
            PipelineState::Active => "active",
            PipelineState::Bypassed => "bypassed",
        }
    }
}

/// Externally writable pause switch. Cheap to clone; any thread may set it.
/// The pipeline samples it once per chunk.
#[derive(Debug, Clone, Default)]
pub struct BypassHandle(Arc<AtomicBool>);

impl BypassHandle {
    pub fn set(&self, bypassed: bool) {
        self.0.store(bypassed, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Per-chunk figures for monitors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChunkMetrics {
    pub input_db: f32,
    pub output_db: f32,
    /// State after this chunk was handled.
    pub state: PipelineState,
    pub max_db_recorded: f32,
    pub gain_reduction_db: f32,
    pub subtraction: SubtractionOutcome,
    /// True only on the chunk that completed noise learning.
    pub transitioned: bool,
}

impl ChunkMetrics {
    /// True when the processing chain (and so the limiter) ran on this chunk.
    pub fn protected(&self) -> bool {
        self.state == PipelineState::Active && !self.transitioned
    }
}

pub struct SafetyPipeline {
    config: SafetyConfig,
    state: PipelineState,

    meter: LevelMeter,
    learner: NoiseProfileLearner,
    profile: Option<NoiseProfile>,
    subtractor: SpectralSubtractor,
    filter: SmoothingFilter,
    limiter: SafetyLimiter,

    bypass: BypassHandle,
    meters: Arc<SessionMeters>,
    metrics_tx: Option<MetricsProducer>,

    max_db_recorded: f32,
    // Float-domain working copy for `process_chunk`
    scratch: Vec<f32>,
}

impl SafetyPipeline {
    /// Validate `config` and build every stage. All FFT planning and buffer
    /// allocation happens here, off the audio thread.
    pub fn new(config: SafetyConfig) -> anyhow::Result<Self> {
        config.validate()?;

        let sr = config.sample_rate as f32;
        let window = config.learning_window_len();
        let meter = LevelMeter::new(config.calibration_offset_db);

        log::info!(
            "safety pipeline: {} Hz, {} samples/chunk ({:.1} ms budget), ceiling {:.1} dB, learning {} samples",
            config.sample_rate,
            config.chunk_size,
            config.chunk_budget_seconds() * 1000.0,
            config.safety_ceiling_db,
            window
        );
        if window != config.chunk_size {
            log::debug!(
                "learning window ({}) differs from chunk size ({}); spectral subtraction only runs on chunks of the window length",
                window,
                config.chunk_size
            );
        }

        Ok(Self {
            config,
            state: PipelineState::Learning,
            meter,
            learner: NoiseProfileLearner::new(window, sr),
            profile: None,
            subtractor: SpectralSubtractor::new(window, config.noise_reduction_factor),
            filter: SmoothingFilter::new(config.low_pass_cutoff_hz, sr, config.chunk_size),
            limiter: SafetyLimiter::new(config.safety_ceiling_db, meter),
            bypass: BypassHandle::default(),
            meters: Arc::new(SessionMeters::new()),
            metrics_tx: None,
            max_db_recorded: f32::NEG_INFINITY,
            scratch: Vec::with_capacity(config.chunk_size),
        })
    }

    pub fn config(&self) -> &SafetyConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn profile(&self) -> Option<&NoiseProfile> {
        self.profile.as_ref()
    }

    pub fn max_db_recorded(&self) -> f32 {
        self.max_db_recorded
    }

    pub fn learning_progress(&self) -> f32 {
        self.learner.progress()
    }

    pub fn bypass_handle(&self) -> BypassHandle {
        self.bypass.clone()
    }

    pub fn meters(&self) -> Arc<SessionMeters> {
        Arc::clone(&self.meters)
    }

    /// Send every chunk's metrics into `tx` from now on.
    pub fn attach_metrics_stream(&mut self, tx: MetricsProducer) {
        self.metrics_tx = Some(tx);
    }

    pub fn detach_metrics_stream(&mut self) -> Option<MetricsProducer> {
        self.metrics_tx.take()
    }

    /// Start a new session: drop the learned profile and learn again.
    pub fn reset(&mut self) {
        self.learner.reset();
        self.profile = None;
        self.state = PipelineState::Learning;
        self.max_db_recorded = f32::NEG_INFINITY;
        self.meters.set_state(self.state);
        log::info!("safety pipeline reset; relearning noise profile");
    }

    /// Process one chunk of floating samples in place.
    ///
    /// Does not allocate, except once on the chunk that completes learning.
    pub fn process_in_place(&mut self, samples: &mut [f32]) -> ChunkMetrics {
        let input_db = self.meter.measure(samples);
        if input_db.is_finite() {
            self.max_db_recorded = self.max_db_recorded.max(input_db);
        }

        self.sync_bypass();

        let mut output_db = input_db;
        let mut gain_reduction_db = 0.0;
        let mut subtraction = SubtractionOutcome::NotRun;
        let mut transitioned = false;

        match self.state {
            PipelineState::Learning => {
                self.learner.accumulate(samples);
                if self.learner.is_ready() {
                    transitioned = self.finish_learning();
                }
            }
            PipelineState::Bypassed => {}
            PipelineState::Active => {
                sanitize(samples);
                if let Some(profile) = self.profile.as_ref() {
                    subtraction = self.subtractor.suppress(samples, profile);
                }
                self.filter.filter(samples);
                output_db = self.limiter.limit(samples);
                gain_reduction_db = self.limiter.gain_reduction_db();
                clamp_unit(samples);
            }
        }

        let metrics = ChunkMetrics {
            input_db,
            output_db,
            state: self.state,
            max_db_recorded: self.max_db_recorded,
            gain_reduction_db,
            subtraction,
            transitioned,
        };
        self.meters
            .record(&metrics, self.learner.remaining_seconds());
        if let Some(tx) = self.metrics_tx.as_mut() {
            tx.publish(metrics);
        }
        metrics
    }

    /// Process a chunk at the ingestion boundary, returning a chunk of the same
    /// sample type and length. Unprocessed chunks (Learning, Bypassed) are
    /// returned bit-identical to the input.
    pub fn process_chunk(&mut self, chunk: &Chunk) -> (Chunk, ChunkMetrics) {
        let mut scratch = std::mem::take(&mut self.scratch);
        chunk.to_f32_into(&mut scratch);
        let metrics = self.process_in_place(&mut scratch);
        let out = if metrics.protected() {
            Chunk::from_f32(chunk.format(), &scratch)
        } else {
            chunk.clone()
        };
        self.scratch = scratch;
        (out, metrics)
    }

    fn sync_bypass(&mut self) {
        let requested = self.bypass.is_set();
        match (self.state, requested) {
            (PipelineState::Active, true) => {
                self.state = PipelineState::Bypassed;
                eg_log!("bypass engaged");
            }
            (PipelineState::Bypassed, false) => {
                self.state = PipelineState::Active;
                eg_log!("bypass released");
            }
            _ => {}
        }
    }

    fn finish_learning(&mut self) -> bool {
        #[cfg(feature = "assert_process_allocs")]
        let profile = assert_no_alloc::permit_alloc(|| self.learner.finalize());
        #[cfg(not(feature = "assert_process_allocs"))]
        let profile = self.learner.finalize();

        let Some(profile) = profile else {
            return false;
        };
        eg_log!("noise profile learned: {} bins", profile.len());
        self.profile = Some(profile);
        self.state = PipelineState::Active;
        true
    }
}


#[cfg(all(test, feature = "assert_process_allocs"))]
mod realtime_tests {
    use super::*;

    #[test]
    fn test_active_path_does_not_allocate() {
        let cfg = SafetyConfig {
            sample_rate: 16000,
            chunk_size: 512,
            noise_learning_seconds: 0.032,
            ..SafetyConfig::default()
        };
        let mut p = SafetyPipeline::new(cfg).unwrap();
        let mut chunk = vec![0.01f32; 512];
        // Learning completes on the first chunk; finalize is permitted to allocate.
        assert_no_alloc::assert_no_alloc(|| {
            p.process_in_place(&mut chunk);
        });
        assert_eq!(p.state(), PipelineState::Active);

        let mut loud: Vec<f32> = (0..512).map(|i| ((i % 32) as f32 / 16.0) - 1.0).collect();
        let mut short = vec![0.5f32; 300];
        assert_no_alloc::assert_no_alloc(|| {
            p.process_in_place(&mut loud);
            p.process_in_place(&mut short);
        });
    }
}
