//! Streaming hearing-safety engine.
//!
//! Mono audio arrives in fixed-size chunks. For the first few seconds the engine
//! listens and learns a magnitude spectrum of the background noise; after that
//! every chunk runs through:
//!
//! ```text
//! spectral subtraction -> zero-phase low-pass -> soft-knee limiter (70 dB ceiling)
//! ```
//!
//! Levels are approximate SPL: digital dBFS plus a fixed 94 dB offset. This is
//! not a calibrated measurement; the real acoustic level depends on the
//! playback chain.
//!
//! Entry points:
//! - [`SafetyPipeline`]: per-session state machine, one call per chunk.
//! - [`Session`]: pull loop over a [`ChunkSource`] and [`ChunkSink`].
//! - [`SessionMeters`] and [`metrics_stream`]: lock-free monitoring.

pub mod chunk;
pub mod config;
pub mod debug;
pub mod dsp;
pub mod ingest;
pub mod meters;
pub mod pipeline;
pub mod session;

pub use chunk::{Chunk, SampleFormat};
pub use config::SafetyConfig;
pub use ingest::{default_candidates, open_first, StreamCandidate, WavChunkSink, WavChunkSource};
pub use meters::{metrics_stream, MetricsConsumer, MetricsProducer, MetricsSnapshot, SessionMeters};
pub use pipeline::{BypassHandle, ChunkMetrics, PipelineState, SafetyPipeline};
pub use session::{ChunkSink, ChunkSource, MemoryChunkSource, Session, SessionEnd, SessionSummary};

#[cfg(all(test, feature = "assert_process_allocs"))]
#[global_allocator]
static ALLOCATOR: assert_no_alloc::AllocDisabler = assert_no_alloc::AllocDisabler;
