//! Pull-driven session runner.
//!
//! A [`Session`] reads chunks from a [`ChunkSource`], runs them through a
//! [`SafetyPipeline`] and writes the result to a [`ChunkSink`] until the source
//! is exhausted or either end fails. Hosts that own a push callback can skip this
//! and call [`SafetyPipeline::process_chunk`] directly.

use crate::chunk::Chunk;
use crate::pipeline::{PipelineState, SafetyPipeline};
use serde::Serialize;
use std::collections::VecDeque;

/// Blocking producer of chunks. `Ok(None)` means the stream ended normally.
pub trait ChunkSource {
    fn next_chunk(&mut self) -> anyhow::Result<Option<Chunk>>;
}

pub trait ChunkSink {
    fn write_chunk(&mut self, chunk: &Chunk) -> anyhow::Result<()>;

    /// Called once after the last chunk.
    fn finish(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// In-memory source, mostly for tests and offline use.
#[derive(Debug, Default)]
pub struct MemoryChunkSource {
    chunks: VecDeque<Chunk>,
}

impl MemoryChunkSource {
    pub fn new(chunks: impl IntoIterator<Item = Chunk>) -> Self {
        Self {
            chunks: chunks.into_iter().collect(),
        }
    }
}

impl ChunkSource for MemoryChunkSource {
    fn next_chunk(&mut self) -> anyhow::Result<Option<Chunk>> {
        Ok(self.chunks.pop_front())
    }
}

impl ChunkSink for Vec<Chunk> {
    fn write_chunk(&mut self, chunk: &Chunk) -> anyhow::Result<()> {
        self.push(chunk.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "detail")]
pub enum SessionEnd {
    Exhausted,
    SourceFailed(String),
    SinkFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub chunks: u64,
    pub limited_chunks: u64,
    pub max_db_recorded: f32,
    pub final_state: PipelineState,
    pub end: SessionEnd,
}

pub struct Session<S, K> {
    pipeline: SafetyPipeline,
    source: S,
    sink: K,
}

impl<S: ChunkSource, K: ChunkSink> Session<S, K> {
    pub fn new(pipeline: SafetyPipeline, source: S, sink: K) -> Self {
        Self {
            pipeline,
            source,
            sink,
        }
    }

    pub fn pipeline(&self) -> &SafetyPipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut SafetyPipeline {
        &mut self.pipeline
    }

    /// Run until the source ends or an I/O error stops the session.
    ///
    /// Errors are reported in the summary rather than returned, so the caller
    /// always gets the counters for the part that did run.
    pub fn run(&mut self) -> SessionSummary {
        let mut chunks = 0u64;
        let mut limited_chunks = 0u64;

        let end = loop {
            let chunk = match self.source.next_chunk() {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break SessionEnd::Exhausted,
                Err(e) => {
                    log::error!("audio source failed after {} chunks: {:#}", chunks, e);
                    break SessionEnd::SourceFailed(format!("{:#}", e));
                }
            };

            let (out, metrics) = self.pipeline.process_chunk(&chunk);
            chunks += 1;
            if metrics.gain_reduction_db > 0.0 {
                limited_chunks += 1;
            }
            if metrics.transitioned {
                log::info!(
                    "noise profile learned after {} chunks; protection active",
                    chunks
                );
            }

            if let Err(e) = self.sink.write_chunk(&out) {
                log::error!("audio sink failed after {} chunks: {:#}", chunks, e);
                break SessionEnd::SinkFailed(format!("{:#}", e));
            }
            crate::debug::drain_to_log();
        };

        if let Err(e) = self.sink.finish() {
            log::error!("failed to finalize audio sink: {:#}", e);
        }

        SessionSummary {
            chunks,
            limited_chunks,
            max_db_recorded: self.pipeline.max_db_recorded(),
            final_state: self.pipeline.state(),
            end,
        }
    }

    pub fn into_parts(self) -> (SafetyPipeline, S, K) {
        (self.pipeline, self.source, self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SafetyConfig;
    use anyhow::anyhow;

    fn config() -> SafetyConfig {
        SafetyConfig {
            sample_rate: 16000,
            chunk_size: 256,
            noise_learning_seconds: 0.064,
            low_pass_cutoff_hz: 6000.0,
            ..SafetyConfig::default()
        }
    }

    fn tone_chunk(amp: f32) -> Chunk {
        Chunk::Int16(
            (0..256)
                .map(|i| {
                    let t = i as f32 / 16000.0;
                    (amp * 32767.0 * (2.0 * std::f32::consts::PI * 440.0 * t).sin()) as i16
                })
                .collect(),
        )
    }

    struct FailingSource {
        left: usize,
    }

    impl ChunkSource for FailingSource {
        fn next_chunk(&mut self) -> anyhow::Result<Option<Chunk>> {
            if self.left == 0 {
                return Err(anyhow!("device unplugged"));
            }
            self.left -= 1;
            Ok(Some(tone_chunk(0.01)))
        }
    }

    struct FailingSink;

    impl ChunkSink for FailingSink {
        fn write_chunk(&mut self, _chunk: &Chunk) -> anyhow::Result<()> {
            Err(anyhow!("disk full"))
        }
    }

    #[test]
    fn test_runs_until_exhausted() {
        let mut chunks: Vec<Chunk> = (0..4).map(|_| tone_chunk(0.01)).collect();
        chunks.extend((0..6).map(|_| tone_chunk(0.9)));
        let source = MemoryChunkSource::new(chunks.clone());
        let pipeline = SafetyPipeline::new(config()).unwrap();

        let mut session = Session::new(pipeline, source, Vec::new());
        let summary = session.run();
        assert_eq!(summary.end, SessionEnd::Exhausted);
        assert_eq!(summary.chunks, 10);
        assert_eq!(summary.limited_chunks, 6);
        assert_eq!(summary.final_state, PipelineState::Active);
        assert!(summary.max_db_recorded > 90.0);

        let (_, _, out) = session.into_parts();
        assert_eq!(out.len(), 10);
        // Learning chunks pass through untouched.
        assert_eq!(&out[..4], &chunks[..4]);
        assert!(out.iter().all(|c| c.len() == 256));
        assert_ne!(out[9], chunks[9]);
    }

    #[test]
    fn test_source_failure_ends_session() {
        let pipeline = SafetyPipeline::new(config()).unwrap();
        let mut session = Session::new(pipeline, FailingSource { left: 3 }, Vec::new());
        let summary = session.run();
        assert_eq!(summary.chunks, 3);
        assert!(matches!(summary.end, SessionEnd::SourceFailed(ref m) if m.contains("unplugged")));
    }

    #[test]
    fn test_sink_failure_ends_session() {
        let pipeline = SafetyPipeline::new(config()).unwrap();
        let source = MemoryChunkSource::new(vec![tone_chunk(0.1), tone_chunk(0.1)]);
        let mut session = Session::new(pipeline, source, FailingSink);
        let summary = session.run();
        assert_eq!(summary.chunks, 1);
        assert!(matches!(summary.end, SessionEnd::SinkFailed(_)));
    }

    #[test]
    fn test_summary_serializes() {
        let summary = SessionSummary {
            chunks: 2,
            limited_chunks: 1,
            max_db_recorded: 80.0,
            final_state: PipelineState::Active,
            end: SessionEnd::SourceFailed("gone".into()),
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["final_state"], "active");
        assert_eq!(json["end"]["reason"], "source_failed");
        assert_eq!(json["end"]["detail"], "gone");
    }
}
