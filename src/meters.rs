//! Thread-safe metering for the processing session.
//!
//! Two views are offered to monitors running outside the audio context:
//! - [`SessionMeters`]: the latest values, stored as atomic float bits. Reads never
//!   block the audio thread and fields are not guaranteed to be from the same chunk.
//! - [`metrics_stream`]: a bounded lock-free queue of every chunk's
//!   [`ChunkMetrics`]. When the monitor falls behind, new entries are dropped
//!   (and counted) instead of stalling the producer.

use crate::pipeline::{ChunkMetrics, PipelineState};
use ringbuf::{Consumer, Producer, RingBuffer};
use serde::Serialize;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicU8, Ordering};

/// Latest-value meters shared between the audio thread and monitors.
pub struct SessionMeters {
    input_db: AtomicU32,
    output_db: AtomicU32,
    max_db_recorded: AtomicU32,
    gain_reduction_db: AtomicU32,
    learning_remaining_seconds: AtomicU32,
    state: AtomicU8,
    chunks_processed: AtomicU64,
}

impl Default for SessionMeters {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionMeters {
    pub fn new() -> Self {
        let neg_inf = f32::NEG_INFINITY.to_bits();
        Self {
            input_db: AtomicU32::new(neg_inf),
            output_db: AtomicU32::new(neg_inf),
            max_db_recorded: AtomicU32::new(neg_inf),
            gain_reduction_db: AtomicU32::new(0.0f32.to_bits()),
            learning_remaining_seconds: AtomicU32::new(0.0f32.to_bits()),
            state: AtomicU8::new(PipelineState::Learning.as_u8()),
            chunks_processed: AtomicU64::new(0),
        }
    }

    /// Publish one chunk's figures. Called from the audio thread only.
    pub fn record(&self, m: &ChunkMetrics, learning_remaining_seconds: f32) {
        self.input_db.store(m.input_db.to_bits(), Ordering::Relaxed);
        self.output_db.store(m.output_db.to_bits(), Ordering::Relaxed);
        self.max_db_recorded
            .store(m.max_db_recorded.to_bits(), Ordering::Relaxed);
        self.gain_reduction_db
            .store(m.gain_reduction_db.to_bits(), Ordering::Relaxed);
        self.learning_remaining_seconds
            .store(learning_remaining_seconds.to_bits(), Ordering::Relaxed);
        self.state.store(m.state.as_u8(), Ordering::Relaxed);
        self.chunks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_state(&self, state: PipelineState) {
        self.state.store(state.as_u8(), Ordering::Relaxed);
    }

    pub fn get_input_db(&self) -> f32 {
        f32::from_bits(self.input_db.load(Ordering::Relaxed))
    }

    pub fn get_output_db(&self) -> f32 {
        f32::from_bits(self.output_db.load(Ordering::Relaxed))
    }

    pub fn get_max_db_recorded(&self) -> f32 {
        f32::from_bits(self.max_db_recorded.load(Ordering::Relaxed))
    }

    pub fn get_gain_reduction_db(&self) -> f32 {
        f32::from_bits(self.gain_reduction_db.load(Ordering::Relaxed))
    }

    pub fn get_learning_remaining_seconds(&self) -> f32 {
        f32::from_bits(self.learning_remaining_seconds.load(Ordering::Relaxed))
    }

    pub fn get_state(&self) -> PipelineState {
        PipelineState::from_u8(self.state.load(Ordering::Relaxed))
    }

    pub fn get_chunks_processed(&self) -> u64 {
        self.chunks_processed.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            input_db: self.get_input_db(),
            output_db: self.get_output_db(),
            state: self.get_state(),
            max_db_recorded: self.get_max_db_recorded(),
            gain_reduction_db: self.get_gain_reduction_db(),
            learning_remaining_seconds: self.get_learning_remaining_seconds(),
        }
    }
}

/// Point-in-time view for status displays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub input_db: f32,
    pub output_db: f32,
    pub state: PipelineState,
    pub max_db_recorded: f32,
    pub gain_reduction_db: f32,
    pub learning_remaining_seconds: f32,
}

impl MetricsSnapshot {
    /// True when the last output chunk was above `ceiling_db`.
    pub fn is_over(&self, ceiling_db: f32) -> bool {
        self.output_db > ceiling_db
    }
}

/// Audio-thread end of the metrics stream.
pub struct MetricsProducer {
    inner: Producer<ChunkMetrics>,
    dropped: u64,
}

/// Monitor end of the metrics stream.
pub struct MetricsConsumer {
    inner: Consumer<ChunkMetrics>,
}

/// Create a bounded metrics stream holding up to `capacity` chunks.
pub fn metrics_stream(capacity: usize) -> (MetricsProducer, MetricsConsumer) {
    let (prod, cons) = RingBuffer::<ChunkMetrics>::new(capacity.max(1)).split();
    (
        MetricsProducer {
            inner: prod,
            dropped: 0,
        },
        MetricsConsumer { inner: cons },
    )
}

impl MetricsProducer {
    /// Queue `m`; returns false (and counts a drop) if the monitor is behind.
    pub fn publish(&mut self, m: ChunkMetrics) -> bool {
        if self.inner.push(m).is_err() {
            self.dropped += 1;
            return false;
        }
        true
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}

impl MetricsConsumer {
    pub fn pop(&mut self) -> Option<ChunkMetrics> {
        self.inner.pop()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Pop everything currently queued into `out`.
    pub fn drain_into(&mut self, out: &mut Vec<ChunkMetrics>) -> usize {
        let mut n = 0;
        while let Some(m) = self.inner.pop() {
            out.push(m);
            n += 1;
        }
        n
    }
}
