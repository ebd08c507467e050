//! Offline runner: protect a mono WAV file chunk by chunk.
//!
//! ```text
//! earguard-offline <input.wav> <output.wav> [config.json] [--metrics]
//! ```
//!
//! The sample rate comes from the input header. With `--metrics`, one JSON line
//! per chunk is printed to stdout. Set `RUST_LOG=info` for progress logs.

use anyhow::{bail, Context, Result};
use earguard::{
    default_candidates, metrics_stream, open_first, ChunkMetrics, SafetyConfig, SafetyPipeline,
    Session, SessionEnd, WavChunkSink, WavChunkSource,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const METRICS_QUEUE: usize = 1024;

fn main() -> Result<()> {
    let _ = env_logger::try_init();
    earguard::debug::init_rt_log();

    let mut positional = Vec::new();
    let mut emit_metrics = false;
    for arg in std::env::args().skip(1) {
        if arg == "--metrics" {
            emit_metrics = true;
        } else {
            positional.push(arg);
        }
    }
    if positional.len() < 2 || positional.len() > 3 {
        bail!("usage: earguard-offline <input.wav> <output.wav> [config.json] [--metrics]");
    }
    let input = PathBuf::from(&positional[0]);
    let output = PathBuf::from(&positional[1]);

    let mut config = match positional.get(2) {
        Some(path) => SafetyConfig::from_json_file(Path::new(path))?,
        None => SafetyConfig::default(),
    };
    let header = WavChunkSource::probe(&input)?;
    if header.sample_rate != config.sample_rate {
        log::info!(
            "using input sample rate {} Hz instead of configured {} Hz",
            header.sample_rate,
            config.sample_rate
        );
        config.sample_rate = header.sample_rate;
    }

    let (source, candidate) = open_first(&default_candidates(&config), |c| {
        WavChunkSource::open(&input, c)
    })
    .with_context(|| format!("cannot read '{}'", input.display()))?;
    let sink = WavChunkSink::create(&output, candidate.format, candidate.sample_rate)?;

    let mut pipeline = SafetyPipeline::new(SafetyConfig {
        chunk_size: candidate.chunk_size,
        ..config
    })?;

    let done = Arc::new(AtomicBool::new(false));
    let monitor = if emit_metrics {
        let (tx, mut rx) = metrics_stream(METRICS_QUEUE);
        pipeline.attach_metrics_stream(tx);
        let done = Arc::clone(&done);
        Some(std::thread::spawn(move || -> Result<()> {
            let mut batch: Vec<ChunkMetrics> = Vec::with_capacity(METRICS_QUEUE);
            loop {
                let finished = done.load(Ordering::Acquire);
                batch.clear();
                rx.drain_into(&mut batch);
                for m in &batch {
                    println!("{}", serde_json::to_string(m)?);
                }
                if finished {
                    return Ok(());
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }))
    } else {
        None
    };

    let mut session = Session::new(pipeline, source, sink);
    let summary = session.run();
    done.store(true, Ordering::Release);

    if let Some(handle) = monitor {
        match handle.join() {
            Ok(res) => res.context("metrics monitor failed")?,
            Err(_) => bail!("metrics monitor panicked"),
        }
    }
    if let Some(tx) = session.pipeline_mut().detach_metrics_stream() {
        if tx.dropped() > 0 {
            log::warn!("{} metrics entries dropped", tx.dropped());
        }
    }
    earguard::debug::drain_to_log();

    log::info!(
        "processed {} chunks ({} limited), peak input {:.1} dB, final state {}",
        summary.chunks,
        summary.limited_chunks,
        summary.max_db_recorded,
        summary.final_state.name()
    );
    match summary.end {
        SessionEnd::Exhausted => Ok(()),
        SessionEnd::SourceFailed(e) => bail!("input failed: {}", e),
        SessionEnd::SinkFailed(e) => bail!("output failed: {}", e),
    }
}
