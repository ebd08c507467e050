//! Stream ingestion.
//!
//! Opening an input stream walks an ordered list of [`StreamCandidate`]s and
//! keeps the first one the backend accepts, so a device that rejects 16-bit PCM
//! can still be served with float samples. WAV files are the built-in backend.

use crate::chunk::{f32_to_i16, i16_to_f32, Chunk, SampleFormat};
use crate::config::SafetyConfig;
use crate::session::{ChunkSink, ChunkSource};
use anyhow::{anyhow, bail, Context};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCandidate {
    pub format: SampleFormat,
    pub sample_rate: u32,
    pub chunk_size: usize,
}

/// Preferred configuration first (16-bit at the configured chunk size), then a
/// float fallback at half the chunk size.
pub fn default_candidates(config: &SafetyConfig) -> [StreamCandidate; 2] {
    [
        StreamCandidate {
            format: SampleFormat::Int16,
            sample_rate: config.sample_rate,
            chunk_size: config.chunk_size,
        },
        StreamCandidate {
            format: SampleFormat::Float32,
            sample_rate: config.sample_rate,
            chunk_size: (config.chunk_size / 2).max(1),
        },
    ]
}

/// Try each candidate in order with `open`; return the first stream that opens
/// together with the candidate that produced it.
pub fn open_first<S, F>(
    candidates: &[StreamCandidate],
    mut open: F,
) -> anyhow::Result<(S, StreamCandidate)>
where
    F: FnMut(&StreamCandidate) -> anyhow::Result<S>,
{
    let mut last_err = None;
    for (i, candidate) in candidates.iter().enumerate() {
        match open(candidate) {
            Ok(stream) => {
                if i > 0 {
                    log::info!("opened input with fallback configuration {:?}", candidate);
                }
                return Ok((stream, *candidate));
            }
            Err(e) => {
                log::warn!("input configuration {:?} rejected: {:#}", candidate, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err
        .unwrap_or_else(|| anyhow!("no stream candidates given"))
        .context("no input configuration could be opened"))
}

type WavFileReader = hound::WavReader<std::io::BufReader<File>>;

/// Mono WAV file read in chunks of a fixed size. The final chunk may be shorter.
pub struct WavChunkSource {
    reader: WavFileReader,
    format: SampleFormat,
    chunk_size: usize,
}

impl WavChunkSource {
    /// Open `path` for `candidate`. Fails unless the file is mono, matches the
    /// candidate's sample rate, and stores samples of the candidate's format
    /// (16-bit integer for `Int16`, 32-bit float for `Float32`).
    pub fn open(path: &Path, candidate: &StreamCandidate) -> anyhow::Result<Self> {
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("failed to open '{}'", path.display()))?;
        let spec = reader.spec();

        if spec.channels != 1 {
            bail!("expected mono input, found {} channels", spec.channels);
        }
        if spec.sample_rate != candidate.sample_rate {
            bail!(
                "sample rate {} Hz does not match requested {} Hz",
                spec.sample_rate,
                candidate.sample_rate
            );
        }
        let file_format = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => SampleFormat::Int16,
            (hound::SampleFormat::Float, 32) => SampleFormat::Float32,
            (fmt, bits) => bail!("unsupported sample encoding {:?}/{} bits", fmt, bits),
        };
        if file_format != candidate.format {
            bail!(
                "file holds {:?} samples, requested {:?}",
                file_format,
                candidate.format
            );
        }
        if candidate.chunk_size == 0 {
            bail!("chunk size must be > 0");
        }

        Ok(Self {
            reader,
            format: file_format,
            chunk_size: candidate.chunk_size,
        })
    }

    /// Peek at a WAV header without keeping the file open.
    pub fn probe(path: &Path) -> anyhow::Result<hound::WavSpec> {
        let reader = hound::WavReader::open(path)
            .with_context(|| format!("failed to open '{}'", path.display()))?;
        Ok(reader.spec())
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl ChunkSource for WavChunkSource {
    fn next_chunk(&mut self) -> anyhow::Result<Option<Chunk>> {
        let n = self.chunk_size;
        let chunk = match self.format {
            SampleFormat::Int16 => Chunk::Int16(
                self.reader
                    .samples::<i16>()
                    .take(n)
                    .collect::<Result<Vec<_>, _>>()
                    .context("failed to read WAV samples")?,
            ),
            SampleFormat::Float32 => Chunk::Float32(
                self.reader
                    .samples::<f32>()
                    .take(n)
                    .collect::<Result<Vec<_>, _>>()
                    .context("failed to read WAV samples")?,
            ),
        };
        Ok(if chunk.is_empty() { None } else { Some(chunk) })
    }
}

/// Mono WAV writer. Chunks of either type are accepted and converted to the
/// file's sample format.
pub struct WavChunkSink {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
    format: SampleFormat,
}

impl WavChunkSink {
    pub fn create(path: &Path, format: SampleFormat, sample_rate: u32) -> anyhow::Result<Self> {
        let spec = match format {
            SampleFormat::Int16 => hound::WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 16,
                sample_format: hound::SampleFormat::Int,
            },
            SampleFormat::Float32 => hound::WavSpec {
                channels: 1,
                sample_rate,
                bits_per_sample: 32,
                sample_format: hound::SampleFormat::Float,
            },
        };
        let writer = hound::WavWriter::create(path, spec)
            .with_context(|| format!("failed to create '{}'", path.display()))?;
        Ok(Self {
            writer: Some(writer),
            format,
        })
    }
}

impl ChunkSink for WavChunkSink {
    fn write_chunk(&mut self, chunk: &Chunk) -> anyhow::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| anyhow!("WAV sink already finalized"))?;
        match (self.format, chunk) {
            (SampleFormat::Int16, Chunk::Int16(s)) => {
                for &v in s {
                    writer.write_sample(v)?;
                }
            }
            (SampleFormat::Int16, Chunk::Float32(s)) => {
                for &v in s {
                    writer.write_sample(f32_to_i16(v))?;
                }
            }
            (SampleFormat::Float32, Chunk::Float32(s)) => {
                for &v in s {
                    writer.write_sample(v)?;
                }
            }
            (SampleFormat::Float32, Chunk::Int16(s)) => {
                for &v in s {
                    writer.write_sample(i16_to_f32(v))?;
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> anyhow::Result<()> {
        if let Some(writer) = self.writer.take() {
            writer.finalize().context("failed to finalize WAV file")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_wav(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("earguard-{}-{}.wav", std::process::id(), name))
    }

    fn write_i16(path: &Path, sample_rate: u32, channels: u16, samples: &[i16]) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut w = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            w.write_sample(s).unwrap();
        }
        w.finalize().unwrap();
    }

    #[test]
    fn test_default_candidates() {
        let cfg = SafetyConfig::default();
        let c = default_candidates(&cfg);
        assert_eq!(c[0].format, SampleFormat::Int16);
        assert_eq!(c[0].chunk_size, 1024);
        assert_eq!(c[1].format, SampleFormat::Float32);
        assert_eq!(c[1].chunk_size, 512);
        assert_eq!(c[1].sample_rate, 44100);
    }

    #[test]
    fn test_open_first_falls_back() {
        let cfg = SafetyConfig::default();
        let candidates = default_candidates(&cfg);
        let mut tried = Vec::new();
        let (stream, chosen) = open_first(&candidates, |c| {
            tried.push(c.format);
            if c.format == SampleFormat::Int16 {
                bail!("paInt16 not supported");
            }
            Ok(c.chunk_size)
        })
        .unwrap();
        assert_eq!(tried, vec![SampleFormat::Int16, SampleFormat::Float32]);
        assert_eq!(chosen.format, SampleFormat::Float32);
        assert_eq!(stream, 512);
    }

    #[test]
    fn test_open_first_reports_last_error() {
        let candidates = default_candidates(&SafetyConfig::default());
        let err = open_first::<(), _>(&candidates, |_| bail!("no device")).unwrap_err();
        assert!(format!("{:#}", err).contains("no device"));
        assert!(open_first::<(), _>(&[], |_| Ok(())).is_err());
    }

    #[test]
    fn test_wav_source_chunks_and_tail() {
        let path = temp_wav("tail");
        let samples: Vec<i16> = (0..2500).map(|i| (i % 300) as i16).collect();
        write_i16(&path, 16000, 1, &samples);

        let candidate = StreamCandidate {
            format: SampleFormat::Int16,
            sample_rate: 16000,
            chunk_size: 1024,
        };
        let mut src = WavChunkSource::open(&path, &candidate).unwrap();
        let mut lens = Vec::new();
        let mut collected = Vec::new();
        while let Some(Chunk::Int16(c)) = src.next_chunk().unwrap() {
            lens.push(c.len());
            collected.extend(c);
        }
        assert_eq!(lens, vec![1024, 1024, 452]);
        assert_eq!(collected, samples);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_wav_source_rejects_mismatches() {
        let path = temp_wav("reject");
        write_i16(&path, 16000, 2, &[0; 64]);
        let candidate = StreamCandidate {
            format: SampleFormat::Int16,
            sample_rate: 16000,
            chunk_size: 16,
        };
        assert!(WavChunkSource::open(&path, &candidate).is_err());

        write_i16(&path, 16000, 1, &[0; 64]);
        let wrong_rate = StreamCandidate {
            sample_rate: 44100,
            ..candidate
        };
        assert!(WavChunkSource::open(&path, &wrong_rate).is_err());
        let wrong_format = StreamCandidate {
            format: SampleFormat::Float32,
            ..candidate
        };
        assert!(WavChunkSource::open(&path, &wrong_format).is_err());
        assert!(WavChunkSource::open(&path, &candidate).is_ok());
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_float_file_uses_fallback_candidate() {
        let path = temp_wav("float");
        let mut sink = WavChunkSink::create(&path, SampleFormat::Float32, 16000).unwrap();
        sink.write_chunk(&Chunk::Float32(vec![0.25; 300])).unwrap();
        sink.finish().unwrap();

        let cfg = SafetyConfig {
            sample_rate: 16000,
            chunk_size: 256,
            ..SafetyConfig::default()
        };
        let (mut src, chosen) =
            open_first(&default_candidates(&cfg), |c| WavChunkSource::open(&path, c)).unwrap();
        assert_eq!(chosen.format, SampleFormat::Float32);
        assert_eq!(src.chunk_size(), 128);
        assert_eq!(src.next_chunk().unwrap(), Some(Chunk::Float32(vec![0.25; 128])));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_sink_converts_and_finalizes_once() {
        let path = temp_wav("sink");
        let mut sink = WavChunkSink::create(&path, SampleFormat::Int16, 8000).unwrap();
        sink.write_chunk(&Chunk::Float32(vec![1.0, -1.0, 0.0])).unwrap();
        sink.write_chunk(&Chunk::Int16(vec![7])).unwrap();
        sink.finish().unwrap();
        sink.finish().unwrap();
        assert!(sink.write_chunk(&Chunk::Int16(vec![1])).is_err());

        let spec = WavChunkSource::probe(&path).unwrap();
        assert_eq!(spec.sample_rate, 8000);
        let mut reader = hound::WavReader::open(&path).unwrap();
        let got: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(got, vec![i16::MAX, i16::MIN, 0, 7]);
        std::fs::remove_file(&path).ok();
    }
}
