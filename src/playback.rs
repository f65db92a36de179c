//! Audio playback: raw `pcm_f32le` chunks → rodio sink.
//!
//! Pipeline:
//! 1. Byte chunk → f32 samples (split samples carried to the next chunk)
//! 2. Samples queued on a paused sink until the jitter buffer fills
//! 3. Sink plays in arrival order; drain waits for completion or cancellation

use std::time::Duration;

use async_trait::async_trait;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{AudioError, SpeechError};
use crate::speech::SpeechConnection;

const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Incremental decoder for little-endian f32 PCM.
#[derive(Debug, Default)]
pub struct PcmDecoder {
    carry: Vec<u8>,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum DecodeError {
    #[error("non-finite sample at index {index}")]
    NonFinite { index: usize },
}

impl PcmDecoder {
    pub fn decode(&mut self, chunk: &[u8]) -> Result<Vec<f32>, DecodeError> {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);

        let whole = bytes.len() - bytes.len() % 4;
        let samples: Vec<f32> = bytes[..whole]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        // Only whole samples are ever dropped, so the stream stays 4-byte aligned.
        self.carry = bytes[whole..].to_vec();
        if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
            return Err(DecodeError::NonFinite { index });
        }
        Ok(samples)
    }
}

/// Destination for decoded samples.
#[async_trait]
pub trait SampleSink: Send {
    fn queue(&mut self, samples: Vec<f32>);
    fn start(&mut self);
    /// Wait for queued audio to finish, stopping early on cancellation.
    async fn drain(&mut self, cancel: &CancellationToken) -> bool;
}

/// Local audio device.
pub trait AudioOutput: Send + Sync {
    fn open_sink(&self, channels: u16, sample_rate: u32) -> Result<Box<dyn SampleSink>, AudioError>;
}

pub struct RodioOutput {
    // Kept alive for the process lifetime.
    stream: OutputStream,
}

impl RodioOutput {
    pub fn open() -> Result<Self, AudioError> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| AudioError::Device(e.to_string()))?;
        Ok(Self { stream })
    }
}

impl AudioOutput for RodioOutput {
    fn open_sink(&self, channels: u16, sample_rate: u32) -> Result<Box<dyn SampleSink>, AudioError> {
        // rodio 0.21: Sink::connect_new takes &Mixer
        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        Ok(Box::new(RodioSink {
            sink,
            channels,
            sample_rate,
        }))
    }
}

struct RodioSink {
    sink: Sink,
    channels: u16,
    sample_rate: u32,
}

#[async_trait]
impl SampleSink for RodioSink {
    fn queue(&mut self, samples: Vec<f32>) {
        self.sink
            .append(SamplesBuffer::new(self.channels, self.sample_rate, samples));
    }

    fn start(&mut self) {
        self.sink.play();
    }

    async fn drain(&mut self, cancel: &CancellationToken) -> bool {
        loop {
            if self.sink.empty() {
                return false;
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.sink.stop();
                    return true;
                }
                _ = tokio::time::sleep(DRAIN_POLL) => {}
            }
        }
    }
}

/// Outcome of one playback.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PlaybackReport {
    pub chunks: usize,
    pub skipped: usize,
    pub samples: usize,
    pub cancelled: bool,
}

/// Streaming player with a fixed jitter buffer in front of the sink.
pub struct StreamPlayer {
    pub sample_rate: u32,
    pub buffer: Duration,
}

impl StreamPlayer {
    pub fn new(sample_rate: u32, buffer: Duration) -> Self {
        Self { sample_rate, buffer }
    }

    fn buffer_samples(&self) -> usize {
        (self.sample_rate as u128 * self.buffer.as_millis() / 1000) as usize
    }

    /// Pull every chunk from `source` into `sink`, in arrival order.
    ///
    /// Chunk-local failures are logged and skipped; any other source error
    /// ends playback with that error.
    pub async fn play(
        &self,
        source: &mut dyn SpeechConnection,
        sink: &mut dyn SampleSink,
        cancel: &CancellationToken,
    ) -> Result<PlaybackReport, SpeechError> {
        let threshold = self.buffer_samples();
        let mut decoder = PcmDecoder::default();
        let mut report = PlaybackReport::default();
        let mut buffered = 0usize;
        let mut started = false;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Playback cancelled after {} chunks", report.chunks);
                    report.cancelled = true;
                    return Ok(report);
                }
                next = source.next_chunk() => next,
            };

            let chunk = match next {
                None => break,
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) if e.is_chunk_local() => {
                    warn!("Skipping audio chunk: {e}");
                    report.skipped += 1;
                    continue;
                }
                Some(Err(e)) => return Err(e),
            };

            report.chunks += 1;
            match decoder.decode(&chunk) {
                Ok(samples) if samples.is_empty() => {}
                Ok(samples) => {
                    buffered += samples.len();
                    report.samples += samples.len();
                    sink.queue(samples);
                }
                Err(e) => {
                    warn!("Skipping audio chunk {}: {e}", report.chunks);
                    report.skipped += 1;
                    continue;
                }
            }

            if !started && buffered >= threshold {
                debug!("Jitter buffer filled ({buffered} samples), starting playback");
                sink.start();
                started = true;
            }
        }

        if report.samples == 0 {
            return Ok(report);
        }
        if !started {
            sink.start();
        }

        report.cancelled = sink.drain(cancel).await;
        let seconds = report.samples as f64 / self.sample_rate.max(1) as f64;
        info!(
            "Played {:.1}s of audio ({} chunks, {} skipped)",
            seconds, report.chunks, report.skipped
        );
        Ok(report)
    }
}
