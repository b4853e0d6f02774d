//! Chunk buffer: accumulates audio frames into sealed, dispatchable chunks.

use crate::audio::activity::ActivityDetector;
use crate::defaults;
use crate::pipeline::error::StationError;
use crate::pipeline::station::Station;
use crate::pipeline::types::{AudioChunk, AudioFrame};

/// Configuration for chunk sealing.
#[derive(Debug, Clone, Copy)]
pub struct ChunkBufferConfig {
    /// Seconds of accumulated audio (of speech, when voice-gated) per chunk.
    pub chunk_secs: f64,
    /// Maximum stream-time window before a chunk is sealed regardless of how
    /// much audio accumulated. Bounds latency during sparse speech.
    pub max_chunk_secs: f64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl Default for ChunkBufferConfig {
    fn default() -> Self {
        Self {
            chunk_secs: defaults::CHUNK_SECS,
            max_chunk_secs: defaults::MAX_CHUNK_SECS,
            sample_rate: defaults::SAMPLE_RATE,
        }
    }
}

/// Accumulates audio frames and seals them into indexed chunks.
///
/// Without an activity detector every frame is accumulated and chunks seal on
/// the fixed duration. With a detector, silent frames are dropped before
/// accumulation and chunks seal once enough *speech* accumulated — or when
/// the window bound elapses, whichever comes first.
///
/// Chunk indices are strictly increasing and gapless; timestamps come from
/// the frames' stream positions, so sealing is deterministic and clock-free.
pub struct ChunkBuffer {
    config: ChunkBufferConfig,
    detector: Option<Box<dyn ActivityDetector>>,
    pending: Vec<i16>,
    next_index: u64,
    /// Stream time the current window opened (first frame since last seal).
    window_start: Option<f64>,
    /// Stream time of the last frame seen in the current window.
    window_end: f64,
}

impl ChunkBuffer {
    /// Creates a fixed-duration chunk buffer.
    pub fn new(config: ChunkBufferConfig) -> Self {
        Self {
            config,
            detector: None,
            pending: Vec::new(),
            next_index: 0,
            window_start: None,
            window_end: 0.0,
        }
    }

    /// Enables voice-gated chunking with the given detector.
    pub fn with_detector(mut self, detector: Box<dyn ActivityDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    /// Feeds one frame; returns a sealed chunk when a boundary is reached.
    pub fn feed(&mut self, frame: &AudioFrame) -> Option<AudioChunk> {
        if self.window_start.is_none() {
            self.window_start = Some(frame.start_secs);
        }
        self.window_end = frame.end_secs();

        let accept = match &mut self.detector {
            Some(detector) => detector.is_speech(&frame.samples),
            None => true,
        };
        if accept {
            self.pending.extend_from_slice(&frame.samples);
        }

        let window_secs = self.window_end - self.window_start.unwrap_or(self.window_end);
        if self.accumulated_secs() >= self.config.chunk_secs
            || window_secs >= self.config.max_chunk_secs
        {
            Some(self.seal())
        } else {
            None
        }
    }

    /// Seals whatever the current window holds, even a trailing partial or
    /// an entirely silent (empty) chunk. Returns None if no frame arrived
    /// since the last seal.
    pub fn flush(&mut self) -> Option<AudioChunk> {
        self.window_start.is_some().then(|| self.seal())
    }

    /// Seconds of accumulated (speech) audio in the open window.
    pub fn accumulated_secs(&self) -> f64 {
        self.pending.len() as f64 / self.config.sample_rate as f64
    }

    /// Index the next sealed chunk will carry.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    fn seal(&mut self) -> AudioChunk {
        let start = self.window_start.take().unwrap_or(self.window_end);
        let samples = std::mem::take(&mut self.pending);
        let chunk = AudioChunk::new(
            samples,
            self.next_index,
            start,
            self.window_end,
            self.config.sample_rate,
        );
        self.next_index += 1;
        chunk
    }
}

/// Station wrapper: frames in, sealed chunks out, trailing partial flushed
/// on shutdown through a dedicated sender.
pub struct ChunkBufferStation {
    buffer: ChunkBuffer,
    /// Output channel for flushing the trailing chunk at end-of-stream.
    flush_tx: Option<crossbeam_channel::Sender<AudioChunk>>,
}

impl ChunkBufferStation {
    /// Creates a station around the given buffer.
    pub fn new(buffer: ChunkBuffer) -> Self {
        Self {
            buffer,
            flush_tx: None,
        }
    }

    /// Set the output channel used to flush the trailing chunk on shutdown.
    pub fn with_flush_tx(mut self, tx: crossbeam_channel::Sender<AudioChunk>) -> Self {
        self.flush_tx = Some(tx);
        self
    }
}

impl Station for ChunkBufferStation {
    type Input = AudioFrame;
    type Output = AudioChunk;

    fn name(&self) -> &'static str {
        "chunk-buffer"
    }

    fn process(&mut self, frame: AudioFrame) -> Result<Option<AudioChunk>, StationError> {
        Ok(self.buffer.feed(&frame))
    }

    fn shutdown(&mut self) {
        if let Some(chunk) = self.buffer.flush()
            && let Some(tx) = self.flush_tx.take()
            && tx.send(chunk).is_err()
        {
            eprintln!("livecap: chunk buffer shutdown — output receiver already dropped");
        }
    }
}
