//! Data types flowing through the session pipeline.

use crate::backend::{ChunkMeta, RawSegment};
use serde::{Deserialize, Serialize};

/// A block of raw audio samples with its position in the stream.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// PCM samples (16-bit signed integers).
    pub samples: Vec<i16>,
    /// Stream time of the first sample, seconds from session start.
    pub start_secs: f64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioFrame {
    /// Creates a new audio frame.
    pub fn new(samples: Vec<i16>, start_secs: f64, sample_rate: u32) -> Self {
        Self {
            samples,
            start_secs,
            sample_rate,
        }
    }

    /// Stream time just past the last sample.
    pub fn end_secs(&self) -> f64 {
        self.start_secs + self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// A sealed chunk of audio ready for dispatch.
///
/// Immutable once sealed: indices within a session are strictly increasing
/// and gapless, timestamps are derived from the running sample count.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// PCM samples (16-bit signed integers). May be shorter than the covered
    /// window when voice gating dropped silence.
    pub samples: Vec<i16>,
    /// Monotonic chunk index within the session.
    pub index: u64,
    /// Window start, seconds from session start.
    pub start_secs: f64,
    /// Window end, seconds from session start.
    pub end_secs: f64,
    /// Sample rate in Hz.
    pub sample_rate: u32,
}

impl AudioChunk {
    /// Creates a new audio chunk.
    pub fn new(
        samples: Vec<i16>,
        index: u64,
        start_secs: f64,
        end_secs: f64,
        sample_rate: u32,
    ) -> Self {
        Self {
            samples,
            index,
            start_secs,
            end_secs,
            sample_rate,
        }
    }

    /// True when the chunk carries no samples (silence-only window).
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Metadata handed to the backend alongside the samples.
    pub fn meta(&self) -> ChunkMeta {
        ChunkMeta {
            index: self.index,
            start_secs: self.start_secs,
            end_secs: self.end_secs,
            sample_rate: self.sample_rate,
        }
    }
}

/// A per-chunk failure note carried alongside (possibly empty) results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub message: String,
    /// Fatal failures end the session; non-fatal ones only degrade the chunk.
    pub fatal: bool,
}

/// The outcome of dispatching one chunk: the backend's raw segments, released
/// to the reconciler strictly in chunk-index order.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub index: u64,
    pub start_secs: f64,
    pub end_secs: f64,
    pub segments: Vec<RawSegment>,
    pub failure: Option<ChunkFailure>,
}

impl ChunkResult {
    /// An empty result for a chunk (elided or degraded).
    pub fn empty(chunk: &AudioChunk) -> Self {
        Self {
            index: chunk.index,
            start_secs: chunk.start_secs,
            end_secs: chunk.end_secs,
            segments: Vec::new(),
            failure: None,
        }
    }
}

/// A finalized transcript unit with a session-stable speaker label and
/// absolute timestamps. Append-only once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Stable speaker label ("S1", "S2", ...).
    pub speaker: String,
    pub text: String,
    /// Seconds from session start.
    pub start_secs: f64,
    pub end_secs: f64,
    /// Set when this segment's interval intersects another speaker's.
    pub overlap: bool,
    /// Labels of the overlapping speakers, when `overlap` is set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overlaps_with: Vec<String>,
    /// Index of the chunk this segment came from.
    pub chunk_index: u64,
}

impl TranscriptSegment {
    /// Number of whitespace-separated words in the text.
    pub fn word_count(&self) -> u64 {
        self.text.split_whitespace().count() as u64
    }

    /// Speaking time covered by this segment.
    pub fn duration_secs(&self) -> f64 {
        (self.end_secs - self.start_secs).max(0.0)
    }
}

/// A chunk's worth of labeled segments, plus any failure note to surface.
#[derive(Debug, Clone)]
pub struct LabeledChunk {
    pub index: u64,
    pub segments: Vec<TranscriptSegment>,
    pub failure: Option<ChunkFailure>,
}
