use crate::error::{LivecapError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

/// Metadata identifying one chunk within a session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkMeta {
    /// Monotonic chunk index within the session.
    pub index: u64,
    /// Chunk start, seconds from session start.
    pub start_secs: f64,
    /// Chunk end, seconds from session start.
    pub end_secs: f64,
    /// Sample rate of the PCM payload.
    pub sample_rate: u32,
}

/// Per-word timing as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordTiming {
    pub text: String,
    /// Seconds from chunk start.
    pub start: f64,
    pub end: f64,
}

/// One speaker utterance from a single chunk's diarization response.
///
/// The speaker token is meaningful only within the chunk it came from; the
/// reconciler maps it onto a session-stable label before anything downstream
/// sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSegment {
    /// Backend-local speaker token, e.g. "speaker_0". Chunk-scoped.
    pub speaker_token: String,
    pub text: String,
    /// Seconds from chunk start.
    pub start: f64,
    pub end: f64,
    /// Optional per-word timestamps.
    #[serde(default)]
    pub words: Vec<WordTiming>,
}

impl RawSegment {
    /// Creates a segment without word-level timing.
    pub fn new(speaker_token: &str, text: &str, start: f64, end: f64) -> Self {
        Self {
            speaker_token: speaker_token.to_string(),
            text: text.to_string(),
            start,
            end,
            words: Vec::new(),
        }
    }
}

/// Trait for speaker-diarizing transcription backends.
///
/// This trait allows swapping implementations (real HTTP service vs mock).
/// Implementations classify their failures via [`LivecapError::is_retryable`]
/// and [`LivecapError::is_fatal`]; the dispatch pipeline keys its retry and
/// session-failure behavior off that classification.
pub trait TranscriptionBackend: Send + Sync {
    /// Transcribe and diarize one chunk of 16-bit PCM audio.
    ///
    /// Returned segments carry chunk-relative timestamps and chunk-scoped
    /// speaker tokens.
    fn transcribe(&self, samples: &[i16], meta: &ChunkMeta) -> Result<Vec<RawSegment>>;

    /// Name of the backend for logging.
    fn name(&self) -> &str;
}

/// Implement TranscriptionBackend for Arc<T> to allow sharing across sessions.
impl<T: TranscriptionBackend> TranscriptionBackend for Arc<T> {
    fn transcribe(&self, samples: &[i16], meta: &ChunkMeta) -> Result<Vec<RawSegment>> {
        (**self).transcribe(samples, meta)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Kinds of failure a [`MockBackend`] can be scripted to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    Transient,
    Auth,
    Malformed,
}

#[derive(Debug, Clone)]
struct ScriptedFailure {
    kind: MockFailure,
    /// How many calls for this chunk fail before succeeding. u32::MAX = always.
    times: u32,
}

#[derive(Debug, Default)]
struct MockState {
    calls: HashMap<u64, u32>,
    call_order: Vec<u64>,
}

/// Mock backend with per-chunk scripted responses, failures, and delays.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    responses: HashMap<u64, Vec<RawSegment>>,
    failures: HashMap<u64, ScriptedFailure>,
    delays: HashMap<u64, Duration>,
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    /// Create a mock that returns empty responses for every chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the response for a chunk index.
    pub fn with_chunk(mut self, index: u64, segments: Vec<RawSegment>) -> Self {
        self.responses.insert(index, segments);
        self
    }

    /// Script `times` consecutive failures of `kind` for a chunk index,
    /// after which the scripted response (if any) is returned.
    pub fn with_failures(mut self, index: u64, kind: MockFailure, times: u32) -> Self {
        self.failures
            .insert(index, ScriptedFailure { kind, times });
        self
    }

    /// Script a chunk to fail every attempt.
    pub fn with_permanent_failure(self, index: u64, kind: MockFailure) -> Self {
        self.with_failures(index, kind, u32::MAX)
    }

    /// Script a processing delay for a chunk index, to force out-of-order
    /// completion in concurrency tests.
    pub fn with_delay(mut self, index: u64, delay: Duration) -> Self {
        self.delays.insert(index, delay);
        self
    }

    /// Number of transcribe calls made for a chunk index.
    pub fn calls_for(&self, index: u64) -> u32 {
        self.state
            .lock()
            .map(|s| s.calls.get(&index).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Chunk indices in the order the backend first saw them.
    pub fn call_order(&self) -> Vec<u64> {
        self.state
            .lock()
            .map(|s| s.call_order.clone())
            .unwrap_or_default()
    }
}

impl TranscriptionBackend for MockBackend {
    fn transcribe(&self, _samples: &[i16], meta: &ChunkMeta) -> Result<Vec<RawSegment>> {
        let attempt = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| LivecapError::Other("mock backend state poisoned".to_string()))?;
            let count = state.calls.entry(meta.index).or_insert(0);
            *count += 1;
            let count = *count;
            if count == 1 {
                state.call_order.push(meta.index);
            }
            count
        };

        if let Some(delay) = self.delays.get(&meta.index) {
            std::thread::sleep(*delay);
        }

        if let Some(failure) = self.failures.get(&meta.index)
            && attempt <= failure.times
        {
            return Err(match failure.kind {
                MockFailure::Transient => LivecapError::BackendTransient {
                    message: format!("scripted transient failure for chunk {}", meta.index),
                },
                MockFailure::Auth => LivecapError::BackendAuth {
                    message: "scripted auth rejection".to_string(),
                },
                MockFailure::Malformed => LivecapError::BackendMalformed {
                    message: format!("scripted malformed response for chunk {}", meta.index),
                },
            });
        }

        Ok(self.responses.get(&meta.index).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
