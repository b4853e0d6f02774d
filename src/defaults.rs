//! Default configuration constants for livecap.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and what the diarizing
/// backend expects for PCM uploads.
pub const SAMPLE_RATE: u32 = 16000;

/// Default chunk duration in seconds.
///
/// Each sealed chunk covers this much stream time before it is dispatched
/// to the backend. 5s balances transcript latency against per-request cost.
pub const CHUNK_SECS: f64 = 5.0;

/// Default maximum chunk window in seconds for voice-gated chunking.
///
/// Bounds latency during sparse speech: a chunk is sealed when this much
/// stream time has elapsed since it opened, even if little speech accumulated.
pub const MAX_CHUNK_SECS: f64 = 8.0;

/// Default voice activity threshold.
///
/// RMS-based threshold (0.0 to 1.0) for classifying a sample block as speech.
/// 0.02 is tuned for typical microphone input levels.
pub const ACTIVITY_THRESHOLD: f32 = 0.02;

/// Default maximum number of in-flight backend requests per session.
pub const MAX_IN_FLIGHT: usize = 2;

/// Default retry bound for transient backend failures on a single chunk.
pub const MAX_RETRIES: u32 = 3;

/// Default base backoff between retries, in milliseconds.
///
/// The n-th retry waits n times this long.
pub const RETRY_BACKOFF_MS: u64 = 250;

/// Default bound on the queue of sealed-but-undispatched chunks.
///
/// When full, the chunk buffer blocks, pausing the audio producer. Nothing
/// is dropped.
pub const CHUNK_QUEUE_BOUND: usize = 8;

/// Default number of degraded (all-retries-failed) chunks a session tolerates
/// before it is considered failed.
pub const MAX_DEGRADED_CHUNKS: u32 = 8;

/// Default number of chunks a speaker may be absent from before its last-seen
/// token stops matching and the speaker is treated as new on return.
pub const MAX_SKIPPED_CHUNKS: u64 = 1;

/// Default diarization speaker cap requested from the backend.
pub const NUM_SPEAKERS: u32 = 5;

/// Default backend request timeout in seconds.
pub const BACKEND_TIMEOUT_SECS: u64 = 60;

/// Default audio frame channel capacity.
pub const AUDIO_BUFFER: usize = 1024;

/// Default capacity of the channels carrying per-chunk results and labeled
/// segments.
pub const RESULT_BUFFER: usize = 16;
