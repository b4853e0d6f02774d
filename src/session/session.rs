//! Per-session state: lifecycle machine, transcript, speaker statistics.

use crate::defaults;
use crate::pipeline::types::TranscriptSegment;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Lifecycle state: `created → processing → {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    Processing,
    Completed,
    Failed,
}

impl SessionState {
    fn is_terminal(self) -> bool {
        matches!(self, SessionState::Completed | SessionState::Failed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Created => "created",
            SessionState::Processing => "processing",
            SessionState::Completed => "completed",
            SessionState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Why a session ended in `failed`.
///
/// Cancellation is a distinct terminal condition, not an error: it shares
/// the `failed` state but is reported separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionFailure {
    /// Non-recoverable backend condition (auth rejection, quota).
    Backend { message: String },
    /// Too many chunks degraded to empty results.
    DegradedBudget { degraded: u32 },
    /// Cancelled by the consumer.
    Cancelled { reason: String },
}

impl fmt::Display for SessionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionFailure::Backend { message } => write!(f, "backend failure: {}", message),
            SessionFailure::DegradedBudget { degraded } => {
                write!(f, "too many degraded chunks ({})", degraded)
            }
            SessionFailure::Cancelled { reason } => write!(f, "cancelled: {}", reason),
        }
    }
}

/// Accumulated statistics for one stable speaker.
///
/// `text` is the speaker's full accumulated transcript — the input the
/// summary generator works from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerStats {
    pub label: String,
    pub word_count: u64,
    pub speaking_secs: f64,
    pub text: String,
}

/// Point-in-time view of a session, safe to take while processing.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: String,
    pub state: SessionState,
    pub created_at: DateTime<Utc>,
    pub segments: Vec<TranscriptSegment>,
    pub speakers: Vec<SpeakerStats>,
    pub degraded_chunks: u32,
    pub failure: Option<SessionFailure>,
    /// Stream time covered by the transcript so far.
    pub duration_secs: f64,
}

/// Session limits.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// Degraded chunks tolerated before the session fails.
    pub max_degraded_chunks: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_degraded_chunks: defaults::MAX_DEGRADED_CHUNKS,
        }
    }
}

#[derive(Debug)]
struct SessionInner {
    state: SessionState,
    segments: Vec<TranscriptSegment>,
    speakers: Vec<SpeakerStats>,
    degraded_chunks: u32,
    failure: Option<SessionFailure>,
}

/// Shared handle to one session's mutable state.
///
/// Cheap to clone; every component of a session's pipeline holds one. No
/// state is shared between different sessions.
#[derive(Debug, Clone)]
pub struct Session {
    id: Arc<str>,
    created_at: DateTime<Utc>,
    config: SessionConfig,
    inner: Arc<Mutex<SessionInner>>,
}

impl Session {
    /// Creates a session in the `created` state.
    pub fn new(id: &str, config: SessionConfig) -> Self {
        Self {
            id: Arc::from(id),
            created_at: Utc::now(),
            config,
            inner: Arc::new(Mutex::new(SessionInner {
                state: SessionState::Created,
                segments: Vec::new(),
                speakers: Vec::new(),
                degraded_chunks: 0,
                failure: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        // A panicked holder leaves consistent state; keep serving reads.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// First chunk dispatched: `created → processing`.
    pub fn mark_processing(&self) {
        let mut inner = self.lock();
        if inner.state == SessionState::Created {
            inner.state = SessionState::Processing;
        }
    }

    /// Appends reconciled segments in emission order and updates speaker
    /// statistics. Returns false (appending nothing) once the session is
    /// terminal — after cancellation no segment ever lands.
    pub fn append_segments(&self, segments: &[TranscriptSegment]) -> bool {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return false;
        }
        for segment in segments {
            update_stats(&mut inner.speakers, segment);
            inner.segments.push(segment.clone());
        }
        true
    }

    /// Records a degraded (empty-result) chunk; fails the session once the
    /// budget is exceeded.
    pub fn record_degraded(&self, message: &str) {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return;
        }
        inner.degraded_chunks += 1;
        eprintln!("livecap: session {}: chunk degraded: {}", self.id, message);
        if inner.degraded_chunks > self.config.max_degraded_chunks {
            let degraded = inner.degraded_chunks;
            fail(&mut inner, SessionFailure::DegradedBudget { degraded });
        }
    }

    /// Non-recoverable backend condition: `→ failed`.
    pub fn record_fatal(&self, message: &str) {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return;
        }
        fail(
            &mut inner,
            SessionFailure::Backend {
                message: message.to_string(),
            },
        );
    }

    /// Cancels the session: `→ failed` with a cancellation reason.
    /// Idempotent — a second cancel (or cancel after completion) is a no-op.
    pub fn cancel(&self, reason: &str) {
        let mut inner = self.lock();
        if inner.state.is_terminal() {
            return;
        }
        fail(
            &mut inner,
            SessionFailure::Cancelled {
                reason: reason.to_string(),
            },
        );
    }

    /// End-of-stream with all chunks reconciled: `→ completed`.
    /// No-op if the session already failed.
    pub fn complete(&self) {
        let mut inner = self.lock();
        if !inner.state.is_terminal() {
            inner.state = SessionState::Completed;
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.lock().failure,
            Some(SessionFailure::Cancelled { .. })
        )
    }

    pub fn failure(&self) -> Option<SessionFailure> {
        self.lock().failure.clone()
    }

    pub fn degraded_chunks(&self) -> u32 {
        self.lock().degraded_chunks
    }

    pub fn segment_count(&self) -> usize {
        self.lock().segments.len()
    }

    pub fn speaker_count(&self) -> usize {
        self.lock().speakers.len()
    }

    /// Ordered transcript so far.
    pub fn segments(&self) -> Vec<TranscriptSegment> {
        self.lock().segments.clone()
    }

    /// Per-speaker aggregates for summary generation.
    pub fn speaker_stats(&self) -> Vec<SpeakerStats> {
        self.lock().speakers.clone()
    }

    /// Full point-in-time view.
    pub fn snapshot(&self) -> SessionSnapshot {
        let inner = self.lock();
        let duration_secs = inner
            .segments
            .iter()
            .map(|s| s.end_secs)
            .fold(0.0, f64::max);
        SessionSnapshot {
            id: self.id.to_string(),
            state: inner.state,
            created_at: self.created_at,
            segments: inner.segments.clone(),
            speakers: inner.speakers.clone(),
            degraded_chunks: inner.degraded_chunks,
            failure: inner.failure.clone(),
            duration_secs,
        }
    }
}

fn fail(inner: &mut SessionInner, failure: SessionFailure) {
    inner.state = SessionState::Failed;
    inner.failure = Some(failure);
}

fn update_stats(speakers: &mut Vec<SpeakerStats>, segment: &TranscriptSegment) {
    let idx = match speakers.iter().position(|s| s.label == segment.speaker) {
        Some(idx) => idx,
        None => {
            speakers.push(SpeakerStats {
                label: segment.speaker.clone(),
                word_count: 0,
                speaking_secs: 0.0,
                text: String::new(),
            });
            speakers.len() - 1
        }
    };
    let stats = &mut speakers[idx];
    stats.word_count += segment.word_count();
    stats.speaking_secs += segment.duration_secs();
    if !stats.text.is_empty() {
        stats.text.push(' ');
    }
    stats.text.push_str(&segment.text);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(speaker: &str, text: &str, start: f64, end: f64) -> TranscriptSegment {
        TranscriptSegment {
            speaker: speaker.to_string(),
            text: text.to_string(),
            start_secs: start,
            end_secs: end,
            overlap: false,
            overlaps_with: Vec::new(),
            chunk_index: 0,
        }
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let session = Session::new("s1", SessionConfig::default());
        assert_eq!(session.state(), SessionState::Created);

        session.mark_processing();
        assert_eq!(session.state(), SessionState::Processing);

        session.complete();
        assert_eq!(session.state(), SessionState::Completed);
        assert!(session.failure().is_none());
    }

    #[test]
    fn test_mark_processing_only_from_created() {
        let session = Session::new("s1", SessionConfig::default());
        session.cancel("early");
        session.mark_processing();
        assert_eq!(session.state(), SessionState::Failed);
    }

    #[test]
    fn test_append_updates_speaker_stats() {
        let session = Session::new("s1", SessionConfig::default());
        session.mark_processing();

        assert!(session.append_segments(&[
            segment("S1", "hello there", 0.0, 1.5),
            segment("S2", "hi", 1.5, 2.0),
            segment("S1", "how are you", 2.0, 3.0),
        ]));

        let stats = session.speaker_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].label, "S1");
        assert_eq!(stats[0].word_count, 5);
        assert!((stats[0].speaking_secs - 2.5).abs() < 1e-9);
        assert_eq!(stats[0].text, "hello there how are you");
        assert_eq!(stats[1].label, "S2");
        assert_eq!(stats[1].word_count, 1);
    }

    #[test]
    fn test_cancel_blocks_further_appends() {
        let session = Session::new("s1", SessionConfig::default());
        session.mark_processing();
        session.append_segments(&[segment("S1", "before", 0.0, 1.0)]);

        session.cancel("client went away");
        assert_eq!(session.state(), SessionState::Failed);
        assert!(session.is_cancelled());

        assert!(!session.append_segments(&[segment("S1", "after", 1.0, 2.0)]));
        assert_eq!(session.segment_count(), 1);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let session = Session::new("s1", SessionConfig::default());
        session.mark_processing();
        session.cancel("first");
        session.cancel("second");

        match session.failure() {
            Some(SessionFailure::Cancelled { reason }) => assert_eq!(reason, "first"),
            other => panic!("expected cancellation, got {:?}", other),
        }
    }

    #[test]
    fn test_complete_does_not_override_failed() {
        let session = Session::new("s1", SessionConfig::default());
        session.mark_processing();
        session.record_fatal("auth rejected");
        session.complete();

        assert_eq!(session.state(), SessionState::Failed);
        match session.failure() {
            Some(SessionFailure::Backend { message }) => {
                assert_eq!(message, "auth rejected");
            }
            other => panic!("expected backend failure, got {:?}", other),
        }
    }

    #[test]
    fn test_degraded_chunks_within_budget_keep_processing() {
        let session = Session::new(
            "s1",
            SessionConfig {
                max_degraded_chunks: 3,
            },
        );
        session.mark_processing();

        for _ in 0..3 {
            session.record_degraded("backend timeout");
        }
        assert_eq!(session.state(), SessionState::Processing);
        assert_eq!(session.degraded_chunks(), 3);
    }

    #[test]
    fn test_degraded_budget_exceeded_fails_session() {
        let session = Session::new(
            "s1",
            SessionConfig {
                max_degraded_chunks: 2,
            },
        );
        session.mark_processing();

        for _ in 0..3 {
            session.record_degraded("backend timeout");
        }
        assert_eq!(session.state(), SessionState::Failed);
        match session.failure() {
            Some(SessionFailure::DegradedBudget { degraded }) => assert_eq!(degraded, 3),
            other => panic!("expected degraded budget failure, got {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_readable_while_processing() {
        let session = Session::new("s1", SessionConfig::default());
        session.mark_processing();
        session.append_segments(&[segment("S1", "live words", 0.0, 2.0)]);

        let snapshot = session.snapshot();
        assert_eq!(snapshot.state, SessionState::Processing);
        assert_eq!(snapshot.segments.len(), 1);
        assert!((snapshot.duration_secs - 2.0).abs() < 1e-9);
        assert_eq!(snapshot.id, "s1");
    }

    #[test]
    fn test_state_display_and_serde() {
        assert_eq!(SessionState::Processing.to_string(), "processing");
        let json = serde_json::to_string(&SessionState::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }

    #[test]
    fn test_failure_display() {
        let cancelled = SessionFailure::Cancelled {
            reason: "user hung up".to_string(),
        };
        assert_eq!(cancelled.to_string(), "cancelled: user hung up");

        let budget = SessionFailure::DegradedBudget { degraded: 9 };
        assert_eq!(budget.to_string(), "too many degraded chunks (9)");
    }
}
