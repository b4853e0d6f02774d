//! Cross-chunk speaker reconciliation.
//!
//! The backend diarizes every chunk independently: "speaker_1" in chunk N
//! and "speaker_1" in chunk N+1 are unrelated identifiers. This module maps
//! those ephemeral tokens onto session-stable labels (S1, S2, ...) using the
//! only continuity signal available — token recurrence across nearby chunks.
//!
//! This is a greedy local heuristic, not re-identification. It is
//! deterministic, costs O(speakers-per-chunk) per chunk, and makes no
//! accuracy guarantee: a speaker whose token changes between chunks becomes
//! a new label, and an unrelated speaker reusing a recent token inherits one.

use crate::defaults;
use crate::pipeline::types::{ChunkResult, TranscriptSegment};
use std::collections::HashMap;

/// Configuration for the reconciliation heuristic.
#[derive(Debug, Clone, Copy)]
pub struct ReconcilerConfig {
    /// Chunks a speaker may be absent from before its last-seen token stops
    /// matching. With the default of 1, a speaker silent for one chunk keeps
    /// its identity; silent for two, it returns as a new speaker.
    pub max_skipped_chunks: u64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            max_skipped_chunks: defaults::MAX_SKIPPED_CHUNKS,
        }
    }
}

/// A session-stable speaker identity.
///
/// Created on first unmatched token, never destroyed for the lifetime of the
/// session, and never reassigned to a different token lineage.
#[derive(Debug, Clone)]
struct SpeakerRecord {
    label: String,
    /// Backend token this speaker mapped to in the last chunk containing it.
    last_token: String,
    /// Index of that chunk.
    last_seen_chunk: u64,
}

/// Maps per-chunk backend speaker tokens onto stable session labels.
pub struct SpeakerReconciler {
    config: ReconcilerConfig,
    speakers: Vec<SpeakerRecord>,
}

impl SpeakerReconciler {
    /// Creates an empty reconciler.
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            speakers: Vec::new(),
        }
    }

    /// Number of stable speakers created so far.
    pub fn speaker_count(&self) -> usize {
        self.speakers.len()
    }

    /// Labels in creation order.
    pub fn labels(&self) -> Vec<String> {
        self.speakers.iter().map(|s| s.label.clone()).collect()
    }

    /// Reconciles one chunk's raw segments into stable-labeled transcript
    /// segments with absolute timestamps.
    ///
    /// Chunks must be fed strictly in index order; the dispatch pipeline's
    /// reorder stage guarantees this.
    pub fn reconcile(&mut self, result: &ChunkResult) -> Vec<TranscriptSegment> {
        // Tokens in order of first appearance within the chunk
        let mut token_order: Vec<&str> = Vec::new();
        for segment in &result.segments {
            let token = segment.speaker_token.as_str();
            if !token_order.contains(&token) {
                token_order.push(token);
            }
        }

        let mut claimed = vec![false; self.speakers.len()];
        let mut mapping: HashMap<&str, usize> = HashMap::new();

        for &token in &token_order {
            let speaker_idx = match self.match_token(token, result.index, &claimed) {
                Some(idx) => idx,
                None => {
                    // Brand-new stable speaker with the next unused ordinal
                    let label = format!("S{}", self.speakers.len() + 1);
                    self.speakers.push(SpeakerRecord {
                        label,
                        last_token: String::new(),
                        last_seen_chunk: result.index,
                    });
                    claimed.push(false);
                    self.speakers.len() - 1
                }
            };
            claimed[speaker_idx] = true;
            mapping.insert(token, speaker_idx);
        }

        // Matched and new speakers alike now carry this chunk's token
        for (&token, &idx) in &mapping {
            self.speakers[idx].last_token = token.to_string();
            self.speakers[idx].last_seen_chunk = result.index;
        }

        // Emit in the backend's returned order, with absolute timestamps
        result
            .segments
            .iter()
            .map(|segment| {
                let idx = mapping[segment.speaker_token.as_str()];
                TranscriptSegment {
                    speaker: self.speakers[idx].label.clone(),
                    text: segment.text.clone(),
                    start_secs: result.start_secs + segment.start,
                    end_secs: result.start_secs + segment.end,
                    overlap: false,
                    overlaps_with: Vec::new(),
                    chunk_index: result.index,
                }
            })
            .collect()
    }

    /// Finds the stable speaker whose last-seen token matches, if any.
    ///
    /// A candidate must be unclaimed in this chunk and recent enough: a
    /// last-seen token stays valid for `max_skipped_chunks` skipped chunks.
    /// When several candidates share the token (backend token reuse across
    /// unrelated speakers), the most recently seen wins; equal recency keeps
    /// the earliest-created speaker.
    fn match_token(&self, token: &str, chunk_index: u64, claimed: &[bool]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (idx, speaker) in self.speakers.iter().enumerate() {
            if claimed[idx] || speaker.last_token != token {
                continue;
            }
            let skipped = chunk_index.saturating_sub(speaker.last_seen_chunk);
            if skipped == 0 || skipped > self.config.max_skipped_chunks + 1 {
                continue;
            }
            match best {
                Some(b) if self.speakers[b].last_seen_chunk >= speaker.last_seen_chunk => {}
                _ => best = Some(idx),
            }
        }
        best
    }
}
