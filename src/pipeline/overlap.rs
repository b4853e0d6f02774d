//! Overlap detection over labeled transcript segments.
//!
//! Flags pairs of segments from different speakers whose [start, end)
//! intervals intersect. To catch overlap across a chunk boundary, the
//! trailing segment of each chunk is held back and emitted with the next
//! chunk (or at flush), so both sides of a boundary overlap get flagged
//! before either is appended to the session.

use crate::pipeline::types::TranscriptSegment;

/// Half-open interval intersection: touching endpoints do not overlap.
fn intersects(a: &TranscriptSegment, b: &TranscriptSegment) -> bool {
    a.start_secs < b.end_secs && b.start_secs < a.end_secs
}

/// Flags every cross-speaker intersecting pair in place.
///
/// Pure function of segment timing; existing flags and partner sets are
/// extended, never cleared.
pub fn flag_overlaps(segments: &mut [TranscriptSegment]) {
    for i in 0..segments.len() {
        for j in (i + 1)..segments.len() {
            if segments[i].speaker == segments[j].speaker {
                continue;
            }
            if intersects(&segments[i], &segments[j]) {
                let (left, right) = segments.split_at_mut(j);
                mark_pair(&mut left[i], &mut right[0]);
            }
        }
    }
}

fn mark_pair(a: &mut TranscriptSegment, b: &mut TranscriptSegment) {
    a.overlap = true;
    b.overlap = true;
    if !a.overlaps_with.contains(&b.speaker) {
        a.overlaps_with.push(b.speaker.clone());
    }
    if !b.overlaps_with.contains(&a.speaker) {
        b.overlaps_with.push(a.speaker.clone());
    }
}

/// Stateful per-session detector that carries the trailing segment across
/// chunk boundaries.
#[derive(Debug, Default)]
pub struct OverlapDetector {
    tail: Option<TranscriptSegment>,
}

impl OverlapDetector {
    /// Creates a detector with no carried segment.
    pub fn new() -> Self {
        Self::default()
    }

    /// Processes one chunk's labeled segments.
    ///
    /// Returns the segments ready for emission: the previous chunk's held
    /// trailing segment (now fully flagged) followed by this chunk's
    /// segments except its own tail, which is held for the next call.
    /// An empty chunk emits nothing and keeps holding the tail.
    pub fn process(&mut self, segments: Vec<TranscriptSegment>) -> Vec<TranscriptSegment> {
        if segments.is_empty() {
            return Vec::new();
        }

        let mut all: Vec<TranscriptSegment> =
            self.tail.take().into_iter().chain(segments).collect();
        flag_overlaps(&mut all);
        self.tail = all.pop();
        all
    }

    /// Releases the held trailing segment at end-of-stream.
    pub fn flush(&mut self) -> Option<TranscriptSegment> {
        self.tail.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(speaker: &str, start: f64, end: f64) -> TranscriptSegment {
        TranscriptSegment {
            speaker: speaker.to_string(),
            text: "words".to_string(),
            start_secs: start,
            end_secs: end,
            overlap: false,
            overlaps_with: Vec::new(),
            chunk_index: 0,
        }
    }

    #[test]
    fn test_intersecting_pair_both_flagged() {
        let mut segments = vec![segment("S1", 0.0, 2.0), segment("S2", 1.5, 3.0)];
        flag_overlaps(&mut segments);

        assert!(segments[0].overlap);
        assert_eq!(segments[0].overlaps_with, vec!["S2"]);
        assert!(segments[1].overlap);
        assert_eq!(segments[1].overlaps_with, vec!["S1"]);
    }

    #[test]
    fn test_touching_intervals_not_flagged() {
        let mut segments = vec![segment("S1", 0.0, 2.0), segment("S2", 2.0, 3.0)];
        flag_overlaps(&mut segments);

        assert!(!segments[0].overlap);
        assert!(!segments[1].overlap);
        assert!(segments[0].overlaps_with.is_empty());
    }

    #[test]
    fn test_same_speaker_never_flagged() {
        let mut segments = vec![segment("S1", 0.0, 2.0), segment("S1", 1.0, 3.0)];
        flag_overlaps(&mut segments);

        assert!(!segments[0].overlap);
        assert!(!segments[1].overlap);
    }

    #[test]
    fn test_three_way_overlap_collects_all_partners() {
        let mut segments = vec![
            segment("S1", 0.0, 3.0),
            segment("S2", 1.0, 4.0),
            segment("S3", 2.0, 5.0),
        ];
        flag_overlaps(&mut segments);

        assert_eq!(segments[0].overlaps_with, vec!["S2", "S3"]);
        assert_eq!(segments[1].overlaps_with, vec!["S1", "S3"]);
        assert_eq!(segments[2].overlaps_with, vec!["S1", "S2"]);
    }

    #[test]
    fn test_detector_holds_back_trailing_segment() {
        let mut detector = OverlapDetector::new();

        let emitted = detector.process(vec![segment("S1", 0.0, 1.0), segment("S2", 2.0, 4.0)]);
        // Tail (S2) held back for cross-boundary comparison
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].speaker, "S1");

        assert_eq!(detector.flush().unwrap().speaker, "S2");
        assert!(detector.flush().is_none());
    }

    #[test]
    fn test_cross_boundary_overlap_flags_both_sides() {
        let mut detector = OverlapDetector::new();

        // Chunk 0 tail [3.0, 6.0) S1 overlaps chunk 1 head [5.5, 7.0) S2
        let first = detector.process(vec![segment("S1", 3.0, 6.0)]);
        assert!(first.is_empty());

        let second = detector.process(vec![segment("S2", 5.5, 7.0)]);
        // Previous tail emitted, now flagged against the new head
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].speaker, "S1");
        assert!(second[0].overlap);
        assert_eq!(second[0].overlaps_with, vec!["S2"]);

        let tail = detector.flush().unwrap();
        assert_eq!(tail.speaker, "S2");
        assert!(tail.overlap);
        assert_eq!(tail.overlaps_with, vec!["S1"]);
    }

    #[test]
    fn test_empty_chunk_keeps_holding_tail() {
        let mut detector = OverlapDetector::new();

        detector.process(vec![segment("S1", 0.0, 1.0)]);
        // Degraded/elided chunk: nothing emitted, tail retained
        assert!(detector.process(Vec::new()).is_empty());
        assert_eq!(detector.flush().unwrap().speaker, "S1");
    }

    #[test]
    fn test_within_chunk_flags_survive_holdback() {
        let mut detector = OverlapDetector::new();

        let emitted = detector.process(vec![
            segment("S1", 0.0, 2.0),
            segment("S2", 1.5, 3.0),
        ]);
        assert_eq!(emitted.len(), 1);
        assert!(emitted[0].overlap, "emitted S1 keeps its within-chunk flag");

        let tail = detector.flush().unwrap();
        assert!(tail.overlap, "held S2 keeps its within-chunk flag");
        assert_eq!(tail.overlaps_with, vec!["S1"]);
    }
}
