//! Pluggable consumers for the ordered transcript stream.

use crate::error::Result;
use crate::pipeline::types::TranscriptSegment;
use crate::session::SessionSnapshot;
use std::sync::{Arc, Mutex};

/// Downstream consumer of a session's transcript.
/// Pairs with AudioSource for input - this handles the labeled output.
pub trait SegmentSink: Send + 'static {
    /// Handle one emitted segment. Called in emission order.
    fn on_segment(&mut self, segment: &TranscriptSegment) -> Result<()>;

    /// Called once when the session reaches a terminal state, with the final
    /// snapshot (full transcript + per-speaker statistics).
    fn on_complete(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        let _ = snapshot;
        Ok(())
    }

    /// Name for logging/debugging.
    fn name(&self) -> &'static str {
        "sink"
    }
}

/// Sink that collects segments for later inspection. Cloning shares the
/// underlying storage, so keep a clone to read what the pipeline delivered.
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    segments: Arc<Mutex<Vec<TranscriptSegment>>>,
    final_snapshot: Arc<Mutex<Option<SessionSnapshot>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Segments delivered so far.
    pub fn segments(&self) -> Vec<TranscriptSegment> {
        self.segments
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// The final snapshot, once the session ended.
    pub fn final_snapshot(&self) -> Option<SessionSnapshot> {
        self.final_snapshot
            .lock()
            .ok()
            .and_then(|s| s.clone())
    }
}

impl SegmentSink for CollectorSink {
    fn on_segment(&mut self, segment: &TranscriptSegment) -> Result<()> {
        if let Ok(mut segments) = self.segments.lock() {
            segments.push(segment.clone());
        }
        Ok(())
    }

    fn on_complete(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        if let Ok(mut slot) = self.final_snapshot.lock() {
            *slot = Some(snapshot.clone());
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "collector"
    }
}

/// Sink that fans the stream out to several child sinks in order.
pub struct MultiSink {
    sinks: Vec<Box<dyn SegmentSink>>,
}

impl MultiSink {
    pub fn new(sinks: Vec<Box<dyn SegmentSink>>) -> Self {
        Self { sinks }
    }
}

impl SegmentSink for MultiSink {
    fn on_segment(&mut self, segment: &TranscriptSegment) -> Result<()> {
        for sink in &mut self.sinks {
            sink.on_segment(segment)?;
        }
        Ok(())
    }

    fn on_complete(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        for sink in &mut self.sinks {
            sink.on_complete(snapshot)?;
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "multi"
    }
}

/// Sink that renders labeled captions to stdout for the console UI.
#[cfg(feature = "cli")]
pub struct ConsoleSink {
    color: bool,
}

#[cfg(feature = "cli")]
impl ConsoleSink {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, label: &str) -> String {
        use owo_colors::OwoColorize;

        if !self.color {
            return label.to_string();
        }
        // Stable color per speaker ordinal
        let ordinal: usize = label
            .trim_start_matches('S')
            .parse()
            .unwrap_or(0);
        match ordinal % 4 {
            0 => label.cyan().to_string(),
            1 => label.green().to_string(),
            2 => label.yellow().to_string(),
            _ => label.magenta().to_string(),
        }
    }
}

#[cfg(feature = "cli")]
impl SegmentSink for ConsoleSink {
    fn on_segment(&mut self, segment: &TranscriptSegment) -> Result<()> {
        let marker = if segment.overlap {
            format!(" [overlap: {}]", segment.overlaps_with.join(", "))
        } else {
            String::new()
        };
        println!(
            "[{:7.1}s] {}: {}{}",
            segment.start_secs,
            self.paint(&segment.speaker),
            segment.text,
            marker
        );
        Ok(())
    }

    fn on_complete(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        println!();
        println!(
            "session {} {} — {} segment(s), {} speaker(s), {:.1}s",
            snapshot.id,
            snapshot.state,
            snapshot.segments.len(),
            snapshot.speakers.len(),
            snapshot.duration_secs
        );
        for stats in &snapshot.speakers {
            println!(
                "  {}: {} words, {:.1}s speaking",
                self.paint(&stats.label),
                stats.word_count,
                stats.speaking_secs
            );
        }
        if let Some(ref failure) = snapshot.failure {
            println!("  ended with: {}", failure);
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "console"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Session, SessionConfig};

    fn segment(speaker: &str, text: &str) -> TranscriptSegment {
        TranscriptSegment {
            speaker: speaker.to_string(),
            text: text.to_string(),
            start_secs: 0.0,
            end_secs: 1.0,
            overlap: false,
            overlaps_with: Vec::new(),
            chunk_index: 0,
        }
    }

    #[test]
    fn test_collector_accumulates_in_order() {
        let collector = CollectorSink::new();
        let mut sink: Box<dyn SegmentSink> = Box::new(collector.clone());

        sink.on_segment(&segment("S1", "one")).unwrap();
        sink.on_segment(&segment("S2", "two")).unwrap();

        let collected = collector.segments();
        assert_eq!(collected.len(), 2);
        assert_eq!(collected[0].text, "one");
        assert_eq!(collected[1].text, "two");
    }

    #[test]
    fn test_multi_sink_forwards_to_all_children() {
        let first = CollectorSink::new();
        let second = CollectorSink::new();
        let mut multi = MultiSink::new(vec![
            Box::new(first.clone()),
            Box::new(second.clone()),
        ]);

        multi.on_segment(&segment("S1", "shared")).unwrap();

        assert_eq!(first.segments().len(), 1);
        assert_eq!(second.segments().len(), 1);
    }

    #[test]
    fn test_collector_captures_final_snapshot() {
        let collector = CollectorSink::new();
        let mut sink: Box<dyn SegmentSink> = Box::new(collector.clone());

        assert!(collector.final_snapshot().is_none());

        let session = Session::new("snap-test", SessionConfig::default());
        session.complete();
        sink.on_complete(&session.snapshot()).unwrap();

        let snapshot = collector.final_snapshot().expect("snapshot stored");
        assert_eq!(snapshot.id, "snap-test");
    }
}
