//! On-disk recording of session transcripts.
//!
//! Writes segments as JSON lines while the session runs, and the final
//! snapshot (full transcript + per-speaker statistics) as a summary file at
//! completion. One recorder per session.

use crate::error::{LivecapError, Result};
use crate::pipeline::sink::SegmentSink;
use crate::pipeline::types::TranscriptSegment;
use crate::session::SessionSnapshot;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Sink that records the segment stream to `<id>.transcript.jsonl` and the
/// final snapshot to `<id>.summary.json`.
pub struct TranscriptRecorder {
    transcript: BufWriter<File>,
    summary_path: PathBuf,
}

impl TranscriptRecorder {
    /// Creates the output directory (if needed) and both file targets.
    pub fn create(dir: &Path, session_id: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let transcript_path = dir.join(format!("{session_id}.transcript.jsonl"));
        let summary_path = dir.join(format!("{session_id}.summary.json"));

        let file = File::create(&transcript_path)?;
        Ok(Self {
            transcript: BufWriter::new(file),
            summary_path,
        })
    }
}

impl SegmentSink for TranscriptRecorder {
    fn on_segment(&mut self, segment: &TranscriptSegment) -> Result<()> {
        let line = serde_json::to_string(segment).map_err(|e| LivecapError::Recording {
            message: format!("segment serialization failed: {}", e),
        })?;
        writeln!(self.transcript, "{}", line)?;
        // Keep the file current while the session runs
        self.transcript.flush()?;
        Ok(())
    }

    fn on_complete(&mut self, snapshot: &SessionSnapshot) -> Result<()> {
        self.transcript.flush()?;
        let summary =
            serde_json::to_string_pretty(snapshot).map_err(|e| LivecapError::Recording {
                message: format!("summary serialization failed: {}", e),
            })?;
        fs::write(&self.summary_path, summary)?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}
