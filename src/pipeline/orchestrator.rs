//! Session engine: runs one session's pipeline from audio source to sink.
//!
//! Wiring: audio poll thread → chunk buffer station → dispatch worker pool →
//! reorder → reconciler station → session station. Each session owns its
//! pipeline exclusively; nothing here is shared across sessions.

use crate::audio::activity::ActivityDetector;
use crate::audio::source::AudioSource;
use crate::backend::TranscriptionBackend;
use crate::config::Config;
use crate::defaults;
use crate::error::Result;
use crate::pipeline::chunk_buffer::{ChunkBuffer, ChunkBufferConfig, ChunkBufferStation};
use crate::pipeline::dispatch::{DispatchConfig, Dispatcher};
use crate::pipeline::error::{ErrorReporter, LogReporter, StationError};
use crate::pipeline::overlap::OverlapDetector;
use crate::pipeline::reconciler::{ReconcilerConfig, SpeakerReconciler};
use crate::pipeline::sink::SegmentSink;
use crate::pipeline::station::{Station, StationRunner};
use crate::pipeline::types::{AudioFrame, ChunkResult, LabeledChunk};
use crate::session::{Session, SessionSnapshot};
use crossbeam_channel::{SendTimeoutError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Configuration for one session's pipeline.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Chunk sealing policy.
    pub chunking: ChunkBufferConfig,
    /// Backend dispatch bounds.
    pub dispatch: DispatchConfig,
    /// Speaker reconciliation policy.
    pub reconciler: ReconcilerConfig,
    /// Audio frame channel capacity.
    pub audio_buffer: usize,
    /// Sealed-chunk queue bound; when full the producer pauses.
    pub chunk_queue: usize,
    /// Result/labeled channel capacity.
    pub result_buffer: usize,
    /// Audio source poll interval.
    pub poll_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunking: ChunkBufferConfig::default(),
            dispatch: DispatchConfig::default(),
            reconciler: ReconcilerConfig::default(),
            audio_buffer: defaults::AUDIO_BUFFER,
            chunk_queue: defaults::CHUNK_QUEUE_BOUND,
            result_buffer: defaults::RESULT_BUFFER,
            poll_interval: Duration::from_millis(16),
        }
    }
}

impl EngineConfig {
    /// Maps the file/env configuration onto engine settings.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunking: ChunkBufferConfig {
                chunk_secs: config.chunking.chunk_secs,
                max_chunk_secs: config.chunking.max_chunk_secs,
                sample_rate: config.audio.sample_rate,
            },
            dispatch: DispatchConfig {
                max_in_flight: config.dispatch.max_in_flight,
                max_retries: config.dispatch.max_retries,
                retry_backoff: Duration::from_millis(config.dispatch.retry_backoff_ms),
            },
            reconciler: ReconcilerConfig {
                max_skipped_chunks: config.session.max_skipped_chunks,
            },
            chunk_queue: config.dispatch.chunk_queue,
            ..Default::default()
        }
    }
}

/// Station that turns ordered chunk results into labeled, overlap-flagged
/// segments. Runs single-threaded: reconciliation depends on strictly
/// sequential chunk processing.
struct ReconcilerStation {
    reconciler: SpeakerReconciler,
    overlap: OverlapDetector,
    /// Output channel for flushing the held trailing segment on shutdown.
    flush_tx: Option<crossbeam_channel::Sender<LabeledChunk>>,
}

impl ReconcilerStation {
    fn new(reconciler: SpeakerReconciler) -> Self {
        Self {
            reconciler,
            overlap: OverlapDetector::new(),
            flush_tx: None,
        }
    }

    fn with_flush_tx(mut self, tx: crossbeam_channel::Sender<LabeledChunk>) -> Self {
        self.flush_tx = Some(tx);
        self
    }
}

impl Station for ReconcilerStation {
    type Input = ChunkResult;
    type Output = LabeledChunk;

    fn name(&self) -> &'static str {
        "reconciler"
    }

    fn process(
        &mut self,
        result: ChunkResult,
    ) -> std::result::Result<Option<LabeledChunk>, StationError> {
        let labeled = self.reconciler.reconcile(&result);
        let emitted = self.overlap.process(labeled);
        Ok(Some(LabeledChunk {
            index: result.index,
            segments: emitted,
            failure: result.failure,
        }))
    }

    fn shutdown(&mut self) {
        if let Some(tail) = self.overlap.flush()
            && let Some(tx) = self.flush_tx.take()
        {
            let chunk = LabeledChunk {
                index: tail.chunk_index,
                segments: vec![tail],
                failure: None,
            };
            if tx.send(chunk).is_err() {
                eprintln!("livecap: reconciler shutdown — output receiver already dropped");
            }
        }
    }
}

/// Terminal station: appends labeled segments to the session, surfaces
/// per-chunk failures, and feeds the consumer sink.
struct SessionStation {
    session: Session,
    sink: Box<dyn SegmentSink>,
}

impl SessionStation {
    fn new(session: Session, sink: Box<dyn SegmentSink>) -> Self {
        Self { session, sink }
    }
}

impl Station for SessionStation {
    type Input = LabeledChunk;
    type Output = ();

    fn name(&self) -> &'static str {
        "session"
    }

    fn process(&mut self, chunk: LabeledChunk) -> std::result::Result<Option<()>, StationError> {
        if let Some(failure) = chunk.failure {
            if failure.fatal {
                self.session.record_fatal(&failure.message);
            } else {
                self.session.record_degraded(&failure.message);
            }
        }

        if !chunk.segments.is_empty() && self.session.append_segments(&chunk.segments) {
            for segment in &chunk.segments {
                if let Err(e) = self.sink.on_segment(segment) {
                    return Err(StationError::Recoverable(format!(
                        "{} sink failed: {}",
                        self.sink.name(),
                        e
                    )));
                }
            }
        }

        Ok(None)
    }

    fn shutdown(&mut self) {
        // End-of-stream with everything reconciled; no-op if already failed
        self.session.complete();
        if let Err(e) = self.sink.on_complete(&self.session.snapshot()) {
            eprintln!("livecap: {} sink failed on completion: {}", self.sink.name(), e);
        }
    }
}

/// Handle to one running session pipeline.
pub struct EngineHandle {
    /// Flag to signal the producer side to stop.
    running: Arc<AtomicBool>,
    /// Join handles for spawned threads.
    threads: Vec<JoinHandle<()>>,
    session: Session,
}

impl EngineHandle {
    /// The session this engine drives.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns true until stop or cancel was requested.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Requests cancellation without blocking: the session fails with the
    /// given reason, no further samples are accepted, and in-flight
    /// dispatches finish or abandon their retries.
    pub fn request_cancel(&self, reason: &str) {
        self.session.cancel(reason);
        self.running.store(false, Ordering::SeqCst);
    }

    /// Blocks until the stream drains and the pipeline shuts down, then
    /// returns the final snapshot. Only sensible for finite sources.
    pub fn wait(mut self) -> SessionSnapshot {
        for handle in self.threads.drain(..) {
            join_logging_panic(handle);
        }
        self.session.snapshot()
    }

    /// Stops accepting samples, lets the pipeline drain, and returns the
    /// final snapshot. Waits up to 5s; threads still running after the
    /// deadline are detached and die with the process.
    pub fn stop(mut self) -> SessionSnapshot {
        self.running.store(false, Ordering::SeqCst);

        let deadline = Instant::now() + Duration::from_secs(5);
        let poll_interval = Duration::from_millis(50);

        loop {
            let mut remaining = Vec::new();
            for handle in self.threads.drain(..) {
                if handle.is_finished() {
                    join_logging_panic(handle);
                } else {
                    remaining.push(handle);
                }
            }
            self.threads = remaining;

            if self.threads.is_empty() {
                break;
            }

            if Instant::now() >= deadline {
                eprintln!(
                    "livecap: shutdown timeout — {} thread(s) still running, detaching",
                    self.threads.len()
                );
                break;
            }

            thread::sleep(poll_interval);
        }

        self.session.snapshot()
    }

    /// Cancels and shuts down: the session ends `failed` with the reason.
    pub fn cancel(self, reason: &str) -> SessionSnapshot {
        self.request_cancel(reason);
        self.stop()
    }
}

fn join_logging_panic(handle: JoinHandle<()>) {
    if let Err(panic_info) = handle.join() {
        let msg = panic_info
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
            .unwrap_or("unknown panic");
        eprintln!("livecap: pipeline thread panicked: {msg}");
    }
}

/// Builds and starts session pipelines.
pub struct SessionEngine {
    config: EngineConfig,
    error_reporter: Arc<dyn ErrorReporter>,
}

impl SessionEngine {
    /// Creates an engine with the default error reporter.
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            error_reporter: Arc::new(LogReporter),
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.error_reporter = reporter;
        self
    }

    /// Starts the pipeline for one session.
    ///
    /// # Arguments
    /// * `source` - Audio input (file, socket, mock)
    /// * `backend` - Diarizing transcription service
    /// * `session` - Session state this pipeline feeds
    /// * `sink` - Consumer of the ordered segment stream
    /// * `detector` - Voice activity gate; None selects fixed-duration chunking
    pub fn start(
        self,
        mut source: Box<dyn AudioSource>,
        backend: Arc<dyn TranscriptionBackend>,
        session: Session,
        sink: Box<dyn SegmentSink>,
        detector: Option<Box<dyn ActivityDetector>>,
    ) -> Result<EngineHandle> {
        let running = Arc::new(AtomicBool::new(true));
        let sample_rate = source.sample_rate();

        // Channels between stages; the chunk queue bound is the backpressure
        // point that pauses the producer when dispatch falls behind.
        let (audio_tx, audio_rx) = bounded::<AudioFrame>(self.config.audio_buffer);
        let (chunk_tx, chunk_rx) = bounded(self.config.chunk_queue);
        let (result_tx, result_rx) = bounded::<ChunkResult>(self.config.result_buffer);
        let (labeled_tx, labeled_rx) = bounded::<LabeledChunk>(self.config.result_buffer);
        let (done_tx, done_rx) = bounded::<()>(1);
        // The terminal station never emits; nothing drains this side.
        drop(done_rx);

        let mut chunk_config = self.config.chunking;
        chunk_config.sample_rate = sample_rate;
        let mut chunk_buffer = ChunkBuffer::new(chunk_config);
        if let Some(detector) = detector {
            chunk_buffer = chunk_buffer.with_detector(detector);
        }
        let chunk_station = ChunkBufferStation::new(chunk_buffer).with_flush_tx(chunk_tx.clone());

        let hook_session = session.clone();
        let dispatcher = Dispatcher::new(self.config.dispatch, backend)
            .with_error_reporter(self.error_reporter.clone())
            .with_run_flag(running.clone())
            .with_dispatch_hook(Arc::new(move |_| hook_session.mark_processing()));

        let reconciler_station =
            ReconcilerStation::new(SpeakerReconciler::new(self.config.reconciler))
                .with_flush_tx(labeled_tx.clone());

        let session_station = SessionStation::new(session.clone(), sink);

        // Start audio capture
        source.start()?;
        let source_is_finite = source.is_finite();

        // Spawn audio polling thread
        let audio_running = running.clone();
        let poll_interval = self.config.poll_interval;
        let audio_handle = thread::spawn(move || {
            let mut consecutive_errors: u32 = 0;
            const MAX_CONSECUTIVE_ERRORS: u32 = 10;
            let mut stream_secs: f64 = 0.0;

            'poll: while audio_running.load(Ordering::SeqCst) {
                let samples = match source.read_block() {
                    Ok(s) => {
                        consecutive_errors = 0;
                        s
                    }
                    Err(e) => {
                        consecutive_errors += 1;
                        if consecutive_errors >= MAX_CONSECUTIVE_ERRORS {
                            eprintln!(
                                "livecap: audio source failed {consecutive_errors} times in a row: {e}"
                            );
                            break;
                        }
                        thread::sleep(poll_interval);
                        continue;
                    }
                };

                if samples.is_empty() {
                    if source_is_finite {
                        // File/pipe source exhausted — end of stream.
                        break;
                    }
                    // Live source: empty read is normal, keep polling.
                    thread::sleep(poll_interval);
                    continue;
                }

                let frame = AudioFrame::new(samples, stream_secs, sample_rate);
                stream_secs = frame.end_secs();

                // Blocking send: a full chunk queue propagates back here and
                // pauses the producer instead of dropping audio.
                let mut pending = frame;
                loop {
                    match audio_tx.send_timeout(pending, Duration::from_millis(100)) {
                        Ok(()) => break,
                        Err(SendTimeoutError::Timeout(frame)) => {
                            if !audio_running.load(Ordering::SeqCst) {
                                break 'poll;
                            }
                            pending = frame;
                        }
                        Err(SendTimeoutError::Disconnected(_)) => break 'poll,
                    }
                }

                thread::sleep(poll_interval);
            }

            if let Err(e) = source.stop() {
                eprintln!("livecap: failed to stop audio source: {e}");
            }
        });

        // Spawn the stations and the dispatch pool
        let chunk_runner = StationRunner::spawn(
            chunk_station,
            audio_rx,
            chunk_tx,
            self.error_reporter.clone(),
        );
        let dispatch_threads = dispatcher.spawn(chunk_rx, result_tx);
        let reconciler_runner = StationRunner::spawn(
            reconciler_station,
            result_rx,
            labeled_tx,
            self.error_reporter.clone(),
        );
        let session_runner = StationRunner::spawn(
            session_station,
            labeled_rx,
            done_tx,
            self.error_reporter.clone(),
        );

        let mut threads = vec![audio_handle];
        threads.extend(dispatch_threads);
        threads.push(thread::spawn(move || {
            if let Err(msg) = chunk_runner.join() {
                eprintln!("livecap: {msg}");
            }
        }));
        threads.push(thread::spawn(move || {
            if let Err(msg) = reconciler_runner.join() {
                eprintln!("livecap: {msg}");
            }
        }));
        threads.push(thread::spawn(move || {
            if let Err(msg) = session_runner.join() {
                eprintln!("livecap: {msg}");
            }
        }));

        Ok(EngineHandle {
            running,
            threads,
            session,
        })
    }
}
