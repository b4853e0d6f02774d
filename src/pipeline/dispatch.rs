//! Dispatch pipeline: bounded-concurrency backend calls with ordered release.
//!
//! A pool of K worker threads pulls sealed chunks from a shared bounded
//! queue and calls the backend. Completed results pass through a reorder
//! stage that releases them strictly in ascending chunk-index order, so the
//! reconciler never observes network completion order.

use crate::backend::TranscriptionBackend;
use crate::defaults;
use crate::pipeline::error::{ErrorReporter, LogReporter, StationError};
use crate::pipeline::types::{AudioChunk, ChunkFailure, ChunkResult};
use crossbeam_channel::{Receiver, Sender, bounded};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Configuration for the dispatch pipeline.
#[derive(Debug, Clone, Copy)]
pub struct DispatchConfig {
    /// Maximum simultaneous backend requests (worker pool size).
    pub max_in_flight: usize,
    /// Retries after the first failed attempt of a chunk.
    pub max_retries: u32,
    /// Base backoff between retries; the n-th retry waits n times this.
    pub retry_backoff: Duration,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_in_flight: defaults::MAX_IN_FLIGHT,
            max_retries: defaults::MAX_RETRIES,
            retry_backoff: Duration::from_millis(defaults::RETRY_BACKOFF_MS),
        }
    }
}

/// Dispatches chunks to the backend and emits results in chunk-index order.
pub struct Dispatcher {
    config: DispatchConfig,
    backend: Arc<dyn TranscriptionBackend>,
    reporter: Arc<dyn ErrorReporter>,
    running: Arc<AtomicBool>,
    /// Invoked with the chunk index as a worker picks the chunk up.
    dispatch_hook: Option<Arc<dyn Fn(u64) + Send + Sync>>,
}

impl Dispatcher {
    /// Creates a dispatcher with the default error reporter.
    pub fn new(config: DispatchConfig, backend: Arc<dyn TranscriptionBackend>) -> Self {
        Self {
            config,
            backend,
            reporter: Arc::new(LogReporter),
            running: Arc::new(AtomicBool::new(true)),
            dispatch_hook: None,
        }
    }

    /// Sets a custom error reporter.
    pub fn with_error_reporter(mut self, reporter: Arc<dyn ErrorReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Shares a run flag; when cleared, pending retries are abandoned so
    /// cancellation doesn't wait out backoff sleeps.
    pub fn with_run_flag(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Hook called when a worker starts on a chunk (session state transitions).
    pub fn with_dispatch_hook(mut self, hook: Arc<dyn Fn(u64) + Send + Sync>) -> Self {
        self.dispatch_hook = Some(hook);
        self
    }

    /// Spawns the worker pool and the reorder stage.
    ///
    /// Workers exit when `chunk_rx` disconnects and drains; the reorder stage
    /// exits after the last worker, closing `out_tx`.
    pub fn spawn(
        self,
        chunk_rx: Receiver<AudioChunk>,
        out_tx: Sender<ChunkResult>,
    ) -> Vec<JoinHandle<()>> {
        let worker_count = self.config.max_in_flight.max(1);
        let (done_tx, done_rx) = bounded::<ChunkResult>(worker_count * 2);

        let shared = Arc::new(self);
        let mut threads = Vec::with_capacity(worker_count + 1);

        for _ in 0..worker_count {
            let dispatcher = shared.clone();
            let chunk_rx = chunk_rx.clone();
            let done_tx = done_tx.clone();
            threads.push(thread::spawn(move || {
                while let Ok(chunk) = chunk_rx.recv() {
                    if let Some(ref hook) = dispatcher.dispatch_hook {
                        hook(chunk.index);
                    }
                    let result = dispatcher.process_chunk(chunk);
                    if done_tx.send(result).is_err() {
                        break;
                    }
                }
            }));
        }
        // Workers hold the only senders; the reorder stage must observe
        // disconnect once they all exit.
        drop(done_tx);

        let reporter = shared.reporter.clone();
        threads.push(thread::spawn(move || {
            Self::run_reorder(done_rx, out_tx, reporter);
        }));

        threads
    }

    /// Releases completed results in ascending chunk-index order.
    fn run_reorder(
        done_rx: Receiver<ChunkResult>,
        out_tx: Sender<ChunkResult>,
        reporter: Arc<dyn ErrorReporter>,
    ) {
        let mut pending: BTreeMap<u64, ChunkResult> = BTreeMap::new();
        let mut next_index: u64 = 0;

        while let Ok(result) = done_rx.recv() {
            pending.insert(result.index, result);
            while let Some(ready) = pending.remove(&next_index) {
                if out_tx.send(ready).is_err() {
                    return;
                }
                next_index += 1;
            }
        }

        // Chunk indices are gapless, so a clean shutdown leaves nothing here.
        if !pending.is_empty() {
            reporter.report(
                "dispatch",
                &StationError::Recoverable(format!(
                    "{} out-of-order result(s) discarded at shutdown",
                    pending.len()
                )),
            );
        }
    }

    /// One chunk, with retry/backoff and failure classification.
    fn process_chunk(&self, chunk: AudioChunk) -> ChunkResult {
        // Silence-only windows are elided: no backend call, empty result.
        if chunk.is_empty() {
            return ChunkResult::empty(&chunk);
        }

        let meta = chunk.meta();
        let mut attempt: u32 = 0;

        loop {
            match self.backend.transcribe(&chunk.samples, &meta) {
                Ok(segments) => {
                    return ChunkResult {
                        index: chunk.index,
                        start_secs: chunk.start_secs,
                        end_secs: chunk.end_secs,
                        segments,
                        failure: None,
                    };
                }
                Err(e) if e.is_fatal() => {
                    self.reporter.report(
                        "dispatch",
                        &StationError::Fatal(format!("chunk {}: {}", chunk.index, e)),
                    );
                    return self.failed_result(&chunk, e.to_string(), true);
                }
                Err(e)
                    if e.is_retryable()
                        && attempt < self.config.max_retries
                        && self.running.load(Ordering::SeqCst) =>
                {
                    attempt += 1;
                    self.reporter.report(
                        "dispatch",
                        &StationError::Recoverable(format!(
                            "chunk {} attempt {}: {}; retrying",
                            chunk.index, attempt, e
                        )),
                    );
                    thread::sleep(self.config.retry_backoff * attempt);
                }
                Err(e) => {
                    self.reporter.report(
                        "dispatch",
                        &StationError::Recoverable(format!(
                            "chunk {} degraded after {} attempt(s): {}",
                            chunk.index,
                            attempt + 1,
                            e
                        )),
                    );
                    return self.failed_result(&chunk, e.to_string(), false);
                }
            }
        }
    }

    fn failed_result(&self, chunk: &AudioChunk, message: String, fatal: bool) -> ChunkResult {
        ChunkResult {
            index: chunk.index,
            start_secs: chunk.start_secs,
            end_secs: chunk.end_secs,
            segments: Vec::new(),
            failure: Some(ChunkFailure { message, fatal }),
        }
    }
}
