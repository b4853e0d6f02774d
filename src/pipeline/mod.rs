//! Streaming session pipeline.
//!
//! Implements a multi-station pipeline where each station runs in its own
//! thread, connected by bounded crossbeam channels for backpressure:
//! audio source → chunk buffer → dispatch workers → reorder → reconciler →
//! session sink.

pub mod chunk_buffer;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod overlap;
pub mod reconciler;
pub mod sink;
pub mod station;
pub mod types;

pub use chunk_buffer::{ChunkBuffer, ChunkBufferConfig, ChunkBufferStation};
pub use dispatch::{DispatchConfig, Dispatcher};
pub use error::{ErrorReporter, LogReporter, StationError};
pub use orchestrator::{EngineConfig, EngineHandle, SessionEngine};
pub use overlap::OverlapDetector;
pub use reconciler::{ReconcilerConfig, SpeakerReconciler};
pub use sink::{CollectorSink, MultiSink, SegmentSink};
pub use station::{Station, StationRunner};
pub use types::{AudioFrame, AudioChunk, ChunkFailure, ChunkResult, LabeledChunk, TranscriptSegment};
