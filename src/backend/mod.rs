//! Transcription backend boundary.
//!
//! The engine treats the diarizing backend as an opaque dependency: samples
//! in, speaker-tokenized segments or a classified error out. The wire format
//! lives entirely behind [`TranscriptionBackend`].

pub mod transcriber;

#[cfg(feature = "http-backend")]
pub mod http;

pub use transcriber::{ChunkMeta, MockBackend, RawSegment, TranscriptionBackend, WordTiming};

#[cfg(feature = "http-backend")]
pub use http::HttpBackend;
