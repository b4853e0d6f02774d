//! livecap - Real-time multi-speaker transcription engine
//!
//! Streams audio into time-bounded chunks, dispatches them to a diarizing
//! backend with bounded concurrency, and reconstructs a stable
//! speaker-labeled transcript live, despite the backend re-running
//! diarization independently on every chunk.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod audio;
pub mod backend;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod error;
pub mod pipeline;
pub mod recording;
pub mod session;

// Core traits (source → process → sink)
pub use audio::activity::{ActivityDetector, RmsActivityDetector};
pub use audio::source::AudioSource;
pub use backend::{RawSegment, TranscriptionBackend};
pub use pipeline::sink::{CollectorSink, MultiSink, SegmentSink};

// Session engine
pub use pipeline::orchestrator::{EngineConfig, EngineHandle, SessionEngine};

// Session surface
pub use session::{Session, SessionRegistry, SessionSnapshot, SessionState, SpeakerStats};

// Error handling
pub use error::{LivecapError, Result};

// Config
pub use config::Config;

// Station framework (for advanced users)
pub use pipeline::error::{ErrorReporter, StationError};
pub use pipeline::station::Station;

/// Build version string with optional git commit hash.
///
/// Returns `"0.3.1+abc1234"` when git hash is available, `"0.3.1"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_contains_plus_when_git_hash_present() {
        let ver = version_string();
        // In a git repo build, GIT_HASH is set → expect "0.3.1+<hash>"
        // In CI without git, expect plain "0.3.1"
        if option_env!("GIT_HASH").is_some_and(|h| !h.is_empty()) {
            assert!(
                ver.contains('+'),
                "With GIT_HASH set, version should contain '+', got: {}",
                ver
            );
        } else {
            assert_eq!(ver, env!("CARGO_PKG_VERSION"));
        }
    }
}
