//! Audio input: source trait, WAV file source, and voice activity gating.

pub mod activity;
pub mod source;
pub mod wav;

pub use activity::{ActivityDetector, RmsActivityDetector, calculate_rms};
pub use source::{AudioSource, BlockPhase, MockAudioSource};
pub use wav::WavAudioSource;
