//! Session lifecycle and registry.

pub mod registry;
pub mod session;

pub use registry::{SessionRegistry, SessionStatus};
pub use session::{Session, SessionConfig, SessionFailure, SessionSnapshot, SessionState, SpeakerStats};
