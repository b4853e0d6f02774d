use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub chunking: ChunkingConfig,
    pub dispatch: DispatchSettings,
    pub backend: BackendSettings,
    pub session: SessionSettings,
}

/// Audio stream configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub activity_threshold: f32,
}

/// Chunking policy configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Seconds of audio (or of speech, when voice-gated) per sealed chunk.
    pub chunk_secs: f64,
    /// Maximum stream-time window before a voice-gated chunk is sealed anyway.
    pub max_chunk_secs: f64,
    /// Drop silent blocks before accumulation.
    pub voice_gated: bool,
}

/// Backend dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DispatchSettings {
    pub max_in_flight: usize,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub chunk_queue: usize,
}

/// Transcription backend configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BackendSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model_id: String,
    pub num_speakers: u32,
    pub timeout_secs: u64,
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionSettings {
    /// Degraded chunks tolerated before the session fails.
    pub max_degraded_chunks: u32,
    /// Chunks a speaker may skip before being treated as new on return.
    pub max_skipped_chunks: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: defaults::SAMPLE_RATE,
            activity_threshold: defaults::ACTIVITY_THRESHOLD,
        }
    }
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_secs: defaults::CHUNK_SECS,
            max_chunk_secs: defaults::MAX_CHUNK_SECS,
            voice_gated: false,
        }
    }
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            max_in_flight: defaults::MAX_IN_FLIGHT,
            max_retries: defaults::MAX_RETRIES,
            retry_backoff_ms: defaults::RETRY_BACKOFF_MS,
            chunk_queue: defaults::CHUNK_QUEUE_BOUND,
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.elevenlabs.io".to_string(),
            api_key: None,
            model_id: "scribe_v1".to_string(),
            num_speakers: defaults::NUM_SPEAKERS,
            timeout_secs: defaults::BACKEND_TIMEOUT_SECS,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            max_degraded_chunks: defaults::MAX_DEGRADED_CHUNKS,
            max_skipped_chunks: defaults::MAX_SKIPPED_CHUNKS,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file, falling back to defaults if the file
    /// doesn't exist. Invalid TOML is still an error.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Ok(Self::default())
                } else {
                    Err(e)
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - LIVECAP_API_KEY → backend.api_key
    /// - LIVECAP_BASE_URL → backend.base_url
    /// - LIVECAP_MODEL → backend.model_id
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("LIVECAP_API_KEY")
            && !key.is_empty()
        {
            self.backend.api_key = Some(key);
        }

        if let Ok(url) = std::env::var("LIVECAP_BASE_URL")
            && !url.is_empty()
        {
            self.backend.base_url = url;
        }

        if let Ok(model) = std::env::var("LIVECAP_MODEL")
            && !model.is_empty()
        {
            self.backend.model_id = model;
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/livecap/config.toml on Linux
    #[cfg(feature = "cli")]
    pub fn default_path() -> std::path::PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join("livecap")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.audio.sample_rate, 16000);
        assert!((config.chunking.chunk_secs - 5.0).abs() < f64::EPSILON);
        assert!(!config.chunking.voice_gated);
        assert_eq!(config.dispatch.max_in_flight, 2);
        assert_eq!(config.dispatch.max_retries, 3);
        assert_eq!(config.session.max_skipped_chunks, 1);
        assert!(config.backend.api_key.is_none());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[chunking]\nchunk_secs = 3.0\n\n[dispatch]\nmax_in_flight = 4\n"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert!((config.chunking.chunk_secs - 3.0).abs() < f64::EPSILON);
        assert_eq!(config.dispatch.max_in_flight, 4);
        // Unspecified sections keep defaults
        assert_eq!(config.audio.sample_rate, 16000);
        assert_eq!(config.dispatch.max_retries, 3);
    }

    #[test]
    fn test_load_invalid_toml_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "chunking = not valid toml").unwrap();

        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = Config::load_or_default(Path::new("/nonexistent/livecap.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_or_default_invalid_toml_propagates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[[").unwrap();

        assert!(Config::load_or_default(file.path()).is_err());
    }

    #[test]
    fn test_backend_defaults() {
        let config = Config::default();
        assert_eq!(config.backend.model_id, "scribe_v1");
        assert_eq!(config.backend.num_speakers, 5);
        assert_eq!(config.backend.timeout_secs, 60);
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config {
            chunking: ChunkingConfig {
                chunk_secs: 2.5,
                max_chunk_secs: 6.0,
                voice_gated: true,
            },
            ..Default::default()
        };

        let toml_str = toml::to_string(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }
}
