//! HTTP adapter for a diarizing speech-to-text service.
//!
//! Uploads each chunk as a WAV file to the service's speech-to-text endpoint
//! with diarization enabled, then groups the returned word stream into
//! per-speaker segments. Runs on the blocking client: each dispatch worker
//! thread owns its call for the duration of the request.

use crate::backend::transcriber::{ChunkMeta, RawSegment, TranscriptionBackend, WordTiming};
use crate::config::BackendSettings;
use crate::error::{LivecapError, Result};
use reqwest::StatusCode;
use reqwest::blocking::multipart;
use serde::Deserialize;
use std::io::Cursor;
use std::time::Duration;

/// Word-level entry in the service response.
#[derive(Debug, Deserialize)]
struct WordEntry {
    #[serde(default)]
    text: String,
    #[serde(default)]
    start: f64,
    #[serde(default)]
    end: f64,
    #[serde(default)]
    speaker_id: Option<String>,
}

/// Service response: word stream with speaker ids, or plain text fallback.
#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    words: Vec<WordEntry>,
    #[serde(default)]
    text: Option<String>,
}

/// Diarizing transcription backend over HTTP.
pub struct HttpBackend {
    client: reqwest::blocking::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    num_speakers: u32,
}

impl HttpBackend {
    /// Creates a backend from settings. Fails if no API key is configured.
    pub fn new(settings: &BackendSettings) -> Result<Self> {
        let api_key = settings
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| LivecapError::ConfigInvalidValue {
                key: "backend.api_key".to_string(),
                message: "not set (use LIVECAP_API_KEY or the config file)".to_string(),
            })?;

        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| LivecapError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model_id: settings.model_id.clone(),
            num_speakers: settings.num_speakers,
        })
    }

    /// Encode raw PCM samples as an in-memory WAV file.
    fn encode_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(|e| {
                LivecapError::Other(format!("Failed to create WAV encoder: {}", e))
            })?;
            for &sample in samples {
                writer
                    .write_sample(sample)
                    .map_err(|e| LivecapError::Other(format!("WAV encode failed: {}", e)))?;
            }
            writer
                .finalize()
                .map_err(|e| LivecapError::Other(format!("WAV finalize failed: {}", e)))?;
        }
        Ok(cursor.into_inner())
    }

    fn classify_status(status: StatusCode, body: &str) -> LivecapError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => LivecapError::BackendAuth {
                message: format!("{}: {}", status, body),
            },
            StatusCode::PAYMENT_REQUIRED => LivecapError::BackendQuota {
                message: format!("{}: {}", status, body),
            },
            // Rate limiting and server-side errors are worth retrying
            StatusCode::TOO_MANY_REQUESTS => LivecapError::BackendTransient {
                message: format!("rate limited: {}", body),
            },
            s if s.is_server_error() => LivecapError::BackendTransient {
                message: format!("{}: {}", s, body),
            },
            s => LivecapError::BackendMalformed {
                message: format!("unexpected status {}: {}", s, body),
            },
        }
    }
}

impl TranscriptionBackend for HttpBackend {
    fn transcribe(&self, samples: &[i16], meta: &ChunkMeta) -> Result<Vec<RawSegment>> {
        let wav_bytes = Self::encode_wav(samples, meta.sample_rate)?;

        let part = multipart::Part::bytes(wav_bytes)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .map_err(|e| LivecapError::Other(format!("multipart build failed: {}", e)))?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("model_id", self.model_id.clone())
            .text("diarize", "true")
            .text("num_speakers", self.num_speakers.to_string())
            .text("timestamps_granularity", "word");

        let response = self
            .client
            .post(format!("{}/v1/speech-to-text", self.base_url))
            .header("xi-api-key", &self.api_key)
            .multipart(form)
            .send()
            .map_err(|e| LivecapError::BackendTransient {
                message: format!("request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }

        let parsed: TranscriptionResponse =
            response.json().map_err(|e| LivecapError::BackendMalformed {
                message: format!("invalid JSON: {}", e),
            })?;

        Ok(group_words_into_segments(parsed, meta))
    }

    fn name(&self) -> &str {
        "elevenlabs-scribe"
    }
}

/// Group the word stream into contiguous per-speaker segments.
///
/// Consecutive words with the same speaker id merge into one RawSegment;
/// a speaker change closes the current segment and opens the next.
fn group_words_into_segments(response: TranscriptionResponse, meta: &ChunkMeta) -> Vec<RawSegment> {
    let mut segments: Vec<RawSegment> = Vec::new();

    for word in &response.words {
        let text = word.text.trim();
        if text.is_empty() {
            continue;
        }
        let token = word.speaker_id.as_deref().unwrap_or("speaker_0");

        match segments.last_mut() {
            Some(current) if current.speaker_token == token => {
                current.text.push(' ');
                current.text.push_str(text);
                current.end = word.end;
                current.words.push(WordTiming {
                    text: text.to_string(),
                    start: word.start,
                    end: word.end,
                });
            }
            _ => {
                segments.push(RawSegment {
                    speaker_token: token.to_string(),
                    text: text.to_string(),
                    start: word.start,
                    end: word.end,
                    words: vec![WordTiming {
                        text: text.to_string(),
                        start: word.start,
                        end: word.end,
                    }],
                });
            }
        }
    }

    // Fallback: no word-level data, just full text under one token
    if segments.is_empty()
        && let Some(text) = response.text
        && !text.trim().is_empty()
    {
        segments.push(RawSegment::new(
            "speaker_0",
            text.trim(),
            0.0,
            meta.end_secs - meta.start_secs,
        ));
    }

    segments
}
