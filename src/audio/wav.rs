//! WAV file audio source.

use crate::audio::source::AudioSource;
use crate::defaults::SAMPLE_RATE;
use crate::error::{LivecapError, Result};
use std::io::Read;
use std::path::Path;

/// Audio source that reads from WAV file data.
/// Supports arbitrary sample rates and channels, resampling to 16kHz mono.
pub struct WavAudioSource {
    samples: Vec<i16>,
    position: usize,
    block_size: usize,
}

impl WavAudioSource {
    /// Create from any reader (for testing/flexibility).
    pub fn from_reader(reader: Box<dyn Read + Send>) -> Result<Self> {
        let mut wav_reader =
            hound::WavReader::new(reader).map_err(|e| LivecapError::AudioSource {
                message: format!("Failed to parse WAV file: {}", e),
            })?;

        let spec = wav_reader.spec();
        let source_rate = spec.sample_rate;
        let source_channels = spec.channels;

        // Read all samples from the WAV file
        let raw_samples: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| LivecapError::AudioSource {
                message: format!("Failed to read WAV samples: {}", e),
            })?;

        // Convert to mono if stereo
        let mono_samples = if source_channels == 2 {
            raw_samples
                .chunks_exact(2)
                .map(|chunk| {
                    let left = chunk[0] as i32;
                    let right = chunk[1] as i32;
                    ((left + right) / 2) as i16
                })
                .collect()
        } else {
            raw_samples
        };

        // Resample to 16kHz if needed
        let samples = if source_rate != SAMPLE_RATE {
            resample(&mono_samples, source_rate, SAMPLE_RATE)
        } else {
            mono_samples
        };

        // 100ms blocks at 16kHz
        let block_size = 1600;

        Ok(Self {
            samples,
            position: 0,
            block_size,
        })
    }

    /// Create from a file path.
    pub fn from_path(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_reader(Box::new(std::io::Cursor::new(data)))
    }

    /// Total stream duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }

    /// Consume the source and return all samples as a single buffer.
    pub fn into_samples(self) -> Vec<i16> {
        self.samples
    }
}

impl AudioSource for WavAudioSource {
    fn start(&mut self) -> Result<()> {
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    fn read_block(&mut self) -> Result<Vec<i16>> {
        if self.position >= self.samples.len() {
            return Ok(Vec::new());
        }

        let end = std::cmp::min(self.position + self.block_size, self.samples.len());
        let block = self.samples[self.position..end].to_vec();
        self.position = end;

        Ok(block)
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn is_finite(&self) -> bool {
        true
    }
}

/// Simple linear interpolation resampling.
fn resample(samples: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let output_len = (samples.len() as f64 / ratio).ceil() as usize;

    (0..output_len)
        .map(|i| {
            let source_pos = i as f64 * ratio;
            let source_idx = source_pos.floor() as usize;
            let fraction = source_pos - source_idx as f64;

            if source_idx + 1 >= samples.len() {
                samples[source_idx.min(samples.len() - 1)]
            } else {
                let left = samples[source_idx] as f64;
                let right = samples[source_idx + 1] as f64;
                (left + (right - left) * fraction) as i16
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn make_wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for &s in samples {
                writer.write_sample(s).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_reads_16k_mono_unchanged() {
        let samples: Vec<i16> = (0..3200).map(|i| (i % 100) as i16).collect();
        let wav = make_wav(16000, 1, &samples);

        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav))).unwrap();
        assert_eq!(source.into_samples(), samples);
    }

    #[test]
    fn test_stereo_downmixed_to_mono() {
        // Interleaved L/R pairs: (100, 200) → 150
        let wav = make_wav(16000, 2, &[100, 200, 100, 200]);

        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav))).unwrap();
        assert_eq!(source.into_samples(), vec![150, 150]);
    }

    #[test]
    fn test_resamples_to_16k() {
        let samples = vec![1000i16; 32000]; // 1s at 32kHz
        let wav = make_wav(32000, 1, &samples);

        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav))).unwrap();
        let out = source.into_samples();
        // ~1s at 16kHz
        assert!((15900..=16100).contains(&out.len()), "got {} samples", out.len());
    }

    #[test]
    fn test_blocks_then_empty_at_eof() {
        let samples = vec![5i16; 2000];
        let wav = make_wav(16000, 1, &samples);

        let mut source = WavAudioSource::from_reader(Box::new(Cursor::new(wav))).unwrap();
        let first = source.read_block().unwrap();
        assert_eq!(first.len(), 1600);
        let second = source.read_block().unwrap();
        assert_eq!(second.len(), 400);
        assert!(source.read_block().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_data_is_error() {
        let result = WavAudioSource::from_reader(Box::new(Cursor::new(vec![0u8; 16])));
        assert!(result.is_err());
    }

    #[test]
    fn test_duration_secs() {
        let samples = vec![0i16; 8000]; // 0.5s at 16kHz
        let wav = make_wav(16000, 1, &samples);
        let source = WavAudioSource::from_reader(Box::new(Cursor::new(wav))).unwrap();
        assert!((source.duration_secs() - 0.5).abs() < 1e-6);
    }
}
