use crate::defaults;
use crate::error::{LivecapError, Result};

/// Trait for audio source devices.
///
/// This trait allows swapping implementations (live capture, WAV file, mock).
/// Sources deliver 16-bit PCM sample blocks; a finite source signals
/// end-of-stream by returning an empty block.
pub trait AudioSource: Send {
    /// Start producing audio.
    fn start(&mut self) -> Result<()>;

    /// Stop producing audio.
    fn stop(&mut self) -> Result<()>;

    /// Read the next block of samples.
    ///
    /// An empty block from a finite source means end-of-stream; from a live
    /// source it means "nothing yet, poll again".
    fn read_block(&mut self) -> Result<Vec<i16>>;

    /// Sample rate of the delivered PCM, in Hz.
    fn sample_rate(&self) -> u32;

    /// Whether this source ends on its own (file, pipe) rather than running
    /// until stopped (microphone, socket).
    fn is_finite(&self) -> bool {
        false
    }
}

/// One phase of a scripted mock source: `count` reads each returning `samples`.
#[derive(Debug, Clone)]
pub struct BlockPhase {
    pub samples: Vec<i16>,
    pub count: u32,
}

/// Mock audio source for testing
#[derive(Debug, Clone)]
pub struct MockAudioSource {
    phases: Vec<BlockPhase>,
    phase_idx: usize,
    reads_in_phase: u32,
    sample_rate: u32,
    finite: bool,
    is_started: bool,
    should_fail_start: bool,
    should_fail_read: bool,
    error_message: String,
}

impl MockAudioSource {
    /// Create a new mock audio source with no scripted blocks.
    pub fn new() -> Self {
        Self {
            phases: Vec::new(),
            phase_idx: 0,
            reads_in_phase: 0,
            sample_rate: defaults::SAMPLE_RATE,
            finite: true,
            is_started: false,
            should_fail_start: false,
            should_fail_read: false,
            error_message: "mock audio error".to_string(),
        }
    }

    /// Script the sequence of blocks this source returns.
    pub fn with_block_sequence(mut self, phases: Vec<BlockPhase>) -> Self {
        self.phases = phases;
        self
    }

    /// Convenience: a single phase of `count` identical blocks.
    pub fn with_blocks(self, samples: Vec<i16>, count: u32) -> Self {
        self.with_block_sequence(vec![BlockPhase { samples, count }])
    }

    /// Override the reported sample rate.
    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = rate;
        self
    }

    /// Mark the source as live: empty reads mean "poll again", not EOF.
    pub fn as_live_source(mut self) -> Self {
        self.finite = false;
        self
    }

    /// Configure the mock to fail on start
    pub fn with_start_failure(mut self) -> Self {
        self.should_fail_start = true;
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    /// Check if the audio source is started
    pub fn is_started(&self) -> bool {
        self.is_started
    }
}

impl Default for MockAudioSource {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioSource for MockAudioSource {
    fn start(&mut self) -> Result<()> {
        if self.should_fail_start {
            Err(LivecapError::AudioSource {
                message: self.error_message.clone(),
            })
        } else {
            self.is_started = true;
            Ok(())
        }
    }

    fn stop(&mut self) -> Result<()> {
        self.is_started = false;
        Ok(())
    }

    fn read_block(&mut self) -> Result<Vec<i16>> {
        if self.should_fail_read {
            return Err(LivecapError::AudioSource {
                message: self.error_message.clone(),
            });
        }

        while let Some(phase) = self.phases.get(self.phase_idx) {
            if self.reads_in_phase < phase.count {
                self.reads_in_phase += 1;
                return Ok(phase.samples.clone());
            }
            self.phase_idx += 1;
            self.reads_in_phase = 0;
        }

        // Exhausted: empty block signals end-of-stream for finite sources
        Ok(Vec::new())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn is_finite(&self) -> bool {
        self.finite
    }
}
