//! Processing context passed to DSP units.

/// Runtime information a unit needs while processing one block.
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// The audio sample rate in Hz (e.g. 44100, 48000).
    pub sample_rate: f32,
    /// The number of samples in the current processing block.
    pub block_size: usize,
}

impl ProcessContext {
    /// Creates a new process context.
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            sample_rate,
            block_size,
        }
    }

    /// Returns the duration of the current block in seconds.
    pub fn block_duration(&self) -> f32 {
        self.block_size as f32 / self.sample_rate
    }

    /// Converts a duration in seconds to samples.
    pub fn seconds_to_samples(&self, seconds: f32) -> usize {
        (seconds * self.sample_rate).round() as usize
    }

    /// Returns the Nyquist frequency (half the sample rate).
    pub fn nyquist(&self) -> f32 {
        self.sample_rate / 2.0
    }
}

impl Default for ProcessContext {
    fn default() -> Self {
        Self::new(44100.0, 256)
    }
}
