//! One-pole parameter smoothing.
//!
//! Parameter changes arrive at block rate from the interactive thread;
//! applying them as steps produces zipper noise. Units wrap per-sample
//! parameters in a `SmoothedValue` that ramps toward the target instead.

/// A value that exponentially approaches a target.
///
/// The time constant defines how long the value takes to cover ~63% of the
/// distance to the target.
#[derive(Clone, Debug)]
pub struct SmoothedValue {
    current: f32,
    target: f32,
    /// One-pole coefficient, 0 = instant, closer to 1 = slower.
    coeff: f32,
    time_constant_ms: f32,
    sample_rate: f32,
}

impl SmoothedValue {
    /// Default time constant: 10 ms balances responsiveness and smoothness.
    pub const DEFAULT_TIME_CONSTANT_MS: f32 = 10.0;

    /// Creates a smoothed value starting (and targeting) `initial`.
    pub fn new(initial: f32, time_constant_ms: f32, sample_rate: f32) -> Self {
        Self {
            current: initial,
            target: initial,
            coeff: Self::coefficient(time_constant_ms, sample_rate),
            time_constant_ms,
            sample_rate,
        }
    }

    /// Creates a smoothed value with the default 10 ms time constant.
    pub fn with_default_smoothing(initial: f32, sample_rate: f32) -> Self {
        Self::new(initial, Self::DEFAULT_TIME_CONSTANT_MS, sample_rate)
    }

    fn coefficient(time_constant_ms: f32, sample_rate: f32) -> f32 {
        let samples = time_constant_ms * 0.001 * sample_rate;
        if samples < 1.0 {
            return 0.0; // instant
        }
        (-1.0 / samples).exp()
    }

    /// Sets a new target to ramp toward.
    #[inline]
    pub fn set_target(&mut self, value: f32) {
        self.target = value;
    }

    /// The target the value is ramping toward.
    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    /// The current smoothed value, without advancing.
    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }

    /// Advances the ramp by one sample and returns the new value.
    ///
    /// Snaps to the target once within 1e-4 so the ramp terminates instead
    /// of chasing f32 rounding forever.
    #[inline]
    pub fn next(&mut self) -> f32 {
        let diff = self.current - self.target;
        if diff.abs() <= 1e-4 {
            self.current = self.target;
        } else {
            self.current = self.target + self.coeff * diff;
        }
        self.current
    }

    /// Jumps to a value with no ramp. Used at construction and on reset.
    #[inline]
    pub fn set_immediate(&mut self, value: f32) {
        self.current = value;
        self.target = value;
    }

    /// Returns true while the value is still ramping.
    #[inline]
    pub fn is_smoothing(&self) -> bool {
        (self.current - self.target).abs() > 1e-4
    }

    /// Recomputes the coefficient for a new sample rate.
    ///
    /// Call from the unit's `prepare()`.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.coeff = Self::coefficient(self.time_constant_ms, sample_rate);
    }

    /// Recomputes the coefficient for a new time constant.
    pub fn set_time_constant(&mut self, time_constant_ms: f32) {
        self.time_constant_ms = time_constant_ms;
        self.coeff = Self::coefficient(time_constant_ms, self.sample_rate);
    }
}
