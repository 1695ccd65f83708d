//! Stereo output stage with level metering.
//!
//! The terminal module of a patch: applies master volume, soft-limits
//! with tanh so hot patches cannot slam the hardware buffer, and exposes
//! its frames to the render loop for mixing. Alongside the audio path it
//! tracks per-channel RMS, a 2x-oversampled peak estimate, and a latched
//! clip indicator with a re-arm dwell.

use crate::dsp::{
    DspUnit, MeterReading, ParameterDefinition, PortDefinition, ProcessContext, SignalBuffer,
    SignalKind, SmoothedValue, UnitInfo,
};

/// Level at which the clip indicator latches.
const CLIP_THRESHOLD: f32 = 1.0;

/// How long a latched clip flag stays lit after the last overshoot.
const CLIP_DWELL_SECONDS: f32 = 0.75;

/// One-pole weight pulling the displayed RMS toward the latest block.
const RMS_DISPLAY_SMOOTHING: f32 = 0.2;

/// Linear fall rate of the displayed peak hold, in full-scale units per
/// second.
const PEAK_DECAY_PER_SECOND: f32 = 1.5;

/// Per-channel metering state.
#[derive(Clone, Copy, Default)]
struct ChannelMeter {
    displayed_rms: f32,
    held_peak: f32,
    clip_remaining: u32,
}

/// The stereo output and meter module.
///
/// # Ports
///
/// - **Left** / **Right** (Audio, Input): the stereo mix.
///
/// # Parameters
///
/// - **Volume** (0-1.5): master gain before the limiter.
pub struct OutputMeter {
    sample_rate: f32,
    left: Vec<f32>,
    right: Vec<f32>,
    meters: [ChannelMeter; 2],
    /// Last input sample per channel, for the inter-sample peak proxy.
    last_sample: [f32; 2],
    /// Shared per-sample volume ramp, filled once per block.
    volume_ramp: Vec<f32>,
    clip_dwell_samples: u32,
    ports: Vec<PortDefinition>,
    parameters: Vec<ParameterDefinition>,
    volume_smooth: SmoothedValue,
}

impl OutputMeter {
    pub fn new() -> Self {
        let sample_rate = 44100.0;
        Self {
            sample_rate,
            left: Vec::new(),
            right: Vec::new(),
            meters: [ChannelMeter::default(); 2],
            last_sample: [0.0; 2],
            volume_ramp: Vec::new(),
            clip_dwell_samples: (CLIP_DWELL_SECONDS * sample_rate) as u32,
            ports: vec![
                PortDefinition::input("left", "Left", SignalKind::Audio),
                PortDefinition::input("right", "Right", SignalKind::Audio),
            ],
            parameters: vec![ParameterDefinition::new(
                "volume",
                "Volume",
                0.0,
                1.5,
                0.8,
                "",
                crate::dsp::UpdateRate::PerSample,
            )],
            volume_smooth: SmoothedValue::with_default_smoothing(0.8, sample_rate),
        }
    }

    const PORT_LEFT: usize = 0;
    const PORT_RIGHT: usize = 1;

    const PARAM_VOLUME: usize = 0;

    /// Meters one channel of post-volume, pre-limiter samples and writes
    /// the limited result into `frames`.
    fn run_channel(
        meter: &mut ChannelMeter,
        last_sample: &mut f32,
        input: &[f32],
        frames: &mut [f32],
        volume: &[f32],
        block_size: usize,
        clip_dwell_samples: u32,
        peak_decay: f32,
    ) {
        let mut sum_squares = 0.0;
        let mut block_peak = 0.0_f32;
        for i in 0..block_size {
            let s = input[i] * volume[i];
            sum_squares += s * s;

            // Average of consecutive samples as a cheap 2x-oversampled
            // inter-sample peak proxy.
            let midpoint = 0.5 * (s + *last_sample);
            block_peak = block_peak.max(s.abs()).max(midpoint.abs());
            *last_sample = s;

            if s.abs() >= CLIP_THRESHOLD || midpoint.abs() >= CLIP_THRESHOLD {
                meter.clip_remaining = clip_dwell_samples;
            } else {
                meter.clip_remaining = meter.clip_remaining.saturating_sub(1);
            }

            frames[i] = s.tanh();
        }

        let block_rms = (sum_squares / block_size as f32).sqrt();
        meter.displayed_rms += RMS_DISPLAY_SMOOTHING * (block_rms - meter.displayed_rms);
        if block_peak >= meter.held_peak {
            meter.held_peak = block_peak;
        } else {
            meter.held_peak = (meter.held_peak - peak_decay).max(block_peak);
        }
    }
}

impl Default for OutputMeter {
    fn default() -> Self {
        Self::new()
    }
}

impl DspUnit for OutputMeter {
    fn info(&self) -> &UnitInfo {
        static INFO: UnitInfo = UnitInfo {
            id: "out.meter",
            name: "Output",
            description: "Stereo output with master volume, soft limiter, and level meters",
        };
        &INFO
    }

    fn ports(&self) -> &[PortDefinition] {
        &self.ports
    }

    fn parameters(&self) -> &[ParameterDefinition] {
        &self.parameters
    }

    fn prepare(&mut self, sample_rate: f32, max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.clip_dwell_samples = (CLIP_DWELL_SECONDS * sample_rate) as u32;
        self.left = vec![0.0; max_block_size];
        self.right = vec![0.0; max_block_size];
        self.volume_ramp = vec![0.0; max_block_size];
        self.volume_smooth.set_sample_rate(sample_rate);
    }

    fn process(
        &mut self,
        inputs: &[SignalBuffer],
        _outputs: &mut [SignalBuffer],
        params: &[f32],
        context: &ProcessContext,
    ) {
        self.volume_smooth.set_target(params[Self::PARAM_VOLUME]);
        if self.left.len() < context.block_size {
            // prepare() normally sizes these; guard against a host block
            // larger than advertised.
            self.left.resize(context.block_size, 0.0);
            self.right.resize(context.block_size, 0.0);
            self.volume_ramp.resize(context.block_size, 0.0);
        }

        // One shared volume ramp for both channels.
        let block = context.block_size;
        for v in self.volume_ramp.iter_mut().take(block) {
            *v = self.volume_smooth.next();
        }

        let peak_decay = PEAK_DECAY_PER_SECOND * block as f32 / self.sample_rate;
        let [left_meter, right_meter] = &mut self.meters;
        let [left_last, right_last] = &mut self.last_sample;
        Self::run_channel(
            left_meter,
            left_last,
            &inputs[Self::PORT_LEFT].samples,
            &mut self.left,
            &self.volume_ramp[..block],
            block,
            self.clip_dwell_samples,
            peak_decay,
        );
        Self::run_channel(
            right_meter,
            right_last,
            &inputs[Self::PORT_RIGHT].samples,
            &mut self.right,
            &self.volume_ramp[..block],
            block,
            self.clip_dwell_samples,
            peak_decay,
        );
    }

    fn reset(&mut self) {
        self.meters = [ChannelMeter::default(); 2];
        self.last_sample = [0.0; 2];
        self.left.fill(0.0);
        self.right.fill(0.0);
        self.volume_smooth.set_immediate(self.volume_smooth.target());
    }

    fn stereo_frames(&self) -> Option<(&[f32], &[f32])> {
        Some((&self.left, &self.right))
    }

    fn meter_reading(&mut self) -> Option<MeterReading> {
        Some(MeterReading {
            rms: [self.meters[0].displayed_rms, self.meters[1].displayed_rms],
            peak: [self.meters[0].held_peak, self.meters[1].held_peak],
            clip: [
                self.meters[0].clip_remaining > 0,
                self.meters[1].clip_remaining > 0,
            ],
        })
    }
}
