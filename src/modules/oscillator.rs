//! VCO module.
//!
//! A multi-waveform oscillator with 1 V/octave pitch tracking and linear
//! FM. Saw and square use polyBLEP edge correction to keep aliasing down;
//! sine and triangle are computed directly from the phase.

use std::f32::consts::TAU;

use crate::dsp::{
    DspUnit, ParameterDefinition, PortDefinition, ProcessContext, SignalBuffer, SignalKind,
    SmoothedValue, UnitInfo, UpdateRate,
};

/// Waveform selector values, matching the `waveform` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Waveform {
    Sine,
    Triangle,
    Saw,
    Square,
}

impl Waveform {
    fn from_param(value: f32) -> Self {
        match value.round() as i32 {
            1 => Waveform::Triangle,
            2 => Waveform::Saw,
            3 => Waveform::Square,
            _ => Waveform::Sine,
        }
    }
}

/// A voltage-controlled oscillator.
///
/// # Ports
///
/// - **Pitch** (CV, Input): 1 V/octave offset from the base frequency.
/// - **FM** (Audio, Input): linear frequency modulation.
/// - **Out** (Audio, Output): the waveform, -1.0 to 1.0.
///
/// # Parameters
///
/// - **Frequency** (20-8000 Hz): base frequency at 0 V pitch.
/// - **Waveform**: sine / triangle / saw / square.
/// - **FM Depth** (0-1): linear FM amount, scaled by the base frequency.
pub struct VcoOscillator {
    sample_rate: f32,
    /// Phase in [0, 1).
    phase: f32,
    ports: Vec<PortDefinition>,
    parameters: Vec<ParameterDefinition>,
    freq_smooth: SmoothedValue,
}

impl VcoOscillator {
    pub fn new() -> Self {
        let sample_rate = 44100.0;
        Self {
            sample_rate,
            phase: 0.0,
            ports: vec![
                PortDefinition::input("pitch", "Pitch", SignalKind::Cv),
                PortDefinition::input("fm", "FM", SignalKind::Audio),
                PortDefinition::output("out", "Out", SignalKind::Audio),
            ],
            parameters: vec![
                ParameterDefinition::frequency("frequency", "Frequency", 20.0, 8000.0, 220.0),
                ParameterDefinition::new(
                    "waveform",
                    "Waveform",
                    0.0,
                    3.0,
                    0.0,
                    "",
                    UpdateRate::PerBlock,
                ),
                ParameterDefinition::new(
                    "fm_depth",
                    "FM Depth",
                    0.0,
                    1.0,
                    0.0,
                    "",
                    UpdateRate::PerSample,
                ),
            ],
            freq_smooth: SmoothedValue::with_default_smoothing(220.0, sample_rate),
        }
    }

    const PORT_PITCH: usize = 0;
    const PORT_FM: usize = 1;
    const PORT_OUT: usize = 0;

    const PARAM_FREQUENCY: usize = 0;
    const PARAM_WAVEFORM: usize = 1;
    const PARAM_FM_DEPTH: usize = 2;

    /// Two-sample polynomial band-limited step correction around a
    /// discontinuity at phase 0.
    #[inline]
    fn poly_blep(t: f32, dt: f32) -> f32 {
        if t < dt {
            let t = t / dt;
            2.0 * t - t * t - 1.0
        } else if t > 1.0 - dt {
            let t = (t - 1.0) / dt;
            t * t + 2.0 * t + 1.0
        } else {
            0.0
        }
    }

    #[inline]
    fn naive_saw(t: f32) -> f32 {
        2.0 * t - 1.0
    }

    #[inline]
    fn naive_triangle(t: f32) -> f32 {
        if t < 0.5 {
            4.0 * t - 1.0
        } else {
            3.0 - 4.0 * t
        }
    }
}

impl Default for VcoOscillator {
    fn default() -> Self {
        Self::new()
    }
}

impl DspUnit for VcoOscillator {
    fn info(&self) -> &UnitInfo {
        static INFO: UnitInfo = UnitInfo {
            id: "osc.vco",
            name: "VCO",
            description: "Multi-waveform oscillator with 1V/oct pitch and linear FM",
        };
        &INFO
    }

    fn ports(&self) -> &[PortDefinition] {
        &self.ports
    }

    fn parameters(&self) -> &[ParameterDefinition] {
        &self.parameters
    }

    fn prepare(&mut self, sample_rate: f32, _max_block_size: usize) {
        self.sample_rate = sample_rate;
        self.freq_smooth.set_sample_rate(sample_rate);
    }

    fn process(
        &mut self,
        inputs: &[SignalBuffer],
        outputs: &mut [SignalBuffer],
        params: &[f32],
        context: &ProcessContext,
    ) {
        self.freq_smooth.set_target(params[Self::PARAM_FREQUENCY]);
        let waveform = Waveform::from_param(params[Self::PARAM_WAVEFORM]);
        let fm_depth = params[Self::PARAM_FM_DEPTH];

        let pitch = &inputs[Self::PORT_PITCH].samples;
        let fm = &inputs[Self::PORT_FM].samples;
        let out = &mut outputs[Self::PORT_OUT];

        let max_freq = 0.49 * self.sample_rate;
        for i in 0..context.block_size {
            let base = self.freq_smooth.next();
            let tracked = base * 2.0_f32.powf(pitch[i]);
            let freq = (tracked + fm[i] * fm_depth * tracked).clamp(0.0, max_freq);
            let dt = freq / self.sample_rate;

            let t = self.phase;
            let sample = match waveform {
                Waveform::Sine => (TAU * t).sin(),
                Waveform::Triangle => Self::naive_triangle(t),
                Waveform::Saw => Self::naive_saw(t) - Self::poly_blep(t, dt),
                Waveform::Square => {
                    let raw = if t < 0.5 { 1.0 } else { -1.0 };
                    // Falling edge sits at phase 0.5.
                    raw + Self::poly_blep(t, dt) - Self::poly_blep((t + 0.5) % 1.0, dt)
                }
            };
            out.samples[i] = sample;

            self.phase += dt;
            if self.phase >= 1.0 {
                self.phase -= 1.0;
            }
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.freq_smooth.set_immediate(self.freq_smooth.target());
    }
}
