//! Resonant 4-pole lowpass ladder filter.
//!
//! Zero-delay-feedback topology-preserving-transform design: four cascaded
//! trapezoidal one-pole stages solved implicitly each sample, so the
//! resonance feedback has no one-sample delay error. The feedback path is
//! high-passed (~28 Hz) to stop low-frequency runaway, and the output is
//! gain-compensated near the top octave where the implicit solve loses
//! loudness.

use std::f32::consts::{PI, TAU};

use crate::dsp::{
    DspUnit, ParameterDefinition, PortDefinition, ProcessContext, SignalBuffer, SignalKind,
    SmoothedValue, UnitInfo,
};

/// Corner of the one-pole high-pass inside the feedback path, in Hz.
const FEEDBACK_HPF_HZ: f32 = 28.0;

/// Corner of the output DC blocker, in Hz.
const DC_BLOCK_HZ: f32 = 12.0;

/// Cutoff for the resonance-to-K bass attenuation knee, in Hz.
const BASS_KNEE_HZ: f32 = 60.0;

/// Maximum fraction of the third-stage tap blended into the output.
const BRIGHT_TAP_MAX: f32 = 0.18;

#[inline]
fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// A resonant 4-pole lowpass filter.
///
/// # Ports
///
/// - **In** (Audio, Input): signal to filter.
/// - **Cutoff CV** (CV, Input): 1 V/octave cutoff modulation.
/// - **Res CV** (CV, Input): resonance modulation, 5 V spans the full range.
/// - **Out** (Audio, Output): filtered signal.
///
/// # Parameters
///
/// - **Cutoff** (20-16000 Hz): base cutoff frequency.
/// - **Resonance** (0-1): feedback amount; self-oscillates near 1.
/// - **Gain** (0.25-2.0): post-filter output gain.
pub struct LadderFilter {
    sample_rate: f32,
    /// Integrator states of the four cascaded stages.
    stage: [f32; 4],
    /// Lowpass state of the feedback-path high-pass.
    feedback_lp: f32,
    /// Lowpass state of the output DC blocker.
    dc_lp: f32,
    feedback_hpf_coeff: f32,
    dc_block_coeff: f32,
    ports: Vec<PortDefinition>,
    parameters: Vec<ParameterDefinition>,
    cutoff_smooth: SmoothedValue,
    resonance_smooth: SmoothedValue,
}

impl LadderFilter {
    pub fn new() -> Self {
        let sample_rate = 44100.0;
        let mut filter = Self {
            sample_rate,
            stage: [0.0; 4],
            feedback_lp: 0.0,
            dc_lp: 0.0,
            feedback_hpf_coeff: 0.0,
            dc_block_coeff: 0.0,
            ports: vec![
                PortDefinition::input("in", "In", SignalKind::Audio),
                PortDefinition::input("cutoff_cv", "Cutoff CV", SignalKind::Cv),
                PortDefinition::input("res_cv", "Res CV", SignalKind::Cv),
                PortDefinition::output("out", "Out", SignalKind::Audio),
            ],
            parameters: vec![
                ParameterDefinition::frequency("cutoff", "Cutoff", 20.0, 16000.0, 1200.0),
                ParameterDefinition::normalized("resonance", "Resonance", 0.0),
                ParameterDefinition::new(
                    "gain",
                    "Gain",
                    0.25,
                    2.0,
                    1.0,
                    "",
                    crate::dsp::UpdateRate::PerSample,
                ),
            ],
            cutoff_smooth: SmoothedValue::with_default_smoothing(1200.0, sample_rate),
            resonance_smooth: SmoothedValue::with_default_smoothing(0.0, sample_rate),
        };
        filter.update_coefficients();
        filter
    }

    const PORT_IN: usize = 0;
    const PORT_CUTOFF_CV: usize = 1;
    const PORT_RES_CV: usize = 2;
    const PORT_OUT: usize = 0;

    const PARAM_CUTOFF: usize = 0;
    const PARAM_RESONANCE: usize = 1;
    const PARAM_GAIN: usize = 2;

    fn update_coefficients(&mut self) {
        self.feedback_hpf_coeff = 1.0 - (-TAU * FEEDBACK_HPF_HZ / self.sample_rate).exp();
        self.dc_block_coeff = 1.0 - (-TAU * DC_BLOCK_HZ / self.sample_rate).exp();
    }

    fn clear_state(&mut self) {
        self.stage = [0.0; 4];
        self.feedback_lp = 0.0;
        self.dc_lp = 0.0;
    }

    /// One filtered sample, or `None` when the coefficients went non-finite
    /// and the rest of the block must be silenced.
    #[inline]
    fn tick(&mut self, input: f32, cutoff: f32, resonance: f32, gain: f32) -> Option<f32> {
        let nyquist = 0.5 * self.sample_rate;
        let fc = cutoff.clamp(10.0, 0.49 * self.sample_rate);
        let g = (PI * fc / self.sample_rate).tan();
        if !g.is_finite() {
            return None;
        }

        let norm = fc / nyquist;
        let mut k = 4.0 * resonance;
        // Attenuate feedback in the deep bass so subsonic content cannot
        // build up, and back it off near Nyquist where the prewarped pole
        // would otherwise overshoot.
        k *= (fc / (fc + BASS_KNEE_HZ)).powf(1.1);
        k = k.min(4.0 - 0.8 * norm * norm);

        let big_g = g / (1.0 + g);
        let a = big_g * (1.0 + big_g).powi(3);
        let alpha0 = 1.0 / (1.0 + k * a);

        // Zero-input response of the cascade: what the four stages would
        // output this sample with no new input.
        let s_scale = 1.0 / (1.0 + g);
        let s = big_g * big_g * big_g * self.stage[0] * s_scale
            + big_g * big_g * self.stage[1] * s_scale
            + big_g * self.stage[2] * s_scale
            + self.stage[3] * s_scale;

        // High-pass the feedback path only; the dry input stays untouched.
        self.feedback_lp += self.feedback_hpf_coeff * (s - self.feedback_lp);
        let feedback = s - self.feedback_lp;

        let u = alpha0 * (input - k * feedback);

        // Four trapezoidal one-pole stages sharing the prewarped gain.
        let mut x = u;
        let mut stage3_tap = 0.0;
        for (i, z) in self.stage.iter_mut().enumerate() {
            let v = (x - *z) * big_g;
            let y = v + *z;
            *z = y + v;
            if i == 2 {
                stage3_tap = y;
            }
            x = y;
        }
        let y4 = x;

        // Makeup gain: steep near the top octave where the implicit solve
        // loses loudness, gentler in the mids tied to the feedback amount.
        let top = smoothstep(0.65, 0.98, norm);
        let comp = (1.0 + 10.0 * top * top + 0.3 * k).clamp(1.0, 14.0);

        // Small third-stage blend keeps brightness at high resonance and
        // high cutoff without altering the topology.
        let bright = BRIGHT_TAP_MAX * resonance * top;
        let mut out = (y4 + bright * stage3_tap) * comp;

        // DC block, then bounded post gain.
        self.dc_lp += self.dc_block_coeff * (out - self.dc_lp);
        out -= self.dc_lp;
        out *= gain.clamp(0.25, 2.0);

        if !out.is_finite() {
            return None;
        }
        Some(out)
    }
}

impl Default for LadderFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl DspUnit for LadderFilter {
    fn info(&self) -> &UnitInfo {
        static INFO: UnitInfo = UnitInfo {
            id: "filter.ladder",
            name: "Ladder Filter",
            description: "ZDF resonant 4-pole lowpass with CV-controlled cutoff and resonance",
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
        self.update_coefficients();
        self.cutoff_smooth.set_sample_rate(sample_rate);
        self.resonance_smooth.set_sample_rate(sample_rate);
    }

    fn process(
        &mut self,
        inputs: &[SignalBuffer],
        outputs: &mut [SignalBuffer],
        params: &[f32],
        context: &ProcessContext,
    ) {
        self.cutoff_smooth.set_target(params[Self::PARAM_CUTOFF]);
        self.resonance_smooth
            .set_target(params[Self::PARAM_RESONANCE]);
        let gain = params[Self::PARAM_GAIN];

        let input = &inputs[Self::PORT_IN].samples;
        let cutoff_cv = &inputs[Self::PORT_CUTOFF_CV].samples;
        let res_cv = &inputs[Self::PORT_RES_CV].samples;
        let out = &mut outputs[Self::PORT_OUT];

        for i in 0..context.block_size {
            let base_cutoff = self.cutoff_smooth.next();
            let cutoff = base_cutoff * 2.0_f32.powf(cutoff_cv[i]);
            let resonance = (self.resonance_smooth.next() + res_cv[i] / 5.0).clamp(0.0, 1.0);

            match self.tick(input[i], cutoff, resonance, gain) {
                Some(sample) => out.samples[i] = sample,
                None => {
                    // Non-finite state: silence the rest of the block and
                    // start clean next time.
                    out.samples[i..context.block_size].fill(0.0);
                    self.clear_state();
                    return;
                }
            }
        }
    }

    fn reset(&mut self) {
        self.clear_state();
        self.cutoff_smooth.set_immediate(self.cutoff_smooth.target());
        self.resonance_smooth
            .set_immediate(self.resonance_smooth.target());
    }
}
