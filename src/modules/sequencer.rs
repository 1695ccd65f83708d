//! 16-step pitch/gate sequencer driven by an external 48-PPQ clock.
//!
//! The sequencer never generates time on its own: it counts rising edges
//! on its clock input and advances one step every `divider x 12` ticks
//! (12 ticks = one sixteenth at divider 1). Because the clock is an
//! external, possibly jittery pulse train, gate length is derived from an
//! exponentially-smoothed estimate of tick spacing instead of the raw
//! inter-pulse delta.

use crate::dsp::{
    DspUnit, ParameterDefinition, PortDefinition, ProcessContext, SignalBuffer, SignalKind,
    UnitInfo, GATE_HIGH, GATE_THRESHOLD,
};

/// Number of steps in the sequence.
pub const STEP_COUNT: usize = 16;

/// Clock ticks per step at divider 1 (one sixteenth note at 48 PPQ).
const TICKS_PER_SIXTEENTH: u32 = 12;

/// EMA weights for the tick-spacing estimate.
const TICK_EMA_OLD: f32 = 0.85;
const TICK_EMA_NEW: f32 = 0.15;

const STEP_VALUE_IDS: [&str; STEP_COUNT] = [
    "step_1", "step_2", "step_3", "step_4", "step_5", "step_6", "step_7", "step_8", "step_9",
    "step_10", "step_11", "step_12", "step_13", "step_14", "step_15", "step_16",
];

const STEP_VALUE_NAMES: [&str; STEP_COUNT] = [
    "Step 1", "Step 2", "Step 3", "Step 4", "Step 5", "Step 6", "Step 7", "Step 8", "Step 9",
    "Step 10", "Step 11", "Step 12", "Step 13", "Step 14", "Step 15", "Step 16",
];

const STEP_ON_IDS: [&str; STEP_COUNT] = [
    "on_1", "on_2", "on_3", "on_4", "on_5", "on_6", "on_7", "on_8", "on_9", "on_10", "on_11",
    "on_12", "on_13", "on_14", "on_15", "on_16",
];

const STEP_ON_NAMES: [&str; STEP_COUNT] = [
    "On 1", "On 2", "On 3", "On 4", "On 5", "On 6", "On 7", "On 8", "On 9", "On 10", "On 11",
    "On 12", "On 13", "On 14", "On 15", "On 16",
];

/// A 16-step sequencer.
///
/// # Ports
///
/// - **Clock** (Gate, Input): 48-PPQ pulse train.
/// - **Reset** (Gate, Input): rising edge rewinds to the start.
/// - **Pitch** (CV, Output): held 1 V/octave pitch of the current step.
/// - **Gate** (Gate, Output): high for a fraction of each enabled step.
///
/// # Parameters
///
/// - **Divider** (1-64): musical multiple; steps last divider sixteenths.
///   Changes commit at the next step boundary.
/// - **Base Octave** (1-8): pitch center; octave 4 is 0 V.
/// - **Gate Length** (0-1): fraction of the step the gate stays high.
/// - **Run**: halts advancement; pitch holds, gate goes silent.
/// - **Step 1-16** (0-1): per-step pitch, one octave span around center.
/// - **On 1-16**: per-step enable; disabled steps hold the previous pitch.
pub struct StepSequencer {
    /// Current step, -1 until the first step boundary after reset.
    step: i32,
    /// Clock edges seen since the last step boundary.
    tick_count: u32,
    /// Committed divider; pending changes land at step boundaries.
    divider: u32,
    /// Smoothed samples between clock edges.
    samples_per_tick: f32,
    /// Samples since the previous clock edge.
    samples_since_tick: u32,
    /// Whether a previous edge exists to measure spacing against.
    tick_seen: bool,
    /// Set while stopped; the first edge after a resume spans the pause,
    /// so it must not feed the spacing estimate.
    spacing_stale: bool,
    gate_remaining: u32,
    held_pitch: f32,
    last_clock: f32,
    last_reset: f32,
    ports: Vec<PortDefinition>,
    parameters: Vec<ParameterDefinition>,
}

impl StepSequencer {
    pub fn new() -> Self {
        let mut parameters = vec![
            ParameterDefinition::stepped("divider", "Divider", 1, 64, 1),
            ParameterDefinition::stepped("base_octave", "Base Octave", 1, 8, 4),
            ParameterDefinition::new(
                "gate_ratio",
                "Gate Length",
                0.0,
                1.0,
                0.5,
                "%",
                crate::dsp::UpdateRate::PerBlock,
            ),
            ParameterDefinition::toggle("run", "Run", true),
        ];
        for i in 0..STEP_COUNT {
            parameters.push(ParameterDefinition::new(
                STEP_VALUE_IDS[i],
                STEP_VALUE_NAMES[i],
                0.0,
                1.0,
                0.5,
                "",
                crate::dsp::UpdateRate::PerBlock,
            ));
        }
        for i in 0..STEP_COUNT {
            parameters.push(ParameterDefinition::toggle(
                STEP_ON_IDS[i],
                STEP_ON_NAMES[i],
                true,
            ));
        }

        Self {
            step: -1,
            tick_count: 0,
            divider: 1,
            samples_per_tick: Self::default_samples_per_tick(44100.0),
            samples_since_tick: 0,
            tick_seen: false,
            spacing_stale: false,
            gate_remaining: 0,
            held_pitch: 0.0,
            last_clock: 0.0,
            last_reset: 0.0,
            ports: vec![
                PortDefinition::input("clock", "Clock", SignalKind::Gate),
                PortDefinition::input("reset", "Reset", SignalKind::Gate),
                PortDefinition::output("pitch", "Pitch", SignalKind::Cv),
                PortDefinition::output("gate", "Gate", SignalKind::Gate),
            ],
            parameters,
        }
    }

    const PORT_CLOCK: usize = 0;
    const PORT_RESET: usize = 1;
    const PORT_PITCH: usize = 0;
    const PORT_GATE: usize = 1;

    const PARAM_DIVIDER: usize = 0;
    const PARAM_BASE_OCTAVE: usize = 1;
    const PARAM_GATE_RATIO: usize = 2;
    const PARAM_RUN: usize = 3;
    const PARAM_STEP_VALUES: usize = 4;
    const PARAM_STEP_ON: usize = 4 + STEP_COUNT;

    /// Tick spacing of a 120 BPM 48-PPQ clock, used until real edges arrive.
    fn default_samples_per_tick(sample_rate: f32) -> f32 {
        sample_rate * 60.0 / (120.0 * 48.0)
    }

    /// The current step, -1 while idle.
    pub fn current_step(&self) -> i32 {
        self.step
    }

    fn ticks_per_step(&self) -> u32 {
        self.divider * TICKS_PER_SIXTEENTH
    }

    fn advance_step(&mut self, params: &[f32], pending_divider: u32, gate_ratio: f32) {
        self.tick_count = 0;
        self.divider = pending_divider;
        self.step = (self.step + 1).rem_euclid(STEP_COUNT as i32);

        let index = self.step as usize;
        let enabled = params[Self::PARAM_STEP_ON + index] >= 0.5;
        if enabled {
            let base_octave = params[Self::PARAM_BASE_OCTAVE].round();
            let value = params[Self::PARAM_STEP_VALUES + index].clamp(0.0, 1.0);
            self.held_pitch = base_octave - 4.0 + (value - 0.5);

            let step_length = self.samples_per_tick * self.ticks_per_step() as f32;
            self.gate_remaining = (step_length * gate_ratio).floor() as u32;
        }
        // Disabled steps hold the previous pitch and fire no gate.
    }
}

impl Default for StepSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl DspUnit for StepSequencer {
    fn info(&self) -> &UnitInfo {
        static INFO: UnitInfo = UnitInfo {
            id: "seq.step16",
            name: "Step Sequencer",
            description: "16-step pitch/gate sequencer clocked at 48 PPQ",
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
        if !self.tick_seen {
            self.samples_per_tick = Self::default_samples_per_tick(sample_rate);
        }
    }

    fn process(
        &mut self,
        inputs: &[SignalBuffer],
        outputs: &mut [SignalBuffer],
        params: &[f32],
        context: &ProcessContext,
    ) {
        let pending_divider = params[Self::PARAM_DIVIDER].round().clamp(1.0, 64.0) as u32;
        let gate_ratio = params[Self::PARAM_GATE_RATIO].clamp(0.0, 1.0);
        let running = params[Self::PARAM_RUN] >= 0.5;

        let clock = &inputs[Self::PORT_CLOCK].samples;
        let reset = &inputs[Self::PORT_RESET].samples;
        let (pitch_out, gate_out) = {
            let (a, b) = outputs.split_at_mut(Self::PORT_GATE);
            (&mut a[Self::PORT_PITCH], &mut b[0])
        };

        for i in 0..context.block_size {
            if self.last_reset < GATE_THRESHOLD && reset[i] >= GATE_THRESHOLD {
                // Immediate rewind, independent of the clock's phase.
                self.step = -1;
                self.tick_count = 0;
                self.gate_remaining = 0;
            }
            self.last_reset = reset[i];

            let edge = self.last_clock < GATE_THRESHOLD && clock[i] >= GATE_THRESHOLD;
            self.last_clock = clock[i];

            self.samples_since_tick = self.samples_since_tick.saturating_add(1);
            if !running {
                self.spacing_stale = true;
            }
            if edge && running {
                if self.tick_seen && !self.spacing_stale {
                    let delta = self.samples_since_tick as f32;
                    self.samples_per_tick =
                        self.samples_per_tick * TICK_EMA_OLD + delta * TICK_EMA_NEW;
                }
                self.tick_seen = true;
                self.spacing_stale = false;
                self.samples_since_tick = 0;

                self.tick_count += 1;
                if self.tick_count >= self.ticks_per_step() {
                    self.advance_step(params, pending_divider, gate_ratio);
                }
            }

            pitch_out.samples[i] = self.held_pitch;
            if running && self.gate_remaining > 0 {
                gate_out.samples[i] = GATE_HIGH;
                self.gate_remaining -= 1;
            } else {
                gate_out.samples[i] = 0.0;
            }
        }
    }

    fn reset(&mut self) {
        self.step = -1;
        self.tick_count = 0;
        self.samples_since_tick = 0;
        self.tick_seen = false;
        self.spacing_stale = false;
        self.gate_remaining = 0;
        self.held_pitch = 0.0;
        self.last_clock = 0.0;
        self.last_reset = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48000.0;
    const TICK_SPACING: usize = 100;

    /// Default parameter values for the sequencer.
    fn default_params(seq: &StepSequencer) -> Vec<f32> {
        seq.parameters().iter().map(|p| p.default).collect()
    }

    /// Drives the sequencer with one clock pulse every `TICK_SPACING`
    /// samples for `edges` edges, returning (pitch, gate) sample streams.
    fn drive(seq: &mut StepSequencer, params: &[f32], edges: usize) -> (Vec<f32>, Vec<f32>) {
        let block = 64;
        seq.prepare(SAMPLE_RATE, block);
        let ctx = ProcessContext::new(SAMPLE_RATE, block);
        let total_samples = edges * TICK_SPACING + TICK_SPACING;
        let blocks = total_samples / block + 1;

        let mut pitch = Vec::new();
        let mut gate = Vec::new();
        let reset = SignalBuffer::gate(block);
        let mut n = 0_usize;
        for _ in 0..blocks {
            let mut clock = SignalBuffer::gate(block);
            for s in clock.samples.iter_mut() {
                // 25-sample-wide pulses, one per TICK_SPACING samples.
                let in_pulse = n % TICK_SPACING < 25 && n / TICK_SPACING < edges;
                *s = if in_pulse { GATE_HIGH } else { 0.0 };
                n += 1;
            }
            let mut outputs = vec![SignalBuffer::cv(block), SignalBuffer::gate(block)];
            seq.process(&[clock, reset.clone()], &mut outputs, params, &ctx);
            pitch.extend_from_slice(&outputs[0].samples);
            gate.extend_from_slice(&outputs[1].samples);
        }
        (pitch, gate)
    }

    fn gate_on_events(gate: &[f32]) -> Vec<(usize, usize)> {
        let mut events = Vec::new();
        let mut start = None;
        for (i, &s) in gate.iter().enumerate() {
            match (start, s >= GATE_THRESHOLD) {
                (None, true) => start = Some(i),
                (Some(at), false) => {
                    events.push((at, i - at));
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(at) = start {
            events.push((at, gate.len() - at));
        }
        events
    }

    #[test]
    fn test_full_cycle_produces_sixteen_gates() {
        let mut seq = StepSequencer::new();
        let params = default_params(&seq);
        // divider=1: 12 ticks per step, 192 edges = 16 step boundaries.
        let (_pitch, gate) = drive(&mut seq, &params, 192);
        let events = gate_on_events(&gate);
        assert_eq!(events.len(), 16, "expected 16 gate events");
        assert_eq!(seq.current_step(), 15);
    }

    #[test]
    fn test_idle_until_first_step_boundary() {
        let mut seq = StepSequencer::new();
        let params = default_params(&seq);
        let (_pitch, gate) = drive(&mut seq, &params, 11);
        assert_eq!(seq.current_step(), -1);
        assert!(gate.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_gate_length_tracks_smoothed_tick_spacing() {
        let mut seq = StepSequencer::new();
        let params = default_params(&seq);
        let (_pitch, gate) = drive(&mut seq, &params, 96);
        let events = gate_on_events(&gate);
        // Steady 100-sample ticks: late gates converge to
        // floor(100 x 12 x 0.5) = 600 samples. The final event may be cut
        // off by the end of the render, so look one before it.
        let (_, len) = events[events.len() - 2];
        assert!(
            (570..=600).contains(&len),
            "expected ~600-sample gate, got {}",
            len
        );
    }

    #[test]
    fn test_pitch_follows_step_values() {
        let mut seq = StepSequencer::new();
        let mut params = default_params(&seq);
        params[StepSequencer::PARAM_STEP_VALUES] = 1.0; // step 1 high
        let (pitch, _gate) = drive(&mut seq, &params, 12);
        // Base octave 4 maps to 0 V center; value 1.0 sits +0.5 V above.
        assert!((pitch.last().copied().unwrap_or(0.0) - 0.5).abs() < 1e-6);
        assert_eq!(seq.current_step(), 0);
    }

    #[test]
    fn test_disabled_step_holds_pitch_and_skips_gate() {
        let mut seq = StepSequencer::new();
        let mut params = default_params(&seq);
        params[StepSequencer::PARAM_STEP_VALUES] = 1.0; // step 1: +0.5 V
        params[StepSequencer::PARAM_STEP_ON + 1] = 0.0; // step 2 disabled
        params[StepSequencer::PARAM_STEP_VALUES + 1] = 0.0;
        params[StepSequencer::PARAM_GATE_RATIO] = 0.25;

        let (pitch, gate) = drive(&mut seq, &params, 24);
        assert_eq!(seq.current_step(), 1);
        // Pitch still reflects step 1, and only one gate fired.
        assert!((pitch.last().copied().unwrap_or(0.0) - 0.5).abs() < 1e-6);
        assert_eq!(gate_on_events(&gate).len(), 1);
    }

    #[test]
    fn test_reset_rewinds_to_step_zero() {
        let mut seq = StepSequencer::new();
        let params = default_params(&seq);
        let _ = drive(&mut seq, &params, 60); // step 4
        assert_eq!(seq.current_step(), 4);

        // Rising edge on reset rewinds immediately.
        let ctx = ProcessContext::new(SAMPLE_RATE, 64);
        let clock = SignalBuffer::gate(64);
        let mut reset = SignalBuffer::gate(64);
        reset.samples[0] = GATE_HIGH;
        let mut outputs = vec![SignalBuffer::cv(64), SignalBuffer::gate(64)];
        seq.process(&[clock, reset], &mut outputs, &params, &ctx);
        assert_eq!(seq.current_step(), -1);

        // Twelve more edges commit step 0.
        let (_pitch, _gate) = drive(&mut seq, &params, 12);
        assert_eq!(seq.current_step(), 0);
    }

    #[test]
    fn test_stopped_sequencer_holds_pitch_and_silences_gate() {
        let mut seq = StepSequencer::new();
        let mut params = default_params(&seq);
        params[StepSequencer::PARAM_STEP_VALUES] = 1.0;
        let _ = drive(&mut seq, &params, 12);
        assert_eq!(seq.current_step(), 0);

        params[StepSequencer::PARAM_RUN] = 0.0;
        let (pitch, gate) = drive(&mut seq, &params, 48);
        assert_eq!(seq.current_step(), 0, "stopped sequencer advanced");
        assert!(gate.iter().all(|&s| s == 0.0));
        assert!(pitch.iter().all(|&v| (v - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_resume_after_stop_keeps_gate_length() {
        let mut seq = StepSequencer::new();
        let mut params = default_params(&seq);
        let _ = drive(&mut seq, &params, 96); // spacing estimate converged

        // A long stop with the clock still running; none of this time may
        // leak into the spacing estimate.
        params[StepSequencer::PARAM_RUN] = 0.0;
        let _ = drive(&mut seq, &params, 48);

        params[StepSequencer::PARAM_RUN] = 1.0;
        let (_pitch, gate) = drive(&mut seq, &params, 24);
        let events = gate_on_events(&gate);
        // events[0] is the tail of the gate interrupted by the stop; the
        // first full step after the resume is events[1].
        assert!(events.len() >= 2);
        let (_, len) = events[1];
        assert!(
            (570..=630).contains(&len),
            "pause leaked into gate length: {}",
            len
        );
    }

    #[test]
    fn test_divider_commits_at_step_boundary() {
        let mut seq = StepSequencer::new();
        let mut params = default_params(&seq);
        // First boundary still uses divider 1 even though the knob says 2:
        // the change lands when that boundary commits.
        params[StepSequencer::PARAM_DIVIDER] = 2.0;
        let (_pitch, _gate) = drive(&mut seq, &params, 12);
        assert_eq!(seq.current_step(), 0);

        // After the commit, a step takes 24 ticks.
        let (_pitch, _gate) = drive(&mut seq, &params, 23);
        assert_eq!(seq.current_step(), 0);
        let (_pitch, _gate) = drive(&mut seq, &params, 1);
        assert_eq!(seq.current_step(), 1);
    }
}
