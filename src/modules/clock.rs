//! 48-PPQ master clock.
//!
//! Emits the pulse train that drives the step sequencer: 48 pulses per
//! quarter note at the set tempo, 5 V high with a ~25% duty cycle. A sync
//! input snaps the pulse phase back to the start of a tick.

use crate::dsp::{
    DspUnit, ParameterDefinition, PortDefinition, ProcessContext, SignalBuffer, SignalKind,
    UnitInfo, GATE_HIGH, GATE_THRESHOLD,
};

/// Pulses per quarter note.
pub const PPQ: f32 = 48.0;

/// Fraction of each tick the pulse stays high.
const DUTY: f32 = 0.25;

/// A tempo clock producing 48-PPQ gate pulses.
///
/// # Ports
///
/// - **Sync** (Gate, Input): rising edge restarts the tick phase.
/// - **Clock** (Gate, Output): the pulse train.
///
/// # Parameters
///
/// - **Tempo** (20-300 BPM): pulse rate, 48 pulses per beat.
/// - **Run**: stops the pulse train (phase holds) when off.
pub struct PpqClock {
    sample_rate: f32,
    /// Position within the current tick, in samples.
    phase: f32,
    last_sync: f32,
    ports: Vec<PortDefinition>,
    parameters: Vec<ParameterDefinition>,
}

impl PpqClock {
    pub fn new() -> Self {
        Self {
            sample_rate: 44100.0,
            phase: 0.0,
            last_sync: 0.0,
            ports: vec![
                PortDefinition::input("sync", "Sync", SignalKind::Gate),
                PortDefinition::output("clock", "Clock", SignalKind::Gate),
            ],
            parameters: vec![
                ParameterDefinition::new(
                    "tempo",
                    "Tempo",
                    20.0,
                    300.0,
                    120.0,
                    "BPM",
                    crate::dsp::UpdateRate::PerBlock,
                ),
                ParameterDefinition::toggle("run", "Run", true),
            ],
        }
    }

    const PORT_SYNC: usize = 0;
    const PORT_CLOCK: usize = 0;

    const PARAM_TEMPO: usize = 0;
    const PARAM_RUN: usize = 1;

    /// Samples per 48-PPQ tick at the given tempo.
    fn samples_per_tick(&self, bpm: f32) -> f32 {
        self.sample_rate * 60.0 / (bpm * PPQ)
    }
}

impl Default for PpqClock {
    fn default() -> Self {
        Self::new()
    }
}

impl DspUnit for PpqClock {
    fn info(&self) -> &UnitInfo {
        static INFO: UnitInfo = UnitInfo {
            id: "clock.ppq48",
            name: "Clock",
            description: "48-PPQ tempo clock with sync input",
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
    }

    fn process(
        &mut self,
        inputs: &[SignalBuffer],
        outputs: &mut [SignalBuffer],
        params: &[f32],
        context: &ProcessContext,
    ) {
        let tempo = params[Self::PARAM_TEMPO].clamp(20.0, 300.0);
        let running = self.parameters[Self::PARAM_RUN].as_bool(params[Self::PARAM_RUN]);
        let tick_len = self.samples_per_tick(tempo);
        let high_len = tick_len * DUTY;

        let sync = &inputs[Self::PORT_SYNC].samples;
        let out = &mut outputs[Self::PORT_CLOCK];

        for i in 0..context.block_size {
            if self.last_sync < GATE_THRESHOLD && sync[i] >= GATE_THRESHOLD {
                self.phase = 0.0;
            }
            self.last_sync = sync[i];

            if !running {
                out.samples[i] = 0.0;
                continue;
            }

            out.samples[i] = if self.phase < high_len { GATE_HIGH } else { 0.0 };
            self.phase += 1.0;
            if self.phase >= tick_len {
                self.phase -= tick_len;
            }
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.last_sync = 0.0;
    }
}
