//! Attenuverter utility: scale and offset any signal.

use crate::dsp::{
    DspUnit, ParameterDefinition, PortDefinition, ProcessContext, SignalBuffer, SignalKind,
    SmoothedValue, UnitInfo, UpdateRate,
};

/// Scales a signal by a bipolar gain and adds a DC offset.
///
/// Both ports are kind-`Any`: the unit works identically for audio, CV,
/// and gates, taking on whatever kind the patch connects to it.
pub struct Attenuverter {
    ports: Vec<PortDefinition>,
    parameters: Vec<ParameterDefinition>,
    gain_smooth: SmoothedValue,
    offset_smooth: SmoothedValue,
}

impl Attenuverter {
    pub fn new() -> Self {
        let sample_rate = 44100.0;
        Self {
            ports: vec![
                PortDefinition::input("in", "In", SignalKind::Any),
                PortDefinition::output("out", "Out", SignalKind::Any),
            ],
            parameters: vec![
                ParameterDefinition::new(
                    "gain",
                    "Gain",
                    -2.0,
                    2.0,
                    1.0,
                    "x",
                    UpdateRate::PerSample,
                ),
                ParameterDefinition::new(
                    "offset",
                    "Offset",
                    -5.0,
                    5.0,
                    0.0,
                    "V",
                    UpdateRate::PerSample,
                ),
            ],
            gain_smooth: SmoothedValue::with_default_smoothing(1.0, sample_rate),
            offset_smooth: SmoothedValue::with_default_smoothing(0.0, sample_rate),
        }
    }

    const PORT_IN: usize = 0;
    const PORT_OUT: usize = 0;

    const PARAM_GAIN: usize = 0;
    const PARAM_OFFSET: usize = 1;
}

impl Default for Attenuverter {
    fn default() -> Self {
        Self::new()
    }
}

impl DspUnit for Attenuverter {
    fn info(&self) -> &UnitInfo {
        static INFO: UnitInfo = UnitInfo {
            id: "util.attenuverter",
            name: "Attenuverter",
            description: "Bipolar gain and offset for any signal",
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
        self.gain_smooth.set_sample_rate(sample_rate);
        self.offset_smooth.set_sample_rate(sample_rate);
    }

    fn process(
        &mut self,
        inputs: &[SignalBuffer],
        outputs: &mut [SignalBuffer],
        params: &[f32],
        context: &ProcessContext,
    ) {
        self.gain_smooth.set_target(params[Self::PARAM_GAIN]);
        self.offset_smooth.set_target(params[Self::PARAM_OFFSET]);

        let input = &inputs[Self::PORT_IN].samples;
        let out = &mut outputs[Self::PORT_OUT];
        for i in 0..context.block_size {
            out.samples[i] = input[i] * self.gain_smooth.next() + self.offset_smooth.next();
        }
    }

    fn reset(&mut self) {
        self.gain_smooth.set_immediate(self.gain_smooth.target());
        self.offset_smooth.set_immediate(self.offset_smooth.target());
    }
}
