//! The core DspUnit trait.
//!
//! Every processing kernel in the rack implements this interface, which is
//! all the render graph needs to instantiate, wire, and run it.

use super::context::ProcessContext;
use super::parameter::ParameterDefinition;
use super::port::PortDefinition;
use super::SignalBuffer;

/// Static information about a DSP unit type.
#[derive(Clone, Debug)]
pub struct UnitInfo {
    /// Unique identifier for the unit type (e.g. "osc.vco", "filter.ladder").
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// A brief description of what the unit does.
    pub description: &'static str,
}

impl UnitInfo {
    /// Creates a new unit info.
    pub fn new(id: &'static str, name: &'static str, description: &'static str) -> Self {
        Self {
            id,
            name,
            description,
        }
    }
}

/// One meter report from a terminal output unit.
///
/// Values are per channel (left, right). RMS and peak are linear amplitude;
/// `clip` holds until the dwell time after the last over-threshold sample.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MeterReading {
    pub rms: [f32; 2],
    pub peak: [f32; 2],
    pub clip: [bool; 2],
}

/// The interface every DSP unit implements.
///
/// Units receive one block of input samples plus current parameter values
/// and fill one block of output samples. Port and parameter arity is fixed
/// at construction.
///
/// # Real-time constraints
///
/// `process` runs on the render thread and must not allocate, lock, or
/// block. All internal buffers are sized in `prepare`.
///
/// `Send + 'static` because units are constructed wherever convenient and
/// then owned by the render thread.
pub trait DspUnit: Send + 'static {
    /// Static information about this unit type.
    fn info(&self) -> &UnitInfo;

    /// The unit's port set. Port order determines the buffer indices passed
    /// to `process`; inputs come before outputs by convention.
    fn ports(&self) -> &[PortDefinition];

    /// The unit's declared parameters. Order determines the indices in the
    /// `params` slice passed to `process`.
    fn parameters(&self) -> &[ParameterDefinition];

    /// Prepares the unit for processing at the given sample rate and
    /// maximum block size. Called before processing starts and again if
    /// either changes. Allocate here, never in `process`.
    fn prepare(&mut self, sample_rate: f32, max_block_size: usize);

    /// Processes one block.
    ///
    /// * `inputs` - one buffer per input port, in port order
    /// * `outputs` - one buffer per output port, in port order
    /// * `params` - current parameter values, in declaration order
    fn process(
        &mut self,
        inputs: &[SignalBuffer],
        outputs: &mut [SignalBuffer],
        params: &[f32],
        context: &ProcessContext,
    );

    /// Clears all internal state (integrators, counters, accumulators).
    fn reset(&mut self);

    /// For terminal output units: the stereo frames to hand to the
    /// hardware buffer for the block just processed. `None` for everything
    /// else.
    fn stereo_frames(&self) -> Option<(&[f32], &[f32])> {
        None
    }

    /// For terminal output units: the current meter state. The render loop
    /// polls this at the UI reporting cadence, not per block. `None` for
    /// units that meter nothing.
    fn meter_reading(&mut self) -> Option<MeterReading> {
        None
    }
}
