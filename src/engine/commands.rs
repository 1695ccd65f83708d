//! Engine commands and events.
//!
//! The messages that flow between the interactive thread and the render
//! thread. Heavy construction happens before a message is sent: `AddModule`
//! carries a unit that was built, prepared, and buffered on the interactive
//! side, so applying a command never constructs anything on the render
//! thread.

use std::fmt;

use crate::dsp::{DspUnit, MeterReading, SignalBuffer};
use crate::graph::{ConnectionId, ModuleId, PortId};

/// A unit instance built, prepared, and buffered on the interactive
/// thread, shipped to the render thread ready to run.
pub struct PreparedUnit {
    pub unit: Box<dyn DspUnit>,
    /// Sample rate the unit was prepared for.
    pub sample_rate: f32,
    /// Block size the buffers were sized for.
    pub block_size: usize,
    /// Parameter defaults, indexed like the unit's declaration.
    pub params: Vec<f32>,
    /// Scratch input buffers, one per input port.
    pub inputs: Vec<SignalBuffer>,
    /// Value each input reads while unconnected.
    pub input_defaults: Vec<f32>,
    /// Output buffers for the pool, one per output port.
    pub outputs: Vec<SignalBuffer>,
}

impl PreparedUnit {
    /// Prepares a unit and allocates its processing state for the given
    /// stream format.
    pub fn build(mut unit: Box<dyn DspUnit>, sample_rate: f32, block_size: usize) -> Self {
        unit.prepare(sample_rate, block_size);
        let mut inputs = Vec::new();
        let mut input_defaults = Vec::new();
        let mut outputs = Vec::new();
        for port in unit.ports() {
            if port.is_input() {
                inputs.push(SignalBuffer::new(block_size, port.kind));
                input_defaults.push(port.default_value);
            } else {
                outputs.push(SignalBuffer::new(block_size, port.kind));
            }
        }
        let params = unit.parameters().iter().map(|p| p.default).collect();
        Self {
            unit,
            sample_rate,
            block_size,
            params,
            inputs,
            input_defaults,
            outputs,
        }
    }
}

/// Commands sent from the interactive thread to the render thread.
///
/// Drained at the top of each block, which is the atomic point at which a
/// new topology becomes visible to processing.
pub enum EngineCommand {
    /// Install an already-prepared unit under this module id.
    AddModule {
        module: ModuleId,
        /// Static type id from the unit registry, for logging.
        type_id: &'static str,
        prepared: PreparedUnit,
    },

    /// Tear down a module: drop its unit and every route touching it.
    /// Its consumers read silence from the same block onward.
    RemoveModule(ModuleId),

    /// Add a route from an output port to an input port.
    Connect {
        connection: ConnectionId,
        from: PortId,
        to: PortId,
    },

    /// Remove a route. The affected input reads its default value from the
    /// next block on.
    Disconnect(ConnectionId),

    /// Set a parameter on a module. The value has already been clamped to
    /// the parameter's declared range by the wiring adapter.
    SetParameter {
        module: ModuleId,
        /// Index into the unit's declared parameter list.
        index: usize,
        value: f32,
    },

    /// Start or stop processing. While stopped the engine emits silence.
    SetPlaying(bool),

    /// Remove every module and route.
    ClearRack,
}

impl fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddModule {
                module, type_id, ..
            } => f
                .debug_struct("AddModule")
                .field("module", module)
                .field("type_id", type_id)
                .finish_non_exhaustive(),
            Self::RemoveModule(module) => f.debug_tuple("RemoveModule").field(module).finish(),
            Self::Connect {
                connection,
                from,
                to,
            } => f
                .debug_struct("Connect")
                .field("connection", connection)
                .field("from", from)
                .field("to", to)
                .finish(),
            Self::Disconnect(id) => f.debug_tuple("Disconnect").field(id).finish(),
            Self::SetParameter {
                module,
                index,
                value,
            } => f
                .debug_struct("SetParameter")
                .field("module", module)
                .field("index", index)
                .field("value", value)
                .finish(),
            Self::SetPlaying(playing) => f.debug_tuple("SetPlaying").field(playing).finish(),
            Self::ClearRack => f.write_str("ClearRack"),
        }
    }
}

/// Events sent from the render thread back to the interactive thread.
///
/// All feedback is lossy: if the queue is full the report is dropped, never
/// blocked on.
#[derive(Debug, Clone, Copy)]
pub enum EngineEvent {
    /// Meter report from the terminal output unit, at ~60 Hz.
    Meter(MeterReading),

    /// Fraction of the block deadline spent processing, smoothed.
    CpuLoad(f32),

    /// Processing started at the given sample rate.
    Started { sample_rate: f32 },

    /// Processing stopped.
    Stopped,
}
