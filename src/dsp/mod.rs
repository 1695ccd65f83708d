//! Core DSP vocabulary: signals, ports, parameters, and the unit trait.

pub mod context;
pub mod parameter;
pub mod port;
pub mod registry;
pub mod signal;
pub mod smoothed_value;
pub mod unit;

pub use context::ProcessContext;
pub use parameter::{ParameterDefinition, UpdateRate};
pub use port::{PortDefinition, PortDirection};
pub use registry::{UnitFactory, UnitRegistry};
pub use signal::{SignalBuffer, SignalKind, GATE_HIGH, GATE_THRESHOLD};
pub use smoothed_value::SmoothedValue;
pub use unit::{DspUnit, MeterReading, UnitInfo};
