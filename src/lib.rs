//! Real-time signal-routing and DSP engine for a virtual modular
//! synthesizer.
//!
//! A rack is a dynamically rewireable graph of signal producers and
//! consumers. The interactive thread edits the rack through a
//! [`graph::WiringAdapter`]; edits are validated there, translated into
//! commands, and handed over a lock-free queue to the render thread, which
//! applies them between audio blocks. The render side
//! ([`engine::RenderGraph`] driven by [`engine::RenderLoop`]) orders the
//! modules by signal flow each time the topology changes and processes one
//! block at a time, allocation-free.
//!
//! The built-in units live in [`modules`]; racks are saved and restored
//! through [`patch::Patch`].
//!
//! ```no_run
//! use rack_core::engine::start_engine;
//! use rack_core::graph::PortId;
//! use rack_core::modules::default_registry;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let (mut rack, _stream) = start_engine(default_registry())?;
//! let osc = rack.add_module("osc.vco")?;
//! let out = rack.add_module("out.meter")?;
//! rack.connect(PortId::new(osc, "out"), PortId::new(out, "left"))?;
//! # Ok(())
//! # }
//! ```

pub mod dsp;
pub mod engine;
pub mod graph;
pub mod modules;
pub mod patch;

pub use dsp::{DspUnit, MeterReading, SignalBuffer, SignalKind, UnitRegistry};
pub use engine::{start_engine, EngineCommand, EngineEvent, RackStream};
pub use graph::{ConnectError, ConnectionId, ModuleId, PortId, WiringAdapter};
pub use modules::default_registry;
pub use patch::{Patch, PatchError};
