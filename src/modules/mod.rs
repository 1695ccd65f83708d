//! The built-in DSP units.

pub mod attenuverter;
pub mod clock;
pub mod ladder;
pub mod meter;
pub mod oscillator;
pub mod sequencer;

pub use attenuverter::Attenuverter;
pub use clock::PpqClock;
pub use ladder::LadderFilter;
pub use meter::OutputMeter;
pub use oscillator::VcoOscillator;
pub use sequencer::StepSequencer;

use crate::dsp::UnitRegistry;

/// Builds a registry containing every built-in unit.
pub fn default_registry() -> UnitRegistry {
    let mut registry = UnitRegistry::new();
    registry.register::<VcoOscillator>();
    registry.register::<LadderFilter>();
    registry.register::<PpqClock>();
    registry.register::<StepSequencer>();
    registry.register::<Attenuverter>();
    registry.register::<OutputMeter>();
    registry
}
