//! Parameter definitions for DSP units.
//!
//! Parameters are the controllable values on units (knobs, sliders,
//! switches). Each declares its range, default, and how often the unit
//! re-reads it.

/// How often a unit picks up changes to a parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateRate {
    /// Re-read (and typically smoothed) every sample.
    PerSample,
    /// Read once at the top of each block.
    PerBlock,
}

/// Definition of a parameter on a DSP unit.
///
/// Each parameter has a unique id, display name, valid range, default
/// value, a unit suffix for display, and an update-rate class.
#[derive(Clone, Debug)]
pub struct ParameterDefinition {
    /// Unique identifier for this parameter within the unit.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Minimum value of the parameter.
    pub min: f32,
    /// Maximum value of the parameter.
    pub max: f32,
    /// Default value when the unit is created.
    pub default: f32,
    /// Unit suffix for display (e.g. "Hz", "BPM", "%"). Empty if none.
    pub unit: &'static str,
    /// Whether the unit consumes changes per sample or per block.
    pub rate: UpdateRate,
}

impl ParameterDefinition {
    /// Creates a new parameter definition.
    pub fn new(
        id: &'static str,
        name: &'static str,
        min: f32,
        max: f32,
        default: f32,
        unit: &'static str,
        rate: UpdateRate,
    ) -> Self {
        Self {
            id,
            name,
            min,
            max,
            default,
            unit,
            rate,
        }
    }

    /// Creates a normalized parameter (0.0 to 1.0), smoothed per sample.
    pub fn normalized(id: &'static str, name: &'static str, default: f32) -> Self {
        Self::new(id, name, 0.0, 1.0, default, "%", UpdateRate::PerSample)
    }

    /// Creates a frequency parameter in Hz, smoothed per sample.
    pub fn frequency(
        id: &'static str,
        name: &'static str,
        min: f32,
        max: f32,
        default: f32,
    ) -> Self {
        Self::new(id, name, min, max, default, "Hz", UpdateRate::PerSample)
    }

    /// Creates a toggle (boolean) parameter, read per block.
    pub fn toggle(id: &'static str, name: &'static str, default: bool) -> Self {
        Self::new(
            id,
            name,
            0.0,
            1.0,
            if default { 1.0 } else { 0.0 },
            "",
            UpdateRate::PerBlock,
        )
    }

    /// Creates a stepped integer-valued parameter, read per block.
    pub fn stepped(id: &'static str, name: &'static str, min: u32, max: u32, default: u32) -> Self {
        Self::new(
            id,
            name,
            min as f32,
            max as f32,
            default as f32,
            "",
            UpdateRate::PerBlock,
        )
    }

    /// Clamps a value to this parameter's valid range.
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min, self.max)
    }

    /// Returns true if the parameter reads as a boolean toggle.
    pub fn as_bool(&self, value: f32) -> bool {
        value >= 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameter_clamp() {
        let param =
            ParameterDefinition::new("test", "Test", 0.0, 100.0, 50.0, "", UpdateRate::PerBlock);
        assert_eq!(param.clamp(-10.0), 0.0);
        assert_eq!(param.clamp(50.0), 50.0);
        assert_eq!(param.clamp(150.0), 100.0);
    }

    #[test]
    fn test_frequency_parameter_is_per_sample() {
        let param = ParameterDefinition::frequency("cutoff", "Cutoff", 10.0, 20000.0, 1000.0);
        assert_eq!(param.rate, UpdateRate::PerSample);
        assert_eq!(param.unit, "Hz");
        assert_eq!(param.default, 1000.0);
    }

    #[test]
    fn test_toggle_parameter() {
        let param = ParameterDefinition::toggle("run", "Run", true);
        assert_eq!(param.default, 1.0);
        assert_eq!(param.rate, UpdateRate::PerBlock);
        assert!(param.as_bool(1.0));
        assert!(!param.as_bool(0.0));
    }

    #[test]
    fn test_stepped_parameter() {
        let param = ParameterDefinition::stepped("divider", "Divider", 1, 64, 1);
        assert_eq!(param.min, 1.0);
        assert_eq!(param.max, 64.0);
        assert_eq!(param.default, 1.0);
        assert_eq!(param.rate, UpdateRate::PerBlock);
    }
}
