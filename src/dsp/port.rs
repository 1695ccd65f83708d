//! Port definitions for DSP units.
//!
//! Ports are the connection points on units where signals flow in and out.

use super::SignalKind;

/// Direction of a port on a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PortDirection {
    /// An input port that receives signals.
    Input,
    /// An output port that sends signals.
    Output,
}

impl PortDirection {
    /// Returns a human-readable name for the port direction.
    pub fn name(&self) -> &'static str {
        match self {
            PortDirection::Input => "Input",
            PortDirection::Output => "Output",
        }
    }
}

/// Definition of a port on a DSP unit.
///
/// Each port has a unique id within the unit, a display name, a direction,
/// and a signal kind. The kind is fixed at creation.
#[derive(Clone, Debug)]
pub struct PortDefinition {
    /// Unique identifier for this port within the unit.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Whether this is an input or output port.
    pub direction: PortDirection,
    /// The kind of signal this port accepts or produces.
    pub kind: SignalKind,
    /// Value an input reads while unconnected. Ignored for outputs.
    pub default_value: f32,
}

impl PortDefinition {
    /// Creates a new input port definition.
    pub fn input(id: &'static str, name: &'static str, kind: SignalKind) -> Self {
        Self {
            id,
            name,
            direction: PortDirection::Input,
            kind,
            default_value: 0.0,
        }
    }

    /// Creates a new input port definition with a custom unconnected value.
    pub fn input_with_default(
        id: &'static str,
        name: &'static str,
        kind: SignalKind,
        default_value: f32,
    ) -> Self {
        Self {
            id,
            name,
            direction: PortDirection::Input,
            kind,
            default_value,
        }
    }

    /// Creates a new output port definition.
    pub fn output(id: &'static str, name: &'static str, kind: SignalKind) -> Self {
        Self {
            id,
            name,
            direction: PortDirection::Output,
            kind,
            default_value: 0.0,
        }
    }

    /// Returns true if this is an input port.
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Returns true if this is an output port.
    pub fn is_output(&self) -> bool {
        self.direction == PortDirection::Output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_direction_names() {
        assert_eq!(PortDirection::Input.name(), "Input");
        assert_eq!(PortDirection::Output.name(), "Output");
    }

    #[test]
    fn test_input_port_creation() {
        let port = PortDefinition::input("audio_in", "Audio In", SignalKind::Audio);
        assert_eq!(port.id, "audio_in");
        assert!(port.is_input());
        assert!(!port.is_output());
        assert_eq!(port.kind, SignalKind::Audio);
        assert_eq!(port.default_value, 0.0);
    }

    #[test]
    fn test_input_port_with_default() {
        let port = PortDefinition::input_with_default("cutoff", "Cutoff CV", SignalKind::Cv, 0.5);
        assert_eq!(port.default_value, 0.5);
        assert!(port.is_input());
    }

    #[test]
    fn test_output_port_creation() {
        let port = PortDefinition::output("out", "Out", SignalKind::Audio);
        assert!(port.is_output());
        assert!(!port.is_input());
    }
}
