//! Signal kinds and sample buffers.
//!
//! Defines the fundamental data types for the signals that flow along
//! connections: audio, control voltage, and gates.

use serde::{Deserialize, Serialize};

/// The kind of signal a port carries.
///
/// Each kind has a conventional range:
/// - **Audio**: sample streams, nominally -1.0 to 1.0
/// - **Cv**: control voltage; pitch CV follows 1 V/octave
/// - **Gate**: two-level logic, 0 V low / 5 V high, 2.5 V threshold
/// - **Any**: utility ports that accept or produce whatever the peer carries
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    Audio,
    Cv,
    Gate,
    Any,
}

/// Logic-high threshold for gate signals, in volts.
pub const GATE_THRESHOLD: f32 = 2.5;

/// Output level of an asserted gate, in volts.
pub const GATE_HIGH: f32 = 5.0;

impl SignalKind {
    /// Checks whether a connection carrying this kind may feed a port of
    /// `target` kind.
    ///
    /// Rules:
    /// - Same kind to same kind: always allowed
    /// - Gate <-> Cv: allowed (a gate is a cv subtype)
    /// - Any: matches every peer kind
    /// - Audio <-> Cv: not allowed without an explicit converter
    pub fn compatible_with(&self, target: SignalKind) -> bool {
        match (self, target) {
            (a, b) if *a == b => true,
            (SignalKind::Any, _) | (_, SignalKind::Any) => true,
            (SignalKind::Gate, SignalKind::Cv) => true,
            (SignalKind::Cv, SignalKind::Gate) => true,
            _ => false,
        }
    }

    /// Resolves this kind against a peer at connect time.
    ///
    /// `Any` takes on the concrete peer kind; two `Any` ports stay `Any`.
    /// For concrete kinds the producer's kind wins (a gate feeding a cv
    /// input still carries a gate).
    pub fn negotiate(&self, peer: SignalKind) -> SignalKind {
        match (*self, peer) {
            (SignalKind::Any, other) => other,
            (this, _) => this,
        }
    }

    /// Returns a human-readable name for the signal kind.
    pub fn name(&self) -> &'static str {
        match self {
            SignalKind::Audio => "Audio",
            SignalKind::Cv => "CV",
            SignalKind::Gate => "Gate",
            SignalKind::Any => "Any",
        }
    }
}

/// A buffer of signal samples.
///
/// Used to pass one block of data between units in the render graph.
/// Buffers are pre-allocated so the render thread never allocates.
#[derive(Clone, Debug)]
pub struct SignalBuffer {
    /// The sample data. Length matches the engine's block size.
    pub samples: Vec<f32>,
    /// The kind of signal stored in this buffer.
    pub kind: SignalKind,
}

impl SignalBuffer {
    /// Creates a new buffer of the given size and kind, filled with zeros.
    pub fn new(size: usize, kind: SignalKind) -> Self {
        Self {
            samples: vec![0.0; size],
            kind,
        }
    }

    /// Creates a new audio buffer.
    pub fn audio(size: usize) -> Self {
        Self::new(size, SignalKind::Audio)
    }

    /// Creates a new control-voltage buffer.
    pub fn cv(size: usize) -> Self {
        Self::new(size, SignalKind::Cv)
    }

    /// Creates a new gate buffer.
    pub fn gate(size: usize) -> Self {
        Self::new(size, SignalKind::Gate)
    }

    /// Sets every sample to zero.
    pub fn clear(&mut self) {
        self.samples.fill(0.0);
    }

    /// Fills the buffer with a constant value.
    pub fn fill(&mut self, value: f32) {
        self.samples.fill(value);
    }

    /// Returns the number of samples in the buffer.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Returns true if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Resizes the buffer, zero-filling any new samples.
    pub fn resize(&mut self, new_size: usize) {
        self.samples.resize(new_size, 0.0);
    }
}
