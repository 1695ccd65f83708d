//! Connection graph: the set of active wires between ports.
//!
//! Edges always run output -> input. Each input holds at most one incoming
//! edge (re-patching replaces it); outputs fan out freely. No cycle
//! detection is performed across modules: the render graph treats the
//! topology as a per-block snapshot, so a cross-module feedback loop reads
//! the producer's previous block rather than being rejected.

use thiserror::Error;

use crate::dsp::{PortDirection, SignalKind};

use super::ports::{PortId, PortRegistry};

/// Opaque identity of a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

/// A wire between an output port and an input port.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Connection {
    pub id: ConnectionId,
    /// Always an output port.
    pub from: PortId,
    /// Always an input port.
    pub to: PortId,
    /// Negotiated signal kind (`Any` ends resolved at connect time).
    pub kind: SignalKind,
}

/// Errors surfaced by `connect`. The graph is left unchanged on failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConnectError {
    #[error("unknown port: {0}")]
    UnknownPort(PortId),
    #[error("a port cannot be connected to itself")]
    SelfConnection,
    #[error("both ports are {0}s")]
    DirectionMismatch(&'static str),
    #[error("cannot carry {from} into a {to} input")]
    KindMismatch {
        from: &'static str,
        to: &'static str,
    },
}

/// Result of a successful `connect`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectOutcome {
    /// The new edge.
    pub connection: Connection,
    /// The edge that previously fed the input, if re-patching replaced one.
    pub replaced: Option<Connection>,
}

/// Maintains the set of active wires.
#[derive(Default)]
pub struct ConnectionGraph {
    connections: Vec<Connection>,
    next_id: u64,
}

impl ConnectionGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wires two ports together after validating against the registry.
    ///
    /// Validation order: both ports exist; the ports are distinct; one end
    /// is an output and the other an input (a reversed drag is corrected by
    /// swapping, not rejected); the kinds are compatible. A module feeding
    /// its own sibling port is legal. If the input already has an incoming
    /// edge it is silently replaced, modeling re-patching a cable.
    pub fn connect(
        &mut self,
        registry: &PortRegistry,
        a: PortId,
        b: PortId,
    ) -> Result<ConnectOutcome, ConnectError> {
        let port_a = registry
            .lookup(a)
            .copied()
            .ok_or(ConnectError::UnknownPort(a))?;
        let port_b = registry
            .lookup(b)
            .copied()
            .ok_or(ConnectError::UnknownPort(b))?;

        if a == b {
            return Err(ConnectError::SelfConnection);
        }

        // Accept a drag from either end: orient the edge output -> input.
        let (from, to) = match (port_a.direction, port_b.direction) {
            (PortDirection::Output, PortDirection::Input) => (port_a, port_b),
            (PortDirection::Input, PortDirection::Output) => (port_b, port_a),
            (PortDirection::Output, PortDirection::Output) => {
                return Err(ConnectError::DirectionMismatch("output"));
            }
            (PortDirection::Input, PortDirection::Input) => {
                return Err(ConnectError::DirectionMismatch("input"));
            }
        };

        if !from.kind.compatible_with(to.kind) {
            return Err(ConnectError::KindMismatch {
                from: from.kind.name(),
                to: to.kind.name(),
            });
        }

        let kind = from.kind.negotiate(to.kind);

        let replaced = self.incoming(to.id).copied();
        if let Some(old) = replaced {
            self.connections.retain(|c| c.id != old.id);
        }

        let connection = Connection {
            id: ConnectionId(self.next_id),
            from: from.id,
            to: to.id,
            kind,
        };
        self.next_id += 1;
        self.connections.push(connection);

        Ok(ConnectOutcome {
            connection,
            replaced,
        })
    }

    /// Removes an edge by id, returning it if it existed.
    pub fn disconnect(&mut self, id: ConnectionId) -> Option<Connection> {
        let index = self.connections.iter().position(|c| c.id == id)?;
        Some(self.connections.remove(index))
    }

    /// Removes every edge touching a port, returning them in insertion
    /// order. Used when an endpoint disappears.
    pub fn disconnect_port(&mut self, port: PortId) -> Vec<Connection> {
        let (severed, kept): (Vec<_>, Vec<_>) = self
            .connections
            .iter()
            .copied()
            .partition(|c| c.from == port || c.to == port);
        self.connections = kept;
        severed
    }

    /// The edge currently feeding an input port, if any.
    pub fn incoming(&self, port: PortId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.to == port)
    }

    /// All edge ids touching a port, in insertion order.
    pub fn connections_for(&self, port: PortId) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|c| c.from == port || c.to == port)
            .map(|c| c.id)
            .collect()
    }

    /// Looks up an edge by id.
    pub fn get(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    /// All edges, in insertion order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Number of active edges.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Returns true if no edges exist.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}
