//! Port registry: the authoritative record of live signal endpoints.
//!
//! Every port a module instance exposes is registered here when the module
//! is created and removed when it is torn down. The registry is the single
//! source of truth for "does this endpoint still exist"; the connection
//! graph validates both ends of every edge against it.

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::dsp::{PortDirection, SignalKind};

/// Identifier of a module instance within a rack.
pub type ModuleId = u64;

/// Identity of a port: the owning module plus the port's static name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PortId {
    pub module: ModuleId,
    pub name: &'static str,
}

impl PortId {
    pub fn new(module: ModuleId, name: &'static str) -> Self {
        Self { module, name }
    }
}

impl fmt::Display for PortId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module {} port '{}'", self.module, self.name)
    }
}

/// A registered endpoint: identity, direction, and fixed signal kind.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PortInfo {
    pub id: PortId,
    pub direction: PortDirection,
    pub kind: SignalKind,
    /// Value an unconnected input reads. Ignored for outputs.
    pub default_value: f32,
}

/// Errors from port registration.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("{0} is already registered")]
    DuplicatePort(PortId),
}

/// Tracks every live signal endpoint.
#[derive(Default)]
pub struct PortRegistry {
    ports: HashMap<PortId, PortInfo>,
}

impl PortRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a port. Fails with `DuplicatePort` if the id is taken.
    pub fn register(&mut self, port: PortInfo) -> Result<(), RegistryError> {
        if self.ports.contains_key(&port.id) {
            return Err(RegistryError::DuplicatePort(port.id));
        }
        self.ports.insert(port.id, port);
        Ok(())
    }

    /// Removes a port. Returns true if it was registered.
    ///
    /// Severing the port's live connections is the wiring adapter's job;
    /// it owns both this registry and the connection graph and performs
    /// the cascade before calling here.
    pub fn unregister(&mut self, id: PortId) -> bool {
        self.ports.remove(&id).is_some()
    }

    /// Looks up a port by id.
    pub fn lookup(&self, id: PortId) -> Option<&PortInfo> {
        self.ports.get(&id)
    }

    /// Returns true if the port exists.
    pub fn contains(&self, id: PortId) -> bool {
        self.ports.contains_key(&id)
    }

    /// Iterates over the ports belonging to one module.
    pub fn ports_for_module(&self, module: ModuleId) -> impl Iterator<Item = &PortInfo> {
        self.ports.values().filter(move |p| p.id.module == module)
    }

    /// Total number of registered ports.
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Returns true if no ports are registered.
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}
