//! Interactive-thread view of the rack: ports, connections, and the
//! wiring adapter that forwards committed edits to the render thread.

pub mod adapter;
pub mod connections;
pub mod ports;

pub use adapter::{AdapterError, ModuleEntry, WiringAdapter};
pub use connections::{ConnectError, Connection, ConnectionGraph, ConnectionId};
pub use ports::{ModuleId, PortId, PortInfo, PortRegistry, RegistryError};
