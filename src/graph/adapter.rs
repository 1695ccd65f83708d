//! Graph wiring adapter.
//!
//! Owns the interactive-thread view of the rack: the port registry, the
//! connection graph, and a catalog of unit declarations. Every committed
//! edit is translated into the minimal command sequence and queued for the
//! render thread, which applies the whole batch at the next block boundary.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, error};

use crate::dsp::{ParameterDefinition, PortDefinition, UnitRegistry};
use crate::engine::channels::InteractiveHandle;
use crate::engine::commands::{EngineCommand, EngineEvent, PreparedUnit};

use super::connections::{ConnectError, Connection, ConnectionGraph, ConnectionId};
use super::ports::{ModuleId, PortId, PortInfo, PortRegistry, RegistryError};

/// Errors from adapter-level operations (module lifecycle, parameters).
/// Wire-level validation failures come through as `ConnectError`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AdapterError {
    #[error("unknown module type '{0}'")]
    UnknownModuleType(String),
    #[error("unknown module {0}")]
    UnknownModule(ModuleId),
    #[error("module {module} has no parameter '{id}'")]
    UnknownParameter { module: ModuleId, id: String },
    #[error("module {module} has no port '{name}'")]
    UnknownPortName { module: ModuleId, name: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Connect(#[from] ConnectError),
}

/// Interactive-side record of one module instance: its type and declared
/// surface, plus the current parameter values.
#[derive(Clone, Debug)]
pub struct ModuleEntry {
    pub type_id: &'static str,
    pub ports: Vec<PortDefinition>,
    pub parameters: Vec<ParameterDefinition>,
    /// Current values, clamped, indexed like `parameters`.
    pub values: Vec<f32>,
}

/// Translates connection-graph edits into live routing changes.
pub struct WiringAdapter {
    catalog: UnitRegistry,
    ports: PortRegistry,
    graph: ConnectionGraph,
    modules: HashMap<ModuleId, ModuleEntry>,
    /// Module ids in creation order, for deterministic iteration.
    insertion: Vec<ModuleId>,
    next_module: ModuleId,
    handle: InteractiveHandle,
    /// Stream format units are prepared for before shipping. The render
    /// graph re-prepares a unit itself if the format drifted in between.
    sample_rate: f32,
    block_size: usize,
}

impl WiringAdapter {
    /// Creates an adapter over the given unit catalog and command channel.
    /// `sample_rate` and `block_size` describe the stream the render graph
    /// was prepared for.
    pub fn new(
        catalog: UnitRegistry,
        handle: InteractiveHandle,
        sample_rate: f32,
        block_size: usize,
    ) -> Self {
        Self {
            catalog,
            ports: PortRegistry::new(),
            graph: ConnectionGraph::new(),
            modules: HashMap::new(),
            insertion: Vec::new(),
            next_module: 1,
            handle,
            sample_rate,
            block_size,
        }
    }

    /// Instantiates a module of the given type, registering its ports and
    /// shipping the unit to the render thread already built and prepared,
    /// so the audio callback only has to install it.
    pub fn add_module(&mut self, type_id: &str) -> Result<ModuleId, AdapterError> {
        let type_id = self
            .catalog
            .canonical_id(type_id)
            .ok_or_else(|| AdapterError::UnknownModuleType(type_id.to_string()))?;
        // canonical_id succeeded, so create cannot fail.
        let unit = self
            .catalog
            .create(type_id)
            .ok_or_else(|| AdapterError::UnknownModuleType(type_id.to_string()))?;

        let module = self.next_module;
        self.next_module += 1;

        let ports: Vec<PortDefinition> = unit.ports().to_vec();
        let parameters: Vec<ParameterDefinition> = unit.parameters().to_vec();
        let values: Vec<f32> = parameters.iter().map(|p| p.default).collect();
        let prepared = PreparedUnit::build(unit, self.sample_rate, self.block_size);

        for port in &ports {
            self.ports.register(PortInfo {
                id: PortId::new(module, port.id),
                direction: port.direction,
                kind: port.kind,
                default_value: port.default_value,
            })?;
        }

        self.modules.insert(
            module,
            ModuleEntry {
                type_id,
                ports,
                parameters,
                values,
            },
        );
        self.insertion.push(module);

        debug!(module, type_id, "module added");
        self.push(EngineCommand::AddModule {
            module,
            type_id,
            prepared,
        });
        Ok(module)
    }

    /// Tears down a module: severs every connection touching its ports,
    /// unregisters the ports, and schedules unit removal. The render graph
    /// silences the module's consumers in the same block that applies this.
    pub fn remove_module(&mut self, module: ModuleId) -> Result<(), AdapterError> {
        let entry = self
            .modules
            .remove(&module)
            .ok_or(AdapterError::UnknownModule(module))?;
        self.insertion.retain(|&m| m != module);

        let mut severed = 0;
        for port in &entry.ports {
            let id = PortId::new(module, port.id);
            severed += self.graph.disconnect_port(id).len();
            self.ports.unregister(id);
        }

        debug!(module, severed, "module removed");
        // RemoveModule covers route teardown on the render side; no
        // per-edge Disconnect commands are needed.
        self.push(EngineCommand::RemoveModule(module));
        Ok(())
    }

    /// Wires two ports together (either drag direction). On success the
    /// render thread receives the minimal command sequence: a `Disconnect`
    /// for a replaced cable, then the `Connect`.
    pub fn connect(&mut self, a: PortId, b: PortId) -> Result<ConnectionId, ConnectError> {
        let outcome = self.graph.connect(&self.ports, a, b)?;

        if let Some(old) = outcome.replaced {
            self.push(EngineCommand::Disconnect(old.id));
        }
        let connection = outcome.connection;
        debug!(
            id = connection.id.0,
            from = %connection.from,
            to = %connection.to,
            kind = connection.kind.name(),
            replaced = outcome.replaced.is_some(),
            "connected"
        );
        self.push(EngineCommand::Connect {
            connection: connection.id,
            from: connection.from,
            to: connection.to,
        });
        Ok(connection.id)
    }

    /// Removes a connection. Returns true if it existed.
    pub fn disconnect(&mut self, id: ConnectionId) -> bool {
        match self.graph.disconnect(id) {
            Some(connection) => {
                debug!(id = id.0, from = %connection.from, to = %connection.to, "disconnected");
                self.push(EngineCommand::Disconnect(id));
                true
            }
            None => false,
        }
    }

    /// Sets a parameter by id, clamping to its declared range. Returns the
    /// clamped value actually applied.
    pub fn set_parameter(
        &mut self,
        module: ModuleId,
        param_id: &str,
        value: f32,
    ) -> Result<f32, AdapterError> {
        let entry = self
            .modules
            .get_mut(&module)
            .ok_or(AdapterError::UnknownModule(module))?;
        let index = entry
            .parameters
            .iter()
            .position(|p| p.id == param_id)
            .ok_or_else(|| AdapterError::UnknownParameter {
                module,
                id: param_id.to_string(),
            })?;

        let clamped = entry.parameters[index].clamp(value);
        entry.values[index] = clamped;
        self.push(EngineCommand::SetParameter {
            module,
            index,
            value: clamped,
        });
        Ok(clamped)
    }

    /// Starts or stops processing.
    pub fn set_playing(&mut self, playing: bool) {
        self.push(EngineCommand::SetPlaying(playing));
    }

    /// Removes every module and connection.
    pub fn clear(&mut self) {
        self.ports = PortRegistry::new();
        self.graph = ConnectionGraph::new();
        self.modules.clear();
        self.insertion.clear();
        self.push(EngineCommand::ClearRack);
    }

    /// Resolves a port name (e.g. from a loaded patch) to a `PortId`.
    pub fn port(&self, module: ModuleId, name: &str) -> Result<PortId, AdapterError> {
        let entry = self
            .modules
            .get(&module)
            .ok_or(AdapterError::UnknownModule(module))?;
        entry
            .ports
            .iter()
            .find(|p| p.id == name)
            .map(|p| PortId::new(module, p.id))
            .ok_or_else(|| AdapterError::UnknownPortName {
                module,
                name: name.to_string(),
            })
    }

    /// The interactive-side record for a module.
    pub fn module(&self, module: ModuleId) -> Option<&ModuleEntry> {
        self.modules.get(&module)
    }

    /// Module ids in creation order.
    pub fn module_ids(&self) -> &[ModuleId] {
        &self.insertion
    }

    /// All connection ids touching a port, in creation order.
    pub fn connections_for(&self, port: PortId) -> Vec<ConnectionId> {
        self.graph.connections_for(port)
    }

    /// All active connections.
    pub fn connections(&self) -> &[Connection] {
        self.graph.connections()
    }

    /// The unit catalog this adapter instantiates from.
    pub fn catalog(&self) -> &UnitRegistry {
        &self.catalog
    }

    /// Drains pending events from the render thread.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.handle.drain_events().collect()
    }

    fn push(&mut self, cmd: EngineCommand) {
        // The queue holds 1024 commands and is drained every block; if it
        // still overflows the edit is dropped and logged rather than ever
        // blocking the interactive thread.
        if let Err(cmd) = self.handle.send_command(cmd) {
            error!(?cmd, "engine command queue full; command dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{
        DspUnit, ProcessContext, SignalBuffer, SignalKind, UnitInfo,
    };
    use crate::engine::channels::{EngineChannels, RenderHandle};

    struct TestOsc {
        ports: Vec<PortDefinition>,
        parameters: Vec<ParameterDefinition>,
    }

    impl Default for TestOsc {
        fn default() -> Self {
            Self {
                ports: vec![PortDefinition::output("out", "Out", SignalKind::Audio)],
                parameters: vec![ParameterDefinition::frequency(
                    "freq", "Frequency", 20.0, 20000.0, 440.0,
                )],
            }
        }
    }

    impl DspUnit for TestOsc {
        fn info(&self) -> &UnitInfo {
            static INFO: UnitInfo = UnitInfo {
                id: "test.osc",
                name: "Test Osc",
                description: "",
            };
            &INFO
        }
        fn ports(&self) -> &[PortDefinition] {
            &self.ports
        }
        fn parameters(&self) -> &[ParameterDefinition] {
            &self.parameters
        }
        fn prepare(&mut self, _: f32, _: usize) {}
        fn process(
            &mut self,
            _: &[SignalBuffer],
            outputs: &mut [SignalBuffer],
            _: &[f32],
            _: &ProcessContext,
        ) {
            outputs[0].clear();
        }
        fn reset(&mut self) {}
    }

    struct TestSink {
        ports: Vec<PortDefinition>,
        parameters: Vec<ParameterDefinition>,
    }

    impl Default for TestSink {
        fn default() -> Self {
            Self {
                ports: vec![
                    PortDefinition::input("in", "In", SignalKind::Audio),
                    PortDefinition::input("aux", "Aux", SignalKind::Audio),
                ],
                parameters: vec![],
            }
        }
    }

    impl DspUnit for TestSink {
        fn info(&self) -> &UnitInfo {
            static INFO: UnitInfo = UnitInfo {
                id: "test.sink",
                name: "Test Sink",
                description: "",
            };
            &INFO
        }
        fn ports(&self) -> &[PortDefinition] {
            &self.ports
        }
        fn parameters(&self) -> &[ParameterDefinition] {
            &self.parameters
        }
        fn prepare(&mut self, _: f32, _: usize) {}
        fn process(
            &mut self,
            _: &[SignalBuffer],
            _: &mut [SignalBuffer],
            _: &[f32],
            _: &ProcessContext,
        ) {
        }
        fn reset(&mut self) {}
    }

    fn test_catalog() -> UnitRegistry {
        let mut catalog = UnitRegistry::new();
        catalog.register::<TestOsc>();
        catalog.register::<TestSink>();
        catalog
    }

    fn adapter() -> (WiringAdapter, RenderHandle) {
        let (ui, render) = EngineChannels::with_defaults().split();
        (WiringAdapter::new(test_catalog(), ui, 48000.0, 64), render)
    }

    fn drain(render: &mut RenderHandle) -> Vec<EngineCommand> {
        let mut cmds = Vec::new();
        render.drain_commands(|c| cmds.push(c));
        cmds
    }

    #[test]
    fn test_add_module_registers_ports_and_sends_command() {
        let (mut adapter, mut render) = adapter();

        let osc = adapter.add_module("test.osc").unwrap();
        assert!(adapter.module(osc).is_some());
        assert_eq!(adapter.port(osc, "out").unwrap(), PortId::new(osc, "out"));

        let cmds = drain(&mut render);
        assert_eq!(cmds.len(), 1);
        match &cmds[0] {
            EngineCommand::AddModule {
                module,
                type_id,
                prepared,
            } => {
                assert_eq!(*module, osc);
                assert_eq!(*type_id, "test.osc");
                // Shipped ready to run: buffers sized for the stream, no
                // work left for the render thread.
                assert_eq!(prepared.block_size, 64);
                assert_eq!(prepared.outputs.len(), 1);
                assert_eq!(prepared.outputs[0].len(), 64);
                assert_eq!(prepared.params, vec![440.0]);
            }
            other => panic!("expected AddModule, got {:?}", other),
        }
    }

    #[test]
    fn test_add_unknown_type_fails() {
        let (mut adapter, mut render) = adapter();
        let err = adapter.add_module("no.such").unwrap_err();
        assert!(matches!(err, AdapterError::UnknownModuleType(_)));
        assert!(drain(&mut render).is_empty());
    }

    #[test]
    fn test_connect_sends_connect_command() {
        let (mut adapter, mut render) = adapter();
        let osc = adapter.add_module("test.osc").unwrap();
        let sink = adapter.add_module("test.sink").unwrap();
        drain(&mut render);

        let id = adapter
            .connect(PortId::new(osc, "out"), PortId::new(sink, "in"))
            .unwrap();

        let cmds = drain(&mut render);
        assert_eq!(cmds.len(), 1);
        assert!(matches!(
            cmds[0],
            EngineCommand::Connect { connection, .. } if connection == id
        ));
    }

    #[test]
    fn test_repatch_emits_disconnect_then_connect() {
        let (mut adapter, mut render) = adapter();
        let osc_a = adapter.add_module("test.osc").unwrap();
        let osc_b = adapter.add_module("test.osc").unwrap();
        let sink = adapter.add_module("test.sink").unwrap();

        let first = adapter
            .connect(PortId::new(osc_a, "out"), PortId::new(sink, "in"))
            .unwrap();
        drain(&mut render);

        adapter
            .connect(PortId::new(osc_b, "out"), PortId::new(sink, "in"))
            .unwrap();

        let cmds = drain(&mut render);
        assert_eq!(cmds.len(), 2);
        assert!(matches!(cmds[0], EngineCommand::Disconnect(id) if id == first));
        assert!(matches!(cmds[1], EngineCommand::Connect { .. }));
        assert_eq!(adapter.connections_for(PortId::new(sink, "in")).len(), 1);
    }

    #[test]
    fn test_remove_module_cascades_connections() {
        let (mut adapter, mut render) = adapter();
        let osc = adapter.add_module("test.osc").unwrap();
        let sink = adapter.add_module("test.sink").unwrap();

        adapter
            .connect(PortId::new(osc, "out"), PortId::new(sink, "in"))
            .unwrap();
        adapter
            .connect(PortId::new(osc, "out"), PortId::new(sink, "aux"))
            .unwrap();
        drain(&mut render);

        adapter.remove_module(osc).unwrap();

        assert!(adapter.module(osc).is_none());
        assert!(adapter.connections_for(PortId::new(sink, "in")).is_empty());
        assert!(adapter.connections_for(PortId::new(sink, "aux")).is_empty());
        // Fresh connects to the freed input must succeed again.
        let cmds = drain(&mut render);
        assert_eq!(cmds.len(), 1);
        assert!(matches!(cmds[0], EngineCommand::RemoveModule(m) if m == osc));
    }

    #[test]
    fn test_set_parameter_clamps_and_reports() {
        let (mut adapter, mut render) = adapter();
        let osc = adapter.add_module("test.osc").unwrap();
        drain(&mut render);

        let applied = adapter.set_parameter(osc, "freq", 99999.0).unwrap();
        assert_eq!(applied, 20000.0);
        assert_eq!(adapter.module(osc).unwrap().values[0], 20000.0);

        let cmds = drain(&mut render);
        assert!(matches!(
            cmds[0],
            EngineCommand::SetParameter {
                index: 0,
                value,
                ..
            } if value == 20000.0
        ));

        let err = adapter.set_parameter(osc, "nope", 1.0).unwrap_err();
        assert!(matches!(err, AdapterError::UnknownParameter { .. }));
    }

    #[test]
    fn test_clear_resets_everything() {
        let (mut adapter, mut render) = adapter();
        let osc = adapter.add_module("test.osc").unwrap();
        let sink = adapter.add_module("test.sink").unwrap();
        adapter
            .connect(PortId::new(osc, "out"), PortId::new(sink, "in"))
            .unwrap();
        drain(&mut render);

        adapter.clear();

        assert!(adapter.module_ids().is_empty());
        assert!(adapter.connections().is_empty());
        let cmds = drain(&mut render);
        assert!(matches!(cmds.last(), Some(EngineCommand::ClearRack)));
    }
}
