//! The render thread's authoritative copy of the rack.
//!
//! Owns the unit instances, their output buffers, and the routing table.
//! Commands drained at the top of a block mutate this copy; the routing
//! table and processing order are then rebuilt before any unit runs, so a
//! partial topology is never visible mid-block. Units arrive already
//! constructed and prepared (see `PreparedUnit`), rebuild scratch persists
//! between edits, and the maps are pre-sized for a typical rack, so
//! applying commands stays allocation-free until a rack outgrows that
//! capacity.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::dsp::{DspUnit, MeterReading, ProcessContext, SignalBuffer};
use crate::graph::{ConnectionId, ModuleId, PortId};

use super::buffer_pool::BufferPool;
use super::commands::{EngineCommand, PreparedUnit};

/// Module count the graph's maps and scratch are pre-sized for.
const RACK_CAPACITY: usize = 64;

/// Resolved producer of one input: which module and which of its outputs.
#[derive(Clone, Copy, Debug)]
struct RouteSource {
    module: ModuleId,
    output: usize,
}

/// One wire as the render side stores it, still in port-name form.
#[derive(Clone, Copy, Debug)]
struct Route {
    id: ConnectionId,
    from: PortId,
    to: PortId,
}

/// A live unit plus its per-instance processing state.
struct UnitSlot {
    unit: Box<dyn DspUnit>,
    /// Current parameter values, indexed like the unit's declaration.
    params: Vec<f32>,
    /// Scratch input buffers, one per input port, refilled every block.
    inputs: Vec<SignalBuffer>,
    /// Value each input reads while unconnected.
    input_defaults: Vec<f32>,
    /// Resolved producer per input port. Rebuilt on topology edits.
    sources: Vec<Option<RouteSource>>,
}

/// The processing graph run by the render loop.
pub struct RenderGraph {
    units: HashMap<ModuleId, UnitSlot>,
    routes: Vec<Route>,
    /// Processing order. Modules caught in a cycle are appended in
    /// insertion order and read their producers' previous block.
    order: Vec<ModuleId>,
    /// Module ids in creation order, for deterministic rebuilds.
    insertion: Vec<ModuleId>,
    pool: BufferPool,
    context: ProcessContext,
    /// Largest block every buffer is sized for; `context.block_size` may
    /// run below this when the host delivers smaller buffers.
    max_block_size: usize,
    playing: bool,
    dirty: bool,
    /// Scratch for `rebuild`, kept between edits so rebuilds reuse their
    /// allocations.
    edge_scratch: Vec<(ModuleId, ModuleId)>,
    indegree: HashMap<ModuleId, usize>,
    placed: HashMap<ModuleId, bool>,
}

impl RenderGraph {
    /// Creates an empty graph for the given stream format. `block_size` is
    /// the largest block the graph will process without re-preparing.
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            units: HashMap::with_capacity(RACK_CAPACITY),
            routes: Vec::with_capacity(RACK_CAPACITY * 2),
            order: Vec::with_capacity(RACK_CAPACITY),
            insertion: Vec::with_capacity(RACK_CAPACITY),
            pool: BufferPool::new(block_size),
            context: ProcessContext::new(sample_rate, block_size),
            max_block_size: block_size,
            playing: true,
            dirty: false,
            edge_scratch: Vec::with_capacity(RACK_CAPACITY * 2),
            indegree: HashMap::with_capacity(RACK_CAPACITY),
            placed: HashMap::with_capacity(RACK_CAPACITY),
        }
    }

    /// Applies one command. Called while draining the queue at the top of
    /// a block, before any unit processes.
    pub fn apply_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::AddModule {
                module,
                type_id,
                prepared,
            } => self.add_module(module, type_id, prepared),
            EngineCommand::RemoveModule(module) => self.remove_module(module),
            EngineCommand::Connect {
                connection,
                from,
                to,
            } => {
                // Mono-input semantics: a route arriving for an occupied
                // input replaces it even without an explicit disconnect.
                self.routes.retain(|r| r.to != to);
                self.routes.push(Route {
                    id: connection,
                    from,
                    to,
                });
                self.dirty = true;
            }
            EngineCommand::Disconnect(id) => {
                self.routes.retain(|r| r.id != id);
                self.dirty = true;
            }
            EngineCommand::SetParameter {
                module,
                index,
                value,
            } => {
                if let Some(slot) = self.units.get_mut(&module) {
                    if let Some(def) = slot.unit.parameters().get(index) {
                        slot.params[index] = def.clamp(value);
                    } else {
                        warn!(module, index, "parameter index out of range");
                    }
                }
            }
            EngineCommand::SetPlaying(playing) => {
                self.playing = playing;
            }
            EngineCommand::ClearRack => {
                self.units.clear();
                self.routes.clear();
                self.order.clear();
                self.insertion.clear();
                self.pool.clear_pool();
                self.dirty = false;
            }
        }
    }

    fn add_module(&mut self, module: ModuleId, type_id: &'static str, prepared: PreparedUnit) {
        let PreparedUnit {
            mut unit,
            sample_rate,
            block_size,
            params,
            mut inputs,
            input_defaults,
            mut outputs,
        } = prepared;

        // The adapter sized everything for the format it last knew. If the
        // stream format drifted since, rebuild here; this is the same rare
        // window in which `set_stream_format` itself reallocates.
        if block_size != self.max_block_size
            || (sample_rate - self.context.sample_rate).abs() > f32::EPSILON
        {
            unit.prepare(self.context.sample_rate, self.max_block_size);
            for buffer in inputs.iter_mut().chain(outputs.iter_mut()) {
                buffer.resize(self.max_block_size);
            }
        }

        let source_count = inputs.len();
        self.pool.insert(module, outputs);
        self.units.insert(
            module,
            UnitSlot {
                unit,
                params,
                inputs,
                input_defaults,
                sources: vec![None; source_count],
            },
        );
        self.insertion.push(module);
        self.dirty = true;
        debug!(module, type_id, "unit added");
    }

    fn remove_module(&mut self, module: ModuleId) {
        self.units.remove(&module);
        self.pool.deallocate(module);
        self.routes
            .retain(|r| r.from.module != module && r.to.module != module);
        self.insertion.retain(|&m| m != module);
        self.dirty = true;
        debug!(module, "unit removed");
    }

    /// Processes one block. Rebuilds routing first if the topology changed
    /// since the previous block.
    pub fn process(&mut self) {
        if self.dirty {
            self.rebuild();
        }
        if !self.playing {
            return;
        }
        let ctx = self.context;
        for i in 0..self.order.len() {
            let module = self.order[i];
            self.process_module(module, &ctx);
        }
    }

    fn process_module(&mut self, module: ModuleId, ctx: &ProcessContext) {
        let Self { units, pool, .. } = self;
        let Some(slot) = units.get_mut(&module) else {
            return;
        };
        // Gather before taking this module's own outputs, so a self-edge
        // reads the previous block instead of the input default.
        for i in 0..slot.sources.len() {
            match slot.sources[i] {
                Some(src) => match pool.get(src.module, src.output) {
                    Some(buf) => slot.inputs[i].samples.copy_from_slice(&buf.samples),
                    None => slot.inputs[i].fill(slot.input_defaults[i]),
                },
                None => slot.inputs[i].fill(slot.input_defaults[i]),
            }
        }
        let Some(mut outputs) = pool.take(module) else {
            return;
        };
        slot.unit
            .process(&slot.inputs, &mut outputs, &slot.params, ctx);
        pool.restore(module, outputs);
    }

    /// Re-resolves every input's producer and recomputes the processing
    /// order (Kahn's algorithm; cycle members are appended in insertion
    /// order, giving cycle-closing edges one block of delay).
    fn rebuild(&mut self) {
        for slot in self.units.values_mut() {
            slot.sources.iter_mut().for_each(|s| *s = None);
        }

        for route in &self.routes {
            let src_output = self
                .units
                .get(&route.from.module)
                .and_then(|s| output_index(&*s.unit, route.from.name));
            let Some(output) = src_output else { continue };
            let Some(slot) = self.units.get_mut(&route.to.module) else {
                continue;
            };
            if let Some(input) = input_index(&*slot.unit, route.to.name) {
                slot.sources[input] = Some(RouteSource {
                    module: route.from.module,
                    output,
                });
            }
        }

        let Self {
            units,
            routes,
            order,
            insertion,
            edge_scratch,
            indegree,
            placed,
            ..
        } = self;

        // Module-level edges, self-edges excluded (a module feeding its
        // own sibling port imposes no ordering).
        edge_scratch.clear();
        edge_scratch.extend(
            routes
                .iter()
                .filter(|r| r.from.module != r.to.module)
                .filter(|r| units.contains_key(&r.from.module) && units.contains_key(&r.to.module))
                .map(|r| (r.from.module, r.to.module)),
        );

        indegree.clear();
        placed.clear();
        for &m in insertion.iter() {
            indegree.insert(m, 0);
            placed.insert(m, false);
        }
        for &(_, to) in edge_scratch.iter() {
            if let Some(d) = indegree.get_mut(&to) {
                *d += 1;
            }
        }

        order.clear();
        loop {
            // First unplaced module with no unresolved producers, scanned
            // in insertion order for determinism.
            let next = insertion
                .iter()
                .copied()
                .find(|m| !placed[m] && indegree[m] == 0);
            let Some(module) = next else { break };
            placed.insert(module, true);
            order.push(module);
            for &(from, to) in edge_scratch.iter() {
                if from == module {
                    if let Some(d) = indegree.get_mut(&to) {
                        *d = d.saturating_sub(1);
                    }
                }
            }
        }
        let mut cyclic = 0;
        for &module in insertion.iter() {
            if !placed[&module] {
                order.push(module);
                cyclic += 1;
            }
        }
        if cyclic > 0 {
            debug!(cyclic, "cycle detected; members run in insertion order");
        }

        self.dirty = false;
        debug!(
            modules = self.order.len(),
            routes = self.routes.len(),
            "routing rebuilt"
        );
    }

    /// Mixes every terminal unit's stereo frames into an interleaved
    /// hardware buffer. The caller zeroes the buffer first.
    pub fn mix_into(&self, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for slot in self.units.values() {
            if let Some((left, right)) = slot.unit.stereo_frames() {
                for (frame, (&l, &r)) in out
                    .chunks_exact_mut(channels)
                    .zip(left.iter().zip(right.iter()))
                {
                    if channels == 1 {
                        frame[0] += 0.5 * (l + r);
                    } else {
                        frame[0] += l;
                        frame[1] += r;
                    }
                }
            }
        }
    }

    /// Collects due meter reports from terminal units.
    pub fn collect_meter_readings<F>(&mut self, mut f: F)
    where
        F: FnMut(MeterReading),
    {
        for slot in self.units.values_mut() {
            if let Some(reading) = slot.unit.meter_reading() {
                f(reading);
            }
        }
    }

    /// Re-prepares everything for a new stream format. Reallocates; only
    /// for host buffers that outgrow the prepared maximum.
    pub fn set_stream_format(&mut self, sample_rate: f32, block_size: usize) {
        self.context = ProcessContext::new(sample_rate, block_size);
        self.max_block_size = block_size;
        self.pool.resize_all(block_size);
        for slot in self.units.values_mut() {
            slot.unit.prepare(sample_rate, block_size);
            for input in &mut slot.inputs {
                input.resize(block_size);
            }
        }
    }

    /// Runs subsequent blocks at a smaller frame count without touching
    /// any allocation. Clamped to the prepared maximum.
    pub fn set_block_frames(&mut self, frames: usize) {
        self.context.block_size = frames.min(self.max_block_size);
    }

    /// Largest block the graph can process without re-preparing.
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Whether processing is currently enabled.
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// The stream format the graph was prepared for.
    pub fn context(&self) -> ProcessContext {
        self.context
    }

    /// Number of live units.
    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Reads one module's output buffer for the block just processed.
    pub fn output_buffer(&self, module: ModuleId, output_index: usize) -> Option<&SignalBuffer> {
        self.pool.get(module, output_index)
    }
}

fn input_index(unit: &dyn DspUnit, name: &str) -> Option<usize> {
    unit.ports()
        .iter()
        .filter(|p| p.is_input())
        .position(|p| p.id == name)
}

fn output_index(unit: &dyn DspUnit, name: &str) -> Option<usize> {
    unit.ports()
        .iter()
        .filter(|p| p.is_output())
        .position(|p| p.id == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::{
        ParameterDefinition, PortDefinition, SignalKind, UnitInfo, UnitRegistry,
    };
    use crate::graph::ConnectionId;

    /// Emits a constant set by its only parameter.
    struct Constant {
        ports: Vec<PortDefinition>,
        parameters: Vec<ParameterDefinition>,
    }

    impl Default for Constant {
        fn default() -> Self {
            Self {
                ports: vec![PortDefinition::output("out", "Out", SignalKind::Audio)],
                parameters: vec![ParameterDefinition::new(
                    "level",
                    "Level",
                    -10.0,
                    10.0,
                    0.5,
                    "",
                    crate::dsp::UpdateRate::PerBlock,
                )],
            }
        }
    }

    impl DspUnit for Constant {
        fn info(&self) -> &UnitInfo {
            static INFO: UnitInfo = UnitInfo {
                id: "test.constant",
                name: "Constant",
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
            params: &[f32],
            _: &ProcessContext,
        ) {
            outputs[0].fill(params[0]);
        }
        fn reset(&mut self) {}
    }

    /// Doubles its input.
    struct Doubler {
        ports: Vec<PortDefinition>,
        parameters: Vec<ParameterDefinition>,
    }

    impl Default for Doubler {
        fn default() -> Self {
            Self {
                ports: vec![
                    PortDefinition::input("in", "In", SignalKind::Audio),
                    PortDefinition::output("out", "Out", SignalKind::Audio),
                ],
                parameters: vec![],
            }
        }
    }

    impl DspUnit for Doubler {
        fn info(&self) -> &UnitInfo {
            static INFO: UnitInfo = UnitInfo {
                id: "test.doubler",
                name: "Doubler",
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
            inputs: &[SignalBuffer],
            outputs: &mut [SignalBuffer],
            _: &[f32],
            _: &ProcessContext,
        ) {
            for (out, &inp) in outputs[0]
                .samples
                .iter_mut()
                .zip(inputs[0].samples.iter())
            {
                *out = inp * 2.0;
            }
        }
        fn reset(&mut self) {}
    }

    fn registry() -> UnitRegistry {
        let mut registry = UnitRegistry::new();
        registry.register::<Constant>();
        registry.register::<Doubler>();
        registry
    }

    fn graph() -> RenderGraph {
        RenderGraph::new(48000.0, 16)
    }

    fn add(g: &mut RenderGraph, module: ModuleId, type_id: &'static str) {
        let unit = registry().create(type_id).unwrap();
        g.apply_command(EngineCommand::AddModule {
            module,
            type_id,
            prepared: PreparedUnit::build(unit, 48000.0, 16),
        });
    }

    fn port(module: ModuleId, name: &'static str) -> PortId {
        PortId::new(module, name)
    }

    fn connect(g: &mut RenderGraph, id: u64, from: PortId, to: PortId) {
        g.apply_command(EngineCommand::Connect {
            connection: ConnectionId(id),
            from,
            to,
        });
    }

    #[test]
    fn test_chain_processes_in_one_block() {
        let mut g = graph();
        add(&mut g, 1, "test.constant");
        add(&mut g, 2, "test.doubler");
        connect(&mut g, 1, port(1, "out"), port(2, "in"));

        g.process();

        let out = g.output_buffer(2, 0).unwrap();
        assert!(out.samples.iter().all(|&s| (s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_order_is_producer_first_regardless_of_insertion() {
        let mut g = graph();
        // Consumer added before producer; one block must still carry the
        // signal end to end.
        add(&mut g, 1, "test.doubler");
        add(&mut g, 2, "test.constant");
        connect(&mut g, 1, port(2, "out"), port(1, "in"));

        g.process();
        let out = g.output_buffer(1, 0).unwrap();
        assert!(out.samples.iter().all(|&s| (s - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_removing_producer_silences_consumer_same_drain() {
        let mut g = graph();
        add(&mut g, 1, "test.constant");
        add(&mut g, 2, "test.doubler");
        connect(&mut g, 1, port(1, "out"), port(2, "in"));
        g.process();
        assert!(g.output_buffer(2, 0).unwrap().samples[0] > 0.0);

        g.apply_command(EngineCommand::RemoveModule(1));
        g.process();
        let out = g.output_buffer(2, 0).unwrap();
        assert!(out.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_disconnect_restores_default_input() {
        let mut g = graph();
        add(&mut g, 1, "test.constant");
        add(&mut g, 2, "test.doubler");
        connect(&mut g, 7, port(1, "out"), port(2, "in"));
        g.process();

        g.apply_command(EngineCommand::Disconnect(ConnectionId(7)));
        g.process();
        assert!(g
            .output_buffer(2, 0)
            .unwrap()
            .samples
            .iter()
            .all(|&s| s == 0.0));
    }

    #[test]
    fn test_connect_to_occupied_input_replaces() {
        let mut g = graph();
        add(&mut g, 1, "test.constant");
        add(&mut g, 2, "test.constant");
        add(&mut g, 3, "test.doubler");
        g.apply_command(EngineCommand::SetParameter {
            module: 2,
            index: 0,
            value: 2.0,
        });
        connect(&mut g, 1, port(1, "out"), port(3, "in"));
        connect(&mut g, 2, port(2, "out"), port(3, "in"));

        g.process();
        let out = g.output_buffer(3, 0).unwrap();
        assert!(out.samples.iter().all(|&s| (s - 4.0).abs() < 1e-6));
    }

    #[test]
    fn test_cycle_does_not_hang_and_stays_bounded() {
        let mut g = graph();
        add(&mut g, 1, "test.doubler");
        add(&mut g, 2, "test.doubler");
        connect(&mut g, 1, port(1, "out"), port(2, "in"));
        connect(&mut g, 2, port(2, "out"), port(1, "in"));

        for _ in 0..4 {
            g.process();
        }
        // Zero input through a cycle of gain stages stays zero.
        assert!(g
            .output_buffer(1, 0)
            .unwrap()
            .samples
            .iter()
            .all(|&s| s == 0.0));
    }

    #[test]
    fn test_self_edge_reads_previous_block() {
        let mut g = graph();
        add(&mut g, 1, "test.constant");
        add(&mut g, 2, "test.doubler");
        connect(&mut g, 1, port(1, "out"), port(2, "in"));
        g.process();
        assert!((g.output_buffer(2, 0).unwrap().samples[0] - 1.0).abs() < 1e-6);

        // Replace the feed with a self loop; each block must double the
        // previous block's output, not restart from the input default.
        connect(&mut g, 2, port(2, "out"), port(2, "in"));
        g.process();
        assert!((g.output_buffer(2, 0).unwrap().samples[0] - 2.0).abs() < 1e-6);
        g.process();
        assert!((g.output_buffer(2, 0).unwrap().samples[0] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_set_parameter_is_clamped() {
        let mut g = graph();
        add(&mut g, 1, "test.constant");
        g.apply_command(EngineCommand::SetParameter {
            module: 1,
            index: 0,
            value: 50.0,
        });
        g.process();
        let out = g.output_buffer(1, 0).unwrap();
        assert!(out.samples.iter().all(|&s| (s - 10.0).abs() < 1e-6));
    }

    #[test]
    fn test_stopped_graph_keeps_last_buffers() {
        let mut g = graph();
        add(&mut g, 1, "test.constant");
        g.apply_command(EngineCommand::SetPlaying(false));
        g.process();
        assert!(!g.is_playing());
    }

    #[test]
    fn test_clear_rack() {
        let mut g = graph();
        add(&mut g, 1, "test.constant");
        g.apply_command(EngineCommand::ClearRack);
        assert_eq!(g.unit_count(), 0);
        g.process();
    }

    #[test]
    fn test_stale_prepared_buffers_are_resized() {
        let mut g = graph();
        // Built for a different block size than the graph runs at, as if
        // the stream format changed between snapshot and drain.
        let unit = registry().create("test.constant").unwrap();
        g.apply_command(EngineCommand::AddModule {
            module: 1,
            type_id: "test.constant",
            prepared: PreparedUnit::build(unit, 48000.0, 64),
        });
        g.process();
        let out = g.output_buffer(1, 0).unwrap();
        assert_eq!(out.len(), 16);
        assert!(out.samples.iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_smaller_host_block_runs_without_resizing() {
        let mut g = graph();
        add(&mut g, 1, "test.constant");
        g.set_block_frames(8);
        g.process();
        assert_eq!(g.context().block_size, 8);
        // Buffers keep their prepared size.
        assert_eq!(g.output_buffer(1, 0).unwrap().len(), 16);
        assert_eq!(g.max_block_size(), 16);
    }
}
