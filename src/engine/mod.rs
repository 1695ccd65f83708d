//! Real-time render side: commands, channels, buffers, graph, loop, and
//! the cpal stream wrapper.

pub mod buffer_pool;
pub mod channels;
pub mod commands;
pub mod render_graph;
pub mod render_loop;
pub mod stream;

pub use buffer_pool::BufferPool;
pub use channels::{EngineChannels, InteractiveHandle, RenderHandle};
pub use commands::{EngineCommand, EngineEvent, PreparedUnit};
pub use render_graph::RenderGraph;
pub use render_loop::RenderLoop;
pub use stream::{output_device_names, RackStream, StreamError};

use crate::dsp::UnitRegistry;
use crate::graph::WiringAdapter;

/// Largest block the render graph is prepared for up front. Hosts that
/// deliver smaller buffers run partial blocks; a larger host buffer forces
/// a one-time re-prepare in the first callback.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Opens the default output device and starts a complete engine: returns
/// the wiring adapter for the interactive thread and the running stream.
/// Dropping (or stopping) the stream tears the render thread down.
pub fn start_engine(catalog: UnitRegistry) -> Result<(WiringAdapter, RackStream), StreamError> {
    let mut stream = RackStream::open()?;
    let (ui, render) = EngineChannels::with_defaults().split();
    let sample_rate = stream.sample_rate();
    let graph = RenderGraph::new(sample_rate, DEFAULT_BLOCK_SIZE);
    let render_loop = RenderLoop::new(graph, render, stream.channels());
    stream.start(render_loop)?;
    Ok((
        WiringAdapter::new(catalog, ui, sample_rate, DEFAULT_BLOCK_SIZE),
        stream,
    ))
}
