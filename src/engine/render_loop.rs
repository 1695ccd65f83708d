//! The render loop: the body of the real-time audio callback.
//!
//! Per callback: drain pending commands (the atomic topology swap point),
//! process the graph, mix terminal units into the hardware buffer, and
//! emit rate-limited meter and load reports. Never blocks; a missed
//! deadline is logged, not retried.

use std::time::Instant;

use tracing::warn;

use super::channels::RenderHandle;
use super::commands::EngineEvent;
use super::render_graph::RenderGraph;

/// Reports per second for meter and CPU-load events.
const REPORTS_PER_SECOND: f32 = 60.0;

/// Smoothing factor for the CPU-load estimate (EMA weight of the newest
/// callback).
const CPU_LOAD_SMOOTHING: f32 = 0.3;

/// Owns the render graph and the render side of the channels; `render` is
/// called from the audio callback for every hardware buffer.
pub struct RenderLoop {
    graph: RenderGraph,
    handle: RenderHandle,
    channels: usize,
    samples_since_report: usize,
    report_interval: usize,
    cpu_load: f32,
}

impl RenderLoop {
    /// Creates a render loop for a stream with the given channel count.
    pub fn new(graph: RenderGraph, handle: RenderHandle, channels: usize) -> Self {
        let sample_rate = graph.context().sample_rate;
        Self {
            graph,
            handle,
            channels: channels.max(1),
            samples_since_report: 0,
            report_interval: (sample_rate / REPORTS_PER_SECOND) as usize,
            cpu_load: 0.0,
        }
    }

    /// Announces stream start to the interactive thread. Called once by
    /// the stream wrapper before the callback starts firing.
    pub fn notify_started(&mut self) {
        let sample_rate = self.graph.context().sample_rate;
        self.handle
            .send_event_lossy(EngineEvent::Started { sample_rate });
    }

    /// Announces stream teardown.
    pub fn notify_stopped(&mut self) {
        self.handle.send_event_lossy(EngineEvent::Stopped);
    }

    /// Renders one hardware buffer of interleaved frames.
    pub fn render(&mut self, output: &mut [f32]) {
        let started = Instant::now();
        let Self {
            graph,
            handle,
            channels,
            ..
        } = self;
        let channels = *channels;
        let frames = output.len() / channels;
        if frames == 0 {
            return;
        }

        // Host buffer size changed. Within the prepared maximum this is a
        // frame-count adjustment only; growing past it forces a one-time
        // re-prepare, which reallocates.
        let ctx = graph.context();
        if frames != ctx.block_size {
            if frames <= graph.max_block_size() {
                graph.set_block_frames(frames);
            } else {
                warn!(frames, "host buffer outgrew the prepared block size");
                graph.set_stream_format(ctx.sample_rate, frames);
            }
        }

        // Command drain: the one point where a new topology becomes
        // visible. Everything after this sees a consistent snapshot.
        handle.drain_commands(|cmd| graph.apply_command(cmd));

        output.fill(0.0);
        graph.process();
        if graph.is_playing() {
            graph.mix_into(output, channels);
        }

        self.samples_since_report += frames;
        if self.samples_since_report >= self.report_interval {
            self.samples_since_report = 0;
            let handle = &mut self.handle;
            self.graph
                .collect_meter_readings(|r| handle.send_event_lossy(EngineEvent::Meter(r)));
            handle.send_event_lossy(EngineEvent::CpuLoad(self.cpu_load));
        }

        let budget = frames as f32 / self.graph.context().sample_rate;
        let load = started.elapsed().as_secs_f32() / budget;
        self.cpu_load += CPU_LOAD_SMOOTHING * (load - self.cpu_load);
        if load > 1.0 {
            warn!(load, frames, "render block overran its deadline");
        }
    }

    /// The graph, for inspection in tests and diagnostics.
    pub fn graph(&self) -> &RenderGraph {
        &self.graph
    }

    /// Smoothed fraction of the deadline spent processing.
    pub fn cpu_load(&self) -> f32 {
        self.cpu_load
    }
}
