//! cpal output-stream lifecycle.
//!
//! Wraps device discovery, stream construction, and teardown. The render
//! loop is moved into the audio callback when the stream starts; dropping
//! the stream (or calling `stop`) tears the callback down.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use thiserror::Error;
use tracing::{error, info};

use super::render_loop::RenderLoop;

/// Errors from stream setup and control.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("unsupported output sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
    #[error("failed to query device config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build output stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start output stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
}

/// Names of the available output devices, for display.
pub fn output_device_names() -> Vec<String> {
    let host = cpal::default_host();
    host.output_devices()
        .map(|devices| {
            devices
                .filter_map(|d| d.name().ok())
                .collect()
        })
        .unwrap_or_default()
}

/// An open output device plus, once started, the running stream.
pub struct RackStream {
    device: cpal::Device,
    config: cpal::StreamConfig,
    stream: Option<cpal::Stream>,
}

impl RackStream {
    /// Opens the default output device with its default configuration.
    pub fn open() -> Result<Self, StreamError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(StreamError::NoDevice)?;
        let default = device.default_output_config()?;
        if default.sample_format() != cpal::SampleFormat::F32 {
            return Err(StreamError::UnsupportedFormat(default.sample_format()));
        }
        let config = default.config();
        info!(
            device = device.name().unwrap_or_else(|_| "<unknown>".into()),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "output device opened"
        );
        Ok(Self {
            device,
            config,
            stream: None,
        })
    }

    /// The device's sample rate in Hz.
    pub fn sample_rate(&self) -> f32 {
        self.config.sample_rate.0 as f32
    }

    /// The device's channel count.
    pub fn channels(&self) -> usize {
        self.config.channels as usize
    }

    /// Starts the stream, moving the render loop into the audio callback.
    pub fn start(&mut self, mut render_loop: RenderLoop) -> Result<(), StreamError> {
        render_loop.notify_started();
        let stream = self.device.build_output_stream(
            &self.config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                render_loop.render(data);
            },
            |err| error!(%err, "output stream error"),
            None,
        )?;
        stream.play()?;
        self.stream = Some(stream);
        info!("audio stream started");
        Ok(())
    }

    /// Stops and drops the stream. The render loop and graph go with it.
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            info!("audio stream stopped");
        }
    }

    /// Whether the stream is currently running.
    pub fn is_running(&self) -> bool {
        self.stream.is_some()
    }
}

impl Drop for RackStream {
    fn drop(&mut self) {
        self.stop();
    }
}
