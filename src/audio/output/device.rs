//! Hardware output through cpal
//!
//! The device pulls periods from its own real-time thread; each callback
//! hands the buffer to the session's [`OutputRenderer`].

use super::{OutputPort, PortKind};
use crate::audio::render::OutputRenderer;
use crate::config::EngineConfig;
use crate::error::{AudioError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use log::{error, warn};

pub struct DevicePort {
    stream: cpal::Stream, // kept alive
    name: String,
    rate: u32,
    channels: u16,
    running: bool,
}

// The stream is only touched from the owning session through `&mut self`.
unsafe impl Send for DevicePort {}

impl DevicePort {
    /// Open the default output device with its preferred configuration.
    ///
    /// The renderer is built for the rate and channel count the device
    /// actually accepted. The stream is left paused.
    pub fn open(
        config: &EngineConfig,
        make_renderer: &dyn Fn(u32, u16) -> OutputRenderer,
    ) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| AudioError::Device("No output audio device".into()))?;

        #[allow(deprecated)]
        let name = device.name().unwrap_or_else(|_| "default".to_string());

        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Device(format!("Failed to get default output config: {}", e)))?;

        let rate = supported.sample_rate();
        let channels = supported.channels();
        if rate != config.output_rate {
            warn!(
                "Audio device runs at {} Hz instead of the requested {} Hz",
                rate, config.output_rate
            );
        }

        let stream_config = StreamConfig {
            channels,
            sample_rate: rate,
            buffer_size: cpal::BufferSize::Default,
        };
        let renderer = make_renderer(rate, channels);

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, renderer)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, renderer)?,
            SampleFormat::I32 => build_stream::<i32>(&device, &stream_config, renderer)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, renderer)?,
            other => {
                return Err(AudioError::Device(format!(
                    "Unsupported sample format: {:?}",
                    other
                )));
            }
        };

        // Some backends start streams on creation
        let _ = stream.pause();

        Ok(Self {
            stream,
            name,
            rate,
            channels,
            running: false,
        })
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    mut renderer: OutputRenderer,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<i16>,
{
    device
        .build_output_stream(
            config,
            move |output: &mut [T], _: &cpal::OutputCallbackInfo| renderer.render(output),
            |err| error!("Audio output error: {}", err),
            None,
        )
        .map_err(|e| AudioError::Device(format!("Failed to build output stream: {}", e)))
}

impl OutputPort for DevicePort {
    fn output_rate(&self) -> u32 {
        self.rate
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn start(&mut self) -> Result<()> {
        if !self.running {
            self.stream
                .play()
                .map_err(|e| AudioError::Device(format!("Failed to start stream: {}", e)))?;
            self.running = true;
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if self.running {
            self.stream
                .pause()
                .map_err(|e| AudioError::Device(format!("Failed to pause stream: {}", e)))?;
            self.running = false;
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn kind(&self) -> PortKind {
        PortKind::Device {
            name: self.name.clone(),
        }
    }
}
