//! Output port abstraction
//!
//! A port owns the period driver of a session: either the hardware device's
//! pull callback or a fixed-period software ticker when no device can be
//! opened. The choice is made once, in [`open_output_port`].

mod device;
mod fallback;

pub use device::DevicePort;
pub use fallback::FallbackTicker;

use super::render::OutputRenderer;
use super::AudioShared;
use crate::config::{EngineConfig, OutputMode};
use crate::error::Result;
use log::{info, warn};

/// What is driving the output periods
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortKind {
    Device { name: String },
    Fallback,
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortKind::Device { name } => write!(f, "device \"{}\"", name),
            PortKind::Fallback => write!(f, "fallback ticker"),
        }
    }
}

/// Period driver for one session
pub trait OutputPort: Send {
    /// Frames per second delivered to the output
    fn output_rate(&self) -> u32;

    fn channel_count(&self) -> u16;

    /// Begin invoking the renderer
    fn start(&mut self) -> Result<()>;

    /// Stop invoking the renderer; a stopped port can be started again
    fn stop(&mut self) -> Result<()>;

    fn is_running(&self) -> bool;

    fn kind(&self) -> PortKind;
}

/// Open the port for a session.
///
/// Returns `None` for [`OutputMode::External`]. In [`OutputMode::Auto`] a
/// device failure is logged and the fallback ticker is used instead. Ports
/// are returned stopped.
pub fn open_output_port(config: &EngineConfig, shared: &AudioShared) -> Option<Box<dyn OutputPort>> {
    let make_renderer = |rate: u32, channels: u16| {
        OutputRenderer::new(
            config.clock_policy,
            shared.clone(),
            rate,
            channels,
            config.clock_flush_threshold,
        )
    };

    match config.output {
        OutputMode::External => None,
        OutputMode::Fallback => Some(Box::new(FallbackTicker::from_config(config, &make_renderer))),
        OutputMode::Auto => match DevicePort::open(config, &make_renderer) {
            Ok(port) => {
                info!(
                    "Audio output: {} at {} Hz, {} channels",
                    port.kind(),
                    port.output_rate(),
                    port.channel_count()
                );
                Some(Box::new(port))
            }
            Err(e) => {
                warn!("Could not open audio output ({}), using fallback ticker", e);
                Some(Box::new(FallbackTicker::from_config(config, &make_renderer)))
            }
        },
    }
}
