//! Engine configuration
//!
//! Defaults match a 48 kHz stereo session with a 15 ms fallback tick. A JSON
//! file can override any field; missing fields keep their defaults.

use crate::error::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// How the playback clock is credited by the output port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClockPolicy {
    /// Advance per written frame slot, catching up to sample timestamps
    #[default]
    PerSlot,
    /// Credit the clock once per output period from the last fetched sample
    PerPeriod,
}

/// Which packet timestamp stamps the decoded samples
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimestampSource {
    /// Decode timestamp when present, presentation timestamp otherwise
    #[default]
    DecodeFirst,
    /// Presentation timestamp when a decode timestamp is present, decode timestamp otherwise
    Observed,
}

impl TimestampSource {
    /// Pick the raw timestamp for a packet
    pub fn select(self, pts: Option<i64>, dts: Option<i64>) -> Option<i64> {
        match self {
            TimestampSource::DecodeFirst => dts.or(pts),
            TimestampSource::Observed => {
                if dts.is_some() {
                    pts
                } else {
                    dts
                }
            }
        }
    }
}

/// Output port selection, made once per session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Open the default output device, fall back to the ticker if that fails
    #[default]
    Auto,
    /// Always use the software ticker
    Fallback,
    /// No port; the owner drives output through `fetch_audio`
    External,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Requested output rate in Hz (the device may override it)
    pub output_rate: u32,
    /// Requested output channel count
    pub output_channels: u16,
    pub output: OutputMode,
    pub clock_policy: ClockPolicy,
    pub timestamp_source: TimestampSource,
    /// Period of the software ticker in milliseconds
    pub fallback_period_ms: u64,
    /// Accumulated clock delta that triggers a flush into the clock, in seconds
    pub clock_flush_threshold: f64,
    /// Queue bound expressed in seconds of output audio
    pub queue_capacity_secs: f64,
    /// Decode throttling threshold in seconds of queued audio
    pub prebuffer_high_water_secs: f64,
    /// Initial volume slider value in [0, 1]
    pub volume: f32,
    pub mute: bool,
    pub quick_preview: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            output_rate: 48_000,
            output_channels: 2,
            output: OutputMode::Auto,
            clock_policy: ClockPolicy::PerSlot,
            timestamp_source: TimestampSource::DecodeFirst,
            fallback_period_ms: 15,
            clock_flush_threshold: 1.0 / 120.0,
            queue_capacity_secs: 8.0,
            prebuffer_high_water_secs: 2.0,
            volume: 1.0,
            mute: false,
            quick_preview: false,
        }
    }
}

impl EngineConfig {
    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| AudioError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: EngineConfig =
            serde_json::from_str(text).map_err(|e| AudioError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.output_rate == 0 {
            return Err(AudioError::Config("output_rate must be positive".into()));
        }
        if self.output_channels == 0 {
            return Err(AudioError::Config("output_channels must be positive".into()));
        }
        if self.fallback_period_ms == 0 {
            return Err(AudioError::Config("fallback_period_ms must be positive".into()));
        }
        if !(self.clock_flush_threshold > 0.0) {
            return Err(AudioError::Config("clock_flush_threshold must be positive".into()));
        }
        if !(self.queue_capacity_secs > 0.0) {
            return Err(AudioError::Config("queue_capacity_secs must be positive".into()));
        }
        Ok(())
    }

    /// Synthetic frame count of one fallback tick at the given rate
    pub fn fallback_frames(&self, rate: u32) -> usize {
        (rate as u64 * self.fallback_period_ms / 1000).max(1) as usize
    }

    /// Queue capacity in samples at the given output rate
    pub fn queue_capacity(&self, rate: u32) -> usize {
        ((rate as f64 * self.queue_capacity_secs).ceil() as usize).max(1)
    }

    /// Decode throttling threshold in samples at the given output rate
    pub fn high_water_samples(&self, rate: u32) -> usize {
        (rate as f64 * self.prebuffer_high_water_secs).ceil() as usize
    }
}

/// Returns a version as specified in Cargo.toml
pub fn app_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn app_name() -> &'static str {
    env!("CARGO_PKG_NAME")
}
