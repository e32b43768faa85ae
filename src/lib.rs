//! Audio decode, buffering and master clock for lock-step A/V playback
//!
//! Decoded audio is the timing authority: the output path consumes
//! timestamped samples and advances a [`PlaybackClock`] that the video
//! renderer follows. See [`AudioEngine`] for the session-level surface.

pub mod audio;
pub mod config;
pub mod decoder;
pub mod engine;
pub mod error;
pub mod player;
pub mod utils;

pub use audio::{PlaybackClock, Sample, SampleQueue, slider_to_gain};
pub use config::EngineConfig;
pub use decoder::{AudioPacket, DecodeOutcome, TimeBase};
pub use engine::AudioEngine;
pub use error::{AudioError, Result};
