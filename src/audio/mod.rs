//! Audio buffering, clock and output
//!
//! The decode context fills a [`SampleQueue`]; an [`OutputPort`] drains it in
//! fixed periods, applies gain, and advances the [`PlaybackClock`] that the
//! video renderer follows.

pub mod clock;
pub mod controls;
pub mod fetch;
pub mod health;
pub mod output;
pub mod queue;
pub mod render;
pub mod sample;
pub mod seek;

pub use clock::PlaybackClock;
pub use controls::PlaybackControls;
pub use fetch::AudioFetcher;
pub use health::{EngineHealth, HealthSummary};
pub use output::{OutputPort, PortKind};
pub use queue::SampleQueue;
pub use render::{OutputRenderer, SlotRenderer};
pub use sample::{Sample, slider_to_gain};
pub use seek::SeekController;

use std::sync::Arc;

/// Handles shared between the decode, control and output contexts
#[derive(Clone, Debug)]
pub struct AudioShared {
    pub queue: Arc<SampleQueue>,
    pub clock: PlaybackClock,
    pub controls: Arc<PlaybackControls>,
    pub seek: Arc<SeekController>,
    pub health: Arc<EngineHealth>,
}

impl AudioShared {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            queue: Arc::new(SampleQueue::new(queue_capacity)),
            clock: PlaybackClock::new(),
            controls: Arc::new(PlaybackControls::new()),
            seek: Arc::new(SeekController::new()),
            health: Arc::new(EngineHealth::new()),
        }
    }
}
