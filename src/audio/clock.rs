//! Master playback clock derived from audio consumption
//!
//! The clock holds the current media time in seconds plus the measured
//! interval between decoded audio frames. Only the output path (device
//! callback, fallback ticker or an explicit `fetch_audio`) advances it;
//! the control context repositions it on seek and the renderer reads it to
//! pick the due video frame.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free media clock
///
/// Values are `f64` stored as bits in atomics so the real-time side can
/// update the clock without locking. Cloning shares the same clock.
#[derive(Clone)]
pub struct PlaybackClock {
    /// Current media time (seconds, f64 bits)
    time: Arc<AtomicU64>,

    /// Measured time between consecutive decoded audio frames (seconds, f64 bits)
    frame_interval: Arc<AtomicU64>,

    /// Bumped on every reposition
    epoch: Arc<AtomicU64>,
}

impl PlaybackClock {
    /// Create a clock at media time zero
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(seconds: f64) -> Self {
        Self {
            time: Arc::new(AtomicU64::new(seconds.to_bits())),
            frame_interval: Arc::new(AtomicU64::new(0f64.to_bits())),
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Current media time in seconds
    pub fn time(&self) -> f64 {
        f64::from_bits(self.time.load(Ordering::Acquire))
    }

    /// Advance the clock by `delta` seconds.
    ///
    /// Negative or non-finite deltas are ignored: the clock only moves
    /// backwards through [`PlaybackClock::set_time`].
    pub fn add_time(&self, delta: f64) {
        if !delta.is_finite() || delta <= 0.0 {
            return;
        }
        let _ = self
            .time
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f64::from_bits(bits) + delta).to_bits())
            });
    }

    /// Advance the clock by `delta` unless it was repositioned since `epoch`
    /// was read. Returns `false` when the delta was dropped.
    ///
    /// The output path computes catch-up against a snapshot of the clock;
    /// after a seek that snapshot no longer describes the clock.
    pub fn add_time_since(&self, epoch: u64, delta: f64) -> bool {
        if !delta.is_finite() || delta <= 0.0 {
            return self.epoch() == epoch;
        }
        self.time
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (self.epoch.load(Ordering::Acquire) == epoch)
                    .then(|| (f64::from_bits(bits) + delta).to_bits())
            })
            .is_ok()
    }

    /// Reposition the clock, used by the control context on seek and load
    pub fn set_time(&self, seconds: f64) {
        // Epoch first: an in-flight add either fails its time CAS or sees the new epoch
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.time.store(seconds.to_bits(), Ordering::Release);
    }

    /// Reposition counter, see [`PlaybackClock::add_time_since`]
    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Last measured interval between decoded audio frames
    pub fn frame_interval(&self) -> f64 {
        f64::from_bits(self.frame_interval.load(Ordering::Acquire))
    }

    pub fn set_frame_interval(&self, seconds: f64) {
        self.frame_interval
            .store(seconds.to_bits(), Ordering::Release);
    }

    /// Reset both time and measured interval to zero
    pub fn reset(&self) {
        self.set_time(0.0);
        self.set_frame_interval(0.0);
    }
}

impl Default for PlaybackClock {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PlaybackClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackClock")
            .field("time", &self.time())
            .field("frame_interval", &self.frame_interval())
            .finish()
    }
}
