//! Playback flags written by the control context and read by the output path

use super::sample::slider_to_gain;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Pause, mute and gain state shared with the real-time side
///
/// Every field is a single atomic so the output callback reads them without
/// tearing and without touching decode-side state.
#[derive(Debug)]
pub struct PlaybackControls {
    paused: AtomicBool,
    mute: AtomicBool,
    /// Quick-preview players never produce sound
    quick_preview: AtomicBool,
    /// Linear gain (f32 bits)
    gain: AtomicU32,
}

impl PlaybackControls {
    /// Sessions start paused at full volume
    pub fn new() -> Self {
        Self {
            paused: AtomicBool::new(true),
            mute: AtomicBool::new(false),
            quick_preview: AtomicBool::new(false),
            gain: AtomicU32::new(1f32.to_bits()),
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Acquire)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::Release);
    }

    pub fn is_muted(&self) -> bool {
        self.mute.load(Ordering::Acquire)
    }

    pub fn set_mute(&self, mute: bool) {
        self.mute.store(mute, Ordering::Release);
    }

    pub fn is_quick_preview(&self) -> bool {
        self.quick_preview.load(Ordering::Acquire)
    }

    pub fn set_quick_preview(&self, enabled: bool) {
        self.quick_preview.store(enabled, Ordering::Release);
    }

    /// Configured gain, ignoring mute
    pub fn gain(&self) -> f32 {
        f32::from_bits(self.gain.load(Ordering::Acquire))
    }

    pub fn set_gain(&self, gain: f32) {
        self.gain.store(gain.max(0.0).to_bits(), Ordering::Release);
    }

    /// Set the gain from a volume slider position, returns the stored gain
    pub fn set_volume(&self, slider: f32) -> f32 {
        let gain = slider_to_gain(slider);
        self.set_gain(gain);
        gain
    }

    /// Gain to apply to the next output period
    pub fn effective_gain(&self) -> f32 {
        if self.is_muted() || self.is_quick_preview() {
            0.0
        } else {
            self.gain()
        }
    }
}

impl Default for PlaybackControls {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_gain() {
        let controls = PlaybackControls::new();
        assert!(controls.is_paused());
        assert_eq!(controls.effective_gain(), 1.0);

        controls.set_volume(0.0);
        assert_eq!(controls.effective_gain(), 0.0);

        controls.set_volume(1.0);
        controls.set_mute(true);
        assert_eq!(controls.effective_gain(), 0.0);

        controls.set_mute(false);
        controls.set_quick_preview(true);
        assert_eq!(controls.effective_gain(), 0.0);

        controls.set_quick_preview(false);
        assert!((controls.effective_gain() - 1.0).abs() < 1e-6);
    }
}
