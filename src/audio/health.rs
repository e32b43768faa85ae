//! Health counters for the audio engine

use std::sync::atomic::{AtomicU64, Ordering};

/// Engine counters
///
/// All fields use relaxed atomics: they are diagnostics, never used for
/// synchronization, and are safe to bump from the real-time side.
#[derive(Debug, Default)]
pub struct EngineHealth {
    /// Compressed frames successfully decoded
    pub frames_decoded: AtomicU64,

    /// Packets that failed to decode
    pub decode_failures: AtomicU64,

    /// Samples pushed into the queue
    pub samples_enqueued: AtomicU64,

    /// Samples dropped because the queue was full
    pub samples_dropped: AtomicU64,

    /// Samples discarded after a seek
    pub seek_discards: AtomicU64,

    /// Output slots filled with silence (underrun or paused)
    pub silent_slots: AtomicU64,

    /// Accumulated deltas flushed into the clock
    pub clock_flushes: AtomicU64,
}

impl EngineHealth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame_decoded(&self) {
        self.frames_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self, count: usize, dropped: usize) {
        self.samples_enqueued
            .fetch_add(count as u64, Ordering::Relaxed);
        if dropped > 0 {
            self.samples_dropped
                .fetch_add(dropped as u64, Ordering::Relaxed);
        }
    }

    pub fn record_seek_discards(&self, count: usize) {
        if count > 0 {
            self.seek_discards.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_silent_slots(&self, count: usize) {
        if count > 0 {
            self.silent_slots.fetch_add(count as u64, Ordering::Relaxed);
        }
    }

    pub fn record_clock_flush(&self) {
        self.clock_flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all counters
    pub fn summary(&self) -> HealthSummary {
        HealthSummary {
            frames_decoded: self.frames_decoded.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            samples_enqueued: self.samples_enqueued.load(Ordering::Relaxed),
            samples_dropped: self.samples_dropped.load(Ordering::Relaxed),
            seek_discards: self.seek_discards.load(Ordering::Relaxed),
            silent_slots: self.silent_slots.load(Ordering::Relaxed),
            clock_flushes: self.clock_flushes.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of health counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthSummary {
    pub frames_decoded: u64,
    pub decode_failures: u64,
    pub samples_enqueued: u64,
    pub samples_dropped: u64,
    pub seek_discards: u64,
    pub silent_slots: u64,
    pub clock_flushes: u64,
}

impl std::fmt::Display for HealthSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Health: {} frames decoded ({} failures), {} samples queued ({} dropped, {} discarded on seek), {} silent slots, {} clock flushes",
            self.frames_decoded,
            self.decode_failures,
            self.samples_enqueued,
            self.samples_dropped,
            self.seek_discards,
            self.silent_slots,
            self.clock_flushes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let health = EngineHealth::new();
        health.record_frame_decoded();
        health.record_frame_decoded();
        health.record_decode_failure();
        health.record_enqueued(1024, 4);
        health.record_seek_discards(0);
        health.record_silent_slots(12);

        let summary = health.summary();
        assert_eq!(summary.frames_decoded, 2);
        assert_eq!(summary.decode_failures, 1);
        assert_eq!(summary.samples_enqueued, 1024);
        assert_eq!(summary.samples_dropped, 4);
        assert_eq!(summary.seek_discards, 0);
        assert_eq!(summary.silent_slots, 12);
        assert!(summary.to_string().contains("2 frames decoded"));
    }
}
