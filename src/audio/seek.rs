//! Post-seek discard of stale queued audio
//!
//! The owner clears the queue and repositions the clock before decoding
//! resumes. Samples decoded just before the seek landed can still reach
//! the queue afterwards; while a seek is pending, each fetch cycle drops
//! head samples older than the clock.

use super::queue::SampleQueue;
use std::sync::atomic::{AtomicU64, Ordering};

/// Each `on_seek` bumps `requested`; a discard pass settles the generation it
/// observed on entry, so a seek arriving mid-pass stays pending.
#[derive(Debug, Default)]
pub struct SeekController {
    requested: AtomicU64,
    settled: AtomicU64,
}

impl SeekController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the post-seek skip
    pub fn on_seek(&self) {
        self.requested.fetch_add(1, Ordering::AcqRel);
    }

    pub fn is_pending(&self) -> bool {
        self.requested.load(Ordering::Acquire) != self.settled.load(Ordering::Acquire)
    }

    /// Drop head samples stamped before `clock_time`.
    ///
    /// Does nothing unless a seek is pending. The seek is settled once the
    /// head is at or past `clock_time` or the queue is empty. Returns the
    /// number of discarded samples.
    pub fn discard_stale(&self, queue: &SampleQueue, clock_time: f64) -> usize {
        let observed = self.requested.load(Ordering::Acquire);
        if observed == self.settled.load(Ordering::Acquire) {
            return 0;
        }

        let mut discarded = 0;
        loop {
            match queue.peek() {
                Some(head) if head.timestamp < clock_time => {
                    // Conditional pop: the queue may have been cleared since the peek
                    if queue.pop_if(|s| s.timestamp < clock_time).is_some() {
                        discarded += 1;
                    }
                }
                _ => break,
            }
        }

        self.settle(observed);
        discarded
    }

    fn settle(&self, observed: u64) {
        self.settled.fetch_max(observed, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sample::Sample;

    fn queue_with(timestamps: &[f64]) -> SampleQueue {
        let queue = SampleQueue::new(64);
        for (i, ts) in timestamps.iter().enumerate() {
            queue.push(Sample::new(1, 1, *ts, i as u64));
        }
        queue
    }

    #[test]
    fn test_idle_without_seek() {
        let seek = SeekController::new();
        let queue = queue_with(&[1.0, 1.2]);
        assert_eq!(seek.discard_stale(&queue, 5.0), 0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_discards_until_caught_up() {
        let seek = SeekController::new();
        let queue = queue_with(&[1.0, 1.2, 1.4, 1.6]);

        seek.on_seek();
        assert_eq!(seek.discard_stale(&queue, 1.3), 2);
        assert!(!seek.is_pending());
        assert_eq!(queue.peek().unwrap().timestamp, 1.4);

        // Flag is cleared, later samples are left alone
        assert_eq!(seek.discard_stale(&queue, 10.0), 0);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_empty_queue_clears_flag() {
        let seek = SeekController::new();
        let queue = queue_with(&[0.5, 0.6]);

        seek.on_seek();
        assert_eq!(seek.discard_stale(&queue, 2.0), 2);
        assert!(queue.is_empty());
        assert!(!seek.is_pending());
    }

    #[test]
    fn test_seek_during_pass_stays_pending() {
        let seek = SeekController::new();
        let queue = queue_with(&[0.5]);

        seek.on_seek();
        let observed = seek.requested.load(Ordering::Acquire);
        // Control context seeks again while the output pass is running
        seek.on_seek();
        seek.settle(observed);
        assert!(seek.is_pending());

        assert_eq!(seek.discard_stale(&queue, 2.0), 1);
        assert!(!seek.is_pending());
    }

    #[test]
    fn test_equal_timestamp_is_kept() {
        let seek = SeekController::new();
        let queue = queue_with(&[1.3, 1.4]);

        seek.on_seek();
        assert_eq!(seek.discard_stale(&queue, 1.3), 0);
        assert_eq!(queue.len(), 2);
    }
}
