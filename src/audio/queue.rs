//! Bounded FIFO of decoded samples shared by the decode and output contexts
//!
//! One producer (the decode pipeline) and one consumer (the output port).
//! Every operation takes the lock once and holds it only for its own
//! bounded work, so the real-time side never waits behind decoding.

use super::sample::Sample;
use log::warn;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

struct QueueState {
    samples: VecDeque<Sample>,
    /// Samples dropped on overflow since creation
    dropped: u64,
    /// Whether the current overflow run has been logged
    overflow_reported: bool,
}

/// Ordered sample buffer with drop-oldest overflow
///
/// Insertion order is playback order and is never changed. When the queue
/// is full the oldest sample is dropped so that memory stays bounded if the
/// output stalls.
pub struct SampleQueue {
    state: Mutex<QueueState>,
    capacity: usize,
}

impl SampleQueue {
    /// Create a queue holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Mutex::new(QueueState {
                samples: VecDeque::with_capacity(capacity.min(1 << 16)),
                dropped: 0,
                overflow_reported: false,
            }),
            capacity,
        }
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append one sample, returns false if the oldest sample had to be dropped
    pub fn push(&self, sample: Sample) -> bool {
        self.push_batch(std::slice::from_ref(&sample)) == 0
    }

    /// Append samples in order under a single lock hold.
    ///
    /// Returns the number of old samples dropped to make room.
    pub fn push_batch(&self, batch: &[Sample]) -> usize {
        let mut state = self.state();
        let mut dropped = 0;
        for sample in batch {
            if state.samples.len() >= self.capacity {
                state.samples.pop_front();
                dropped += 1;
            }
            state.samples.push_back(*sample);
        }
        if dropped > 0 {
            state.dropped += dropped as u64;
            if !state.overflow_reported {
                state.overflow_reported = true;
                warn!(
                    "SampleQueue: full ({} samples), dropping oldest audio",
                    self.capacity
                );
            }
        }
        dropped
    }

    /// Remove and return the head sample
    pub fn pop(&self) -> Option<Sample> {
        self.state().samples.pop_front()
    }

    /// Remove the head sample only if it matches `pred`
    pub fn pop_if(&self, pred: impl FnOnce(&Sample) -> bool) -> Option<Sample> {
        let mut state = self.state();
        match state.samples.front() {
            Some(head) if pred(head) => state.samples.pop_front(),
            _ => None,
        }
    }

    /// Remove up to `n` samples in order
    pub fn pop_up_to(&self, n: usize) -> Vec<Sample> {
        let mut state = self.state();
        let take = n.min(state.samples.len());
        state.samples.drain(..take).collect()
    }

    /// Remove up to `out.len()` samples into `out` without allocating.
    ///
    /// Returns how many slots were filled.
    pub fn pop_into(&self, out: &mut [Sample]) -> usize {
        let mut state = self.state();
        let take = out.len().min(state.samples.len());
        for (slot, sample) in out.iter_mut().zip(state.samples.drain(..take)) {
            *slot = sample;
        }
        take
    }

    /// Copy of the head sample without consuming it
    pub fn peek(&self) -> Option<Sample> {
        self.state().samples.front().copied()
    }

    pub fn len(&self) -> usize {
        self.state().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples dropped on overflow since creation
    pub fn dropped(&self) -> u64 {
        self.state().dropped
    }

    /// Empty the queue atomically, returns how many samples were removed
    pub fn clear(&self) -> usize {
        let mut state = self.state();
        let removed = state.samples.len();
        state.samples.clear();
        state.overflow_reported = false;
        removed
    }
}

impl std::fmt::Debug for SampleQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: f64, frame: u64) -> Sample {
        Sample::new(frame as i16, -(frame as i16), ts, frame)
    }

    #[test]
    fn test_fifo_order() {
        let queue = SampleQueue::new(16);
        for i in 0..5 {
            queue.push(sample(i as f64 * 0.1, i));
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.peek().unwrap().frame_index, 0);

        let popped = queue.pop_up_to(3);
        let frames: Vec<u64> = popped.iter().map(|s| s.frame_index).collect();
        assert_eq!(frames, vec![0, 1, 2]);
        assert_eq!(queue.pop().unwrap().frame_index, 3);
        assert_eq!(queue.pop().unwrap().frame_index, 4);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_pop_into_partial() {
        let queue = SampleQueue::new(16);
        queue.push_batch(&[sample(0.0, 0), sample(0.1, 1)]);

        let mut out = [Sample::default(); 4];
        assert_eq!(queue.pop_into(&mut out), 2);
        assert_eq!(out[1].frame_index, 1);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_overflow_drops_oldest() {
        let queue = SampleQueue::new(4);
        let batch: Vec<Sample> = (0..6).map(|i| sample(i as f64, i)).collect();
        assert_eq!(queue.push_batch(&batch), 2);
        assert_eq!(queue.len(), 4);
        assert_eq!(queue.dropped(), 2);
        assert_eq!(queue.peek().unwrap().frame_index, 2);
    }

    #[test]
    fn test_clear() {
        let queue = SampleQueue::new(8);
        queue.push_batch(&[sample(0.0, 0), sample(0.1, 1), sample(0.2, 2)]);
        assert_eq!(queue.clear(), 3);
        assert!(queue.is_empty());
        assert!(queue.peek().is_none());
        assert!(queue.pop_up_to(10).is_empty());
    }

    #[test]
    fn test_pop_if() {
        let queue = SampleQueue::new(8);
        queue.push_batch(&[sample(1.0, 0), sample(2.0, 1)]);
        assert!(queue.pop_if(|s| s.timestamp > 1.5).is_none());
        assert_eq!(queue.pop_if(|s| s.timestamp < 1.5).unwrap().frame_index, 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_concurrent_order_preserved() {
        use std::sync::Arc;
        use std::thread;

        let queue = Arc::new(SampleQueue::new(100_000));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for chunk in 0..200u64 {
                    let batch: Vec<Sample> = (0..50)
                        .map(|i| sample(0.0, chunk * 50 + i))
                        .collect();
                    queue.push_batch(&batch);
                }
            })
        };

        let mut seen = Vec::with_capacity(10_000);
        while seen.len() < 10_000 {
            if let Some(s) = queue.pop() {
                seen.push(s.frame_index);
            } else {
                thread::yield_now();
            }
        }
        producer.join().unwrap();

        assert!(seen.windows(2).all(|w| w[0] + 1 == w[1]));
    }
}
