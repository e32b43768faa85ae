//! Per-period fetch policy
//!
//! Drains up to a period's worth of samples into an interleaved stereo
//! buffer, then credits the clock once for the whole period:
//!
//! - normally by how far the newest fetched sample is ahead of the clock
//!   (never negative);
//! - by the nominal period length (`sample_count / output_rate`) when the
//!   queue had nothing to give, or when the fetch is still inside the same
//!   decoded frame as the previous one and the clock has not yet passed
//!   that frame's expected end. Sparse audio would otherwise stall video.

use super::AudioShared;
use super::render::MAX_CHUNK_FRAMES;
use super::sample::Sample;

pub struct AudioFetcher {
    shared: AudioShared,
    output_rate: u32,
    /// Newest sample of the previous non-empty fetch
    last: Option<Sample>,
    scratch: Vec<Sample>,
}

impl AudioFetcher {
    pub fn new(shared: AudioShared, output_rate: u32) -> Self {
        Self {
            shared,
            output_rate: output_rate.max(1),
            last: None,
            scratch: vec![Sample::default(); MAX_CHUNK_FRAMES],
        }
    }

    /// Fill `buffer` with up to `sample_count` stereo frames.
    ///
    /// Slots past the fetched samples are zeroed. Returns the number of
    /// frames taken from the queue. While paused nothing is consumed and the
    /// clock is left alone.
    pub fn fetch_audio(&mut self, buffer: &mut [i16], sample_count: usize) -> usize {
        let AudioShared {
            queue,
            clock,
            controls,
            seek,
            health,
        } = &self.shared;

        let slots = sample_count.min(buffer.len() / 2);
        let period = &mut buffer[..slots * 2];

        if controls.is_paused() {
            period.fill(0);
            health.record_silent_slots(slots);
            return 0;
        }

        let epoch = clock.epoch();
        let clock_time = clock.time();
        health.record_seek_discards(seek.discard_stale(queue, clock_time));

        let gain = controls.effective_gain();
        let mut fetched = 0;
        let mut newest = None;

        while fetched < slots {
            let want = (slots - fetched).min(self.scratch.len());
            let got = queue.pop_into(&mut self.scratch[..want]);
            for sample in &self.scratch[..got] {
                let (left, right) = sample.scaled(gain);
                period[fetched * 2] = left;
                period[fetched * 2 + 1] = right;
                fetched += 1;
            }
            if got > 0 {
                newest = Some(self.scratch[got - 1]);
            }
            if got < want {
                break;
            }
        }

        period[fetched * 2..].fill(0);
        health.record_silent_slots(slots - fetched);

        let credit = self.credit(newest, clock_time, sample_count);
        // Credit was computed against `clock_time`; a seek since then invalidates it
        self.shared.clock.add_time_since(epoch, credit);
        fetched
    }

    /// Time to add to the clock for this period
    fn credit(&mut self, newest: Option<Sample>, clock_time: f64, sample_count: usize) -> f64 {
        let nominal = sample_count as f64 / self.output_rate as f64;
        let Some(sample) = newest else {
            return nominal;
        };

        let same_frame = match self.last {
            Some(last) if last.frame_index == sample.frame_index => true,
            Some(last) => {
                self.shared
                    .clock
                    .set_frame_interval(sample.timestamp - last.timestamp);
                false
            }
            None => false,
        };
        self.last = Some(sample);

        if same_frame && clock_time < sample.timestamp + self.shared.clock.frame_interval() {
            nominal
        } else {
            (sample.timestamp - clock_time).max(0.0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 48_000;

    fn fetcher() -> (AudioShared, AudioFetcher) {
        let shared = AudioShared::new(1 << 16);
        shared.controls.set_paused(false);
        let fetcher = AudioFetcher::new(shared.clone(), RATE);
        (shared, fetcher)
    }

    fn push_run(shared: &AudioShared, count: usize, ts: f64, frame: u64) {
        let batch: Vec<Sample> = (0..count)
            .map(|i| Sample::new(i as i16 + 1, -(i as i16) - 1, ts, frame))
            .collect();
        shared.queue.push_batch(&batch);
    }

    #[test]
    fn test_returns_samples_in_order() {
        let (shared, mut fetcher) = fetcher();
        push_run(&shared, 10, 0.0, 0);

        let mut buf = [0i16; 8];
        assert_eq!(fetcher.fetch_audio(&mut buf, 4), 4);
        assert_eq!(buf, [1, -1, 2, -2, 3, -3, 4, -4]);
        assert_eq!(fetcher.fetch_audio(&mut buf, 4), 4);
        assert_eq!(buf[0], 5);
    }

    #[test]
    fn test_clear_then_fetch_returns_nothing() {
        let (shared, mut fetcher) = fetcher();
        push_run(&shared, 10, 0.0, 0);
        shared.queue.clear();

        let mut buf = [9i16; 8];
        assert_eq!(fetcher.fetch_audio(&mut buf, 4), 0);
        assert!(buf.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_mute_zeroes_every_sample() {
        let (shared, mut fetcher) = fetcher();
        shared.controls.set_mute(true);
        push_run(&shared, 16, 0.0, 0);

        let mut buf = [0i16; 32];
        assert_eq!(fetcher.fetch_audio(&mut buf, 16), 16);
        assert!(buf.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_seek_discards_stale_head() {
        let (shared, mut fetcher) = fetcher();
        for (i, ts) in [1.0, 1.2, 1.4, 1.6].iter().enumerate() {
            shared.queue.push(Sample::new(i as i16, 0, *ts, i as u64));
        }
        shared.clock.set_time(1.3);
        shared.seek.on_seek();

        let mut buf = [0i16; 2];
        assert_eq!(fetcher.fetch_audio(&mut buf, 1), 1);
        // The sample stamped 1.4 is the first one delivered
        assert_eq!(buf[0], 2);
        assert!(!shared.seek.is_pending());
        assert_eq!(shared.health.summary().seek_discards, 2);
    }

    #[test]
    fn test_sparse_audio_uses_nominal_period() {
        let (shared, mut fetcher) = fetcher();
        shared.clock.set_time(0.98);
        push_run(&shared, 100, 0.98, 0);
        push_run(&shared, 300, 1.0, 1);

        let mut buf = [0i16; 200];
        fetcher.fetch_audio(&mut buf, 100);
        assert!((shared.clock.time() - 0.98).abs() < 1e-12);

        // New frame: interval measured, clock jumps to its timestamp
        fetcher.fetch_audio(&mut buf, 100);
        assert!((shared.clock.frame_interval() - 0.02).abs() < 1e-9);
        assert!((shared.clock.time() - 1.0).abs() < 1e-12);

        // Same frame again: credit is the period length, not the timestamp delta
        let before = shared.clock.time();
        fetcher.fetch_audio(&mut buf, 100);
        let advance = shared.clock.time() - before;
        assert!((advance - 100.0 / RATE as f64).abs() < 1e-12);
    }

    #[test]
    fn test_no_samples_uses_nominal_period() {
        let (shared, mut fetcher) = fetcher();
        push_run(&shared, 4, 3.0, 7);
        let mut buf = [0i16; 512];
        fetcher.fetch_audio(&mut buf, 4);
        assert!((shared.clock.time() - 3.0).abs() < 1e-12);

        let before = shared.clock.time();
        assert_eq!(fetcher.fetch_audio(&mut buf, 256), 0);
        let advance = shared.clock.time() - before;
        assert!((advance - 256.0 / RATE as f64).abs() < 1e-12);
    }

    #[test]
    fn test_paused_does_not_consume() {
        let (shared, mut fetcher) = fetcher();
        push_run(&shared, 4, 0.0, 0);
        shared.controls.set_paused(true);

        let mut buf = [5i16; 8];
        assert_eq!(fetcher.fetch_audio(&mut buf, 4), 0);
        assert!(buf.iter().all(|&v| v == 0));
        assert_eq!(shared.queue.len(), 4);
        assert_eq!(shared.clock.time(), 0.0);
    }
}
