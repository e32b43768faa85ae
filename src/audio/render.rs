//! Per-period rendering run by the output port
//!
//! Runs inside the real-time context: no allocation, no I/O, no logging.
//! Scratch buffers are sized once when the renderer is built.

use super::AudioShared;
use super::fetch::AudioFetcher;
use super::sample::Sample;
use crate::config::ClockPolicy;
use cpal::{FromSample, Sample as OutputSample};

/// Upper bound on frames popped per queue lock
pub const MAX_CHUNK_FRAMES: usize = 4096;

/// Per-slot renderer: one clock delta per written frame
///
/// Each slot adds `1 / output_rate` to a local accumulator. A popped sample
/// stamped later than `clock + accumulated` pulls the accumulator forward,
/// so the clock catches up to the audio but never runs ahead of it. The
/// accumulator is flushed into the clock whenever it reaches the flush
/// threshold, and once more at the end of the period. A flush is dropped
/// when the clock was repositioned since the accumulator started.
pub struct SlotRenderer {
    shared: AudioShared,
    output_rate: u32,
    channels: usize,
    flush_threshold: f64,
    scratch: Vec<Sample>,
}

impl SlotRenderer {
    pub fn new(shared: AudioShared, output_rate: u32, channels: u16, flush_threshold: f64) -> Self {
        Self {
            shared,
            output_rate: output_rate.max(1),
            channels: channels.max(1) as usize,
            flush_threshold,
            scratch: vec![Sample::default(); MAX_CHUNK_FRAMES],
        }
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Fill one output period of interleaved frames
    pub fn render<T>(&mut self, out: &mut [T])
    where
        T: OutputSample + FromSample<i16>,
    {
        let AudioShared {
            queue,
            clock,
            controls,
            seek,
            health,
        } = &self.shared;

        let paused = controls.is_paused();
        if !paused {
            health.record_seek_discards(seek.discard_stale(queue, clock.time()));
        }

        let gain = controls.effective_gain();
        let delta = 1.0 / self.output_rate as f64;
        let mut epoch = clock.epoch();
        let mut clock_time = clock.time();
        let mut accumulated = 0.0;
        let mut silent = 0;

        for chunk in out.chunks_mut(self.channels * self.scratch.len()) {
            let frames = chunk.len() / self.channels;
            let got = if paused {
                0
            } else {
                queue.pop_into(&mut self.scratch[..frames])
            };

            for (i, slot) in chunk.chunks_mut(self.channels).enumerate() {
                accumulated += delta;

                if i < got {
                    let sample = self.scratch[i];
                    let adjust = sample.timestamp - (clock_time + accumulated);
                    if adjust > 0.0 {
                        accumulated += adjust;
                    }
                    let (left, right) = sample.scaled(gain);
                    write_slot(slot, left, right);
                } else {
                    slot.fill(T::EQUILIBRIUM);
                    silent += 1;
                }

                if accumulated >= self.flush_threshold {
                    // A seek landed mid-period: the accumulator is relative to the old position
                    if clock.add_time_since(epoch, accumulated) {
                        health.record_clock_flush();
                    }
                    accumulated = 0.0;
                    epoch = clock.epoch();
                    clock_time = clock.time();
                }
            }
        }

        if accumulated > 0.0 {
            clock.add_time_since(epoch, accumulated);
        }
        health.record_silent_slots(silent);
    }
}

/// Renderer installed in an output port, selected by [`ClockPolicy`]
pub enum OutputRenderer {
    PerSlot(SlotRenderer),
    PerPeriod {
        fetcher: AudioFetcher,
        channels: usize,
        staging: Vec<i16>,
    },
}

impl OutputRenderer {
    pub fn new(
        policy: ClockPolicy,
        shared: AudioShared,
        output_rate: u32,
        channels: u16,
        flush_threshold: f64,
    ) -> Self {
        match policy {
            ClockPolicy::PerSlot => OutputRenderer::PerSlot(SlotRenderer::new(
                shared,
                output_rate,
                channels,
                flush_threshold,
            )),
            ClockPolicy::PerPeriod => OutputRenderer::PerPeriod {
                fetcher: AudioFetcher::new(shared, output_rate),
                channels: channels.max(1) as usize,
                staging: vec![0; MAX_CHUNK_FRAMES * 2],
            },
        }
    }

    /// Fill one output period of interleaved frames
    pub fn render<T>(&mut self, out: &mut [T])
    where
        T: OutputSample + FromSample<i16>,
    {
        match self {
            OutputRenderer::PerSlot(renderer) => renderer.render(out),
            OutputRenderer::PerPeriod {
                fetcher,
                channels,
                staging,
            } => {
                let channels = *channels;
                for chunk in out.chunks_mut(channels * MAX_CHUNK_FRAMES) {
                    let frames = chunk.len() / channels;
                    chunk.fill(T::EQUILIBRIUM);
                    fetcher.fetch_audio(&mut staging[..frames * 2], frames);
                    for (slot, pair) in chunk
                        .chunks_exact_mut(channels)
                        .zip(staging.chunks_exact(2))
                    {
                        write_slot(slot, pair[0], pair[1]);
                    }
                }
            }
        }
    }
}

/// Write a stereo frame into a slot of any channel count
#[inline]
fn write_slot<T>(slot: &mut [T], left: i16, right: i16)
where
    T: OutputSample + FromSample<i16>,
{
    match slot {
        [] => {}
        [mono] => *mono = T::from_sample(((left as i32 + right as i32) / 2) as i16),
        [l, r, rest @ ..] => {
            *l = T::from_sample(left);
            *r = T::from_sample(right);
            rest.fill(T::EQUILIBRIUM);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 48_000;
    const THRESHOLD: f64 = 1.0 / 120.0;

    fn renderer(shared: &AudioShared) -> SlotRenderer {
        shared.controls.set_paused(false);
        SlotRenderer::new(shared.clone(), RATE, 2, THRESHOLD)
    }

    fn push_run(shared: &AudioShared, count: usize, ts: f64, frame: u64, amplitude: i16) {
        let batch: Vec<Sample> = (0..count)
            .map(|_| Sample::new(amplitude, -amplitude, ts, frame))
            .collect();
        shared.queue.push_batch(&batch);
    }

    #[test]
    fn test_underrun_writes_silence_and_advances() {
        let shared = AudioShared::new(1024);
        let mut r = renderer(&shared);
        push_run(&shared, 2, 0.0, 0, 1000);

        let mut out = [7i16; 8];
        r.render(&mut out);
        assert_eq!(out, [1000, -1000, 1000, -1000, 0, 0, 0, 0]);

        // 4 slots, nothing stamped ahead of the clock
        assert!((shared.clock.time() - 4.0 / RATE as f64).abs() < 1e-12);
        assert_eq!(shared.health.summary().silent_slots, 2);
    }

    #[test]
    fn test_consumes_in_enqueue_order() {
        let shared = AudioShared::new(4096);
        let mut r = renderer(&shared);
        let batch: Vec<Sample> = (0..300).map(|i| Sample::new(i as i16, 0, 0.0, 0)).collect();
        shared.queue.push_batch(&batch);

        let mut out = vec![0i16; 600];
        r.render(&mut out);
        let lefts: Vec<i16> = out.chunks(2).map(|f| f[0]).collect();
        assert_eq!(lefts, (0..300).map(|i| i as i16).collect::<Vec<_>>());
    }

    #[test]
    fn test_clock_catches_up_to_audio() {
        let shared = AudioShared::new(1024);
        let mut r = renderer(&shared);
        // Samples stamped at 1.0 s while the clock is still at 0
        push_run(&shared, 1, 1.0, 0, 1);

        let mut out = [0i16; 2];
        r.render(&mut out);
        assert!((shared.clock.time() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_clock_does_not_race_ahead() {
        let shared = AudioShared::new(1024);
        shared.clock.set_time(5.0);
        let mut r = renderer(&shared);
        // Stale audio does not pull the clock back or forward
        push_run(&shared, 10, 1.0, 0, 1);

        let mut out = [0i16; 20];
        r.render(&mut out);
        assert!((shared.clock.time() - (5.0 + 10.0 / RATE as f64)).abs() < 1e-9);
    }

    #[test]
    fn test_flushes_are_batched() {
        let shared = AudioShared::new(1024);
        let mut r = renderer(&shared);

        // 1200 silent slots = 25 ms, threshold is 1/120 s = 400 slots
        let mut out = vec![0i16; 2400];
        r.render(&mut out);
        assert_eq!(shared.health.summary().clock_flushes, 3);
        assert!((shared.clock.time() - 0.025).abs() < 1e-9);
    }

    #[test]
    fn test_mute_and_zero_volume_silence_output() {
        let shared = AudioShared::new(1024);
        let mut r = renderer(&shared);

        shared.controls.set_mute(true);
        push_run(&shared, 4, 0.0, 0, 12_000);
        let mut out = [1i16; 8];
        r.render(&mut out);
        assert!(out.iter().all(|&v| v == 0));

        shared.controls.set_mute(false);
        shared.controls.set_volume(0.0);
        push_run(&shared, 4, 0.0, 0, 12_000);
        let mut out = [1i16; 8];
        r.render(&mut out);
        assert!(out.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_paused_keeps_queue() {
        let shared = AudioShared::new(1024);
        let mut r = renderer(&shared);
        shared.controls.set_paused(true);
        push_run(&shared, 4, 0.0, 0, 500);

        let mut out = [1i16; 8];
        r.render(&mut out);
        assert!(out.iter().all(|&v| v == 0));
        assert_eq!(shared.queue.len(), 4);
        // Paused slots still move the clock, one delta each
        assert!((shared.clock.time() - 4.0 / RATE as f64).abs() < 1e-12);
    }

    #[test]
    fn test_float_output_and_extra_channels() {
        let shared = AudioShared::new(1024);
        shared.controls.set_paused(false);
        let mut r = SlotRenderer::new(shared.clone(), RATE, 4, THRESHOLD);
        push_run(&shared, 1, 0.0, 0, i16::MAX);

        let mut out = [1.0f32; 4];
        r.render(&mut out);
        assert!(out[0] > 0.99);
        assert!(out[1] < -0.99);
        assert_eq!(&out[2..], &[0.0, 0.0]);
    }

    #[test]
    fn test_per_period_renderer() {
        let shared = AudioShared::new(1024);
        shared.controls.set_paused(false);
        let mut r = OutputRenderer::new(ClockPolicy::PerPeriod, shared.clone(), RATE, 2, THRESHOLD);

        // Empty queue: clock credited by the period length
        let mut out = [0i16; 96];
        r.render(&mut out);
        assert!((shared.clock.time() - 48.0 / RATE as f64).abs() < 1e-12);

        push_run(&shared, 2, 0.0, 0, 321);
        let mut out = [0i16; 8];
        r.render(&mut out);
        assert_eq!(out, [321, -321, 321, -321, 0, 0, 0, 0]);
    }
}
