//! Software ticker used when no output device can be opened
//!
//! Invokes the same renderer as a device would, with a fixed synthetic
//! frame count every period, so the clock keeps running and the session
//! stays controllable without audio hardware. Rendered audio is discarded.

use super::{OutputPort, PortKind};
use crate::audio::render::OutputRenderer;
use crate::config::EngineConfig;
use crate::error::{AudioError, Result};
use crate::utils::sos::SignalOfStop;
use log::debug;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Periods the ticker may fall behind before it resynchronizes instead of bursting
const MAX_LAG_PERIODS: u32 = 4;

struct Worker {
    sos: SignalOfStop,
    handle: JoinHandle<()>,
}

pub struct FallbackTicker {
    renderer: Arc<Mutex<OutputRenderer>>,
    rate: u32,
    channels: u16,
    period: Duration,
    frames: usize,
    worker: Option<Worker>,
}

impl FallbackTicker {
    pub fn new(
        renderer: OutputRenderer,
        rate: u32,
        channels: u16,
        period: Duration,
        frames: usize,
    ) -> Self {
        Self {
            renderer: Arc::new(Mutex::new(renderer)),
            rate,
            channels: channels.max(1),
            period,
            frames: frames.max(1),
            worker: None,
        }
    }

    pub fn from_config(
        config: &EngineConfig,
        make_renderer: &dyn Fn(u32, u16) -> OutputRenderer,
    ) -> Self {
        let rate = config.output_rate;
        let channels = config.output_channels;
        Self::new(
            make_renderer(rate, channels),
            rate,
            channels,
            Duration::from_millis(config.fallback_period_ms),
            config.fallback_frames(rate),
        )
    }

    /// Synthetic frames rendered per tick
    pub fn frames_per_tick(&self) -> usize {
        self.frames
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn run(
        renderer: Arc<Mutex<OutputRenderer>>,
        sos: SignalOfStop,
        period: Duration,
        samples: usize,
    ) {
        let mut renderer = renderer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut buffer = vec![0i16; samples];
        let mut deadline = Instant::now();

        while !sos.cancelled() {
            renderer.render(&mut buffer);

            deadline += period;
            let now = Instant::now();
            if deadline > now {
                if sos.wait_timeout(deadline - now) {
                    break;
                }
            } else if now - deadline > period * MAX_LAG_PERIODS {
                debug!("FallbackTicker: {:?} behind schedule, resynchronizing", now - deadline);
                deadline = now;
            }
        }
    }
}

impl OutputPort for FallbackTicker {
    fn output_rate(&self) -> u32 {
        self.rate
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn start(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let sos = SignalOfStop::new();
        let renderer = Arc::clone(&self.renderer);
        let period = self.period;
        let samples = self.frames * self.channels as usize;
        let thread_sos = sos.clone();

        let handle = thread::Builder::new()
            .name("audio-fallback".into())
            .spawn(move || Self::run(renderer, thread_sos, period, samples))
            .map_err(|e| AudioError::Device(format!("Failed to spawn fallback ticker: {}", e)))?;

        debug!(
            "FallbackTicker: started ({} frames every {:?})",
            self.frames, self.period
        );
        self.worker = Some(Worker { sos, handle });
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        if let Some(worker) = self.worker.take() {
            worker.sos.cancel();
            worker
                .handle
                .join()
                .map_err(|_| AudioError::Device("Fallback ticker panicked".into()))?;
            debug!("FallbackTicker: stopped");
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    fn kind(&self) -> PortKind {
        PortKind::Fallback
    }
}

impl Drop for FallbackTicker {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AudioShared;
    use crate::config::ClockPolicy;

    fn ticker(shared: &AudioShared) -> FallbackTicker {
        let renderer =
            OutputRenderer::new(ClockPolicy::PerSlot, shared.clone(), 48_000, 2, 1.0 / 120.0);
        FallbackTicker::new(renderer, 48_000, 2, Duration::from_millis(15), 720)
    }

    #[test]
    fn test_ticker_advances_clock_monotonically() {
        let shared = AudioShared::new(1024);
        shared.controls.set_paused(false);
        let mut port = ticker(&shared);
        assert_eq!(port.kind(), PortKind::Fallback);

        let started = Instant::now();
        port.start().unwrap();
        assert!(port.is_running());

        let mut readings = Vec::new();
        for _ in 0..10 {
            thread::sleep(Duration::from_millis(20));
            readings.push(shared.clock.time());
        }
        port.stop().unwrap();
        let elapsed = started.elapsed().as_secs_f64();
        let final_time = shared.clock.time();

        assert!(readings.windows(2).all(|w| w[0] <= w[1]));
        assert!(readings.last().unwrap() > readings.first().unwrap());
        // Each tick credits exactly one period of synthetic frames
        let ticks = final_time / 0.015;
        assert!((ticks - ticks.round()).abs() < 1e-6);
        assert!(final_time > 0.0);
        assert!(final_time <= elapsed + 0.015 * (MAX_LAG_PERIODS as f64 + 1.0));
    }

    #[test]
    fn test_stop_halts_clock_and_restart_resumes() {
        let shared = AudioShared::new(1024);
        shared.controls.set_paused(false);
        let mut port = ticker(&shared);

        port.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        port.stop().unwrap();
        assert!(!port.is_running());

        let stopped_at = shared.clock.time();
        thread::sleep(Duration::from_millis(50));
        assert_eq!(shared.clock.time(), stopped_at);

        port.start().unwrap();
        thread::sleep(Duration::from_millis(50));
        port.stop().unwrap();
        assert!(shared.clock.time() > stopped_at);
    }

    #[test]
    fn test_ticker_drains_queue() {
        let shared = AudioShared::new(4096);
        shared.controls.set_paused(false);
        let batch: Vec<_> = (0..1000)
            .map(|_| crate::audio::Sample::new(1, 1, 0.0, 0))
            .collect();
        shared.queue.push_batch(&batch);

        let mut port = ticker(&shared);
        port.start().unwrap();
        thread::sleep(Duration::from_millis(80));
        port.stop().unwrap();
        assert!(shared.queue.is_empty());
    }
}
