//! Session-level audio engine
//!
//! [`AudioEngine`] wires the decode pipeline, the sample queue, the clock
//! and the output port of one loaded media session together and exposes the
//! control surface the owning session uses.

use crate::audio::output::open_output_port;
use crate::audio::{AudioFetcher, AudioShared, HealthSummary, OutputPort, PlaybackClock, PortKind};
use crate::config::EngineConfig;
use crate::decoder::{AudioCodec, AudioDecodePipeline, AudioPacket, CodecInfo, DecodeOutcome, TimeBase};
use crate::error::Result;
use log::{debug, info};
use std::sync::{Mutex, MutexGuard, PoisonError};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Audio side of one media session
///
/// `decode` runs in the decode context. With a device or fallback port the
/// port drives output on its own; with [`OutputMode::External`] the host
/// calls [`AudioEngine::fetch_audio`] once per period instead. Doing both
/// would consume the queue twice.
///
/// [`OutputMode::External`]: crate::config::OutputMode::External
pub struct AudioEngine<C: AudioCodec> {
    shared: AudioShared,
    pipeline: Mutex<AudioDecodePipeline<C>>,
    fetcher: Mutex<AudioFetcher>,
    port: Mutex<Option<Box<dyn OutputPort>>>,
    port_kind: Option<PortKind>,
    output_rate: u32,
    output_channels: u16,
    info: CodecInfo,
    high_water: usize,
}

impl<C: AudioCodec> AudioEngine<C> {
    /// Build the engine for a session.
    ///
    /// `codec` is the result of opening the stream's codec; an error leaves
    /// the engine inert but the clock and port usable.
    pub fn new(config: &EngineConfig, codec: Result<C>) -> Self {
        let shared = AudioShared::new(config.queue_capacity(config.output_rate));
        shared.controls.set_volume(config.volume);
        shared.controls.set_mute(config.mute);
        shared.controls.set_quick_preview(config.quick_preview);

        let port = open_output_port(config, &shared);
        let port_kind = port.as_ref().map(|p| p.kind());
        let (output_rate, output_channels) = port
            .as_ref()
            .map(|p| (p.output_rate(), p.channel_count()))
            .unwrap_or((config.output_rate, config.output_channels));

        let pipeline = AudioDecodePipeline::new(
            codec,
            output_rate,
            config.timestamp_source,
            shared.queue.clone(),
            shared.health.clone(),
        );
        let info = pipeline.info().clone();

        Self {
            fetcher: Mutex::new(AudioFetcher::new(shared.clone(), output_rate)),
            pipeline: Mutex::new(pipeline),
            port: Mutex::new(port),
            port_kind,
            output_rate,
            output_channels,
            info,
            high_water: config.high_water_samples(output_rate),
            shared,
        }
    }

    /// Decode one packet of the session's audio stream.
    ///
    /// `time_warp` is the host's playback-speed factor. Samples keep their
    /// media-time stamps, so it does not change what is enqueued.
    pub fn decode(
        &self,
        packet: &AudioPacket,
        time_base: TimeBase,
        _time_warp: f64,
        add_to_queue: bool,
    ) -> Result<DecodeOutcome> {
        lock(&self.pipeline).decode(packet, time_base, add_to_queue)
    }

    /// Fill `buffer` with up to `sample_count` interleaved stereo frames using
    /// the per-period clock policy. Returns the number of frames fetched.
    pub fn fetch_audio(&self, buffer: &mut [i16], sample_count: usize) -> usize {
        lock(&self.fetcher).fetch_audio(buffer, sample_count)
    }

    /// Arm the post-seek discard of stale samples
    pub fn on_seek(&self) {
        self.shared.seek.on_seek();
    }

    /// Clear the queue and move the clock to `seconds`.
    ///
    /// Decoded frames stamped before `seconds` are kept out of the queue
    /// until the first one at or past it. The caller then repositions its
    /// demuxer and calls [`AudioEngine::on_seek`] before decoding resumes.
    pub fn seek_to(&self, seconds: f64) {
        let seconds = seconds.max(0.0);
        // Held across the clear so no in-flight decode lands on the new position
        let mut pipeline = lock(&self.pipeline);
        let cleared = self.clear_queue();
        self.shared.clock.set_time(seconds);
        pipeline.reset_timeline(seconds);
        debug!("AudioEngine: seek to {:.3}s, {} samples cleared", seconds, cleared);
    }

    /// Empty the queue, returns the number of samples removed
    pub fn clear_queue(&self) -> usize {
        self.shared.queue.clear()
    }

    pub fn queue_size(&self) -> usize {
        self.shared.queue.len()
    }

    /// Queue level above which the decode context should hold off
    pub fn is_saturated(&self) -> bool {
        self.queue_size() > self.high_water
    }

    /// Source sample rate of the codec
    pub fn sample_rate(&self) -> u32 {
        self.info.sample_rate
    }

    /// Source channel count of the codec
    pub fn channel_count(&self) -> u32 {
        self.info.channels
    }

    pub fn bit_rate(&self) -> u64 {
        self.info.bit_rate
    }

    pub fn codec_name(&self) -> &str {
        &self.info.name
    }

    /// Resume output and start the port
    pub fn play(&self) -> Result<()> {
        self.shared.controls.set_paused(false);
        if let Some(port) = lock(&self.port).as_mut() {
            port.start()?;
        }
        info!("AudioEngine: playing at {:.3}s", self.position());
        Ok(())
    }

    /// Stop consuming samples and stop the port; the clock holds its value
    pub fn pause(&self) -> Result<()> {
        self.shared.controls.set_paused(true);
        if let Some(port) = lock(&self.port).as_mut() {
            port.stop()?;
        }
        info!("AudioEngine: paused at {:.3}s", self.position());
        Ok(())
    }

    pub fn is_paused(&self) -> bool {
        self.shared.controls.is_paused()
    }

    /// Set the volume from a slider position in `[0, 1]`, returns the gain
    pub fn set_volume(&self, slider: f32) -> f32 {
        self.shared.controls.set_volume(slider)
    }

    pub fn set_mute(&self, mute: bool) {
        self.shared.controls.set_mute(mute);
    }

    pub fn set_quick_preview(&self, enabled: bool) {
        self.shared.controls.set_quick_preview(enabled);
    }

    /// Pause and drop every queued sample
    pub fn unload(&self) -> Result<()> {
        self.pause()?;
        let cleared = self.clear_queue();
        info!("AudioEngine: unloaded, {} samples dropped", cleared);
        Ok(())
    }

    pub fn clock(&self) -> &PlaybackClock {
        &self.shared.clock
    }

    /// Current media time in seconds
    pub fn position(&self) -> f64 {
        self.shared.clock.time()
    }

    pub fn health(&self) -> HealthSummary {
        self.shared.health.summary()
    }

    pub fn output_rate(&self) -> u32 {
        self.output_rate
    }

    pub fn output_channels(&self) -> u16 {
        self.output_channels
    }

    /// `None` when the host drives output through `fetch_audio`
    pub fn port_kind(&self) -> Option<&PortKind> {
        self.port_kind.as_ref()
    }

    /// `true` if the pipeline failed to allocate and the session must stop
    pub fn has_failed(&self) -> bool {
        lock(&self.pipeline).state() == crate::decoder::PipelineState::Failed
    }
}
