//! One loaded media file: engine plus decode thread

use super::source::MediaSource;
use crate::config::EngineConfig;
use crate::decoder::FfmpegAudioCodec;
use crate::engine::AudioEngine;
use crate::utils::sos::SignalOfStop;
use anyhow::{Result, anyhow};
use log::{debug, error, info, warn};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Sleep of the decode thread while the queue is above the high-water mark
const THROTTLE_WAIT: Duration = Duration::from_millis(10);
/// Sleep of the decode thread after end of stream, waiting for a seek
const IDLE_WAIT: Duration = Duration::from_millis(25);

pub struct Session {
    engine: Arc<AudioEngine<FfmpegAudioCodec>>,
    seek_tx: Sender<f64>,
    sos: SignalOfStop,
    decoder: Option<JoinHandle<()>>,
    /// Set by the decode thread at end of stream or on a fatal error
    exhausted: Arc<AtomicBool>,
    duration: Option<f64>,
}

impl Session {
    /// Open `path`, build the engine and start decoding. Playback starts paused.
    pub fn load(path: &Path, config: &EngineConfig) -> Result<Self> {
        let source = MediaSource::open(path)?;
        let duration = source.duration();
        let engine = Arc::new(AudioEngine::new(config, source.open_codec()));

        match engine.port_kind() {
            Some(kind) => info!("Session: output through {}", kind),
            None => info!("Session: output driven by the host"),
        }

        let (seek_tx, seek_rx) = channel();
        let sos = SignalOfStop::new();
        let exhausted = Arc::new(AtomicBool::new(false));

        let decoder = {
            let engine = Arc::clone(&engine);
            let sos = sos.clone();
            let exhausted = Arc::clone(&exhausted);
            thread::Builder::new()
                .name("audio-decode".into())
                .spawn(move || decode_loop(source, engine, seek_rx, sos, exhausted))
                .map_err(|e| anyhow!("Cannot spawn decode thread: {}", e))?
        };

        Ok(Self {
            engine,
            seek_tx,
            sos,
            decoder: Some(decoder),
            exhausted,
            duration,
        })
    }

    pub fn engine(&self) -> &AudioEngine<FfmpegAudioCodec> {
        &self.engine
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn play(&self) -> Result<()> {
        self.engine.play()?;
        Ok(())
    }

    pub fn pause(&self) -> Result<()> {
        self.engine.pause()?;
        Ok(())
    }

    /// Request a seek; the decode thread applies it before its next packet
    pub fn seek(&self, seconds: f64) -> Result<()> {
        self.exhausted.store(false, Ordering::Release);
        self.seek_tx
            .send(seconds)
            .map_err(|_| anyhow!("Decode thread is not running"))
    }

    /// `true` once decoding ended and every queued sample was played
    pub fn is_finished(&self) -> bool {
        self.exhausted.load(Ordering::Acquire) && self.engine.queue_size() == 0
    }

    /// Stop decoding and drop queued audio
    pub fn unload(&mut self) -> Result<()> {
        if let Some(handle) = self.decoder.take() {
            self.sos.cancel();
            handle
                .join()
                .map_err(|_| anyhow!("Decode thread panicked"))?;
            self.engine.unload()?;
            info!("Session: unloaded");
        }
        Ok(())
    }

    /// Log codec diagnostics and engine health
    pub fn log_info(&self) {
        let engine = &self.engine;
        info!(
            "Session: codec {} ({} Hz, {} ch, {} bps), duration {}",
            engine.codec_name(),
            engine.sample_rate(),
            engine.channel_count(),
            engine.bit_rate(),
            self.duration
                .map(|d| format!("{:.3}s", d))
                .unwrap_or_else(|| "unknown".into())
        );
        info!(
            "Session: output {} Hz, {} ch, position {:.3}s, {} samples queued, {}",
            engine.output_rate(),
            engine.output_channels(),
            engine.position(),
            engine.queue_size(),
            if engine.is_paused() { "paused" } else { "playing" }
        );
        info!("Session: {}", engine.health());
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.unload() {
            warn!("Session: {}", e);
        }
    }
}

fn decode_loop(
    mut source: MediaSource,
    engine: Arc<AudioEngine<FfmpegAudioCodec>>,
    seek_rx: Receiver<f64>,
    sos: SignalOfStop,
    exhausted: Arc<AtomicBool>,
) {
    let time_base = source.time_base();
    let mut at_end = false;

    while !sos.cancelled() {
        // Only the newest pending seek matters
        if let Some(target) = seek_rx.try_iter().last() {
            engine.seek_to(target);
            if let Err(e) = source.seek(target) {
                warn!("Session: {}", e);
            }
            engine.on_seek();
            at_end = false;
            debug!("Session: decode resumed at {:.3}s", target);
        }

        if at_end {
            sos.wait_timeout(IDLE_WAIT);
            continue;
        }

        if engine.is_saturated() {
            sos.wait_timeout(THROTTLE_WAIT);
            continue;
        }

        match source.next_packet() {
            Ok(Some(packet)) => {
                if let Err(e) = engine.decode(&packet, time_base, 1.0, true) {
                    error!("Session: {}, stopping playback", e);
                    if let Err(e) = engine.pause() {
                        warn!("Session: {}", e);
                    }
                    exhausted.store(true, Ordering::Release);
                    return;
                }
            }
            Ok(None) => {
                info!("Session: end of stream");
                at_end = true;
                exhausted.store(true, Ordering::Release);
            }
            Err(e) => {
                error!("Session: {}", e);
                at_end = true;
                exhausted.store(true, Ordering::Release);
            }
        }
    }
    debug!("Session: decode thread stopped");
}
