//! Decode → resample → stamp → enqueue
//!
//! Runs in the decode context. The resampler and staging buffer are built
//! lazily from the first decoded frame and kept for the whole session,
//! including across seeks (a seek only flushes what the resampler still
//! buffers); they are rebuilt only when the decoded format changes. The
//! queue lock is taken once per frame, only for the push.

use super::{AudioCodec, AudioPacket, CodecInfo, Resample, SourceFormat, TimeBase};
use crate::audio::{EngineHealth, Sample, SampleQueue};
use crate::config::TimestampSource;
use crate::error::{AudioError, Result};
use log::{error, info, warn};
use std::sync::Arc;

/// Result of feeding one packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeOutcome {
    /// Packet decoded into `frames` compressed frames
    Consumed { bytes: usize, frames: usize },
    /// This packet could not be decoded; later packets may still succeed
    Failed,
    /// No usable codec for this session
    Inert,
}

impl DecodeOutcome {
    /// Byte count in the host convention: negative on failure, zero when inert
    pub fn bytes_consumed(&self) -> i64 {
        match self {
            DecodeOutcome::Consumed { bytes, .. } => *bytes as i64,
            DecodeOutcome::Failed => -1,
            DecodeOutcome::Inert => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Active,
    /// Codec could not be opened; every call is a no-op
    Inert,
    /// Resampler or staging allocation failed; the session must stop
    Failed,
}

struct ActiveResampler<F> {
    source: SourceFormat,
    inner: Box<dyn Resample<F>>,
}

/// Output frames needed for `samples` source frames: `ceil(samples * output_rate / source_rate)`
pub fn resample_count(samples: usize, output_rate: u32, source_rate: u32) -> usize {
    if source_rate == 0 {
        return samples;
    }
    let num = samples as u64 * output_rate as u64;
    num.div_ceil(source_rate as u64) as usize
}

pub struct AudioDecodePipeline<C: AudioCodec> {
    codec: Option<C>,
    info: CodecInfo,
    state: PipelineState,
    resampler: Option<ActiveResampler<C::Frame>>,
    /// Interleaved stereo output of the resampler
    staging: Vec<i16>,
    /// Samples of one frame, reused between pushes
    batch: Vec<Sample>,
    /// Incremented once per decoded compressed frame
    frame_index: u64,
    /// Expected timestamp of the next frame, used when a packet carries none
    next_timestamp: Option<f64>,
    /// Seek target; frames stamped before it are decoded but not queued
    hold_until: Option<f64>,
    output_rate: u32,
    timestamp_source: TimestampSource,
    queue: Arc<SampleQueue>,
    health: Arc<EngineHealth>,
}

impl<C: AudioCodec> AudioDecodePipeline<C> {
    /// Build the pipeline from the result of opening the codec.
    ///
    /// A codec error makes the pipeline inert for the whole session.
    pub fn new(
        codec: Result<C>,
        output_rate: u32,
        timestamp_source: TimestampSource,
        queue: Arc<SampleQueue>,
        health: Arc<EngineHealth>,
    ) -> Self {
        let (codec, info, state) = match codec {
            Ok(codec) => {
                let info = codec.info();
                info!(
                    "AudioDecodePipeline: codec {} ({} Hz, {} ch, {} bps)",
                    info.name, info.sample_rate, info.channels, info.bit_rate
                );
                (Some(codec), info, PipelineState::Active)
            }
            Err(e) => {
                error!("AudioDecodePipeline: {}, audio disabled for this session", e);
                (None, CodecInfo::none(), PipelineState::Inert)
            }
        };

        Self {
            codec,
            info,
            state,
            resampler: None,
            staging: Vec::new(),
            batch: Vec::new(),
            frame_index: 0,
            next_timestamp: None,
            hold_until: None,
            output_rate: output_rate.max(1),
            timestamp_source,
            queue,
            health,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn info(&self) -> &CodecInfo {
        &self.info
    }

    /// Number of compressed frames decoded so far
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Restart the timeline at `target` after a seek.
    ///
    /// The demuxer lands on a keyframe at or before `target`; frames stamped
    /// before it are held back until the first frame at or past it. Samples
    /// still buffered inside the resampler belong to the old position and are
    /// dropped, the resampler itself is kept.
    pub fn reset_timeline(&mut self, target: f64) {
        self.next_timestamp = Some(target);
        self.hold_until = Some(target);
        if let Some(resampler) = self.resampler.as_mut() {
            resampler.inner.reset();
        }
    }

    /// Decode one packet and, if `add_to_queue`, enqueue its samples.
    ///
    /// Returns `Err` only for allocation failures, after which the pipeline
    /// refuses further work.
    pub fn decode(
        &mut self,
        packet: &AudioPacket,
        time_base: TimeBase,
        add_to_queue: bool,
    ) -> Result<DecodeOutcome> {
        match self.state {
            PipelineState::Active => {}
            PipelineState::Inert => return Ok(DecodeOutcome::Inert),
            PipelineState::Failed => {
                return Err(AudioError::Allocation(
                    "decode pipeline stopped after an allocation failure".into(),
                ));
            }
        }
        let Some(codec) = self.codec.as_mut() else {
            return Ok(DecodeOutcome::Inert);
        };

        let frames = match codec.decode(packet, time_base) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("AudioDecodePipeline: {}", e);
                self.health.record_decode_failure();
                return Ok(DecodeOutcome::Failed);
            }
        };

        let mut timestamp = self
            .timestamp_source
            .select(packet.pts, packet.dts)
            .map(|ts| time_base.to_seconds(ts))
            .or(self.next_timestamp)
            .unwrap_or(0.0);

        let frame_count = frames.len();
        for frame in frames {
            let (source, samples) = match self.codec.as_ref() {
                Some(codec) => (codec.frame_format(&frame), codec.frame_samples(&frame)),
                None => break,
            };

            if let Err(e) = self.prepare(&source, samples) {
                error!("AudioDecodePipeline: {}", e);
                self.state = PipelineState::Failed;
                return Err(e);
            }

            let index = self.frame_index;
            self.frame_index += 1;
            self.health.record_frame_decoded();

            let held = self.hold_until.is_some_and(|target| timestamp < target);
            if !held {
                self.hold_until = None;
            }

            let max_frames = resample_count(samples, self.output_rate, source.sample_rate);
            let Some(resampler) = self.resampler.as_mut() else {
                break;
            };
            let converted =
                resampler
                    .inner
                    .convert(frame, &mut self.staging[..max_frames * 2], max_frames);
            match converted {
                Ok(written) if held => self.health.record_seek_discards(written),
                Ok(written) if add_to_queue => self.enqueue(written, timestamp, index),
                Ok(_) => {}
                Err(e) => {
                    warn!("AudioDecodePipeline: resampling frame {} failed: {}", index, e);
                    self.health.record_decode_failure();
                }
            }

            if source.sample_rate > 0 {
                timestamp += samples as f64 / source.sample_rate as f64;
            }
        }
        self.next_timestamp = Some(timestamp);

        Ok(DecodeOutcome::Consumed {
            bytes: packet.len(),
            frames: frame_count,
        })
    }

    /// Make sure a resampler for `source` and room for `samples` exist
    fn prepare(&mut self, source: &SourceFormat, samples: usize) -> Result<()> {
        let stale = match &self.resampler {
            Some(active) => active.source != *source,
            None => true,
        };
        if stale {
            let Some(codec) = self.codec.as_ref() else {
                return Ok(());
            };
            let inner = codec.open_resampler(source, self.output_rate).map_err(|e| match e {
                AudioError::Allocation(_) => e,
                other => AudioError::Allocation(format!("error allocating resampler: {}", other)),
            })?;
            info!(
                "AudioDecodePipeline: resampling {} -> {} Hz, 2 ch, s16",
                source, self.output_rate
            );
            self.resampler = Some(ActiveResampler {
                source: source.clone(),
                inner,
            });
        }

        // One second of output at minimum, more if a single frame needs it
        let needed = resample_count(samples, self.output_rate, source.sample_rate)
            .max(self.output_rate as usize)
            * 2;
        if self.staging.len() < needed {
            self.staging
                .try_reserve_exact(needed - self.staging.len())
                .map_err(|e| AudioError::Allocation(format!("error allocating samples: {}", e)))?;
            self.staging.resize(needed, 0);
        }
        Ok(())
    }

    fn enqueue(&mut self, written: usize, timestamp: f64, frame_index: u64) {
        self.batch.clear();
        self.batch.extend(
            self.staging[..written * 2]
                .chunks_exact(2)
                .map(|lr| Sample::new(lr[0], lr[1], timestamp, frame_index)),
        );
        let dropped = self.queue.push_batch(&self.batch);
        self.health.record_enqueued(written, dropped);
    }
}
