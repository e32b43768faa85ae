//! Demuxed media file feeding the decode context

use crate::decoder::{AudioPacket, FfmpegAudioCodec, TimeBase};
use crate::error::AudioError;
use ac_ffmpeg::codec::AudioCodecParameters;
use ac_ffmpeg::format::demuxer::{Demuxer, DemuxerWithStreamInfo, SeekTarget};
use ac_ffmpeg::format::io::IO;
use ac_ffmpeg::time::Timestamp;
use anyhow::{Result, anyhow};
use bytes::Bytes;
use log::{info, warn};
use std::fs::File;
use std::path::Path;

struct AudioStream {
    index: usize,
    params: AudioCodecParameters,
    time_base: TimeBase,
}

/// Media file opened with the FFmpeg demuxer, restricted to its first audio stream
pub struct MediaSource {
    demuxer: DemuxerWithStreamInfo<File>,
    audio: Option<AudioStream>,
    duration: Option<f64>,
}

unsafe impl Send for MediaSource {}

impl MediaSource {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| anyhow!("Cannot open {}: {}", path.display(), e))?;
        let io = IO::from_seekable_read_stream(file);

        let demuxer = Demuxer::builder()
            .build(io)
            .map_err(|e| anyhow!("Unrecognized media format: {}", e))?
            .find_stream_info(None)
            .map_err(|(_, e)| anyhow!("Cannot read stream info: {}", e))?;

        let mut audio = None;
        let mut duration = None;
        for (index, stream) in demuxer.streams().iter().enumerate() {
            let codec_params = stream.codec_parameters();
            let Some(params) = codec_params.as_audio_codec_parameters() else {
                continue;
            };
            let time_base: TimeBase = stream.time_base().into();
            let length = stream.duration();
            if !length.is_null() {
                duration = Some(time_base.to_seconds(length.timestamp()));
            }
            audio = Some(AudioStream {
                index,
                params: params.clone(),
                time_base,
            });
            break;
        }

        match &audio {
            Some(stream) => info!(
                "MediaSource: {} audio stream #{} ({} Hz, {} ch), duration {:?}",
                path.display(),
                stream.index,
                stream.params.sample_rate(),
                stream.params.channel_layout().channels(),
                duration
            ),
            None => warn!("MediaSource: {} has no audio stream", path.display()),
        }

        Ok(Self {
            demuxer,
            audio,
            duration,
        })
    }

    /// Open a decoder for the audio stream
    pub fn open_codec(&self) -> crate::error::Result<FfmpegAudioCodec> {
        match &self.audio {
            Some(stream) => FfmpegAudioCodec::open(&stream.params, stream.time_base),
            None => Err(AudioError::UnsupportedCodec("no audio stream".into())),
        }
    }

    pub fn time_base(&self) -> TimeBase {
        self.audio
            .as_ref()
            .map(|s| s.time_base)
            .unwrap_or(TimeBase::new(1, 1))
    }

    /// Duration of the audio stream in seconds, if the container reports one
    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    /// Next packet of the audio stream, `None` at end of stream
    pub fn next_packet(&mut self) -> Result<Option<AudioPacket>> {
        let Some(index) = self.audio.as_ref().map(|s| s.index) else {
            return Ok(None);
        };

        while let Some(packet) = self
            .demuxer
            .take()
            .map_err(|e| anyhow!("Demuxer error: {}", e))?
        {
            if packet.stream_index() != index {
                continue;
            }
            return Ok(Some(AudioPacket {
                data: Bytes::copy_from_slice(packet.data()),
                pts: timestamp(packet.pts()),
                dts: timestamp(packet.dts()),
            }));
        }
        Ok(None)
    }

    /// Move the demuxer to the nearest position at or before `seconds`
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        let target = Timestamp::from_micros((seconds.max(0.0) * 1_000_000.0) as i64);
        self.demuxer
            .seek_to_timestamp(target, SeekTarget::UpTo)
            .map_err(|e| anyhow!("Seek to {:.3}s failed: {}", seconds, e))
    }
}

fn timestamp(ts: Timestamp) -> Option<i64> {
    if ts.is_null() { None } else { Some(ts.timestamp()) }
}
