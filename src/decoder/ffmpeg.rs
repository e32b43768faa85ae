use super::{AudioCodec, AudioPacket, CodecInfo, Resample, SourceFormat, TimeBase};
use crate::error::{AudioError, Result};
use ac_ffmpeg::codec::audio::frame::get_sample_format;
use ac_ffmpeg::codec::audio::{AudioDecoder, AudioFrame, AudioResampler, ChannelLayout};
use ac_ffmpeg::codec::{AudioCodecParameters, Decoder};
use ac_ffmpeg::packet::{Packet, PacketMut};
use ac_ffmpeg::time::{TimeBase as FfTimeBase, Timestamp};
use log::debug;
use std::collections::VecDeque;

impl From<TimeBase> for FfTimeBase {
    fn from(tb: TimeBase) -> Self {
        FfTimeBase::new(tb.num, tb.den)
    }
}

impl From<FfTimeBase> for TimeBase {
    fn from(tb: FfTimeBase) -> Self {
        TimeBase::new(tb.num(), tb.den())
    }
}

/// FFmpeg audio decoder for a demuxed stream
pub struct FfmpegAudioCodec {
    decoder: AudioDecoder,
    info: CodecInfo,
}

unsafe impl Send for FfmpegAudioCodec {}

impl FfmpegAudioCodec {
    /// Open a decoder for the stream described by `params`.
    ///
    /// Fails with [`AudioError::UnsupportedCodec`] if FFmpeg has no decoder
    /// for it or the decoder refuses the parameters.
    pub fn open(params: &AudioCodecParameters, time_base: TimeBase) -> Result<Self> {
        let name = params.decoder_name().ok_or_else(|| {
            AudioError::UnsupportedCodec("no decoder available for the audio stream".into())
        })?;

        let decoder = AudioDecoder::from_codec_parameters(params)
            .and_then(|builder| builder.time_base(time_base.into()).build())
            .map_err(|e| AudioError::UnsupportedCodec(format!("{}: {}", name, e)))?;

        Ok(Self {
            decoder,
            info: CodecInfo {
                name: name.to_string(),
                sample_rate: params.sample_rate(),
                channels: params.channel_layout().channels(),
                bit_rate: params.bit_rate(),
            },
        })
    }

    fn packet(packet: &AudioPacket, time_base: FfTimeBase) -> Packet {
        let mut pkt = PacketMut::from(packet.data.as_ref());
        if let Some(pts) = packet.pts {
            pkt = pkt.with_pts(Timestamp::new(pts, time_base));
        }
        if let Some(dts) = packet.dts {
            pkt = pkt.with_dts(Timestamp::new(dts, time_base));
        }
        pkt.freeze()
    }

    fn drain_frames(&mut self, frames: &mut Vec<AudioFrame>) -> Result<()> {
        while let Some(frame) = self
            .decoder
            .take()
            .map_err(|e| AudioError::Decode(e.to_string()))?
        {
            if frame.samples() > 0 {
                frames.push(frame);
            }
        }
        Ok(())
    }
}

impl AudioCodec for FfmpegAudioCodec {
    type Frame = AudioFrame;

    fn info(&self) -> CodecInfo {
        self.info.clone()
    }

    fn decode(&mut self, packet: &AudioPacket, time_base: TimeBase) -> Result<Vec<AudioFrame>> {
        let time_base: FfTimeBase = time_base.into();
        let mut frames = Vec::new();

        if let Err(e) = self.decoder.try_push(Self::packet(packet, time_base)) {
            if !e.is_again() {
                return Err(AudioError::Decode(e.to_string()));
            }
            // Decoder output is full, drain it and push again
            self.drain_frames(&mut frames)?;
            self.decoder
                .try_push(Self::packet(packet, time_base))
                .map_err(|e| AudioError::Decode(format!("retry failed: {}", e)))?;
        }
        self.drain_frames(&mut frames)?;

        Ok(frames)
    }

    fn frame_format(&self, frame: &AudioFrame) -> SourceFormat {
        SourceFormat {
            sample_rate: frame.sample_rate(),
            channels: frame.channel_layout().channels(),
            sample_format: frame.sample_format().name().to_string(),
        }
    }

    fn frame_samples(&self, frame: &AudioFrame) -> usize {
        frame.samples()
    }

    fn open_resampler(
        &self,
        source: &SourceFormat,
        output_rate: u32,
    ) -> Result<Box<dyn Resample<AudioFrame>>> {
        Ok(Box::new(FfmpegResampler::new(source, output_rate)?))
    }
}

/// Converts decoded frames to interleaved s16 stereo
pub struct FfmpegResampler {
    resampler: AudioResampler,
    /// Converted samples that did not fit the caller's buffer
    pending: VecDeque<i16>,
}

unsafe impl Send for FfmpegResampler {}

impl FfmpegResampler {
    pub fn new(source: &SourceFormat, output_rate: u32) -> Result<Self> {
        let source_layout = ChannelLayout::from_channels(source.channels).ok_or_else(|| {
            AudioError::Allocation(format!("no channel layout for {} channels", source.channels))
        })?;
        let stereo = ChannelLayout::from_channels(2)
            .ok_or_else(|| AudioError::Allocation("no stereo channel layout".into()))?;

        let resampler = AudioResampler::builder()
            .source_channel_layout(source_layout)
            .source_sample_format(get_sample_format(&source.sample_format))
            .source_sample_rate(source.sample_rate)
            .target_channel_layout(stereo)
            .target_sample_format(get_sample_format("s16"))
            .target_sample_rate(output_rate)
            .build()
            .map_err(|e| AudioError::Allocation(format!("error allocating resampler: {}", e)))?;

        Ok(Self {
            resampler,
            pending: VecDeque::new(),
        })
    }
}

impl Resample<AudioFrame> for FfmpegResampler {
    fn convert(&mut self, frame: AudioFrame, staging: &mut [i16], max_frames: usize) -> Result<usize> {
        self.resampler
            .push(frame)
            .map_err(|e| AudioError::Decode(format!("resampler push: {}", e)))?;

        while let Some(out) = self
            .resampler
            .take()
            .map_err(|e| AudioError::Decode(format!("resampler take: {}", e)))?
        {
            let planes = out.planes();
            let Some(plane) = planes.first() else {
                continue;
            };
            let values = out.samples() * 2;
            self.pending.extend(
                plane
                    .data()
                    .chunks_exact(2)
                    .take(values)
                    .map(|b| i16::from_ne_bytes([b[0], b[1]])),
            );
        }

        let frames = (self.pending.len() / 2)
            .min(max_frames)
            .min(staging.len() / 2);
        for (dst, src) in staging.iter_mut().zip(self.pending.drain(..frames * 2)) {
            *dst = src;
        }
        Ok(frames)
    }

    fn reset(&mut self) {
        if !self.pending.is_empty() {
            debug!("FfmpegResampler: dropping {} buffered frames", self.pending.len() / 2);
            self.pending.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ac_ffmpeg::codec::audio::AudioFrameMut;

    fn stereo_s16() -> SourceFormat {
        SourceFormat {
            sample_rate: 48_000,
            channels: 2,
            sample_format: "s16".into(),
        }
    }

    fn silence(samples: usize) -> AudioFrame {
        let layout = ChannelLayout::from_channels(2).unwrap();
        AudioFrameMut::silence(&layout, get_sample_format("s16"), 48_000, samples).freeze()
    }

    #[test]
    fn test_reset_drops_buffered_output() {
        let mut resampler = FfmpegResampler::new(&stereo_s16(), 48_000).unwrap();
        let mut staging = vec![1i16; 2048];

        let written = resampler.convert(silence(1024), &mut staging, 100).unwrap();
        assert_eq!(written, 100);
        assert!(!resampler.pending.is_empty());

        resampler.reset();
        assert!(resampler.pending.is_empty());
    }
}
