//! Compressed audio decoding
//!
//! [`AudioDecodePipeline`] turns compressed packets into timestamped stereo
//! samples in the session's queue. The codec itself sits behind the
//! [`AudioCodec`] seam; [`FfmpegAudioCodec`] is the production implementation.

mod ffmpeg;
mod pipeline;

pub use ffmpeg::{FfmpegAudioCodec, FfmpegResampler};
pub use pipeline::{AudioDecodePipeline, DecodeOutcome, PipelineState, resample_count};

#[cfg(test)]
pub(crate) use pipeline::tests::PcmCodec;

use crate::error::Result;
use bytes::Bytes;

/// One compressed packet of the audio stream
#[derive(Debug, Clone, PartialEq)]
pub struct AudioPacket {
    pub data: Bytes,
    /// Presentation timestamp in stream time-base units
    pub pts: Option<i64>,
    /// Decode timestamp in stream time-base units
    pub dts: Option<i64>,
}

impl AudioPacket {
    pub fn new(data: impl Into<Bytes>, pts: Option<i64>, dts: Option<i64>) -> Self {
        Self {
            data: data.into(),
            pts,
            dts,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Rational time base of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Convert a timestamp in this time base to seconds
    pub fn to_seconds(&self, ts: i64) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        ts as f64 * self.num as f64 / self.den as f64
    }

    /// Convert seconds to a timestamp in this time base, rounding down
    pub fn from_seconds(&self, seconds: f64) -> i64 {
        if self.num == 0 {
            return 0;
        }
        (seconds * self.den as f64 / self.num as f64).floor() as i64
    }
}

/// Layout of decoded frames before resampling
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFormat {
    pub sample_rate: u32,
    pub channels: u32,
    /// FFmpeg sample format name, e.g. `fltp` or `s16`
    pub sample_format: String,
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} Hz, {} ch, {}",
            self.sample_rate, self.channels, self.sample_format
        )
    }
}

/// Codec diagnostics reported to the owning session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodecInfo {
    pub name: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub bit_rate: u64,
}

impl CodecInfo {
    /// Diagnostics of a session without a usable codec
    pub fn none() -> Self {
        Self {
            name: "none".to_string(),
            sample_rate: 0,
            channels: 0,
            bit_rate: 0,
        }
    }
}

/// Compressed-audio codec
pub trait AudioCodec: Send {
    type Frame;

    fn info(&self) -> CodecInfo;

    /// Decode one packet into zero or more frames.
    ///
    /// An error means this packet was lost; the codec stays usable.
    fn decode(&mut self, packet: &AudioPacket, time_base: TimeBase) -> Result<Vec<Self::Frame>>;

    fn frame_format(&self, frame: &Self::Frame) -> SourceFormat;

    /// Samples per channel in `frame`
    fn frame_samples(&self, frame: &Self::Frame) -> usize;

    /// Build a converter from `source` to interleaved 16-bit stereo at `output_rate`
    fn open_resampler(
        &self,
        source: &SourceFormat,
        output_rate: u32,
    ) -> Result<Box<dyn Resample<Self::Frame>>>;
}

/// Converter into interleaved 16-bit stereo
pub trait Resample<F>: Send {
    /// Convert `frame`, writing at most `max_frames` stereo frames into
    /// `staging`. Output beyond that is kept for the next call.
    fn convert(&mut self, frame: F, staging: &mut [i16], max_frames: usize) -> Result<usize>;

    /// Drop output kept from earlier calls, used on seek
    fn reset(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_base_conversion() {
        let tb = TimeBase::new(1, 44_100);
        assert!((tb.to_seconds(44_100) - 1.0).abs() < 1e-12);
        assert_eq!(tb.from_seconds(2.0), 88_200);

        let ms = TimeBase::new(1, 1000);
        assert!((ms.to_seconds(1500) - 1.5).abs() < 1e-12);
        assert_eq!(TimeBase::new(1, 0).to_seconds(10), 0.0);
    }
}
