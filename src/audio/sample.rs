//! Timestamped stereo PCM sample and gain helpers

/// One stereo 16-bit frame at the output rate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Sample {
    pub left: i16,
    pub right: i16,
    /// Media time in seconds of the compressed frame this sample came from
    pub timestamp: f64,
    /// Ordinal of the decoded compressed frame this sample came from
    pub frame_index: u64,
}

impl Sample {
    pub const fn new(left: i16, right: i16, timestamp: f64, frame_index: u64) -> Self {
        Self {
            left,
            right,
            timestamp,
            frame_index,
        }
    }

    /// Channel values multiplied by `gain`
    #[inline]
    pub fn scaled(&self, gain: f32) -> (i16, i16) {
        (scale(self.left, gain), scale(self.right, gain))
    }
}

#[inline]
fn scale(value: i16, gain: f32) -> i16 {
    // `as` saturates on overflow
    (value as f32 * gain) as i16
}

/// Map a volume slider position to a linear gain.
///
/// The slider is clamped to `[0, 1]` and mapped through `log10(v * 9 + 1)`,
/// so both ends stay fixed at 0 and 1.
pub fn slider_to_gain(slider: f32) -> f32 {
    let v = if slider.is_nan() { 0.0 } else { slider.clamp(0.0, 1.0) };
    (v * 9.0 + 1.0).log10()
}
