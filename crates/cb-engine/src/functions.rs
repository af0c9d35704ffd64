//! Pan and volume gain curves, and float-to-byte PCM packing.
//!
//! The curves are pure total functions: inputs are clamped into the
//! control domain before evaluation. Curve selection is per cue; the
//! mixing loop resolves gains once per buffer and re-evaluates only when
//! smoothing moved the underlying parameter.

use std::f32::consts::FRAC_PI_2;

use crate::error::CueError;

/// Volume-based stereo panning curve, mapping a pan control in
/// `[-1, 1]` (full left to full right) to per-channel gain factors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PanType {
    /// Straight crossfade from edge to edge; the summed volume dips at
    /// the center.
    FullLinear,
    /// Full volume across a central region, tapering only the far
    /// channel; unity gain on both channels at center.
    LrCutLinear,
    /// Square-root tapers, constant combined power.
    SquareLaw,
    /// Sine/cosine tapers, constant combined power with a gentler knee.
    #[default]
    SineLaw,
}

impl PanType {
    /// Left-channel gain for a pan setting.
    pub fn left(self, pan: f32) -> f32 {
        let x = pan.clamp(-1.0, 1.0);
        match self {
            PanType::FullLinear => 1.0 - (1.0 + x) / 2.0,
            PanType::LrCutLinear => (1.0 - x).clamp(0.0, 1.0),
            PanType::SquareLaw => (1.0 - (1.0 + x) / 2.0).sqrt(),
            PanType::SineLaw => (FRAC_PI_2 * (1.0 - (1.0 + x) / 2.0)).sin(),
        }
    }

    /// Right-channel gain for a pan setting.
    pub fn right(self, pan: f32) -> f32 {
        let x = pan.clamp(-1.0, 1.0);
        match self {
            PanType::FullLinear => (1.0 + x) / 2.0,
            PanType::LrCutLinear => (1.0 + x).clamp(0.0, 1.0),
            PanType::SquareLaw => ((1.0 + x) / 2.0).sqrt(),
            PanType::SineLaw => (FRAC_PI_2 * ((1.0 + x) / 2.0)).sin(),
        }
    }
}

/// Volume curve, mapping a linear control in `[0, 1]` to a gain factor.
///
/// The linear control is not proportional to perceived loudness; the
/// power curves approximate it increasingly well, with `ExpX4` close to
/// a 60 dB perceptual fade.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VolType {
    /// Gain equals the control value.
    Linear,
    /// Control squared.
    ExpX2,
    /// Control cubed.
    ExpX3,
    /// Control to the fourth power.
    #[default]
    ExpX4,
    /// Control to the fifth power.
    ExpX5,
    /// True exponential 60 dB fade: `exp(x * 6.908) / 1000`, with an
    /// exact zero at `x = 0`.
    Exp60Db,
}

impl VolType {
    /// Gain factor for a volume control setting.
    pub fn apply(self, volume: f32) -> f32 {
        let x = volume.clamp(0.0, 1.0);
        match self {
            VolType::Linear => x,
            VolType::ExpX2 => x * x,
            VolType::ExpX3 => x * x * x,
            VolType::ExpX4 => (x * x) * (x * x),
            VolType::ExpX5 => (x * x) * (x * x) * x,
            VolType::Exp60Db => {
                if x == 0.0 {
                    0.0
                } else {
                    (x * 6.908).exp() / 1000.0
                }
            }
        }
    }
}

/// Converts signed normalized float PCM to 16-bit little-endian bytes.
///
/// `audio_bytes` must be exactly twice the length of `source_pcm`; each
/// float is scaled by 32767 and truncated toward zero. Values are
/// assumed to be clamped to `[-1, 1]` upstream.
pub fn pcm_to_audio_bytes(audio_bytes: &mut [u8], source_pcm: &[f32]) -> Result<(), CueError> {
    if audio_bytes.len() != source_pcm.len() * 2 {
        return Err(CueError::LengthMismatch {
            expected: source_pcm.len() * 2,
            actual: audio_bytes.len(),
        });
    }

    for (i, &x) in source_pcm.iter().enumerate() {
        let sample = (x * 32767.0) as i16;
        let [lo, hi] = sample.to_le_bytes();
        audio_bytes[i * 2] = lo;
        audio_bytes[i * 2 + 1] = hi;
    }

    Ok(())
}
