//! PCM sample formats and fixed-point ↔ float conversion.
//!
//! Every supported encoding gets its own decoder / encoder function; the
//! conversion loops resolve the function pointer once per buffer so the
//! per-sample path is a plain indirect call with no format `match`.
//!
//! Fixed-point values are normalised to `[-1.0, 1.0)` by dividing by
//! `2^(bits-1)`; unsigned encodings are re-centred on their midpoint first.
//! Encoding multiplies back, rounds to nearest and **saturates** at the
//! representable range instead of wrapping.
//!
//! 24-bit formats follow the ALSA layout: a 24-bit value in a 4-byte
//! container, sign-extended on write and read from the low three bytes.
//!
//! # Example
//!
//! ```rust
//! use afe_pipeline::audio::{float_to_pcm, SampleFormat};
//!
//! let mut out = [0u8; 4];
//! float_to_pcm(&[0.5, 2.0], SampleFormat::S16Le, &mut out);
//! assert_eq!(i16::from_le_bytes([out[0], out[1]]), 16_384);
//! assert_eq!(i16::from_le_bytes([out[2], out[3]]), i16::MAX); // saturated
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::channels::PlanarBuffer;

// ---------------------------------------------------------------------------
// SampleFormat
// ---------------------------------------------------------------------------

/// PCM encodings accepted on the host interface.
///
/// Names match the ALSA format identifiers (`"S32_LE"`, `"FLOAT_BE"` …) so a
/// host can pass its own format string straight through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SampleFormat {
    #[serde(rename = "S8")]
    S8,
    #[serde(rename = "U8")]
    U8,
    #[serde(rename = "S16_LE")]
    S16Le,
    #[serde(rename = "S16_BE")]
    S16Be,
    #[serde(rename = "U16_LE")]
    U16Le,
    #[serde(rename = "U16_BE")]
    U16Be,
    #[serde(rename = "S24_LE")]
    S24Le,
    #[serde(rename = "S24_BE")]
    S24Be,
    #[serde(rename = "U24_LE")]
    U24Le,
    #[serde(rename = "U24_BE")]
    U24Be,
    #[serde(rename = "S32_LE")]
    S32Le,
    #[serde(rename = "S32_BE")]
    S32Be,
    #[serde(rename = "U32_LE")]
    U32Le,
    #[serde(rename = "U32_BE")]
    U32Be,
    #[serde(rename = "FLOAT_LE")]
    FloatLe,
    #[serde(rename = "FLOAT_BE")]
    FloatBe,
    #[serde(rename = "FLOAT64_LE")]
    Float64Le,
    #[serde(rename = "FLOAT64_BE")]
    Float64Be,
}

impl SampleFormat {
    /// Every supported format, in the order they are advertised to hosts.
    pub const ALL: [SampleFormat; 18] = [
        SampleFormat::S8,
        SampleFormat::U8,
        SampleFormat::S16Le,
        SampleFormat::S16Be,
        SampleFormat::U16Le,
        SampleFormat::U16Be,
        SampleFormat::S24Le,
        SampleFormat::S24Be,
        SampleFormat::U24Le,
        SampleFormat::U24Be,
        SampleFormat::S32Le,
        SampleFormat::S32Be,
        SampleFormat::U32Le,
        SampleFormat::U32Be,
        SampleFormat::FloatLe,
        SampleFormat::FloatBe,
        SampleFormat::Float64Le,
        SampleFormat::Float64Be,
    ];

    /// ALSA-style identifier, e.g. `"S32_LE"`.
    pub fn name(self) -> &'static str {
        match self {
            SampleFormat::S8 => "S8",
            SampleFormat::U8 => "U8",
            SampleFormat::S16Le => "S16_LE",
            SampleFormat::S16Be => "S16_BE",
            SampleFormat::U16Le => "U16_LE",
            SampleFormat::U16Be => "U16_BE",
            SampleFormat::S24Le => "S24_LE",
            SampleFormat::S24Be => "S24_BE",
            SampleFormat::U24Le => "U24_LE",
            SampleFormat::U24Be => "U24_BE",
            SampleFormat::S32Le => "S32_LE",
            SampleFormat::S32Be => "S32_BE",
            SampleFormat::U32Le => "U32_LE",
            SampleFormat::U32Be => "U32_BE",
            SampleFormat::FloatLe => "FLOAT_LE",
            SampleFormat::FloatBe => "FLOAT_BE",
            SampleFormat::Float64Le => "FLOAT64_LE",
            SampleFormat::Float64Be => "FLOAT64_BE",
        }
    }

    /// Bytes occupied by one sample of one channel.
    pub fn width(self) -> usize {
        match self {
            SampleFormat::S8 | SampleFormat::U8 => 1,
            SampleFormat::S16Le | SampleFormat::S16Be | SampleFormat::U16Le | SampleFormat::U16Be => 2,
            SampleFormat::Float64Le | SampleFormat::Float64Be => 8,
            _ => 4,
        }
    }

    /// Decoder for one sample of this format. `bytes.len()` must equal
    /// [`width`](Self::width).
    pub fn decoder(self) -> fn(&[u8]) -> f32 {
        match self {
            SampleFormat::S8 => |b| signed_to_float(b[0] as i8 as i64, 8),
            SampleFormat::U8 => |b| unsigned_to_float(b[0] as u64, 8),
            SampleFormat::S16Le => |b| signed_to_float(i16::from_le_bytes([b[0], b[1]]) as i64, 16),
            SampleFormat::S16Be => |b| signed_to_float(i16::from_be_bytes([b[0], b[1]]) as i64, 16),
            SampleFormat::U16Le => |b| unsigned_to_float(u16::from_le_bytes([b[0], b[1]]) as u64, 16),
            SampleFormat::U16Be => |b| unsigned_to_float(u16::from_be_bytes([b[0], b[1]]) as u64, 16),
            SampleFormat::S24Le => |b| signed_to_float(sign_extend_24(le_u32(b)), 24),
            SampleFormat::S24Be => |b| signed_to_float(sign_extend_24(be_u32(b)), 24),
            SampleFormat::U24Le => |b| unsigned_to_float((le_u32(b) & 0x00FF_FFFF) as u64, 24),
            SampleFormat::U24Be => |b| unsigned_to_float((be_u32(b) & 0x00FF_FFFF) as u64, 24),
            SampleFormat::S32Le => |b| signed_to_float(le_u32(b) as i32 as i64, 32),
            SampleFormat::S32Be => |b| signed_to_float(be_u32(b) as i32 as i64, 32),
            SampleFormat::U32Le => |b| unsigned_to_float(le_u32(b) as u64, 32),
            SampleFormat::U32Be => |b| unsigned_to_float(be_u32(b) as u64, 32),
            SampleFormat::FloatLe => |b| f32::from_bits(le_u32(b)),
            SampleFormat::FloatBe => |b| f32::from_bits(be_u32(b)),
            SampleFormat::Float64Le => |b| f64::from_bits(le_u64(b)) as f32,
            SampleFormat::Float64Be => |b| f64::from_bits(be_u64(b)) as f32,
        }
    }

    /// Encoder for one sample of this format. `out.len()` must equal
    /// [`width`](Self::width).
    pub fn encoder(self) -> fn(f32, &mut [u8]) {
        match self {
            SampleFormat::S8 => |x, out| out[0] = float_to_signed(x, 8) as i8 as u8,
            SampleFormat::U8 => |x, out| out[0] = float_to_unsigned(x, 8) as u8,
            SampleFormat::S16Le => {
                |x, out| out.copy_from_slice(&(float_to_signed(x, 16) as i16).to_le_bytes())
            }
            SampleFormat::S16Be => {
                |x, out| out.copy_from_slice(&(float_to_signed(x, 16) as i16).to_be_bytes())
            }
            SampleFormat::U16Le => {
                |x, out| out.copy_from_slice(&(float_to_unsigned(x, 16) as u16).to_le_bytes())
            }
            SampleFormat::U16Be => {
                |x, out| out.copy_from_slice(&(float_to_unsigned(x, 16) as u16).to_be_bytes())
            }
            SampleFormat::S24Le => {
                |x, out| out.copy_from_slice(&(float_to_signed(x, 24) as i32).to_le_bytes())
            }
            SampleFormat::S24Be => {
                |x, out| out.copy_from_slice(&(float_to_signed(x, 24) as i32).to_be_bytes())
            }
            SampleFormat::U24Le => {
                |x, out| out.copy_from_slice(&(float_to_unsigned(x, 24) as u32).to_le_bytes())
            }
            SampleFormat::U24Be => {
                |x, out| out.copy_from_slice(&(float_to_unsigned(x, 24) as u32).to_be_bytes())
            }
            SampleFormat::S32Le => {
                |x, out| out.copy_from_slice(&(float_to_signed(x, 32) as i32).to_le_bytes())
            }
            SampleFormat::S32Be => {
                |x, out| out.copy_from_slice(&(float_to_signed(x, 32) as i32).to_be_bytes())
            }
            SampleFormat::U32Le => {
                |x, out| out.copy_from_slice(&(float_to_unsigned(x, 32) as u32).to_le_bytes())
            }
            SampleFormat::U32Be => {
                |x, out| out.copy_from_slice(&(float_to_unsigned(x, 32) as u32).to_be_bytes())
            }
            SampleFormat::FloatLe => |x, out| out.copy_from_slice(&x.to_le_bytes()),
            SampleFormat::FloatBe => |x, out| out.copy_from_slice(&x.to_be_bytes()),
            SampleFormat::Float64Le => |x, out| out.copy_from_slice(&(x as f64).to_le_bytes()),
            SampleFormat::Float64Be => |x, out| out.copy_from_slice(&(x as f64).to_be_bytes()),
        }
    }
}

impl Default for SampleFormat {
    fn default() -> Self {
        SampleFormat::S32Le
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Returned by [`SampleFormat::from_str`] for an unrecognised name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown sample format {0:?}")]
pub struct UnknownSampleFormat(pub String);

impl FromStr for SampleFormat {
    type Err = UnknownSampleFormat;

    /// Case-insensitive lookup by ALSA name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        SampleFormat::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownSampleFormat(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Scalar helpers
// ---------------------------------------------------------------------------

fn le_u32(b: &[u8]) -> u32 {
    u32::from_le_bytes([b[0], b[1], b[2], b[3]])
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

fn le_u64(b: &[u8]) -> u64 {
    u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

fn be_u64(b: &[u8]) -> u64 {
    u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]])
}

/// Interpret the low 24 bits of a container as a signed value.
fn sign_extend_24(raw: u32) -> i64 {
    (((raw << 8) as i32) >> 8) as i64
}

fn full_scale(bits: u32) -> f64 {
    (1u64 << (bits - 1)) as f64
}

fn signed_to_float(v: i64, bits: u32) -> f32 {
    (v as f64 / full_scale(bits)) as f32
}

fn unsigned_to_float(v: u64, bits: u32) -> f32 {
    let mid = 1i64 << (bits - 1);
    ((v as i64 - mid) as f64 / full_scale(bits)) as f32
}

/// Round to nearest and saturate into `[-2^(bits-1), 2^(bits-1) - 1]`.
/// NaN encodes as zero.
fn float_to_signed(x: f32, bits: u32) -> i64 {
    let scale = full_scale(bits);
    let scaled = (x as f64 * scale).round();
    if scaled.is_nan() {
        return 0;
    }
    scaled.clamp(-scale, scale - 1.0) as i64
}

fn float_to_unsigned(x: f32, bits: u32) -> u64 {
    (float_to_signed(x, bits) + (1i64 << (bits - 1))) as u64
}

// ---------------------------------------------------------------------------
// Buffer conversion
// ---------------------------------------------------------------------------

/// De-interleave `src` into `dst`, one plane per channel.
///
/// `src` must hold exactly `dst.frames() × dst.channels()` samples of
/// `format`; any trailing partial frame is ignored.
pub fn pcm_to_planar(src: &[u8], format: SampleFormat, dst: &mut PlanarBuffer) {
    let width = format.width();
    let channels = dst.channels();
    let frames = dst.frames();
    debug_assert_eq!(src.len(), frames * channels * width);

    let decode = format.decoder();
    let frame_bytes = channels * width;
    for (i, frame) in src.chunks_exact(frame_bytes).take(frames).enumerate() {
        for (ch, sample) in frame.chunks_exact(width).enumerate() {
            dst.channel_mut(ch)[i] = decode(sample);
        }
    }
}

/// Encode `src` (mono or already interleaved) into `dst`.
///
/// Writes `min(src.len(), dst.len() / width)` samples.
pub fn float_to_pcm(src: &[f32], format: SampleFormat, dst: &mut [u8]) {
    let encode = format.encoder();
    for (&x, out) in src.iter().zip(dst.chunks_exact_mut(format.width())) {
        encode(x, out);
    }
}

/// Fill `dst` with encoded silence (midpoint for unsigned formats).
pub fn fill_silence(format: SampleFormat, dst: &mut [u8]) {
    let encode = format.encoder();
    for out in dst.chunks_exact_mut(format.width()) {
        encode(0.0, out);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(format: SampleFormat, bytes: &[u8]) -> Vec<u8> {
        let x = format.decoder()(bytes);
        let mut out = vec![0u8; format.width()];
        format.encoder()(x, &mut out);
        out
    }

    // ---- Names / widths ----------------------------------------------------

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("s32_le".parse::<SampleFormat>().unwrap(), SampleFormat::S32Le);
        assert_eq!("FLOAT64_BE".parse::<SampleFormat>().unwrap(), SampleFormat::Float64Be);
    }

    #[test]
    fn parse_rejects_unknown() {
        let err = "S20_3LE".parse::<SampleFormat>().unwrap_err();
        assert!(err.to_string().contains("S20_3LE"));
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for f in SampleFormat::ALL {
            assert_eq!(f.name().parse::<SampleFormat>().unwrap(), f);
        }
    }

    #[test]
    fn widths_follow_alsa_containers() {
        assert_eq!(SampleFormat::U8.width(), 1);
        assert_eq!(SampleFormat::S16Be.width(), 2);
        assert_eq!(SampleFormat::S24Le.width(), 4);
        assert_eq!(SampleFormat::S32Le.width(), 4);
        assert_eq!(SampleFormat::FloatLe.width(), 4);
        assert_eq!(SampleFormat::Float64Le.width(), 8);
    }

    #[test]
    fn serde_uses_alsa_names() {
        #[derive(Serialize, Deserialize)]
        struct Wrap {
            f: SampleFormat,
        }
        let s = toml::to_string(&Wrap { f: SampleFormat::U24Be }).unwrap();
        assert!(s.contains("\"U24_BE\""), "{s}");
        let back: Wrap = toml::from_str(&s).unwrap();
        assert_eq!(back.f, SampleFormat::U24Be);
    }

    // ---- Exact round trips -------------------------------------------------

    #[test]
    fn s16_round_trip_is_exact_for_every_value() {
        for v in i16::MIN..=i16::MAX {
            let le = v.to_le_bytes();
            assert_eq!(round_trip(SampleFormat::S16Le, &le), le);
            let be = v.to_be_bytes();
            assert_eq!(round_trip(SampleFormat::S16Be, &be), be);
        }
    }

    #[test]
    fn u16_round_trip_is_exact_for_every_value() {
        for v in u16::MIN..=u16::MAX {
            let le = v.to_le_bytes();
            assert_eq!(round_trip(SampleFormat::U16Le, &le), le);
        }
    }

    #[test]
    fn eight_bit_round_trip_is_exact() {
        for v in 0..=255u8 {
            assert_eq!(round_trip(SampleFormat::S8, &[v]), [v]);
            assert_eq!(round_trip(SampleFormat::U8, &[v]), [v]);
        }
    }

    #[test]
    fn s24_round_trip_is_exact_across_range() {
        let edges = [-(1i32 << 23), -(1 << 23) + 1, -1, 0, 1, (1 << 23) - 1];
        let sweep = (-(1i32 << 23)..(1 << 23)).step_by(4099);
        for v in edges.into_iter().chain(sweep) {
            let le = v.to_le_bytes();
            assert_eq!(round_trip(SampleFormat::S24Le, &le), le, "value {v}");
            let be = v.to_be_bytes();
            assert_eq!(round_trip(SampleFormat::S24Be, &be), be, "value {v}");
        }
    }

    #[test]
    fn s32_round_trip_is_exact_for_float_representable_values() {
        // f32 carries 24 significant bits: every i32 that fits them survives.
        let edges = [i32::MIN, i32::MIN + 256, -256, -1, 0, 1, 255, 1 << 24, i32::MAX - 127];
        let sweep = (i32::MIN..i32::MAX - 256).step_by(9_999_991).map(|v| v & !0xFF);
        for v in edges.into_iter().chain(sweep) {
            let le = v.to_le_bytes();
            assert_eq!(round_trip(SampleFormat::S32Le, &le), le, "value {v}");
            let be = v.to_be_bytes();
            assert_eq!(round_trip(SampleFormat::S32Be, &be), be, "value {v}");
        }
    }

    #[test]
    fn u32_midpoint_decodes_to_zero() {
        let mid = (1u32 << 31).to_le_bytes();
        assert_eq!(SampleFormat::U32Le.decoder()(&mid), 0.0);
    }

    #[test]
    fn float_formats_pass_values_through() {
        for f in [SampleFormat::FloatLe, SampleFormat::FloatBe, SampleFormat::Float64Le] {
            let mut out = vec![0u8; f.width()];
            f.encoder()(0.123_456, &mut out);
            assert_eq!(f.decoder()(&out), 0.123_456);
        }
    }

    // ---- Saturation --------------------------------------------------------

    #[test]
    fn encoding_saturates_instead_of_wrapping() {
        let mut out = [0u8; 4];
        SampleFormat::S32Le.encoder()(1.5, &mut out);
        assert_eq!(i32::from_le_bytes(out), i32::MAX);
        SampleFormat::S32Le.encoder()(-7.0, &mut out);
        assert_eq!(i32::from_le_bytes(out), i32::MIN);

        let mut out = [0u8; 2];
        SampleFormat::U16Be.encoder()(1.0, &mut out);
        assert_eq!(u16::from_be_bytes(out), u16::MAX);
        SampleFormat::U16Be.encoder()(-1.0, &mut out);
        assert_eq!(u16::from_be_bytes(out), 0);
    }

    #[test]
    fn nan_encodes_as_silence() {
        let mut out = [0xAAu8; 2];
        SampleFormat::S16Le.encoder()(f32::NAN, &mut out);
        assert_eq!(out, [0, 0]);
    }

    #[test]
    fn s24_encoding_is_sign_extended() {
        let mut out = [0u8; 4];
        SampleFormat::S24Le.encoder()(-1.0, &mut out);
        assert_eq!(i32::from_le_bytes(out), -(1 << 23));
        SampleFormat::S24Le.encoder()(1.0, &mut out);
        assert_eq!(i32::from_le_bytes(out), (1 << 23) - 1);
    }

    // ---- Buffer conversion -------------------------------------------------

    #[test]
    fn pcm_to_planar_deinterleaves() {
        // 3 frames × 2 channels of S16_LE: L = 1,2,3  R = -1,-2,-3
        let samples: [i16; 6] = [1, -1, 2, -2, 3, -3];
        let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut planar = PlanarBuffer::new(2, 3);
        pcm_to_planar(&bytes, SampleFormat::S16Le, &mut planar);

        let scale = 32_768.0;
        let left: Vec<f32> = planar.channel(0).iter().map(|x| x * scale).collect();
        let right: Vec<f32> = planar.channel(1).iter().map(|x| x * scale).collect();
        assert_eq!(left, vec![1.0, 2.0, 3.0]);
        assert_eq!(right, vec![-1.0, -2.0, -3.0]);
    }

    #[test]
    fn float_to_pcm_stops_at_shorter_side() {
        let mut dst = [0xFFu8; 4];
        float_to_pcm(&[0.0, 0.0, 0.0], SampleFormat::S16Le, &mut dst);
        assert_eq!(dst, [0, 0, 0, 0]);

        let mut dst = [0xFFu8; 6];
        float_to_pcm(&[0.0], SampleFormat::S16Le, &mut dst);
        assert_eq!(dst, [0, 0, 0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn silence_for_unsigned_is_midpoint() {
        let mut dst = [0u8; 4];
        fill_silence(SampleFormat::U16Le, &mut dst);
        assert_eq!(dst, [0x00, 0x80, 0x00, 0x80]);
    }
}
