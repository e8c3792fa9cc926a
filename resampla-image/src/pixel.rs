//! Fixed-point sample format and the byte <-> fixed-point codecs.
//!
//! A fixed-point sample is an `i16` where byte `0` maps to [`FIXED_MIN`] and byte `255` to [`FIXED_MAX`],
//! `128` units per byte step. The half of the `i16` range left unused is headroom for kernel
//! overshoot, values are only clamped when converting back to bytes.
//!
//! Color channels of sRGB images are linearized through [`SrgbTables`], alpha is only ever scaled.
use ::bytemuck::{cast_slice, cast_slice_mut};
use ::once_cell::sync::Lazy;

use crate::{ColorSpace, PixelLayout};

/// Fixed-point value of byte `0`
pub const FIXED_MIN: i16 = -16384;
/// Fixed-point value of byte `255`
pub const FIXED_MAX: i16 = 16256;
/// `FIXED_MAX - FIXED_MIN`, also `255 * FIXED_STEP`
pub const FIXED_RANGE: i32 = 32640;
/// Fixed-point units per byte step
pub const FIXED_STEP: i32 = 128;

/// Linear light to sRGB encoded, both in `[0, 1]`
#[inline]
pub fn to_srgb(f: f64) -> f64 {
    if f < 0.0031308 {
        f * 12.92
    } else {
        1.055 * f.powf(1. / 2.4) - 0.055
    }
}
/// sRGB encoded to linear light, both in `[0, 1]`
#[inline]
pub fn from_srgb(f: f64) -> f64 {
    if f < 0.04045 {
        f / 12.92
    } else {
        ((f + 0.055) / 1.055).powf(2.4)
    }
}

/// Byte to fixed-point without linearization
#[inline(always)]
pub fn byte_to_fixed(b: u8) -> i16 { ((i32::from(b) << 7) + i32::from(FIXED_MIN)) as i16 }
/// Distance of a fixed-point value above [`FIXED_MIN`], clamped to `[0, FIXED_RANGE]`
#[inline(always)]
fn clamped_offset(s: i16) -> i32 { (i32::from(s) - i32::from(FIXED_MIN)).clamp(0, FIXED_RANGE) }
/// Fixed-point to byte without linearization, clamps overshoot
#[inline(always)]
pub fn fixed_to_byte(s: i16) -> u8 { (clamped_offset(s) >> 7) as u8 }

/// sRGB transfer lookup tables, built once on first use and immutable afterwards
pub struct SrgbTables {
    /// sRGB byte to linear fixed-point
    pub byte_to_fixed: [i16; 256],
    /// [`byte_to_fixed`](Self::byte_to_fixed) shifted up by `-FIXED_MIN`, in `[0, FIXED_RANGE]`
    pub byte_to_offset: [i32; 256],
    /// Linear fixed-point (indexed by `s as u16`) to sRGB byte
    fixed_to_byte: Box<[u8]>,
    /// Linear fixed-point shifted up by `-FIXED_MIN` (indexed by `(s - FIXED_MIN) & 0xFFFF`) to sRGB byte
    offset_to_byte: Box<[u8]>,
}
impl SrgbTables {
    fn build() -> Self {
        let mut byte_to_fixed = [0i16; 256];
        let mut byte_to_offset = [0i32; 256];
        for b in 0..256usize {
            let v = (from_srgb(b as f64 / 255.) * f64::from(FIXED_RANGE) + f64::from(FIXED_MIN) + 0.5).floor() as i32;
            byte_to_fixed[b] = v as i16;
            byte_to_offset[b] = v - i32::from(FIXED_MIN);
        }
        let mut fixed_to_byte = vec![0u8; 1 << 16].into_boxed_slice();
        let mut offset_to_byte = vec![0u8; 1 << 16].into_boxed_slice();
        for s in i16::MIN..=i16::MAX {
            let f = f64::from(clamped_offset(s)) / f64::from(FIXED_RANGE);
            let b = (to_srgb(f) * 255. + 0.5).floor() as u8;
            fixed_to_byte[usize::from(s as u16)] = b;
            offset_to_byte[((i32::from(s) - i32::from(FIXED_MIN)) & 0xFFFF) as usize] = b;
        }
        Self { byte_to_fixed, byte_to_offset, fixed_to_byte, offset_to_byte }
    }
    /// Linear fixed-point to sRGB byte, clamps overshoot
    #[inline(always)]
    pub fn fixed_to_byte(&self, s: i16) -> u8 { self.fixed_to_byte[usize::from(s as u16)] }
    /// Like [`fixed_to_byte`](Self::fixed_to_byte) for a value already shifted up by `-FIXED_MIN`
    #[inline(always)]
    pub fn offset_to_byte(&self, v: i32) -> u8 { self.offset_to_byte[(v & 0xFFFF) as usize] }
}

static SRGB_TABLES: Lazy<SrgbTables> = Lazy::new(SrgbTables::build);

/// The process-wide sRGB tables
#[inline]
pub fn srgb_tables() -> &'static SrgbTables { &SRGB_TABLES }

/// Channel layouts with alpha, alpha is always the last channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlphaLayout {
    GrayAlpha,
    Rgba,
}
impl AlphaLayout {
    #[inline]
    pub const fn channels(self) -> usize {
        match self {
            Self::GrayAlpha => 2,
            Self::Rgba => 4,
        }
    }
}

/// How samples are converted into and out of the fixed-point pipeline.
///
/// Selected once per resize from the image flags, see [`Codec::select`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Affine scaling only, every channel alike
    Plain,
    /// sRGB table on every channel, no alpha present
    Linear,
    /// Affine scaling, color premultiplied by alpha on the way in and divided by it on the way out
    Premultiply(AlphaLayout),
    /// sRGB table on color, affine alpha, no premultiplication
    LinearAlpha(AlphaLayout),
    /// sRGB table on color then premultiplied by alpha
    LinearPremultiply(AlphaLayout),
}

macro_rules! by_alpha_layout {
    ($layout:expr, $f:ident($($arg:expr),*)) => {
        match $layout {
            AlphaLayout::GrayAlpha => $f::<2>($($arg),*),
            AlphaLayout::Rgba => $f::<4>($($arg),*),
        }
    };
}

impl Codec {
    /// Pick the codec for an image, a pure function of its flags and the two opt-outs.
    ///
    /// Linear images, or any image when `ignore_color_space` is set, are not linearized. Straight alpha is
    /// premultiplied unless `skip_premultiply` is set.
    pub fn select(
        layout: PixelLayout,
        color_space: ColorSpace,
        premultiplied: bool,
        ignore_color_space: bool,
        skip_premultiply: bool,
    ) -> Self {
        let linearize = color_space == ColorSpace::Srgb && !ignore_color_space;
        let keep_alpha = premultiplied || skip_premultiply;
        match (layout.alpha_layout(), linearize) {
            (None, false) => Self::Plain,
            (None, true) => Self::Linear,
            (Some(_), false) if keep_alpha => Self::Plain,
            (Some(a), false) => Self::Premultiply(a),
            (Some(a), true) if keep_alpha => Self::LinearAlpha(a),
            (Some(a), true) => Self::LinearPremultiply(a),
        }
    }
    /// Convert interleaved bytes into fixed-point samples, `src` and `dst` have the same length
    pub fn encode(self, src: &[u8], dst: &mut [i16]) {
        debug_assert_eq!(src.len(), dst.len());
        match self {
            Self::Plain => encode_plain(src, dst),
            Self::Linear => encode_linear(src, dst),
            Self::Premultiply(a) => by_alpha_layout!(a, encode_premultiply(src, dst)),
            Self::LinearAlpha(a) => by_alpha_layout!(a, encode_linear_alpha(src, dst)),
            Self::LinearPremultiply(a) => by_alpha_layout!(a, encode_linear_premultiply(src, dst)),
        }
    }
    /// Convert fixed-point samples back into interleaved bytes, `src` and `dst` have the same length
    pub fn decode(self, src: &[i16], dst: &mut [u8]) {
        debug_assert_eq!(src.len(), dst.len());
        match self {
            Self::Plain => decode_plain(src, dst),
            Self::Linear => decode_linear(src, dst),
            Self::Premultiply(a) => by_alpha_layout!(a, decode_premultiply(src, dst)),
            Self::LinearAlpha(a) => by_alpha_layout!(a, decode_linear_alpha(src, dst)),
            Self::LinearPremultiply(a) => by_alpha_layout!(a, decode_linear_premultiply(src, dst)),
        }
    }
}

#[inline]
fn encode_plain(src: &[u8], dst: &mut [i16]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = byte_to_fixed(s);
    }
}
#[inline]
fn decode_plain(src: &[i16], dst: &mut [u8]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = fixed_to_byte(s);
    }
}

#[inline]
fn encode_linear(src: &[u8], dst: &mut [i16]) {
    let t = srgb_tables();
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = t.byte_to_fixed[usize::from(s)];
    }
}
#[inline]
fn decode_linear(src: &[i16], dst: &mut [u8]) {
    let t = srgb_tables();
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = t.fixed_to_byte(s);
    }
}

#[inline]
fn encode_premultiply<const N: usize>(src: &[u8], dst: &mut [i16]) {
    for (d, s) in cast_slice_mut::<i16, [i16; N]>(dst).iter_mut().zip(cast_slice::<u8, [u8; N]>(src)) {
        let a = i32::from(s[N - 1]);
        for c in 0..N - 1 {
            d[c] = (i32::from(s[c]) * FIXED_STEP * a / 255 + i32::from(FIXED_MIN)) as i16;
        }
        d[N - 1] = byte_to_fixed(s[N - 1]);
    }
}
#[inline]
fn encode_linear_alpha<const N: usize>(src: &[u8], dst: &mut [i16]) {
    let t = srgb_tables();
    for (d, s) in cast_slice_mut::<i16, [i16; N]>(dst).iter_mut().zip(cast_slice::<u8, [u8; N]>(src)) {
        for c in 0..N - 1 {
            d[c] = t.byte_to_fixed[usize::from(s[c])];
        }
        d[N - 1] = byte_to_fixed(s[N - 1]);
    }
}
#[inline]
fn encode_linear_premultiply<const N: usize>(src: &[u8], dst: &mut [i16]) {
    let t = srgb_tables();
    for (d, s) in cast_slice_mut::<i16, [i16; N]>(dst).iter_mut().zip(cast_slice::<u8, [u8; N]>(src)) {
        let a = i32::from(s[N - 1]);
        for c in 0..N - 1 {
            d[c] = (t.byte_to_offset[usize::from(s[c])] * a / 255 + i32::from(FIXED_MIN)) as i16;
        }
        d[N - 1] = byte_to_fixed(s[N - 1]);
    }
}

/// Alpha below one byte step is treated as full transparency, `None` means "emit black".
#[inline(always)]
fn unpremultiply_factor(alpha: i32) -> Option<f32> {
    if alpha < FIXED_STEP {
        None
    } else {
        Some(FIXED_RANGE as f32 / alpha as f32)
    }
}
#[inline(always)]
fn unpremultiply(s: i16, factor: f32) -> i32 { ((i32::from(s) - i32::from(FIXED_MIN)) as f32 * factor).clamp(0., FIXED_RANGE as f32) as i32 }

#[inline]
fn decode_premultiply<const N: usize>(src: &[i16], dst: &mut [u8]) {
    for (d, s) in cast_slice_mut::<u8, [u8; N]>(dst).iter_mut().zip(cast_slice::<i16, [i16; N]>(src)) {
        let a = clamped_offset(s[N - 1]);
        d[N - 1] = (a >> 7) as u8;
        match unpremultiply_factor(a) {
            None => d[..N - 1].fill(0),
            Some(factor) => {
                for c in 0..N - 1 {
                    d[c] = (unpremultiply(s[c], factor) >> 7) as u8;
                }
            }
        }
    }
}
#[inline]
fn decode_linear_alpha<const N: usize>(src: &[i16], dst: &mut [u8]) {
    let t = srgb_tables();
    for (d, s) in cast_slice_mut::<u8, [u8; N]>(dst).iter_mut().zip(cast_slice::<i16, [i16; N]>(src)) {
        for c in 0..N - 1 {
            d[c] = t.fixed_to_byte(s[c]);
        }
        d[N - 1] = fixed_to_byte(s[N - 1]);
    }
}
#[inline]
fn decode_linear_premultiply<const N: usize>(src: &[i16], dst: &mut [u8]) {
    let t = srgb_tables();
    for (d, s) in cast_slice_mut::<u8, [u8; N]>(dst).iter_mut().zip(cast_slice::<i16, [i16; N]>(src)) {
        let a = clamped_offset(s[N - 1]);
        d[N - 1] = (a >> 7) as u8;
        match unpremultiply_factor(a) {
            None => d[..N - 1].fill(0),
            Some(factor) => {
                for c in 0..N - 1 {
                    d[c] = t.offset_to_byte(unpremultiply(s[c], factor));
                }
            }
        }
    }
}
