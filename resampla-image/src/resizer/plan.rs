//! Sizing and pass order, everything decided before a single pixel is touched
use ::core::ops::Range;

use crate::{
    sample::{num_samples, sampling_radius},
    ResamplingCurve, ResizeConfig, ResizeError, MAX_DIMENSION,
};

/// Which 1-D passes run, and in which order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResampleOrder {
    /// Nothing to do, the input is returned as is
    None,
    XOnly,
    YOnly,
    /// Horizontal pass into a `dst_w x src_h` buffer, then vertical
    XFirst,
    /// Vertical pass into a `src_w x dst_h` buffer, then horizontal
    YFirst,
}
impl ResampleOrder {
    /// Passes in execution order, `true` for horizontal
    #[inline]
    pub(crate) fn passes(self) -> &'static [Axis] {
        match self {
            Self::None => &[],
            Self::XOnly => &[Axis::Horizontal],
            Self::YOnly => &[Axis::Vertical],
            Self::XFirst => &[Axis::Horizontal, Axis::Vertical],
            Self::YFirst => &[Axis::Vertical, Axis::Horizontal],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Horizontal,
    Vertical,
}

/// Pick the cheaper pass order.
///
/// An axis needs a pass if its size changes or its offset is non-zero. With both axes the
/// multiply-accumulate count of each order is estimated as `rows * dst_width * (samples + 1)`
/// summed over both passes, ties go to horizontal first.
pub fn determine_order(
    src: (usize, usize),
    dst: (usize, usize),
    offset: (f64, f64),
    samples: (usize, usize),
) -> ResampleOrder {
    let do_x = src.0 != dst.0 || offset.0 != 0.;
    let do_y = src.1 != dst.1 || offset.1 != 0.;
    match (do_x, do_y) {
        (false, false) => ResampleOrder::None,
        (true, false) => ResampleOrder::XOnly,
        (false, true) => ResampleOrder::YOnly,
        (true, true) => {
            let (sw, sh) = (src.0 as u128, src.1 as u128);
            let (dw, dh) = (dst.0 as u128, dst.1 as u128);
            let (nx, ny) = (samples.0 as u128 + 1, samples.1 as u128 + 1);
            let x_first = sh * dw * nx + dw * dh * ny;
            let y_first = sw * dh * ny + dh * dw * nx;
            ::tracing::trace!(target: "determine_order", "x first: {}, y first: {}", x_first, y_first);
            if x_first <= y_first {
                ResampleOrder::XFirst
            } else {
                ResampleOrder::YFirst
            }
        }
    }
}

/// Destination geometry of one resize
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResizePlan {
    pub src: (usize, usize),
    pub dst: (usize, usize),
    pub scale: (f64, f64),
    pub offset: (f64, f64),
}

/// Destination offset keeping an odd-sized result centered
#[inline]
fn parity_offset(size: usize) -> f64 {
    if size & 1 == 0 {
        0.
    } else {
        0.5
    }
}

#[inline]
fn scaled(src: usize, scale: f64) -> Result<usize, ResizeError> {
    let size = (src as f64 * scale).ceil();
    if size > MAX_DIMENSION as f64 {
        return Err(ResizeError::config(format!("scaling {} by {} exceeds the maximum dimension", src, scale)));
    }
    Ok((size as usize).max(1))
}

/// Rejects a `scale` whose kernel footprint no sampling table for `dst` indices could hold
fn check_footprint(curve: &ResamplingCurve, scale: f64, dst: usize) -> Result<(), ResizeError> {
    let width = 2. * sampling_radius(curve, scale);
    let too_wide = || ResizeError::config(format!("a scale of {} needs a {} kernel {} pixels wide", scale, curve, width));
    if !width.is_finite() || width >= isize::MAX as f64 {
        return Err(too_wide());
    }
    num_samples(curve, scale)
        .checked_mul(dst)
        .and_then(|len| len.checked_mul(::core::mem::size_of::<usize>()))
        .filter(|&bytes| bytes <= isize::MAX as usize)
        .map(drop)
        .ok_or_else(too_wide)
}

/// Length of a `width x height` buffer of `channels` samples, checked for overflow
pub(crate) fn buffer_len((width, height): (usize, usize), channels: usize) -> Result<usize, ResizeError> {
    width
        .checked_mul(height)
        .and_then(|len| len.checked_mul(channels))
        .filter(|&len| len <= isize::MAX as usize / ::core::mem::size_of::<i16>())
        .ok_or_else(|| ResizeError::config(format!("a {}x{}x{} buffer does not fit in memory", width, height, channels)))
}

impl ResizePlan {
    /// Resolve size, scale and offset for a `src` sized image.
    ///
    /// An explicit size wins, otherwise `ceil(src * scale)` (at least 1). The scale defaults to
    /// `dst / src`, the offset to half a pixel on axes with an odd destination size. A scale so
    /// small that the filter's sampling table could not be allocated is a configuration error.
    pub fn resolve(config: &ResizeConfig, src: (usize, usize)) -> Result<Self, ResizeError> {
        config.validate()?;
        let dst = match (config.output_size, config.output_scale) {
            (Some(size), _) => size,
            (None, Some((sx, sy))) => (scaled(src.0, sx)?, scaled(src.1, sy)?),
            (None, None) => return Err(ResizeError::config("either an output size or an output scale is required")),
        };
        let scale = config.output_scale.unwrap_or((dst.0 as f64 / src.0 as f64, dst.1 as f64 / src.1 as f64));
        check_footprint(&config.filter, scale.0, dst.0)?;
        check_footprint(&config.filter, scale.1, dst.1)?;
        let offset = config.offset.unwrap_or((parity_offset(dst.0), parity_offset(dst.1)));
        Ok(Self { src, dst, scale, offset })
    }
    /// Pass order for `curve`
    #[inline]
    pub fn order(&self, curve: &ResamplingCurve) -> ResampleOrder {
        let samples = (num_samples(curve, self.scale.0), num_samples(curve, self.scale.1));
        determine_order(self.src, self.dst, self.offset, samples)
    }
    #[inline]
    pub fn dst_pixels(&self) -> u64 { self.dst.0 as u64 * self.dst.1 as u64 }
}

/// Split `0..len` into at most `parts` contiguous near-equal ranges, empty ones are skipped
pub fn partition(len: usize, parts: usize) -> impl Iterator<Item = Range<usize>> {
    let parts = parts.max(1);
    (0..parts).map(move |i| i * len / parts..(i + 1) * len / parts).filter(|r| !r.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_from_scale_round_up() {
        let config = ResizeConfig { output_scale: Some((0.5, 0.3)), ..ResizeConfig::default() };
        let plan = ResizePlan::resolve(&config, (5, 10)).unwrap();
        assert_eq!(plan.dst, (3, 3));
        assert_eq!(plan.scale, (0.5, 0.3));
        assert_eq!(plan.offset, (0.5, 0.5));
        let config = ResizeConfig { output_scale: Some((0.01, 0.01)), ..ResizeConfig::default() };
        assert_eq!(ResizePlan::resolve(&config, (5, 10)).unwrap().dst, (1, 1));
    }

    #[test]
    fn explicit_size_and_offset_win() {
        let config = ResizeConfig { output_size: Some((8, 6)), offset: Some((0.25, 0.)), ..ResizeConfig::default() };
        let plan = ResizePlan::resolve(&config, (16, 4)).unwrap();
        assert_eq!(plan.dst, (8, 6));
        assert_eq!(plan.scale, (0.5, 1.5));
        assert_eq!(plan.offset, (0.25, 0.));
    }

    #[test]
    fn needs_size_or_scale() {
        assert!(matches!(ResizePlan::resolve(&ResizeConfig::default(), (4, 4)), Err(ResizeError::Config(_))));
    }

    #[test]
    fn rejects_scales_no_table_can_hold() {
        let config = ResizeConfig::with_output_scale(1e-300, 1e-300);
        assert!(matches!(ResizePlan::resolve(&config, (10, 10)), Err(ResizeError::Config(_))));
        let config = ResizeConfig { output_size: Some((4, 4)), output_scale: Some((1., 1e-300)), ..ResizeConfig::default() };
        assert!(matches!(ResizePlan::resolve(&config, (10, 10)), Err(ResizeError::Config(_))));
        // tiny but usable
        let config = ResizeConfig::with_output_scale(1e-3, 1e-3);
        assert_eq!(ResizePlan::resolve(&config, (10, 10)).unwrap().dst, (1, 1));
    }

    #[test]
    fn buffer_lengths_are_checked() {
        assert_eq!(buffer_len((3, 2), 4).unwrap(), 24);
        let huge = u32::MAX as usize;
        assert!(matches!(buffer_len((huge, huge), 4), Err(ResizeError::Config(_))));
    }

    #[test]
    fn order_skips_untouched_axes() {
        assert_eq!(determine_order((10, 10), (10, 10), (0., 0.), (6, 6)), ResampleOrder::None);
        assert_eq!(determine_order((10, 10), (10, 10), (0.5, 0.), (6, 6)), ResampleOrder::XOnly);
        assert_eq!(determine_order((10, 10), (10, 5), (0., 0.), (6, 12)), ResampleOrder::YOnly);
    }

    #[test]
    fn order_prefers_cheaper_intermediate() {
        // shrinking a wide image horizontally first leaves a small intermediate
        assert_eq!(determine_order((4000, 100), (100, 50), (0., 0.), (240, 12)), ResampleOrder::XFirst);
        assert_eq!(determine_order((100, 4000), (50, 100), (0., 0.), (12, 240)), ResampleOrder::YFirst);
        // same inputs, same answer
        for _ in 0..3 {
            assert_eq!(determine_order((640, 480), (320, 240), (0., 0.), (12, 12)), ResampleOrder::XFirst);
        }
    }

    #[test]
    fn partition_covers_range() {
        let parts: Vec<_> = partition(10, 3).collect();
        assert_eq!(parts, vec![0..3, 3..6, 6..10]);
        let parts: Vec<_> = partition(2, 4).collect();
        assert_eq!(parts, vec![0..1, 1..2]);
        assert_eq!(partition(5, 0).count(), 1);
    }
}
