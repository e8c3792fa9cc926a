//! Target size arithmetic: fitting an image into (or around) a box, and picking a curve for a size change.

use crate::ResamplingCurve;

/// How the image size relates to the target size
#[cfg_attr(feature = "clap", derive(::clap::ValueEnum))]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize), serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalingTarget {
    /// Exactly the target size, aspect ratio is not kept
    Stretch,
    /// Largest size that fits inside the target
    #[default]
    Inside,
    /// Smallest size that covers the target
    Outside,
    /// Same width as the target
    WidthTouch,
    /// Same height as the target
    HeightTouch,
    /// Same diagonal length as the target
    SameDiagonal,
    /// Same `width + height` as the target
    SameCircumference,
    /// Same number of pixels as the target
    SameArea,
}

/// When scaling is applied at all
#[cfg_attr(feature = "clap", derive(::clap::ValueEnum))]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize), serde(rename_all = "kebab-case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalingCondition {
    #[default]
    Always,
    Never,
    /// Keep the image size if the scaled size would not be smaller in both dimensions
    OnlyIfLarger,
    /// Keep the image size if the scaled size would not be larger in both dimensions
    OnlyIfSmaller,
}

/// `numerator / denominator` rounded half up without going through floats, `0` for a zero denominator
#[inline]
fn div_round(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        0
    } else {
        (numerator + denominator / 2) / denominator
    }
}

/// Size for `image` scaled towards `target` according to `kind`, filtered by `condition`.
///
/// Sizes are `(width, height)`. No dimension of the result is clamped to 1, callers feeding
/// a resampler should reject zero dimensions.
pub fn scaling_size(
    image: (usize, usize),
    target: (usize, usize),
    kind: ScalingTarget,
    condition: ScalingCondition,
) -> (usize, usize) {
    let (iw, ih) = (image.0 as u64, image.1 as u64);
    let (tw, th) = (target.0 as u64, target.1 as u64);
    let w_cross = iw * th;
    let h_cross = ih * tw;
    let (w, h) = match kind {
        ScalingTarget::Stretch => (tw, th),
        ScalingTarget::Inside if w_cross > h_cross => (tw, div_round(h_cross, iw)),
        ScalingTarget::Inside => (div_round(w_cross, ih), th),
        ScalingTarget::Outside if w_cross < h_cross => (tw, div_round(h_cross, iw)),
        ScalingTarget::Outside => (div_round(w_cross, ih), th),
        ScalingTarget::WidthTouch => (tw, div_round(h_cross, iw)),
        ScalingTarget::HeightTouch => (div_round(w_cross, ih), th),
        ScalingTarget::SameDiagonal => {
            let ratio = (tw as f64).hypot(th as f64) / (iw as f64).hypot(ih as f64);
            ((iw as f64 * ratio).round() as u64, (ih as f64 * ratio).round() as u64)
        }
        ScalingTarget::SameCircumference => {
            let (t_sum, i_sum) = (tw + th, iw + ih);
            (div_round(iw * t_sum, i_sum), div_round(ih * t_sum, i_sum))
        }
        ScalingTarget::SameArea => {
            let ratio = ((tw * th) as f64 / (iw * ih) as f64).sqrt();
            ((iw as f64 * ratio).round() as u64, (ih as f64 * ratio).round() as u64)
        }
    };
    let keep = match condition {
        ScalingCondition::Always => false,
        ScalingCondition::Never => true,
        ScalingCondition::OnlyIfLarger => w >= iw && h >= ih,
        ScalingCondition::OnlyIfSmaller => w <= iw && h <= ih,
    };
    if keep {
        image
    } else {
        (w as usize, h as usize)
    }
}

/// Fastest curve that keeps the best quality for a size change.
///
/// Only the axis deviating most from 1:1 counts: Lanczos3 for a factor of 4 and up,
/// Catmull-Rom from 2, linear below.
pub fn best_curve(image: (usize, usize), new: (usize, usize)) -> ResamplingCurve {
    let (iw, ih) = (image.0 as f64, image.1 as f64);
    let (nw, nh) = (new.0 as f64, new.1 as f64);
    let factor = f64::max(f64::max(nw / iw, nh / ih), f64::max(iw / nw, ih / nh));
    if factor >= 4. {
        ResamplingCurve::LANCZOS3
    } else if factor >= 2. {
        ResamplingCurve::CATMULL_ROM
    } else {
        ResamplingCurve::Linear
    }
}
