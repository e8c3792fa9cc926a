//! Sampling tables: per destination index, the contributing source indices and their weights
#[cfg(feature = "rayon")]
use ::rayon::prelude::*;

use crate::{ResamplingCurve, Weight};

/// Kernel footprint in source pixels, widened proportionally when shrinking
#[inline]
pub fn sampling_radius(curve: &ResamplingCurve, scale: f64) -> f64 {
    if scale < 1. {
        curve.radius() / scale
    } else {
        curve.radius()
    }
}

/// Fixed number of contributors per destination index
#[inline]
pub fn num_samples(curve: &ResamplingCurve, scale: f64) -> usize { ((2. * sampling_radius(curve, scale)).ceil() as usize).max(1) }

/// Scale every weight so the row sums to 1.
///
/// A row that sums to exactly 0 is left untouched (all zero), returns `false` in that case.
#[inline]
pub fn normalize(weights: &mut [f64]) -> bool {
    let sum: f64 = weights.iter().sum();
    if sum == 0. {
        return false;
    }
    for w in weights.iter_mut() {
        *w /= sum;
    }
    true
}

/// Parameters shared by every row of one table
#[derive(Debug, Clone, Copy)]
struct Window {
    curve: ResamplingCurve,
    src_size: usize,
    stride: usize,
    scale: f64,
    radius: f64,
    center_offset: f64,
}
impl Window {
    fn fill(&self, dst: usize, indices: &mut [usize], weights: &mut [Weight], tmp: &mut [f64]) {
        let center = dst as f64 / self.scale + self.center_offset;
        let left = (center - self.radius).ceil() as i64;
        let last = self.src_size as i64 - 1;
        for (k, (index, w)) in indices.iter_mut().zip(tmp.iter_mut()).enumerate() {
            let j = left + k as i64;
            let x = j as f64 - center;
            *w = if self.scale < 1. { self.curve.apply(x * self.scale) } else { self.curve.apply(x) };
            *index = j.clamp(0, last) as usize * self.stride;
        }
        normalize(tmp);
        for (d, s) in weights.iter_mut().zip(tmp.iter()) {
            *d = *s as Weight;
        }
    }
}

/// Precomputed contributors of one resampling pass along one axis.
///
/// Every row holds exactly [`num_samples`](Self::num_samples) `(index, weight)` pairs. Indices are
/// clamped into the source (edge replication) and pre-multiplied by the stride given at construction,
/// weights sum to 1 except for the degenerate row whose kernel weights are all zero, which stays zero.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplingTable {
    num_samples: usize,
    stride: usize,
    src_size: usize,
    indices: Box<[usize]>,
    weights: Box<[Weight]>,
}

impl SamplingTable {
    /// Build the table mapping `src_size` source elements onto `dst_size` destination elements.
    ///
    /// `offset` shifts the destination grid in destination pixels, `stride` multiplies every stored
    /// index (e.g. the channel count for a horizontal pass over interleaved pixels).
    pub fn build(curve: &ResamplingCurve, src_size: usize, dst_size: usize, scale: f64, offset: f64, stride: usize) -> Self {
        let num_samples = num_samples(curve, scale);
        let window = Window {
            curve: *curve,
            src_size: src_size.max(1),
            stride,
            scale,
            radius: sampling_radius(curve, scale),
            center_offset: ((src_size as f64 - 1.) - (dst_size as f64 - 1. + 2. * offset) / scale) / 2.,
        };
        let mut indices = vec![0usize; num_samples * dst_size].into_boxed_slice();
        let mut weights = vec![0 as Weight; num_samples * dst_size].into_boxed_slice();
        #[cfg(not(feature = "rayon"))]
        {
            let mut tmp = vec![0f64; num_samples];
            for (i, (idx, wgt)) in indices.chunks_exact_mut(num_samples).zip(weights.chunks_exact_mut(num_samples)).enumerate() {
                window.fill(i, idx, wgt, &mut tmp);
            }
        }
        #[cfg(feature = "rayon")]
        indices.par_chunks_exact_mut(num_samples).zip(weights.par_chunks_exact_mut(num_samples)).enumerate().for_each_init(
            || vec![0f64; num_samples],
            |tmp, (i, (idx, wgt))| window.fill(i, idx, wgt, tmp),
        );
        Self { num_samples, stride, src_size, indices, weights }
    }
    #[inline(always)]
    pub fn num_samples(&self) -> usize { self.num_samples }
    #[inline(always)]
    pub fn stride(&self) -> usize { self.stride }
    #[inline(always)]
    pub fn src_size(&self) -> usize { self.src_size }
    #[inline(always)]
    pub fn dst_size(&self) -> usize { self.indices.len() / self.num_samples }
    /// Contributors of destination index `i`
    #[inline]
    pub fn row(&self, i: usize) -> (&[usize], &[Weight]) {
        let span = i * self.num_samples..(i + 1) * self.num_samples;
        (&self.indices[span.clone()], &self.weights[span])
    }
    /// Iterate over all rows in destination order
    #[inline]
    pub fn rows(&self) -> impl Iterator<Item = (&[usize], &[Weight])> + '_ {
        self.indices.chunks_exact(self.num_samples).zip(self.weights.chunks_exact(self.num_samples))
    }
    /// Source elements (not pre-multiplied by the stride) read by the destination range `dst`
    pub fn source_span(&self, dst: ::core::ops::Range<usize>) -> ::core::ops::Range<usize> {
        if dst.is_empty() {
            return 0..0;
        }
        let span = dst.start * self.num_samples..dst.end * self.num_samples;
        let (lo, hi) = self.indices[span].iter().fold((usize::MAX, 0), |(lo, hi), &i| (lo.min(i), hi.max(i)));
        lo / self.stride..hi / self.stride + 1
    }
}
