//! Inner loops of the two 1-D passes over fixed-point samples
use crate::{PixelLayout, SamplingTable, Weight};

/// Round and saturate an accumulator back into a fixed-point sample
#[inline(always)]
pub(crate) fn store(v: f32) -> i16 { v.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16 }

/// Resample one row along x, `table` indices are pre-multiplied by the channel count
#[inline]
pub(crate) fn horizontal(layout: PixelLayout, table: &SamplingTable, src: &[i16], dst: &mut [i16]) {
    match layout {
        PixelLayout::Gray => horizontal_n::<1>(table, src, dst),
        PixelLayout::GrayAlpha => horizontal_n::<2>(table, src, dst),
        PixelLayout::Rgb => horizontal_n::<3>(table, src, dst),
        PixelLayout::Rgba => horizontal_n::<4>(table, src, dst),
    }
}

fn horizontal_n<const N: usize>(table: &SamplingTable, src: &[i16], dst: &mut [i16]) {
    debug_assert_eq!(dst.len(), table.dst_size() * N);
    for ((indices, weights), px) in table.rows().zip(dst.chunks_exact_mut(N)) {
        let mut acc = [0 as Weight; N];
        for (&i, &w) in indices.iter().zip(weights) {
            if w == 0. {
                continue;
            }
            let s = &src[i..i + N];
            for c in 0..N {
                acc[c] += f32::from(s[c]) * w;
            }
        }
        for (d, a) in px.iter_mut().zip(acc) {
            *d = store(a);
        }
    }
}

/// Resample one row along y.
///
/// `src` holds consecutive rows of `row_len` samples starting at source row `base`, `indices` are
/// source row numbers. `acc` is scratch of `row_len` accumulators.
pub(crate) fn vertical(
    indices: &[usize],
    weights: &[Weight],
    src: &[i16],
    base: usize,
    row_len: usize,
    acc: &mut [Weight],
    dst: &mut [i16],
) {
    debug_assert_eq!(acc.len(), row_len);
    acc.fill(0.);
    for (&y, &w) in indices.iter().zip(weights) {
        if w == 0. {
            continue;
        }
        let row = &src[(y - base) * row_len..][..row_len];
        for (a, &s) in acc.iter_mut().zip(row) {
            *a += f32::from(s) * w;
        }
    }
    for (d, &a) in dst.iter_mut().zip(acc.iter()) {
        *d = store(a);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ResamplingCurve;

    #[test]
    fn store_saturates() {
        assert_eq!(store(1.5), 2);
        assert_eq!(store(-1.5), -2);
        assert_eq!(store(1e9), i16::MAX);
        assert_eq!(store(-1e9), i16::MIN);
    }

    #[test]
    fn horizontal_box_averages_pixels() {
        let table = SamplingTable::build(&ResamplingCurve::Box, 4, 2, 0.5, 0., 2);
        let src = [0, 100, 200, 300, 400, 500, 600, 700];
        let mut dst = [0i16; 4];
        horizontal(PixelLayout::GrayAlpha, &table, &src, &mut dst);
        assert_eq!(dst, [100, 200, 500, 600]);
    }

    #[test]
    fn vertical_reads_relative_to_base() {
        // rows 2 and 3 of some larger buffer
        let src = [10, 20, 30, 40];
        let mut acc = [0.; 2];
        let mut dst = [0i16; 2];
        vertical(&[2, 3, 3], &[0.5, 0.5, 0.], &src, 2, 2, &mut acc, &mut dst);
        assert_eq!(dst, [20, 30]);
    }
}
