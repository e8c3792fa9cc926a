//! Resampling curves (windowed kernels) and the selectable [`FilterType`]

use ::core::{f64::consts::PI, fmt};

// REFERENCE: cardinal cubic spline with free parameter `a` (the sharpness)
// |x| < 1      => (a + 2)|x|^3 - (a + 3)|x|^2 + 1
// 1 <= |x| < 2 => a|x|^3 - 5a|x|^2 + 8a|x| - 4a

/// Normalized sinc, `sin(pi x) / (pi x)`
#[inline]
pub fn sinc(x: f64) -> f64 {
    if x == 0. {
        1.
    } else {
        let x = x * PI;
        x.sin() / x
    }
}

/// average kernel, defined on the closed interval `[-0.5, 0.5]`
#[inline]
pub fn box_kernel(x: f64) -> f64 {
    if x.abs() <= 0.5 {
        1.
    } else {
        0.
    }
}

/// triangle kernel
#[inline]
pub fn linear_kernel(x: f64) -> f64 {
    let x = x.abs();
    if x >= 1. {
        0.
    } else {
        1. - x
    }
}

/// smoothstep shaped kernel `(2|x| - 3)x^2 + 1`
#[inline]
pub fn hermite_kernel(x: f64) -> f64 {
    let x = x.abs();
    if x >= 1. {
        0.
    } else {
        (2. * x - 3.) * x * x + 1.
    }
}

#[inline]
pub fn cubic_kernel(sharpness: f64, x: f64) -> f64 {
    let x = x.abs();
    if x >= 2. {
        return 0.;
    }
    let xx = x * x;
    if x < 1. {
        (sharpness + 2.) * xx * x - (sharpness + 3.) * xx + 1.
    } else {
        sharpness * xx * x - 5. * sharpness * xx + 8. * sharpness * x - 4. * sharpness
    }
}

#[inline]
pub fn lanczos_kernel(lobes: u32, x: f64) -> f64 {
    let n = f64::from(lobes);
    let x = x.abs();
    if x >= n {
        0.
    } else if x == 0. {
        1.
    } else {
        sinc(x) * sinc(x / n)
    }
}

/// A windowed weighting function, `apply(0) == 1` and `apply(x) == 0` for every `|x| > radius`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResamplingCurve {
    /// Nearest neighbor when enlarging, area average when shrinking
    Box,
    /// Bilinear interpolation
    Linear,
    Hermite,
    /// Cardinal cubic spline, `sharpness` is usually in `[-1, 0)`
    Cubic { sharpness: f64 },
    /// `sinc(x) * sinc(x / lobes)` windowed to `lobes` pixels
    Lanczos { lobes: u32 },
}
impl ResamplingCurve {
    /// Cubic with sharpness `-0.5`, otherwise known as Catmull-Rom
    pub const CATMULL_ROM: Self = Self::Cubic { sharpness: -0.5 };
    /// Cubic with sharpness `-0.75`, in between [`CATMULL_ROM`](Self::CATMULL_ROM) and [`CUBIC_SHARPER`](Self::CUBIC_SHARPER)
    pub const CUBIC_PHOTOSHOP: Self = Self::Cubic { sharpness: -0.75 };
    /// Cubic with sharpness `-1.0`
    pub const CUBIC_SHARPER: Self = Self::Cubic { sharpness: -1.0 };
    pub const LANCZOS3: Self = Self::Lanczos { lobes: 3 };
    pub const LANCZOS8: Self = Self::Lanczos { lobes: 8 };

    /// A short, friendly name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Box => "Box",
            Self::Linear => "Linear",
            Self::Hermite => "Hermite",
            Self::Cubic { .. } => "Cubic",
            Self::Lanczos { lobes: 3 } => "Lanczos3",
            Self::Lanczos { lobes: 8 } => "Lanczos8",
            Self::Lanczos { .. } => "Lanczos",
        }
    }
    /// Number of fractional pixels in each direction the curve is non-zero
    #[inline]
    pub fn radius(&self) -> f64 {
        match *self {
            Self::Box => 0.5,
            Self::Linear | Self::Hermite => 1.,
            Self::Cubic { .. } => 2.,
            Self::Lanczos { lobes } => f64::from(lobes),
        }
    }
    /// Weight at the fractional pixel position `x`
    #[inline]
    pub fn apply(&self, x: f64) -> f64 {
        match *self {
            Self::Box => box_kernel(x),
            Self::Linear => linear_kernel(x),
            Self::Hermite => hermite_kernel(x),
            Self::Cubic { sharpness } => cubic_kernel(sharpness, x),
            Self::Lanczos { lobes } => lanczos_kernel(lobes, x),
        }
    }
    /// Rejects curves with an empty window or a non-finite parameter
    pub(crate) fn is_well_formed(&self) -> bool {
        match *self {
            Self::Cubic { sharpness } => sharpness.is_finite(),
            Self::Lanczos { lobes } => lobes > 0,
            _ => true,
        }
    }
}
impl Default for ResamplingCurve {
    #[inline]
    fn default() -> Self { Self::LANCZOS3 }
}
impl fmt::Display for ResamplingCurve {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cubic { sharpness } => write!(f, "{}({})", self.name(), sharpness),
            _ => f.write_str(self.name()),
        }
    }
}

/// Selectable filter, maps to a [`ResamplingCurve`], also implements From<u8>
#[cfg_attr(feature = "clap", derive(::clap::ValueEnum))]
#[cfg_attr(feature = "serde", derive(::serde::Deserialize, ::serde::Serialize), serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum FilterType {
    /// Box filter, nearest neighbor when enlarging
    Box,
    /// Linear filter, also known as triangle filter
    Linear,
    /// Hermite filter, a smooth cubic without overshoot
    Hermite,
    /// Catmull-Rom, the standard cubic filter
    Cubic,
    /// Lanczos3 filter, a high quality filter
    #[default]
    Lanczos3,
    /// Lanczos8 filter, sharpest and slowest
    Lanczos8,
}
use FilterType::*;
impl FilterType {
    /// Get the curve for this type
    #[inline]
    pub fn curve(&self) -> ResamplingCurve {
        match self {
            Box => ResamplingCurve::Box,
            Linear => ResamplingCurve::Linear,
            Hermite => ResamplingCurve::Hermite,
            Cubic => ResamplingCurve::CATMULL_ROM,
            Lanczos3 => ResamplingCurve::LANCZOS3,
            Lanczos8 => ResamplingCurve::LANCZOS8,
        }
    }
    #[inline]
    pub fn name(&self) -> &'static str { self.curve().name() }
    #[inline]
    pub fn radius(&self) -> f64 { self.curve().radius() }
    /// Cycle to the next filter type, provided for convenience
    #[inline]
    pub fn cycle(&self) -> FilterType {
        match self {
            Box => Linear,
            Linear => Hermite,
            Hermite => Cubic,
            Cubic => Lanczos3,
            Lanczos3 => Lanczos8,
            Lanczos8 => Box,
        }
    }
}
impl From<u8> for FilterType {
    fn from(i: u8) -> Self {
        match i {
            0 => Box,
            1 => Linear,
            2 => Hermite,
            3 => Cubic,
            5 => Lanczos8,
            _ => Lanczos3,
        }
    }
}
impl From<FilterType> for ResamplingCurve {
    #[inline]
    fn from(f: FilterType) -> Self { f.curve() }
}
impl fmt::Display for FilterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}
