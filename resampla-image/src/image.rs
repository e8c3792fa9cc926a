//! Raster image API consumed and produced by the resampler.
//!
//! Pixels are 8-bit, interleaved, 1 to 4 channels with alpha last.

use ::core::{
    fmt,
    slice::{ChunksExact, ChunksExactMut},
    time::Duration,
};

use crate::{AlphaLayout, ResizeError, MAX_DIMENSION};

/// Channel layout of a [`RasterImage`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PixelLayout {
    Gray = 1,
    GrayAlpha = 2,
    Rgb = 3,
    Rgba = 4,
}
impl PixelLayout {
    /// Layout for a channel count, `None` outside `1..=4`
    #[inline]
    pub const fn from_channels(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(Self::Gray),
            2 => Some(Self::GrayAlpha),
            3 => Some(Self::Rgb),
            4 => Some(Self::Rgba),
            _ => None,
        }
    }
    #[inline(always)]
    pub const fn channels(self) -> usize { self as usize }
    #[inline(always)]
    pub const fn has_alpha(self) -> bool { matches!(self, Self::GrayAlpha | Self::Rgba) }
    #[inline]
    pub const fn alpha_layout(self) -> Option<AlphaLayout> {
        match self {
            Self::GrayAlpha => Some(AlphaLayout::GrayAlpha),
            Self::Rgba => Some(AlphaLayout::Rgba),
            _ => None,
        }
    }
    #[inline]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Gray => "Gray",
            Self::GrayAlpha => "GrayAlpha",
            Self::Rgb => "RGB",
            Self::Rgba => "RGBA",
        }
    }
}

/// Encoding of the color channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ColorSpace {
    /// Gamma encoded, linearized before filtering
    #[default]
    Srgb,
    /// Already linear light
    Linear,
}

/// Checked `width * height * channels`
#[inline]
fn checked_len(width: usize, height: usize, layout: PixelLayout) -> Result<usize, ResizeError> {
    if width == 0 || height == 0 {
        return Err(ResizeError::layout(format!("empty image {}x{}", width, height)));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(ResizeError::layout(format!("image {}x{} exceeds the maximum dimension", width, height)));
    }
    width
        .checked_mul(height)
        .and_then(|px| px.checked_mul(layout.channels()))
        .ok_or_else(|| ResizeError::layout(format!("image {}x{} overflows the address space", width, height)))
}

/// An interleaved 8-bit raster with its color flags.
///
/// Invariant: `data.len() == width * height * channels`, both dimensions non-zero.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct RasterImage {
    data: Vec<u8>,
    width: usize,
    height: usize,
    layout: PixelLayout,
    color_space: ColorSpace,
    premultiplied: bool,
}

impl RasterImage {
    /// Create a black (and transparent) sRGB image.
    /// # Panics
    /// If a dimension is zero or the image does not fit in memory, use [`try_new`](Self::try_new) to handle that.
    pub fn new(width: usize, height: usize, layout: PixelLayout) -> Self {
        match Self::try_new(width, height, layout) {
            Ok(image) => image,
            Err(e) => panic!("{}", e),
        }
    }
    pub fn try_new(width: usize, height: usize, layout: PixelLayout) -> Result<Self, ResizeError> {
        let len = checked_len(width, height, layout)?;
        Ok(Self { data: vec![0; len], width, height, layout, color_space: ColorSpace::Srgb, premultiplied: false })
    }
    /// Wrap interleaved sRGB samples.
    /// # Errors
    /// If a dimension is zero or the data is not of the correct length (width * height * channels)
    pub fn from_raw(data: Vec<u8>, width: usize, height: usize, layout: PixelLayout) -> Result<Self, ResizeError> {
        let len = checked_len(width, height, layout)?;
        if data.len() != len {
            return Err(ResizeError::layout(format!(
                "{} bytes for a {}x{} {} image, expected {}",
                data.len(),
                width,
                height,
                layout.name(),
                len
            )));
        }
        Ok(Self { data, width, height, layout, color_space: ColorSpace::Srgb, premultiplied: false })
    }
    /// Like [`from_raw`](Self::from_raw) with the layout given as a channel count
    pub fn from_channels(data: Vec<u8>, width: usize, height: usize, channels: usize) -> Result<Self, ResizeError> {
        let layout = PixelLayout::from_channels(channels)
            .ok_or_else(|| ResizeError::layout(format!("{} channels, only 1 to 4 are supported", channels)))?;
        Self::from_raw(data, width, height, layout)
    }
    #[inline]
    pub fn with_color_space(mut self, color_space: ColorSpace) -> Self {
        self.color_space = color_space;
        self
    }
    /// Mark the color channels as already multiplied by alpha, ignored for layouts without alpha
    #[inline]
    pub fn with_premultiplied(mut self, premultiplied: bool) -> Self {
        self.premultiplied = premultiplied && self.layout.has_alpha();
        self
    }
    /// An image of another size with the same layout and flags, used as resize output
    pub(crate) fn like(&self, data: Vec<u8>, width: usize, height: usize) -> Self {
        debug_assert_eq!(data.len(), width * height * self.channels());
        Self { data, width, height, layout: self.layout, color_space: self.color_space, premultiplied: self.premultiplied }
    }

    #[inline(always)]
    pub fn width(&self) -> usize { self.width }
    #[inline(always)]
    pub fn height(&self) -> usize { self.height }
    #[inline(always)]
    pub fn dimensions(&self) -> (usize, usize) { (self.width, self.height) }
    #[inline(always)]
    pub fn layout(&self) -> PixelLayout { self.layout }
    #[inline(always)]
    pub fn channels(&self) -> usize { self.layout.channels() }
    #[inline(always)]
    pub fn has_alpha(&self) -> bool { self.layout.has_alpha() }
    #[inline(always)]
    pub fn is_premultiplied(&self) -> bool { self.premultiplied }
    #[inline(always)]
    pub fn color_space(&self) -> ColorSpace { self.color_space }
    /// Samples per row
    #[inline(always)]
    pub fn row_len(&self) -> usize { self.width * self.channels() }
    #[inline(always)]
    pub fn data(&self) -> &[u8] { &self.data }
    #[inline(always)]
    pub fn data_mut(&mut self) -> &mut [u8] { &mut self.data }
    #[inline(always)]
    pub fn into_raw(self) -> Vec<u8> { self.data }
    #[inline]
    pub fn rows(&self) -> ChunksExact<'_, u8> { self.data.chunks_exact(self.row_len()) }
    #[inline]
    pub fn rows_mut(&mut self) -> ChunksExactMut<'_, u8> {
        let len = self.row_len();
        self.data.chunks_exact_mut(len)
    }
    /// Samples of the pixel at `(x, y)`
    /// # Panics
    /// If the pixel is out of bounds
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        assert!(x < self.width && y < self.height, "pixel ({}, {}) out of bounds", x, y);
        let c = self.channels();
        let i = (y * self.width + x) * c;
        &self.data[i..i + c]
    }
    #[inline]
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [u8] {
        assert!(x < self.width && y < self.height, "pixel ({}, {}) out of bounds", x, y);
        let c = self.channels();
        let i = (y * self.width + x) * c;
        &mut self.data[i..i + c]
    }
}

impl fmt::Display for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} {}", self.width, self.height, self.layout.name())?;
        match self.color_space {
            ColorSpace::Srgb => f.write_str(" sRGB")?,
            ColorSpace::Linear => f.write_str(" linear")?,
        }
        if self.premultiplied {
            f.write_str(" premultiplied")?;
        }
        Ok(())
    }
}
impl fmt::Debug for RasterImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "RasterImage({})", self) }
}

/// One frame of an animation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnimationFrame {
    pub image: RasterImage,
    /// How long the frame is shown
    pub duration: Duration,
}
impl AnimationFrame {
    #[inline]
    pub fn new(image: RasterImage, duration: Duration) -> Self { Self { image, duration } }
}

#[cfg(feature = "image")]
mod compat_image {
    use ::image::{DynamicImage, GrayAlphaImage, GrayImage, RgbImage, RgbaImage};

    use super::*;

    impl RasterImage {
        /// Convert an `image` crate image, 8-bit layouts are moved as is, everything else is
        /// converted to the nearest 8-bit layout. The result is treated as sRGB with straight alpha.
        pub fn from_dynamic(image: DynamicImage) -> Result<Self, ResizeError> {
            let (w, h) = (image.width() as usize, image.height() as usize);
            let (data, layout) = match image {
                DynamicImage::ImageLuma8(buf) => (buf.into_raw(), PixelLayout::Gray),
                DynamicImage::ImageLumaA8(buf) => (buf.into_raw(), PixelLayout::GrayAlpha),
                DynamicImage::ImageRgb8(buf) => (buf.into_raw(), PixelLayout::Rgb),
                DynamicImage::ImageRgba8(buf) => (buf.into_raw(), PixelLayout::Rgba),
                DynamicImage::ImageLuma16(_) => (image.to_luma8().into_raw(), PixelLayout::Gray),
                DynamicImage::ImageLumaA16(_) => (image.to_luma_alpha8().into_raw(), PixelLayout::GrayAlpha),
                other if other.color().has_alpha() => (other.to_rgba8().into_raw(), PixelLayout::Rgba),
                other => (other.to_rgb8().into_raw(), PixelLayout::Rgb),
            };
            Self::from_raw(data, w, h, layout).map_err(|e| ResizeError::Conversion(e.to_string()))
        }
        /// Convert back into an `image` crate image, flags are dropped
        pub fn into_dynamic(self) -> Result<DynamicImage, ResizeError> {
            let too_large = || ResizeError::Conversion(format!("{}x{} does not fit u32 dimensions", self.width, self.height));
            let w = u32::try_from(self.width).map_err(|_| too_large())?;
            let h = u32::try_from(self.height).map_err(|_| too_large())?;
            let mismatch = || ResizeError::Conversion("buffer does not match dimensions".to_owned());
            Ok(match self.layout {
                PixelLayout::Gray => DynamicImage::ImageLuma8(GrayImage::from_raw(w, h, self.data).ok_or_else(mismatch)?),
                PixelLayout::GrayAlpha => {
                    DynamicImage::ImageLumaA8(GrayAlphaImage::from_raw(w, h, self.data).ok_or_else(mismatch)?)
                }
                PixelLayout::Rgb => DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, self.data).ok_or_else(mismatch)?),
                PixelLayout::Rgba => DynamicImage::ImageRgba8(RgbaImage::from_raw(w, h, self.data).ok_or_else(mismatch)?),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_bad_buffers() {
        assert!(RasterImage::from_raw(vec![0; 12], 2, 2, PixelLayout::Rgb).is_ok());
        assert!(matches!(RasterImage::from_raw(vec![0; 11], 2, 2, PixelLayout::Rgb), Err(ResizeError::Layout(_))));
        assert!(matches!(RasterImage::from_raw(Vec::new(), 0, 2, PixelLayout::Gray), Err(ResizeError::Layout(_))));
        assert!(matches!(RasterImage::from_channels(vec![0; 5], 1, 1, 5), Err(ResizeError::Layout(_))));
        assert!(RasterImage::try_new(usize::MAX / 2, 3, PixelLayout::Rgba).is_err());
    }

    #[test]
    fn premultiplied_needs_alpha() {
        assert!(!RasterImage::new(1, 1, PixelLayout::Rgb).with_premultiplied(true).is_premultiplied());
        assert!(RasterImage::new(1, 1, PixelLayout::GrayAlpha).with_premultiplied(true).is_premultiplied());
    }

    #[test]
    fn pixel_access() {
        let mut image = RasterImage::new(3, 2, PixelLayout::GrayAlpha);
        image.pixel_mut(2, 1).copy_from_slice(&[7, 9]);
        assert_eq!(image.pixel(2, 1), &[7, 9]);
        assert_eq!(image.rows().nth(1).map(|r| r[4]), Some(7));
        assert_eq!(image.rows().count(), 2);
    }

    #[test]
    fn describes_itself() {
        let image = RasterImage::new(4, 3, PixelLayout::Rgba).with_color_space(ColorSpace::Linear).with_premultiplied(true);
        assert_eq!(image.to_string(), "4x3 RGBA linear premultiplied");
        assert_eq!(RasterImage::new(1, 1, PixelLayout::Gray).to_string(), "1x1 Gray sRGB");
    }
}
