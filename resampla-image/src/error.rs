/// Everything that can go wrong during a resize.
#[derive(Debug, Clone, PartialEq, Eq, ::thiserror::Error)]
pub enum ResizeError {
    /// Missing, out of range or non-finite configuration, raised before any work is scheduled
    #[error("invalid configuration: {0}")]
    Config(String),
    /// The raster is not a supported interleaved 8-bit layout, or its buffer does not match its size
    #[error("unsupported image layout: {0}")]
    Layout(String),
    /// Converting a foreign image into a native raster (or back) failed
    #[error("image conversion failed: {0}")]
    Conversion(String),
    /// A pipeline stage failed or panicked, the partial output was discarded
    #[error("resize worker failed: {0}")]
    Worker(String),
    /// The resize was cancelled before it finished, the partial output was discarded
    #[error("resize interrupted")]
    Interrupted,
}

impl ResizeError {
    /// `true` if the caller asked to stop, `false` if something broke
    #[inline]
    pub fn is_interrupted(&self) -> bool { matches!(self, Self::Interrupted) }
    #[inline]
    pub(crate) fn config(msg: impl Into<String>) -> Self { Self::Config(msg.into()) }
    #[inline]
    pub(crate) fn layout(msg: impl Into<String>) -> Self { Self::Layout(msg.into()) }
}
