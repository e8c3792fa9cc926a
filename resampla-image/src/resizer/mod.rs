//! The resampling engine: configuration, sizing, pass order and the staged, multi-threaded pipeline.
use ::std::{
    borrow::Cow,
    fmt,
    sync::{Arc, PoisonError, RwLock},
};

use ::resampla_tasks::{CancelToken, Executor};
use ::tracing::{debug, instrument, trace, warn};

use crate::{AnimationFrame, Codec, ProgressEvent, ProgressListener, RasterImage, ResamplingCurve, ResizeError, MAX_DIMENSION};

mod convolve;
mod pipeline;
mod plan;
mod scratch;
mod timer;

pub use self::plan::{determine_order, partition, ResampleOrder, ResizePlan};
use self::{pipeline::PipelineContext, scratch::ScratchPool, timer::StageTimer};

/// What lies beyond the source edges
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EdgeMode {
    /// Replicate the edge pixel
    #[default]
    Clamp,
}

/// Options of a [`ResamplerEngine`].
///
/// Either `output_size` or `output_scale` must be set. When both are, the size wins and the scale
/// only steers the kernel footprint.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResizeConfig {
    pub output_size: Option<(usize, usize)>,
    pub output_scale: Option<(f64, f64)>,
    /// Sub-pixel shift of the destination grid, in destination pixels.
    /// Defaults to half a pixel on axes with an odd destination size.
    pub offset: Option<(f64, f64)>,
    pub filter: ResamplingCurve,
    /// Worker threads, `0` for one per hardware thread
    pub num_threads: usize,
    /// Filter sRGB samples as they are instead of in linear light
    pub ignore_color_space: bool,
    /// Filter straight alpha images without premultiplying
    pub skip_alpha_premultiply: bool,
    pub edge_mode: EdgeMode,
}

impl ResizeConfig {
    #[inline]
    pub fn with_output_size(width: usize, height: usize) -> Self {
        Self { output_size: Some((width, height)), ..Self::default() }
    }
    #[inline]
    pub fn with_output_scale(x: f64, y: f64) -> Self { Self { output_scale: Some((x, y)), ..Self::default() } }
    /// Reject values no resize could use. A missing size and scale is only reported by a resize.
    pub fn validate(&self) -> Result<(), ResizeError> {
        if let Some((w, h)) = self.output_size {
            if w == 0 || h == 0 || w > MAX_DIMENSION || h > MAX_DIMENSION {
                return Err(ResizeError::config(format!("invalid output size {}x{}", w, h)));
            }
        }
        if let Some((x, y)) = self.output_scale {
            if !(x.is_finite() && y.is_finite() && x > 0. && y > 0.) {
                return Err(ResizeError::config(format!("invalid output scale ({}, {})", x, y)));
            }
        }
        if let Some((x, y)) = self.offset {
            if !(x.is_finite() && y.is_finite()) {
                return Err(ResizeError::config(format!("invalid offset ({}, {})", x, y)));
            }
        }
        if !self.filter.is_well_formed() {
            return Err(ResizeError::config(format!("invalid filter {:?}", self.filter)));
        }
        Ok(())
    }
}

/// Resizes [`RasterImage`]s on a worker pool owned by the engine.
///
/// One engine may serve concurrent resizes from several threads, they share the pool and recycle
/// working buffers but never use the same buffer at the same time.
pub struct ResamplerEngine {
    config: ResizeConfig,
    executor: Executor,
    listeners: RwLock<Vec<Arc<dyn ProgressListener>>>,
    scratch: ScratchPool,
}

fn build_executor(threads: usize) -> Result<Executor, ResizeError> {
    Executor::new(threads).map_err(|e| ResizeError::config(format!("failed to build a {} thread pool: {}", threads, e)))
}

impl ResamplerEngine {
    /// # Errors
    /// If the configuration is invalid or the worker pool can't be created
    pub fn new(config: ResizeConfig) -> Result<Self, ResizeError> {
        config.validate()?;
        let executor = build_executor(config.num_threads)?;
        Ok(Self { config, executor, listeners: RwLock::new(Vec::new()), scratch: ScratchPool::default() })
    }
    #[inline]
    pub fn config(&self) -> &ResizeConfig { &self.config }
    /// The worker pool, e.g. to check that no task outlived a resize
    #[inline]
    pub fn executor(&self) -> &Executor { &self.executor }
    /// Replace the whole configuration, the pool is rebuilt if the thread count changed
    pub fn set_config(&mut self, config: ResizeConfig) -> Result<(), ResizeError> {
        config.validate()?;
        if config.num_threads != self.config.num_threads {
            self.executor = build_executor(config.num_threads)?;
        }
        self.config = config;
        Ok(())
    }
    fn update(&mut self, f: impl FnOnce(&mut ResizeConfig)) -> Result<(), ResizeError> {
        let mut config = self.config.clone();
        f(&mut config);
        self.set_config(config)
    }
    pub fn set_output_size(&mut self, size: Option<(usize, usize)>) -> Result<(), ResizeError> {
        self.update(|c| c.output_size = size)
    }
    pub fn set_output_scale(&mut self, scale: Option<(f64, f64)>) -> Result<(), ResizeError> {
        self.update(|c| c.output_scale = scale)
    }
    pub fn set_offset(&mut self, offset: Option<(f64, f64)>) -> Result<(), ResizeError> { self.update(|c| c.offset = offset) }
    pub fn set_filter(&mut self, filter: ResamplingCurve) -> Result<(), ResizeError> { self.update(|c| c.filter = filter) }
    pub fn set_num_threads(&mut self, threads: usize) -> Result<(), ResizeError> { self.update(|c| c.num_threads = threads) }
    #[inline]
    pub fn set_ignore_color_space(&mut self, ignore: bool) { self.config.ignore_color_space = ignore; }
    #[inline]
    pub fn set_skip_alpha_premultiply(&mut self, skip: bool) { self.config.skip_alpha_premultiply = skip; }
    #[inline]
    pub fn set_edge_mode(&mut self, mode: EdgeMode) { self.config.edge_mode = mode; }

    pub fn add_progress_listener(&self, listener: Arc<dyn ProgressListener>) {
        self.listeners.write().unwrap_or_else(PoisonError::into_inner).push(listener);
    }
    /// Remove a listener previously added, compared by identity. Returns whether it was found.
    pub fn remove_progress_listener(&self, listener: &Arc<dyn ProgressListener>) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(PoisonError::into_inner);
        let before = listeners.len();
        listeners.retain(|l| !Arc::ptr_eq(l, listener));
        listeners.len() != before
    }
    /// Idle working buffers kept for the next resize
    #[inline]
    pub fn idle_buffers(&self) -> usize { self.scratch.idle() }
    /// Free the idle working buffers
    #[inline]
    pub fn release_buffers(&self) { self.scratch.clear() }

    /// Resize `image`, see [`resize_cancellable`](Self::resize_cancellable)
    #[inline]
    pub fn resize<'i>(&self, image: &'i RasterImage) -> Result<Cow<'i, RasterImage>, ResizeError> {
        self.resize_cancellable(image, &CancelToken::new())
    }
    /// Resize `image` to the configured size.
    ///
    /// Returns the input itself when neither axis needs resampling. The result keeps the layout,
    /// color space and premultiplication of the input.
    /// # Errors
    /// [`ResizeError::Interrupted`] if `cancel` was cancelled before the last stage finished, no
    /// partial result is returned and no task is left running.
    #[instrument(skip_all, level = "trace")]
    pub fn resize_cancellable<'i>(
        &self,
        image: &'i RasterImage,
        cancel: &CancelToken,
    ) -> Result<Cow<'i, RasterImage>, ResizeError> {
        let mut timer = StageTimer::new("ResamplerEngine::resize");
        let listeners = self.listeners.read().unwrap_or_else(PoisonError::into_inner).clone();
        let notify = |event| listeners.iter().for_each(|l| l.progress_updated(event));
        notify(ProgressEvent::new(0, None));
        let plan = ResizePlan::resolve(&self.config, image.dimensions())?;
        let order = plan.order(&self.config.filter);
        debug!(
            target: "ResamplerEngine::resize",
            "{} -> {}x{}, scale {:?}, offset {:?}, {} {:?}",
            image,
            plan.dst.0,
            plan.dst.1,
            plan.scale,
            plan.offset,
            self.config.filter,
            order
        );
        let pixels = plan.dst_pixels();
        if order == ResampleOrder::None {
            listeners.iter().for_each(|l| l.progress_completed(ProgressEvent::new(pixels, Some(pixels))));
            return Ok(Cow::Borrowed(image));
        }
        let codec = Codec::select(
            image.layout(),
            image.color_space(),
            image.is_premultiplied(),
            self.config.ignore_color_space,
            self.config.skip_alpha_premultiply,
        );
        trace!(target: "ResamplerEngine::resize", "codec {:?}", codec);
        timer.split("planning");
        let cx = PipelineContext {
            executor: &self.executor,
            scratch: &self.scratch,
            curve: &self.config.filter,
            codec,
            cancel,
        };
        let data = match pipeline::execute(&cx, image, &plan, order, &mut timer, notify) {
            Ok(data) => data,
            Err(e) => {
                if e.is_interrupted() {
                    debug!(target: "ResamplerEngine::resize", "interrupted");
                } else {
                    warn!(target: "ResamplerEngine::resize", "failed: {}", e);
                }
                return Err(e);
            }
        };
        timer.set_pixels(pixels);
        listeners.iter().for_each(|l| l.progress_completed(ProgressEvent::new(pixels, Some(pixels))));
        Ok(Cow::Owned(image.like(data, plan.dst.0, plan.dst.1)))
    }
    /// Resize an owned image, dropping the source once the result exists
    pub fn resize_owned(&self, image: RasterImage) -> Result<RasterImage, ResizeError> {
        let resized = match self.resize(&image)? {
            Cow::Owned(resized) => Some(resized),
            Cow::Borrowed(_) => None,
        };
        Ok(resized.unwrap_or(image))
    }
    /// Resize every frame with the same configuration, keeping durations.
    ///
    /// Each source frame is released as soon as its replacement exists, so at most one source and
    /// one result are alive besides the finished frames. Working buffers are reused across frames.
    #[instrument(skip_all, level = "trace")]
    pub fn resize_frames(&self, frames: Vec<AnimationFrame>) -> Result<Vec<AnimationFrame>, ResizeError> {
        let total = frames.len();
        let mut resized = Vec::with_capacity(total);
        for (i, AnimationFrame { image, duration }) in frames.into_iter().enumerate() {
            let image = self.resize_owned(image)?;
            trace!(target: "ResamplerEngine::resize_frames", "frame {}/{}: {}", i + 1, total, image);
            resized.push(AnimationFrame::new(image, duration));
        }
        Ok(resized)
    }
    /// Resize an `image` crate image, converting 16-bit and float images to 8 bits first
    #[cfg(feature = "image")]
    pub fn resize_dynamic(&self, image: ::image::DynamicImage) -> Result<::image::DynamicImage, ResizeError> {
        let image = RasterImage::from_dynamic(image)?;
        self.resize_owned(image)?.into_dynamic()
    }
}

impl fmt::Debug for ResamplerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResamplerEngine")
            .field("config", &self.config)
            .field("threads", &self.executor.threads())
            .finish_non_exhaustive()
    }
}
