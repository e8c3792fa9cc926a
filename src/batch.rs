//! Resize one file, an animated GIF, or every image of a folder
use ::std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
    time::Duration,
};

use ::anyhow::{bail, ensure, Context, Result};
use ::image::{
    codecs::gif::{GifDecoder, GifEncoder, Repeat},
    AnimationDecoder, Delay, Frame, RgbaImage,
};
use ::resampla_image::{
    scaling::{best_curve, scaling_size, ScalingCondition, ScalingTarget},
    AnimationFrame, ColorSpace, FilterType, PixelLayout, RasterImage, ResamplerEngine, ResizeConfig,
};
use ::tracing::{debug, info, instrument, warn};

/// How every image of a batch is sized and filtered
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOptions {
    pub width: Option<usize>,
    pub height: Option<usize>,
    /// Uniform scale, only used without width and height
    pub scale: Option<f64>,
    pub fit: ScalingTarget,
    pub condition: ScalingCondition,
    pub filter: FilterType,
    /// Pick the curve per image from its size change instead of `filter`
    pub auto_filter: bool,
    /// Inputs are already linear light
    pub linear: bool,
}

impl BatchOptions {
    /// Destination size of a `src` sized image
    pub fn target_size(&self, src: (usize, usize)) -> Result<(usize, usize)> {
        let size = match (self.width, self.height, self.scale) {
            (Some(w), Some(h), _) => scaling_size(src, (w, h), self.fit, self.condition),
            (Some(w), None, _) => scaling_size(src, (w, 0), ScalingTarget::WidthTouch, self.condition),
            (None, Some(h), _) => scaling_size(src, (0, h), ScalingTarget::HeightTouch, self.condition),
            (None, None, Some(s)) => {
                ensure!(s.is_finite() && s > 0., "invalid scale {}", s);
                let scaled = |v: usize| ((v as f64 * s).ceil() as usize).max(1);
                scaling_size(src, (scaled(src.0), scaled(src.1)), ScalingTarget::Stretch, self.condition)
            }
            (None, None, None) => bail!("a target width, height or scale is required"),
        };
        ensure!(size.0 > 0 && size.1 > 0, "{}x{} would be resized to {}x{}", src.0, src.1, size.0, size.1);
        Ok(size)
    }
    #[inline]
    fn color_space(&self) -> ColorSpace {
        if self.linear {
            ColorSpace::Linear
        } else {
            ColorSpace::Srgb
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub resized: usize,
    pub failed: usize,
}

/// One engine reused for every image
#[derive(Debug)]
pub struct Batch {
    engine: ResamplerEngine,
    options: BatchOptions,
}

#[inline]
fn is_gif(path: &Path) -> bool { path.extension().map_or(false, |e| e.eq_ignore_ascii_case("gif")) }

impl Batch {
    /// `config` supplies everything but the output size and filter, which are set per image
    pub fn new(config: ResizeConfig, options: BatchOptions) -> Result<Self> {
        Ok(Self { engine: ResamplerEngine::new(config)?, options })
    }
    #[inline]
    pub fn engine(&self) -> &ResamplerEngine { &self.engine }
    /// Resize `input` into `output`. A folder is resized file by file into the `output` folder,
    /// failures are logged and counted instead of stopping the batch.
    pub fn run(&mut self, input: &Path, output: &Path) -> Result<BatchSummary> {
        if !input.is_dir() {
            self.resize_file(input, output)?;
            return Ok(BatchSummary { resized: 1, failed: 0 });
        }
        fs::create_dir_all(output).with_context(|| format!("could not create {}", output.display()))?;
        let mut entries: Vec<_> = fs::read_dir(input)
            .with_context(|| format!("could not read {}", input.display()))?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        entries.sort();
        let mut summary = BatchSummary::default();
        for path in entries {
            let Some(name) = path.file_name() else {
                continue;
            };
            match self.resize_file(&path, &output.join(name)) {
                Ok(()) => summary.resized += 1,
                Err(e) => {
                    warn!("skipping {}: {:#}", path.display(), e);
                    summary.failed += 1;
                }
            }
        }
        info!("{} image(s) resized, {} failed", summary.resized, summary.failed);
        self.engine.release_buffers();
        Ok(summary)
    }
    /// Point the engine at the size and curve for a `src` sized image
    fn prepare(&mut self, src: (usize, usize)) -> Result<(usize, usize)> {
        let size = self.options.target_size(src)?;
        let curve = if self.options.auto_filter { best_curve(src, size) } else { self.options.filter.curve() };
        self.engine.set_output_size(Some(size))?;
        self.engine.set_filter(curve)?;
        debug!("{}x{} -> {}x{} with {}", src.0, src.1, size.0, size.1, curve);
        Ok(size)
    }
    #[instrument(skip_all, level = "trace")]
    pub fn resize_file(&mut self, input: &Path, output: &Path) -> Result<()> {
        if is_gif(input) && is_gif(output) {
            return self.resize_animation(input, output);
        }
        let decoded = ::image::open(input).with_context(|| format!("could not decode {}", input.display()))?;
        let image = RasterImage::from_dynamic(decoded)?.with_color_space(self.options.color_space());
        let src = image.dimensions();
        let size = self.prepare(src)?;
        let resized = self.engine.resize_owned(image)?;
        resized.into_dynamic()?.save(output).with_context(|| format!("could not write {}", output.display()))?;
        info!("{} ({}x{}) -> {} ({}x{})", input.display(), src.0, src.1, output.display(), size.0, size.1);
        Ok(())
    }
    /// Every frame of a GIF, sized after the first one
    fn resize_animation(&mut self, input: &Path, output: &Path) -> Result<()> {
        let reader = BufReader::new(File::open(input).with_context(|| format!("could not open {}", input.display()))?);
        let decoded = GifDecoder::new(reader)?.into_frames().collect_frames()?;
        let color_space = self.options.color_space();
        let frames = decoded
            .into_iter()
            .map(|frame| -> Result<AnimationFrame> {
                let duration = Duration::from(frame.delay());
                let buffer = frame.into_buffer();
                let (w, h) = (buffer.width() as usize, buffer.height() as usize);
                let image = RasterImage::from_raw(buffer.into_raw(), w, h, PixelLayout::Rgba)?.with_color_space(color_space);
                Ok(AnimationFrame::new(image, duration))
            })
            .collect::<Result<Vec<_>>>()?;
        let Some(first) = frames.first() else {
            bail!("{} has no frames", input.display());
        };
        let (count, src) = (frames.len(), first.image.dimensions());
        let size = self.prepare(src)?;
        let resized = self.engine.resize_frames(frames)?;
        let mut encoder = GifEncoder::new(BufWriter::new(
            File::create(output).with_context(|| format!("could not create {}", output.display()))?,
        ));
        encoder.set_repeat(Repeat::Infinite)?;
        for AnimationFrame { image, duration } in resized {
            let (w, h) = (image.width() as u32, image.height() as u32);
            let buffer = RgbaImage::from_raw(w, h, image.into_raw()).context("frame buffer does not match its size")?;
            encoder.encode_frame(Frame::from_parts(buffer, 0, 0, Delay::from_saturating_duration(duration)))?;
        }
        info!("{} ({} frames, {}x{}) -> {} ({}x{})", input.display(), count, src.0, src.1, output.display(), size.0, size.1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(width: Option<usize>, height: Option<usize>, scale: Option<f64>) -> BatchOptions {
        BatchOptions { width, height, scale, ..BatchOptions::default() }
    }

    #[test]
    fn target_size_from_options() {
        assert_eq!(options(Some(100), Some(100), None).target_size((400, 200)).unwrap(), (100, 50));
        assert_eq!(options(Some(100), None, None).target_size((300, 200)).unwrap(), (100, 67));
        assert_eq!(options(None, Some(100), None).target_size((300, 200)).unwrap(), (150, 100));
        assert_eq!(options(None, None, Some(0.5)).target_size((5, 4)).unwrap(), (3, 2));
        assert!(options(None, None, None).target_size((5, 4)).is_err());
        assert!(options(None, None, Some(-1.)).target_size((5, 4)).is_err());
        // rounds to nothing
        assert!(options(Some(1), None, None).target_size((1000, 1)).is_err());
    }

    #[test]
    fn condition_can_keep_size() {
        let opts = BatchOptions { condition: ScalingCondition::OnlyIfSmaller, ..options(Some(800), Some(800), None) };
        assert_eq!(opts.target_size((400, 200)).unwrap(), (800, 400));
        let opts = BatchOptions { condition: ScalingCondition::OnlyIfLarger, ..opts };
        assert_eq!(opts.target_size((400, 200)).unwrap(), (400, 200));
    }

    #[test]
    fn resizes_a_folder_and_skips_garbage() {
        let dir = ::std::env::temp_dir().join(format!("resampla-batch-{}", ::std::process::id()));
        let (input, output) = (dir.join("in"), dir.join("out"));
        fs::create_dir_all(&input).unwrap();
        RgbaImage::from_pixel(16, 8, ::image::Rgba([200, 30, 90, 255])).save(input.join("a.png")).unwrap();
        fs::write(input.join("b.png"), b"not a png").unwrap();
        let mut batch = Batch::new(ResizeConfig { num_threads: 2, ..ResizeConfig::default() }, options(Some(4), None, None)).unwrap();
        let summary = batch.run(&input, &output).unwrap();
        assert_eq!(summary, BatchSummary { resized: 1, failed: 1 });
        let resized = ::image::open(output.join("a.png")).unwrap().to_rgba8();
        assert_eq!(resized.dimensions(), (4, 2));
        assert_eq!(resized.get_pixel(1, 1).0, [200, 30, 90, 255]);
        assert_eq!(batch.engine().idle_buffers(), 0);
        fs::remove_dir_all(&dir).unwrap();
    }
}
