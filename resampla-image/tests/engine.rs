use ::std::{
    borrow::Cow,
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use ::resampla_image::*;

fn engine(config: ResizeConfig) -> ResamplerEngine { ResamplerEngine::new(ResizeConfig { num_threads: 3, ..config }).unwrap() }

fn filled(width: usize, height: usize, layout: PixelLayout, px: &[u8]) -> RasterImage {
    let data = px.iter().copied().cycle().take(width * height * px.len()).collect();
    RasterImage::from_raw(data, width, height, layout).unwrap()
}

fn checkerboard(size: usize) -> RasterImage {
    let data = (0..size * size).map(|i| if (i % size + i / size) % 2 == 1 { 255 } else { 0 }).collect();
    RasterImage::from_raw(data, size, size, PixelLayout::Gray).unwrap()
}

fn noise(width: usize, height: usize) -> RasterImage {
    let mut state = 0x2545_f491_4f6c_dd1du64;
    let data = (0..width * height * 4)
        .map(|_| {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 56) as u8
        })
        .collect();
    RasterImage::from_raw(data, width, height, PixelLayout::Rgba).unwrap()
}

fn mean(image: &RasterImage) -> f64 { image.data().iter().map(|&b| f64::from(b)).sum::<f64>() / image.data().len() as f64 }

#[test]
fn same_size_without_offset_is_untouched() {
    let image = filled(5, 3, PixelLayout::Rgb, &[1, 2, 3]);
    let engine = engine(ResizeConfig { offset: Some((0., 0.)), ..ResizeConfig::with_output_size(5, 3) });
    match engine.resize(&image).unwrap() {
        Cow::Borrowed(same) => assert!(::std::ptr::eq(same, &image)),
        Cow::Owned(_) => panic!("identity resize produced a new image"),
    }
    // the default half pixel offset of an odd size does resample
    let engine = self::engine(ResizeConfig::with_output_size(5, 3));
    assert!(matches!(engine.resize(&image).unwrap(), Cow::Owned(_)));
}

#[test]
fn box_halving_averages_blocks() {
    let data = [0, 0, 255, 255].repeat(4);
    let image = RasterImage::from_raw(data, 4, 4, PixelLayout::Gray).unwrap();
    for ignore_color_space in [false, true] {
        let engine = engine(ResizeConfig {
            output_size: Some((2, 2)),
            output_scale: Some((0.5, 0.5)),
            offset: Some((0., 0.)),
            filter: ResamplingCurve::Box,
            ignore_color_space,
            ..ResizeConfig::default()
        });
        let resized = engine.resize(&image).unwrap();
        assert_eq!(resized.dimensions(), (2, 2));
        assert_eq!(resized.data(), &[0, 255, 0, 255]);
    }
}

#[test]
fn downscaled_checkerboard_is_gray() {
    let image = checkerboard(16);
    let engine = engine(ResizeConfig { ignore_color_space: true, ..ResizeConfig::with_output_size(8, 8) });
    let resized = engine.resize(&image).unwrap();
    let m = mean(&resized);
    assert!((m - 127.5).abs() < 8., "mean {}", m);
    assert!(resized.data().iter().all(|&b| (112..=143).contains(&b)), "{:?}", resized.data());
    // averaging in linear light is brighter than averaging gamma encoded values
    let engine = self::engine(ResizeConfig::with_output_size(8, 8));
    let m = mean(&engine.resize(&image).unwrap());
    assert!((m - 188.).abs() < 8., "mean {}", m);
}

#[test]
fn constant_color_survives_every_order() {
    let px = [12, 200, 99];
    let image = filled(7, 5, PixelLayout::Rgb, &px);
    for size in [(3, 9), (14, 2), (7, 11), (2, 5)] {
        let resized = engine(ResizeConfig::with_output_size(size.0, size.1)).resize(&image).unwrap().into_owned();
        assert_eq!(resized.dimensions(), size);
        assert!(resized.data().chunks_exact(3).all(|p| p == px), "{:?}: {:?}", size, resized.data());
    }
}

#[test]
fn transparent_pixels_come_out_black() {
    let image = filled(4, 4, PixelLayout::Rgba, &[200, 100, 50, 0]);
    let resized = engine(ResizeConfig::with_output_size(2, 2)).resize(&image).unwrap();
    assert_eq!(resized.data(), &[0; 16]);
    let image = filled(4, 4, PixelLayout::GrayAlpha, &[77, 0]);
    let resized = engine(ResizeConfig::with_output_size(3, 3)).resize(&image).unwrap();
    assert!(resized.data().iter().all(|&b| b == 0));
}

#[test]
fn output_keeps_image_flags() {
    let image = filled(6, 6, PixelLayout::Rgba, &[10, 20, 30, 255]).with_color_space(ColorSpace::Linear).with_premultiplied(true);
    let resized = engine(ResizeConfig::with_output_scale(0.5, 0.5)).resize(&image).unwrap();
    assert_eq!(resized.dimensions(), (3, 3));
    assert_eq!(resized.layout(), PixelLayout::Rgba);
    assert_eq!(resized.color_space(), ColorSpace::Linear);
    assert!(resized.is_premultiplied());
    assert!(resized.data().chunks_exact(4).all(|p| p == [10, 20, 30, 255]));
}

#[derive(Default)]
struct Recorder {
    updates: Mutex<Vec<ProgressEvent>>,
    completed: Mutex<Vec<ProgressEvent>>,
}
impl ProgressListener for Recorder {
    fn progress_updated(&self, event: ProgressEvent) { self.updates.lock().unwrap().push(event); }
    fn progress_completed(&self, event: ProgressEvent) { self.completed.lock().unwrap().push(event); }
}

#[test]
fn progress_is_reported_per_task() {
    let engine = engine(ResizeConfig::with_output_size(10, 6));
    let recorder = Arc::new(Recorder::default());
    let listener: Arc<dyn ProgressListener> = recorder.clone();
    engine.add_progress_listener(listener.clone());
    engine.resize(&checkerboard(20)).unwrap();
    let updates = recorder.updates.lock().unwrap().clone();
    assert_eq!(updates[0], ProgressEvent::new(0, None));
    let total = updates[1].total.unwrap();
    assert_eq!(updates[1].progress, 0);
    assert_eq!(updates.len() as u64, total + 2);
    assert!(updates[2..].windows(2).all(|w| w[1].progress == w[0].progress + 1));
    assert_eq!(*updates.last().unwrap(), ProgressEvent::new(total, Some(total)));
    assert_eq!(*recorder.completed.lock().unwrap(), vec![ProgressEvent::new(60, Some(60))]);

    assert!(engine.remove_progress_listener(&listener));
    assert!(!engine.remove_progress_listener(&listener));
    engine.resize(&checkerboard(20)).unwrap();
    assert_eq!(recorder.updates.lock().unwrap().len() as u64, total + 2);
}

/// Cancels its token as soon as the first task finished
struct CancelOnFirstTask(CancelToken);
impl ProgressListener for CancelOnFirstTask {
    fn progress_updated(&self, event: ProgressEvent) {
        if event.progress >= 1 && event.total.is_some() {
            self.0.cancel();
        }
    }
}

#[test]
fn cancellation_interrupts_without_leaking_tasks() {
    let image = filled(512, 512, PixelLayout::Rgba, &[90, 160, 220, 200]);
    let engine = ResamplerEngine::new(ResizeConfig { num_threads: 2, ..ResizeConfig::with_output_size(300, 300) }).unwrap();
    let token = CancelToken::new();
    engine.add_progress_listener(Arc::new(CancelOnFirstTask(token.clone())));
    let err = engine.resize_cancellable(&image, &token).unwrap_err();
    assert!(err.is_interrupted(), "{}", err);
    assert_eq!(engine.executor().active_tasks(), 0);

    // a cancelled token stays cancelled, a fresh one works on the same engine
    assert_eq!(engine.resize_cancellable(&image, &token).unwrap_err(), ResizeError::Interrupted);
    assert_eq!(engine.resize_cancellable(&image, &CancelToken::new()).unwrap().dimensions(), (300, 300));
}

#[test]
fn frames_keep_order_and_durations() {
    let engine = engine(ResizeConfig::with_output_size(4, 4));
    let frames: Vec<_> = (0..3u8)
        .map(|i| AnimationFrame::new(filled(8, 8, PixelLayout::Rgb, &[i * 50, 0, 0]), Duration::from_millis(40 * u64::from(i))))
        .collect();
    let resized = engine.resize_frames(frames).unwrap();
    assert_eq!(resized.len(), 3);
    for (i, frame) in resized.iter().enumerate() {
        assert_eq!(frame.duration, Duration::from_millis(40 * i as u64));
        assert_eq!(frame.image.dimensions(), (4, 4));
        assert_eq!(frame.image.pixel(1, 2), [i as u8 * 50, 0, 0]);
    }
    assert!(engine.idle_buffers() > 0);
    engine.release_buffers();
    assert_eq!(engine.idle_buffers(), 0);
}

#[test]
fn concurrent_resizes_match_serial() {
    let engine = &engine(ResizeConfig::with_output_size(13, 7));
    let images: Vec<_> = (4..8).map(|n| checkerboard(n * 5)).collect();
    let serial: Vec<_> = images.iter().map(|i| engine.resize(i).unwrap().into_owned()).collect();
    let parallel: Vec<_> = thread::scope(|s| {
        let handles: Vec<_> = images.iter().map(|i| s.spawn(move || engine.resize(i).unwrap().into_owned())).collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(serial, parallel);
}

#[test]
fn stripe_count_does_not_change_output() {
    // wide kernels make every vertical stripe read rows written by its neighbours
    let image = noise(97, 301);
    for size in [(13, 17), (150, 600), (40, 9)] {
        let config = ResizeConfig { filter: ResamplingCurve::LANCZOS8, ..ResizeConfig::with_output_size(size.0, size.1) };
        let serial = ResamplerEngine::new(ResizeConfig { num_threads: 1, ..config.clone() }).unwrap();
        let expected = serial.resize(&image).unwrap().into_owned();
        let parallel = ResamplerEngine::new(ResizeConfig { num_threads: 32, ..config }).unwrap();
        for _ in 0..10 {
            let resized = parallel.resize(&image).unwrap();
            assert_eq!(resized.dimensions(), size);
            assert!(resized.data() == expected.data(), "{}x{} differs between 1 and 32 threads", size.0, size.1);
        }
    }
}

#[test]
fn pass_order_is_a_function_of_geometry() {
    let plan = ResizePlan::resolve(&ResizeConfig::with_output_size(100, 50), (4000, 100)).unwrap();
    assert_eq!(plan.order(&ResamplingCurve::LANCZOS3), ResampleOrder::XFirst);
    let plan = ResizePlan::resolve(&ResizeConfig::with_output_size(50, 100), (100, 4000)).unwrap();
    assert_eq!(plan.order(&ResamplingCurve::LANCZOS3), ResampleOrder::YFirst);
    assert_eq!(plan.order(&ResamplingCurve::LANCZOS3), plan.order(&ResamplingCurve::LANCZOS3));
}

#[test]
fn bad_configuration_fails_before_any_work() {
    assert!(matches!(ResamplerEngine::new(ResizeConfig::with_output_size(0, 3)), Err(ResizeError::Config(_))));
    let engine = engine(ResizeConfig::default());
    assert!(matches!(engine.resize(&checkerboard(4)), Err(ResizeError::Config(_))));
    assert_eq!(engine.executor().active_tasks(), 0);
    // valid on its own, but no sampling table could hold the kernel
    let engine = self::engine(ResizeConfig::with_output_scale(1e-300, 1e-300));
    let image = filled(10, 10, PixelLayout::Rgba, &[10, 20, 30, 255]);
    assert!(matches!(engine.resize(&image), Err(ResizeError::Config(_))));
    assert_eq!(engine.executor().active_tasks(), 0);
}
