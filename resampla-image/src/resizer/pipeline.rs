//! Stage graph of one resize.
//!
//! Every stage (encode, horizontal pass, vertical pass, decode) is cut into row stripes, one task each.
//! A task depends on exactly those tasks of the previous stage that write rows it reads, so a stripe
//! of the second pass can start as soon as its source rows exist instead of waiting for the whole
//! first pass.
use ::core::{convert::Infallible, marker::PhantomData, ops::Range, slice};

use ::resampla_tasks::{CancelToken, DependentTaskQueue, Executor, RunError, Task, TaskContext, TaskId};
use ::tracing::{debug, trace};

use super::{
    convolve,
    plan::{buffer_len, partition, Axis, ResampleOrder, ResizePlan},
    scratch::ScratchPool,
    timer::StageTimer,
};
use crate::{Codec, PixelLayout, ProgressEvent, RasterImage, ResamplingCurve, ResizeError, SamplingTable, Weight};

/// Row-addressed view of one buffer, copied into every task touching it.
///
/// The graph never lets two tasks touch the same row unless both only read it.
struct SharedRows<'a, T> {
    ptr: *mut T,
    row_len: usize,
    rows: usize,
    _buf: PhantomData<&'a mut [T]>,
}
impl<T> Clone for SharedRows<'_, T> {
    #[inline(always)]
    fn clone(&self) -> Self { *self }
}
impl<T> Copy for SharedRows<'_, T> {}
unsafe impl<T: Send + Sync> Send for SharedRows<'_, T> {}

impl<'a, T> SharedRows<'a, T> {
    fn new(buf: &'a mut [T], row_len: usize) -> Self {
        let rows = if row_len == 0 { 0 } else { buf.len() / row_len };
        debug_assert_eq!(rows * row_len, buf.len());
        Self { ptr: buf.as_mut_ptr(), row_len, rows, _buf: PhantomData }
    }
    /// # Safety
    /// No task may write `rows` while the returned slice is alive.
    #[inline]
    unsafe fn rows(&self, rows: Range<usize>) -> &'a [T] {
        assert!(rows.start <= rows.end && rows.end <= self.rows, "rows {:?} out of {}", rows, self.rows);
        slice::from_raw_parts(self.ptr.add(rows.start * self.row_len), rows.len() * self.row_len)
    }
    /// # Safety
    /// No other task may read or write `rows` while the returned slice is alive.
    #[inline]
    unsafe fn rows_mut(&self, rows: Range<usize>) -> &'a mut [T] {
        assert!(rows.start <= rows.end && rows.end <= self.rows, "rows {:?} out of {}", rows, self.rows);
        slice::from_raw_parts_mut(self.ptr.add(rows.start * self.row_len), rows.len() * self.row_len)
    }
}

#[derive(Clone, Copy)]
enum Stage<'a> {
    Encode { codec: Codec, src: &'a [u8], dst: SharedRows<'a, i16> },
    Horizontal { layout: PixelLayout, table: &'a SamplingTable, src: SharedRows<'a, i16>, dst: SharedRows<'a, i16> },
    Vertical { table: &'a SamplingTable, src: SharedRows<'a, i16>, dst: SharedRows<'a, i16> },
    Decode { codec: Codec, src: SharedRows<'a, i16>, dst: SharedRows<'a, u8> },
}
impl Stage<'_> {
    /// Rows written by the stage
    fn height(&self) -> usize {
        match self {
            Self::Encode { dst, .. } | Self::Horizontal { dst, .. } | Self::Vertical { dst, .. } => dst.rows,
            Self::Decode { dst, .. } => dst.rows,
        }
    }
    /// Rows of the previous stage's output needed to produce `rows`
    fn reads(&self, rows: Range<usize>) -> Range<usize> {
        match self {
            Self::Vertical { table, .. } => table.source_span(rows),
            _ => rows,
        }
    }
    fn name(&self) -> &'static str {
        match self {
            Self::Encode { .. } => "encode",
            Self::Horizontal { .. } => "horizontal",
            Self::Vertical { .. } => "vertical",
            Self::Decode { .. } => "decode",
        }
    }
}

/// One stripe of one stage
struct StageTask<'a> {
    stage: Stage<'a>,
    rows: Range<usize>,
}

// SAFETY (all `rows`/`rows_mut` calls below): stripes of one stage are disjoint, and a stage only
// reads rows whose writers it depends on. Every buffer is written by a single stage.
impl Task for StageTask<'_> {
    type Error = Infallible;
    fn run(self, ctx: &TaskContext) -> Result<(), Infallible> {
        let Self { stage, rows } = self;
        match stage {
            Stage::Encode { codec, src, dst } => {
                let len = dst.row_len;
                for y in rows {
                    if ctx.should_stop() {
                        break;
                    }
                    let dst = unsafe { dst.rows_mut(y..y + 1) };
                    codec.encode(&src[y * len..(y + 1) * len], dst);
                }
            }
            Stage::Horizontal { layout, table, src, dst } => {
                for y in rows {
                    if ctx.should_stop() {
                        break;
                    }
                    let (s, d) = unsafe { (src.rows(y..y + 1), dst.rows_mut(y..y + 1)) };
                    convolve::horizontal(layout, table, s, d);
                }
            }
            Stage::Vertical { table, src, dst } => {
                let mut acc = vec![0 as Weight; dst.row_len];
                for y in rows {
                    if ctx.should_stop() {
                        break;
                    }
                    let (indices, weights) = table.row(y);
                    let span = table.source_span(y..y + 1);
                    let (s, d) = unsafe { (src.rows(span.clone()), dst.rows_mut(y..y + 1)) };
                    convolve::vertical(indices, weights, s, span.start, src.row_len, &mut acc, d);
                }
            }
            Stage::Decode { codec, src, dst } => {
                for y in rows {
                    if ctx.should_stop() {
                        break;
                    }
                    let (s, d) = unsafe { (src.rows(y..y + 1), dst.rows_mut(y..y + 1)) };
                    codec.decode(s, d);
                }
            }
        }
        Ok(())
    }
}

struct GraphBuilder<'a> {
    queue: DependentTaskQueue<StageTask<'a>>,
    stripes: usize,
    /// Rows written by each task of the last stage added
    previous: Vec<(Range<usize>, TaskId)>,
}
impl<'a> GraphBuilder<'a> {
    /// Room for the four stages of a two pass resize
    fn new(stripes: usize) -> Self {
        Self { queue: DependentTaskQueue::with_capacity(stripes * 4), stripes, previous: Vec::new() }
    }
    /// Append a stage, each stripe depending on the previous stage's stripes it reads from
    fn stage(&mut self, stage: Stage<'a>) -> Result<(), ResizeError> {
        let mut written = Vec::with_capacity(self.stripes);
        for rows in partition(stage.height(), self.stripes) {
            let task = StageTask { stage, rows: rows.clone() };
            let id = if self.previous.is_empty() {
                self.queue.push(task)
            } else {
                let need = stage.reads(rows.clone());
                let deps = self.previous.iter().filter(|(w, _)| w.start < need.end && need.start < w.end).map(|&(_, id)| id);
                self.queue.push_dependent(task, deps).map_err(|e| ResizeError::Worker(e.to_string()))?
            };
            written.push((rows, id));
        }
        trace!(target: "GraphBuilder", "{} stage: {} task(s)", stage.name(), written.len());
        self.previous = written;
        Ok(())
    }
}

/// Views of every buffer a resize touches
struct Buffers<'a> {
    image: &'a [u8],
    source: SharedRows<'a, i16>,
    middle: SharedRows<'a, i16>,
    target: SharedRows<'a, i16>,
    output: SharedRows<'a, u8>,
}

fn schedule<'a>(
    order: ResampleOrder,
    stripes: usize,
    codec: Codec,
    layout: PixelLayout,
    horizontal: Option<&'a SamplingTable>,
    vertical: Option<&'a SamplingTable>,
    b: Buffers<'a>,
) -> Result<DependentTaskQueue<StageTask<'a>>, ResizeError> {
    let mut graph = GraphBuilder::new(stripes);
    graph.stage(Stage::Encode { codec, src: b.image, dst: b.source })?;
    match (order, horizontal, vertical) {
        (ResampleOrder::XOnly, Some(table), _) => {
            graph.stage(Stage::Horizontal { layout, table, src: b.source, dst: b.target })?;
        }
        (ResampleOrder::YOnly, _, Some(table)) => {
            graph.stage(Stage::Vertical { table, src: b.source, dst: b.target })?;
        }
        (ResampleOrder::XFirst, Some(h), Some(v)) => {
            graph.stage(Stage::Horizontal { layout, table: h, src: b.source, dst: b.middle })?;
            graph.stage(Stage::Vertical { table: v, src: b.middle, dst: b.target })?;
        }
        (ResampleOrder::YFirst, Some(h), Some(v)) => {
            graph.stage(Stage::Vertical { table: v, src: b.source, dst: b.middle })?;
            graph.stage(Stage::Horizontal { layout, table: h, src: b.middle, dst: b.target })?;
        }
        _ => return Err(ResizeError::Worker(format!("no sampling passes for order {:?}", order))),
    }
    graph.stage(Stage::Decode { codec, src: b.target, dst: b.output })?;
    Ok(graph.queue)
}

fn run_error(e: RunError<Infallible>) -> ResizeError {
    match e {
        RunError::Interrupted => ResizeError::Interrupted,
        RunError::Failed(never) => match never {},
        e @ (RunError::Panicked(_) | RunError::Stalled { .. }) => ResizeError::Worker(e.to_string()),
    }
}

/// Everything one resize needs from its engine
pub(crate) struct PipelineContext<'e> {
    pub executor: &'e Executor,
    pub scratch: &'e ScratchPool,
    pub curve: &'e ResamplingCurve,
    pub codec: Codec,
    pub cancel: &'e CancelToken,
}

/// Resample `image` according to `plan`, returning the interleaved destination bytes.
///
/// `order` must not be [`ResampleOrder::None`]. Progress is reported as `(0, tasks)` once the
/// graph is built and `(done, tasks)` after every completed task.
pub(crate) fn execute(
    cx: &PipelineContext<'_>,
    image: &RasterImage,
    plan: &ResizePlan,
    order: ResampleOrder,
    timer: &mut StageTimer,
    mut report: impl FnMut(ProgressEvent),
) -> Result<Vec<u8>, ResizeError> {
    let n = image.channels();
    let ((sw, sh), (dw, dh)) = (plan.src, plan.dst);
    let (middle_len, middle_row) = match order {
        ResampleOrder::XFirst => (buffer_len((dw, sh), n)?, dw * n),
        ResampleOrder::YFirst => (buffer_len((sw, dh), n)?, sw * n),
        _ => (0, 0),
    };
    let (source_len, target_len) = (buffer_len((sw, sh), n)?, buffer_len((dw, dh), n)?);
    let passes = order.passes();
    let needs = |axis: Axis| passes.contains(&axis);
    let build = |axis: Axis| match axis {
        Axis::Horizontal => SamplingTable::build(cx.curve, sw, dw, plan.scale.0, plan.offset.0, n),
        Axis::Vertical => SamplingTable::build(cx.curve, sh, dh, plan.scale.1, plan.offset.1, 1),
    };
    #[cfg(feature = "rayon")]
    let (h_table, v_table) = cx.executor.install(|| {
        ::rayon::join(
            || needs(Axis::Horizontal).then(|| build(Axis::Horizontal)),
            || needs(Axis::Vertical).then(|| build(Axis::Vertical)),
        )
    });
    #[cfg(not(feature = "rayon"))]
    let (h_table, v_table) =
        (needs(Axis::Horizontal).then(|| build(Axis::Horizontal)), needs(Axis::Vertical).then(|| build(Axis::Vertical)));
    timer.split("sampling tables");

    let mut source = cx.scratch.take(source_len);
    let mut middle = cx.scratch.take(middle_len);
    let mut target = cx.scratch.take(target_len);
    let mut output = vec![0u8; target_len];
    let outcome = {
        let buffers = Buffers {
            image: image.data(),
            source: SharedRows::new(&mut source, sw * n),
            middle: SharedRows::new(&mut middle, middle_row),
            target: SharedRows::new(&mut target, dw * n),
            output: SharedRows::new(&mut output, dw * n),
        };
        let stripes = cx.executor.threads();
        schedule(order, stripes, cx.codec, image.layout(), h_table.as_ref(), v_table.as_ref(), buffers).and_then(|queue| {
            let total = queue.total();
            debug!(target: "ResamplerEngine::resize", "{:?}: {} task(s) over {} stripe(s)", order, total, stripes);
            timer.split("stage graph");
            report(ProgressEvent::new(0, Some(total as u64)));
            cx.executor
                .run(queue, cx.cancel, |done, total| report(ProgressEvent::new(done as u64, Some(total as u64))))
                .map_err(run_error)
        })
    };
    cx.scratch.give(source);
    cx.scratch.give(middle);
    cx.scratch.give(target);
    let summary = outcome?;
    timer.split("stages");
    trace!(target: "ResamplerEngine::resize", "{} task(s) in {:?}", summary.completed, summary.elapsed);
    Ok(output)
}
