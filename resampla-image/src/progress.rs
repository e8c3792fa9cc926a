//! Progress side channel of a resize

/// `progress` out of `total` units, `total` is `None` while still unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressEvent {
    pub progress: u64,
    pub total: Option<u64>,
}
impl ProgressEvent {
    #[inline]
    pub const fn new(progress: u64, total: Option<u64>) -> Self { Self { progress, total } }
    /// Fraction in `[0, 1]`, `None` while the total is unknown
    #[inline]
    pub fn fraction(&self) -> Option<f64> {
        match self.total {
            Some(0) => Some(1.),
            Some(total) => Some(self.progress as f64 / total as f64),
            None => None,
        }
    }
}

/// Observer of resize progress.
///
/// A resize reports `(0, unknown)` on entry, `(0, tasks)` once its stage graph is built, `(done, tasks)`
/// after every completed stage task, and finally [`progress_completed`](Self::progress_completed) with
/// `(pixels, pixels)`. Calls come from the thread that called `resize`.
pub trait ProgressListener: Send + Sync {
    fn progress_updated(&self, event: ProgressEvent);
    fn progress_completed(&self, event: ProgressEvent) { let _ = event; }
}
