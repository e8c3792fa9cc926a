use ::std::time::{Duration, Instant};

use ::tracing::debug;

/// Phase timer, logs every split and the total (with throughput once pixels are known) when dropped
pub(crate) struct StageTimer {
    label: &'static str,
    start: Instant,
    last: Instant,
    pixels: Option<u64>,
}
impl StageTimer {
    #[inline]
    pub fn new(label: &'static str) -> Self {
        let now = Instant::now();
        Self { label, start: now, last: now, pixels: None }
    }
    /// Time since the previous split (or creation)
    pub fn split(&mut self, stage: &str) -> Duration {
        let now = Instant::now();
        let elapsed = now - self.last;
        self.last = now;
        debug!(target: "StageTimer", "{} {} took {:?}", self.label, stage, elapsed);
        elapsed
    }
    /// Report throughput for `pixels` output pixels when dropped
    #[inline]
    pub fn set_pixels(&mut self, pixels: u64) { self.pixels = Some(pixels); }
}
impl Drop for StageTimer {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        match self.pixels {
            Some(pixels) => {
                let rate = pixels as f64 / elapsed.as_secs_f64().max(1e-9);
                debug!(target: "StageTimer", "{} took {:?} ({:.0} pixels/s)", self.label, elapsed, rate);
            }
            None => debug!(target: "StageTimer", "{} took {:?}", self.label, elapsed),
        }
    }
}
