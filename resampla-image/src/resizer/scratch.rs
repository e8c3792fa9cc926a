//! Reusable fixed-point working buffers

use ::std::sync::{Mutex, MutexGuard, PoisonError};

/// How many idle buffers a pool keeps, a two pass resize holds three at once
const MAX_POOLED: usize = 6;

/// Recycles fixed-point buffers across resizes (and animation frames) of one engine.
///
/// A buffer is owned by exactly one resize between [`take`](Self::take) and [`give`](Self::give),
/// concurrent resizes never share one.
#[derive(Debug, Default)]
pub(crate) struct ScratchPool {
    free: Mutex<Vec<Vec<i16>>>,
}

impl ScratchPool {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, Vec<Vec<i16>>> { self.free.lock().unwrap_or_else(PoisonError::into_inner) }
    /// A zeroed buffer of `len` samples, reusing the idle buffer with the largest capacity
    pub fn take(&self, len: usize) -> Vec<i16> {
        if len == 0 {
            return Vec::new();
        }
        let reused = {
            let mut free = self.lock();
            let best = free.iter().enumerate().max_by_key(|(_, b)| b.capacity()).map(|(i, _)| i);
            best.map(|i| free.swap_remove(i))
        };
        match reused {
            Some(mut buf) => {
                buf.clear();
                buf.resize(len, 0);
                buf
            }
            None => vec![0; len],
        }
    }
    /// Return a buffer for reuse, dropped if the pool is full
    pub fn give(&self, buf: Vec<i16>) {
        if buf.capacity() == 0 {
            return;
        }
        let mut free = self.lock();
        if free.len() < MAX_POOLED {
            free.push(buf);
        }
    }
    /// Number of idle buffers
    #[inline]
    pub fn idle(&self) -> usize { self.lock().len() }
    /// Drop every idle buffer
    #[inline]
    pub fn clear(&self) { self.lock().clear() }
}
