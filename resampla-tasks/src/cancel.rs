use ::std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative cancellation flag shared between the caller and a running job.
///
/// Cloning is cheap, all clones observe the same flag. Once cancelled a token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[inline]
    pub fn new() -> Self { Self::default() }
    /// Request cancellation of every job observing this token
    #[inline]
    pub fn cancel(&self) { self.0.store(true, Ordering::Release); }
    #[inline]
    pub fn is_cancelled(&self) -> bool { self.0.load(Ordering::Acquire) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancelToken::new();
        let other = token.clone();
        assert!(!other.is_cancelled());
        token.cancel();
        assert!(other.is_cancelled());
    }
}
