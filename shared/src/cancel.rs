use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

/// Cooperative stop flag shared by every worker of one generation.
///
/// Clones observe the same flag. There is no way to un-cancel: a new
/// generation builds a new token.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn cancel_is_visible_to_clones_on_other_threads() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());

        let watcher = token.clone();
        let handle = thread::spawn(move || {
            while !watcher.is_cancelled() {
                thread::yield_now();
            }
        });

        token.cancel();
        handle.join().unwrap();
        assert!(token.is_cancelled());
    }

    #[test]
    fn fresh_tokens_are_independent() {
        let old = CancelToken::new();
        old.cancel();
        let new = CancelToken::new();
        assert!(old.is_cancelled());
        assert!(!new.is_cancelled());
    }
}
