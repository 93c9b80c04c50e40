//! Lightweight frame counters sampled by the camera and display managers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A shared frame counter for one stream.
#[derive(Clone, Default)]
pub struct FpsCounter {
    frames: Arc<AtomicU64>,
}

impl FpsCounter {
    /// A counter starting at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one frame.
    pub fn tick(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Total frames recorded.
    pub fn count(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticks_accumulate_across_clones() {
        let counter = FpsCounter::new();
        let alias = counter.clone();
        counter.tick();
        alias.tick();
        assert_eq!(counter.count(), 2);
    }
}
