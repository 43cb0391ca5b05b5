//! Sliding sample windows
//!
//! Each sensor stream keeps two bounded FIFO windows of recent samples: one for
//! the phase before the user action and one for the phase during/after it.

use crate::types::Sample;
use std::collections::VecDeque;

/// Default number of samples retained per window
pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

/// Bounded FIFO of the most recent samples for one stream and phase
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl Default for WindowBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

impl WindowBuffer {
    /// Create an empty window holding at most `capacity` samples
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(DEFAULT_WINDOW_CAPACITY)),
            capacity,
        }
    }

    /// Append a sample, evicting the oldest one first when full
    pub fn push(&mut self, sample: Sample) {
        if self.capacity == 0 {
            return;
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Current contents, oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        self.samples.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Which side of the user action a sample belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Pre,
    Post,
}

/// The pre/post window pair owned by a single sensor stream
#[derive(Debug, Clone)]
pub struct PhaseWindows {
    pub pre: WindowBuffer,
    pub post: WindowBuffer,
}

impl PhaseWindows {
    pub fn new(capacity: usize) -> Self {
        Self {
            pre: WindowBuffer::new(capacity),
            post: WindowBuffer::new(capacity),
        }
    }

    pub fn push(&mut self, phase: Phase, sample: Sample) {
        match phase {
            Phase::Pre => self.pre.push(sample),
            Phase::Post => self.post.push(sample),
        }
    }

    pub fn clear(&mut self) {
        self.pre.clear();
        self.post.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(x: f32) -> Sample {
        Sample::from_axes([x, 0.0, 0.0]).unwrap()
    }

    #[test]
    fn test_fifo_eviction() {
        let mut window = WindowBuffer::default();

        // K + 1 samples: 0..=10, only 1..=10 should remain
        for i in 0..=DEFAULT_WINDOW_CAPACITY {
            window.push(sample(i as f32));
        }

        assert_eq!(window.len(), DEFAULT_WINDOW_CAPACITY);
        let xs: Vec<f32> = window.snapshot().iter().map(|s| s.components()[0]).collect();
        let expected: Vec<f32> = (1..=10).map(|i| i as f32).collect();
        assert_eq!(xs, expected);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut window = WindowBuffer::new(3);
        window.push(sample(1.0));
        window.push(sample(2.0));

        let first = window.snapshot();
        let second = window.snapshot();
        assert_eq!(first, second);
        assert_eq!(window.len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut window = WindowBuffer::new(3);
        window.push(sample(1.0));
        window.clear();
        assert!(window.is_empty());
        assert!(window.snapshot().is_empty());
    }

    #[test]
    fn test_phase_routing_is_independent() {
        let mut windows = PhaseWindows::new(4);
        windows.push(Phase::Pre, sample(1.0));
        windows.push(Phase::Post, sample(2.0));
        windows.push(Phase::Post, sample(3.0));

        assert_eq!(windows.pre.len(), 1);
        assert_eq!(windows.post.len(), 2);

        windows.clear();
        assert!(windows.pre.is_empty() && windows.post.is_empty());
    }
}
