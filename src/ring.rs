//! Bounded in-memory stream ring (spec section 4.9).

use std::collections::VecDeque;

const DEFAULT_CAPACITY: usize = 200;

/// Fixed-capacity FIFO of the most recently emitted text lines.
#[derive(Debug, Clone)]
pub struct StreamRing {
    capacity: usize,
    lines: VecDeque<String>,
}

impl StreamRing {
    pub fn new(capacity: usize) -> Self {
        Self { capacity: capacity.max(1), lines: VecDeque::with_capacity(capacity) }
    }

    pub fn push(&mut self, line: String) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    pub fn push_many<I: IntoIterator<Item = String>>(&mut self, lines: I) {
        for line in lines {
            self.push(line);
        }
    }

    /// The most recent `limit` lines, oldest first.
    pub fn snapshot(&self, limit: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(limit);
        self.lines.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

impl Default for StreamRing {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_when_full() {
        let mut ring = StreamRing::new(3);
        for i in 0..5 {
            ring.push(format!("line{i}"));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.snapshot(10), vec!["line2", "line3", "line4"]);
    }

    #[test]
    fn snapshot_limit_returns_tail() {
        let mut ring = StreamRing::new(200);
        for i in 0..10 {
            ring.push(format!("line{i}"));
        }
        assert_eq!(ring.snapshot(3), vec!["line7", "line8", "line9"]);
    }

    #[test]
    fn default_capacity_matches_spec() {
        let ring = StreamRing::default();
        assert_eq!(ring.capacity, DEFAULT_CAPACITY);
    }
}
