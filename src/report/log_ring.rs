//! Bounded rolling window of recent activity lines.

use std::collections::VecDeque;

/// Number of lines kept by [`LogRing::default`].
pub const DEFAULT_LOG_CAPACITY: usize = 20;

/// Fixed-capacity FIFO of log lines; the oldest line is evicted first.
#[derive(Debug, Clone)]
pub struct LogRing {
    lines: VecDeque<String>,
    capacity: usize,
}

impl Default for LogRing {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_LOG_CAPACITY)
    }
}

impl LogRing {
    /// Creates a ring holding at most `capacity` lines (minimum 1).
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `line`, evicting the oldest line when full.
    pub fn push(&mut self, line: impl Into<String>) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line.into());
    }

    /// Appends `text` prefixed with the local wall-clock time (`[HH:MM:SS]`).
    ///
    /// Returns the stored line.
    pub fn push_timestamped(&mut self, text: &str) -> String {
        let line = format!("{} {text}", chrono::Local::now().format("[%H:%M:%S]"));
        self.push(line.clone());
        line
    }

    /// Lines from oldest to newest.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Number of lines currently held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Returns true when no lines are held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Maximum number of lines held.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// All lines joined with newlines, oldest first.
    #[must_use]
    pub fn render(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_evicts_oldest_beyond_capacity() {
        let mut ring = LogRing::with_capacity(3);
        for i in 0..5 {
            ring.push(format!("line {i}"));
        }
        assert_eq!(ring.len(), 3);
        assert_eq!(ring.lines().collect::<Vec<_>>(), ["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_default_capacity_is_twenty() {
        let mut ring = LogRing::default();
        for i in 0..25 {
            ring.push(i.to_string());
        }
        assert_eq!(ring.capacity(), DEFAULT_LOG_CAPACITY);
        assert_eq!(ring.len(), 20);
        assert_eq!(ring.lines().next(), Some("5"));
    }

    #[test]
    fn test_zero_capacity_is_clamped() {
        let mut ring = LogRing::with_capacity(0);
        ring.push("a");
        ring.push("b");
        assert_eq!(ring.render(), "b");
    }

    #[test]
    fn test_push_timestamped_prefixes_clock() {
        let mut ring = LogRing::default();
        let line = ring.push_timestamped("hello");
        assert!(line.starts_with('['), "got {line}");
        assert!(line.ends_with("] hello"), "got {line}");
        assert_eq!(line.len(), "[00:00:00] hello".len());
    }

    #[test]
    fn test_render_joins_with_newlines() {
        let mut ring = LogRing::default();
        assert!(ring.is_empty());
        ring.push("one");
        ring.push("two");
        assert_eq!(ring.render(), "one\ntwo");
    }
}
