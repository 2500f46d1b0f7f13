//! Rolling window of recent source sentences.

use std::collections::VecDeque;

/// The last `capacity` source sentences of one stream, oldest first.
#[derive(Clone, Debug)]
pub struct RollingContext {
    sentences: VecDeque<String>,
    capacity: usize,
    sentence_count: u64,
}

impl RollingContext {
    /// Empty window holding at most `capacity` sentences.
    pub fn new(capacity: usize) -> Self {
        Self {
            sentences: VecDeque::with_capacity(capacity + 1),
            capacity,
            sentence_count: 0,
        }
    }

    /// Record a successfully translated source sentence.
    pub fn push(&mut self, sentence: impl Into<String>) {
        self.sentences.push_back(sentence.into());
        while self.sentences.len() > self.capacity {
            let _ = self.sentences.pop_front();
        }
        self.sentence_count += 1;
    }

    /// Current window contents, oldest first.
    pub fn snapshot(&self) -> Vec<String> {
        self.sentences.iter().cloned().collect()
    }

    /// Number of sentences in the window.
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    /// Whether the window is empty.
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Sentences translated over the window's lifetime.
    pub fn sentence_count(&self) -> u64 {
        self.sentence_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_from_the_front() {
        let mut ctx = RollingContext::new(3);
        for s in ["a", "b", "c", "d"] {
            ctx.push(s);
        }
        assert_eq!(ctx.snapshot(), vec!["b", "c", "d"]);
        assert_eq!(ctx.sentence_count(), 4);
    }

    #[test]
    fn zero_capacity_keeps_nothing() {
        let mut ctx = RollingContext::new(0);
        ctx.push("a");
        assert!(ctx.is_empty());
        assert_eq!(ctx.sentence_count(), 1);
    }
}
