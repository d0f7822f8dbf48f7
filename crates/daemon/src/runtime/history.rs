//! Rolling history buffer.
//!
//! Captures the raw stream output of recent invocations so that after a
//! provider-side compaction the daemon can hand the agent back what the
//! summarizer threw away. Sized by a chars-per-token approximation, not
//! a tokenizer: the budget only shapes a FIFO recall buffer, exact token
//! counts buy nothing here.

use std::collections::VecDeque;

/// Bounded FIFO of raw stream chunks.
///
/// Owned exclusively by one daemon's invocation path; appends and reads
/// are strictly sequential, so no locking.
pub struct RollingBuffer {
    chunks: VecDeque<String>,
    total_chars: usize,
    capacity_chars: usize,
}

impl RollingBuffer {
    pub fn new(capacity_chars: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            total_chars: 0,
            capacity_chars,
        }
    }

    /// Append a chunk, then evict oldest-first until the total fits the
    /// capacity again. A chunk bigger than the whole capacity survives
    /// only as its tail.
    pub fn append(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.total_chars += text.len();
        self.chunks.push_back(text.to_string());

        while self.total_chars > self.capacity_chars {
            if self.chunks.len() > 1 {
                if let Some(removed) = self.chunks.pop_front() {
                    self.total_chars -= removed.len();
                }
                continue;
            }
            // Single oversized chunk: keep its tail rather than dropping
            // the only recall content present.
            if let Some(chunk) = self.chunks.pop_front() {
                let mut start = chunk.len() - self.capacity_chars.min(chunk.len());
                while start < chunk.len() && !chunk.is_char_boundary(start) {
                    start += 1;
                }
                let tail = chunk[start..].to_string();
                self.total_chars = tail.len();
                if !tail.is_empty() {
                    self.chunks.push_back(tail);
                }
            }
            break;
        }
    }

    /// Concatenation of all retained chunks, oldest first.
    pub fn snapshot(&self) -> String {
        self.chunks.iter().map(String::as_str).collect()
    }

    /// Current total in characters.
    pub fn size(&self) -> usize {
        self.total_chars
    }

    pub fn is_empty(&self) -> bool {
        self.total_chars == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity_chars
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_never_exceeds_capacity() {
        let mut buffer = RollingBuffer::new(100);
        for i in 0..50 {
            buffer.append(&"x".repeat(7 + i % 13));
            assert!(
                buffer.size() <= 100,
                "size {} exceeded capacity after append {i}",
                buffer.size()
            );
        }
    }

    #[test]
    fn snapshot_keeps_chronological_order() {
        let mut buffer = RollingBuffer::new(1000);
        buffer.append("first ");
        buffer.append("second ");
        buffer.append("third");
        assert_eq!(buffer.snapshot(), "first second third");
    }

    #[test]
    fn oldest_chunk_evicted_first() {
        // 400-char capacity (100 tokens at 4 chars each): a 150-char
        // chunk followed by a 350-char chunk evicts the first entirely.
        let mut buffer = RollingBuffer::new(400);
        let first = "a".repeat(150);
        let second = "b".repeat(350);
        buffer.append(&first);
        buffer.append(&second);

        assert_eq!(buffer.size(), 350);
        assert_eq!(buffer.snapshot(), second);
    }

    #[test]
    fn oversized_chunk_keeps_only_its_tail() {
        let mut buffer = RollingBuffer::new(400);
        buffer.append("old content");
        let big = format!("{}{}", "h".repeat(200), "t".repeat(400));
        buffer.append(&big);

        assert_eq!(buffer.size(), 400);
        assert_eq!(buffer.snapshot(), "t".repeat(400));
    }

    #[test]
    fn zero_capacity_drains_to_empty() {
        let mut buffer = RollingBuffer::new(0);
        buffer.append("anything");
        assert_eq!(buffer.size(), 0);
        assert!(buffer.is_empty());
        assert_eq!(buffer.snapshot(), "");
    }

    #[test]
    fn empty_appends_are_ignored() {
        let mut buffer = RollingBuffer::new(10);
        buffer.append("");
        assert!(buffer.is_empty());
    }

    #[test]
    fn tail_trim_lands_on_char_boundary() {
        let mut buffer = RollingBuffer::new(5);
        // 4 bytes per char; a 5-byte budget cannot split one in half.
        buffer.append("𝄞𝄞𝄞");
        assert!(buffer.size() <= 5);
        assert_eq!(buffer.snapshot(), "𝄞");
    }
}
