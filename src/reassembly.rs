//! Chunk reassembly for payloads split across multiple transactions.
//!
//! Senders split payloads that exceed the wire limit into ordered chunks,
//! each carrying the message id, its index, and the declared chunk count.
//! Chunks may arrive in any order; reconstruction is by index.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::metrics;

/// One chunk of a split payload. Invariant: `total >= 1 && index < total`.
#[derive(Debug, Clone)]
pub struct MessageChunk {
    pub message_id: String,
    pub index: usize,
    pub total: usize,
    pub text: String,
}

struct ChunkBuffer {
    slots: Vec<Option<String>>,
    filled: usize,
    last_update: Instant,
}

impl ChunkBuffer {
    fn new(total: usize) -> Self {
        Self {
            slots: vec![None; total],
            filled: 0,
            last_update: Instant::now(),
        }
    }

    fn is_complete(&self) -> bool {
        self.filled == self.slots.len()
    }

    fn assemble(self) -> String {
        self.slots.into_iter().flatten().collect()
    }
}

/// Buffers chunks per message id until the declared count is met.
///
/// Bounded two ways: a cap on outstanding incomplete buffers with
/// oldest-first eviction, and a staleness sweep that drops buffers idle
/// past the configured window. Both guard against senders that never
/// finish a message.
pub struct ChunkReassembler {
    buffers: HashMap<String, ChunkBuffer>,
    arrival: VecDeque<String>,
    max_incomplete: usize,
    stale_after: Duration,
}

impl ChunkReassembler {
    pub fn new(max_incomplete: usize, stale_after: Duration) -> Self {
        Self {
            buffers: HashMap::new(),
            arrival: VecDeque::new(),
            max_incomplete: max_incomplete.max(1),
            stale_after,
        }
    }

    /// Number of incomplete messages currently buffered
    pub fn outstanding(&self) -> usize {
        self.buffers.len()
    }

    /// Submit one chunk. Returns the reassembled text exactly once, when
    /// the chunk completing its message arrives.
    ///
    /// Malformed descriptors are logged and ignored; they never disturb
    /// other in-flight messages, and a malformed chunk for a message that
    /// already has valid chunks buffered does not poison that message.
    pub fn submit(&mut self, chunk: MessageChunk) -> Option<String> {
        self.sweep_stale();

        if chunk.total == 0 || chunk.index >= chunk.total {
            warn!(
                message_id = %chunk.message_id,
                index = chunk.index,
                total = chunk.total,
                "Rejecting malformed chunk descriptor"
            );
            metrics::record_chunk_rejected("invalid-descriptor");
            return None;
        }

        if let Some(buffer) = self.buffers.get(&chunk.message_id) {
            if buffer.slots.len() != chunk.total {
                warn!(
                    message_id = %chunk.message_id,
                    declared = chunk.total,
                    buffered = buffer.slots.len(),
                    "Rejecting chunk with mismatched total"
                );
                metrics::record_chunk_rejected("total-mismatch");
                return None;
            }
        } else {
            if self.buffers.len() >= self.max_incomplete {
                self.evict_oldest();
            }
            self.buffers
                .insert(chunk.message_id.clone(), ChunkBuffer::new(chunk.total));
            self.arrival.push_back(chunk.message_id.clone());
        }

        let buffer = self
            .buffers
            .get_mut(&chunk.message_id)
            .expect("buffer inserted above");

        if buffer.slots[chunk.index].is_none() {
            buffer.filled += 1;
        }
        buffer.slots[chunk.index] = Some(chunk.text);
        buffer.last_update = Instant::now();

        if !buffer.is_complete() {
            metrics::set_outstanding_buffers(self.buffers.len());
            return None;
        }

        let buffer = self
            .buffers
            .remove(&chunk.message_id)
            .expect("complete buffer present");
        self.arrival.retain(|id| id != &chunk.message_id);
        metrics::set_outstanding_buffers(self.buffers.len());

        debug!(
            message_id = %chunk.message_id,
            chunks = chunk.total,
            "Reassembled chunked message"
        );
        Some(buffer.assemble())
    }

    /// Drop the incomplete buffer that was started first
    fn evict_oldest(&mut self) {
        while let Some(oldest) = self.arrival.pop_front() {
            if self.buffers.remove(&oldest).is_some() {
                warn!(
                    message_id = %oldest,
                    max_incomplete = self.max_incomplete,
                    "Evicting oldest incomplete message buffer"
                );
                metrics::record_buffer_eviction("capacity");
                return;
            }
            // Ids completed earlier leave stale deque entries; skip them.
        }
    }

    /// Drop buffers idle past the staleness window
    fn sweep_stale(&mut self) {
        if self.buffers.is_empty() {
            return;
        }
        let stale_after = self.stale_after;
        let before = self.buffers.len();
        self.buffers.retain(|id, buffer| {
            if buffer.last_update.elapsed() >= stale_after {
                warn!(message_id = %id, "Dropping stale incomplete message buffer");
                false
            } else {
                true
            }
        });
        let dropped = before - self.buffers.len();
        for _ in 0..dropped {
            metrics::record_buffer_eviction("stale");
        }
        if dropped > 0 {
            let live = &self.buffers;
            self.arrival.retain(|id| live.contains_key(id));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, index: usize, total: usize, text: &str) -> MessageChunk {
        MessageChunk {
            message_id: id.to_string(),
            index,
            total,
            text: text.to_string(),
        }
    }

    fn reassembler() -> ChunkReassembler {
        ChunkReassembler::new(16, Duration::from_secs(300))
    }

    #[test]
    fn test_single_chunk_completes_immediately() {
        let mut r = reassembler();
        assert_eq!(r.submit(chunk("m1", 0, 1, "whole")), Some("whole".into()));
        assert_eq!(r.outstanding(), 0);
    }

    #[test]
    fn test_out_of_order_chunks_reassemble_by_index() {
        let mut r = reassembler();
        assert_eq!(r.submit(chunk("m1", 1, 2, "World")), None);
        assert_eq!(
            r.submit(chunk("m1", 0, 2, "Hello ")),
            Some("Hello World".into())
        );
    }

    #[test]
    fn test_duplicate_chunk_is_idempotent() {
        let mut r = reassembler();
        assert_eq!(r.submit(chunk("m1", 0, 2, "a")), None);
        assert_eq!(r.submit(chunk("m1", 0, 2, "a")), None);
        assert_eq!(r.submit(chunk("m1", 1, 2, "b")), Some("ab".into()));
    }

    #[test]
    fn test_malformed_chunk_does_not_poison_message() {
        let mut r = reassembler();
        assert_eq!(r.submit(chunk("m1", 0, 2, "a")), None);
        assert_eq!(r.submit(chunk("m1", 2, 2, "oob")), None);
        assert_eq!(r.submit(chunk("m1", 5, 0, "zero")), None);
        assert_eq!(r.submit(chunk("m1", 1, 2, "b")), Some("ab".into()));
    }

    #[test]
    fn test_capacity_eviction_is_oldest_first() {
        let mut r = ChunkReassembler::new(2, Duration::from_secs(300));
        assert_eq!(r.submit(chunk("old", 0, 2, "x")), None);
        assert_eq!(r.submit(chunk("mid", 0, 2, "y")), None);
        assert_eq!(r.submit(chunk("new", 0, 2, "z")), None);
        assert_eq!(r.outstanding(), 2);

        // "old" was evicted; resubmitting restarts it from scratch
        // (and evicts "mid" in turn, the next-oldest)
        assert_eq!(r.submit(chunk("old", 1, 2, "x2")), None);
        assert_eq!(r.outstanding(), 2);

        // "new" is untouched and still completes
        assert_eq!(r.submit(chunk("new", 1, 2, "z2")), Some("zz2".into()));
    }
}
