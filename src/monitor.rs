//! Pipeline orchestration: decode, reassemble, track finality, route.
//!
//! One monitor instance owns the whole pipeline state and processes feed
//! events strictly in delivery order. Every failure along the way is
//! absorbed and logged; a bad event never aborts event processing.

use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashSet, VecDeque};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::decoder::{decode_transaction, MetadataValue};
use crate::events::{FeedEvent, TransactionEnvelope};
use crate::message::{ApplicationMessage, MessageType};
use crate::metrics;
use crate::queue::{MessageHandler, MessageQueue, QueueStatistics};
use crate::reassembly::{ChunkReassembler, MessageChunk};
use crate::tracker::FinalityTracker;

/// Pipeline statistics as reported by `statistics()`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorStatistics {
    pub events_processed: u64,
    pub pending: usize,
    pub queued: usize,
    pub by_type: BTreeMap<String, usize>,
    pub evicted_total: u64,
    pub incomplete_buffers: usize,
}

/// Bound on the memo of transaction ids whose payload was already decoded
const DECODED_MEMO_CAP: usize = 1024;

pub struct TransactionMonitor {
    reassembler: ChunkReassembler,
    tracker: FinalityTracker,
    queue: MessageQueue,
    events_processed: u64,
    // Seen and valid events carry the same transaction; without this memo a
    // lagging validity event would re-decode the payload and feed the same
    // chunk to the reassembler a second time.
    decoded: HashSet<String>,
    decoded_order: VecDeque<String>,
}

impl TransactionMonitor {
    pub fn new(config: &Config) -> Self {
        Self {
            reassembler: ChunkReassembler::new(
                config.max_incomplete_messages,
                config.chunk_stale(),
            ),
            tracker: FinalityTracker::new(),
            queue: MessageQueue::new(config.max_queue_size),
            events_processed: 0,
            decoded: HashSet::new(),
            decoded_order: VecDeque::new(),
        }
    }

    /// Process one feed event. Synchronous; the caller drives events in
    /// feed-delivery order.
    pub fn handle_event(&mut self, event: FeedEvent) {
        self.events_processed += 1;
        metrics::record_event(event.tag());

        match event {
            FeedEvent::TransactionSeen { transaction } => {
                if self.already_decoded(&transaction.tx_id) {
                    return;
                }
                if let Some(content) = self.extract_content(&transaction) {
                    self.tracker.observe_seen(&transaction.tx_id, content);
                }
            }
            FeedEvent::TransactionValid { transaction } => {
                if self.tracker.is_pending(&transaction.tx_id) {
                    self.tracker.observe_valid(&transaction.tx_id, None);
                } else if !self.already_decoded(&transaction.tx_id) {
                    // Validity arrived first; create the entry from this
                    // event's own payload.
                    if let Some(content) = self.extract_content(&transaction) {
                        self.tracker.observe_valid(&transaction.tx_id, Some(content));
                    }
                }
            }
            FeedEvent::TransactionInvalid { transaction } => {
                self.tracker.observe_invalid(&transaction.tx_id);
            }
            FeedEvent::CheckpointConfirmed { checkpoint } => {
                for message in self.tracker.observe_checkpoint(&checkpoint) {
                    metrics::record_finalized(message.message_type.as_str());
                    self.queue.route(&message);
                    self.queue.enqueue(message);
                }
            }
            FeedEvent::HeadStatusChanged { status } => {
                info!(status = ?status, "Head status changed");
            }
        }
    }

    fn already_decoded(&self, tx_id: &str) -> bool {
        self.decoded.contains(tx_id)
    }

    fn note_decoded(&mut self, tx_id: &str) {
        if self.decoded.insert(tx_id.to_string()) {
            self.decoded_order.push_back(tx_id.to_string());
            if self.decoded_order.len() > DECODED_MEMO_CAP {
                if let Some(oldest) = self.decoded_order.pop_front() {
                    self.decoded.remove(&oldest);
                }
            }
        }
    }

    /// Decode a transaction's application payload and interpret it into
    /// message content, driving the reassembler for chunked payloads.
    ///
    /// Returns `None` for transactions without a payload, with a payload
    /// under other labels only, or carrying a chunk that does not yet
    /// complete its message.
    fn extract_content(&mut self, transaction: &TransactionEnvelope) -> Option<JsonValue> {
        self.note_decoded(&transaction.tx_id);
        let payload = match decode_transaction(&transaction.cbor_hex) {
            Ok(Some(payload)) => payload,
            Ok(None) => return None,
            Err(e) => {
                debug!(
                    tx_id = %transaction.tx_id,
                    error = %e,
                    "Treating undecodable transaction as payload-less"
                );
                return None;
            }
        };

        let value = match payload.application_payload() {
            Some(value) => value,
            None => {
                debug!(
                    tx_id = %transaction.tx_id,
                    labels = payload.labels.len(),
                    "Transaction metadata carries no application label"
                );
                return None;
            }
        };

        self.interpret_payload(&transaction.tx_id, value)
    }

    /// Normalize the application payload into message content.
    ///
    /// Accepted shapes: a chunk descriptor object (buffered until its
    /// message completes), a list of text fragments split to fit the wire
    /// limit (joined in list order), or a single text value. Text that is
    /// itself JSON gets its secondary parse here, exactly once.
    fn interpret_payload(&mut self, tx_id: &str, value: &MetadataValue) -> Option<JsonValue> {
        match value {
            MetadataValue::Mapping(_) => {
                let object = value.to_json();
                if let Some(chunk) = as_chunk(&object) {
                    let text = self.reassembler.submit(chunk)?;
                    Some(parse_message_text(&text))
                } else {
                    Some(object)
                }
            }
            MetadataValue::List(items) => {
                let mut text = String::new();
                for item in items {
                    match item.as_text() {
                        Some(fragment) => text.push_str(fragment),
                        None => {
                            warn!(
                                tx_id = %tx_id,
                                "Ignoring non-text fragment in split payload"
                            );
                        }
                    }
                }
                Some(parse_message_text(&text))
            }
            MetadataValue::Text(text) => Some(parse_message_text(text)),
            MetadataValue::Integer(i) => Some(JsonValue::from(*i)),
        }
    }

    pub fn register_handler(
        &mut self,
        message_type: MessageType,
        channel: Option<String>,
        handler: MessageHandler,
    ) {
        self.queue.register_handler(message_type, channel, handler);
    }

    pub fn messages_by_type(
        &self,
        message_type: MessageType,
        channel: Option<&str>,
    ) -> Vec<&ApplicationMessage> {
        self.queue.get_by_type(message_type, channel)
    }

    pub fn messages(&self) -> impl Iterator<Item = &ApplicationMessage> {
        self.queue.iter()
    }

    pub fn clear_finalized(&mut self) -> usize {
        self.queue.clear_finalized()
    }

    pub fn queue_statistics(&self) -> QueueStatistics {
        self.queue.statistics()
    }

    pub fn statistics(&self) -> MonitorStatistics {
        let queue = self.queue.statistics();
        MonitorStatistics {
            events_processed: self.events_processed,
            pending: self.tracker.pending_count(),
            queued: queue.total,
            by_type: queue.by_type,
            evicted_total: queue.evicted_total,
            incomplete_buffers: self.reassembler.outstanding(),
        }
    }
}

/// Interpret an object as a chunk descriptor if it carries the four chunk
/// fields with sensible types
fn as_chunk(object: &JsonValue) -> Option<MessageChunk> {
    let obj = object.as_object()?;
    let message_id = obj.get("messageId")?.as_str()?;
    let index = obj.get("index")?.as_u64()?;
    let total = obj.get("total")?.as_u64()?;
    let text = obj.get("text")?.as_str()?;
    Some(MessageChunk {
        message_id: message_id.to_string(),
        index: index as usize,
        total: total as usize,
        text: text.to_string(),
    })
}

/// The secondary parse: payload text that encodes a JSON document becomes
/// structured content; anything else stays a plain string
fn parse_message_text(text: &str) -> JsonValue {
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        if let Ok(value) = serde_json::from_str(text) {
            return value;
        }
    }
    JsonValue::String(text.to_string())
}
