//! Bounded message queue and type/channel router.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, error, warn};

use crate::error::MonitorError;
use crate::message::{ApplicationMessage, MessageType};
use crate::metrics;

/// A consumer callback. Errors are caught at the router boundary and never
/// affect routing of subsequent messages.
pub type MessageHandler = Box<dyn Fn(&ApplicationMessage) -> Result<(), MonitorError> + Send + Sync>;

/// Registration key: a message type, optionally narrowed to a channel
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HandlerKey {
    message_type: MessageType,
    channel: Option<String>,
}

/// Queue statistics as reported by `statistics()`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatistics {
    pub total: usize,
    pub by_type: BTreeMap<String, usize>,
    pub evicted_total: u64,
}

/// Ordered, bounded buffer of finalized messages with handler dispatch.
///
/// Eviction is FIFO: when the cap is exceeded the oldest entry is dropped
/// and the drop is logged and counted.
pub struct MessageQueue {
    messages: VecDeque<ApplicationMessage>,
    max_size: usize,
    handlers: HashMap<HandlerKey, Vec<MessageHandler>>,
    evicted: u64,
}

impl MessageQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            max_size: max_size.max(1),
            handlers: HashMap::new(),
            evicted: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Append a finalized message, evicting the oldest entry if the queue
    /// is at capacity
    pub fn enqueue(&mut self, message: ApplicationMessage) {
        if self.messages.len() >= self.max_size {
            if let Some(evicted) = self.messages.pop_front() {
                warn!(
                    id = %evicted.id,
                    transaction_id = %evicted.transaction_id,
                    max_size = self.max_size,
                    "Queue at capacity; evicting oldest message"
                );
                self.evicted += 1;
                metrics::record_queue_eviction();
            }
        }
        self.messages.push_back(message);
        metrics::set_queue_depth(self.messages.len());
    }

    /// Register a handler for a message type, optionally narrowed to a
    /// channel. Multiple handlers per key are invoked in registration order.
    pub fn register_handler(
        &mut self,
        message_type: MessageType,
        channel: Option<String>,
        handler: MessageHandler,
    ) {
        let key = HandlerKey {
            message_type,
            channel,
        };
        self.handlers.entry(key).or_default().push(handler);
    }

    /// Dispatch a message to the most specific matching registration:
    /// type+channel when the message carries a channel and one is
    /// registered, otherwise type-only. Handler errors are logged here and
    /// go no further.
    pub fn route(&self, message: &ApplicationMessage) {
        let handlers = self.matching_handlers(message);
        let Some(handlers) = handlers else {
            debug!(
                message_type = message.message_type.as_str(),
                channel = message.channel.as_deref(),
                "No handler registered for message"
            );
            return;
        };

        for handler in handlers {
            if let Err(e) = handler(message) {
                error!(
                    id = %message.id,
                    message_type = message.message_type.as_str(),
                    error = %e,
                    "Message handler failed"
                );
                metrics::record_handler_error();
            }
        }
    }

    fn matching_handlers(&self, message: &ApplicationMessage) -> Option<&Vec<MessageHandler>> {
        if let Some(channel) = &message.channel {
            let key = HandlerKey {
                message_type: message.message_type,
                channel: Some(channel.clone()),
            };
            if let Some(handlers) = self.handlers.get(&key) {
                return Some(handlers);
            }
        }
        self.handlers.get(&HandlerKey {
            message_type: message.message_type,
            channel: None,
        })
    }

    /// Messages of the given type, optionally narrowed to a channel,
    /// oldest first
    pub fn get_by_type(
        &self,
        message_type: MessageType,
        channel: Option<&str>,
    ) -> Vec<&ApplicationMessage> {
        self.messages
            .iter()
            .filter(|m| m.message_type == message_type)
            .filter(|m| match channel {
                Some(channel) => m.channel.as_deref() == Some(channel),
                None => true,
            })
            .collect()
    }

    /// All queued messages, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &ApplicationMessage> {
        self.messages.iter()
    }

    /// Drop every queued message, returning how many were removed
    pub fn clear_finalized(&mut self) -> usize {
        let cleared = self.messages.len();
        self.messages.clear();
        metrics::set_queue_depth(0);
        cleared
    }

    pub fn statistics(&self) -> QueueStatistics {
        let mut by_type = BTreeMap::new();
        for message in &self.messages {
            *by_type
                .entry(message.message_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        QueueStatistics {
            total: self.messages.len(),
            by_type,
            evicted_total: self.evicted,
        }
    }
}
