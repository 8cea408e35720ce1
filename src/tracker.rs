//! Finality tracking state machine.
//!
//! A transaction carrying an application payload moves through
//! `Seen -> Validated -> Finalized`. Nothing is exposed to consumers until
//! the finalizing transition: the feed's individual-validity notification is
//! not itself final, so a message surfaces only once its transaction appears
//! in a checkpoint's confirmed-output set. Entries never finalized are
//! simply dropped at process end.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

use crate::events::Checkpoint;
use crate::message::ApplicationMessage;
use crate::metrics;

/// One payload-bearing transaction awaiting finality
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub tx_id: String,
    pub content: JsonValue,
    pub first_seen_at: DateTime<Utc>,
    pub validated: bool,
}

#[derive(Default)]
pub struct FinalityTracker {
    pending: HashMap<String, PendingEntry>,
}

impl FinalityTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_pending(&self, tx_id: &str) -> bool {
        self.pending.contains_key(tx_id)
    }

    /// An unconfirmed payload-bearing transaction was observed.
    /// Re-observation of a known transaction is a no-op.
    pub fn observe_seen(&mut self, tx_id: &str, content: JsonValue) {
        if self.pending.contains_key(tx_id) {
            return;
        }
        debug!(tx_id = %tx_id, "Tracking payload-bearing transaction");
        self.pending.insert(
            tx_id.to_string(),
            PendingEntry {
                tx_id: tx_id.to_string(),
                content,
                first_seen_at: Utc::now(),
                validated: false,
            },
        );
        metrics::set_pending(self.pending.len());
    }

    /// The feed reported the transaction individually valid.
    ///
    /// If the validity event arrived first, the entry is created
    /// retroactively from the event's own payload.
    pub fn observe_valid(&mut self, tx_id: &str, content: Option<JsonValue>) {
        if let Some(entry) = self.pending.get_mut(tx_id) {
            entry.validated = true;
            return;
        }
        let Some(content) = content else {
            return;
        };
        debug!(tx_id = %tx_id, "Validity event arrived before seen; creating entry");
        self.pending.insert(
            tx_id.to_string(),
            PendingEntry {
                tx_id: tx_id.to_string(),
                content,
                first_seen_at: Utc::now(),
                validated: true,
            },
        );
        metrics::set_pending(self.pending.len());
    }

    /// The transaction was rejected; its entry is discarded
    pub fn observe_invalid(&mut self, tx_id: &str) {
        if self.pending.remove(tx_id).is_some() {
            info!(tx_id = %tx_id, "Discarding superseded transaction");
            metrics::set_pending(self.pending.len());
        }
    }

    /// A checkpoint finalized a batch of transactions.
    ///
    /// Every validated pending entry whose transaction id appears in the
    /// checkpoint's output set is converted into an application message and
    /// removed. Re-delivery of the same checkpoint finds nothing pending
    /// and produces nothing.
    pub fn observe_checkpoint(&mut self, checkpoint: &Checkpoint) -> Vec<ApplicationMessage> {
        let confirmed: HashSet<&str> = checkpoint.finalized_tx_ids().collect();

        let finalized_ids: Vec<String> = self
            .pending
            .values()
            .filter(|entry| entry.validated && confirmed.contains(entry.tx_id.as_str()))
            .map(|entry| entry.tx_id.clone())
            .collect();

        let mut messages = Vec::with_capacity(finalized_ids.len());
        for tx_id in finalized_ids {
            let entry = self.pending.remove(&tx_id).expect("entry selected above");
            info!(
                tx_id = %tx_id,
                checkpoint = ?checkpoint.number,
                "Transaction finalized by checkpoint"
            );
            messages.push(ApplicationMessage::from_content(&tx_id, entry.content));
        }

        if !messages.is_empty() {
            metrics::set_pending(self.pending.len());
        }
        messages
    }
}
