//! Wire types for the settlement node's event feed.
//!
//! Frames arrive as JSON objects discriminated by a `tag` field. Frames
//! whose tag is not listed here fail to parse and are dropped by the feed
//! adapter; they carry nothing this monitor interprets.

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

/// A transaction reference as carried by feed frames: the transaction id
/// plus the binary-encoded transaction body, hex-encoded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionEnvelope {
    pub tx_id: String,
    pub cbor_hex: String,
}

/// A finalizing checkpoint: the set of outputs it confirms, keyed by
/// `"<transactionId>#<outputIndex>"`. The descriptors themselves are opaque
/// to this monitor; only the transaction-id component of each key matters.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub utxo: HashMap<String, JsonValue>,
}

impl Checkpoint {
    /// Transaction ids confirmed by this checkpoint, extracted from the
    /// output-identifier keys. Duplicates are possible (one per output).
    pub fn finalized_tx_ids(&self) -> impl Iterator<Item = &str> {
        self.utxo.keys().map(|key| key.split('#').next().unwrap_or(key))
    }
}

/// One decoded event from the feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "tag")]
pub enum FeedEvent {
    /// A payload-bearing transaction was observed but not yet validated.
    /// Some node versions emit this as "transaction-new".
    #[serde(rename = "transaction-seen", alias = "transaction-new")]
    TransactionSeen { transaction: TransactionEnvelope },

    /// The feed reports the transaction as individually valid. Not final.
    #[serde(rename = "transaction-valid")]
    TransactionValid { transaction: TransactionEnvelope },

    /// The transaction was rejected; any pending entry for it is discarded
    #[serde(rename = "transaction-invalid")]
    TransactionInvalid { transaction: TransactionEnvelope },

    /// A checkpoint finalized a batch of transactions
    #[serde(rename = "checkpoint-confirmed")]
    CheckpointConfirmed { checkpoint: Checkpoint },

    /// Protocol head status changed; informational only
    #[serde(rename = "head-status-change")]
    HeadStatusChanged {
        #[serde(default)]
        status: Option<String>,
    },
}

impl FeedEvent {
    /// The frame's tag, for logging and metrics labels
    pub fn tag(&self) -> &'static str {
        match self {
            Self::TransactionSeen { .. } => "transaction-seen",
            Self::TransactionValid { .. } => "transaction-valid",
            Self::TransactionInvalid { .. } => "transaction-invalid",
            Self::CheckpointConfirmed { .. } => "checkpoint-confirmed",
            Self::HeadStatusChanged { .. } => "head-status-change",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_valid_deserialization() {
        let json = r#"{
            "tag": "transaction-valid",
            "transaction": { "txId": "abc123", "cborHex": "83a0a0a0" }
        }"#;

        let event: FeedEvent = serde_json::from_str(json).unwrap();
        match event {
            FeedEvent::TransactionValid { transaction } => {
                assert_eq!(transaction.tx_id, "abc123");
                assert_eq!(transaction.cbor_hex, "83a0a0a0");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_checkpoint_tx_id_extraction() {
        let json = r#"{
            "tag": "checkpoint-confirmed",
            "checkpoint": {
                "number": 7,
                "utxo": {
                    "abc123#0": { "value": 10 },
                    "abc123#1": { "value": 20 },
                    "def456#0": { "value": 30 }
                }
            }
        }"#;

        let event: FeedEvent = serde_json::from_str(json).unwrap();
        let FeedEvent::CheckpointConfirmed { checkpoint } = event else {
            panic!("expected checkpoint");
        };

        assert_eq!(checkpoint.number, Some(7));
        let mut ids: Vec<&str> = checkpoint.finalized_tx_ids().collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids, vec!["abc123", "def456"]);
    }

    #[test]
    fn test_unknown_tag_is_a_parse_error() {
        let json = r#"{ "tag": "peer-connected", "peer": "10.0.0.1" }"#;
        assert!(serde_json::from_str::<FeedEvent>(json).is_err());
    }

    #[test]
    fn test_head_status_without_status_field() {
        let json = r#"{ "tag": "head-status-change" }"#;
        let event: FeedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.tag(), "head-status-change");
    }
}
