//! Unit tests for the message module
//!
//! Run with: cargo test --test message_tests

use chrono::{TimeZone, Utc};
use metafeed::message::{ApplicationMessage, MessageType};
use serde_json::json;

// =============================================================================
// MessageType
// =============================================================================

#[test]
fn test_message_type_round_trip() {
    for (raw, expected) in [
        ("chat", MessageType::Chat),
        ("action", MessageType::Action),
        ("event", MessageType::Event),
        ("data", MessageType::Data),
        ("custom", MessageType::Custom),
    ] {
        assert_eq!(MessageType::parse(raw), expected);
        assert_eq!(expected.as_str(), raw);
    }
}

#[test]
fn test_unknown_type_maps_to_custom() {
    assert_eq!(MessageType::parse("bogus"), MessageType::Custom);
    assert_eq!(MessageType::parse(""), MessageType::Custom);
}

#[test]
fn test_parse_strict_rejects_unknown() {
    assert_eq!(MessageType::parse_strict("chat"), Some(MessageType::Chat));
    assert_eq!(MessageType::parse_strict("custom"), Some(MessageType::Custom));
    assert_eq!(MessageType::parse_strict("bogus"), None);
}

#[test]
fn test_message_type_serde() {
    assert_eq!(serde_json::to_string(&MessageType::Chat).unwrap(), "\"chat\"");
    let parsed: MessageType = serde_json::from_str("\"action\"").unwrap();
    assert_eq!(parsed, MessageType::Action);
    let fallback: MessageType = serde_json::from_str("\"whatever\"").unwrap();
    assert_eq!(fallback, MessageType::Custom);
}

// =============================================================================
// ApplicationMessage::from_content
// =============================================================================

#[test]
fn test_from_content_lifts_envelope_fields() {
    let payload = json!({
        "id": "msg-1",
        "timestamp": 1703123456789i64,
        "sender": "alice",
        "type": "chat",
        "channel": "lobby",
        "content": "hello there"
    });

    let message = ApplicationMessage::from_content("abc123", payload);
    assert_eq!(message.id, "msg-1");
    assert_eq!(
        message.timestamp,
        Utc.timestamp_millis_opt(1703123456789).unwrap()
    );
    assert_eq!(message.sender.as_deref(), Some("alice"));
    assert_eq!(message.message_type, MessageType::Chat);
    assert_eq!(message.channel.as_deref(), Some("lobby"));
    assert_eq!(message.content, json!("hello there"));
    assert_eq!(message.transaction_id, "abc123");
    assert!(message.finalized);
}

#[test]
fn test_from_content_rfc3339_timestamp() {
    let payload = json!({
        "timestamp": "2023-12-21T01:30:56Z",
        "type": "event",
        "content": {}
    });

    let message = ApplicationMessage::from_content("tx", payload);
    assert_eq!(
        message.timestamp,
        Utc.with_ymd_and_hms(2023, 12, 21, 1, 30, 56).unwrap()
    );
}

#[test]
fn test_from_content_defaults_for_missing_fields() {
    let message = ApplicationMessage::from_content("tx", json!({"type": "data"}));

    assert!(!message.id.is_empty());
    assert_eq!(message.message_type, MessageType::Data);
    assert_eq!(message.sender, None);
    assert_eq!(message.channel, None);
}

#[test]
fn test_from_content_generated_ids_are_unique() {
    let a = ApplicationMessage::from_content("tx", json!({}));
    let b = ApplicationMessage::from_content("tx", json!({}));
    assert_ne!(a.id, b.id);
}

#[test]
fn test_from_content_non_object_payload_becomes_content() {
    let message = ApplicationMessage::from_content("tx", json!("plain text"));

    assert_eq!(message.message_type, MessageType::Custom);
    assert_eq!(message.content, json!("plain text"));
    assert!(message.finalized);
}

#[test]
fn test_from_content_object_without_content_field_kept_whole() {
    let payload = json!({"type": "action", "move": "rock"});
    let message = ApplicationMessage::from_content("tx", payload.clone());

    assert_eq!(message.message_type, MessageType::Action);
    assert_eq!(message.content, payload);
}

// =============================================================================
// Serialization
// =============================================================================

#[test]
fn test_message_serialization_is_camel_case() {
    let message = ApplicationMessage {
        id: "m1".to_string(),
        timestamp: Utc.timestamp_millis_opt(1703123456789).unwrap(),
        sender: Some("bob".to_string()),
        message_type: MessageType::Chat,
        channel: None,
        content: json!("hi"),
        transaction_id: "abc123".to_string(),
        finalized: true,
    };

    let json = serde_json::to_string(&message).unwrap();
    assert!(json.contains("\"messageType\":\"chat\""));
    assert!(json.contains("\"transactionId\":\"abc123\""));
    assert!(json.contains("\"finalized\":true"));
    // Absent channel is omitted entirely
    assert!(!json.contains("channel"));
}
