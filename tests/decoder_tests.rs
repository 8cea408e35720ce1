//! Unit tests for the decoder module
//!
//! Run with: cargo test --test decoder_tests

use metafeed::decoder::{decode_transaction, MetadataValue, APP_METADATA_LABEL};
use minicbor::Encoder;
use serde_json::json;

/// Encode [body, witnesses, <auxiliary>] with empty body/witness maps,
/// where the auxiliary bytes are supplied raw
fn tx_with_raw_auxiliary(aux: &[u8]) -> String {
    let mut buf = Vec::new();
    let mut enc = Encoder::new(&mut buf);
    enc.array(3).unwrap();
    enc.map(0).unwrap();
    enc.map(0).unwrap();
    drop(enc);
    buf.extend_from_slice(aux);
    hex::encode(buf)
}

fn encode_aux<F: FnOnce(&mut Encoder<&mut Vec<u8>>)>(build: F) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut enc = Encoder::new(&mut buf);
    build(&mut enc);
    buf
}

// =============================================================================
// Structural forms
// =============================================================================

#[test]
fn test_nested_structures_survive_decoding() {
    // {1337: {"header": [1, 2], "body": "payload"}}
    let aux = encode_aux(|enc| {
        enc.map(1).unwrap();
        enc.u64(APP_METADATA_LABEL).unwrap();
        enc.map(2).unwrap();
        enc.str("header").unwrap();
        enc.array(2).unwrap();
        enc.u64(1).unwrap();
        enc.u64(2).unwrap();
        enc.str("body").unwrap();
        enc.str("payload").unwrap();
    });

    let payload = decode_transaction(&tx_with_raw_auxiliary(&aux))
        .unwrap()
        .unwrap();
    let value = payload.application_payload().unwrap();

    assert_eq!(
        value.to_json(),
        json!({"header": [1, 2], "body": "payload"})
    );
}

#[test]
fn test_multiple_labels_are_all_retained() {
    let aux = encode_aux(|enc| {
        enc.map(3).unwrap();
        enc.u64(674).unwrap();
        enc.str("msg").unwrap();
        enc.u64(APP_METADATA_LABEL).unwrap();
        enc.str("app").unwrap();
        enc.u64(721).unwrap();
        enc.str("nft").unwrap();
    });

    let payload = decode_transaction(&tx_with_raw_auxiliary(&aux))
        .unwrap()
        .unwrap();
    assert_eq!(payload.labels.len(), 3);
    assert_eq!(
        payload.application_payload(),
        Some(&MetadataValue::Text("app".to_string()))
    );
    assert_eq!(
        payload.labels.get(&674),
        Some(&MetadataValue::Text("msg".to_string()))
    );
}

#[test]
fn test_negative_integers_decode() {
    let aux = encode_aux(|enc| {
        enc.map(1).unwrap();
        enc.u64(APP_METADATA_LABEL).unwrap();
        enc.i64(-42).unwrap();
    });

    let payload = decode_transaction(&tx_with_raw_auxiliary(&aux))
        .unwrap()
        .unwrap();
    assert_eq!(
        payload.application_payload(),
        Some(&MetadataValue::Integer(-42))
    );
}

#[test]
fn test_text_labels_convertible_to_integers_are_retained() {
    let aux = encode_aux(|enc| {
        enc.map(2).unwrap();
        enc.str("1337").unwrap();
        enc.str("from text key").unwrap();
        enc.str("not-a-number").unwrap();
        enc.str("dropped").unwrap();
    });

    let payload = decode_transaction(&tx_with_raw_auxiliary(&aux))
        .unwrap()
        .unwrap();
    assert_eq!(payload.labels.len(), 1);
    assert_eq!(
        payload.application_payload(),
        Some(&MetadataValue::Text("from text key".to_string()))
    );
}

#[test]
fn test_empty_metadata_map_yields_no_payload() {
    let aux = encode_aux(|enc| {
        enc.map(0).unwrap();
    });

    assert_eq!(decode_transaction(&tx_with_raw_auxiliary(&aux)).unwrap(), None);
}

#[test]
fn test_truncated_transaction_is_an_error() {
    // Array header declaring 3 elements, but only one present
    let mut buf = Vec::new();
    let mut enc = Encoder::new(&mut buf);
    enc.array(3).unwrap();
    enc.map(0).unwrap();
    drop(enc);

    assert!(decode_transaction(&hex::encode(buf)).is_err());
}

#[test]
fn test_indefinite_length_metadata_is_rejected() {
    // 0xbf = indefinite-length map, 0xff = break
    let aux = [0xbf, 0xff];
    assert!(decode_transaction(&tx_with_raw_auxiliary(&aux)).is_err());
}

// =============================================================================
// Normalization
// =============================================================================

#[test]
fn test_text_values_are_not_json_parsed_by_to_json() {
    // The secondary parse happens at payload interpretation, not here; a
    // fragment of a larger JSON document must come through verbatim.
    let value = MetadataValue::Text("{\"partial\":".to_string());
    assert_eq!(value.to_json(), json!("{\"partial\":"));
}

#[test]
fn test_list_of_text_to_json() {
    let value = MetadataValue::List(vec![
        MetadataValue::Text("a".to_string()),
        MetadataValue::Integer(7),
    ]);
    assert_eq!(value.to_json(), json!(["a", 7]));
}

#[test]
fn test_as_text_accessor() {
    assert_eq!(MetadataValue::Text("x".to_string()).as_text(), Some("x"));
    assert_eq!(MetadataValue::Integer(1).as_text(), None);
}
